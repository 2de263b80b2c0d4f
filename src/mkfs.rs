//! create our filesystem
use crate::{
    block_store::{BlockStore, MmapBlockStore},
    fs::{
        self, Bitmap, FileKind, Inode, SfsError, SuperBlock, BLOCK_BITMAP_BLOCK, BLOCK_SIZE,
        DATA_START_BLOCK, INODE_BITMAP_BLOCK, INODE_TABLE_BLOCK, ROOT_INODE, SUPERBLOCK_BLOCK,
    },
    utils::{fs_size_calculator, traits::OnDiskRecord},
};
use anyhow::{anyhow, Context};
use byte_unit::Byte;
use log::info;
use std::{fs::OpenOptions, path::Path};

/// how big a new volume should be
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatOptions {
    /// blocks after the inode table, the root directory takes the first one
    pub data_blocks: u64,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self { data_blocks: 100 }
    }
}

impl FormatOptions {
    pub fn block_count(&self) -> u64 {
        DATA_START_BLOCK + self.data_blocks
    }
}

/// lay down an empty volume on `store`:
/// a superblock, both bitmaps and an inode table holding only the root directory.
/// Every other block is zeroed.
pub fn format<S: BlockStore>(store: &mut S, options: &FormatOptions) -> fs::Result<()> {
    if store.block_size() != BLOCK_SIZE {
        return Err(SfsError::Validation(format!(
            "block size must be {BLOCK_SIZE}, the store uses {}",
            store.block_size()
        )));
    }
    let block_count = store.block_count();
    if options.data_blocks == 0 || block_count < options.block_count() {
        return Err(SfsError::Validation(format!(
            "a volume with {} data blocks needs {} blocks, the store has {block_count}",
            options.data_blocks,
            options.block_count().max(DATA_START_BLOCK + 1)
        )));
    }
    let capacity = fs_size_calculator::bitmap_capacity(BLOCK_SIZE);
    if block_count > capacity {
        return Err(SfsError::Validation(format!(
            "{block_count} blocks exceed the {capacity} a block bitmap can track"
        )));
    }

    let zeros = vec![0u8; BLOCK_SIZE];
    for index in 0..block_count {
        store.write_block(index, &zeros)?;
    }

    let mut block = zeros.clone();
    let superblock = SuperBlock::new().encode_record()?;
    block[..superblock.len()].copy_from_slice(&superblock);
    store.write_block(SUPERBLOCK_BLOCK, &block)?;

    // the root inode is taken
    let mut inode_bitmap = Bitmap::from_block(&zeros, capacity as usize);
    inode_bitmap.set(ROOT_INODE as usize)?;
    store.write_block(INODE_BITMAP_BLOCK, inode_bitmap.as_raw_slice())?;

    // metadata blocks and the root directory block are taken
    let mut block_bitmap = Bitmap::from_block(&zeros, capacity as usize);
    for index in 0..=DATA_START_BLOCK {
        block_bitmap.set(index as usize)?;
    }
    store.write_block(BLOCK_BITMAP_BLOCK, block_bitmap.as_raw_slice())?;

    let mut root = Inode::new(ROOT_INODE, FileKind::Directory, 0o755);
    root.add_block(DATA_START_BLOCK as u32, 0)?;
    root.file_size = BLOCK_SIZE as u64;
    let mut table = zeros;
    let raw = root.encode_record()?;
    table[..raw.len()].copy_from_slice(&raw);
    store.write_block(INODE_TABLE_BLOCK, &table)?;

    store.flush()?;
    info!("formatted {block_count} blocks, data region starts at block {DATA_START_BLOCK}");
    Ok(())
}

/// create a new image file at `image_file_path` and format it
/// # Params
/// - `image_file_path`: the path of the image file, it must not exist yet
/// - `options`: the size of the data region
///
/// # Return
/// an [anyhow::Result] type to indicate whether the operation is successful
pub fn mkfs<P>(image_file_path: P, options: &FormatOptions) -> anyhow::Result<()>
where
    P: AsRef<Path>,
{
    let image_file_path = image_file_path.as_ref();
    if options.data_blocks == 0 {
        return Err(anyhow!("the root directory needs at least one data block"));
    }
    let capacity = fs_size_calculator::bitmap_capacity(BLOCK_SIZE);
    if options.block_count() > capacity {
        return Err(anyhow!(
            "{} data blocks make a volume of {} blocks, a block bitmap tracks at most {capacity}",
            options.data_blocks,
            options.block_count()
        ));
    }
    let file_len = fs_size_calculator::image_size(BLOCK_SIZE, options.data_blocks);

    // never overwrite an existing image
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create_new(true)
        .open(image_file_path)
        .with_context(|| format!("can't create image file {}", image_file_path.display()))?;
    // all regions are zero after `set_len`
    file.set_len(file_len)?;
    drop(file);

    let formatted = MmapBlockStore::open(image_file_path, BLOCK_SIZE)
        .and_then(|mut store| format(&mut store, options));
    if let Err(e) = formatted {
        // drop the half-made image
        std::fs::remove_file(image_file_path)?;
        return Err(e).with_context(|| format!("can't format {}", image_file_path.display()));
    }

    info!(
        "created sfs image {} of {}",
        image_file_path.display(),
        Byte::from_bytes(file_len as _).get_appropriate_unit(true)
    );
    Ok(())
}
