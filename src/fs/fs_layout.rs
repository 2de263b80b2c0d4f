//! what does our filesystem look like on the block store

use log::{debug, info, warn};

use crate::{
    block_store::BlockStore,
    utils::{fs_size_calculator, traits::OnDiskRecord},
};

use super::{
    Bitmap, Inode, MountOptions, Result, SfsError, SuperBlock, BLOCK_SIZE, INODE_SIZE, ROOT_INODE,
    ROOT_SLOT, SUPERBLOCK_BLOCK,
};

/// A mounted volume.
///
/// Every record is addressed by block index (and slot index) on the store,
/// nothing on disk is cached here apart from the superblock.
#[derive(Debug)]
pub struct Volume<S> {
    /// the "device" this volume lives on
    store: S,
    superblock: SuperBlock,
    options: MountOptions,
}

impl<S: BlockStore> Volume<S> {
    /// read and check the superblock and the root record of `store`
    pub fn mount(store: S, options: MountOptions) -> Result<Self> {
        if store.block_size() != BLOCK_SIZE {
            return Err(SfsError::Validation(format!(
                "store block size {} is not {BLOCK_SIZE}",
                store.block_size()
            )));
        }
        let mut buf = vec![0u8; BLOCK_SIZE];
        store.read_block(SUPERBLOCK_BLOCK, &mut buf)?;
        let superblock = SuperBlock::decode_record(&buf)?;
        superblock.validate(store.block_count())?;

        let volume = Volume {
            store,
            superblock,
            options,
        };
        // the root directory must be where mkfs put it
        let root = volume.read_slot(ROOT_SLOT)?;
        if root.inode_number != ROOT_INODE || !root.is_dir() {
            warn!("root slot holds {root:?}");
            return Err(SfsError::Validation(
                "slot 0 does not hold the root directory".into(),
            ));
        }
        info!(
            "mounted sfs volume: {} blocks, {} inode slots, options {:?}",
            volume.store.block_count(),
            volume.inode_table_slots(),
            volume.options
        );
        Ok(volume)
    }

    /// give the store back, flushing it first
    pub fn into_store(mut self) -> Result<S> {
        self.store.flush()?;
        Ok(self.store)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.store.flush()
    }
}

/// get [SuperBlock], [MountOptions] and the store of this volume
impl<S: BlockStore> Volume<S> {
    #[inline]
    pub fn superblock(&self) -> &SuperBlock {
        &self.superblock
    }

    #[inline]
    pub fn options(&self) -> MountOptions {
        self.options
    }

    #[inline]
    pub fn block_count(&self) -> u64 {
        self.store.block_count()
    }

    #[inline]
    pub fn store(&self) -> &S {
        &self.store
    }

    fn read_raw(&self, block: u64) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; BLOCK_SIZE];
        self.store.read_block(block, &mut buf)?;
        Ok(buf)
    }
}

/// data block operations
impl<S: BlockStore> Volume<S> {
    fn check_data_block(&self, block: u64) -> Result<()> {
        if block < self.superblock.data_start_block || block >= self.block_count() {
            return Err(SfsError::CorruptLayout(format!(
                "block {block} is outside the data region {}..{}",
                self.superblock.data_start_block,
                self.block_count()
            )));
        }
        Ok(())
    }

    pub(crate) fn read_data_block(&self, block: u32) -> Result<Vec<u8>> {
        self.check_data_block(block as u64)?;
        self.read_raw(block as u64)
    }

    pub(crate) fn write_data_block(&mut self, block: u32, data: &[u8]) -> Result<()> {
        self.check_data_block(block as u64)?;
        self.store.write_block(block as u64, data)
    }

    pub(crate) fn zero_data_block(&mut self, block: u32) -> Result<()> {
        self.write_data_block(block, &[0u8; BLOCK_SIZE])
    }
}

/// bitmap operations
impl<S: BlockStore> Volume<S> {
    /// load one of the two bitmaps,
    /// allocation is limited to inode table slots or blocks that exist on the store
    pub fn load_bitmap(&self, bitmap_block: u64) -> Result<Bitmap> {
        let raw = self.read_raw(bitmap_block)?;
        let capacity = fs_size_calculator::bitmap_capacity(BLOCK_SIZE);
        let limit = if bitmap_block == self.superblock.inode_bitmap_block {
            capacity.min(self.inode_table_slots())
        } else if bitmap_block == self.superblock.block_bitmap_block {
            capacity.min(self.block_count())
        } else {
            capacity
        };
        Ok(Bitmap::from_block(&raw, limit as usize))
    }

    fn store_bitmap(&mut self, bitmap_block: u64, bitmap: &Bitmap) -> Result<()> {
        self.store.write_block(bitmap_block, bitmap.as_raw_slice())
    }

    fn bitmap_name(&self, bitmap_block: u64) -> &'static str {
        if bitmap_block == self.superblock.inode_bitmap_block {
            "inode bitmap"
        } else {
            "block bitmap"
        }
    }

    /// find the first unset bit and set it in one step
    pub fn allocate_first_free(&mut self, bitmap_block: u64) -> Result<u64> {
        let mut bitmap = self.load_bitmap(bitmap_block)?;
        let index = bitmap
            .first_free()
            .ok_or_else(|| SfsError::NoSpace(self.bitmap_name(bitmap_block)))?;
        bitmap.set(index)?;
        self.store_bitmap(bitmap_block, &bitmap)?;
        debug!("allocated bit {index} of block {bitmap_block}");
        Ok(index as u64)
    }

    /// first unset bit, without marking it
    pub fn find_first_free(&self, bitmap_block: u64) -> Result<u64> {
        self.load_bitmap(bitmap_block)?
            .first_free()
            .map(|index| index as u64)
            .ok_or_else(|| SfsError::NoSpace(self.bitmap_name(bitmap_block)))
    }

    pub fn set_bit(&mut self, bitmap_block: u64, index: u64) -> Result<()> {
        let mut bitmap = self.load_bitmap(bitmap_block)?;
        if bitmap.set(index as usize)? {
            self.store_bitmap(bitmap_block, &bitmap)?;
        }
        Ok(())
    }

    pub fn test_bit(&self, bitmap_block: u64, index: u64) -> Result<bool> {
        self.load_bitmap(bitmap_block)?.test(index as usize)
    }

    pub fn clear_bit(&mut self, bitmap_block: u64, index: u64) -> Result<()> {
        let mut bitmap = self.load_bitmap(bitmap_block)?;
        if bitmap.clear(index as usize)? {
            self.store_bitmap(bitmap_block, &bitmap)?;
        }
        Ok(())
    }

    /// the next inode number, the caller commits it with [Volume::set_bit]
    pub fn next_free_inode_number(&self) -> Result<u64> {
        self.find_first_free(self.superblock.inode_bitmap_block)
    }

    /// allocate and zero one data block
    pub(crate) fn allocate_data_block(&mut self) -> Result<u32> {
        let block_bitmap = self.superblock.block_bitmap_block;
        let block = self.allocate_first_free(block_bitmap)?;
        // a clear bit below the data region means a damaged bitmap
        if let Err(e) = self.check_data_block(block) {
            self.clear_bit(block_bitmap, block)?;
            return Err(e);
        }
        let block = block as u32;
        self.zero_data_block(block)?;
        debug!("allocated data block {block}");
        Ok(block)
    }

    pub(crate) fn release_data_block(&mut self, block: u32) -> Result<()> {
        self.check_data_block(block as u64)?;
        self.clear_bit(self.superblock.block_bitmap_block, block as u64)?;
        debug!("released data block {block}");
        Ok(())
    }

    /// free data blocks and their total
    pub fn data_block_usage(&self) -> Result<(u64, u64)> {
        let bitmap = self.load_bitmap(self.superblock.block_bitmap_block)?;
        let limit = bitmap.limit() as u64;
        let total = limit - self.superblock.data_start_block.min(limit);
        Ok((bitmap.count_free() as u64, total))
    }

    /// free inode slots and their total
    pub fn inode_usage(&self) -> Result<(u64, u64)> {
        let bitmap = self.load_bitmap(self.superblock.inode_bitmap_block)?;
        Ok((bitmap.count_free() as u64, bitmap.limit() as u64))
    }
}

/// [Inode] table operations
impl<S: BlockStore> Volume<S> {
    /// the whole table lives in one block
    #[inline]
    pub fn inode_table_slots(&self) -> u64 {
        fs_size_calculator::inode_table_slots(BLOCK_SIZE)
    }

    fn slot_offset(&self, slot: u64) -> Result<usize> {
        if slot >= self.inode_table_slots() {
            return Err(SfsError::CorruptLayout(format!(
                "inode slot {slot} outside a table of {} slots",
                self.inode_table_slots()
            )));
        }
        Ok(slot as usize * INODE_SIZE)
    }

    pub fn read_slot(&self, slot: u64) -> Result<Inode> {
        let offset = self.slot_offset(slot)?;
        let table = self.read_raw(self.superblock.inode_table_block)?;
        Inode::decode_record(&table[offset..])
    }

    /// write `inode` at its own slot
    pub fn write_slot(&mut self, inode: &Inode) -> Result<()> {
        let offset = self.slot_offset(inode.slot_number)?;
        let raw = inode.encode_record()?;
        let table_block = self.superblock.inode_table_block;
        let mut table = self.read_raw(table_block)?;
        table[offset..offset + INODE_SIZE].copy_from_slice(&raw);
        self.store.write_block(table_block, &table)
    }

    pub fn zero_slot(&mut self, slot: u64) -> Result<()> {
        let offset = self.slot_offset(slot)?;
        let table_block = self.superblock.inode_table_block;
        let mut table = self.read_raw(table_block)?;
        table[offset..offset + INODE_SIZE].fill(0);
        self.store.write_block(table_block, &table)
    }

    /// the live inode numbered `ino`
    pub fn find_inode(&self, ino: u64) -> Result<Inode> {
        let inode = self.read_slot(ino)?;
        if inode.is_free() {
            return Err(SfsError::NotFound);
        }
        if inode.inode_number != ino || inode.slot_number != ino {
            return Err(SfsError::CorruptLayout(format!(
                "slot {ino} holds inode {} (slot {})",
                inode.inode_number, inode.slot_number
            )));
        }
        Ok(inode)
    }
}
