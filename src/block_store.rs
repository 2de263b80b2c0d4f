//! block-granular access to a volume image,
//! backed either by a memory-mapped image file or by an in-memory buffer.
use std::{
    collections::BTreeSet,
    fs::OpenOptions,
    io::{Error, ErrorKind},
    ops::Range,
    path::Path,
};

use log::debug;
use memmap2::MmapMut;

use crate::fs::Result;

/// Fixed-size block access by index.
///
/// Writes may be buffered until [BlockStore::flush] is called.
pub trait BlockStore {
    /// size of every block in bytes
    fn block_size(&self) -> usize;

    /// number of whole blocks on the store
    fn block_count(&self) -> u64;

    /// read block `index` into `buf`, whose length must be [BlockStore::block_size]
    fn read_block(&self, index: u64, buf: &mut [u8]) -> Result<()>;

    /// write `buf` to block `index` and mark it dirty
    fn write_block(&mut self, index: u64, buf: &[u8]) -> Result<()>;

    /// persist every dirty block
    fn flush(&mut self) -> Result<()>;
}

/// byte range of block `index`, checked against the store length and buffer size
fn block_range(len: usize, block_size: usize, index: u64, buf_len: usize) -> Result<Range<usize>> {
    if buf_len != block_size {
        return Err(Error::new(
            ErrorKind::InvalidInput,
            format!("buffer of {buf_len} bytes for a block of {block_size} bytes"),
        )
        .into());
    }
    let start = usize::try_from(index)
        .ok()
        .and_then(|i| i.checked_mul(block_size))
        .filter(|start| start.checked_add(block_size).is_some_and(|end| end <= len))
        .ok_or_else(|| {
            Error::new(
                ErrorKind::UnexpectedEof,
                format!("block {index} is past the end of the store"),
            )
        })?;
    Ok(start..start + block_size)
}

/// An image file mapped into memory
#[derive(Debug)]
pub struct MmapBlockStore {
    mmap: MmapMut,
    block_size: usize,
    dirty: BTreeSet<u64>,
}

impl MmapBlockStore {
    /// map an existing image file for read and write
    pub fn open<P>(image_path: P, block_size: usize) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        // open the "device" for read and write
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(image_path.as_ref())?;

        // Safety
        // This method returns an error when the underlying system call fails,
        // which can happen for a variety of reasons,
        // such as when the file is not open with read and write permissions.
        // from https://docs.rs/memmap2/0.5.10/memmap2/struct.MmapMut.html
        let mmap = unsafe { MmapMut::map_mut(&file)? };
        debug!(
            "mapped {} ({} bytes)",
            image_path.as_ref().display(),
            mmap.len()
        );
        Ok(Self {
            mmap,
            block_size,
            dirty: BTreeSet::new(),
        })
    }

    /// blocks written since the last flush
    pub fn dirty_blocks(&self) -> impl Iterator<Item = u64> + '_ {
        self.dirty.iter().copied()
    }
}

impl BlockStore for MmapBlockStore {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn block_count(&self) -> u64 {
        (self.mmap.len() / self.block_size) as u64
    }

    fn read_block(&self, index: u64, buf: &mut [u8]) -> Result<()> {
        let range = block_range(self.mmap.len(), self.block_size, index, buf.len())?;
        buf.copy_from_slice(&self.mmap[range]);
        Ok(())
    }

    fn write_block(&mut self, index: u64, buf: &[u8]) -> Result<()> {
        let range = block_range(self.mmap.len(), self.block_size, index, buf.len())?;
        self.mmap[range].copy_from_slice(buf);
        self.dirty.insert(index);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        for index in std::mem::take(&mut self.dirty) {
            self.mmap
                .flush_range(index as usize * self.block_size, self.block_size)?;
        }
        Ok(())
    }
}

/// A volume held entirely in memory
#[derive(Debug, Clone, Default)]
pub struct MemBlockStore {
    data: Vec<u8>,
    block_size: usize,
}

impl MemBlockStore {
    /// a zero-filled store of `block_count` blocks
    pub fn new(block_count: u64, block_size: usize) -> Self {
        Self {
            data: vec![0u8; block_count as usize * block_size],
            block_size,
        }
    }

    /// wrap an existing image, trailing bytes that don't fill a block are ignored
    pub fn from_vec(data: Vec<u8>, block_size: usize) -> Self {
        Self { data, block_size }
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

impl BlockStore for MemBlockStore {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn block_count(&self) -> u64 {
        (self.data.len() / self.block_size) as u64
    }

    fn read_block(&self, index: u64, buf: &mut [u8]) -> Result<()> {
        let range = block_range(self.data.len(), self.block_size, index, buf.len())?;
        buf.copy_from_slice(&self.data[range]);
        Ok(())
    }

    fn write_block(&mut self, index: u64, buf: &[u8]) -> Result<()> {
        let range = block_range(self.data.len(), self.block_size, index, buf.len())?;
        self.data[range].copy_from_slice(buf);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}
