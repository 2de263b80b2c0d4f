//! byte-range reads and writes over a file's direct blocks
use log::{debug, warn};

use crate::block_store::BlockStore;

use super::{Inode, Result, SfsError, Volume, BLOCK_SIZE, MAX_FILE_SIZE};

/// read and write data in the filesystem
impl<S: BlockStore> Volume<S> {
    /// read up to `len` bytes starting at `offset`,
    /// nothing is returned at or past the end of the file
    pub fn read_file(&self, inode: &Inode, offset: u64, len: usize) -> Result<Vec<u8>> {
        if !inode.is_regular_file() {
            return Err(SfsError::NotAFile);
        }
        if offset >= inode.file_size {
            return Ok(Vec::new());
        }
        let end = offset
            .saturating_add(len as u64)
            .min(inode.file_size)
            .min(MAX_FILE_SIZE);

        let mut buf = Vec::with_capacity((end - offset) as usize);
        let mut position = offset;
        while position < end {
            let pointer = (position / BLOCK_SIZE as u64) as usize;
            let offset_in_block = (position % BLOCK_SIZE as u64) as usize;
            let chunk = (BLOCK_SIZE - offset_in_block).min((end - position) as usize);

            let block = inode.find_direct_block(pointer);
            if block == 0 {
                return Err(SfsError::CorruptLayout(format!(
                    "inode {} has no block at pointer {pointer} below its size {}",
                    inode.inode_number, inode.file_size
                )));
            }
            let content = self.read_data_block(block)?;
            buf.extend_from_slice(&content[offset_in_block..offset_in_block + chunk]);
            position += chunk as u64;
        }
        Ok(buf)
    }

    /// write `data` at `offset` block by block,
    /// the inode record is saved after every block
    pub fn write_file(&mut self, inode: &mut Inode, offset: u64, data: &[u8]) -> Result<usize> {
        if !inode.is_regular_file() {
            return Err(SfsError::NotAFile);
        }
        let end = offset.saturating_add(data.len() as u64);
        if end > MAX_FILE_SIZE {
            warn!(
                "write of {} bytes at {offset} to inode {} exceeds {MAX_FILE_SIZE} bytes",
                data.len(),
                inode.inode_number
            );
            return Err(SfsError::FileTooLarge {
                end,
                max: MAX_FILE_SIZE,
            });
        }

        let mut written = 0;
        let mut position = offset;
        while position < end {
            let pointer = (position / BLOCK_SIZE as u64) as usize;
            let offset_in_block = (position % BLOCK_SIZE as u64) as usize;
            let chunk = (BLOCK_SIZE - offset_in_block).min((end - position) as usize);

            let block = self.block_for_write(inode, pointer)?;
            let mut content = if chunk == BLOCK_SIZE {
                vec![0u8; BLOCK_SIZE]
            } else {
                self.read_data_block(block)?
            };
            content[offset_in_block..offset_in_block + chunk]
                .copy_from_slice(&data[written..written + chunk]);
            self.write_data_block(block, &content)?;

            written += chunk;
            position += chunk as u64;
            inode.adjust_size(position);
            self.write_slot(inode)?;
        }
        debug!(
            "wrote {written} bytes at {offset} to inode {}, size now {}",
            inode.inode_number, inode.file_size
        );
        Ok(written)
    }

    /// the block behind `pointer`, allocating it and every unset pointer before it
    fn block_for_write(&mut self, inode: &mut Inode, pointer: usize) -> Result<u32> {
        let block = inode.find_direct_block(pointer);
        if block != 0 {
            return Ok(block);
        }
        for index in 0..=pointer {
            if inode.find_direct_block(index) == 0 {
                let block = self.allocate_data_block()?;
                inode.add_block(block, index)?;
                // keep the bitmap and the record in step
                self.write_slot(inode)?;
            }
        }
        Ok(inode.find_direct_block(pointer))
    }
}
