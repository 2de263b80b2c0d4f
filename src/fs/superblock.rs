use log::warn;
use serde::{Deserialize, Serialize};

use crate::utils::traits::OnDiskRecord;

use super::{
    Result, SfsError, BLOCK_BITMAP_BLOCK, BLOCK_SIZE, DATA_START_BLOCK, INODE_BITMAP_BLOCK,
    INODE_TABLE_BLOCK, SFS_MAGIC, SFS_VERSION,
};

/// The superblock of this filesystem, stored at the start of block 1
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SuperBlock {
    /// magic number
    pub magic: u64,
    pub version: u64,
    /// block size in bytes
    pub block_size: u64,
    pub inode_bitmap_block: u64,
    pub block_bitmap_block: u64,
    pub inode_table_block: u64,
    /// first block of the data region
    pub data_start_block: u64,
}

impl OnDiskRecord for SuperBlock {
    const SIZE: usize = 7 * std::mem::size_of::<u64>();
}

impl Default for SuperBlock {
    fn default() -> Self {
        Self::new()
    }
}

impl SuperBlock {
    pub fn new() -> Self {
        Self {
            magic: SFS_MAGIC,
            version: SFS_VERSION,
            block_size: BLOCK_SIZE as u64,
            inode_bitmap_block: INODE_BITMAP_BLOCK,
            block_bitmap_block: BLOCK_BITMAP_BLOCK,
            inode_table_block: INODE_TABLE_BLOCK,
            data_start_block: DATA_START_BLOCK,
        }
    }

    /// check the superblock read from a volume of `block_count` blocks
    pub fn validate(&self, block_count: u64) -> Result<()> {
        if self.magic != SFS_MAGIC {
            warn!("bad magic number {:#x}", self.magic);
            return Err(SfsError::Validation(format!(
                "bad magic number {:#x}, expected {SFS_MAGIC:#x}",
                self.magic
            )));
        }
        if self.block_size != BLOCK_SIZE as u64 {
            warn!("unsupported block size {}", self.block_size);
            return Err(SfsError::Validation(format!(
                "unsupported block size {}, expected {BLOCK_SIZE}",
                self.block_size
            )));
        }
        if self.version != SFS_VERSION {
            warn!("volume version {} differs from {SFS_VERSION}", self.version);
        }
        let metadata = [
            self.inode_bitmap_block,
            self.block_bitmap_block,
            self.inode_table_block,
        ];
        if let Some(block) = metadata
            .iter()
            .chain(std::iter::once(&self.data_start_block))
            .find(|b| **b == 0 || **b >= block_count)
        {
            return Err(SfsError::Validation(format!(
                "layout block {block} outside a volume of {block_count} blocks"
            )));
        }
        if metadata.iter().any(|b| *b >= self.data_start_block) {
            return Err(SfsError::Validation(
                "metadata blocks overlap the data region".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_superblock_encoding_is_fixed_size() {
        let sb = SuperBlock::new();
        let raw = sb.encode_record().unwrap();
        assert_eq!(raw.len(), SuperBlock::SIZE);
        assert_eq!(&raw[..8], &SFS_MAGIC.to_le_bytes());
        assert_eq!(SuperBlock::decode_record(&raw).unwrap(), sb);
    }

    #[test]
    fn test_validate() {
        assert!(SuperBlock::new().validate(105).is_ok());

        let bad_magic = SuperBlock {
            magic: 0xdead_beef,
            ..SuperBlock::new()
        };
        assert!(matches!(
            bad_magic.validate(105),
            Err(SfsError::Validation(_))
        ));

        let bad_block_size = SuperBlock {
            block_size: 1024,
            ..SuperBlock::new()
        };
        assert!(matches!(
            bad_block_size.validate(105),
            Err(SfsError::Validation(_))
        ));

        // the data region must exist on the volume
        assert!(matches!(
            SuperBlock::new().validate(5),
            Err(SfsError::Validation(_))
        ));
    }

    #[test]
    fn test_other_version_still_mounts() {
        let sb = SuperBlock {
            version: 7,
            ..SuperBlock::new()
        };
        assert!(sb.validate(105).is_ok());
    }
}
