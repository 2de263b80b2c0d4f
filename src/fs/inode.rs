use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::utils::traits::OnDiskRecord;

use super::{filekind::FileKind, Result, SfsError, BLOCK_SIZE, DIRECT_POINTERS, INODE_SIZE};

/// An inode record as stored in the inode table.
/// The field order and the two padding words follow the C layout of the record
/// on a 64-bit host, so the table holds 80-byte records.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Inode {
    /// type and permission bits, `st_mode` style
    pub mode: u32,
    mode_padding: u32,
    pub inode_number: u64,
    /// position inside the inode table, always equal to `inode_number`
    pub slot_number: u64,
    /// absolute block numbers, 0 marks an unused pointer
    pub direct_blocks: [u32; DIRECT_POINTERS],
    /// reserved, never populated
    pub indirect_block: u32,
    indirect_padding: u32,
    pub file_size: u64,
}

impl OnDiskRecord for Inode {
    const SIZE: usize = INODE_SIZE;
}

impl Inode {
    pub fn new(index: u64, file_kind: impl Into<FileKind>, permissions: u32) -> Self {
        Inode {
            mode: file_kind.into().mode_bits() | (permissions & 0o7777),
            inode_number: index,
            slot_number: index,
            ..Inode::default()
        }
    }

    /// a zeroed slot decodes to an inode without a type
    pub fn is_free(&self) -> bool {
        self.mode == 0
    }
}

/// This block is about file metadata
impl Inode {
    pub fn file_kind(&self) -> FileKind {
        FileKind::from(self.mode)
    }

    pub fn is_regular_file(&self) -> bool {
        self.file_kind() == FileKind::RegularFile
    }

    pub fn is_dir(&self) -> bool {
        self.file_kind() == FileKind::Directory
    }

    pub fn permissions(&self) -> u32 {
        self.mode & 0o7777
    }
}

/// This block is about the direct block list
impl Inode {
    /// allocated direct blocks, in slot order
    pub fn direct_blocks(&self) -> SmallVec<[u32; DIRECT_POINTERS]> {
        self.direct_blocks
            .iter()
            .copied()
            .filter(|block| *block != 0)
            .collect()
    }

    pub fn find_direct_block(&self, index: usize) -> u32 {
        self.direct_blocks.get(index).copied().unwrap_or(0)
    }

    pub fn first_unused_pointer(&self) -> Option<usize> {
        self.direct_blocks.iter().position(|block| *block == 0)
    }

    pub fn add_block(&mut self, block: u32, index: usize) -> Result<()> {
        let slot = self.direct_blocks.get_mut(index).ok_or_else(|| {
            SfsError::CorruptLayout(format!("direct pointer {index} out of range"))
        })?;
        *slot = block;
        Ok(())
    }

    /// grow the file to at least `len` bytes, a file never shrinks here
    pub fn adjust_size(&mut self, len: u64) {
        self.file_size = self.file_size.max(len);
    }

    pub fn block_count(&self) -> u64 {
        self.file_size.div_ceil(BLOCK_SIZE as u64)
    }
}
