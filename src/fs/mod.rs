//! the silver filesystem(sfs) storage engine
//!
//! Layout of a volume, one block each except the data region:
//!  +--------+----+----------+----------+-----------+------------+
//!  |boot blk| sb |ino_bitmap|blk_bitmap|inode table|data blks...|
//!  +--------+----+----------+----------+-----------+------------+
//!
//! Direct block pointers hold absolute block numbers, and the block bitmap
//! is indexed by absolute block number as well.
pub mod bitmap;
pub mod directory;
mod error;
mod file_io;
pub mod filekind;
mod fs_api_impl;
pub mod fs_layout;
pub mod inode;
mod ops;
mod options;
pub mod superblock;
pub use bitmap::*;
pub use directory::*;
pub use error::*;
pub use filekind::*;
pub use fs_api_impl::*;
pub use fs_layout::*;
pub use inode::*;
pub use ops::*;
pub use options::*;
pub use superblock::*;

pub const SFS_MAGIC: u64 = 0x1945_1001;
pub const SFS_VERSION: u64 = 1;
/// the only block size sfs supports
pub const BLOCK_SIZE: usize = 4096;

pub const SUPERBLOCK_BLOCK: u64 = 1;
pub const INODE_BITMAP_BLOCK: u64 = 2;
pub const BLOCK_BITMAP_BLOCK: u64 = 3;
pub const INODE_TABLE_BLOCK: u64 = 4;
pub const DATA_START_BLOCK: u64 = 5;

pub const ROOT_INODE: u64 = 0;
pub const ROOT_SLOT: u64 = 0;

pub const DIRECT_POINTERS: usize = 10;
/// on-disk size of an [Inode] record
pub const INODE_SIZE: usize = 80;
/// bytes reserved for a name inside a directory entry
pub const FNAME_MAX: usize = 14;
/// longest name a caller may create
pub const NAME_USABLE_MAX: usize = FNAME_MAX - 2;
pub const DIR_ENTRY_SIZE: usize = FNAME_MAX + 2;
pub const MAX_FILE_SIZE: u64 = (DIRECT_POINTERS * BLOCK_SIZE) as u64;
