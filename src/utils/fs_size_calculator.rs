//! This module contains functions to calculate the size of different fs components

use crate::fs::{DATA_START_BLOCK, DIR_ENTRY_SIZE, INODE_SIZE};

/// calculate how many items one bitmap block can track
/// # Arguments
/// - `block_size`: the size of a block
/// # Example
/// ```
/// use sfs::utils::fs_size_calculator::bitmap_capacity;
/// assert_eq!(bitmap_capacity(4096), 32768);
/// ```
pub const fn bitmap_capacity(block_size: usize) -> u64 {
    block_size as u64 * 8
}

/// calculate how many inode records fit in the single inode table block
/// # Example
/// ```
/// use sfs::utils::fs_size_calculator::inode_table_slots;
/// assert_eq!(inode_table_slots(4096), 51);
/// ```
pub const fn inode_table_slots(block_size: usize) -> u64 {
    (block_size / INODE_SIZE) as u64
}

/// calculate how many directory entries fit in one data block
/// # Example
/// ```
/// use sfs::utils::fs_size_calculator::dir_entries_per_block;
/// assert_eq!(dir_entries_per_block(4096), 256);
/// ```
pub const fn dir_entries_per_block(block_size: usize) -> u64 {
    (block_size / DIR_ENTRY_SIZE) as u64
}

/// calculate the image size for a volume with `data_blocks` data blocks
/// # Return
/// boot block, superblock, both bitmaps and the inode table, plus the data region
/// # Example
/// ```
/// use sfs::utils::fs_size_calculator::image_size;
/// assert_eq!(image_size(4096, 100), 105 * 4096);
/// ```
pub const fn image_size(block_size: usize, data_blocks: u64) -> u64 {
    (DATA_START_BLOCK + data_blocks) * block_size as u64
}
