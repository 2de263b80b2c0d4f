//! fixed 16-byte directory entries packed into a directory's direct blocks
use log::{debug, warn};

use crate::{block_store::BlockStore, utils::fs_size_calculator};

use super::{
    Inode, Result, SfsError, Volume, BLOCK_SIZE, DIRECT_POINTERS, DIR_ENTRY_SIZE, FNAME_MAX,
    NAME_USABLE_MAX,
};

const ENTRIES_PER_BLOCK: u64 = fs_size_calculator::dir_entries_per_block(BLOCK_SIZE);

/// check a name before it reaches a directory block
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty()
        || name.len() > NAME_USABLE_MAX
        || name.contains('/')
        || name.contains('\0')
    {
        return Err(SfsError::InvalidName(name.to_owned()));
    }
    Ok(())
}

/// One name to inode number mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub inode_number: u16,
}

impl DirEntry {
    pub fn new(name: &str, inode_number: u16) -> Result<Self> {
        validate_name(name)?;
        Ok(DirEntry {
            name: name.to_owned(),
            inode_number,
        })
    }

    /// name left-justified and zero-padded to 14 bytes, then the inode number
    pub fn encode(&self) -> [u8; DIR_ENTRY_SIZE] {
        let mut raw = [0u8; DIR_ENTRY_SIZE];
        let name = self.name.as_bytes();
        let len = name.len().min(FNAME_MAX);
        raw[..len].copy_from_slice(&name[..len]);
        raw[FNAME_MAX..].copy_from_slice(&self.inode_number.to_le_bytes());
        raw
    }

    /// `None` for an empty slot, one whose name starts with a zero byte
    pub fn decode(raw: &[u8]) -> Option<Self> {
        let raw = raw.get(..DIR_ENTRY_SIZE)?;
        if raw[0] == 0 {
            return None;
        }
        // a name using all 14 bytes has no terminator
        let name = &raw[..FNAME_MAX];
        let len = name.iter().position(|b| *b == 0).unwrap_or(FNAME_MAX);
        Some(DirEntry {
            name: String::from_utf8_lossy(&name[..len]).into_owned(),
            inode_number: u16::from_le_bytes([raw[FNAME_MAX], raw[FNAME_MAX + 1]]),
        })
    }
}

/// An entry and the cursor it was found at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirSlot {
    /// `direct pointer index * entries per block + slot in block`,
    /// iteration resumes from `position + 1`
    pub position: u64,
    pub entry: DirEntry,
}

/// Lazy walk over the live entries of a directory,
/// in direct pointer order and slot order inside each block.
pub struct DirIter<'a, S> {
    volume: &'a Volume<S>,
    blocks: [u32; DIRECT_POINTERS],
    cursor: u64,
    /// the direct pointer index and content of the block under the cursor
    current: Option<(usize, Vec<u8>)>,
    stop_at_empty_slot: bool,
    done: bool,
}

impl<'a, S: BlockStore> DirIter<'a, S> {
    fn new(volume: &'a Volume<S>, dir: &Inode, cursor: u64, stop_at_empty_slot: bool) -> Self {
        DirIter {
            volume,
            blocks: dir.direct_blocks,
            cursor,
            current: None,
            stop_at_empty_slot,
            done: false,
        }
    }

    /// whether anything sits behind the empty slot at (`pointer`, `slot`)
    fn hides_entries(&self, pointer: usize, slot: usize, block: &[u8]) -> bool {
        block
            .chunks_exact(DIR_ENTRY_SIZE)
            .skip(slot + 1)
            .any(|raw| raw[0] != 0)
            || self.blocks[pointer + 1..].iter().any(|b| *b != 0)
    }
}

impl<'a, S: BlockStore> Iterator for DirIter<'a, S> {
    type Item = Result<DirSlot>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let pointer = (self.cursor / ENTRIES_PER_BLOCK) as usize;
            let slot = (self.cursor % ENTRIES_PER_BLOCK) as usize;
            if pointer >= DIRECT_POINTERS {
                self.done = true;
                break;
            }
            let block = self.blocks[pointer];
            if block == 0 {
                if self.stop_at_empty_slot {
                    self.done = true;
                    break;
                }
                self.cursor = (pointer as u64 + 1) * ENTRIES_PER_BLOCK;
                continue;
            }
            if self.current.as_ref().map(|(p, _)| *p) != Some(pointer) {
                match self.volume.read_data_block(block) {
                    Ok(content) => self.current = Some((pointer, content)),
                    Err(e) => {
                        self.done = true;
                        return Some(Err(e));
                    }
                }
            }
            let Some((_, content)) = self.current.as_ref() else {
                break;
            };

            let position = self.cursor;
            self.cursor += 1;
            let raw = &content[slot * DIR_ENTRY_SIZE..(slot + 1) * DIR_ENTRY_SIZE];
            match DirEntry::decode(raw) {
                Some(entry) => return Some(Ok(DirSlot { position, entry })),
                None if self.stop_at_empty_slot => {
                    if self.hides_entries(pointer, slot, content) {
                        warn!(
                            "directory scan stopped at empty slot {position}, \
                             later entries are unreachable"
                        );
                    }
                    self.done = true;
                }
                None => {}
            }
        }
        None
    }
}

/// directory operations
impl<S: BlockStore> Volume<S> {
    /// iterate `dir` from `cursor`, 0 restarts from the first entry
    pub fn dir_iter(&self, dir: &Inode, cursor: u64) -> Result<DirIter<'_, S>> {
        if !dir.is_dir() {
            return Err(SfsError::NotADirectory);
        }
        Ok(DirIter::new(
            self,
            dir,
            cursor,
            self.options().stop_at_empty_slot,
        ))
    }

    fn dir_find(&self, dir: &Inode, name: &str) -> Result<DirSlot> {
        for slot in self.dir_iter(dir, 0)? {
            let slot = slot?;
            if slot.entry.name == name {
                return Ok(slot);
            }
        }
        Err(SfsError::NotFound)
    }

    /// inode number registered under `name`, the first match wins
    pub fn dir_search(&self, dir: &Inode, name: &str) -> Result<u64> {
        self.dir_find(dir, name)
            .map(|slot| slot.entry.inode_number as u64)
    }

    /// put `name` in the first empty slot of `dir`,
    /// growing the directory by one block when every allocated block is full
    pub fn dir_insert(&mut self, dir: &mut Inode, name: &str, inode_number: u16) -> Result<u64> {
        if !dir.is_dir() {
            return Err(SfsError::NotADirectory);
        }
        let raw = DirEntry::new(name, inode_number)?.encode();

        for (pointer, block) in dir.direct_blocks.iter().copied().enumerate() {
            if block == 0 {
                continue;
            }
            let mut content = self.read_data_block(block)?;
            let free = content
                .chunks_exact(DIR_ENTRY_SIZE)
                .position(|slot| slot[0] == 0);
            if let Some(slot) = free {
                content[slot * DIR_ENTRY_SIZE..(slot + 1) * DIR_ENTRY_SIZE].copy_from_slice(&raw);
                self.write_data_block(block, &content)?;
                debug!("inserted {name:?} in block {block} slot {slot}");
                return Ok(pointer as u64 * ENTRIES_PER_BLOCK + slot as u64);
            }
        }

        let pointer = dir.first_unused_pointer().ok_or(SfsError::DirectoryFull)?;
        let block = self.allocate_data_block()?;
        let mut content = vec![0u8; BLOCK_SIZE];
        content[..DIR_ENTRY_SIZE].copy_from_slice(&raw);
        self.write_data_block(block, &content)?;
        dir.add_block(block, pointer)?;
        dir.adjust_size((pointer as u64 + 1) * BLOCK_SIZE as u64);
        self.write_slot(dir)?;
        debug!(
            "directory {} grew to block {block} at pointer {pointer}",
            dir.inode_number
        );
        Ok(pointer as u64 * ENTRIES_PER_BLOCK)
    }

    /// zero the entry of `name` in place, the block is kept
    pub fn dir_remove(&mut self, dir: &Inode, name: &str) -> Result<()> {
        let DirSlot { position, .. } = self.dir_find(dir, name)?;
        let pointer = (position / ENTRIES_PER_BLOCK) as usize;
        let slot = (position % ENTRIES_PER_BLOCK) as usize;
        let block = dir.find_direct_block(pointer);
        let mut content = self.read_data_block(block)?;
        content[slot * DIR_ENTRY_SIZE..(slot + 1) * DIR_ENTRY_SIZE].fill(0);
        self.write_data_block(block, &content)?;
        debug!("removed {name:?} from block {block} slot {slot}");
        Ok(())
    }

    /// looks at every allocated block, whatever the mount options say
    pub fn dir_is_empty(&self, dir: &Inode) -> Result<bool> {
        if !dir.is_dir() {
            return Err(SfsError::NotADirectory);
        }
        match DirIter::new(self, dir, 0, false).next() {
            None => Ok(true),
            Some(Ok(_)) => Ok(false),
            Some(Err(e)) => Err(e),
        }
    }
}
