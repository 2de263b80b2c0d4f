//! the operations exposed to VFS glue and to the cli,
//! every call runs under the volume lock and flushes the store before returning
use std::sync::Mutex;

use log::{debug, info};

use crate::block_store::BlockStore;

use super::{
    validate_name, DirSlot, FileKind, Inode, InodeOps, MountOptions, Result, SfsError, Volume,
    BLOCK_SIZE, NAME_USABLE_MAX, ROOT_INODE,
};

/// What `getattr` and `lookup` report about an inode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InodeAttr {
    pub ino: u64,
    pub kind: FileKind,
    pub perm: u16,
    pub size: u64,
    /// data blocks covered by `size`
    pub blocks: u64,
    pub block_size: u32,
}

impl From<&Inode> for InodeAttr {
    fn from(inode: &Inode) -> Self {
        InodeAttr {
            ino: inode.inode_number,
            kind: inode.file_kind(),
            perm: inode.permissions() as u16,
            size: inode.file_size,
            blocks: inode.block_count(),
            block_size: BLOCK_SIZE as u32,
        }
    }
}

/// Volume usage, as `statfs` reports it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatFs {
    pub block_size: u32,
    pub total_blocks: u64,
    pub free_blocks: u64,
    pub total_inodes: u64,
    pub free_inodes: u64,
    pub name_max: u32,
}

/// create and remove entries
impl<S: BlockStore> Volume<S> {
    /// allocate an inode for `name`, initialize it and link it into `parent`
    pub fn create_entry(
        &mut self,
        parent: &mut Inode,
        name: &str,
        kind: FileKind,
        permissions: u32,
    ) -> Result<Inode> {
        validate_name(name)?;
        if !parent.is_dir() {
            return Err(SfsError::NotADirectory);
        }
        match self.dir_search(parent, name) {
            Ok(_) => return Err(SfsError::AlreadyExists),
            Err(SfsError::NotFound) => {}
            Err(e) => return Err(e),
        }

        let ino = self.next_free_inode_number()?;
        let entry_number = u16::try_from(ino)
            .map_err(|_| SfsError::CorruptLayout(format!("inode number {ino} too large")))?;
        let mut inode = Inode::new(ino, kind, permissions);
        if kind == FileKind::Directory {
            let block = self.allocate_data_block()?;
            inode.add_block(block, 0)?;
            inode.file_size = BLOCK_SIZE as u64;
        }
        self.set_bit(self.superblock().inode_bitmap_block, ino)?;
        self.write_slot(&inode)?;

        if let Err(e) = self.dir_insert(parent, name, entry_number) {
            debug!("linking {name:?} failed, releasing inode {ino}");
            self.discard_inode(&inode)?;
            return Err(e);
        }
        Ok(inode)
    }

    /// unlink `name` from `parent` and destroy `target`
    pub fn remove_entry(&mut self, parent: &Inode, target: &Inode, name: &str) -> Result<()> {
        self.dir_remove(parent, name)?;
        let reclaim = self.options().reclaim_on_remove;
        for block in target.direct_blocks() {
            self.zero_data_block(block)?;
            if reclaim {
                self.release_data_block(block)?;
            }
        }
        self.zero_slot(target.slot_number)?;
        if reclaim {
            self.clear_bit(self.superblock().inode_bitmap_block, target.inode_number)?;
        } else {
            debug!("inode {} stays marked in use", target.inode_number);
        }
        Ok(())
    }

    fn discard_inode(&mut self, inode: &Inode) -> Result<()> {
        for block in inode.direct_blocks() {
            self.release_data_block(block)?;
        }
        self.zero_slot(inode.slot_number)?;
        self.clear_bit(self.superblock().inode_bitmap_block, inode.inode_number)
    }

    fn find_dir(&self, ino: u64) -> Result<Inode> {
        let inode = self.find_inode(ino)?;
        if !inode.is_dir() {
            return Err(SfsError::NotADirectory);
        }
        Ok(inode)
    }
}

/// A mounted sfs volume shared between callers
#[derive(Debug)]
pub struct Sfs<S> {
    volume: Mutex<Volume<S>>,
}

impl<S: BlockStore> Sfs<S> {
    pub fn mount(store: S, options: MountOptions) -> Result<Self> {
        Ok(Sfs {
            volume: Mutex::new(Volume::mount(store, options)?),
        })
    }

    /// flush and hand the store back
    pub fn unmount(self) -> Result<S> {
        self.volume
            .into_inner()
            .map_err(|_| SfsError::LockPoisoned)?
            .into_store()
    }

    /// run `f` with exclusive access to the volume, the store is flushed on every path out
    fn with_volume<T>(&self, f: impl FnOnce(&mut Volume<S>) -> Result<T>) -> Result<T> {
        let mut volume = self.volume.lock().map_err(|_| SfsError::LockPoisoned)?;
        let result = f(&mut volume);
        let flushed = volume.flush();
        let value = result?;
        flushed?;
        Ok(value)
    }

    #[inline]
    pub fn root(&self) -> u64 {
        ROOT_INODE
    }

    /// the raw inode record
    pub fn inode(&self, ino: u64) -> Result<Inode> {
        self.with_volume(|volume| volume.find_inode(ino))
    }

    pub fn getattr(&self, ino: u64) -> Result<InodeAttr> {
        self.inode(ino).map(|inode| InodeAttr::from(&inode))
    }

    pub fn lookup(&self, parent: u64, name: &str) -> Result<InodeAttr> {
        self.with_volume(|volume| {
            let parent = volume.find_dir(parent)?;
            let ino = volume.dir_search(&parent, name)?;
            Ok(InodeAttr::from(&volume.find_inode(ino)?))
        })
    }

    /// walk an absolute path from the root directory
    pub fn resolve(&self, path: &str) -> Result<InodeAttr> {
        let components = split_path(path)?;
        self.with_volume(|volume| {
            let mut inode = volume.find_inode(ROOT_INODE)?;
            for name in components {
                if !inode.is_dir() {
                    return Err(SfsError::NotADirectory);
                }
                let ino = volume.dir_search(&inode, name)?;
                inode = volume.find_inode(ino)?;
            }
            Ok(InodeAttr::from(&inode))
        })
    }

    /// create a regular file
    pub fn create(&self, parent: u64, name: &str, permissions: u32) -> Result<InodeAttr> {
        self.make_node(parent, name, FileKind::RegularFile, permissions)
    }

    pub fn mkdir(&self, parent: u64, name: &str, permissions: u32) -> Result<InodeAttr> {
        self.make_node(parent, name, FileKind::Directory, permissions)
    }

    fn make_node(
        &self,
        parent: u64,
        name: &str,
        kind: FileKind,
        permissions: u32,
    ) -> Result<InodeAttr> {
        let inode = self.with_volume(|volume| {
            let mut parent = volume.find_dir(parent)?;
            volume.create_entry(&mut parent, name, kind, permissions)
        })?;
        info!(
            "created {kind:?} {name:?} as inode {} under {parent}",
            inode.inode_number
        );
        Ok(InodeAttr::from(&inode))
    }

    /// remove a regular file
    pub fn unlink(&self, parent: u64, name: &str) -> Result<()> {
        self.with_volume(|volume| {
            let parent = volume.find_dir(parent)?;
            let target = volume.find_inode(volume.dir_search(&parent, name)?)?;
            if !target.is_regular_file() {
                return Err(SfsError::NotAFile);
            }
            volume.remove_entry(&parent, &target, name)
        })?;
        info!("removed file {name:?} from {parent}");
        Ok(())
    }

    /// remove an empty directory
    pub fn rmdir(&self, parent: u64, name: &str) -> Result<()> {
        self.with_volume(|volume| {
            let parent = volume.find_dir(parent)?;
            let target = volume.find_inode(volume.dir_search(&parent, name)?)?;
            if !target.is_dir() {
                return Err(SfsError::NotADirectory);
            }
            if !volume.dir_is_empty(&target)? {
                return Err(SfsError::NotEmpty);
            }
            volume.remove_entry(&parent, &target, name)
        })?;
        info!("removed directory {name:?} from {parent}");
        Ok(())
    }

    pub fn read(&self, ino: u64, offset: u64, len: usize) -> Result<Vec<u8>> {
        self.with_volume(|volume| {
            let inode = volume.find_inode(ino)?;
            volume.read_file(&inode, offset, len)
        })
    }

    pub fn write(&self, ino: u64, offset: u64, data: &[u8]) -> Result<usize> {
        self.with_volume(|volume| {
            let mut inode = volume.find_inode(ino)?;
            volume.write_file(&mut inode, offset, data)
        })
    }

    /// entries of `ino` from `cursor` on, resume with the last `position + 1`
    pub fn readdir(&self, ino: u64, cursor: u64) -> Result<Vec<DirSlot>> {
        self.with_volume(|volume| {
            let dir = volume.find_dir(ino)?;
            volume.dir_iter(&dir, cursor)?.collect()
        })
    }

    pub fn statfs(&self) -> Result<StatFs> {
        self.with_volume(|volume| {
            let (free_blocks, total_blocks) = volume.data_block_usage()?;
            let (free_inodes, total_inodes) = volume.inode_usage()?;
            Ok(StatFs {
                block_size: BLOCK_SIZE as u32,
                total_blocks,
                free_blocks,
                total_inodes,
                free_inodes,
                name_max: NAME_USABLE_MAX as u32,
            })
        })
    }

    pub fn sync(&self) -> Result<()> {
        self.with_volume(|_| Ok(()))
    }

    /// the operations valid for the type of `ino`
    pub fn ops(&self, ino: u64) -> Result<InodeOps<'_, S>> {
        let inode = self.inode(ino)?;
        InodeOps::new(self, &inode)
    }
}

/// the names along an absolute path, empty for the root
fn split_path(path: &str) -> Result<Vec<&str>> {
    let Some(relative) = path.strip_prefix('/') else {
        return Err(SfsError::InvalidName(path.to_owned()));
    };
    Ok(relative.split('/').filter(|c| !c.is_empty()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        block_store::MemBlockStore,
        fs::DATA_START_BLOCK,
        mkfs::{format, FormatOptions},
    };

    fn mounted(data_blocks: u64, options: MountOptions) -> Sfs<MemBlockStore> {
        let mut store = MemBlockStore::new(DATA_START_BLOCK + data_blocks, BLOCK_SIZE);
        format(&mut store, &FormatOptions { data_blocks }).unwrap();
        Sfs::mount(store, options).unwrap()
    }

    #[test]
    fn test_split_path() {
        assert!(split_path("/").unwrap().is_empty());
        assert_eq!(split_path("/a//b/").unwrap(), vec!["a", "b"]);
        assert!(matches!(
            split_path("a/b"),
            Err(SfsError::InvalidName(_))
        ));
    }

    #[test]
    fn test_create_and_lookup() {
        let fs = mounted(20, MountOptions::default());
        let attr = fs.create(fs.root(), "f", 0o644).unwrap();
        assert_eq!(attr.ino, 1);
        assert_eq!(attr.kind, FileKind::RegularFile);
        assert_eq!(attr.perm, 0o644);
        assert_eq!(attr.size, 0);
        assert_eq!(fs.lookup(fs.root(), "f").unwrap(), attr);
        assert_eq!(fs.getattr(1).unwrap(), attr);

        assert!(matches!(
            fs.create(fs.root(), "f", 0o644),
            Err(SfsError::AlreadyExists)
        ));
        assert!(matches!(
            fs.lookup(fs.root(), "g"),
            Err(SfsError::NotFound)
        ));
        assert!(matches!(
            fs.create(fs.root(), "far_too_long_name", 0o644),
            Err(SfsError::InvalidName(_))
        ));
    }

    #[test]
    fn test_mkdir_and_resolve() {
        let fs = mounted(20, MountOptions::default());
        let dir = fs.mkdir(fs.root(), "docs", 0o755).unwrap();
        assert_eq!(dir.kind, FileKind::Directory);
        assert_eq!(dir.size, BLOCK_SIZE as u64);
        let file = fs.create(dir.ino, "a.txt", 0o600).unwrap();

        assert_eq!(fs.resolve("/").unwrap().ino, ROOT_INODE);
        assert_eq!(fs.resolve("/docs").unwrap(), dir);
        assert_eq!(fs.resolve("/docs/a.txt").unwrap(), file);
        assert!(matches!(
            fs.resolve("/docs/a.txt/x"),
            Err(SfsError::NotADirectory)
        ));
        assert!(matches!(
            fs.create(file.ino, "x", 0o644),
            Err(SfsError::NotADirectory)
        ));
    }

    #[test]
    fn test_unlink_and_rmdir_check_types() {
        let fs = mounted(20, MountOptions::default());
        let dir = fs.mkdir(fs.root(), "d", 0o755).unwrap();
        fs.create(fs.root(), "f", 0o644).unwrap();
        fs.create(dir.ino, "inner", 0o644).unwrap();

        assert!(matches!(fs.unlink(fs.root(), "d"), Err(SfsError::NotAFile)));
        assert!(matches!(
            fs.rmdir(fs.root(), "f"),
            Err(SfsError::NotADirectory)
        ));
        assert!(matches!(fs.rmdir(fs.root(), "d"), Err(SfsError::NotEmpty)));

        fs.unlink(dir.ino, "inner").unwrap();
        fs.rmdir(fs.root(), "d").unwrap();
        fs.unlink(fs.root(), "f").unwrap();
        assert!(fs.readdir(fs.root(), 0).unwrap().is_empty());
        assert!(matches!(fs.getattr(dir.ino), Err(SfsError::NotFound)));
    }

    #[test]
    fn test_remove_reclaims_bits() {
        let fs = mounted(20, MountOptions::default());
        let before = fs.statfs().unwrap();
        let file = fs.create(fs.root(), "f", 0o644).unwrap();
        fs.write(file.ino, 0, &[1u8; 5000]).unwrap();
        let used = fs.statfs().unwrap();
        assert_eq!(used.free_inodes, before.free_inodes - 1);
        assert_eq!(used.free_blocks, before.free_blocks - 2);

        fs.unlink(fs.root(), "f").unwrap();
        assert_eq!(fs.statfs().unwrap(), before);
        // the inode number is handed out again
        assert_eq!(fs.create(fs.root(), "g", 0o644).unwrap().ino, file.ino);
    }

    #[test]
    fn test_legacy_remove_leaks_bits() {
        let fs = mounted(20, MountOptions::legacy());
        let file = fs.create(fs.root(), "f", 0o644).unwrap();
        fs.write(file.ino, 0, b"data").unwrap();
        let used = fs.statfs().unwrap();

        fs.unlink(fs.root(), "f").unwrap();
        assert_eq!(fs.statfs().unwrap(), used);
        assert!(matches!(fs.getattr(file.ino), Err(SfsError::NotFound)));
        assert_ne!(fs.create(fs.root(), "g", 0o644).unwrap().ino, file.ino);
    }

    #[test]
    fn test_statfs_of_fresh_volume() {
        let fs = mounted(100, MountOptions::default());
        let statfs = fs.statfs().unwrap();
        assert_eq!(statfs.block_size, BLOCK_SIZE as u32);
        assert_eq!(statfs.total_blocks, 100);
        // the root directory holds the first data block
        assert_eq!(statfs.free_blocks, 99);
        assert_eq!(statfs.total_inodes, 51);
        assert_eq!(statfs.free_inodes, 50);
        assert_eq!(statfs.name_max, 12);
    }

    #[test]
    fn test_inode_table_exhaustion() {
        let fs = mounted(20, MountOptions::default());
        for i in 1..51 {
            fs.create(fs.root(), &format!("f{i}"), 0o644).unwrap();
        }
        assert!(matches!(
            fs.create(fs.root(), "last", 0o644),
            Err(SfsError::NoSpace("inode bitmap"))
        ));
    }

    #[test]
    fn test_failed_mkdir_leaves_no_trace() {
        // the root block is the only data block, a directory can't get its own
        let fs = mounted(1, MountOptions::default());
        let before = fs.statfs().unwrap();
        assert!(matches!(
            fs.mkdir(fs.root(), "d", 0o755),
            Err(SfsError::NoSpace("block bitmap"))
        ));
        assert_eq!(fs.statfs().unwrap(), before);
    }

    #[test]
    fn test_concurrent_creates_get_distinct_inodes() {
        let fs = mounted(20, MountOptions::default());
        let mut inos: Vec<u64> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|t| {
                    let fs = &fs;
                    scope.spawn(move || {
                        (0..5)
                            .map(|i| fs.create(fs.root(), &format!("t{t}_{i}"), 0o644).unwrap().ino)
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap())
                .collect()
        });
        inos.sort_unstable();
        inos.dedup();
        assert_eq!(inos.len(), 40);
        assert_eq!(fs.readdir(fs.root(), 0).unwrap().len(), 40);
    }

    #[test]
    fn test_unmount_returns_a_mountable_store() {
        let fs = mounted(20, MountOptions::default());
        let file = fs.create(fs.root(), "keep", 0o644).unwrap();
        fs.write(file.ino, 0, b"persisted").unwrap();
        let store = fs.unmount().unwrap();

        let fs = Sfs::mount(store, MountOptions::default()).unwrap();
        let attr = fs.resolve("/keep").unwrap();
        assert_eq!(fs.read(attr.ino, 0, 64).unwrap(), b"persisted");
    }
}
