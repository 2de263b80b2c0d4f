//! per inode type operation tables
use crate::block_store::BlockStore;

use super::{DirSlot, FileKind, Inode, InodeAttr, Result, Sfs, SfsError};

/// Operations valid on a regular file
#[derive(Debug)]
pub struct RegularFileOps<'a, S> {
    fs: &'a Sfs<S>,
    ino: u64,
}

impl<'a, S: BlockStore> RegularFileOps<'a, S> {
    pub fn read(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        self.fs.read(self.ino, offset, len)
    }

    pub fn write(&self, offset: u64, data: &[u8]) -> Result<usize> {
        self.fs.write(self.ino, offset, data)
    }

    pub fn getattr(&self) -> Result<InodeAttr> {
        self.fs.getattr(self.ino)
    }
}

/// Operations valid on a directory
#[derive(Debug)]
pub struct DirectoryOps<'a, S> {
    fs: &'a Sfs<S>,
    ino: u64,
}

impl<'a, S: BlockStore> DirectoryOps<'a, S> {
    pub fn lookup(&self, name: &str) -> Result<InodeAttr> {
        self.fs.lookup(self.ino, name)
    }

    pub fn create(&self, name: &str, permissions: u32) -> Result<InodeAttr> {
        self.fs.create(self.ino, name, permissions)
    }

    pub fn mkdir(&self, name: &str, permissions: u32) -> Result<InodeAttr> {
        self.fs.mkdir(self.ino, name, permissions)
    }

    pub fn unlink(&self, name: &str) -> Result<()> {
        self.fs.unlink(self.ino, name)
    }

    pub fn rmdir(&self, name: &str) -> Result<()> {
        self.fs.rmdir(self.ino, name)
    }

    pub fn readdir(&self, cursor: u64) -> Result<Vec<DirSlot>> {
        self.fs.readdir(self.ino, cursor)
    }

    pub fn getattr(&self) -> Result<InodeAttr> {
        self.fs.getattr(self.ino)
    }
}

/// The operation table picked by inode type
#[derive(Debug)]
pub enum InodeOps<'a, S> {
    RegularFile(RegularFileOps<'a, S>),
    Directory(DirectoryOps<'a, S>),
}

impl<'a, S: BlockStore> InodeOps<'a, S> {
    pub(crate) fn new(fs: &'a Sfs<S>, inode: &Inode) -> Result<Self> {
        let ino = inode.inode_number;
        match inode.file_kind() {
            FileKind::RegularFile => Ok(InodeOps::RegularFile(RegularFileOps { fs, ino })),
            FileKind::Directory => Ok(InodeOps::Directory(DirectoryOps { fs, ino })),
            FileKind::Unknown => Err(SfsError::CorruptLayout(format!(
                "inode {ino} has unsupported mode {:#o}",
                inode.mode
            ))),
        }
    }

    pub fn ino(&self) -> u64 {
        match self {
            InodeOps::RegularFile(ops) => ops.ino,
            InodeOps::Directory(ops) => ops.ino,
        }
    }

    pub fn kind(&self) -> FileKind {
        match self {
            InodeOps::RegularFile(_) => FileKind::RegularFile,
            InodeOps::Directory(_) => FileKind::Directory,
        }
    }

    pub fn as_file(&self) -> Result<&RegularFileOps<'a, S>> {
        match self {
            InodeOps::RegularFile(ops) => Ok(ops),
            InodeOps::Directory(_) => Err(SfsError::NotAFile),
        }
    }

    pub fn as_dir(&self) -> Result<&DirectoryOps<'a, S>> {
        match self {
            InodeOps::Directory(ops) => Ok(ops),
            InodeOps::RegularFile(_) => Err(SfsError::NotADirectory),
        }
    }
}
