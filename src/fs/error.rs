use thiserror::Error;

use super::NAME_USABLE_MAX;

type Errno = i32;

/// Errors surfaced by the storage engine
#[derive(Debug, Error)]
pub enum SfsError {
    /// bad magic, block size or layout at mount (or format) time
    #[error("invalid volume: {0}")]
    Validation(String),

    /// a bitmap has no free bit left
    #[error("no space left in the {0}")]
    NoSpace(&'static str),

    /// no free entry slot and no free direct pointer in a directory
    #[error("directory is full")]
    DirectoryFull,

    /// a write would end past the direct-block cap
    #[error("write ending at byte {end} exceeds the maximum file size of {max} bytes")]
    FileTooLarge { end: u64, max: u64 },

    #[error("no such file or directory")]
    NotFound,

    #[error("not a directory")]
    NotADirectory,

    #[error("not a regular file")]
    NotAFile,

    /// structural inconsistency found on disk
    #[error("corrupt layout: {0}")]
    CorruptLayout(String),

    /// bitmap index past the bitmap's capacity
    #[error("bitmap index {index} out of range (capacity {capacity})")]
    OutOfRange { index: u64, capacity: u64 },

    #[error("entry already exists")]
    AlreadyExists,

    #[error("directory not empty")]
    NotEmpty,

    #[error("invalid file name: {0:?}")]
    InvalidName(String),

    /// an on-disk record could not be encoded or decoded
    #[error("record codec error: {0}")]
    Codec(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("volume lock poisoned")]
    LockPoisoned,
}

pub type Result<T> = std::result::Result<T, SfsError>;

impl SfsError {
    /// the errno a VFS layer should report for this error
    pub fn errno(&self) -> Errno {
        match self {
            SfsError::Validation(_) => libc::EINVAL,
            SfsError::NoSpace(_) | SfsError::DirectoryFull => libc::ENOSPC,
            SfsError::FileTooLarge { .. } => libc::EFBIG,
            SfsError::NotFound => libc::ENOENT,
            SfsError::NotADirectory => libc::ENOTDIR,
            SfsError::NotAFile => libc::EISDIR,
            SfsError::OutOfRange { .. } => libc::EINVAL,
            SfsError::AlreadyExists => libc::EEXIST,
            SfsError::NotEmpty => libc::ENOTEMPTY,
            SfsError::InvalidName(name) if name.len() > NAME_USABLE_MAX => libc::ENAMETOOLONG,
            SfsError::InvalidName(_) => libc::EINVAL,
            SfsError::CorruptLayout(_)
            | SfsError::Codec(_)
            | SfsError::Io(_)
            | SfsError::LockPoisoned => libc::EIO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errno_mapping() {
        assert_eq!(SfsError::NoSpace("inode bitmap").errno(), libc::ENOSPC);
        assert_eq!(SfsError::DirectoryFull.errno(), libc::ENOSPC);
        assert_eq!(
            SfsError::FileTooLarge { end: 1, max: 0 }.errno(),
            libc::EFBIG
        );
        assert_eq!(SfsError::NotFound.errno(), libc::ENOENT);
        assert_eq!(SfsError::CorruptLayout("hole".into()).errno(), libc::EIO);
    }

    #[test]
    fn test_name_errno_depends_on_length() {
        assert_eq!(
            SfsError::InvalidName("a_very_long_name".into()).errno(),
            libc::ENAMETOOLONG
        );
        assert_eq!(SfsError::InvalidName("a/b".into()).errno(), libc::EINVAL);
    }
}
