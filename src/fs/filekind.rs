use serde::{Deserialize, Serialize};

/// an enum to describe the type of a file
#[derive(Serialize, Deserialize, Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum FileKind {
    /// an regular file
    RegularFile,
    /// a directory
    Directory,
    /// a free slot, or a mode sfs doesn't support
    #[default]
    Unknown,
}

impl FileKind {
    /// the `S_IFMT` bits for this kind
    pub fn mode_bits(self) -> u32 {
        match self {
            FileKind::RegularFile => libc::S_IFREG as u32,
            FileKind::Directory => libc::S_IFDIR as u32,
            FileKind::Unknown => 0,
        }
    }
}

/// classify a `st_mode`-style value
impl From<u32> for FileKind {
    fn from(mode: u32) -> Self {
        match mode & libc::S_IFMT as u32 {
            m if m == libc::S_IFREG as u32 => FileKind::RegularFile,
            m if m == libc::S_IFDIR as u32 => FileKind::Directory,
            _ => FileKind::Unknown,
        }
    }
}
