/// Runtime behavior switches chosen at mount time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MountOptions {
    /// stop directory search and iteration at the first zeroed entry,
    /// even when later direct blocks still hold entries
    pub stop_at_empty_slot: bool,
    /// clear the inode bit and the data block bits of a removed entry
    pub reclaim_on_remove: bool,
}

impl Default for MountOptions {
    fn default() -> Self {
        Self {
            stop_at_empty_slot: false,
            reclaim_on_remove: true,
        }
    }
}

impl MountOptions {
    /// behave exactly like volumes written by the first sfs driver:
    /// directory scans end at the first hole and removal never frees bitmap bits
    pub fn legacy() -> Self {
        Self {
            stop_at_empty_slot: true,
            reclaim_on_remove: false,
        }
    }
}
