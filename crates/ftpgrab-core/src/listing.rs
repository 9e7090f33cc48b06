//! Directory listing presentation.

use ftpgrab_ftp::{FtpEntry, FtpEntryKind};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    Link,
    File,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub name: String,
    pub kind: EntryKind,
    pub size: u64,
}

impl DirectoryEntry {
    pub fn new(name: impl Into<String>, kind: EntryKind, size: u64) -> Self {
        Self {
            name: name.into(),
            kind,
            size,
        }
    }
}

impl From<FtpEntry> for DirectoryEntry {
    fn from(entry: FtpEntry) -> Self {
        let kind = match entry.kind {
            FtpEntryKind::Directory => EntryKind::Directory,
            FtpEntryKind::Symlink => EntryKind::Link,
            // Devices, sockets and unparsed lines print like files.
            FtpEntryKind::File | FtpEntryKind::Unknown => EntryKind::File,
        };
        Self {
            name: entry.name,
            kind,
            size: entry.size,
        }
    }
}

/// `name/` for directories, `name` for links, right-aligned size then name for files.
impl fmt::Display for DirectoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            EntryKind::Directory => write!(f, "{}/", self.name),
            EntryKind::Link => write!(f, "{}", self.name),
            EntryKind::File => write!(f, "{:>16}  {}", self.size, self.name),
        }
    }
}

/// Stable partition: directories, then links, then files.
pub fn order_entries(entries: Vec<DirectoryEntry>) -> Vec<DirectoryEntry> {
    let mut ordered = entries;
    ordered.sort_by_key(|e| match e.kind {
        EntryKind::Directory => 0,
        EntryKind::Link => 1,
        EntryKind::File => 2,
    });
    ordered
}
