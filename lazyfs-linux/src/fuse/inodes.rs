//! Inode numbers for the entries of the mount.

use lazyfs_core::VirtualPath;
use std::collections::HashMap;

/// Inode of the mount root.
pub const ROOT_INO: u64 = fuser::FUSE_ROOT_ID;

/// Bidirectional inode <-> path mapping.
///
/// Inodes are handed out on first sight of a path and stay stable across
/// renames. They are never reused within a mount.
#[derive(Debug)]
pub struct InodeTable {
    paths: HashMap<u64, VirtualPath>,
    inodes: HashMap<VirtualPath, u64>,
    next_ino: u64,
}

impl Default for InodeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl InodeTable {
    pub fn new() -> Self {
        let mut paths = HashMap::new();
        let mut inodes = HashMap::new();
        paths.insert(ROOT_INO, VirtualPath::root());
        inodes.insert(VirtualPath::root(), ROOT_INO);
        Self {
            paths,
            inodes,
            next_ino: ROOT_INO + 1,
        }
    }

    pub fn path(&self, ino: u64) -> Option<&VirtualPath> {
        self.paths.get(&ino)
    }

    /// Inode of `path`, allocating one if the path has none yet.
    pub fn assign(&mut self, path: &VirtualPath) -> u64 {
        if let Some(ino) = self.inodes.get(path) {
            return *ino;
        }

        let ino = self.next_ino;
        self.next_ino += 1;
        self.paths.insert(ino, path.clone());
        self.inodes.insert(path.clone(), ino);
        ino
    }

    /// Moves the inode of `old` to `new`. Any inode `new` had is dropped.
    pub fn rename(&mut self, old: &VirtualPath, new: &VirtualPath) {
        if let Some(replaced) = self.inodes.remove(new) {
            self.paths.remove(&replaced);
        }
        if let Some(ino) = self.inodes.remove(old) {
            self.paths.insert(ino, new.clone());
            self.inodes.insert(new.clone(), ino);
        }
    }

    pub fn forget(&mut self, path: &VirtualPath) {
        if path.is_root() {
            return;
        }
        if let Some(ino) = self.inodes.remove(path) {
            self.paths.remove(&ino);
        }
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_is_preassigned() {
        let table = InodeTable::new();
        assert_eq!(table.path(ROOT_INO), Some(&VirtualPath::root()));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_assign_is_stable() {
        let mut table = InodeTable::new();
        let a = table.assign(&VirtualPath::from("/deadbeef"));
        let b = table.assign(&VirtualPath::from("/x.mhash"));
        assert_ne!(a, b);
        assert_ne!(a, ROOT_INO);
        assert_eq!(table.assign(&VirtualPath::from("/deadbeef")), a);
        assert_eq!(table.path(b).unwrap().as_str(), "/x.mhash");
    }

    #[test]
    fn test_rename_keeps_inode() {
        let mut table = InodeTable::new();
        let a = table.assign(&VirtualPath::from("/a.mhash"));
        let b = table.assign(&VirtualPath::from("/b.mhash"));

        table.rename(&VirtualPath::from("/a.mhash"), &VirtualPath::from("/b.mhash"));
        assert_eq!(table.path(a).unwrap().as_str(), "/b.mhash");
        assert!(table.path(b).is_none());
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_forget() {
        let mut table = InodeTable::new();
        let path = VirtualPath::from("/deadbeef");
        let ino = table.assign(&path);

        table.forget(&path);
        assert!(table.path(ino).is_none());
        // Inodes are not reused
        assert_ne!(table.assign(&path), ino);

        table.forget(&VirtualPath::root());
        assert!(table.path(ROOT_INO).is_some());
    }
}
