//! Forwarding of metadata files to the real backing directory.

use crate::directory::BackingHandle;
use crate::error::{LazyError, Result};
use crate::types::{FileAttributes, VirtualPath, MAX_NAME_LEN};
use bytes::Bytes;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::os::fd::IntoRawFd;
use std::os::unix::fs::{FileExt, OpenOptionsExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Longest real path the adapter will build.
pub const MAX_REAL_PATH_LEN: usize = libc::PATH_MAX as usize;

/// Maps virtual paths onto files directly inside one real directory.
#[derive(Debug, Clone)]
pub struct DelegationAdapter {
    backing_dir: PathBuf,
}

impl DelegationAdapter {
    pub fn new(backing_dir: impl Into<PathBuf>) -> Self {
        Self {
            backing_dir: backing_dir.into(),
        }
    }

    pub fn backing_dir(&self) -> &Path {
        &self.backing_dir
    }

    /// Real location of `path`: the backing directory joined with the
    /// path's final component.
    pub fn real_path(&self, path: &VirtualPath) -> Result<PathBuf> {
        let name = path.name();
        if name.is_empty() || name == "." || name == ".." {
            return Err(LazyError::invalid(path, "not a file name"));
        }
        if name.len() > MAX_NAME_LEN {
            return Err(LazyError::PathTooLong {
                path: path.to_string(),
                length: name.len(),
                limit: MAX_NAME_LEN,
            });
        }

        let real = self.backing_dir.join(name);
        let length = real.as_os_str().len();
        if length >= MAX_REAL_PATH_LEN {
            return Err(LazyError::PathTooLong {
                path: real.display().to_string(),
                length,
                limit: MAX_REAL_PATH_LEN,
            });
        }
        Ok(real)
    }

    /// Creates (or truncates) the real file and opens it read-write.
    ///
    /// An `exclusive` create fails on an existing file and leaves its
    /// content alone.
    pub fn create(&self, real: &Path, mode: u32, exclusive: bool) -> Result<File> {
        debug!("creating backing file {}", real.display());
        let mut options = OpenOptions::new();
        options.read(true).write(true).mode(mode & 0o7777);
        if exclusive {
            options.create_new(true);
        } else {
            options.create(true).truncate(true);
        }
        Ok(options.open(real)?)
    }

    /// Opens an existing real file read-write.
    pub fn open(&self, real: &Path) -> Result<File> {
        let file = OpenOptions::new().read(true).write(true).open(real)?;
        Ok(file)
    }

    /// Reads up to `length` bytes at `offset` without touching the file
    /// cursor. Stops early only at end of file.
    pub fn read(file: &File, offset: u64, length: usize) -> Result<Bytes> {
        let mut buf = vec![0u8; length];
        let mut filled = 0;
        while filled < length {
            match file.read_at(&mut buf[filled..], offset + filled as u64) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        buf.truncate(filled);
        Ok(Bytes::from(buf))
    }

    /// Writes `data` at `offset` without touching the file cursor.
    pub fn write(file: &File, offset: u64, data: &[u8]) -> Result<usize> {
        file.write_all_at(data, offset)?;
        Ok(data.len())
    }

    pub fn truncate(&self, real: &Path, length: u64) -> Result<()> {
        let file = OpenOptions::new().write(true).open(real)?;
        file.set_len(length)?;
        Ok(())
    }

    pub fn rename(&self, old: &Path, new: &Path) -> Result<()> {
        debug!("renaming backing file {} -> {}", old.display(), new.display());
        fs::rename(old, new)?;
        Ok(())
    }

    pub fn remove(&self, real: &Path) -> Result<()> {
        fs::remove_file(real)?;
        Ok(())
    }

    /// Attributes of the real file, unmodified.
    pub fn attributes(&self, real: &Path) -> Result<FileAttributes> {
        let meta = fs::metadata(real)?;
        Ok(FileAttributes::from_metadata(&meta))
    }

    /// Closes the handle held in `slot`, if any.
    ///
    /// Returns `Ok(false)` when the slot was already empty. When positioned
    /// I/O still holds the file, the descriptor is closed by whichever
    /// holder finishes last.
    pub fn close(slot: &mut Option<BackingHandle>) -> io::Result<bool> {
        let Some(handle) = slot.take() else {
            return Ok(false);
        };

        match Arc::try_unwrap(handle.into_file()) {
            Ok(file) => {
                let fd = file.into_raw_fd();
                // SAFETY: `fd` was owned by `file`, which gave it up above;
                // nothing else refers to it and it is closed only here.
                if unsafe { libc::close(fd) } == -1 {
                    return Err(io::Error::last_os_error());
                }
                Ok(true)
            }
            Err(shared) => {
                drop(shared);
                Ok(true)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn adapter() -> (tempfile::TempDir, DelegationAdapter) {
        let dir = tempfile::tempdir().unwrap();
        let adapter = DelegationAdapter::new(dir.path());
        (dir, adapter)
    }

    #[test]
    fn test_real_path() {
        let (dir, adapter) = adapter();
        let real = adapter.real_path(&VirtualPath::from("/x.mhash")).unwrap();
        assert_eq!(real, dir.path().join("x.mhash"));

        // Only the final component is used
        let real = adapter.real_path(&VirtualPath::from("/nested/y.mbinmap")).unwrap();
        assert_eq!(real, dir.path().join("y.mbinmap"));

        assert!(matches!(
            adapter.real_path(&VirtualPath::root()),
            Err(LazyError::InvalidArgument { .. })
        ));

        let long = format!("/{}.mhash", "a".repeat(300));
        assert!(matches!(
            adapter.real_path(&VirtualPath::from(long.as_str())),
            Err(LazyError::PathTooLong { .. })
        ));
    }

    #[test]
    fn test_real_path_too_long_for_backing_dir() {
        let deep = format!("/{}", "d/".repeat(2100));
        let adapter = DelegationAdapter::new(deep);
        assert!(matches!(
            adapter.real_path(&VirtualPath::from("/x.mhash")),
            Err(LazyError::PathTooLong { .. })
        ));
    }

    #[test]
    fn test_positioned_read_write() {
        let (_dir, adapter) = adapter();
        let real = adapter.real_path(&VirtualPath::from("/x.mhash")).unwrap();
        let file = adapter.create(&real, 0o644, false).unwrap();

        assert_eq!(DelegationAdapter::write(&file, 4, b"world").unwrap(), 5);
        assert_eq!(DelegationAdapter::write(&file, 0, b"hey ").unwrap(), 4);

        let data = DelegationAdapter::read(&file, 0, 64).unwrap();
        assert_eq!(&data[..], b"hey world");
        let data = DelegationAdapter::read(&file, 4, 3).unwrap();
        assert_eq!(&data[..], b"wor");
        assert!(DelegationAdapter::read(&file, 100, 3).unwrap().is_empty());

        assert_eq!(fs::read(&real).unwrap(), b"hey world");
    }

    #[test]
    fn test_concurrent_positioned_writes() {
        let (_dir, adapter) = adapter();
        let real = adapter.real_path(&VirtualPath::from("/c.mhash")).unwrap();
        let file = Arc::new(adapter.create(&real, 0o644, false).unwrap());

        let mut handles = vec![];
        for i in 0..8u8 {
            let file = Arc::clone(&file);
            handles.push(thread::spawn(move || {
                let block = vec![i; 512];
                DelegationAdapter::write(&file, i as u64 * 512, &block).unwrap();
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let data = fs::read(&real).unwrap();
        assert_eq!(data.len(), 8 * 512);
        for (i, block) in data.chunks(512).enumerate() {
            assert!(block.iter().all(|b| *b == i as u8));
        }
    }

    #[test]
    fn test_create_truncates_existing() {
        let (_dir, adapter) = adapter();
        let real = adapter.real_path(&VirtualPath::from("/t.mhash")).unwrap();
        fs::write(&real, b"stale content").unwrap();

        let _file = adapter.create(&real, 0o600, false).unwrap();
        assert_eq!(fs::metadata(&real).unwrap().len(), 0);
    }

    #[test]
    fn test_exclusive_create_keeps_existing() {
        let (_dir, adapter) = adapter();
        let real = adapter.real_path(&VirtualPath::from("/e.mhash")).unwrap();
        fs::write(&real, b"first writer").unwrap();

        let err = adapter.create(&real, 0o644, true).unwrap_err();
        assert_eq!(err.errno(), libc::EEXIST);
        assert_eq!(fs::read(&real).unwrap(), b"first writer");

        fs::remove_file(&real).unwrap();
        adapter.create(&real, 0o644, true).unwrap();
        assert!(real.exists());
    }

    #[test]
    fn test_open_missing_maps_os_error() {
        let (_dir, adapter) = adapter();
        let real = adapter.real_path(&VirtualPath::from("/missing.mhash")).unwrap();
        let err = adapter.open(&real).unwrap_err();
        assert_eq!(err.errno(), libc::ENOENT);
    }

    #[test]
    fn test_truncate_rename_remove() {
        let (dir, adapter) = adapter();
        let old = adapter.real_path(&VirtualPath::from("/a.mhash")).unwrap();
        let new = adapter.real_path(&VirtualPath::from("/b.mhash")).unwrap();
        fs::write(&old, b"0123456789").unwrap();

        adapter.truncate(&old, 4).unwrap();
        assert_eq!(adapter.attributes(&old).unwrap().size, 4);

        adapter.rename(&old, &new).unwrap();
        assert!(!old.exists());
        assert_eq!(fs::read(&new).unwrap(), b"0123");

        adapter.remove(&new).unwrap();
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut slot = Some(BackingHandle::new(tempfile::tempfile().unwrap()));
        assert!(DelegationAdapter::close(&mut slot).unwrap());
        assert!(slot.is_none());
        assert!(!DelegationAdapter::close(&mut slot).unwrap());
    }

    #[test]
    fn test_close_with_in_flight_reference() {
        let handle = BackingHandle::new(tempfile::tempfile().unwrap());
        let in_flight = handle.file();
        let mut slot = Some(handle);

        assert!(DelegationAdapter::close(&mut slot).unwrap());
        // The in-flight holder can still finish its I/O
        assert_eq!(DelegationAdapter::write(&in_flight, 0, b"ok").unwrap(), 2);
    }
}
