//! The operation table the host runtime calls into.
//!
//! Every operation takes the virtual path it addresses (and, where the
//! host supplies one, the handle returned by `open`/`create`) and returns
//! a [`Result`]. Host bindings turn errors into negative POSIX codes with
//! [`LazyError::code`](crate::error::LazyError::code).

use crate::error::{LazyError, Result};
use crate::types::{FileAttributes, FileHandle, OpenFlags, VirtualPath};
use bytes::Bytes;

/// Filesystem operations exposed to the host runtime.
///
/// Operations outside the supported set have default implementations that
/// report [`LazyError::Unsupported`].
pub trait LazyOperations: Send + Sync {
    /// Called once when the filesystem is mounted.
    fn init(&self) -> Result<()>;

    /// Called once when the filesystem is unmounted.
    fn destroy(&self);

    fn getattr(&self, path: &VirtualPath) -> Result<FileAttributes>;

    /// Attributes of an open file; identical to [`getattr`](Self::getattr).
    fn fgetattr(&self, path: &VirtualPath, handle: FileHandle) -> Result<FileAttributes>;

    /// Creates a file, or truncates and re-opens it when it exists and
    /// `flags` does not request exclusive creation.
    fn create(&self, path: &VirtualPath, mode: u32, flags: OpenFlags) -> Result<FileHandle>;

    /// Opens an existing file. Files are never created implicitly.
    fn open(&self, path: &VirtualPath, flags: OpenFlags) -> Result<FileHandle>;

    fn read(&self, path: &VirtualPath, handle: FileHandle, offset: u64, length: usize) -> Result<Bytes>;

    /// Returns the number of bytes accepted.
    fn write(&self, path: &VirtualPath, handle: FileHandle, offset: u64, data: &[u8]) -> Result<usize>;

    fn truncate(&self, path: &VirtualPath, length: u64) -> Result<()>;

    fn ftruncate(&self, path: &VirtualPath, handle: FileHandle, length: u64) -> Result<()>;

    fn rename(&self, old: &VirtualPath, new: &VirtualPath) -> Result<()>;

    fn unlink(&self, path: &VirtualPath) -> Result<()>;

    /// Drops one open reference. Never fails.
    fn release(&self, path: &VirtualPath, handle: FileHandle) -> Result<()>;

    fn flush(&self, _path: &VirtualPath, _handle: FileHandle) -> Result<()> {
        Ok(())
    }

    fn opendir(&self, path: &VirtualPath) -> Result<()>;

    /// Names in the directory, starting with `.` and `..`.
    fn readdir(&self, path: &VirtualPath) -> Result<Vec<String>>;

    fn access(&self, _path: &VirtualPath, _mask: i32) -> Result<()> {
        Ok(())
    }

    fn lock(&self, _path: &VirtualPath, _handle: FileHandle) -> Result<()> {
        Err(LazyError::NotPermitted { operation: "lock".to_string() })
    }

    fn getxattr(&self, path: &VirtualPath, name: &str) -> Result<Bytes> {
        Err(LazyError::NoAttribute {
            path: path.clone(),
            name: name.to_string(),
        })
    }

    fn setxattr(&self, _path: &VirtualPath, _name: &str, _value: &[u8]) -> Result<()> {
        Err(LazyError::unsupported("setxattr"))
    }

    fn listxattr(&self, _path: &VirtualPath) -> Result<Vec<String>> {
        Err(LazyError::unsupported("listxattr"))
    }

    fn removexattr(&self, _path: &VirtualPath, _name: &str) -> Result<()> {
        Err(LazyError::unsupported("removexattr"))
    }

    fn symlink(&self, _target: &str, _link: &VirtualPath) -> Result<()> {
        Err(LazyError::unsupported("symlink"))
    }

    fn readlink(&self, _path: &VirtualPath) -> Result<String> {
        Err(LazyError::unsupported("readlink"))
    }

    fn link(&self, _existing: &VirtualPath, _new: &VirtualPath) -> Result<()> {
        Err(LazyError::unsupported("link"))
    }

    fn chmod(&self, _path: &VirtualPath, _mode: u32) -> Result<()> {
        Err(LazyError::unsupported("chmod"))
    }

    fn chown(&self, _path: &VirtualPath, _uid: Option<u32>, _gid: Option<u32>) -> Result<()> {
        Err(LazyError::unsupported("chown"))
    }

    fn mkdir(&self, _path: &VirtualPath, _mode: u32) -> Result<()> {
        Err(LazyError::unsupported("mkdir"))
    }

    fn rmdir(&self, _path: &VirtualPath) -> Result<()> {
        Err(LazyError::unsupported("rmdir"))
    }

    fn mknod(&self, _path: &VirtualPath, _mode: u32, _rdev: u32) -> Result<()> {
        Err(LazyError::unsupported("mknod"))
    }
}
