use std::fs::Metadata;
use std::os::unix::fs::MetadataExt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Block size reported for synthetic files.
pub const SYNTHETIC_BLOCK_SIZE: u32 = 512;

/// Represents the type of a file system entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    /// Regular file
    RegularFile,
    /// Directory
    Directory,
}

/// Attributes handed back by getattr, shaped after `struct stat`.
#[derive(Debug, Clone, PartialEq)]
pub struct FileAttributes {
    /// Size in bytes
    pub size: u64,
    /// Allocated 512-byte blocks
    pub blocks: u64,
    /// Last access time
    pub accessed: SystemTime,
    /// Last modification time
    pub modified: SystemTime,
    /// Last status change time
    pub changed: SystemTime,
    /// Type of file system entry
    pub kind: FileKind,
    /// Permission bits (no file type bits)
    pub perm: u16,
    pub nlink: u32,
    pub uid: u32,
    pub gid: u32,
    pub rdev: u32,
    pub blksize: u32,
}

impl FileAttributes {
    /// Fixed attributes of the single supported directory.
    pub fn root_directory() -> Self {
        let now = SystemTime::now();
        Self {
            size: 0,
            blocks: 0,
            accessed: now,
            modified: now,
            changed: now,
            kind: FileKind::Directory,
            perm: 0o755,
            nlink: 2,
            uid: current_uid(),
            gid: current_gid(),
            rdev: 0,
            blksize: SYNTHETIC_BLOCK_SIZE,
        }
    }

    /// Attributes of a file that only exists in memory: a regular file
    /// open to everybody, stamped with the current time.
    pub fn synthetic(size: u64) -> Self {
        let now = SystemTime::now();
        Self {
            size,
            blocks: size / SYNTHETIC_BLOCK_SIZE as u64,
            accessed: now,
            modified: now,
            changed: now,
            kind: FileKind::RegularFile,
            perm: 0o777,
            nlink: 1,
            uid: current_uid(),
            gid: current_gid(),
            rdev: 0,
            blksize: SYNTHETIC_BLOCK_SIZE,
        }
    }

    /// Copies the attributes of a real file verbatim.
    pub fn from_metadata(meta: &Metadata) -> Self {
        let kind = if meta.is_dir() {
            FileKind::Directory
        } else {
            FileKind::RegularFile
        };

        Self {
            size: meta.size(),
            blocks: meta.blocks(),
            accessed: unix_time(meta.atime(), meta.atime_nsec()),
            modified: unix_time(meta.mtime(), meta.mtime_nsec()),
            changed: unix_time(meta.ctime(), meta.ctime_nsec()),
            kind,
            perm: (meta.mode() & 0o7777) as u16,
            nlink: meta.nlink() as u32,
            uid: meta.uid(),
            gid: meta.gid(),
            rdev: meta.rdev() as u32,
            blksize: meta.blksize() as u32,
        }
    }
}

fn unix_time(secs: i64, nsecs: i64) -> SystemTime {
    if secs < 0 || nsecs < 0 {
        return UNIX_EPOCH;
    }
    UNIX_EPOCH + Duration::new(secs as u64, nsecs as u32)
}

fn current_uid() -> u32 {
    // SAFETY: getuid has no preconditions and cannot fail.
    unsafe { libc::getuid() }
}

fn current_gid() -> u32 {
    // SAFETY: getgid has no preconditions and cannot fail.
    unsafe { libc::getgid() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_attributes() {
        let attrs = FileAttributes::synthetic(10 * 1024);
        assert_eq!(attrs.kind, FileKind::RegularFile);
        assert_eq!(attrs.perm, 0o777);
        assert_eq!(attrs.nlink, 1);
        assert_eq!(attrs.blocks, 20);
        assert_eq!(attrs.blksize, 512);
        assert_eq!(attrs.accessed, attrs.modified);
    }

    #[test]
    fn test_root_attributes() {
        let attrs = FileAttributes::root_directory();
        assert_eq!(attrs.kind, FileKind::Directory);
        assert_eq!(attrs.perm, 0o755);
        assert_eq!(attrs.nlink, 2);
    }

    #[test]
    fn test_from_metadata() {
        let file = tempfile::NamedTempFile::new().unwrap();
        file.as_file().set_len(1234).unwrap();

        let meta = file.as_file().metadata().unwrap();
        let attrs = FileAttributes::from_metadata(&meta);
        assert_eq!(attrs.size, 1234);
        assert_eq!(attrs.kind, FileKind::RegularFile);
        assert_eq!(attrs.uid, meta.uid());
    }
}
