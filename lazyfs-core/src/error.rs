//! Error types for the LazyFS system.

use crate::types::VirtualPath;
use thiserror::Error;

/// Every failure an operation can report back to the host runtime.
#[derive(Debug, Error)]
pub enum LazyError {
    /// The path has no entry in the directory.
    #[error("Path not found: {path}")]
    NotFound {
        path: VirtualPath
    },

    /// Exclusive create or rename target collision.
    #[error("Path already exists: {path}")]
    AlreadyExists {
        path: VirtualPath
    },

    /// Cross-class rename, malformed pattern-bearing name, nested path.
    #[error("Invalid argument for '{path}': {reason}")]
    InvalidArgument {
        path: String,
        reason: String
    },

    /// A name or a joined backing path exceeds its bound.
    #[error("Path too long ({length} bytes, limit {limit}): {path}")]
    PathTooLong {
        path: String,
        length: usize,
        limit: usize
    },

    /// Operation intentionally not implemented.
    #[error("Unsupported operation: {operation}")]
    Unsupported {
        operation: String
    },

    /// Operation refused outright (locking).
    #[error("Operation not permitted: {operation}")]
    NotPermitted {
        operation: String
    },

    /// Extended attribute lookup; no attributes exist.
    #[error("No such attribute '{name}' on {path}")]
    NoAttribute {
        path: VirtualPath,
        name: String
    },

    /// I/O error from the real backing store.
    #[error("I/O error")]
    IoError {
        #[from]
        #[source]
        source: std::io::Error,
    },
}

impl LazyError {
    pub fn not_found(path: &VirtualPath) -> Self {
        LazyError::NotFound { path: path.clone() }
    }

    pub fn already_exists(path: &VirtualPath) -> Self {
        LazyError::AlreadyExists { path: path.clone() }
    }

    pub fn invalid(path: impl ToString, reason: impl Into<String>) -> Self {
        LazyError::InvalidArgument {
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    pub fn unsupported(operation: &str) -> Self {
        LazyError::Unsupported { operation: operation.to_string() }
    }

    /// Positive POSIX error number for this error.
    pub fn errno(&self) -> i32 {
        match self {
            LazyError::NotFound { .. } => libc::ENOENT,
            LazyError::AlreadyExists { .. } => libc::EEXIST,
            LazyError::InvalidArgument { .. } => libc::EINVAL,
            LazyError::PathTooLong { .. } => libc::ENAMETOOLONG,
            LazyError::Unsupported { .. } => libc::ENOSYS,
            LazyError::NotPermitted { .. } => libc::EPERM,
            LazyError::NoAttribute { .. } => libc::ENODATA,
            LazyError::IoError { source } => source.raw_os_error().unwrap_or(libc::EIO),
        }
    }

    /// Negative code as handed back through the operation table.
    pub fn code(&self) -> i32 {
        -self.errno()
    }
}

/// Result type alias for LazyFS operations.
pub type Result<T> = std::result::Result<T, LazyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let path = VirtualPath::from("/deadbeef");

        let err = LazyError::not_found(&path);
        assert_eq!(err.to_string(), "Path not found: /deadbeef");

        let err = LazyError::already_exists(&path);
        assert_eq!(err.to_string(), "Path already exists: /deadbeef");

        let err = LazyError::invalid("/a.mhash", "cannot change file class");
        assert_eq!(err.to_string(), "Invalid argument for '/a.mhash': cannot change file class");

        let err = LazyError::unsupported("symlink");
        assert_eq!(err.to_string(), "Unsupported operation: symlink");

        let err = LazyError::PathTooLong {
            path: "/x".to_string(),
            length: 300,
            limit: 255,
        };
        assert_eq!(err.to_string(), "Path too long (300 bytes, limit 255): /x");
    }

    #[test]
    fn test_errno_mapping() {
        let path = VirtualPath::from("/f");
        assert_eq!(LazyError::not_found(&path).errno(), libc::ENOENT);
        assert_eq!(LazyError::already_exists(&path).errno(), libc::EEXIST);
        assert_eq!(LazyError::invalid("/f", "x").errno(), libc::EINVAL);
        assert_eq!(LazyError::unsupported("link").errno(), libc::ENOSYS);
        assert_eq!(
            LazyError::NotPermitted { operation: "lock".into() }.code(),
            -libc::EPERM
        );
        assert_eq!(
            LazyError::NoAttribute { path, name: "user.x".into() }.errno(),
            libc::ENODATA
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::from_raw_os_error(libc::EACCES);
        let err: LazyError = io_err.into();
        assert!(matches!(err, LazyError::IoError { .. }));
        assert_eq!(err.errno(), libc::EACCES);

        // Errors without an OS code fall back to EIO
        let io_err = std::io::Error::new(std::io::ErrorKind::Other, "broken");
        let err: LazyError = io_err.into();
        assert_eq!(err.errno(), libc::EIO);
    }
}
