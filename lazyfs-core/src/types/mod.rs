// Module declarations
pub mod path;
pub mod metadata;
pub mod operations;
pub mod config;

// Re-export all types from submodules
pub use path::{VirtualPath, MAX_NAME_LEN};
pub use metadata::{FileKind, FileAttributes, SYNTHETIC_BLOCK_SIZE};
pub use operations::{FileHandle, OpenFlags};
pub use config::{LogLevel, FallbackPattern, LazyConfig};
