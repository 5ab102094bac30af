//! FUSE integration for LazyFS.

mod filesystem;
mod inodes;
mod mount;

pub use filesystem::{file_attr, LazyFuse};
pub use inodes::{InodeTable, ROOT_INO};
pub use mount::{mount, mount_options, MountError, MountHandle};
