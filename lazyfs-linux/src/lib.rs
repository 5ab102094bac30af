//! # LazyFS Linux
//!
//! FUSE binding for LazyFS. Wraps a [`lazyfs_core::LazyFs`] in a
//! [`fuser::Filesystem`] and mounts it in a background session.
//!
//! The kernel addresses files by inode; [`fuse::InodeTable`] keeps the
//! inode to path mapping for the single directory LazyFS exposes, and every
//! callback is forwarded to the core by path.

pub mod fuse;

pub use fuse::{mount, mount_options, InodeTable, LazyFuse, MountError, MountHandle};
