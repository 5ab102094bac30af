//! # LazyFS Core
//!
//! The core library for LazyFS - a single-directory virtual filesystem that
//! serves arbitrarily large synthetic files from memory while forwarding a
//! small set of metadata files to a real directory.
//!
//! ## Overview
//!
//! LazyFS exists to feed transfer and hashing experiments with huge files
//! without storing them anywhere. A file whose name starts with 8 hex
//! characters (`deadbeef_1gb_1024`) reads back as that 4-byte pattern
//! repeated up to its size; writes only move its end. Files ending in
//! `.mhash` or `.mbinmap` are real files kept in the backing directory.
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use lazyfs_core::{LazyConfig, LazyFs, LazyOperations, OpenFlags, VirtualPath};
//!
//! fn example() -> lazyfs_core::Result<()> {
//!     let fs = LazyFs::new(&LazyConfig::new("/var/lib/lazyfs"));
//!     fs.init()?;
//!
//!     let path = VirtualPath::from("/deadbeef_1gb_1024");
//!     let handle = fs.create(&path, 0o644, OpenFlags::CREATE | OpenFlags::WRITE)?;
//!     fs.truncate(&path, 1 << 30)?;
//!
//!     let data = fs.read(&path, handle, 0, 8)?;
//!     assert_eq!(&data[..], &[0xde, 0xad, 0xbe, 0xef, 0xde, 0xad, 0xbe, 0xef]);
//!
//!     fs.destroy();
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`classify`]: decides which component serves a path
//! - [`directory`]: the in-memory table of live files
//! - [`synthetic`]: read/write semantics of in-memory files
//! - [`delegate`]: forwarding of metadata files to the backing directory
//! - [`facade`]: [`LazyFs`], the implementation of [`LazyOperations`]
//! - [`naming`]: helpers for the `<pattern>_<size>_<chunksize>` convention
//!
//! Host bindings (such as `lazyfs-linux` for FUSE) wrap a [`LazyFs`] and
//! translate their callbacks into [`LazyOperations`] calls.

pub mod classify;
pub mod delegate;
pub mod directory;
pub mod error;
pub mod facade;
pub mod naming;
pub mod synthetic;
pub mod traits;
pub mod types;

pub use classify::{classify, EntryClass, PathClass, DELEGATED_SUFFIXES};
pub use delegate::DelegationAdapter;
pub use directory::{BackingHandle, Entry, EntryDirectory, Pattern};
pub use error::{LazyError, Result};
pub use facade::LazyFs;
pub use traits::LazyOperations;
pub use types::{
    FallbackPattern, FileAttributes, FileHandle, FileKind, LazyConfig, LogLevel, OpenFlags,
    VirtualPath, MAX_NAME_LEN, SYNTHETIC_BLOCK_SIZE,
};
