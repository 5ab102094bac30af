//! The filesystem proper: classifies every request and routes it to the
//! synthetic engine or the delegation adapter.

use crate::classify::{classify, EntryClass, PathClass};
use crate::delegate::DelegationAdapter;
use crate::directory::{BackingHandle, Entry, EntryDirectory};
use crate::error::{LazyError, Result};
use crate::synthetic;
use crate::traits::LazyOperations;
use crate::types::{
    FallbackPattern, FileAttributes, FileHandle, LazyConfig, OpenFlags, VirtualPath, MAX_NAME_LEN,
};
use bytes::Bytes;
use std::fs::File;
use std::io;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A mounted LazyFS instance.
///
/// Owns the entry directory for its whole lifetime; host bindings share it
/// behind an `Arc` and call it from any number of worker threads.
pub struct LazyFs {
    directory: EntryDirectory,
    adapter: DelegationAdapter,
    fallback: FallbackPattern,
}

impl LazyFs {
    pub fn new(config: &LazyConfig) -> Self {
        Self {
            directory: EntryDirectory::new(),
            adapter: DelegationAdapter::new(config.backing_dir.clone()),
            fallback: config.fallback_pattern,
        }
    }

    pub fn directory(&self) -> &EntryDirectory {
        &self.directory
    }

    pub fn adapter(&self) -> &DelegationAdapter {
        &self.adapter
    }

    /// Closes every open backing file and empties the directory.
    ///
    /// Returns the number of backing files closed. Calling it again on an
    /// empty directory does nothing.
    pub fn teardown(&self) -> usize {
        let mut closed = 0;
        for mut entry in self.directory.drain() {
            let mut slot = entry.take_backing();
            if self.close_logged(entry.path(), &mut slot) {
                closed += 1;
            }
        }
        if closed > 0 {
            info!("teardown closed {} backing files", closed);
        }
        closed
    }

    fn resolve(&self, path: &VirtualPath) -> Result<Entry> {
        self.directory
            .lookup(path)
            .ok_or_else(|| LazyError::not_found(path))
    }

    /// Class a new file at `path` would have; rejects names that cannot
    /// become entries.
    fn check_new_name(&self, path: &VirtualPath) -> Result<EntryClass> {
        let class = classify(path.as_str())
            .entry_class()
            .ok_or_else(|| LazyError::invalid(path, "the root directory is not a file"))?;

        if !path.is_top_level() {
            return Err(LazyError::invalid(path, "subdirectories are not supported"));
        }
        if matches!(path.name(), "." | "..") {
            return Err(LazyError::invalid(path, "not a file name"));
        }
        let length = path.name().len();
        if length > MAX_NAME_LEN {
            return Err(LazyError::PathTooLong {
                path: path.to_string(),
                length,
                limit: MAX_NAME_LEN,
            });
        }
        Ok(class)
    }

    /// The open backing file of `entry`, or a transient one when no client
    /// currently holds it open.
    fn backing_file(&self, entry: &Entry) -> Result<Arc<File>> {
        match entry.backing() {
            Some(handle) => Ok(handle.file()),
            None => {
                let real = self.adapter.real_path(entry.path())?;
                Ok(Arc::new(self.adapter.open(&real)?))
            }
        }
    }

    /// Adds a client reference to the backing file of `path`, opening it
    /// when no client holds it yet.
    fn acquire_backing(&self, path: &VirtualPath) -> Result<Arc<File>> {
        let shared = self.directory.update(path, |e| {
            if e.acquire_backing() {
                e.backing().map(BackingHandle::file)
            } else {
                None
            }
        })?;
        if let Some(file) = shared {
            return Ok(file);
        }

        let real = self.adapter.real_path(path)?;
        let file = self.adapter.open(&real)?;
        self.directory.update(path, |e| {
            e.attach_backing(BackingHandle::new(file));
            e.backing().map(BackingHandle::file)
        })?
        .ok_or_else(|| LazyError::not_found(path))
    }

    /// Closes a backing handle, logging instead of propagating failures.
    fn close_logged(&self, path: &VirtualPath, slot: &mut Option<BackingHandle>) -> bool {
        match DelegationAdapter::close(slot) {
            Ok(closed) => closed,
            Err(err) => {
                warn!("closing backing file of {} failed: {}", path, err);
                true
            }
        }
    }

    fn create_synthetic(&self, path: &VirtualPath, exclusive: bool) -> Result<u64> {
        if let Some(id) = self.directory.reset_existing(path, exclusive)? {
            return Ok(id);
        }

        let id = self.directory.next_sequence_id();
        let pattern = synthetic::derive_pattern(path.name(), id, self.fallback)?;
        debug!("new synthetic file {} with pattern {}", path, pattern);
        self.directory
            .insert_or_reset(Entry::synthetic(path.clone(), pattern, id), exclusive)
    }

    fn create_delegated(&self, path: &VirtualPath, mode: u32, exclusive: bool) -> Result<u64> {
        if exclusive && self.directory.contains(path) {
            return Err(LazyError::already_exists(path));
        }

        let real = self.adapter.real_path(path)?;
        let file = self.adapter.create(&real, mode, exclusive)?;
        let id = self.directory.next_sequence_id();
        self.directory.insert_or_reset(
            Entry::delegated(path.clone(), BackingHandle::new(file), id),
            exclusive,
        )
    }
}

impl LazyOperations for LazyFs {
    fn init(&self) -> Result<()> {
        info!("lazyfs initialized, backing directory {}", self.adapter.backing_dir().display());
        Ok(())
    }

    fn destroy(&self) {
        self.teardown();
    }

    fn getattr(&self, path: &VirtualPath) -> Result<FileAttributes> {
        if classify(path.as_str()) == PathClass::Root {
            return Ok(FileAttributes::root_directory());
        }

        let entry = self.resolve(path)?;
        match entry.class() {
            EntryClass::Synthetic => Ok(FileAttributes::synthetic(entry.size())),
            EntryClass::Delegated => {
                let real = self.adapter.real_path(path)?;
                self.adapter.attributes(&real)
            }
        }
    }

    fn fgetattr(&self, path: &VirtualPath, _handle: FileHandle) -> Result<FileAttributes> {
        self.getattr(path)
    }

    fn create(&self, path: &VirtualPath, mode: u32, flags: OpenFlags) -> Result<FileHandle> {
        debug!("creating file {}", path);
        let exclusive = flags.is_exclusive_create();
        let id = match self.check_new_name(path)? {
            EntryClass::Synthetic => self.create_synthetic(path, exclusive)?,
            EntryClass::Delegated => self.create_delegated(path, mode, exclusive)?,
        };
        Ok(FileHandle::new(id))
    }

    fn open(&self, path: &VirtualPath, flags: OpenFlags) -> Result<FileHandle> {
        debug!("opening file {}", path);
        let entry = self.resolve(path)?;
        let truncate = flags.contains(OpenFlags::TRUNCATE);

        match entry.class() {
            EntryClass::Synthetic => {
                if truncate {
                    self.directory.update(path, |e| synthetic::truncate(e, 0))?;
                }
            }
            EntryClass::Delegated => {
                let file = self.acquire_backing(path)?;
                if truncate {
                    // A failed open is never released, so drop its reference here
                    if let Err(err) = file.set_len(0) {
                        drop(file);
                        if let Ok(mut slot) = self.directory.update(path, |e| e.release_backing()) {
                            self.close_logged(path, &mut slot);
                        }
                        return Err(err.into());
                    }
                    self.directory.update(path, |e| e.set_size(0))?;
                }
            }
        }
        Ok(FileHandle::new(entry.sequence_id()))
    }

    fn read(&self, path: &VirtualPath, _handle: FileHandle, offset: u64, length: usize) -> Result<Bytes> {
        let entry = self.resolve(path)?;
        match entry.class() {
            EntryClass::Synthetic => Ok(synthetic::read(&entry, offset, length)),
            EntryClass::Delegated => {
                let file = self.backing_file(&entry)?;
                DelegationAdapter::read(&file, offset, length)
            }
        }
    }

    fn write(&self, path: &VirtualPath, _handle: FileHandle, offset: u64, data: &[u8]) -> Result<usize> {
        let entry = self.resolve(path)?;
        match entry.class() {
            EntryClass::Synthetic => {
                self.directory.update(path, |e| synthetic::write(e, offset, data.len()))?
            }
            EntryClass::Delegated => {
                let file = self.backing_file(&entry)?;
                let written = DelegationAdapter::write(&file, offset, data)?;
                let end = offset.saturating_add(written as u64);
                let grown = self.directory.update(path, |e| {
                    if e.size() < end {
                        e.set_size(end);
                    }
                });
                if grown.is_err() {
                    debug!("{} was removed during a write", path);
                }
                Ok(written)
            }
        }
    }

    fn truncate(&self, path: &VirtualPath, length: u64) -> Result<()> {
        let entry = self.resolve(path)?;
        match entry.class() {
            EntryClass::Synthetic => self.directory.update(path, |e| synthetic::truncate(e, length)),
            EntryClass::Delegated => {
                let real = self.adapter.real_path(path)?;
                self.adapter.truncate(&real, length)?;
                self.directory.update(path, |e| e.set_size(length))
            }
        }
    }

    fn ftruncate(&self, path: &VirtualPath, _handle: FileHandle, length: u64) -> Result<()> {
        self.truncate(path, length)
    }

    fn rename(&self, old: &VirtualPath, new: &VirtualPath) -> Result<()> {
        debug!("renaming {} -> {}", old, new);
        let class = self.directory.check_rename(old, new)?;
        self.check_new_name(new)?;

        if class == EntryClass::Synthetic {
            return self.directory.rename(old, new);
        }

        let real_old = self.adapter.real_path(old)?;
        let real_new = self.adapter.real_path(new)?;
        self.adapter.rename(&real_old, &real_new)?;

        if let Err(err) = self.directory.rename(old, new) {
            // Lost a race after the real rename; put the file back.
            if let Err(undo) = self.adapter.rename(&real_new, &real_old) {
                warn!("could not restore {} after failed rename: {}", real_old.display(), undo);
            }
            return Err(err);
        }
        Ok(())
    }

    fn unlink(&self, path: &VirtualPath) -> Result<()> {
        debug!("unlinking {}", path);
        let entry = self.resolve(path)?;

        if entry.class() == EntryClass::Delegated {
            let real = self.adapter.real_path(path)?;
            match self.adapter.remove(&real) {
                Ok(()) => {}
                Err(LazyError::IoError { source }) if source.kind() == io::ErrorKind::NotFound => {
                    warn!("backing file {} was already gone", real.display());
                }
                Err(err) => return Err(err),
            }
        }

        if let Some(mut removed) = self.directory.remove(path) {
            let mut slot = removed.take_backing();
            self.close_logged(path, &mut slot);
        }
        Ok(())
    }

    fn release(&self, path: &VirtualPath, _handle: FileHandle) -> Result<()> {
        match self.directory.update(path, |e| e.release_backing()) {
            Ok(mut slot) => {
                self.close_logged(path, &mut slot);
            }
            Err(_) => debug!("release of {} after it was removed", path),
        }
        Ok(())
    }

    fn opendir(&self, path: &VirtualPath) -> Result<()> {
        match classify(path.as_str()) {
            PathClass::Root => Ok(()),
            _ => Err(LazyError::not_found(path)),
        }
    }

    fn readdir(&self, path: &VirtualPath) -> Result<Vec<String>> {
        self.opendir(path)?;

        let entries = self.directory.iterate();
        let mut names = Vec::with_capacity(entries.len() + 2);
        names.push(".".to_string());
        names.push("..".to_string());
        names.extend(entries.into_iter().map(|(name, _)| name));
        Ok(names)
    }
}
