//! In-memory table of every live file in the mount.

mod entry;

pub use entry::{BackingHandle, Entry, Pattern};

use crate::classify::{classify, EntryClass, PathClass};
use crate::error::{LazyError, Result};
use crate::types::VirtualPath;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

struct DirectoryState {
    entries: HashMap<VirtualPath, Entry>,
    next_sequence: u64,
}

/// Path to entry mapping guarded by a single exclusive lock.
///
/// Every structural change and every size update happens under that lock.
/// No method performs I/O against the backing store while holding it.
pub struct EntryDirectory {
    state: Mutex<DirectoryState>,
}

impl Default for EntryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl EntryDirectory {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(DirectoryState {
                entries: HashMap::new(),
                next_sequence: 1,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, DirectoryState> {
        // Entries stay consistent even if a holder panicked mid-operation:
        // every mutation is a single field assignment or map operation.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the entry at `path`.
    pub fn lookup(&self, path: &VirtualPath) -> Option<Entry> {
        self.state().entries.get(path).cloned()
    }

    pub fn contains(&self, path: &VirtualPath) -> bool {
        self.state().entries.contains_key(path)
    }

    /// Hands out the next per-file identity.
    pub fn next_sequence_id(&self) -> u64 {
        let mut state = self.state();
        let id = state.next_sequence;
        state.next_sequence += 1;
        id
    }

    /// Inserts a new entry keyed by its own path.
    pub fn insert(&self, entry: Entry) -> Result<()> {
        let mut state = self.state();
        if state.entries.contains_key(entry.path()) {
            return Err(LazyError::already_exists(entry.path()));
        }
        state.entries.insert(entry.path().clone(), entry);
        Ok(())
    }

    /// Inserts `entry`, or turns an existing entry at the same path into a
    /// truncated re-open when `exclusive` is not set.
    ///
    /// A backing file carried by `entry` is attached to the resident entry
    /// (or dropped in favor of the one already open). Returns the sequence
    /// id of whichever entry now lives at the path.
    pub fn insert_or_reset(&self, entry: Entry, exclusive: bool) -> Result<u64> {
        let mut state = self.state();
        let entries = &mut state.entries;

        if let Some(existing) = entries.get_mut(entry.path()) {
            if exclusive {
                return Err(LazyError::already_exists(entry.path()));
            }
            existing.set_size(0);
            if let Some(handle) = entry.backing().cloned() {
                existing.attach_backing(handle);
            }
            return Ok(existing.sequence_id());
        }

        let id = entry.sequence_id();
        entries.insert(entry.path().clone(), entry);
        Ok(id)
    }

    /// Truncates an existing entry to zero for a non-exclusive re-create.
    ///
    /// Returns `Ok(None)` when nothing lives at `path`.
    pub fn reset_existing(&self, path: &VirtualPath, exclusive: bool) -> Result<Option<u64>> {
        let mut state = self.state();
        match state.entries.get_mut(path) {
            Some(_) if exclusive => Err(LazyError::already_exists(path)),
            Some(existing) => {
                existing.set_size(0);
                Ok(Some(existing.sequence_id()))
            }
            None => Ok(None),
        }
    }

    /// Runs `f` against the entry at `path` under the directory lock.
    pub fn update<R>(&self, path: &VirtualPath, f: impl FnOnce(&mut Entry) -> R) -> Result<R> {
        let mut state = self.state();
        state
            .entries
            .get_mut(path)
            .map(f)
            .ok_or_else(|| LazyError::not_found(path))
    }

    pub fn remove(&self, path: &VirtualPath) -> Option<Entry> {
        self.state().entries.remove(path)
    }

    /// Checks that `old` may be renamed to `new` without changing anything.
    ///
    /// Returns the class shared by both endpoints.
    pub fn check_rename(&self, old: &VirtualPath, new: &VirtualPath) -> Result<EntryClass> {
        let state = self.state();
        Self::validate_rename(&state, old, new)
    }

    fn validate_rename(state: &DirectoryState, old: &VirtualPath, new: &VirtualPath) -> Result<EntryClass> {
        let entry = state
            .entries
            .get(old)
            .ok_or_else(|| LazyError::not_found(old))?;

        if state.entries.contains_key(new) {
            return Err(LazyError::already_exists(new));
        }

        match classify(new.as_str()) {
            PathClass::Root => Err(LazyError::invalid(new, "cannot rename onto the root directory")),
            class if class.entry_class() != Some(entry.class()) => Err(LazyError::invalid(
                old,
                format!("cannot rename across file classes to {}", new),
            )),
            _ => Ok(entry.class()),
        }
    }

    /// Moves the entry at `old` to `new`, keeping size, pattern, identity
    /// and any open backing file.
    pub fn rename(&self, old: &VirtualPath, new: &VirtualPath) -> Result<()> {
        let mut state = self.state();
        Self::validate_rename(&state, old, new)?;

        if let Some(mut entry) = state.entries.remove(old) {
            entry.set_path(new.clone());
            state.entries.insert(new.clone(), entry);
        }
        Ok(())
    }

    /// Name and snapshot of every live entry, in no particular order.
    pub fn iterate(&self) -> Vec<(String, Entry)> {
        self.state()
            .entries
            .values()
            .map(|entry| (entry.path().name().to_string(), entry.clone()))
            .collect()
    }

    /// Empties the directory, returning every entry it held.
    pub fn drain(&self) -> Vec<Entry> {
        self.state().entries.drain().map(|(_, entry)| entry).collect()
    }

    pub fn len(&self) -> usize {
        self.state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
