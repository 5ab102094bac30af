//! Entry types held by the directory.

use crate::classify::EntryClass;
use crate::types::VirtualPath;
use std::fmt;
use std::fs::File;
use std::sync::Arc;

/// The 4-byte sequence a synthetic file repeats on every read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Pattern([u8; 4]);

impl Pattern {
    pub const fn new(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    /// Parses the leading 8 hex characters of a file name.
    ///
    /// `deadbeef_1gb_1024` yields `de ad be ef`. Returns `None` when the
    /// name is shorter than 8 characters or any of them is not a hex digit.
    pub fn from_name(name: &str) -> Option<Self> {
        let prefix = name.as_bytes().get(..8)?;
        if !prefix.iter().all(u8::is_ascii_hexdigit) {
            return None;
        }

        let mut bytes = [0u8; 4];
        for (i, pair) in prefix.chunks(2).enumerate() {
            bytes[i] = (hex_value(pair[0]) << 4) | hex_value(pair[1]);
        }
        Some(Self(bytes))
    }

    /// Pattern standing in for a name without a hex prefix.
    pub fn from_sequence(sequence_id: u64) -> Self {
        Self((sequence_id as u32).to_be_bytes())
    }

    pub fn bytes(&self) -> [u8; 4] {
        self.0
    }

    /// Byte found at absolute file position `pos`.
    #[inline]
    pub fn byte_at(&self, pos: u64) -> u8 {
        self.0[(pos % 4) as usize]
    }
}

fn hex_value(digit: u8) -> u8 {
    match digit {
        b'0'..=b'9' => digit - b'0',
        b'a'..=b'f' => digit - b'a' + 10,
        _ => digit - b'A' + 10,
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

/// An open real file shared by every client that opened the same entry.
///
/// The file is reference counted so that in-flight positioned I/O can
/// keep using it after the directory lock is released.
#[derive(Debug, Clone)]
pub struct BackingHandle {
    file: Arc<File>,
    opens: u32,
}

impl BackingHandle {
    pub fn new(file: File) -> Self {
        Self {
            file: Arc::new(file),
            opens: 1,
        }
    }

    pub fn file(&self) -> Arc<File> {
        Arc::clone(&self.file)
    }

    /// Number of client references currently held.
    pub fn opens(&self) -> u32 {
        self.opens
    }

    pub(crate) fn into_file(self) -> Arc<File> {
        self.file
    }
}

/// One live file of the mount.
#[derive(Debug, Clone)]
pub struct Entry {
    path: VirtualPath,
    class: EntryClass,
    size: u64,
    pattern: Pattern,
    backing: Option<BackingHandle>,
    sequence_id: u64,
}

impl Entry {
    /// A file that only exists in memory.
    pub fn synthetic(path: VirtualPath, pattern: Pattern, sequence_id: u64) -> Self {
        Self {
            path,
            class: EntryClass::Synthetic,
            size: 0,
            pattern,
            backing: None,
            sequence_id,
        }
    }

    /// A file forwarded to the backing directory, opened by its creator.
    pub fn delegated(path: VirtualPath, backing: BackingHandle, sequence_id: u64) -> Self {
        Self {
            path,
            class: EntryClass::Delegated,
            size: 0,
            pattern: Pattern::default(),
            backing: Some(backing),
            sequence_id,
        }
    }

    pub fn path(&self) -> &VirtualPath {
        &self.path
    }

    pub fn class(&self) -> EntryClass {
        self.class
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn set_size(&mut self, size: u64) {
        self.size = size;
    }

    pub fn pattern(&self) -> Pattern {
        self.pattern
    }

    pub fn sequence_id(&self) -> u64 {
        self.sequence_id
    }

    pub fn backing(&self) -> Option<&BackingHandle> {
        self.backing.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.backing.is_some()
    }

    pub(crate) fn set_path(&mut self, path: VirtualPath) {
        self.path = path;
    }

    /// Adds one client reference to an already open backing file.
    pub(crate) fn acquire_backing(&mut self) -> bool {
        match self.backing.as_mut() {
            Some(handle) => {
                handle.opens += 1;
                true
            }
            None => false,
        }
    }

    /// Records a freshly opened backing file.
    ///
    /// When the entry is already open the new file is dropped and the
    /// existing one gains a reference instead.
    pub(crate) fn attach_backing(&mut self, handle: BackingHandle) {
        debug_assert_eq!(self.class, EntryClass::Delegated);
        if !self.acquire_backing() {
            self.backing = Some(handle);
        }
    }

    /// Drops one client reference, handing the backing file back to be
    /// closed once the last reference is gone.
    pub(crate) fn release_backing(&mut self) -> Option<BackingHandle> {
        let handle = self.backing.as_mut()?;
        handle.opens = handle.opens.saturating_sub(1);
        if handle.opens == 0 {
            self.backing.take()
        } else {
            None
        }
    }

    /// Detaches the backing file regardless of outstanding references.
    pub(crate) fn take_backing(&mut self) -> Option<BackingHandle> {
        self.backing.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_from_name() {
        let pattern = Pattern::from_name("deadbeef").unwrap();
        assert_eq!(pattern.bytes(), [0xde, 0xad, 0xbe, 0xef]);

        let pattern = Pattern::from_name("CAFEBABE_1gb_1024").unwrap();
        assert_eq!(pattern.bytes(), [0xca, 0xfe, 0xba, 0xbe]);
        assert_eq!(pattern.to_string(), "cafebabe");

        assert!(Pattern::from_name("dead").is_none());
        assert!(Pattern::from_name("deadbeeg").is_none());
        assert!(Pattern::from_name("+deadbee").is_none());
        assert!(Pattern::from_name("dé_dbeef").is_none());
    }

    #[test]
    fn test_pattern_byte_at() {
        let pattern = Pattern::new([1, 2, 3, 4]);
        assert_eq!(pattern.byte_at(0), 1);
        assert_eq!(pattern.byte_at(5), 2);
        assert_eq!(pattern.byte_at(u64::MAX), 4);
    }

    #[test]
    fn test_pattern_from_sequence() {
        assert_eq!(Pattern::from_sequence(1).bytes(), [0, 0, 0, 1]);
        assert_eq!(Pattern::from_sequence(0x0102_0304).bytes(), [1, 2, 3, 4]);
    }

    #[test]
    fn test_backing_reference_counting() {
        let file = tempfile::tempfile().unwrap();
        let mut entry = Entry::delegated(
            VirtualPath::from("/x.mhash"),
            BackingHandle::new(file),
            1,
        );
        assert!(entry.is_open());

        // A second open shares the same file
        entry.attach_backing(BackingHandle::new(tempfile::tempfile().unwrap()));
        assert_eq!(entry.backing().unwrap().opens(), 2);

        assert!(entry.release_backing().is_none());
        assert!(entry.is_open());
        assert!(entry.release_backing().is_some());
        assert!(!entry.is_open());

        // Releasing a closed entry is harmless
        assert!(entry.release_backing().is_none());
    }

    #[test]
    fn test_synthetic_entry() {
        let entry = Entry::synthetic(VirtualPath::from("/deadbeef"), Pattern::new([0xde, 0xad, 0xbe, 0xef]), 3);
        assert_eq!(entry.class(), EntryClass::Synthetic);
        assert_eq!(entry.size(), 0);
        assert_eq!(entry.sequence_id(), 3);
        assert!(entry.backing().is_none());
    }
}
