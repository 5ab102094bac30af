//! Read and write semantics of files that only exist in memory.
//!
//! A synthetic file is nothing but a size and a 4-byte pattern. Reads
//! inside the size return the pattern, aligned to absolute file offsets;
//! reads straddling the end are padded with zeros; writes only move the
//! end of the file.

use crate::directory::{Entry, Pattern};
use crate::error::{LazyError, Result};
use crate::types::FallbackPattern;
use bytes::Bytes;

/// Produces the bytes a client sees when reading `length` bytes at `offset`.
///
/// Starting at or past the end of the file yields no bytes at all. Any
/// other read yields exactly `length` bytes: pattern bytes up to the end
/// of the file, zeros after it.
pub fn read(entry: &Entry, offset: u64, length: usize) -> Bytes {
    let size = entry.size();
    if offset >= size {
        return Bytes::new();
    }

    let pattern = entry.pattern();
    let available = (size - offset).min(length as u64) as usize;

    let mut buf = Vec::with_capacity(length);
    buf.extend((0..available as u64).map(|i| pattern.byte_at(offset + i)));
    buf.resize(length, 0);
    Bytes::from(buf)
}

/// Accepts a write of `length` bytes at `offset`, discarding the payload.
///
/// The file grows to cover the written range; writes inside the current
/// size leave it unchanged. The full length is always reported written.
pub fn write(entry: &mut Entry, offset: u64, length: usize) -> Result<usize> {
    let end = offset.checked_add(length as u64).ok_or_else(|| {
        LazyError::invalid(entry.path(), format!("write past end of addressable range at offset {}", offset))
    })?;

    if end > entry.size() {
        entry.set_size(end);
    }
    Ok(length)
}

/// Sets the size unconditionally, growing or shrinking the file.
pub fn truncate(entry: &mut Entry, new_size: u64) {
    entry.set_size(new_size);
}

/// Picks the pattern of a newly created synthetic file from its name.
pub fn derive_pattern(name: &str, sequence_id: u64, fallback: FallbackPattern) -> Result<Pattern> {
    if let Some(pattern) = Pattern::from_name(name) {
        return Ok(pattern);
    }

    match fallback {
        FallbackPattern::Counter => Ok(Pattern::from_sequence(sequence_id)),
        FallbackPattern::Fixed(bytes) => Ok(Pattern::new(bytes)),
        FallbackPattern::Reject => Err(LazyError::invalid(
            name,
            "synthetic file names must start with 8 hex characters",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VirtualPath;

    fn deadbeef(size: u64) -> Entry {
        let mut entry = Entry::synthetic(
            VirtualPath::from("/deadbeef"),
            Pattern::new([0xde, 0xad, 0xbe, 0xef]),
            1,
        );
        truncate(&mut entry, size);
        entry
    }

    #[test]
    fn test_read_whole_file() {
        let entry = deadbeef(10);
        let data = read(&entry, 0, 10);
        assert_eq!(
            &data[..],
            &[0xde, 0xad, 0xbe, 0xef, 0xde, 0xad, 0xbe, 0xef, 0xde, 0xad]
        );
    }

    #[test]
    fn test_read_straddling_end_pads_with_zeros() {
        let entry = deadbeef(10);
        let data = read(&entry, 8, 4);
        assert_eq!(&data[..], &[0xde, 0xad, 0x00, 0x00]);

        // Pattern is aligned to absolute offsets, not to the read start
        let data = read(&entry, 3, 9);
        assert_eq!(
            &data[..],
            &[0xef, 0xde, 0xad, 0xbe, 0xef, 0xde, 0xad, 0x00, 0x00]
        );
    }

    #[test]
    fn test_read_at_or_past_end_is_empty() {
        let entry = deadbeef(10);
        assert!(read(&entry, 10, 4).is_empty());
        assert!(read(&entry, 11, 4).is_empty());
        assert!(read(&deadbeef(0), 0, 4096).is_empty());
    }

    #[test]
    fn test_read_straddling_property() {
        let entry = deadbeef(1000);
        for offset in [0u64, 1, 499, 997, 999] {
            for length in [1usize, 3, 64, 4096] {
                let data = read(&entry, offset, length);
                assert_eq!(data.len(), length);
                let inside = (1000 - offset).min(length as u64) as usize;
                for (i, byte) in data.iter().enumerate() {
                    if i < inside {
                        assert_eq!(*byte, entry.pattern().byte_at(offset + i as u64));
                    } else {
                        assert_eq!(*byte, 0);
                    }
                }
            }
        }
    }

    #[test]
    fn test_read_exabyte_file() {
        let entry = deadbeef(1 << 60);
        let data = read(&entry, (1 << 60) - 2, 4);
        assert_eq!(&data[..], &[0xbe, 0xef, 0x00, 0x00]);
    }

    #[test]
    fn test_write_grows_only() {
        let mut entry = deadbeef(10);
        let pattern = entry.pattern();

        assert_eq!(write(&mut entry, 2, 4).unwrap(), 4);
        assert_eq!(entry.size(), 10);

        assert_eq!(write(&mut entry, 8, 100).unwrap(), 100);
        assert_eq!(entry.size(), 108);
        assert_eq!(entry.pattern(), pattern);

        // Sparse write far past the end
        write(&mut entry, 1 << 40, 1).unwrap();
        assert_eq!(entry.size(), (1 << 40) + 1);
    }

    #[test]
    fn test_write_overflow() {
        let mut entry = deadbeef(0);
        let result = write(&mut entry, u64::MAX, 2);
        assert!(matches!(result, Err(LazyError::InvalidArgument { .. })));
        assert_eq!(entry.size(), 0);
    }

    #[test]
    fn test_truncate_idempotent() {
        let mut entry = deadbeef(10);
        truncate(&mut entry, 4);
        let once = read(&entry, 0, 8);
        truncate(&mut entry, 4);
        assert_eq!(entry.size(), 4);
        assert_eq!(read(&entry, 0, 8), once);

        truncate(&mut entry, 1 << 50);
        assert_eq!(entry.size(), 1 << 50);
    }

    #[test]
    fn test_derive_pattern() {
        let pattern = derive_pattern("deadbeef_1gb_1024", 9, FallbackPattern::Reject).unwrap();
        assert_eq!(pattern.bytes(), [0xde, 0xad, 0xbe, 0xef]);

        let pattern = derive_pattern("short", 0x0a0b, FallbackPattern::Counter).unwrap();
        assert_eq!(pattern.bytes(), [0, 0, 0x0a, 0x0b]);

        let pattern = derive_pattern("short", 1, FallbackPattern::Fixed([9, 9, 9, 9])).unwrap();
        assert_eq!(pattern.bytes(), [9, 9, 9, 9]);

        let result = derive_pattern("short", 1, FallbackPattern::Reject);
        assert!(matches!(result, Err(LazyError::InvalidArgument { .. })));
    }
}
