//! Naming convention of synthetic files: `<pattern>_<size>_<chunksize>`.
//!
//! The filesystem itself only looks at the 8 hex characters of the
//! pattern; the size and chunk size fields are for the tools that generate
//! and consume mock content.

use crate::directory::Pattern;
use crate::error::{LazyError, Result};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;

const SIZE_UNITS: [(&str, u64); 4] = [
    ("tb", 1 << 40),
    ("gb", 1 << 30),
    ("mb", 1 << 20),
    ("kb", 1 << 10),
];

/// A parsed `<pattern>_<size>_<chunksize>` file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockName {
    pub pattern: Pattern,
    pub size: String,
    pub chunk_size: String,
}

impl MockName {
    pub fn new(pattern: Pattern, size: impl Into<String>, chunk_size: impl Into<String>) -> Self {
        Self {
            pattern,
            size: size.into(),
            chunk_size: chunk_size.into(),
        }
    }

    /// Splits a file name into its three fields.
    ///
    /// Returns `None` for names with a different number of fields or a
    /// pattern field that is not exactly 8 hex digits.
    pub fn parse(name: &str) -> Option<Self> {
        let mut fields = name.split('_');
        let (pattern, size, chunk_size) = (fields.next()?, fields.next()?, fields.next()?);
        if fields.next().is_some() || pattern.len() != 8 {
            return None;
        }

        Some(Self::new(Pattern::from_name(pattern)?, size, chunk_size))
    }

    /// Size in bytes announced by the name.
    pub fn size_bytes(&self) -> Result<u64> {
        parse_size(&self.size)
    }
}

impl fmt::Display for MockName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.pattern, self.size, self.chunk_size)
    }
}

/// Parses sizes such as `4kb`, `1GB` or plain byte counts.
pub fn parse_size(size: &str) -> Result<u64> {
    let lower = size.trim().to_ascii_lowercase();
    let invalid = || LazyError::invalid(size, "expected a size such as 512, 64kb or 1gb");

    let (digits, multiplier) = SIZE_UNITS
        .iter()
        .find_map(|(unit, multiplier)| lower.strip_suffix(unit).map(|d| (d, *multiplier)))
        .unwrap_or((lower.as_str(), 1));

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let value: u64 = digits.parse().map_err(|_| invalid())?;
    value.checked_mul(multiplier).ok_or_else(invalid)
}

/// Shortest exact rendering of `bytes` using the largest fitting unit.
pub fn compact_size(bytes: u64) -> String {
    SIZE_UNITS
        .iter()
        .find(|(_, multiplier)| bytes > 0 && bytes % multiplier == 0)
        .map(|(unit, multiplier)| format!("{}{}", bytes / multiplier, unit))
        .unwrap_or_else(|| bytes.to_string())
}

/// Patterns already used in `dir` by files with the given size and chunk
/// size fields. Names that do not follow the convention are skipped.
pub fn existing_patterns(dir: &Path, size: &str, chunk_size: &str) -> Result<HashSet<Pattern>> {
    let mut patterns = HashSet::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        let Some(parsed) = name.to_str().and_then(MockName::parse) else {
            continue;
        };
        if parsed.size == size && parsed.chunk_size == chunk_size {
            patterns.insert(parsed.pattern);
        }
    }
    Ok(patterns)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_name() {
        let name = MockName::parse("deadbeef_1gb_1024").unwrap();
        assert_eq!(name.pattern, Pattern::new([0xde, 0xad, 0xbe, 0xef]));
        assert_eq!(name.size, "1gb");
        assert_eq!(name.chunk_size, "1024");
        assert_eq!(name.size_bytes().unwrap(), 1 << 30);
        assert_eq!(name.to_string(), "deadbeef_1gb_1024");

        assert!(MockName::parse("deadbeef").is_none());
        assert!(MockName::parse("deadbeef_1gb").is_none());
        assert!(MockName::parse("deadbeef_1gb_1024_x").is_none());
        assert!(MockName::parse("deadbeef00_1gb_1024").is_none());
        assert!(MockName::parse("nothexxx_1gb_1024").is_none());
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("512").unwrap(), 512);
        assert_eq!(parse_size("4kb").unwrap(), 4096);
        assert_eq!(parse_size("10MB").unwrap(), 10 << 20);
        assert_eq!(parse_size("2tb").unwrap(), 2 << 40);

        assert!(parse_size("").is_err());
        assert!(parse_size("kb").is_err());
        assert!(parse_size("-1kb").is_err());
        assert!(parse_size("1pb").is_err());
        assert!(parse_size("99999999999tb").is_err());
    }

    #[test]
    fn test_compact_size() {
        assert_eq!(compact_size(1 << 30), "1gb");
        assert_eq!(compact_size(3 << 20), "3mb");
        assert_eq!(compact_size(1536), "1536");
        assert_eq!(compact_size(2048), "2kb");
        assert_eq!(compact_size(0), "0");
    }

    #[test]
    fn test_existing_patterns() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["deadbeef_1gb_1024", "cafebabe_1gb_1024", "00000001_1mb_1024", "readme.txt"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        fs::create_dir(dir.path().join("0badf00d_1gb_1024")).unwrap();

        let patterns = existing_patterns(dir.path(), "1gb", "1024").unwrap();
        assert_eq!(patterns.len(), 2);
        assert!(patterns.contains(&Pattern::new([0xca, 0xfe, 0xba, 0xbe])));
    }
}
