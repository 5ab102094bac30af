//! Routing of a path to the component that serves it.

/// Names ending in one of these are stored in the backing directory.
pub const DELEGATED_SUFFIXES: [&str; 2] = [".mhash", ".mbinmap"];

/// Which component serves a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathClass {
    /// The single supported directory.
    Root,
    /// Forwarded to a real file in the backing directory.
    Delegated,
    /// Served from memory.
    Synthetic,
}

/// Class of a file entry; the root never has an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryClass {
    Synthetic,
    Delegated,
}

impl PathClass {
    pub fn entry_class(self) -> Option<EntryClass> {
        match self {
            PathClass::Root => None,
            PathClass::Delegated => Some(EntryClass::Delegated),
            PathClass::Synthetic => Some(EntryClass::Synthetic),
        }
    }
}

/// Classifies a path by its final component.
pub fn classify(path: &str) -> PathClass {
    if path.is_empty() || path.bytes().all(|b| b == b'/') {
        return PathClass::Root;
    }

    let name = path.trim_end_matches('/');
    let name = name.rsplit('/').next().unwrap_or(name);
    if DELEGATED_SUFFIXES.iter().any(|suffix| name.ends_with(suffix)) {
        PathClass::Delegated
    } else {
        PathClass::Synthetic
    }
}
