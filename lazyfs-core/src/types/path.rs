use std::fmt;

/// Longest file name accepted for an entry, in bytes.
pub const MAX_NAME_LEN: usize = 255;

/// A normalized virtual path as seen by clients of the mount.
///
/// Paths are always absolute, use `/` as separator, never carry a trailing
/// slash (except the root itself) and never contain empty components.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VirtualPath {
    inner: String,
}

impl VirtualPath {
    /// Creates a new VirtualPath, normalizing separators.
    pub fn new(path: &str) -> Self {
        let mut inner = String::with_capacity(path.len() + 1);
        for component in path.split('/').filter(|c| !c.is_empty() && *c != ".") {
            inner.push('/');
            inner.push_str(component);
        }
        if inner.is_empty() {
            inner.push('/');
        }
        Self { inner }
    }

    /// The root directory path.
    pub fn root() -> Self {
        Self { inner: "/".to_string() }
    }

    /// Builds the path of `name` directly under the root.
    pub fn child(name: &str) -> Self {
        Self::new(&format!("/{}", name))
    }

    pub fn is_root(&self) -> bool {
        self.inner == "/"
    }

    /// Final component of the path; empty for the root.
    pub fn name(&self) -> &str {
        match self.inner.rfind('/') {
            Some(idx) => &self.inner[idx + 1..],
            None => &self.inner,
        }
    }

    /// True when the path names a file directly inside the root.
    pub fn is_top_level(&self) -> bool {
        !self.is_root() && self.inner.matches('/').count() == 1
    }

    pub fn as_str(&self) -> &str {
        &self.inner
    }
}

impl fmt::Display for VirtualPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner)
    }
}

impl From<&str> for VirtualPath {
    fn from(s: &str) -> Self {
        VirtualPath::new(s)
    }
}

impl From<String> for VirtualPath {
    fn from(s: String) -> Self {
        VirtualPath::new(&s)
    }
}

impl AsRef<str> for VirtualPath {
    fn as_ref(&self) -> &str {
        &self.inner
    }
}
