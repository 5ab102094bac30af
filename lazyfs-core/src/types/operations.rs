use std::fmt;

/// A handle to an open file, as handed to the host runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileHandle(u64);

impl FileHandle {
    /// Creates a new FileHandle with the given ID.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying handle ID.
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileHandle({})", self.0)
    }
}

/// Flags for opening or creating a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpenFlags(u32);

impl OpenFlags {
    /// Read access flag
    pub const READ: Self = Self(1 << 0);
    /// Write access flag
    pub const WRITE: Self = Self(1 << 1);
    /// Create file if it doesn't exist
    pub const CREATE: Self = Self(1 << 2);
    /// Truncate file to zero length
    pub const TRUNCATE: Self = Self(1 << 3);
    /// Exclusive creation (fail if file exists)
    pub const EXCLUSIVE: Self = Self(1 << 4);

    /// Creates an empty set of flags.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Creates a set containing all flags.
    pub const fn all() -> Self {
        Self(Self::READ.0 | Self::WRITE.0 | Self::CREATE.0 | Self::TRUNCATE.0 | Self::EXCLUSIVE.0)
    }

    /// Returns the raw value of the flags.
    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// Creates flags from raw bits, truncating invalid bits.
    pub const fn from_bits_truncate(bits: u32) -> Self {
        Self(bits & Self::all().0)
    }

    /// Translates `open(2)` flags.
    pub fn from_libc(flags: i32) -> Self {
        let mut result = match flags & libc::O_ACCMODE {
            libc::O_WRONLY => Self::WRITE,
            libc::O_RDWR => Self::READ | Self::WRITE,
            _ => Self::READ,
        };
        if flags & libc::O_CREAT != 0 {
            result |= Self::CREATE;
        }
        if flags & libc::O_TRUNC != 0 {
            result |= Self::TRUNCATE;
        }
        if flags & libc::O_EXCL != 0 {
            result |= Self::EXCLUSIVE;
        }
        result
    }

    /// Returns true if no flags are set.
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Returns true if all flags in `other` are set.
    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Exclusive creation needs both O_CREAT and O_EXCL.
    pub const fn is_exclusive_create(&self) -> bool {
        self.contains(Self::CREATE.union(Self::EXCLUSIVE))
    }

    /// Inserts the specified flags.
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// Returns the union of the flags.
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl Default for OpenFlags {
    fn default() -> Self {
        Self::empty()
    }
}

impl std::ops::BitOr for OpenFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl std::ops::BitOrAssign for OpenFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.insert(rhs);
    }
}
