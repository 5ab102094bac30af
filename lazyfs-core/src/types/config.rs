//! Configuration types for LazyFS.

use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use crate::error::{LazyError, Result};

/// Log level for the LazyFS daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only log errors
    Error,
    /// Log errors and warnings
    Warn,
    /// Log errors, warnings, and informational messages
    Info,
    /// Log errors, warnings, info, and debug messages
    Debug,
    /// Log everything including trace-level details
    Trace,
}

impl LogLevel {
    /// Returns the string representation of the log level.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(format!("Unknown log level: {}", s)),
        }
    }
}

/// What to do when a synthetic file name does not start with 8 hex digits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "policy", content = "pattern")]
pub enum FallbackPattern {
    /// Use the entry's sequence id (big-endian) as its pattern.
    #[default]
    Counter,
    /// Use the given bytes for every such file.
    Fixed([u8; 4]),
    /// Refuse to create the file.
    Reject,
}

impl std::str::FromStr for FallbackPattern {
    type Err = String;

    /// Accepts `counter`, `reject` or eight hex digits for a fixed pattern.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "counter" => Ok(FallbackPattern::Counter),
            "reject" => Ok(FallbackPattern::Reject),
            other => crate::directory::Pattern::from_name(other)
                .filter(|_| other.len() == 8)
                .map(|p| FallbackPattern::Fixed(p.bytes()))
                .ok_or_else(|| format!("Unknown fallback pattern: {}", s)),
        }
    }
}

/// Runtime configuration of a mount.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LazyConfig {
    /// Real directory holding the delegated metadata files
    pub backing_dir: PathBuf,

    /// Pattern policy for names without a hex prefix
    pub fallback_pattern: FallbackPattern,

    /// Logging level
    pub log_level: LogLevel,

    /// Optional log file path (logs to stderr if None)
    pub log_file: Option<PathBuf>,

    /// Let users other than the mounter access the mount
    pub allow_other: bool,

    /// Unmount automatically when the process exits
    pub auto_unmount: bool,
}

impl Default for LazyConfig {
    fn default() -> Self {
        Self {
            backing_dir: PathBuf::new(),
            fallback_pattern: FallbackPattern::Counter,
            log_level: LogLevel::Info,
            log_file: None,
            allow_other: false,
            auto_unmount: true,
        }
    }
}

impl LazyConfig {
    /// Creates a config for the given backing directory.
    pub fn new(backing_dir: impl Into<PathBuf>) -> Self {
        Self {
            backing_dir: backing_dir.into(),
            ..Self::default()
        }
    }

    /// Sets the fallback pattern policy.
    pub fn fallback_pattern(mut self, policy: FallbackPattern) -> Self {
        self.fallback_pattern = policy;
        self
    }

    /// Loads a config from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw)
            .map_err(|e| LazyError::invalid(path.display(), e.to_string()))
    }

    /// Resolves the backing directory to a canonical absolute path.
    pub fn resolve_backing_dir(&mut self) -> Result<()> {
        self.backing_dir = std::fs::canonicalize(&self.backing_dir)?;
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.backing_dir.as_os_str().is_empty() {
            errors.push("Backing directory must be specified (realstore=PATH)".to_string());
        } else if !self.backing_dir.is_absolute() {
            errors.push(format!("Backing directory must be absolute: {:?}", self.backing_dir));
        } else if !self.backing_dir.is_dir() {
            errors.push(format!("Backing directory does not exist: {:?}", self.backing_dir));
        }

        // Check log file parent directory exists if specified
        if let Some(log_file) = &self.log_file {
            if let Some(parent) = log_file.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    errors.push(format!("Log file directory does not exist: {:?}", parent));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
