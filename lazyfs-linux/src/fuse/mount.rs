//! Mount lifecycle of a LazyFS instance.

use super::filesystem::LazyFuse;
use fuser::{BackgroundSession, MountOption};
use lazyfs_core::{LazyConfig, LazyFs};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Error types for mount operations
#[derive(Debug, Error)]
pub enum MountError {
    #[error("Mount point is not a directory: {0}")]
    InvalidMountPoint(PathBuf),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Mount failed: {0}")]
    MountFailed(#[from] std::io::Error),
}

/// FUSE options derived from a mount configuration.
pub fn mount_options(config: &LazyConfig) -> Vec<MountOption> {
    let mut options = vec![
        MountOption::FSName("lazyfs".to_string()),
        MountOption::Subtype("lazyfs".to_string()),
        MountOption::RW,
    ];
    if config.allow_other {
        options.push(MountOption::AllowOther);
    }
    if config.auto_unmount {
        options.push(MountOption::AutoUnmount);
    }
    options
}

/// A running mount. Dropping it unmounts the filesystem.
pub struct MountHandle {
    mountpoint: PathBuf,
    fs: Arc<LazyFs>,
    session: BackgroundSession,
}

impl std::fmt::Debug for MountHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MountHandle")
            .field("mountpoint", &self.mountpoint)
            .field("entries", &self.fs.directory().len())
            .finish()
    }
}

impl MountHandle {
    pub fn mountpoint(&self) -> &Path {
        &self.mountpoint
    }

    pub fn fs(&self) -> &LazyFs {
        &self.fs
    }

    /// Unmounts and waits for the session to finish.
    ///
    /// Returns the number of backing files still open afterwards that had
    /// to be closed here; zero when the kernel delivered `destroy`.
    pub fn unmount(self) -> usize {
        info!("unmounting {}", self.mountpoint.display());
        self.session.join();
        self.fs.teardown()
    }
}

/// Mounts a new LazyFS instance at `mountpoint` in a background session.
pub fn mount(config: &LazyConfig, mountpoint: &Path) -> Result<MountHandle, MountError> {
    if !mountpoint.is_dir() {
        return Err(MountError::InvalidMountPoint(mountpoint.to_path_buf()));
    }
    config
        .validate()
        .map_err(|errors| MountError::InvalidConfig(errors.join("; ")))?;

    let fs = Arc::new(LazyFs::new(config));
    let session = fuser::spawn_mount2(
        LazyFuse::new(Arc::clone(&fs)),
        mountpoint,
        &mount_options(config),
    )?;

    info!(
        "mounted lazyfs at {} (backing directory {})",
        mountpoint.display(),
        config.backing_dir.display()
    );
    Ok(MountHandle {
        mountpoint: mountpoint.to_path_buf(),
        fs,
        session,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mount_options() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = LazyConfig::new(dir.path());

        let options = mount_options(&config);
        assert!(options.contains(&MountOption::FSName("lazyfs".to_string())));
        assert!(options.contains(&MountOption::AutoUnmount));
        assert!(!options.contains(&MountOption::AllowOther));

        config.allow_other = true;
        config.auto_unmount = false;
        let options = mount_options(&config);
        assert!(options.contains(&MountOption::AllowOther));
        assert!(!options.contains(&MountOption::AutoUnmount));
    }

    #[test]
    fn test_mount_rejects_bad_input() {
        let dir = tempfile::tempdir().unwrap();
        let config = LazyConfig::new(dir.path());

        let missing = dir.path().join("missing");
        assert!(matches!(
            mount(&config, &missing),
            Err(MountError::InvalidMountPoint(_))
        ));

        let unconfigured = LazyConfig::default();
        assert!(matches!(
            mount(&unconfigured, dir.path()),
            Err(MountError::InvalidConfig(_))
        ));
    }
}
