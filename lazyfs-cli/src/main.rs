use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use lazyfs_core::naming::{existing_patterns, parse_size, MockName};
use lazyfs_core::{FallbackPattern, LazyConfig, LogLevel, Pattern};
use rand::Rng;
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "lazyfs")]
#[command(about = "A virtual filesystem serving huge synthetic files from memory")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mount a lazyfs filesystem
    Mount {
        /// Mount point for the virtual filesystem
        mountpoint: PathBuf,

        /// Real directory holding .mhash and .mbinmap files
        #[arg(short, long)]
        realstore: Option<PathBuf>,

        /// Write the log to this file instead of stderr
        #[arg(short, long)]
        logfile: Option<PathBuf>,

        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Let other users access the mount
        #[arg(long)]
        allow_other: bool,

        /// Pattern for names without a hex prefix: counter, reject or 8 hex digits
        #[arg(long)]
        fallback: Option<FallbackPattern>,

        /// Log level (overrides RUST_LOG)
        #[arg(long)]
        log_level: Option<LogLevel>,
    },

    /// Create empty synthetic files named <pattern>_<size>_<chunksize>
    Mocks {
        /// Directory to create the files in, usually a mount point
        dir: PathBuf,

        /// Number of files to create
        nfiles: usize,

        /// Size of every file, e.g. 1gb
        size: String,

        /// Chunk size recorded in the names
        chunksize: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Mount {
            mountpoint,
            realstore,
            logfile,
            config,
            allow_other,
            fallback,
            log_level,
        } => {
            let from_file = config.is_some();
            let mut config = match config {
                Some(path) => LazyConfig::load(&path)
                    .with_context(|| format!("Failed to load config {}", path.display()))?,
                None => LazyConfig::default(),
            };
            if let Some(realstore) = realstore {
                config.backing_dir = realstore;
            }
            if logfile.is_some() {
                config.log_file = logfile;
            }
            if let Some(fallback) = fallback {
                config.fallback_pattern = fallback;
            }
            config.allow_other |= allow_other;

            let level = log_level.or_else(|| from_file.then_some(config.log_level));
            init_tracing(level, config.log_file.as_deref())?;
            mount_filesystem(config, &mountpoint).await?;
        }
        Commands::Mocks {
            dir,
            nfiles,
            size,
            chunksize,
        } => {
            init_tracing(None, None)?;
            create_mocks(&dir, nfiles, &size, &chunksize)?;
        }
    }

    Ok(())
}

fn init_tracing(level: Option<LogLevel>, log_file: Option<&Path>) -> Result<()> {
    let filter = match level {
        Some(level) => EnvFilter::new(format!("lazyfs={}", level)),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| "lazyfs=info".into()),
    };

    let (file_layer, stderr_layer) = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            let layer = fmt::layer().with_writer(Mutex::new(file)).with_ansi(false);
            (Some(layer), None)
        }
        None => (None, Some(fmt::layer().with_writer(std::io::stderr))),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();
    Ok(())
}

fn refuse_root() -> Result<()> {
    // SAFETY: geteuid has no preconditions and cannot fail.
    if unsafe { libc::geteuid() } == 0 {
        bail!("Running lazyfs as root opens unacceptable security holes");
    }
    Ok(())
}

#[cfg(target_os = "linux")]
async fn mount_filesystem(mut config: LazyConfig, mountpoint: &Path) -> Result<()> {
    refuse_root()?;

    if config.backing_dir.as_os_str().is_empty() {
        bail!("A backing directory is required (--realstore PATH)");
    }
    config
        .resolve_backing_dir()
        .with_context(|| format!("Invalid backing directory {}", config.backing_dir.display()))?;
    config
        .validate()
        .map_err(|errors| anyhow!(errors.join("; ")))?;

    println!("mountpoint: {}", mountpoint.display());
    println!("realstore: {}", config.backing_dir.display());

    let handle = lazyfs_linux::mount(&config, mountpoint)?;
    info!("Press Ctrl-C to unmount");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    let closed = handle.unmount();
    info!("Unmounted, closed {} leftover backing files", closed);
    Ok(())
}

#[cfg(not(target_os = "linux"))]
async fn mount_filesystem(_config: LazyConfig, _mountpoint: &Path) -> Result<()> {
    refuse_root()?;
    bail!("Mounting is only supported on Linux");
}

/// Draws `count` random patterns not already in `taken`, recording each.
fn random_patterns<R: Rng>(rng: &mut R, taken: &mut HashSet<Pattern>, count: usize) -> Result<Vec<Pattern>> {
    let available = (1u64 << 32).saturating_sub(taken.len() as u64);
    if count as u64 > available {
        bail!("Only {} unused patterns remain, {} requested", available, count);
    }

    let mut patterns = Vec::with_capacity(count);
    while patterns.len() < count {
        let pattern = Pattern::new(rng.gen());
        if taken.insert(pattern) {
            patterns.push(pattern);
        }
    }
    Ok(patterns)
}

fn create_mocks(dir: &Path, nfiles: usize, size: &str, chunksize: &str) -> Result<()> {
    let bytes = parse_size(size)?;
    let mut taken = existing_patterns(dir, size, chunksize)
        .with_context(|| format!("Failed to scan {}", dir.display()))?;

    info!("Generating sample of {} unique patterns", nfiles);
    let patterns = random_patterns(&mut rand::thread_rng(), &mut taken, nfiles)?;

    info!("Creating files");
    let progress_every = (nfiles / 10).max(1);
    for (i, pattern) in patterns.into_iter().enumerate() {
        if i % progress_every == 0 {
            info!("Files created so far: {}", i);
        }
        let name = MockName::new(pattern, size, chunksize);
        let path = dir.join(name.to_string());
        let file = File::create(&path).with_context(|| format!("Failed to create {}", path.display()))?;
        file.set_len(bytes)?;
    }
    info!("Created {} files in {}", nfiles, dir.display());
    Ok(())
}
