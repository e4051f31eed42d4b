//! Configuration types for pfind
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - The immutable run configuration shared by every worker
//! - Freshness baseline acquisition from the timestamp file

use crate::error::ConfigError;
use crate::walker::filter::FilterPolicy;
use crate::walker::item::DEFAULT_MAX_PATH_LEN;
use clap::Parser;
use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Maximum reasonable worker count
const MAX_WORKERS: usize = 1024;

/// Highest supported verbosity level
pub const MAX_VERBOSITY: u8 = 2;

/// Smallest accepted path length limit
const MIN_PATH_LEN: usize = 256;

/// Size an eligible file must have unless overridden
pub const DEFAULT_EXPECTED_SIZE: u64 = 3900;

/// Timestamp file looked up under the work directory
pub const DEFAULT_TIMESTAMP_FILE: &str = "IO500_TIMESTAMP";

/// Parallel recursive find/delete with stonewall cutoff
#[derive(Parser, Debug, Clone)]
#[command(
    name = "pfind",
    version,
    about = "Parallel recursive find/delete with work stealing and stonewall cutoff",
    long_about = "Walks a directory tree with a pool of work-stealing workers.\n\n\
                  In find mode every entry is stat'ed and regular files of the expected size \
                  whose ctime is not older than the timestamp file are counted.\n\
                  In delete mode every entry below the root is removed.",
    after_help = "EXAMPLES:\n    \
        pfind /scratch/run-1\n    \
        pfind /scratch/run-1 -w 32 --stonewall 300 --name 01\n    \
        pfind /scratch/run-1 --size 4096 --timestamp-file /scratch/STAMP --json\n    \
        pfind /scratch/run-1 --delete"
)]
pub struct CliArgs {
    /// Directory to traverse
    #[arg(value_name = "WORKDIR")]
    pub workdir: PathBuf,

    /// Remove every entry below WORKDIR instead of counting matches
    #[arg(long)]
    pub delete: bool,

    /// Stop expanding directories after this many seconds (0 = no limit)
    #[arg(short = 's', long, default_value = "0", value_name = "SECS")]
    pub stonewall: u64,

    /// Number of worker threads
    #[arg(
        short = 'w',
        long,
        default_value_t = default_workers(),
        value_name = "NUM"
    )]
    pub workers: usize,

    /// Exact size in bytes a matching file must have
    #[arg(long, default_value_t = DEFAULT_EXPECTED_SIZE, value_name = "BYTES")]
    pub size: u64,

    /// Only consider non-directory entries whose name contains this substring
    #[arg(short = 'n', long, value_name = "SUBSTR")]
    pub name: Option<String>,

    /// File whose ctime is the freshness floor (default: WORKDIR/IO500_TIMESTAMP)
    #[arg(long, value_name = "PATH")]
    pub timestamp_file: Option<PathBuf>,

    /// Longest path a work item may carry
    #[arg(long, default_value_t = DEFAULT_MAX_PATH_LEN, value_name = "BYTES")]
    pub max_path_len: usize,

    /// Verbosity: -v logs stat errors, -vv logs every stat and its outcome
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode - suppress header and progress output
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

fn default_workers() -> usize {
    num_cpus::get()
}

/// Traversal mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Stat every entry and count matching files
    Find,
    /// Remove every entry below the root
    Delete,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Find => "find",
            Mode::Delete => "delete",
        }
    }
}

/// Validated runtime configuration
///
/// Built once before any worker starts and shared read-only afterwards.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Canonical absolute traversal root
    pub root: PathBuf,

    /// Find or delete
    pub mode: Mode,

    /// Number of workers
    pub worker_count: usize,

    /// Stonewall budget (zero disables)
    pub stonewall: Duration,

    /// Logging verbosity (0-2)
    pub verbosity: u8,

    /// Match policy for find mode
    pub policy: FilterPolicy,

    /// Longest path a work token may carry
    pub max_path_len: usize,

    /// Show header and progress
    pub show_progress: bool,

    /// Emit the result as JSON
    pub json: bool,
}

impl RunConfig {
    /// Resolve `workdir` and build a configuration with default settings.
    ///
    /// Fails if the root cannot be canonicalized or listed.
    pub fn new(workdir: impl AsRef<Path>, mode: Mode) -> Result<Self, ConfigError> {
        let root = resolve_root(workdir.as_ref())?;

        Ok(Self {
            root,
            mode,
            worker_count: default_workers().clamp(1, MAX_WORKERS),
            stonewall: Duration::ZERO,
            verbosity: 0,
            policy: FilterPolicy::default(),
            max_path_len: DEFAULT_MAX_PATH_LEN,
            show_progress: false,
            json: false,
        })
    }

    /// Create and validate configuration from CLI arguments
    pub fn from_args(args: CliArgs) -> Result<Self, ConfigError> {
        let mode = if args.delete { Mode::Delete } else { Mode::Find };

        let mut config = Self::new(&args.workdir, mode)?;

        // The baseline is only needed to filter, so delete mode skips it
        let freshness_floor = match mode {
            Mode::Find => {
                let stamp = args
                    .timestamp_file
                    .clone()
                    .unwrap_or_else(|| config.root.join(DEFAULT_TIMESTAMP_FILE));
                read_freshness_floor(&stamp)?
            }
            Mode::Delete => i64::MIN,
        };

        config.policy = FilterPolicy {
            expected_size: args.size,
            freshness_floor,
            name_substring: args.name.filter(|s| !s.is_empty()),
        };

        let mut config = config
            .with_workers(args.workers)?
            .with_verbosity(args.verbose)?
            .with_max_path_len(args.max_path_len)?
            .with_stonewall(Duration::from_secs(args.stonewall));

        config.show_progress = !args.quiet && !args.json;
        config.json = args.json;

        Ok(config)
    }

    /// Set the worker count
    pub fn with_workers(mut self, workers: usize) -> Result<Self, ConfigError> {
        if workers == 0 || workers > MAX_WORKERS {
            return Err(ConfigError::InvalidWorkerCount {
                count: workers,
                max: MAX_WORKERS,
            });
        }
        self.worker_count = workers;
        Ok(self)
    }

    /// Set the logging verbosity
    pub fn with_verbosity(mut self, verbosity: u8) -> Result<Self, ConfigError> {
        if verbosity > MAX_VERBOSITY {
            return Err(ConfigError::InvalidVerbosity {
                level: verbosity,
                max: MAX_VERBOSITY,
            });
        }
        self.verbosity = verbosity;
        Ok(self)
    }

    /// Set the path length limit
    pub fn with_max_path_len(mut self, len: usize) -> Result<Self, ConfigError> {
        if len < MIN_PATH_LEN {
            return Err(ConfigError::InvalidPathLimit {
                len,
                min: MIN_PATH_LEN,
            });
        }
        self.max_path_len = len;
        Ok(self)
    }

    /// Set the stonewall budget
    pub fn with_stonewall(mut self, budget: Duration) -> Self {
        self.stonewall = budget;
        self
    }

    /// Replace the match policy
    pub fn with_policy(mut self, policy: FilterPolicy) -> Self {
        self.policy = policy;
        self
    }
}

/// Canonicalize the root and make sure it can be listed
fn resolve_root(workdir: &Path) -> Result<PathBuf, ConfigError> {
    let root = fs::canonicalize(workdir).map_err(|e| ConfigError::UnresolvableRoot {
        path: workdir.to_path_buf(),
        reason: e.to_string(),
    })?;

    fs::read_dir(&root).map_err(|e| ConfigError::UnreadableRoot {
        path: root.clone(),
        reason: e.to_string(),
    })?;

    Ok(root)
}

/// Status-change time of `path` in whole seconds, without following symlinks
pub fn read_freshness_floor(path: &Path) -> Result<i64, ConfigError> {
    fs::symlink_metadata(path)
        .map(|meta| meta.ctime())
        .map_err(|e| ConfigError::TimestampUnreadable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}
