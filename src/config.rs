//! Configuration types for blob-sweep
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - Runtime configuration with validation

use crate::error::ConfigError;
use crate::job::KeyMapper;
use crate::upload::retry::DEFAULT_MAX_ATTEMPTS;
use crate::upload::RetryPolicy;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Maximum reasonable worker count
const MAX_WORKERS: usize = 512;

/// Default worker count
pub const DEFAULT_WORKERS: usize = 8;

/// Maximum retry ceiling
const MAX_ATTEMPTS: u32 = 100;

/// Minimum bounded queue size
const MIN_QUEUE_SIZE: usize = 1;

/// Bulk-upload a directory tree to an object store
#[derive(Parser, Debug, Clone)]
#[command(
    name = "blob-sweep",
    version,
    about = "Bulk-upload a local directory tree to an object store",
    long_about = "Walks a local directory tree and uploads every regular file with a fixed pool \
                  of workers.\n\n\
                  Each file is retried up to --max-attempts times. Files that still fail are \
                  appended to the failure log; they never stop the rest of the run.",
    after_help = "EXAMPLES:\n    \
        blob-sweep BACKUP_HINHANH/ -c categories-dev\n    \
        blob-sweep /srv/photos -c photos -w 16 -r 3 --strip-root --key-prefix 2024\n    \
        blob-sweep ./data -c test --dry-run -v"
)]
pub struct CliArgs {
    /// Directory tree to upload
    #[arg(value_name = "ROOT")]
    pub root: PathBuf,

    /// Destination container
    #[arg(short = 'c', long, value_name = "NAME")]
    pub container: String,

    /// Root directory of the local object store
    #[arg(long = "store", default_value = "blob-store", value_name = "DIR")]
    pub store: PathBuf,

    /// Number of upload workers
    #[arg(short = 'w', long, default_value_t = DEFAULT_WORKERS, value_name = "NUM")]
    pub workers: usize,

    /// Attempts per file before it is recorded as failed
    #[arg(short = 'r', long, default_value_t = DEFAULT_MAX_ATTEMPTS, value_name = "NUM")]
    pub max_attempts: u32,

    /// Base delay between attempts in milliseconds, doubled per retry (0 = immediate)
    #[arg(long, default_value = "0", value_name = "MS")]
    pub retry_delay_ms: u64,

    /// Bound the job queue (unbounded if not set)
    #[arg(long, value_name = "NUM")]
    pub queue_size: Option<usize>,

    /// File that permanently failed uploads are appended to
    #[arg(long, default_value = "log_error.txt", value_name = "FILE")]
    pub failure_log: PathBuf,

    /// Make destination keys relative to ROOT
    #[arg(long)]
    pub strip_root: bool,

    /// Prefix prepended to every destination key
    #[arg(long, value_name = "PREFIX")]
    pub key_prefix: Option<String>,

    /// Read every file but store nothing
    #[arg(long)]
    pub dry_run: bool,

    /// Quiet mode - suppress progress output
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Verbose output (debug logging)
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Directory tree to upload
    pub root: PathBuf,

    /// Destination container
    pub container: String,

    /// Local object store root
    pub store_path: PathBuf,

    /// Number of upload workers
    pub worker_count: usize,

    /// Retry ceiling per file
    pub max_attempts: u32,

    /// Base backoff between attempts
    pub retry_delay: Duration,

    /// Queue bound (`None` = unbounded)
    pub queue_size: Option<usize>,

    /// Failure log path
    pub failure_log: PathBuf,

    /// Keys relative to root
    pub strip_root: bool,

    /// Key prefix
    pub key_prefix: Option<String>,

    /// Read-only run
    pub dry_run: bool,

    /// Show progress indicator
    pub show_progress: bool,

    /// Verbose logging
    pub verbose: bool,
}

impl SweepConfig {
    /// Configuration with defaults for everything but root and container
    pub fn new(root: impl Into<PathBuf>, container: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            container: container.into(),
            store_path: PathBuf::from("blob-store"),
            worker_count: DEFAULT_WORKERS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: Duration::ZERO,
            queue_size: None,
            failure_log: PathBuf::from("log_error.txt"),
            strip_root: false,
            key_prefix: None,
            dry_run: false,
            show_progress: false,
            verbose: false,
        }
    }

    /// Create and validate configuration from CLI arguments
    pub fn from_args(args: CliArgs) -> Result<Self, ConfigError> {
        let config = Self {
            root: args.root,
            container: args.container,
            store_path: args.store,
            worker_count: args.workers,
            max_attempts: args.max_attempts,
            retry_delay: Duration::from_millis(args.retry_delay_ms),
            queue_size: args.queue_size,
            failure_log: args.failure_log,
            strip_root: args.strip_root,
            key_prefix: args.key_prefix,
            dry_run: args.dry_run,
            show_progress: !args.quiet,
            verbose: args.verbose,
        };

        config.validate()?;
        Ok(config)
    }

    /// Check limits and paths
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_count == 0 || self.worker_count > MAX_WORKERS {
            return Err(ConfigError::InvalidWorkerCount {
                count: self.worker_count,
                max: MAX_WORKERS,
            });
        }

        if self.max_attempts == 0 || self.max_attempts > MAX_ATTEMPTS {
            return Err(ConfigError::InvalidMaxAttempts {
                attempts: self.max_attempts,
                max: MAX_ATTEMPTS,
            });
        }

        if let Some(size) = self.queue_size {
            if size < MIN_QUEUE_SIZE {
                return Err(ConfigError::InvalidQueueSize {
                    size,
                    min: MIN_QUEUE_SIZE,
                });
            }
        }

        if !self.root.is_dir() {
            return Err(ConfigError::InvalidRoot {
                path: self.root.clone(),
                reason: "does not exist or is not a directory".into(),
            });
        }

        // Validate failure log location
        if let Some(parent) = self.failure_log.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                return Err(ConfigError::InvalidFailureLog {
                    path: self.failure_log.clone(),
                    reason: format!("Parent directory '{}' does not exist", parent.display()),
                });
            }
        }

        Ok(())
    }

    /// Key mapping described by this configuration
    pub fn key_mapper(&self) -> KeyMapper {
        let mut mapper = KeyMapper::identity();
        if self.strip_root {
            mapper = mapper.strip_root(&self.root);
        }
        if let Some(prefix) = &self.key_prefix {
            mapper = mapper.with_prefix(prefix.as_str());
        }
        mapper
    }

    /// Paths this run writes to, which must never be uploaded
    pub fn output_paths(&self) -> Vec<PathBuf> {
        let mut paths = vec![self.failure_log.clone()];
        if !self.dry_run {
            paths.push(self.store_path.clone());
        }
        paths
    }

    /// Retry policy described by this configuration
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts).with_backoff(self.retry_delay)
    }
}
