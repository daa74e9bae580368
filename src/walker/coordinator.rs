//! Sweep coordinator - orchestrates walk, upload and completion
//!
//! The coordinator is responsible for:
//! - Opening the failure log and starting the worker pool
//! - Running the directory walk as the queue's only producer
//! - Closing the queue exactly once, after the walk has returned
//! - Waiting for every worker to drain the queue
//! - Computing the final run summary

use crate::config::SweepConfig;
use crate::error::{Result, SweepError};
use crate::failure_log::FailureLog;
use crate::upload::Uploader;
use crate::walker::scan::{TreeWalker, WalkCounters};
use crate::walker::worker::{PoolMonitor, WorkerContext, WorkerPool};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Result of a finished sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Regular files found by the walk
    pub files_discovered: u64,

    /// Directories listed
    pub dirs_walked: u64,

    /// Files uploaded
    pub files_succeeded: u64,

    /// Files that failed permanently
    pub files_failed: u64,

    /// Files dropped by shutdown before their upload started
    pub files_skipped: u64,

    /// Upload attempts made (including retries)
    pub attempts: u64,

    /// Bytes uploaded
    pub bytes_uploaded: u64,

    /// Lines appended to the failure log
    pub failure_log_entries: u64,

    /// Wall-clock time of the run
    pub elapsed: Duration,

    /// Whether the run finished (vs was interrupted)
    pub completed: bool,
}

impl RunSummary {
    /// True only when every discovered file was uploaded
    pub fn is_success(&self) -> bool {
        self.completed
            && self.files_failed == 0
            && self.files_skipped == 0
            && self.files_succeeded == self.files_discovered
    }
}

/// Coordinates a bulk upload
pub struct SweepCoordinator {
    /// Configuration
    config: Arc<SweepConfig>,

    /// Upload collaborator
    uploader: Arc<dyn Uploader>,

    /// Worker pool (owns the job queue)
    pool: WorkerPool,

    /// Walk counters shared with progress monitors
    walk_counters: Arc<WalkCounters>,

    /// Shutdown signal
    shutdown: Arc<AtomicBool>,
}

impl SweepCoordinator {
    /// Create a new coordinator
    pub fn new(config: SweepConfig, uploader: Arc<dyn Uploader>) -> Result<Self> {
        config.validate()?;

        let pool = WorkerPool::with_capacity(config.worker_count, config.queue_size);

        Ok(Self {
            config: Arc::new(config),
            uploader,
            pool,
            walk_counters: Arc::new(WalkCounters::default()),
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Get a clone of the shutdown flag (for signal handlers)
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Get a monitor for progress reporting
    pub fn monitor(&self) -> SweepMonitor {
        SweepMonitor {
            walk: Arc::clone(&self.walk_counters),
            pool: self.pool.monitor(),
        }
    }

    /// Run the sweep to completion
    ///
    /// Jobs already queued are always drained, even when the walk fails;
    /// the traversal error is returned once the pool has finished.
    pub fn run(mut self) -> Result<RunSummary> {
        let start_time = Instant::now();

        info!(
            root = %self.config.root.display(),
            container = %self.config.container,
            uploader = self.uploader.name(),
            workers = self.config.worker_count,
            max_attempts = self.config.max_attempts,
            "Starting upload"
        );

        let failure_log = FailureLog::create(&self.config.failure_log)?;

        self.pool.start(WorkerContext {
            uploader: Arc::clone(&self.uploader),
            policy: self.config.retry_policy(),
            container: self.config.container.clone(),
            failures: failure_log.handle(),
            shutdown: Arc::clone(&self.shutdown),
        })?;

        // Phase 1: traversal. The walker pushes but never closes.
        let walker = TreeWalker::new(self.config.key_mapper(), Arc::clone(&self.shutdown))
            .with_counters(Arc::clone(&self.walk_counters))
            .exclude(self.config.output_paths());
        let walk_result = walker.walk(&self.config.root, &self.pool.sender());

        // Phase 2: exactly one closure, then drain
        self.pool.close();
        let report = self.pool.wait();
        let log_result = failure_log.finish();

        let files_discovered = match walk_result {
            Ok(count) => count,
            Err(e) => {
                error!(
                    error = %e,
                    discovered = self.walk_counters.files(),
                    succeeded = report.succeeded,
                    failed = report.failed,
                    "Walk failed; queued files were drained"
                );
                if let Err(log_err) = &log_result {
                    warn!(error = %log_err, "Failure log was incomplete when the walk failed");
                }
                return Err(SweepError::Walk(e));
            }
        };

        let failure_log_entries = log_result?;

        if report.processed() != files_discovered {
            warn!(
                discovered = files_discovered,
                processed = report.processed(),
                panicked_workers = report.panicked_workers,
                "Not every discovered file reached a terminal outcome"
            );
        }

        let completed = !self.shutdown.load(Ordering::SeqCst) && report.panicked_workers == 0;
        let elapsed = start_time.elapsed();

        info!(
            discovered = files_discovered,
            succeeded = report.succeeded,
            failed = report.failed,
            skipped = report.skipped,
            duration_secs = elapsed.as_secs(),
            "Upload finished"
        );

        Ok(RunSummary {
            files_discovered,
            dirs_walked: self.walk_counters.dirs(),
            files_succeeded: report.succeeded,
            files_failed: report.failed,
            files_skipped: report.skipped,
            attempts: report.attempts,
            bytes_uploaded: report.bytes,
            failure_log_entries,
            elapsed,
            completed,
        })
    }
}

/// Live counters for a running sweep
#[derive(Clone)]
pub struct SweepMonitor {
    walk: Arc<WalkCounters>,
    pool: PoolMonitor,
}

impl SweepMonitor {
    /// Take a progress snapshot
    pub fn snapshot(&self, elapsed: Duration) -> SweepProgress {
        let report = self.pool.report();

        SweepProgress {
            discovered: self.walk.files(),
            dirs: self.walk.dirs(),
            succeeded: report.succeeded,
            failed: report.failed,
            bytes: report.bytes,
            queued: self.pool.queued(),
            active_workers: self.pool.active_workers(),
            total_workers: self.pool.worker_count(),
            elapsed,
        }
    }
}

/// Progress information for display
#[derive(Debug, Clone, Default)]
pub struct SweepProgress {
    /// Files discovered
    pub discovered: u64,

    /// Directories listed
    pub dirs: u64,

    /// Files uploaded
    pub succeeded: u64,

    /// Files failed permanently
    pub failed: u64,

    /// Bytes uploaded
    pub bytes: u64,

    /// Jobs waiting in the queue
    pub queued: u64,

    /// Workers currently uploading
    pub active_workers: usize,

    /// Total workers
    pub total_workers: usize,

    /// Elapsed time
    pub elapsed: Duration,
}

impl SweepProgress {
    /// Calculate files per second rate
    pub fn files_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            (self.succeeded + self.failed) as f64 / secs
        } else {
            0.0
        }
    }
}
