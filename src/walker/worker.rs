//! Upload worker threads and the fixed-size pool that owns them
//!
//! Each worker:
//! - Pulls jobs from the shared queue, blocking while it is empty and open
//! - Runs each job through the retry policy and the uploader
//! - Sends a failure record for every job that does not succeed
//! - Exits once the queue is closed and drained
//!
//! The pool owns the queue. Its worker count is the only limit on how many
//! uploads run at once.

use crate::error::WorkerError;
use crate::failure_log::{FailureLogHandle, FailureRecord};
use crate::job::Job;
use crate::upload::{RetryPolicy, UploadOutcome, Uploader};
use crate::walker::queue::{JobQueue, JobQueueReceiver, JobQueueSender, QueueStats, WorkGuard};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, trace, warn};

/// Reason recorded for jobs dropped by shutdown
pub const SKIPPED_REASON: &str = "interrupted before upload started";

/// Statistics collected by a worker
#[derive(Debug, Default)]
pub struct WorkerStats {
    /// Jobs uploaded
    pub succeeded: AtomicU64,

    /// Jobs that failed permanently
    pub failed: AtomicU64,

    /// Jobs dropped because of shutdown
    pub skipped: AtomicU64,

    /// Upload attempts made (including retries)
    pub attempts: AtomicU64,

    /// Bytes uploaded
    pub bytes: AtomicU64,
}

impl WorkerStats {
    fn record_success(&self, attempts: u32, bytes: u64) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
        self.attempts.fetch_add(attempts as u64, Ordering::Relaxed);
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    fn record_failure(&self, attempts: u32) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        self.attempts.fetch_add(attempts as u64, Ordering::Relaxed);
    }

    fn record_skip(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }
}

/// Everything a worker needs to process jobs
#[derive(Clone)]
pub struct WorkerContext {
    /// Upload collaborator
    pub uploader: Arc<dyn Uploader>,

    /// Retry policy applied to every job
    pub policy: RetryPolicy,

    /// Destination container
    pub container: String,

    /// Where permanent failures are recorded
    pub failures: FailureLogHandle,

    /// Shutdown signal
    pub shutdown: Arc<AtomicBool>,
}

/// A worker thread that uploads jobs
pub struct Worker {
    /// Worker ID
    id: usize,

    /// Thread handle
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    /// Spawn a new worker thread
    pub fn spawn(
        id: usize,
        ctx: WorkerContext,
        queue_rx: JobQueueReceiver,
        stats: Arc<WorkerStats>,
    ) -> Result<Self, WorkerError> {
        let handle = thread::Builder::new()
            .name(format!("uploader-{}", id))
            .spawn(move || worker_loop(id, ctx, queue_rx, stats))
            .map_err(|e| WorkerError::InitFailed {
                id,
                reason: e.to_string(),
            })?;

        Ok(Self {
            id,
            handle: Some(handle),
        })
    }

    /// Get worker ID
    pub fn id(&self) -> usize {
        self.id
    }

    /// Wait for the worker to finish
    pub fn join(mut self) -> Result<(), WorkerError> {
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| WorkerError::Panicked {
                id: self.id,
                message: "Worker thread panicked".into(),
            }),
            None => Ok(()),
        }
    }
}

/// Main worker loop
fn worker_loop(id: usize, ctx: WorkerContext, queue_rx: JobQueueReceiver, stats: Arc<WorkerStats>) {
    debug!(worker = id, "Worker starting");

    // recv() returns None only once the queue is closed and drained
    while let Some(job) = queue_rx.recv() {
        let _guard = WorkGuard::new(&queue_rx);

        if ctx.shutdown.load(Ordering::Relaxed) {
            stats.record_skip();
            trace!(worker = id, path = %job.source_path.display(), "Skipping job after shutdown");
            send_failure(id, &ctx, FailureRecord::new(&job, SKIPPED_REASON, 0, false));
            continue;
        }

        process_job(id, &ctx, &job, &stats);
    }

    debug!(
        worker = id,
        succeeded = stats.succeeded.load(Ordering::Relaxed),
        failed = stats.failed.load(Ordering::Relaxed),
        "Worker exiting"
    );
}

/// Upload a single job to a terminal outcome
fn process_job(id: usize, ctx: &WorkerContext, job: &Job, stats: &WorkerStats) {
    let outcome = ctx.policy.upload(ctx.uploader.as_ref(), job, &ctx.container);

    match outcome {
        UploadOutcome::Success { attempts, bytes } => {
            stats.record_success(attempts, bytes);
            debug!(
                worker = id,
                key = %job.destination_key,
                attempts = attempts,
                bytes = bytes,
                "Uploaded"
            );
        }
        UploadOutcome::PermanentFailure {
            attempts,
            reason,
            exhausted,
        } => {
            stats.record_failure(attempts);
            warn!(
                worker = id,
                path = %job.source_path.display(),
                attempts = attempts,
                error = %reason,
                "Upload failed permanently"
            );
            send_failure(id, ctx, FailureRecord::new(job, reason, attempts, exhausted));
        }
    }
}

fn send_failure(id: usize, ctx: &WorkerContext, record: FailureRecord) {
    if let Err(e) = ctx.failures.record(record) {
        error!(worker = id, error = %e, "Failed to send failure record");
    }
}

/// Totals from a finished pool
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolReport {
    /// Jobs uploaded
    pub succeeded: u64,

    /// Jobs that failed permanently
    pub failed: u64,

    /// Jobs dropped because of shutdown
    pub skipped: u64,

    /// Upload attempts made
    pub attempts: u64,

    /// Bytes uploaded
    pub bytes: u64,

    /// Workers whose thread died
    pub panicked_workers: usize,
}

impl PoolReport {
    /// Jobs that reached a terminal outcome
    pub fn processed(&self) -> u64 {
        self.succeeded + self.failed + self.skipped
    }
}

/// Sum statistics from a set of workers
pub fn aggregate_stats(stats: &[Arc<WorkerStats>]) -> PoolReport {
    let mut report = PoolReport::default();

    for s in stats {
        report.succeeded += s.succeeded.load(Ordering::Relaxed);
        report.failed += s.failed.load(Ordering::Relaxed);
        report.skipped += s.skipped.load(Ordering::Relaxed);
        report.attempts += s.attempts.load(Ordering::Relaxed);
        report.bytes += s.bytes.load(Ordering::Relaxed);
    }

    report
}

/// Fixed-size pool of upload workers draining one job queue
///
/// Lifecycle: [`new`](Self::new) → [`start`](Self::start) →
/// [`close`](Self::close) → [`wait`](Self::wait). `wait` consumes the pool.
pub struct WorkerPool {
    /// Number of workers
    worker_count: usize,

    /// Queue shared by all workers
    queue: JobQueue,

    /// Per-worker statistics, allocated up front for monitoring
    stats: Vec<Arc<WorkerStats>>,

    /// Running workers
    workers: Vec<Worker>,

    /// Whether start() has run
    started: bool,
}

impl WorkerPool {
    /// Create a pool of `worker_count` workers with an unbounded queue
    pub fn new(worker_count: usize) -> Self {
        Self::with_capacity(worker_count, None)
    }

    /// Create a pool whose queue holds at most `capacity` jobs
    pub fn with_capacity(worker_count: usize, capacity: Option<usize>) -> Self {
        let stats = (0..worker_count)
            .map(|_| Arc::new(WorkerStats::default()))
            .collect();

        Self {
            worker_count,
            queue: JobQueue::new(capacity),
            stats,
            workers: Vec::with_capacity(worker_count),
            started: false,
        }
    }

    /// Number of workers
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Handle for pushing jobs
    pub fn sender(&self) -> JobQueueSender {
        self.queue.sender()
    }

    /// Spawn the workers
    pub fn start(&mut self, ctx: WorkerContext) -> Result<(), WorkerError> {
        if self.started {
            return Err(WorkerError::AlreadyStarted);
        }
        self.started = true;

        for (id, stats) in self.stats.iter().enumerate() {
            match Worker::spawn(id, ctx.clone(), self.queue.receiver(), Arc::clone(stats)) {
                Ok(worker) => self.workers.push(worker),
                Err(e) => {
                    // Let the workers that did start exit
                    self.queue.close();
                    return Err(e);
                }
            }
        }

        info!(count = self.workers.len(), "Workers spawned");
        Ok(())
    }

    /// Signal that no more jobs will be pushed
    ///
    /// Returns `true` if this call closed the queue.
    pub fn close(&self) -> bool {
        self.queue.close()
    }

    /// Snapshot of the pool's live counters
    pub fn monitor(&self) -> PoolMonitor {
        PoolMonitor {
            stats: self.stats.clone(),
            queue: self.queue.stats(),
            active: self.queue.active_workers(),
            worker_count: self.worker_count,
        }
    }

    /// Block until every worker has drained the queue and exited
    ///
    /// Closes the queue first if the caller has not.
    pub fn wait(mut self) -> PoolReport {
        if self.queue.close() {
            debug!("Queue closed by wait()");
        }

        if self.workers.is_empty() && !self.queue.is_empty() {
            warn!(pending = self.queue.len(), "Pool waited without workers; jobs left unprocessed");
        }

        let mut panicked = 0;
        for worker in std::mem::take(&mut self.workers) {
            let id = worker.id();
            if let Err(e) = worker.join() {
                error!(worker = id, error = %e, "Worker failed to join cleanly");
                panicked += 1;
            }
        }

        let mut report = aggregate_stats(&self.stats);
        report.panicked_workers = panicked;
        report
    }
}

/// Read-only view of a pool's counters for progress display
#[derive(Clone)]
pub struct PoolMonitor {
    stats: Vec<Arc<WorkerStats>>,
    queue: Arc<QueueStats>,
    active: Arc<AtomicUsize>,
    worker_count: usize,
}

impl PoolMonitor {
    /// Aggregate counters so far
    pub fn report(&self) -> PoolReport {
        aggregate_stats(&self.stats)
    }

    /// Jobs waiting in the queue
    pub fn queued(&self) -> u64 {
        self.queue.enqueued().saturating_sub(self.queue.dequeued())
    }

    /// Workers currently processing a job
    pub fn active_workers(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    /// Total workers
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }
}
