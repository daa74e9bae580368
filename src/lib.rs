//! blob-sweep - Bulk upload of a local directory tree to an object store
//!
//! Discovers every regular file under a root directory and uploads it with
//! a fixed pool of worker threads. Files that keep failing are recorded in
//! an append-only failure log instead of stopping the run.
//!
//! # Features
//!
//! - **Single Producer**: One depth-first walk feeds a shared job queue and
//!   closes it exactly once, after the whole tree has been listed.
//!
//! - **Bounded Concurrency**: The worker count is the only limit on how many
//!   uploads are in flight.
//!
//! - **Per-File Retry**: Each file gets its own attempt budget; exhausting
//!   it is reported as a failure, never as a success.
//!
//! - **Clean Completion**: The run ends only after every queued file has
//!   been uploaded or logged as failed.
//!
//! # Example
//!
//! ```bash
//! # Upload a tree into the "photos" container of the local store
//! blob-sweep /srv/photos -c photos --store /mnt/objects
//!
//! # Keys relative to the root, 16 workers, 3 attempts per file
//! blob-sweep /srv/photos -c photos -w 16 -r 3 --strip-root
//! ```

pub mod config;
pub mod error;
pub mod failure_log;
pub mod job;
pub mod progress;
pub mod upload;
pub mod walker;

pub use config::{CliArgs, SweepConfig};
pub use error::{Result, SweepError, UploadError, WalkError};
pub use failure_log::{FailureLog, FailureRecord};
pub use job::{Job, KeyMapper};
pub use upload::{DryRun, LocalStore, RetryPolicy, UploadOutcome, Uploader};
pub use walker::{RunSummary, SweepCoordinator, SweepProgress, WorkerPool};
