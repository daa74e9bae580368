//! Bounded-attempt retry around a single upload
//!
//! Every job gets its own attempt counter. Retryable errors are retried on
//! the calling worker until `max_attempts` is reached; non-retryable errors
//! end the job immediately. Either way the caller receives an explicit
//! [`UploadOutcome::PermanentFailure`], never a success.

use super::Uploader;
use crate::error::UploadError;
use crate::job::Job;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::Duration;
use tracing::{debug, trace};

/// Default retry ceiling
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Upper bound for a single backoff delay
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Terminal result of processing one job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// The file was uploaded
    Success {
        /// Attempts used, including the successful one
        attempts: u32,
        /// Bytes transferred
        bytes: u64,
    },

    /// The file was not uploaded and will not be retried
    PermanentFailure {
        /// Attempts made
        attempts: u32,
        /// Last error seen
        reason: String,
        /// `true` when the retry ceiling was reached, `false` when the
        /// error was not retryable
        exhausted: bool,
    },
}

impl UploadOutcome {
    /// Returns true if this outcome represents success
    pub fn is_success(&self) -> bool {
        matches!(self, UploadOutcome::Success { .. })
    }

    /// Number of attempts made
    pub fn attempts(&self) -> u32 {
        match self {
            UploadOutcome::Success { attempts, .. } => *attempts,
            UploadOutcome::PermanentFailure { attempts, .. } => *attempts,
        }
    }
}

/// Retry policy for uploads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

impl RetryPolicy {
    /// Retry immediately, up to `max_attempts` attempts in total
    ///
    /// A ceiling of zero is treated as one attempt.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::ZERO,
        }
    }

    /// Sleep between attempts, doubling from `base_delay`
    pub fn with_backoff(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Retry ceiling
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before retry number `retry` (1-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        if self.base_delay.is_zero() || retry == 0 {
            return Duration::ZERO;
        }

        let factor = 1u32 << (retry - 1).min(16);
        self.base_delay.saturating_mul(factor).min(MAX_BACKOFF)
    }

    /// Upload a job, retrying retryable failures
    pub fn upload(&self, uploader: &dyn Uploader, job: &Job, container: &str) -> UploadOutcome {
        let mut attempt = 0;

        loop {
            attempt += 1;

            let err = match call_uploader(uploader, job, container) {
                Ok(bytes) => {
                    trace!(key = %job.destination_key, attempt = attempt, "Upload succeeded");
                    return UploadOutcome::Success {
                        attempts: attempt,
                        bytes,
                    };
                }
                Err(e) => e,
            };

            if !err.is_retryable() {
                return UploadOutcome::PermanentFailure {
                    attempts: attempt,
                    reason: err.to_string(),
                    exhausted: false,
                };
            }

            if attempt >= self.max_attempts {
                return UploadOutcome::PermanentFailure {
                    attempts: attempt,
                    reason: err.to_string(),
                    exhausted: true,
                };
            }

            let delay = self.delay_for(attempt);
            debug!(
                path = %job.source_path.display(),
                attempt = attempt,
                max = self.max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Upload attempt failed, retrying"
            );

            if !delay.is_zero() {
                thread::sleep(delay);
            }
        }
    }
}

/// Invoke the uploader, turning a panic into an upload error
fn call_uploader(uploader: &dyn Uploader, job: &Job, container: &str) -> Result<u64, UploadError> {
    panic::catch_unwind(AssertUnwindSafe(|| {
        uploader.upload(&job.source_path, container, &job.destination_key)
    }))
    .unwrap_or_else(|payload| Err(UploadError::Panicked(panic_message(payload.as_ref()))))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UploadResult;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails the first `failures` calls, then succeeds
    struct Flaky {
        calls: AtomicU32,
        failures: u32,
    }

    impl Flaky {
        fn new(failures: u32) -> Self {
            Self {
                calls: AtomicU32::new(0),
                failures,
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Uploader for Flaky {
        fn upload(&self, _: &Path, _: &str, _: &str) -> UploadResult<u64> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= self.failures {
                Err(UploadError::Transport(format!("attempt {} failed", n)))
            } else {
                Ok(42)
            }
        }

        fn name(&self) -> &'static str {
            "flaky"
        }
    }

    struct Missing;

    impl Uploader for Missing {
        fn upload(&self, path: &Path, _: &str, _: &str) -> UploadResult<u64> {
            Err(UploadError::SourceNotFound {
                path: path.to_path_buf(),
            })
        }

        fn name(&self) -> &'static str {
            "missing"
        }
    }

    struct Panicky;

    impl Uploader for Panicky {
        fn upload(&self, _: &Path, _: &str, _: &str) -> UploadResult<u64> {
            panic!("sdk exploded");
        }

        fn name(&self) -> &'static str {
            "panicky"
        }
    }

    fn job() -> Job {
        Job::new(PathBuf::from("sub/b.txt"), "sub/b.txt".into())
    }

    #[test]
    fn test_success_first_try() {
        let uploader = Flaky::new(0);
        let outcome = RetryPolicy::new(3).upload(&uploader, &job(), "c");

        assert_eq!(
            outcome,
            UploadOutcome::Success {
                attempts: 1,
                bytes: 42
            }
        );
        assert_eq!(uploader.calls(), 1);
    }

    #[test]
    fn test_recovers_from_transient_failures() {
        let uploader = Flaky::new(2);
        let outcome = RetryPolicy::new(3).upload(&uploader, &job(), "c");

        assert!(outcome.is_success());
        assert_eq!(outcome.attempts(), 3);
        assert_eq!(uploader.calls(), 3);
    }

    #[test]
    fn test_exhaustion_is_a_failure() {
        let uploader = Flaky::new(u32::MAX);
        let outcome = RetryPolicy::new(3).upload(&uploader, &job(), "c");

        match outcome {
            UploadOutcome::PermanentFailure {
                attempts,
                reason,
                exhausted,
            } => {
                assert_eq!(attempts, 3);
                assert!(exhausted);
                assert!(reason.contains("attempt 3 failed"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(uploader.calls(), 3);
    }

    #[test]
    fn test_non_retryable_fails_immediately() {
        let outcome = RetryPolicy::new(5).upload(&Missing, &job(), "c");

        assert_eq!(outcome.attempts(), 1);
        assert!(matches!(
            outcome,
            UploadOutcome::PermanentFailure {
                exhausted: false,
                ..
            }
        ));
    }

    #[test]
    fn test_panic_becomes_failure() {
        let outcome = RetryPolicy::new(3).upload(&Panicky, &job(), "c");

        match outcome {
            UploadOutcome::PermanentFailure {
                attempts, reason, ..
            } => {
                assert_eq!(attempts, 1);
                assert!(reason.contains("sdk exploded"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_attempt_budget_is_per_job() {
        let uploader = Flaky::new(2);
        let policy = RetryPolicy::new(3);

        // First job burns two failures, the second starts with a full budget
        assert_eq!(policy.upload(&uploader, &job(), "c").attempts(), 3);
        assert_eq!(policy.upload(&uploader, &job(), "c").attempts(), 1);
    }

    #[test]
    fn test_zero_attempts_means_one() {
        assert_eq!(RetryPolicy::new(0).max_attempts(), 1);
    }

    #[test]
    fn test_backoff_delays() {
        let immediate = RetryPolicy::new(5);
        assert_eq!(immediate.delay_for(1), Duration::ZERO);

        let policy = RetryPolicy::new(5).with_backoff(Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for(40), MAX_BACKOFF);
    }
}
