//! Append-only log of files that were never uploaded
//!
//! Workers send [`FailureRecord`]s over a channel to a single writer
//! thread, so concurrent failures never interleave within a line. Each
//! record is flushed as soon as it is written.
//!
//! Line format (tab separated):
//!
//! ```text
//! <rfc3339 timestamp>  <source path>  <attempts>  <exhausted|aborted>  <reason>
//! ```

use crate::error::FailureLogError;
use crate::job::Job;
use chrono::{SecondsFormat, Utc};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error};

/// A file that never succeeded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    /// Local file that was not uploaded
    pub source_path: PathBuf,

    /// Destination key it was meant for
    pub destination_key: String,

    /// Human-readable reason
    pub reason: String,

    /// Attempts made before giving up
    pub attempts: u32,

    /// Whether the retry ceiling was reached
    pub attempts_exhausted: bool,
}

impl FailureRecord {
    /// Create a record for a job
    pub fn new(job: &Job, reason: impl Into<String>, attempts: u32, attempts_exhausted: bool) -> Self {
        Self {
            source_path: job.source_path.clone(),
            destination_key: job.destination_key.clone(),
            reason: reason.into(),
            attempts,
            attempts_exhausted,
        }
    }

    /// Format as one log line (without trailing newline)
    pub fn to_line(&self, timestamp: &str) -> String {
        format!(
            "{}\t{}\t{}\t{}\t{}",
            timestamp,
            single_line(&self.source_path.display().to_string()),
            self.attempts,
            if self.attempts_exhausted {
                "exhausted"
            } else {
                "aborted"
            },
            single_line(&self.reason),
        )
    }
}

fn single_line(s: &str) -> String {
    s.replace(['\n', '\r', '\t'], " ")
}

/// Messages sent to the writer thread
#[derive(Debug)]
enum LogMessage {
    /// Append a record
    Record(FailureRecord),

    /// Stop after everything queued so far
    Shutdown,
}

/// Handle for sending records to the writer
#[derive(Clone)]
pub struct FailureLogHandle {
    sender: Sender<LogMessage>,
    written: Arc<AtomicU64>,
}

impl FailureLogHandle {
    /// Queue a record for appending
    pub fn record(&self, record: FailureRecord) -> Result<(), FailureLogError> {
        self.sender
            .send(LogMessage::Record(record))
            .map_err(|_| FailureLogError::ChannelClosed)
    }

    /// Number of records written so far
    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }
}

/// Failure log writer running in its own thread
pub struct FailureLog {
    handle: Option<JoinHandle<Result<u64, FailureLogError>>>,
    log_handle: FailureLogHandle,
}

impl FailureLog {
    /// Open `path` for appending and start the writer thread
    ///
    /// The file is opened before this returns, so an unwritable path is
    /// reported here rather than on the first failure.
    pub fn create(path: &Path) -> Result<Self, FailureLogError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| FailureLogError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        let (sender, receiver) = unbounded();
        let written = Arc::new(AtomicU64::new(0));

        let thread_path = path.to_path_buf();
        let thread_written = Arc::clone(&written);
        let handle = thread::Builder::new()
            .name("failure-log".into())
            .spawn(move || writer_loop(file, receiver, &thread_path, &thread_written))
            .map_err(|source| FailureLogError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        debug!(path = %path.display(), "Failure log opened");

        Ok(Self {
            handle: Some(handle),
            log_handle: FailureLogHandle { sender, written },
        })
    }

    /// Get a handle for sending records
    pub fn handle(&self) -> FailureLogHandle {
        self.log_handle.clone()
    }

    /// Write everything queued, close the file and return the record count
    ///
    /// Call only after every worker holding a handle has stopped sending.
    pub fn finish(mut self) -> Result<u64, FailureLogError> {
        self.log_handle
            .sender
            .send(LogMessage::Shutdown)
            .map_err(|_| FailureLogError::ChannelClosed)?;

        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| FailureLogError::Panicked)?,
            None => Ok(self.log_handle.written()),
        }
    }
}

fn writer_loop(
    file: File,
    receiver: Receiver<LogMessage>,
    path: &Path,
    written: &AtomicU64,
) -> Result<u64, FailureLogError> {
    let mut out = BufWriter::new(file);
    let mut first_error: Option<std::io::Error> = None;

    for message in receiver.iter() {
        let record = match message {
            LogMessage::Record(record) => record,
            LogMessage::Shutdown => break,
        };

        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let line = record.to_line(&timestamp);

        match writeln!(out, "{}", line).and_then(|_| out.flush()) {
            Ok(()) => {
                written.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                error!(
                    path = %record.source_path.display(),
                    error = %e,
                    "Failed to append to failure log"
                );
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
    }

    out.flush().map_err(|source| FailureLogError::Write {
        path: path.to_path_buf(),
        source,
    })?;

    match first_error {
        Some(source) => Err(FailureLogError::Write {
            path: path.to_path_buf(),
            source,
        }),
        None => Ok(written.load(Ordering::Relaxed)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(path: &str, exhausted: bool) -> FailureRecord {
        let job = Job::new(PathBuf::from(path), path.to_string());
        FailureRecord::new(&job, "Transfer failed: timeout", 3, exhausted)
    }

    #[test]
    fn test_record_line_format() {
        let line = record("sub/b.txt", true).to_line("2024-01-01T00:00:00Z");
        assert_eq!(
            line,
            "2024-01-01T00:00:00Z\tsub/b.txt\t3\texhausted\tTransfer failed: timeout"
        );

        let mut multi = record("x", false);
        multi.reason = "line one\nline two".into();
        let line = multi.to_line("t");
        assert!(line.ends_with("aborted\tline one line two"));
    }

    #[test]
    fn test_control_characters_in_path_stay_on_one_line() {
        let job = Job::new(PathBuf::from("sub/evil\nname\twith tab.txt"), "k".into());
        let line = FailureRecord::new(&job, "boom", 3, true).to_line("t");

        assert_eq!(line.lines().count(), 1);
        assert_eq!(line.split('\t').count(), 5);
        assert!(line.contains("sub/evil name with tab.txt"));
    }

    #[test]
    fn test_writes_and_appends() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log_error.txt");
        std::fs::write(&path, "previous run\n").unwrap();

        let log = FailureLog::create(&path).unwrap();
        let handle = log.handle();
        handle.record(record("a.txt", true)).unwrap();
        handle.record(record("b.txt", false)).unwrap();
        drop(handle);

        assert_eq!(log.finish().unwrap(), 2);

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "previous run");
        assert!(lines[1].contains("\ta.txt\t3\texhausted\t"));
        assert!(lines[2].contains("\tb.txt\t3\taborted\t"));
    }

    #[test]
    fn test_concurrent_writers() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("failures.log");
        let log = FailureLog::create(&path).unwrap();

        let threads: Vec<_> = (0..4)
            .map(|t| {
                let handle = log.handle();
                thread::spawn(move || {
                    for i in 0..25 {
                        handle
                            .record(record(&format!("t{}/f{}.txt", t, i), true))
                            .unwrap();
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        assert_eq!(log.finish().unwrap(), 100);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 100);
        assert!(contents.lines().all(|l| l.split('\t').count() == 5));
    }

    #[test]
    fn test_unwritable_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("log.txt");
        assert!(matches!(
            FailureLog::create(&path),
            Err(FailureLogError::Open { .. })
        ));
    }
}
