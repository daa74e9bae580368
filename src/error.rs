//! Error types for blob-sweep
//!
//! This module defines the error hierarchy for a sweep:
//! - Traversal errors (fatal to the whole run)
//! - Per-attempt upload errors (retried or recorded, never fatal)
//! - Store construction and configuration errors (fatal at startup)
//! - Worker and failure-log errors
//!
//! Design philosophy:
//! - Use thiserror for structured error types in library code
//! - Per-file failures stay local to the job that produced them
//! - Preserve error chains for debugging

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for a sweep
#[derive(Error, Debug)]
pub enum SweepError {
    /// Directory traversal failed
    #[error("Traversal error: {0}")]
    Walk(#[from] WalkError),

    /// The uploader could not be constructed
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Worker/concurrency errors
    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    /// Failure log could not be opened or written
    #[error("Failure log error: {0}")]
    FailureLog(#[from] FailureLogError),

    /// I/O errors (file operations, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while walking the source tree
#[derive(Error, Debug)]
pub enum WalkError {
    /// The root path is missing or not a directory
    #[error("Root '{path}' is not a readable directory: {reason}")]
    InvalidRoot { path: PathBuf, reason: String },

    /// A directory could not be listed
    #[error("Failed to read directory '{path}': {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An entry inside a directory could not be inspected
    #[error("Failed to read entry in '{path}': {source}")]
    ReadEntry {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A job was pushed after the queue was closed
    #[error("Job queue closed while '{path}' was still being discovered")]
    QueueClosed { path: PathBuf },
}

/// Errors returned by a single upload attempt
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    /// Source file vanished between discovery and upload
    #[error("Source file not found: '{path}'")]
    SourceNotFound { path: PathBuf },

    /// Source file exists but this process may not read it
    #[error("Permission denied reading source '{path}'")]
    SourceDenied { path: PathBuf },

    /// Source file exists but could not be read
    #[error("Failed to read source '{path}': {reason}")]
    SourceUnreadable { path: PathBuf, reason: String },

    /// Destination key is not acceptable to the store
    #[error("Invalid destination key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    /// Transport or store-side failure
    #[error("Transfer failed: {0}")]
    Transport(String),

    /// The uploader panicked while handling the job
    #[error("Uploader panicked: {0}")]
    Panicked(String),
}

impl UploadError {
    /// Check if another attempt could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            UploadError::SourceUnreadable { .. } | UploadError::Transport(_)
        )
    }
}

/// Errors constructing an uploader
#[derive(Error, Debug)]
pub enum StoreError {
    /// Store root could not be created or is not a directory
    #[error("Failed to open store at '{path}': {reason}")]
    OpenFailed { path: PathBuf, reason: String },

    /// Container name rejected
    #[error("Invalid container '{name}': {reason}")]
    InvalidContainer { name: String, reason: String },
}

/// Configuration and CLI errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid worker count
    #[error("Invalid worker count {count}: must be between 1 and {max}")]
    InvalidWorkerCount { count: usize, max: usize },

    /// Invalid retry ceiling
    #[error("Invalid max attempts {attempts}: must be between 1 and {max}")]
    InvalidMaxAttempts { attempts: u32, max: u32 },

    /// Invalid queue bound
    #[error("Invalid queue size {size}: must be at least {min}")]
    InvalidQueueSize { size: usize, min: usize },

    /// Root directory problem
    #[error("Invalid root directory '{path}': {reason}")]
    InvalidRoot { path: PathBuf, reason: String },

    /// Failure log path problem
    #[error("Invalid failure log path '{path}': {reason}")]
    InvalidFailureLog { path: PathBuf, reason: String },
}

/// Worker thread errors
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Worker panicked
    #[error("Worker {id} panicked: {message}")]
    Panicked { id: usize, message: String },

    /// Worker thread could not be spawned
    #[error("Failed to initialize worker {id}: {reason}")]
    InitFailed { id: usize, reason: String },

    /// Start was called on a pool that is already running
    #[error("Worker pool already started")]
    AlreadyStarted,
}

/// Failure log errors
#[derive(Error, Debug)]
pub enum FailureLogError {
    /// Log file could not be opened for appending
    #[error("Failed to open '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writer thread failed while appending
    #[error("Failed to append to '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writer channel closed unexpectedly
    #[error("Failure log writer channel closed unexpectedly")]
    ChannelClosed,

    /// Writer thread panicked
    #[error("Failure log writer panicked")]
    Panicked,
}

/// Result type alias for SweepError
pub type Result<T> = std::result::Result<T, SweepError>;

/// Result type alias for a single upload attempt
pub type UploadResult<T> = std::result::Result<T, UploadError>;

/// Result type alias for WalkError
pub type WalkResult<T> = std::result::Result<T, WalkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_error_retryable() {
        assert!(UploadError::Transport("connection reset".into()).is_retryable());
        assert!(UploadError::SourceUnreadable {
            path: "/a".into(),
            reason: "busy".into(),
        }
        .is_retryable());

        assert!(!UploadError::SourceNotFound { path: "/a".into() }.is_retryable());
        assert!(!UploadError::SourceDenied { path: "/a".into() }.is_retryable());
        assert!(!UploadError::InvalidKey {
            key: "../x".into(),
            reason: "parent component".into(),
        }
        .is_retryable());
        assert!(!UploadError::Panicked("boom".into()).is_retryable());
    }

    #[test]
    fn test_error_conversion() {
        let walk_err = WalkError::QueueClosed {
            path: "/data/sub".into(),
        };
        let err: SweepError = walk_err.into();
        assert!(matches!(err, SweepError::Walk(_)));
        assert!(err.to_string().contains("/data/sub"));
    }
}
