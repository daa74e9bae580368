//! Uploader collaborators and the per-job retry policy
//!
//! An [`Uploader`] moves one local file to a named object in a container.
//! The pipeline treats it as opaque: anything that satisfies the trait can
//! be plugged into the worker pool, including test stubs.
//!
//! - [`LocalStore`]: filesystem object store (`<root>/<container>/<key>`)
//! - [`DryRun`]: reads each source file without storing it
//! - [`RetryPolicy`]: bounded-attempt wrapper around a single upload

pub mod dry_run;
pub mod local;
pub mod retry;

pub use dry_run::DryRun;
pub use local::LocalStore;
pub use retry::{RetryPolicy, UploadOutcome};

use crate::error::{UploadError, UploadResult};
use std::fs::File;
use std::io::ErrorKind;
use std::path::Path;

/// Transmits a local file to a destination object
pub trait Uploader: Send + Sync {
    /// Upload `local_path` as `key` inside `container`
    ///
    /// Returns the number of bytes transferred.
    fn upload(&self, local_path: &Path, container: &str, key: &str) -> UploadResult<u64>;

    /// Short name used in logs and the run header
    fn name(&self) -> &'static str;
}

/// Open a source file, classifying the error for the retry policy
pub(crate) fn open_source(path: &Path) -> UploadResult<File> {
    File::open(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => UploadError::SourceNotFound {
            path: path.to_path_buf(),
        },
        ErrorKind::PermissionDenied => UploadError::SourceDenied {
            path: path.to_path_buf(),
        },
        _ => UploadError::SourceUnreadable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_open_source_missing() {
        let dir = tempdir().unwrap();
        let err = open_source(&dir.path().join("gone")).unwrap_err();
        assert!(matches!(err, UploadError::SourceNotFound { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_open_source_permission_denied_is_not_retried() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("secret.txt");
        std::fs::write(&path, b"x").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o000)).unwrap();

        // Privileged users can read it anyway; nothing to test then
        if File::open(&path).is_ok() {
            return;
        }

        let err = open_source(&path).unwrap_err();
        assert!(matches!(err, UploadError::SourceDenied { .. }));
        assert!(!err.is_retryable());

        let outcome = RetryPolicy::new(5).upload(
            &DryRun,
            &crate::job::Job::new(path.clone(), "secret.txt".into()),
            "c",
        );
        assert_eq!(outcome.attempts(), 1);
    }
}
