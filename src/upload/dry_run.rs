//! Uploader that only reads the source files

use super::{open_source, Uploader};
use crate::error::{UploadError, UploadResult};
use std::io;
use std::path::Path;
use tracing::trace;

/// Reads every file end to end and discards the bytes
///
/// Useful to check that a tree is fully readable before a real run.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRun;

impl Uploader for DryRun {
    fn upload(&self, local_path: &Path, container: &str, key: &str) -> UploadResult<u64> {
        let mut file = open_source(local_path)?;

        let bytes = io::copy(&mut file, &mut io::sink()).map_err(|e| {
            UploadError::SourceUnreadable {
                path: local_path.to_path_buf(),
                reason: e.to_string(),
            }
        })?;

        trace!(container = container, key = key, bytes = bytes, "Dry run");
        Ok(bytes)
    }

    fn name(&self) -> &'static str {
        "dry-run"
    }
}
