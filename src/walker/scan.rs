//! Directory traversal - the single producer of upload jobs
//!
//! The walk is depth-first in the order the filesystem lists entries.
//! Each directory's listing is read completely before descending, so at
//! most one directory handle is open at a time regardless of depth.
//!
//! Paths registered with [`TreeWalker::exclude`] (the failure log, the
//! local store) are compared by their resolved location and skipped along
//! with everything beneath them.
//!
//! The walker never closes the queue. It returns the number of jobs it
//! pushed (or the first error) and leaves closure to its caller, which
//! closes exactly once after the top-level walk has returned.

use crate::error::{WalkError, WalkResult};
use crate::job::KeyMapper;
use crate::walker::queue::JobQueueSender;
use std::fs::{self, FileType};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, trace};

/// Live traversal counters
#[derive(Debug, Default)]
pub struct WalkCounters {
    /// Directories listed
    pub dirs: AtomicU64,

    /// Regular files pushed as jobs
    pub files: AtomicU64,

    /// Entries that were neither files nor directories
    pub other: AtomicU64,

    /// Entries skipped because they are excluded outputs
    pub excluded: AtomicU64,
}

impl WalkCounters {
    /// Directories listed so far
    pub fn dirs(&self) -> u64 {
        self.dirs.load(Ordering::Relaxed)
    }

    /// Files discovered so far
    pub fn files(&self) -> u64 {
        self.files.load(Ordering::Relaxed)
    }

    /// Non-regular entries skipped so far
    pub fn other(&self) -> u64 {
        self.other.load(Ordering::Relaxed)
    }

    /// Excluded entries skipped so far
    pub fn excluded(&self) -> u64 {
        self.excluded.load(Ordering::Relaxed)
    }
}

/// Per-walk state threaded through the recursion
struct Scan<'a> {
    queue: &'a JobQueueSender,
    excluded: Vec<PathBuf>,
    pushed: u64,
}

/// Recursive directory walker
pub struct TreeWalker {
    mapper: KeyMapper,
    shutdown: Arc<AtomicBool>,
    counters: Arc<WalkCounters>,
    excluded: Vec<PathBuf>,
}

impl TreeWalker {
    /// Create a walker that maps paths with `mapper`
    pub fn new(mapper: KeyMapper, shutdown: Arc<AtomicBool>) -> Self {
        Self {
            mapper,
            shutdown,
            counters: Arc::new(WalkCounters::default()),
            excluded: Vec::new(),
        }
    }

    /// Never push these paths, or anything under them
    pub fn exclude<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.excluded.extend(paths.into_iter().map(Into::into));
        self
    }

    /// Share counters with a progress monitor
    pub fn with_counters(mut self, counters: Arc<WalkCounters>) -> Self {
        self.counters = counters;
        self
    }

    /// Get the traversal counters
    pub fn counters(&self) -> Arc<WalkCounters> {
        Arc::clone(&self.counters)
    }

    /// Walk `root`, pushing one job per regular file onto `queue`
    ///
    /// Returns the number of jobs pushed. Any directory that cannot be
    /// listed aborts the whole walk. If shutdown is requested the walk stops
    /// early and returns the count pushed so far.
    pub fn walk(&self, root: &Path, queue: &JobQueueSender) -> WalkResult<u64> {
        let meta = fs::metadata(root).map_err(|e| WalkError::InvalidRoot {
            path: root.to_path_buf(),
            reason: e.to_string(),
        })?;

        if !meta.is_dir() {
            return Err(WalkError::InvalidRoot {
                path: root.to_path_buf(),
                reason: "not a directory".into(),
            });
        }

        let real_root = fs::canonicalize(root).map_err(|e| WalkError::InvalidRoot {
            path: root.to_path_buf(),
            reason: e.to_string(),
        })?;

        info!(root = %root.display(), "Starting directory walk");

        let mut scan = Scan {
            queue,
            excluded: self.excluded.iter().filter_map(|p| resolve(p.as_path())).collect(),
            pushed: 0,
        };
        self.walk_dir(root, &real_root, &mut scan)?;
        let pushed = scan.pushed;

        if self.is_shutdown() {
            info!(files = pushed, "Walk stopped by shutdown");
        } else {
            info!(
                files = pushed,
                dirs = self.counters.dirs(),
                "Directory walk complete"
            );
        }

        Ok(pushed)
    }

    /// `real_dir` is `dir` with symlinks resolved, used to match exclusions
    fn walk_dir(&self, dir: &Path, real_dir: &Path, scan: &mut Scan<'_>) -> WalkResult<()> {
        if self.is_shutdown() {
            return Ok(());
        }

        let entries = read_entries(dir)?;
        self.counters.dirs.fetch_add(1, Ordering::Relaxed);
        trace!(path = %dir.display(), entries = entries.len(), "Directory listed");

        for (path, file_type) in entries {
            if self.is_shutdown() {
                return Ok(());
            }

            let real_path = match path.file_name() {
                Some(name) => real_dir.join(name),
                None => continue,
            };
            if scan.excluded.contains(&real_path) {
                self.counters.excluded.fetch_add(1, Ordering::Relaxed);
                debug!(path = %path.display(), "Skipping excluded output");
                continue;
            }

            if file_type.is_dir() {
                self.walk_dir(&path, &real_path, scan)?;
            } else if file_type.is_file() {
                let job = self.mapper.job_for(path);
                scan.queue.push(job).map_err(|closed| WalkError::QueueClosed {
                    path: closed.0.source_path,
                })?;
                scan.pushed += 1;
                self.counters.files.fetch_add(1, Ordering::Relaxed);
            } else {
                self.counters.other.fetch_add(1, Ordering::Relaxed);
                debug!(path = %path.display(), "Skipping non-regular entry");
            }
        }

        Ok(())
    }

    fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }
}

/// Resolve a path that may not exist yet through its parent
fn resolve(path: &Path) -> Option<PathBuf> {
    if let Ok(real) = fs::canonicalize(path) {
        return Some(real);
    }

    let name = path.file_name()?;
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::canonicalize(parent).ok().map(|p| p.join(name))
}

/// List a directory, closing its handle before returning
fn read_entries(dir: &Path) -> WalkResult<Vec<(PathBuf, FileType)>> {
    let reader = fs::read_dir(dir).map_err(|source| WalkError::ReadDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut entries = Vec::new();
    for entry in reader {
        let entry = entry.map_err(|source| WalkError::ReadEntry {
            path: dir.to_path_buf(),
            source,
        })?;
        let file_type = entry.file_type().map_err(|source| WalkError::ReadEntry {
            path: dir.to_path_buf(),
            source,
        })?;
        entries.push((entry.path(), file_type));
    }

    Ok(entries)
}
