//! Filesystem-backed object store
//!
//! Objects are stored at `<root>/<container>/<key>`. Each upload is written
//! to a `.part` file next to the destination and renamed into place, so a
//! failed attempt never leaves a truncated object behind.

use super::{open_source, Uploader};
use crate::error::{StoreError, UploadError, UploadResult};
use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, trace};

/// Object store rooted at a local directory
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Open (creating if needed) a store rooted at `root`
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();

        fs::create_dir_all(&root).map_err(|e| StoreError::OpenFailed {
            path: root.clone(),
            reason: e.to_string(),
        })?;

        if !root.is_dir() {
            return Err(StoreError::OpenFailed {
                path: root,
                reason: "not a directory".into(),
            });
        }

        debug!(root = %root.display(), "Local store opened");
        Ok(Self { root })
    }

    /// Store root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Check that a container name maps to a single directory
    pub fn validate_container(name: &str) -> Result<(), StoreError> {
        let reason = if name.is_empty() {
            Some("container name is empty")
        } else if name == "." || name == ".." {
            Some("container name is a relative directory")
        } else if name.contains('/') || name.contains('\\') {
            Some("container name contains a path separator")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(StoreError::InvalidContainer {
                name: name.to_string(),
                reason: reason.into(),
            }),
            None => Ok(()),
        }
    }

    /// Resolve the on-disk path of an object
    ///
    /// Leading `/` in keys is ignored; keys that would escape the container
    /// are rejected.
    pub fn object_path(&self, container: &str, key: &str) -> UploadResult<PathBuf> {
        Self::validate_container(container).map_err(|e| UploadError::InvalidKey {
            key: key.to_string(),
            reason: e.to_string(),
        })?;

        let mut path = self.root.join(container);
        let mut parts = 0usize;

        for component in Path::new(key).components() {
            match component {
                Component::Normal(part) => {
                    path.push(part);
                    parts += 1;
                }
                Component::RootDir | Component::CurDir => {}
                Component::ParentDir | Component::Prefix(_) => {
                    return Err(UploadError::InvalidKey {
                        key: key.to_string(),
                        reason: "key escapes the container".into(),
                    });
                }
            }
        }

        if parts == 0 {
            return Err(UploadError::InvalidKey {
                key: key.to_string(),
                reason: "key is empty".into(),
            });
        }

        Ok(path)
    }
}

impl Uploader for LocalStore {
    fn upload(&self, local_path: &Path, container: &str, key: &str) -> UploadResult<u64> {
        let dest = self.object_path(container, key)?;

        let mut source = open_source(local_path)?;

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                UploadError::Transport(format!("create '{}': {}", parent.display(), e))
            })?;
        }

        let mut part_name = dest.as_os_str().to_owned();
        part_name.push(".part");
        let part = PathBuf::from(part_name);

        let copied = File::create(&part)
            .and_then(|mut out| {
                let bytes = io::copy(&mut source, &mut out)?;
                out.sync_all()?;
                Ok(bytes)
            })
            .and_then(|bytes| fs::rename(&part, &dest).map(|_| bytes));

        match copied {
            Ok(bytes) => {
                trace!(key = key, bytes = bytes, "Object stored");
                Ok(bytes)
            }
            Err(e) => {
                let _ = fs::remove_file(&part);
                Err(UploadError::Transport(format!(
                    "write '{}': {}",
                    dest.display(),
                    e
                )))
            }
        }
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_validate_container() {
        assert!(LocalStore::validate_container("categories-dev").is_ok());
        assert!(LocalStore::validate_container("").is_err());
        assert!(LocalStore::validate_container("..").is_err());
        assert!(LocalStore::validate_container("a/b").is_err());
    }

    #[test]
    fn test_object_path() {
        let dir = tempdir().unwrap();
        let store = LocalStore::open(dir.path().join("store")).unwrap();

        let path = store.object_path("photos", "/srv/a/b.jpg").unwrap();
        assert_eq!(path, store.root().join("photos").join("srv/a/b.jpg"));

        let err = store.object_path("photos", "a/../../etc/passwd").unwrap_err();
        assert!(matches!(err, UploadError::InvalidKey { .. }));
        assert!(!err.is_retryable());

        assert!(store.object_path("photos", "/").is_err());
    }

    #[test]
    fn test_upload_copies_file() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("a.txt");
        fs::write(&src, b"payload").unwrap();

        let store = LocalStore::open(dir.path().join("store")).unwrap();
        let bytes = store.upload(&src, "bucket", "nested/a.txt").unwrap();
        assert_eq!(bytes, 7);

        let stored = store.root().join("bucket/nested/a.txt");
        assert_eq!(fs::read(&stored).unwrap(), b"payload");
        assert!(!store.root().join("bucket/nested/a.txt.part").exists());
    }

    #[test]
    fn test_upload_missing_source() {
        let dir = tempdir().unwrap();
        let store = LocalStore::open(dir.path().join("store")).unwrap();

        let err = store
            .upload(&dir.path().join("missing.txt"), "bucket", "missing.txt")
            .unwrap_err();
        assert!(matches!(err, UploadError::SourceNotFound { .. }));
    }

    #[test]
    fn test_open_on_file_fails() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("not-a-dir");
        fs::write(&file, b"x").unwrap();

        assert!(matches!(
            LocalStore::open(&file),
            Err(StoreError::OpenFailed { .. })
        ));
    }
}
