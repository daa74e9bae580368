//! Upload jobs and destination key mapping

use std::path::{Component, Path, PathBuf};

/// One file's upload task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// Local file to upload
    pub source_path: PathBuf,

    /// Name of the object in the destination container
    pub destination_key: String,
}

impl Job {
    /// Create a new job
    pub fn new(source_path: PathBuf, destination_key: String) -> Self {
        Self {
            source_path,
            destination_key,
        }
    }
}

/// Maps discovered source paths to destination keys
///
/// The default mapping is the identity: the key is the source path as
/// discovered (root included), with separators normalized to `/`.
#[derive(Debug, Clone, Default)]
pub struct KeyMapper {
    /// Root to strip from source paths, if any
    strip_root: Option<PathBuf>,

    /// Prefix prepended to every key
    prefix: Option<String>,
}

impl KeyMapper {
    /// Identity mapping
    pub fn identity() -> Self {
        Self::default()
    }

    /// Make keys relative to `root`
    pub fn strip_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.strip_root = Some(root.into());
        self
    }

    /// Prepend `prefix` to every key
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let prefix = prefix.trim_matches('/');
        self.prefix = if prefix.is_empty() {
            None
        } else {
            Some(prefix.to_string())
        };
        self
    }

    /// Compute the destination key for a source path
    pub fn key_for(&self, source: &Path) -> String {
        let relative = self
            .strip_root
            .as_deref()
            .and_then(|root| source.strip_prefix(root).ok())
            .unwrap_or(source);

        let key = normalize(relative);

        match &self.prefix {
            Some(prefix) => format!("{}/{}", prefix, key),
            None => key,
        }
    }

    /// Build a job for a discovered file
    pub fn job_for(&self, source: PathBuf) -> Job {
        let key = self.key_for(&source);
        Job::new(source, key)
    }
}

/// Join path components with `/` regardless of platform
fn normalize(path: &Path) -> String {
    let mut parts = Vec::new();
    let mut absolute = false;

    for component in path.components() {
        match component {
            Component::RootDir => absolute = true,
            Component::CurDir => {}
            Component::Prefix(p) => parts.push(p.as_os_str().to_string_lossy().into_owned()),
            Component::ParentDir => parts.push("..".to_string()),
            Component::Normal(name) => parts.push(name.to_string_lossy().into_owned()),
        }
    }

    let joined = parts.join("/");
    if absolute {
        format!("/{}", joined)
    } else {
        joined
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_mapping() {
        let mapper = KeyMapper::identity();
        assert_eq!(
            mapper.key_for(Path::new("BACKUP/sub/b.txt")),
            "BACKUP/sub/b.txt"
        );
        assert_eq!(mapper.key_for(Path::new("./data/a.txt")), "data/a.txt");
        assert_eq!(mapper.key_for(Path::new("/srv/a.txt")), "/srv/a.txt");
    }

    #[test]
    fn test_strip_root() {
        let mapper = KeyMapper::identity().strip_root("/srv/photos");
        assert_eq!(
            mapper.key_for(Path::new("/srv/photos/2024/img.jpg")),
            "2024/img.jpg"
        );

        // Paths outside the root fall back to identity
        assert_eq!(mapper.key_for(Path::new("/other/x")), "/other/x");
    }

    #[test]
    fn test_prefix() {
        let mapper = KeyMapper::identity()
            .strip_root("root")
            .with_prefix("/backups/");
        assert_eq!(
            mapper.key_for(Path::new("root/sub/c.txt")),
            "backups/sub/c.txt"
        );

        let empty = KeyMapper::identity().with_prefix("//");
        assert_eq!(empty.key_for(Path::new("a.txt")), "a.txt");
    }

    #[test]
    fn test_job_for() {
        let job = KeyMapper::identity().job_for(PathBuf::from("a/b.txt"));
        assert_eq!(job.source_path, PathBuf::from("a/b.txt"));
        assert_eq!(job.destination_key, "a/b.txt");
    }
}
