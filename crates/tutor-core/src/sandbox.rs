//! Working-directory sandbox
//!
//! Every tool path goes through [`PathGuard::resolve`]. The containment check
//! is lexical and happens before any filesystem access; only a path that is
//! already known to sit under the root is canonicalized to catch symlinks.

use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::error::{Result, TutorError};

/// Largest file a tool will read
pub const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

#[derive(Clone, Debug)]
pub struct PathGuard {
    root: PathBuf,
}

impl PathGuard {
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = fs::canonicalize(root.as_ref()).map_err(|e| {
            TutorError::Configuration(format!(
                "Invalid sandbox root '{}': {e}",
                root.as_ref().display()
            ))
        })?;

        if !root.is_dir() {
            return Err(TutorError::Configuration(format!(
                "Sandbox root '{}' is not a directory",
                root.display()
            )));
        }

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a tool argument against the root.
    ///
    /// Relative paths are joined to the root, absolute paths are taken as-is;
    /// either way the normalized result must stay under the root.
    pub fn resolve(&self, requested: &str) -> Result<PathBuf> {
        let candidate = normalize(&self.root.join(requested));

        if !candidate.starts_with(&self.root) {
            tracing::warn!(path = %requested, "Path escapes sandbox");
            return Err(escape(requested));
        }

        // Only paths inside the root reach the filesystem
        if let Ok(real) = fs::canonicalize(&candidate) {
            if !real.starts_with(&self.root) {
                tracing::warn!(path = %requested, "Symlink escapes sandbox");
                return Err(escape(requested));
            }
        }

        Ok(candidate)
    }

    /// Display form of a resolved path, relative to the root
    pub fn relative(&self, path: &Path) -> String {
        match path.strip_prefix(&self.root) {
            Ok(rel) if rel.as_os_str().is_empty() => ".".into(),
            Ok(rel) => rel.display().to_string(),
            Err(_) => path.display().to_string(),
        }
    }
}

fn escape(requested: &str) -> TutorError {
    TutorError::ToolExecution(format!("Path '{requested}' is outside the allowed directory"))
}

/// Collapse `.` and `..` without touching the filesystem
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(part) => out.push(part),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard() -> (tempfile::TempDir, PathGuard) {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/main.rs"), "fn main() {}\n").unwrap();
        let guard = PathGuard::new(dir.path()).unwrap();
        (dir, guard)
    }

    #[test]
    fn test_relative_paths_inside_root() {
        let (_dir, guard) = guard();
        let path = guard.resolve("src/main.rs").unwrap();
        assert!(path.starts_with(guard.root()));
        assert_eq!(guard.relative(&path), "src/main.rs");
        assert_eq!(guard.relative(&guard.resolve(".").unwrap()), ".");
        assert!(guard.resolve("src/../src/./main.rs").is_ok());
    }

    #[test]
    fn test_traversal_is_refused() {
        let (_dir, guard) = guard();
        for attempt in ["../../etc/passwd", "..", "src/../../outside", "./../x"] {
            assert!(guard.resolve(attempt).is_err(), "{attempt} should be refused");
        }
    }

    #[test]
    fn test_absolute_paths() {
        let (_dir, guard) = guard();
        assert!(guard.resolve("/etc/passwd").is_err());

        let inside = guard.root().join("src/main.rs");
        assert!(guard.resolve(inside.to_str().unwrap()).is_ok());
    }

    #[test]
    fn test_missing_paths_inside_root_resolve() {
        let (_dir, guard) = guard();
        assert!(guard.resolve("does/not/exist.txt").is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_escape_is_refused() {
        let (dir, guard) = guard();
        let outside = tempfile::tempdir().unwrap();
        fs::write(outside.path().join("secret.txt"), "s3cret").unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();

        assert!(guard.resolve("link/secret.txt").is_err());
        assert!(guard.resolve("link").is_err());
    }

    #[test]
    fn test_root_must_exist() {
        assert!(matches!(
            PathGuard::new("/definitely/not/a/real/root"),
            Err(TutorError::Configuration(_))
        ));
    }
}
