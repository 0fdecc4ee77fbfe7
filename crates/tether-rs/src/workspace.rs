//! Workspace path sandbox.
//!
//! Every filesystem path an LLM can influence flows through
//! [`WorkspaceRoot::resolve`]: a single, cheap containment predicate that
//! prevents directory traversal for every tool. The root is fixed at loop
//! start, absolute, and canonical (symlinks resolved).

use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::AgentError;

/// The sandbox boundary: an absolute canonical directory fixed at loop start.
#[derive(Clone, Debug)]
pub struct WorkspaceRoot {
    root: PathBuf,
}

impl WorkspaceRoot {
    /// Canonicalize `path` and fix it as the workspace root.
    ///
    /// Fails if the directory does not exist or cannot be canonicalized.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, String> {
        let root = std::fs::canonicalize(path.as_ref())
            .map_err(|e| format!("cannot canonicalize workspace root '{}': {e}", path.as_ref().display()))?;
        Ok(Self { root })
    }

    /// The canonical root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a raw tool path argument against the workspace root.
    ///
    /// Absolute paths are used as-is; relative paths are joined onto the
    /// root. `.` and `..` segments are normalized, symlinks are followed for
    /// the longest existing prefix, and the final resolved path must be the
    /// root itself or live strictly under it. Rejections carry the guard
    /// sentinel other agents pattern-match on.
    pub fn resolve(&self, raw: &str) -> Result<PathBuf, AgentError> {
        let candidate = {
            let p = Path::new(raw);
            if p.is_absolute() {
                p.to_path_buf()
            } else {
                self.root.join(p)
            }
        };

        let normalized = normalize_lexically(&candidate);
        let resolved = canonicalize_existing_prefix(&normalized);

        if resolved == self.root || resolved.starts_with(&self.root) {
            Ok(resolved)
        } else {
            debug!("sandbox rejected '{raw}' (resolved to {})", resolved.display());
            Err(AgentError::InvalidArgument(escape_sentinel(raw)))
        }
    }

    /// Like [`resolve`](Self::resolve), but additionally requires the target
    /// to exist. Missing targets carry the missing-file sentinel.
    pub fn resolve_existing(&self, raw: &str) -> Result<PathBuf, AgentError> {
        let resolved = self.resolve(raw)?;
        if resolved.exists() {
            Ok(resolved)
        } else {
            Err(AgentError::InvalidArgument(missing_sentinel(raw)))
        }
    }
}

/// The exact guard sentinel for paths outside the workspace (consumers
/// pattern-match this prefix).
pub fn escape_sentinel(raw: &str) -> String {
    format!("WTF? '{raw}' is outside the workspace! Stick to paths under the project root.")
}

/// The exact sentinel for paths that resolved inside the workspace but do
/// not exist on disk.
pub fn missing_sentinel(raw: &str) -> String {
    format!("Bruh, file '{raw}' doesn't exist.")
}

/// Normalize `.` and `..` segments without touching the filesystem.
///
/// `..` at the top of an absolute path stays popped — the resulting path is
/// simply shorter, and the containment check rejects it.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(p) => out.push(p.as_os_str()),
            Component::RootDir => out.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(name) => out.push(name),
        }
    }
    out
}

/// Canonicalize the longest existing ancestor of `path` (following
/// symlinks) and re-append the non-existing tail.
///
/// New files have no canonical form yet; their containment is judged by the
/// canonical form of the deepest directory that does exist.
fn canonicalize_existing_prefix(path: &Path) -> PathBuf {
    let mut prefix = path.to_path_buf();
    let mut tail: Vec<std::ffi::OsString> = Vec::new();

    loop {
        match std::fs::canonicalize(&prefix) {
            Ok(canonical) => {
                let mut out = canonical;
                for segment in tail.iter().rev() {
                    out.push(segment);
                }
                return out;
            }
            Err(_) => match (prefix.file_name(), prefix.parent()) {
                (Some(name), Some(parent)) => {
                    tail.push(name.to_os_string());
                    prefix = parent.to_path_buf();
                }
                // Ran out of ancestors; return the lexical form unchanged.
                _ => return path.to_path_buf(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (tempfile::TempDir, WorkspaceRoot) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/main.zig"), "pub fn main() {}\n").unwrap();
        let root = WorkspaceRoot::new(dir.path()).unwrap();
        (dir, root)
    }

    #[test]
    fn relative_path_resolves_under_root() {
        let (_dir, root) = fixture();
        let resolved = root.resolve("src/main.zig").unwrap();
        assert!(resolved.starts_with(root.root()));
        assert!(resolved.ends_with("src/main.zig"));
    }

    #[test]
    fn root_itself_is_accepted() {
        let (_dir, root) = fixture();
        let resolved = root.resolve(".").unwrap();
        assert_eq!(resolved, root.root());
    }

    #[test]
    fn dotdot_escape_is_rejected() {
        let (_dir, root) = fixture();
        let err = root.resolve("../etc/passwd").unwrap_err();
        match err {
            AgentError::InvalidArgument(msg) => {
                assert!(msg.starts_with("WTF? '../etc/passwd' is outside the workspace!"));
            }
            other => panic!("expected InvalidArgument, got {other:?}"),
        }
    }

    #[test]
    fn interior_dotdot_stays_contained() {
        let (_dir, root) = fixture();
        let resolved = root.resolve("src/../src/main.zig").unwrap();
        assert!(resolved.ends_with("src/main.zig"));
    }

    #[test]
    fn absolute_path_outside_root_is_rejected() {
        let (_dir, root) = fixture();
        assert!(root.resolve("/etc/passwd").is_err());
    }

    #[test]
    fn absolute_path_inside_root_is_accepted() {
        let (_dir, root) = fixture();
        let inside = root.root().join("src/main.zig");
        let resolved = root.resolve(inside.to_str().unwrap()).unwrap();
        assert!(resolved.starts_with(root.root()));
    }

    #[test]
    fn new_file_path_is_accepted() {
        let (_dir, root) = fixture();
        let resolved = root.resolve("src/new_module.zig").unwrap();
        assert!(resolved.starts_with(root.root()));
        assert!(!resolved.exists());
    }

    #[test]
    fn resolve_existing_rejects_missing_files() {
        let (_dir, root) = fixture();
        let err = root.resolve_existing("src/ghost.zig").unwrap_err();
        match err {
            AgentError::InvalidArgument(msg) => {
                assert_eq!(msg, "Bruh, file 'src/ghost.zig' doesn't exist.");
            }
            other => panic!("expected InvalidArgument, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn symlink_escaping_root_is_rejected() {
        let (dir, root) = fixture();
        let outside = tempfile::tempdir().unwrap();
        std::fs::write(outside.path().join("secret.txt"), "s").unwrap();
        std::os::unix::fs::symlink(outside.path().join("secret.txt"), dir.path().join("link.txt"))
            .unwrap();
        assert!(root.resolve("link.txt").is_err());
    }

    #[test]
    fn prefix_collision_does_not_pass() {
        // /tmp/xyz-work must not satisfy containment for root /tmp/xyz.
        let dir = tempfile::tempdir().unwrap();
        let root_dir = dir.path().join("proj");
        std::fs::create_dir(&root_dir).unwrap();
        std::fs::create_dir(dir.path().join("proj-sibling")).unwrap();
        let root = WorkspaceRoot::new(&root_dir).unwrap();
        let sibling = dir.path().join("proj-sibling");
        assert!(root.resolve(sibling.to_str().unwrap()).is_err());
    }
}
