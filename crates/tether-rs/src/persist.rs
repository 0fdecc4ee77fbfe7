//! Project-scoped state files.
//!
//! Context and todo persistence are keyed by a CRC32 of the canonical
//! workspace root, so two projects never share state. All writes go
//! through the same write-temp-then-rename helper.
//!
//! Layout under the state directory:
//!
//! ```text
//! context-<hex>.json   conversation summary + turns
//! todos-<hex>.json     todo items
//! history              line-delimited REPL input history
//! ```

use std::path::{Path, PathBuf};

/// Hex CRC32 of the canonical workspace root, used as the project key.
pub fn project_key(workspace_root: &Path) -> String {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(workspace_root.to_string_lossy().as_bytes());
    format!("{:08x}", hasher.finalize())
}

/// The state directory, created on first use.
///
/// Defaults to `<config dir>/tether`; falls back to `.tether` in the
/// current directory when no config directory is available.
pub fn state_dir() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("tether"))
        .unwrap_or_else(|| PathBuf::from(".tether"))
}

/// Path of the persisted context file for a workspace.
pub fn context_file(state_dir: &Path, workspace_root: &Path) -> PathBuf {
    state_dir.join(format!("context-{}.json", project_key(workspace_root)))
}

/// Path of the persisted todos file for a workspace.
pub fn todos_file(state_dir: &Path, workspace_root: &Path) -> PathBuf {
    state_dir.join(format!("todos-{}.json", project_key(workspace_root)))
}

/// Path of the line-delimited input history file.
pub fn history_file(state_dir: &Path) -> PathBuf {
    state_dir.join("history")
}

/// Atomic write: serialize to a sibling temp file, then rename into place.
pub fn write_atomic(path: &Path, contents: &str) -> Result<(), String> {
    let parent = path
        .parent()
        .ok_or_else(|| format!("no parent directory for {}", path.display()))?;
    std::fs::create_dir_all(parent)
        .map_err(|e| format!("failed to create state dir: {e}"))?;

    let file_name = path
        .file_name()
        .ok_or_else(|| format!("no file name in {}", path.display()))?
        .to_string_lossy();
    let tmp_path = parent.join(format!(".{file_name}.tmp"));

    std::fs::write(&tmp_path, contents).map_err(|e| format!("failed to write temp file: {e}"))?;
    std::fs::rename(&tmp_path, path).map_err(|e| format!("failed to rename into place: {e}"))?;
    Ok(())
}
