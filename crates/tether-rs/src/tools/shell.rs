//! Shell command primitive.
//!
//! `bash` runs its argument via `/bin/sh -c` in the workspace root.
//! `list_files` is a thin veneer over the same primitive (`ls -la`).
//! Combined output is capped at 512 KiB; non-zero exits (including
//! signals) are prefixed with `[exit N]` and stderr is appended as its
//! own block.

use std::path::Path;

use tokio::process::Command;
use tracing::{debug, info};

use crate::AgentError;
use crate::cancel::CancelFlag;

/// Combined stdout+stderr cap.
pub const MAX_SHELL_OUTPUT: usize = 512 * 1024;

/// Run a shell command in `workdir`, honoring the cancellation flag
/// before spawning.
pub async fn run_shell(
    command: &str,
    workdir: &Path,
    cancel: &CancelFlag,
) -> Result<String, AgentError> {
    if cancel.is_cancelled() {
        return Err(AgentError::Cancelled);
    }

    let preview: String = command.chars().take(120).collect();
    info!("[bash] {preview}");
    let output = Command::new("/bin/sh")
        .arg("-c")
        .arg(command)
        .current_dir(workdir)
        .output()
        .await
        .map_err(|e| AgentError::Io(format!("failed to spawn /bin/sh: {e}")))?;

    if cancel.is_cancelled() {
        return Err(AgentError::Cancelled);
    }

    let exit = exit_code(&output.status);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    debug!(
        "[bash] exit={exit} stdout={}B stderr={}B",
        stdout.len(),
        stderr.len()
    );

    // Stdout gets priority under the combined cap; stderr takes what's left.
    let stdout = cap_utf8(&stdout, MAX_SHELL_OUTPUT);
    let stderr_budget = MAX_SHELL_OUTPUT - stdout.len().min(MAX_SHELL_OUTPUT);
    let stderr = cap_utf8(&stderr, stderr_budget);

    let mut out = String::new();
    if exit != 0 {
        out.push_str(&format!("[exit {exit}]\n"));
    }
    out.push_str(&stdout);
    if !stderr.is_empty() {
        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str("[stderr]\n");
        out.push_str(&stderr);
    }
    Ok(out)
}

/// Exit code, mapping a terminating signal to the conventional `128 + N`.
fn exit_code(status: &std::process::ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}

/// Truncate to at most `max` bytes on a char boundary, appending a notice
/// when anything was cut.
fn cap_utf8(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    #[allow(clippy::string_slice)] // end is on a char boundary
    format!("{}\n[output truncated at {max} bytes]", &s[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workdir() -> tempfile::TempDir {
        tempfile::tempdir().unwrap()
    }

    #[tokio::test]
    async fn captures_stdout() {
        let dir = workdir();
        let out = run_shell("echo hello", dir.path(), &CancelFlag::new())
            .await
            .unwrap();
        assert_eq!(out, "hello\n");
    }

    #[tokio::test]
    async fn nonzero_exit_is_prefixed() {
        let dir = workdir();
        let out = run_shell("exit 3", dir.path(), &CancelFlag::new())
            .await
            .unwrap();
        assert!(out.starts_with("[exit 3]"));
    }

    #[tokio::test]
    async fn stderr_appended_as_block() {
        let dir = workdir();
        let out = run_shell("echo out; echo err >&2", dir.path(), &CancelFlag::new())
            .await
            .unwrap();
        assert!(out.contains("out\n"));
        assert!(out.contains("[stderr]\nerr\n"));
    }

    #[tokio::test]
    async fn cancelled_before_spawn() {
        let dir = workdir();
        let cancel = CancelFlag::new();
        cancel.trigger();
        let err = run_shell("echo never", dir.path(), &cancel).await.unwrap_err();
        assert_eq!(err, AgentError::Cancelled);
    }

    #[tokio::test]
    async fn output_is_capped() {
        let dir = workdir();
        // ~600 KiB of output, over the 512 KiB cap.
        let out = run_shell(
            "yes 0123456789abcdef | head -c 600000",
            dir.path(),
            &CancelFlag::new(),
        )
        .await
        .unwrap();
        assert!(out.len() <= MAX_SHELL_OUTPUT + 64);
        assert!(out.contains("[output truncated"));
    }

    #[tokio::test]
    async fn runs_in_workdir() {
        let dir = workdir();
        std::fs::write(dir.path().join("marker.txt"), "m").unwrap();
        let out = run_shell("ls", dir.path(), &CancelFlag::new()).await.unwrap();
        assert!(out.contains("marker.txt"));
    }
}
