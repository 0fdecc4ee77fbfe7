//! File tools: bounded reads, whole-file writes, structural outlines.
//!
//! Reads are windowed by byte offset and limit so any file can be paged
//! through without blowing the prompt budget; window notes are part of the
//! tool-output protocol (consumers pattern-match them). Writes create
//! parent directories, report a mini unified diff, and append `zig fmt
//! --check` diagnostics for Zig sources.

use std::path::Path;

use tokio::fs;
use tokio::process::Command;
use tracing::debug;

use crate::AgentError;
use crate::tools::diff::render_mini_diff;
use crate::workspace::WorkspaceRoot;

/// Hard ceiling and default for the read window.
pub const MAX_READ_LIMIT: u64 = 16_384;

/// Suffix appended when a window stops short of EOF.
pub const TRUNCATION_NOTE: &str = "\n\n[...truncated, more content available]";

// ── Bounded read ────────────────────────────────────────────────────

/// Read a byte window of a file.
///
/// `limit` is clamped to [`MAX_READ_LIMIT`]; zero selects the default.
/// Windows are half-open byte ranges with `end = min(offset + limit,
/// total)`, so successive windows with step `limit` tile the file
/// exactly. The body is rendered as lossy UTF-8; offsets always count
/// raw bytes.
pub async fn read_window(
    root: &WorkspaceRoot,
    raw_path: &str,
    offset: u64,
    limit: u64,
) -> Result<String, AgentError> {
    let path = root.resolve_existing(raw_path)?;
    let bytes = fs::read(&path)
        .await
        .map_err(|e| AgentError::Io(format!("cannot read '{raw_path}': {e}")))?;

    let limit = if limit == 0 { MAX_READ_LIMIT } else { limit.min(MAX_READ_LIMIT) };
    let total = bytes.len() as u64;
    let start = offset.min(total);
    let end = (start + limit).min(total);

    debug!("[read] {raw_path}: bytes {start}..{end} of {total}");
    let body = String::from_utf8_lossy(&bytes[start as usize..end as usize]).into_owned();

    let mut out = String::new();
    if offset > 0 {
        out.push_str(&format!("[showing bytes {start} to {end} of {total} total]\n\n"));
    }
    out.push_str(&body);
    if end < total {
        out.push_str(TRUNCATION_NOTE);
    }
    Ok(out)
}

// ── Write ───────────────────────────────────────────────────────────

/// Replace a file's contents, creating parent directories as needed.
///
/// Returns a summary with a mini unified diff against the prior contents
/// and, for `.zig` files, any `zig fmt --check` diagnostics (diagnostics
/// are informational, never an error).
pub async fn write_file(
    root: &WorkspaceRoot,
    raw_path: &str,
    content: &str,
) -> Result<String, AgentError> {
    let path = root.resolve(raw_path)?;

    let previous = match fs::read_to_string(&path).await {
        Ok(text) => text,
        Err(_) => String::new(),
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| AgentError::Io(format!("cannot create parent directories: {e}")))?;
    }
    fs::write(&path, content)
        .await
        .map_err(|e| AgentError::Io(format!("cannot write '{raw_path}': {e}")))?;

    let mut out = format!("Wrote {raw_path} ({} bytes)\n", content.len());
    out.push_str(&render_mini_diff(raw_path, &previous, content));

    if path.extension().is_some_and(|ext| ext == "zig")
        && let Some(diagnostics) = zig_fmt_check(&path).await
    {
        out.push_str("\n[zig fmt]\n");
        out.push_str(&diagnostics);
    }
    Ok(out)
}

/// Run `zig fmt --check` on a written file. Returns `None` when the
/// formatter is unavailable or the file is clean.
pub(crate) async fn zig_fmt_check(path: &Path) -> Option<String> {
    let output = Command::new("zig")
        .args(["fmt", "--check"])
        .arg(path)
        .output()
        .await
        .ok()?;
    if output.status.success() {
        return None;
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let combined = format!("{stdout}{stderr}");
    let trimmed = combined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

// ── Outline ─────────────────────────────────────────────────────────

/// Line prefixes that read as structural declarations.
const DECLARATION_PREFIXES: &[&str] = &[
    "fn ",
    "pub fn ",
    "pub const ",
    "const ",
    "var ",
    "pub var ",
    "struct ",
    "enum ",
    "union ",
    "type ",
    "trait ",
    "impl ",
    "class ",
    "def ",
    "function ",
];

/// Return a structural outline via a heuristic line-prefix scan.
///
/// `const`/`var` lines only count when they introduce a container or
/// function value, keeping plain value bindings out of the outline.
pub async fn file_outline(root: &WorkspaceRoot, raw_path: &str) -> Result<String, AgentError> {
    let path = root.resolve_existing(raw_path)?;
    let text = fs::read_to_string(&path)
        .await
        .map_err(|e| AgentError::Io(format!("cannot read '{raw_path}': {e}")))?;

    let mut out = String::new();
    for (index, line) in text.lines().enumerate() {
        let trimmed = line.trim_start();
        let has_prefix = DECLARATION_PREFIXES
            .iter()
            .any(|prefix| trimmed.starts_with(prefix));
        let is_value_binding = ["const ", "pub const ", "var ", "pub var "]
            .iter()
            .any(|p| trimmed.starts_with(p));
        let binds_container = trimmed.contains("= struct")
            || trimmed.contains("= enum")
            || trimmed.contains("= union")
            || trimmed.contains("= fn");
        if has_prefix && (!is_value_binding || binds_container) {
            out.push_str(&format!("L{}: {}\n", index + 1, line.trim_end()));
        }
    }

    if out.is_empty() {
        Ok(format!("no structural declarations found in {raw_path}"))
    } else {
        Ok(out)
    }
}
