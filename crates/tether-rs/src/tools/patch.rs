//! `apply_patch` envelope: parse, stage, commit.
//!
//! The envelope wraps Add/Delete/Update(+Move) operations between
//! `*** Begin Patch` and `*** End Patch` lines. Updates carry one or more
//! `@@` hunks whose lines are prefixed with a space (context), `+`
//! (insertion), or `-` (deletion); the first non-insertion line of a hunk
//! anchors it by exact match against the original, scanned from a
//! monotonic cursor. The whole patch is staged in memory and committed
//! only when every operation succeeded — a failing op-block leaves the
//! tree untouched.

use std::path::PathBuf;

use tracing::{debug, info};

use crate::AgentError;
use crate::workspace::WorkspaceRoot;

const BEGIN: &str = "*** Begin Patch";
const END: &str = "*** End Patch";
const ADD: &str = "*** Add File: ";
const DELETE: &str = "*** Delete File: ";
const UPDATE: &str = "*** Update File: ";
const MOVE_TO: &str = "*** Move to: ";

// ── Parsed representation ───────────────────────────────────────────

/// One line inside an update hunk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HunkLine {
    Context(String),
    Insert(String),
    Delete(String),
}

/// One operation block of the envelope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PatchOp {
    Add {
        path: String,
        content: String,
    },
    Delete {
        path: String,
    },
    Update {
        path: String,
        move_to: Option<String>,
        hunks: Vec<Vec<HunkLine>>,
    },
}

fn bad(msg: impl Into<String>) -> AgentError {
    AgentError::InvalidArgument(msg.into())
}

/// Parse the envelope into its operation blocks.
pub fn parse_patch(text: &str) -> Result<Vec<PatchOp>, AgentError> {
    let lines: Vec<&str> = text.lines().collect();
    let mut index = 0;

    while index < lines.len() && lines[index].trim().is_empty() {
        index += 1;
    }
    if index >= lines.len() || lines[index] != BEGIN {
        return Err(bad(format!("patch must start with '{BEGIN}'")));
    }
    index += 1;

    let mut ops = Vec::new();
    loop {
        while index < lines.len() && lines[index].trim().is_empty() {
            index += 1;
        }
        let Some(&line) = lines.get(index) else {
            return Err(bad(format!("patch is missing '{END}'")));
        };
        if line == END {
            break;
        }

        if let Some(path) = line.strip_prefix(ADD) {
            index += 1;
            let mut content_lines = Vec::new();
            while let Some(&l) = lines.get(index) {
                if let Some(rest) = l.strip_prefix('+') {
                    content_lines.push(rest);
                    index += 1;
                } else {
                    break;
                }
            }
            let content = if content_lines.is_empty() {
                String::new()
            } else {
                format!("{}\n", content_lines.join("\n"))
            };
            ops.push(PatchOp::Add {
                path: path.to_string(),
                content,
            });
        } else if let Some(path) = line.strip_prefix(DELETE) {
            index += 1;
            ops.push(PatchOp::Delete {
                path: path.to_string(),
            });
        } else if let Some(path) = line.strip_prefix(UPDATE) {
            index += 1;
            let move_to = lines.get(index).and_then(|l| l.strip_prefix(MOVE_TO)).map(|p| {
                index += 1;
                p.to_string()
            });
            let hunks = parse_hunks(&lines, &mut index)?;
            if hunks.is_empty() {
                return Err(bad(format!("update block for '{path}' has no hunks")));
            }
            ops.push(PatchOp::Update {
                path: path.to_string(),
                move_to,
                hunks,
            });
        } else {
            return Err(bad(format!("unrecognized patch line: '{line}'")));
        }
    }

    if ops.is_empty() {
        return Err(bad("patch contains no operations"));
    }
    Ok(ops)
}

/// Parse the hunks of one update block, advancing `index` past them.
///
/// A blank line is allowed before the next `@@` or `***` header but
/// rejected between the prefixed lines of a hunk.
fn parse_hunks(lines: &[&str], index: &mut usize) -> Result<Vec<Vec<HunkLine>>, AgentError> {
    let mut hunks: Vec<Vec<HunkLine>> = Vec::new();

    loop {
        let Some(&line) = lines.get(*index) else {
            break;
        };
        if line.starts_with("@@") {
            hunks.push(Vec::new());
            *index += 1;
        } else if line.starts_with("***") {
            break;
        } else if line.is_empty() {
            // Peek: blank lines are only legal between blocks/hunks.
            let next = lines[*index + 1..]
                .iter()
                .find(|l| !l.trim().is_empty())
                .copied();
            match next {
                Some(n) if n.starts_with("@@") || n.starts_with("***") => {
                    *index += 1;
                }
                None => break,
                Some(_) => return Err(bad("empty line inside hunk")),
            }
        } else {
            let Some(hunk) = hunks.last_mut() else {
                return Err(bad(format!("hunk line before '@@': '{line}'")));
            };
            #[allow(clippy::string_slice)] // prefix byte is ASCII
            let parsed = match line.as_bytes().first() {
                Some(b' ') => HunkLine::Context(line[1..].to_string()),
                Some(b'+') => HunkLine::Insert(line[1..].to_string()),
                Some(b'-') => HunkLine::Delete(line[1..].to_string()),
                _ => return Err(bad(format!("bad hunk line prefix: '{line}'"))),
            };
            hunk.push(parsed);
            *index += 1;
        }
    }
    Ok(hunks)
}

// ── Update application ──────────────────────────────────────────────

/// Apply update hunks to an original text.
///
/// Pure function over the original contents; the trailing newline of the
/// input is preserved on the output.
pub fn apply_update(original: &str, hunks: &[Vec<HunkLine>]) -> Result<String, AgentError> {
    let source: Vec<&str> = original.lines().collect();
    let had_trailing_newline = original.ends_with('\n');
    let mut out: Vec<String> = Vec::with_capacity(source.len());
    let mut cursor = 0usize;

    for hunk in hunks {
        // Anchor: the first non-insertion line, located by exact match
        // scanning forward from the cursor.
        let anchor = hunk.iter().find_map(|l| match l {
            HunkLine::Context(s) | HunkLine::Delete(s) => Some(s.as_str()),
            HunkLine::Insert(_) => None,
        });
        if let Some(anchor) = anchor {
            let position = source[cursor..]
                .iter()
                .position(|l| *l == anchor)
                .map(|p| cursor + p)
                .ok_or_else(|| bad(format!("hunk anchor not found in file: '{anchor}'")))?;
            // Intervening original lines pass through verbatim.
            for line in &source[cursor..position] {
                out.push((*line).to_string());
            }
            cursor = position;
        }

        for line in hunk {
            match line {
                HunkLine::Context(expected) => {
                    let got = source
                        .get(cursor)
                        .ok_or_else(|| bad(format!("context ran past end of file: '{expected}'")))?;
                    if got != expected {
                        return Err(bad(format!(
                            "context mismatch: expected '{expected}', found '{got}'"
                        )));
                    }
                    out.push((*got).to_string());
                    cursor += 1;
                }
                HunkLine::Delete(expected) => {
                    let got = source
                        .get(cursor)
                        .ok_or_else(|| bad(format!("deletion ran past end of file: '{expected}'")))?;
                    if got != expected {
                        return Err(bad(format!(
                            "deletion mismatch: expected '{expected}', found '{got}'"
                        )));
                    }
                    cursor += 1;
                }
                HunkLine::Insert(text) => out.push(text.clone()),
            }
        }
    }

    for line in &source[cursor..] {
        out.push((*line).to_string());
    }

    let mut result = out.join("\n");
    if had_trailing_newline && !result.is_empty() {
        result.push('\n');
    }
    Ok(result)
}

// ── Staged commit ───────────────────────────────────────────────────

#[derive(Debug)]
enum Staged {
    Write { path: PathBuf, content: String },
    Remove { path: PathBuf },
}

/// Apply a whole patch envelope against the workspace.
///
/// All operations are staged in memory first; nothing touches disk until
/// every block has been validated and applied cleanly.
pub async fn apply_patch(root: &WorkspaceRoot, patch_text: &str) -> Result<String, AgentError> {
    let ops = parse_patch(patch_text)?;
    let mut staged: Vec<Staged> = Vec::new();
    let mut summary = String::from("Success. Updated the following files:\n");

    for op in &ops {
        match op {
            PatchOp::Add { path, content } => {
                let resolved = root.resolve(path)?;
                if resolved.exists() {
                    return Err(bad(format!("Add File target '{path}' already exists")));
                }
                staged.push(Staged::Write {
                    path: resolved,
                    content: content.clone(),
                });
                summary.push_str(&format!("A {path}\n"));
            }
            PatchOp::Delete { path } => {
                let resolved = root.resolve_existing(path)?;
                staged.push(Staged::Remove { path: resolved });
                summary.push_str(&format!("D {path}\n"));
            }
            PatchOp::Update {
                path,
                move_to,
                hunks,
            } => {
                let resolved = root.resolve_existing(path)?;
                let original = tokio::fs::read_to_string(&resolved)
                    .await
                    .map_err(|e| AgentError::Io(format!("cannot read '{path}': {e}")))?;
                let updated = apply_update(&original, hunks)?;
                match move_to {
                    Some(new_path) => {
                        let destination = root.resolve(new_path)?;
                        staged.push(Staged::Write {
                            path: destination,
                            content: updated,
                        });
                        staged.push(Staged::Remove { path: resolved });
                        summary.push_str(&format!("M {new_path}\n"));
                    }
                    None => {
                        staged.push(Staged::Write {
                            path: resolved,
                            content: updated,
                        });
                        summary.push_str(&format!("M {path}\n"));
                    }
                }
            }
        }
    }

    debug!("patch staged: {} filesystem actions", staged.len());
    for action in &staged {
        match action {
            Staged::Write { path, content } => {
                if let Some(parent) = path.parent() {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .map_err(|e| AgentError::Io(format!("cannot create directories: {e}")))?;
                }
                tokio::fs::write(path, content)
                    .await
                    .map_err(|e| AgentError::Io(format!("cannot write '{}': {e}", path.display())))?;
            }
            Staged::Remove { path } => {
                tokio::fs::remove_file(path)
                    .await
                    .map_err(|e| AgentError::Io(format!("cannot delete '{}': {e}", path.display())))?;
            }
        }
    }

    info!("patch applied: {} op(s)", ops.len());
    Ok(summary)
}
