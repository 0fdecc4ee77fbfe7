//! Strict text replacement with a line-trimmed fuzzy fallback.
//!
//! The replacement core is a pure function of `(original, find, replace,
//! replace_all)`. Exact occurrences are counted first; with none, a
//! fallback matches the pattern's line sequence against the original with
//! per-line ASCII-whitespace trimming, committing only when exactly one
//! contiguous slice matches. Large edits are held behind a confirmation
//! gate before anything is written.

use tracing::debug;

use crate::AgentError;
use crate::tools::diff::{changed_block, render_mini_diff};
use crate::tools::fsops::zig_fmt_check;
use crate::workspace::WorkspaceRoot;

/// Changed-line count above which an edit needs `confirm: true`.
pub const CONFIRM_LINE_LIMIT: usize = 100;

/// Failure modes of the pure replacement core.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReplaceError {
    EmptyPattern,
    NotFound,
    /// The pattern occurred this many times and `replace_all` was off.
    Ambiguous(usize),
    /// The line-trimmed fallback matched at this many positions.
    FuzzyAmbiguous(usize),
}

/// Apply the strict replacement rules and return the new text.
///
/// Pure: the output depends only on the four inputs.
pub fn strict_replace(
    original: &str,
    find: &str,
    replace: &str,
    replace_all: bool,
) -> Result<String, ReplaceError> {
    if find.is_empty() {
        return Err(ReplaceError::EmptyPattern);
    }

    let count = original.matches(find).count();
    match count {
        0 => fuzzy_replace(original, find, replace),
        1 => Ok(original.replacen(find, replace, 1)),
        n if replace_all => {
            debug!("replacing all {n} occurrences");
            Ok(original.replace(find, replace))
        }
        n => Err(ReplaceError::Ambiguous(n)),
    }
}

/// Line-trimmed fallback: match `find`'s line sequence against a
/// contiguous slice of `original` comparing per-line after trimming ASCII
/// whitespace. Commits only on exactly one match position.
fn fuzzy_replace(original: &str, find: &str, replace: &str) -> Result<String, ReplaceError> {
    let needle: Vec<&str> = find.lines().map(str::trim).collect();
    if needle.is_empty() {
        return Err(ReplaceError::NotFound);
    }

    // Line spans as byte ranges excluding the terminator.
    let spans = line_spans(original);
    if spans.len() < needle.len() {
        return Err(ReplaceError::NotFound);
    }

    let mut positions = Vec::new();
    for start in 0..=(spans.len() - needle.len()) {
        let matches = needle.iter().enumerate().all(|(k, want)| {
            let (line_start, line_end) = spans[start + k];
            #[allow(clippy::string_slice)] // spans lie on line boundaries
            let got = original[line_start..line_end].trim();
            got == *want
        });
        if matches {
            positions.push(start);
        }
    }

    match positions.as_slice() {
        [] => Err(ReplaceError::NotFound),
        [index] => {
            let splice_start = spans[*index].0;
            let splice_end = spans[index + needle.len() - 1].1;
            let mut out = String::with_capacity(original.len());
            #[allow(clippy::string_slice)] // spans lie on line boundaries
            {
                out.push_str(&original[..splice_start]);
                out.push_str(replace);
                out.push_str(&original[splice_end..]);
            }
            debug!("fuzzy fallback matched at line {index}");
            Ok(out)
        }
        many => Err(ReplaceError::FuzzyAmbiguous(many.len())),
    }
}

/// Byte ranges of each line, excluding the `\n` terminator.
fn line_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = 0;
    for (index, byte) in text.bytes().enumerate() {
        if byte == b'\n' {
            spans.push((start, index));
            start = index + 1;
        }
    }
    if start < text.len() {
        spans.push((start, text.len()));
    }
    spans
}

// ── Tool layer ──────────────────────────────────────────────────────

/// Execute `replace_in_file` against the workspace.
///
/// Returns the payload string: either the confirmation sentinel (nothing
/// written), or the success summary with a mini diff and formatter
/// diagnostics.
pub async fn replace_in_file(
    root: &WorkspaceRoot,
    raw_path: &str,
    find: &str,
    replace: &str,
    replace_all: bool,
    confirm: bool,
) -> Result<String, AgentError> {
    let path = root.resolve_existing(raw_path)?;
    let original = tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| AgentError::Io(format!("cannot read '{raw_path}': {e}")))?;

    let new_text = strict_replace(&original, find, replace, replace_all).map_err(|e| {
        AgentError::InvalidArgument(match e {
            ReplaceError::EmptyPattern => {
                format!("Replace failed: empty pattern for {raw_path}. Provide the text to find.")
            }
            ReplaceError::NotFound => format!(
                "Replace failed: pattern not found in {raw_path}. Check whitespace and exact \
                 text, or read the file first."
            ),
            ReplaceError::Ambiguous(n) => format!(
                "Replace failed: pattern matched {n} locations in {raw_path}. Add surrounding \
                 context to disambiguate, or set replaceAll."
            ),
            ReplaceError::FuzzyAmbiguous(n) => format!(
                "Replace failed: pattern matched {n} locations in {raw_path} after whitespace \
                 trimming. Add surrounding context to disambiguate."
            ),
        })
    })?;

    // Size gate: large changed blocks need an explicit confirm re-run.
    let changed_lines = changed_block(&original, &new_text).map_or(0, |d| d.size());
    if changed_lines > CONFIRM_LINE_LIMIT && !confirm {
        return Ok(format!(
            "CONFIRM_REQUIRED: edit would modify {changed_lines} lines in {raw_path} \
             (limit {CONFIRM_LINE_LIMIT}). Re-run with {{\"confirm\":true}} to proceed."
        ));
    }

    tokio::fs::write(&path, &new_text)
        .await
        .map_err(|e| AgentError::Io(format!("cannot write '{raw_path}': {e}")))?;

    let mut out = format!("Edited {raw_path}\n");
    out.push_str(&render_mini_diff(raw_path, &original, &new_text));
    if path.extension().is_some_and(|ext| ext == "zig")
        && let Some(diagnostics) = zig_fmt_check(&path).await
    {
        out.push_str("\n[zig fmt]\n");
        out.push_str(&diagnostics);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── Pure core ──────────────────────────────────────────────────

    #[test]
    fn empty_pattern_rejected() {
        assert_eq!(
            strict_replace("abc", "", "x", false),
            Err(ReplaceError::EmptyPattern)
        );
    }

    #[test]
    fn single_occurrence_replaced() {
        assert_eq!(
            strict_replace("const x = 1;\n", "const x", "const y", false).unwrap(),
            "const y = 1;\n"
        );
    }

    #[test]
    fn multiple_occurrences_rejected_without_replace_all() {
        assert_eq!(
            strict_replace("const x;\nconst x;\n", "const x", "const y", false),
            Err(ReplaceError::Ambiguous(2))
        );
    }

    #[test]
    fn replace_all_replaces_left_to_right() {
        assert_eq!(
            strict_replace("a b a b a", "a", "Z", true).unwrap(),
            "Z b Z b Z"
        );
    }

    #[test]
    fn replace_first_only_when_all_off_and_unique() {
        // count == 1 with replace_all=false splices the one occurrence.
        assert_eq!(strict_replace("x y z", "y", "Y", false).unwrap(), "x Y z");
    }

    #[test]
    fn fuzzy_fallback_matches_trimmed_lines() {
        let original = "fn main() {\n        let a = 1;\n    let b = 2;\n}\n";
        let find = "let a = 1;\nlet b = 2;";
        let out = strict_replace(original, find, "    let c = 3;", false).unwrap();
        assert_eq!(out, "fn main() {\n    let c = 3;\n}\n");
    }

    #[test]
    fn fuzzy_fallback_rejects_multiple_positions() {
        // Trailing spaces defeat the exact matcher; trimming makes both
        // two-line windows match.
        let original = "  a \nb\n  a \nb\n";
        assert_eq!(
            strict_replace(original, "a\nb", "c", false),
            Err(ReplaceError::FuzzyAmbiguous(2))
        );
    }

    #[test]
    fn no_match_anywhere_is_not_found() {
        assert_eq!(
            strict_replace("hello\n", "goodbye", "x", false),
            Err(ReplaceError::NotFound)
        );
    }

    #[test]
    fn pure_function_is_deterministic() {
        let inputs = ("alpha\nbeta\ngamma\n", "beta", "BETA", false);
        let first = strict_replace(inputs.0, inputs.1, inputs.2, inputs.3).unwrap();
        let second = strict_replace(inputs.0, inputs.1, inputs.2, inputs.3).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn line_spans_cover_text_without_terminators() {
        assert_eq!(line_spans("ab\ncd"), vec![(0, 2), (3, 5)]);
        assert_eq!(line_spans("ab\ncd\n"), vec![(0, 2), (3, 5)]);
        assert!(line_spans("").is_empty());
    }

    // ── Tool layer ─────────────────────────────────────────────────

    fn fixture(contents: &str) -> (tempfile::TempDir, WorkspaceRoot) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("f.txt"), contents).unwrap();
        let root = WorkspaceRoot::new(dir.path()).unwrap();
        (dir, root)
    }

    #[tokio::test]
    async fn ambiguous_edit_leaves_file_unchanged() {
        let (dir, root) = fixture("const x = 1;\nconst x = 2;\n");
        let err = replace_in_file(&root, "f.txt", "const x", "const y", false, false)
            .await
            .unwrap_err();
        assert!(
            err.to_string()
                .starts_with("Replace failed: pattern matched 2 locations in f.txt")
        );
        assert_eq!(
            std::fs::read_to_string(dir.path().join("f.txt")).unwrap(),
            "const x = 1;\nconst x = 2;\n"
        );
    }

    #[tokio::test]
    async fn confirm_gate_blocks_then_allows_large_edits() {
        let original: String = (0..120).map(|n| format!("line {n}\n")).collect();
        let (dir, root) = fixture(&original);
        let replacement: String = (0..120).map(|n| format!("LINE {n}\n")).collect();

        let sentinel = replace_in_file(&root, "f.txt", &original, &replacement, false, false)
            .await
            .unwrap();
        assert!(sentinel.starts_with("CONFIRM_REQUIRED: edit would modify 120 lines in f.txt (limit 100)."));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("f.txt")).unwrap(),
            original,
            "gated edit must not write"
        );

        let done = replace_in_file(&root, "f.txt", &original, &replacement, false, true)
            .await
            .unwrap();
        assert!(done.starts_with("Edited f.txt"));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("f.txt")).unwrap(),
            replacement
        );
    }

    #[tokio::test]
    async fn success_payload_carries_mini_diff() {
        let (_dir, root) = fixture("one\ntwo\nthree\n");
        let out = replace_in_file(&root, "f.txt", "two", "TWO", false, false)
            .await
            .unwrap();
        assert!(out.contains("-two"));
        assert!(out.contains("+TWO"));
        assert!(out.contains("@@ -2,1 +2,1 @@"));
    }

    #[tokio::test]
    async fn missing_file_reports_sentinel() {
        let (_dir, root) = fixture("x\n");
        let err = replace_in_file(&root, "ghost.txt", "a", "b", false, false)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Bruh, file 'ghost.txt' doesn't exist."));
    }

    #[tokio::test]
    async fn pattern_not_found_sentinel() {
        let (_dir, root) = fixture("alpha\n");
        let err = replace_in_file(&root, "f.txt", "omega", "x", false, false)
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("Replace failed: pattern not found in f.txt."));
    }
}
