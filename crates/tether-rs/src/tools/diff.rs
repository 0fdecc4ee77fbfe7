//! Mini unified diff rendering.
//!
//! Write and replace tools report their effect as a single-hunk unified
//! diff: the common line prefix and suffix are trimmed and whatever
//! remains is the changed block. The same trimmed block drives the
//! 100-line confirmation gate in the replace tool.

const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const CYAN: &str = "\x1b[36m";
const RESET: &str = "\x1b[0m";

/// The changed block between two texts after trimming the common line
/// prefix and suffix.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineDelta {
    /// 0-indexed line where the change starts (in both texts).
    pub position: usize,
    pub removed: Vec<String>,
    pub added: Vec<String>,
}

impl LineDelta {
    /// Gate metric: `max(removed, added)` lines.
    pub fn size(&self) -> usize {
        self.removed.len().max(self.added.len())
    }
}

/// Compute the changed block, or `None` when the texts are line-identical.
pub fn changed_block(before: &str, after: &str) -> Option<LineDelta> {
    let old: Vec<&str> = before.lines().collect();
    let new: Vec<&str> = after.lines().collect();

    let mut prefix = 0;
    while prefix < old.len() && prefix < new.len() && old[prefix] == new[prefix] {
        prefix += 1;
    }

    let mut suffix = 0;
    while suffix < old.len() - prefix
        && suffix < new.len() - prefix
        && old[old.len() - 1 - suffix] == new[new.len() - 1 - suffix]
    {
        suffix += 1;
    }

    let removed: Vec<String> = old[prefix..old.len() - suffix]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let added: Vec<String> = new[prefix..new.len() - suffix]
        .iter()
        .map(|s| s.to_string())
        .collect();

    if removed.is_empty() && added.is_empty() {
        None
    } else {
        Some(LineDelta {
            position: prefix,
            removed,
            added,
        })
    }
}

/// Render the colored mini unified diff: file headers plus a single hunk
/// covering the changed block.
pub fn render_mini_diff(path: &str, before: &str, after: &str) -> String {
    let Some(delta) = changed_block(before, after) else {
        return format!("{path}: no changes");
    };

    let mut out = String::new();
    out.push_str(&format!("{CYAN}--- a/{path}{RESET}\n"));
    out.push_str(&format!("{CYAN}+++ b/{path}{RESET}\n"));
    out.push_str(&format!(
        "{CYAN}@@ -{},{} +{},{} @@{RESET}\n",
        delta.position + 1,
        delta.removed.len(),
        delta.position + 1,
        delta.added.len(),
    ));
    for line in &delta.removed {
        out.push_str(&format!("{RED}-{line}{RESET}\n"));
    }
    for line in &delta.added {
        out.push_str(&format!("{GREEN}+{line}{RESET}\n"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_texts_have_no_block() {
        assert_eq!(changed_block("a\nb\n", "a\nb\n"), None);
    }

    #[test]
    fn single_line_change_is_isolated() {
        let delta = changed_block("a\nb\nc\n", "a\nB\nc\n").unwrap();
        assert_eq!(delta.position, 1);
        assert_eq!(delta.removed, ["b"]);
        assert_eq!(delta.added, ["B"]);
        assert_eq!(delta.size(), 1);
    }

    #[test]
    fn pure_insertion_counts_added_lines_only() {
        let delta = changed_block("a\nc\n", "a\nb1\nb2\nc\n").unwrap();
        assert_eq!(delta.position, 1);
        assert!(delta.removed.is_empty());
        assert_eq!(delta.added, ["b1", "b2"]);
        assert_eq!(delta.size(), 2);
    }

    #[test]
    fn size_is_max_of_removed_and_added() {
        let delta = changed_block("a\nx\ny\nz\nb\n", "a\nq\nb\n").unwrap();
        assert_eq!(delta.removed.len(), 3);
        assert_eq!(delta.added.len(), 1);
        assert_eq!(delta.size(), 3);
    }

    #[test]
    fn new_file_is_all_additions() {
        let delta = changed_block("", "line one\nline two\n").unwrap();
        assert_eq!(delta.position, 0);
        assert!(delta.removed.is_empty());
        assert_eq!(delta.size(), 2);
    }

    #[test]
    fn render_contains_headers_and_hunk() {
        let rendered = render_mini_diff("src/main.zig", "a\nb\n", "a\nc\n");
        assert!(rendered.contains("--- a/src/main.zig"));
        assert!(rendered.contains("+++ b/src/main.zig"));
        assert!(rendered.contains("@@ -2,1 +2,1 @@"));
        assert!(rendered.contains("-b"));
        assert!(rendered.contains("+c"));
    }

    #[test]
    fn render_no_changes_message() {
        assert_eq!(render_mini_diff("x", "same\n", "same\n"), "x: no changes");
    }
}
