//! Conversation context window.
//!
//! Holds the turn history for one project: a running summary plus the
//! recent turns, with relevance-scored selection when building prompts and
//! two-tier compaction (model summary with a heuristic fallback) when the
//! estimated size exceeds the budget. Persistence is project-scoped via
//! [`persist`](crate::persist).

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::llm::LlmClient;
use crate::persist::write_atomic;

/// Default character budget before compaction fires.
pub const DEFAULT_MAX_CHARS: usize = 24_000;

/// Default number of most-recent turns protected from compaction.
pub const DEFAULT_KEEP_RECENT: usize = 6;

/// Maximum turns included in a built prompt.
const MAX_RELEVANT_TURNS: usize = 8;

/// Per-turn content cap in the heuristic summary.
const HEURISTIC_LINE_CAP: usize = 220;

/// The prompt for model-based compaction. Asks for a merged, standalone
/// summary so the replacement is atomic.
const SUMMARIZATION_PROMPT: &str = "\
Summarize the conversation turns below into concise working notes. Keep \
file paths, decisions, and unresolved items; merge with the existing \
summary if one is given, producing a single standalone summary.";

// ── Turns ──────────────────────────────────────────────────────────

/// Speaker of a turn.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

impl std::fmt::Display for TurnRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TurnRole::User => write!(f, "user"),
            TurnRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// One (role, content) pair with tool activity metadata.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Turn {
    pub role: TurnRole,
    pub content: String,
    #[serde(default)]
    pub tool_calls: u32,
    #[serde(default)]
    pub error_count: u32,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub files_touched: Option<Vec<String>>,
}

/// Tool activity attached to an appended turn.
#[derive(Clone, Debug, Default)]
pub struct TurnMeta {
    pub tool_calls: u32,
    pub error_count: u32,
    pub files_touched: Option<Vec<String>>,
}

// ── Window ─────────────────────────────────────────────────────────

/// Turn history with summary, bounded by an estimated character budget.
#[derive(Debug)]
pub struct ContextWindow {
    summary: Option<String>,
    turns: Vec<Turn>,
    max_chars: usize,
    keep_recent_turns: usize,
}

impl Default for ContextWindow {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CHARS, DEFAULT_KEEP_RECENT)
    }
}

impl ContextWindow {
    pub fn new(max_chars: usize, keep_recent_turns: usize) -> Self {
        Self {
            summary: None,
            turns: Vec::new(),
            max_chars,
            keep_recent_turns,
        }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    /// Drop all turns and the summary.
    pub fn clear(&mut self) {
        self.turns.clear();
        self.summary = None;
    }

    /// Append a turn. Content is trimmed; empty turns are not stored.
    pub fn append(&mut self, role: TurnRole, content: &str, meta: TurnMeta) {
        let content = content.trim();
        if content.is_empty() {
            return;
        }
        self.turns.push(Turn {
            role,
            content: content.to_string(),
            tool_calls: meta.tool_calls,
            error_count: meta.error_count,
            files_touched: meta.files_touched,
        });
    }

    /// Estimated character total: summary length plus per-turn content
    /// length with a flat overhead of 20 per turn.
    pub fn estimated_chars(&self) -> usize {
        let summary = self.summary.as_ref().map_or(0, |s| s.len());
        summary + self.turns.iter().map(|t| t.content.len() + 20).sum::<usize>()
    }

    // ── Compaction ─────────────────────────────────────────────────

    /// Replace the oldest turns with a summary when over budget.
    ///
    /// No-op while the window holds at most `keep_recent_turns` turns or
    /// the estimate fits `max_chars`. A model summary is attempted first
    /// when a client is given and accepted iff non-blank; otherwise the
    /// heuristic summary is used. The summary swap and turn removal are
    /// applied together.
    pub async fn compact(&mut self, llm: Option<&dyn LlmClient>) {
        if self.turns.len() <= self.keep_recent_turns || self.estimated_chars() <= self.max_chars {
            return;
        }
        let n = self.turns.len() - self.keep_recent_turns;
        let compacted = &self.turns[..n];

        let mut new_summary = None;
        if let Some(client) = llm {
            let prompt = self.summarization_prompt(compacted);
            match client.query(&prompt, &[]).await {
                Ok(text) if !text.trim().is_empty() => {
                    new_summary = Some(text.trim().to_string());
                }
                Ok(_) => debug!("model summary was blank; falling back to heuristic"),
                Err(e) => debug!("model summary failed ({e}); falling back to heuristic"),
            }
        }
        let new_summary = new_summary.unwrap_or_else(|| heuristic_summary(self.summary.as_deref(), compacted));

        info!("compacted {n} turns into summary ({} chars)", new_summary.len());
        self.summary = Some(new_summary);
        self.turns.drain(..n);
    }

    fn summarization_prompt(&self, compacted: &[Turn]) -> String {
        let mut out = String::from(SUMMARIZATION_PROMPT);
        if let Some(ref existing) = self.summary {
            out.push_str("\n\nExisting summary:\n");
            out.push_str(existing);
        }
        out.push_str("\n\nTurns to summarize:\n");
        for turn in compacted {
            out.push_str(&format!("- [{}] {}\n", turn.role, turn.content));
        }
        out
    }

    // ── Prompt assembly ────────────────────────────────────────────

    /// Build the working prompt for a new user request: continuation
    /// preamble, summary, up to eight relevant turns in chronological
    /// order, and the request itself.
    pub fn build_prompt(&self, user_input: &str) -> String {
        let mut out = String::from(
            "You are continuing an ongoing conversation. Use the summary and \
             prior turns below as context; answer only the current request.\n",
        );
        if let Some(ref summary) = self.summary {
            out.push_str("\nConversation summary:\n");
            out.push_str(summary);
            out.push('\n');
        }
        let relevant = self.relevant_turns(user_input);
        if !relevant.is_empty() {
            out.push_str("\nRelevant prior turns:\n");
            for turn in &relevant {
                out.push_str(&format!("[{}] {}\n", turn.role, turn.content));
            }
        }
        out.push_str("\nCurrent user request:\n");
        out.push_str(user_input);
        out
    }

    /// Relevance selection: score each turn, keep positive scores, sort by
    /// score (ties to the more recent), take the top eight, and restore
    /// chronological order.
    fn relevant_turns(&self, user_input: &str) -> Vec<&Turn> {
        let needle = user_input.to_lowercase();
        let wants_files = needle.contains("file");
        let total = self.turns.len();

        let mut scored: Vec<(i32, usize, &Turn)> = self
            .turns
            .iter()
            .enumerate()
            .map(|(index, turn)| {
                let mut score = 0;
                if turn.content.to_lowercase().contains(&needle) {
                    score += 4;
                }
                if wants_files && turn.files_touched.as_ref().is_some_and(|f| !f.is_empty()) {
                    score += 2;
                }
                if turn.role == TurnRole::Assistant && turn.tool_calls > 0 {
                    score += 1;
                }
                if total - index <= 4 {
                    score += 3;
                }
                (score, index, turn)
            })
            .filter(|(score, _, _)| *score > 0)
            .collect();

        scored.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)));
        scored.truncate(MAX_RELEVANT_TURNS);
        scored.sort_by_key(|(_, index, _)| *index);
        scored.into_iter().map(|(_, _, turn)| turn).collect()
    }

    // ── Persistence ────────────────────────────────────────────────

    pub fn save(&self, path: &Path) -> Result<(), String> {
        let payload = PersistedContext {
            summary: self.summary.clone(),
            turns: self.turns.clone(),
        };
        let json = serde_json::to_string_pretty(&payload)
            .map_err(|e| format!("failed to serialize context: {e}"))?;
        write_atomic(path, &json)
    }

    /// Load a persisted window, replacing current turns and summary.
    /// Budget parameters are kept from the live window, not the file.
    pub fn load(&mut self, path: &Path) -> Result<(), String> {
        let json =
            std::fs::read_to_string(path).map_err(|e| format!("failed to read context: {e}"))?;
        let payload: PersistedContext =
            serde_json::from_str(&json).map_err(|e| format!("failed to parse context: {e}"))?;
        self.summary = payload.summary;
        self.turns = payload.turns;
        debug!("loaded context: {} turns", self.turns.len());
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct PersistedContext {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    summary: Option<String>,
    turns: Vec<Turn>,
}

/// The no-model compaction path: previous summary (if any), a notes
/// header, and one capped line per compacted turn with a tool-activity
/// appendage for assistant turns that did tool work.
fn heuristic_summary(previous: Option<&str>, compacted: &[Turn]) -> String {
    let mut out = String::new();
    if let Some(prev) = previous {
        out.push_str(prev);
        out.push('\n');
    }
    out.push_str("Compacted context notes:\n");
    for turn in compacted {
        let mut line = turn.content.clone();
        if line.len() > HEURISTIC_LINE_CAP {
            let mut end = HEURISTIC_LINE_CAP;
            while end > 0 && !line.is_char_boundary(end) {
                end -= 1;
            }
            line.truncate(end);
            line.push('…');
        }
        out.push_str(&format!("- [{}] {line}", turn.role));
        if turn.role == TurnRole::Assistant && (turn.tool_calls > 0 || turn.error_count > 0) {
            let files = turn
                .files_touched
                .as_ref()
                .map(|f| f.join(","))
                .unwrap_or_default();
            out.push_str(&format!(
                " [tools={} errors={} files={files}]",
                turn.tool_calls, turn.error_count
            ));
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedClient;

    fn meta_with_tools(calls: u32, files: &[&str]) -> TurnMeta {
        TurnMeta {
            tool_calls: calls,
            error_count: 0,
            files_touched: if files.is_empty() {
                None
            } else {
                Some(files.iter().map(|s| s.to_string()).collect())
            },
        }
    }

    #[test]
    fn append_ignores_blank_content() {
        let mut window = ContextWindow::default();
        window.append(TurnRole::User, "   \n\t ", TurnMeta::default());
        assert!(window.turns().is_empty());
        window.append(TurnRole::User, "  hello  ", TurnMeta::default());
        assert_eq!(window.turns()[0].content, "hello");
    }

    #[test]
    fn estimated_chars_counts_summary_and_overhead() {
        let mut window = ContextWindow::default();
        window.append(TurnRole::User, "abcde", TurnMeta::default());
        assert_eq!(window.estimated_chars(), 25);
    }

    #[tokio::test]
    async fn compact_is_noop_under_budget() {
        let mut window = ContextWindow::new(10_000, 2);
        window.append(TurnRole::User, "short", TurnMeta::default());
        window.append(TurnRole::Assistant, "reply", TurnMeta::default());
        window.append(TurnRole::User, "more", TurnMeta::default());
        window.compact(None).await;
        assert_eq!(window.turns().len(), 3);
        assert!(window.summary().is_none());
    }

    #[tokio::test]
    async fn compact_keeps_recent_turns_and_shrinks() {
        let mut window = ContextWindow::new(300, 2);
        for n in 0..6 {
            window.append(
                TurnRole::User,
                &format!("turn number {n} with some padding text"),
                TurnMeta::default(),
            );
        }
        assert!(window.estimated_chars() > 300);
        window.compact(None).await;
        assert_eq!(window.turns().len(), 2);
        assert!(window.turns()[0].content.contains("turn number 4"));
        let summary = window.summary().unwrap();
        assert!(summary.contains("Compacted context notes:"));
        assert!(summary.contains("turn number 0"));
    }

    #[tokio::test]
    async fn compact_prefers_model_summary() {
        let mut window = ContextWindow::new(100, 1);
        for n in 0..4 {
            window.append(
                TurnRole::User,
                &format!("padding padding padding number {n}"),
                TurnMeta::default(),
            );
        }
        let client = ScriptedClient::new().with_text("model-made summary");
        window.compact(Some(&client)).await;
        assert_eq!(window.summary(), Some("model-made summary"));
        assert_eq!(window.turns().len(), 1);
    }

    #[tokio::test]
    async fn blank_model_summary_falls_back_to_heuristic() {
        let mut window = ContextWindow::new(100, 1);
        for n in 0..4 {
            window.append(
                TurnRole::Assistant,
                &format!("assistant work item number {n}"),
                meta_with_tools(2, &["src/main.zig"]),
            );
        }
        let client = ScriptedClient::new().with_text("   ");
        window.compact(Some(&client)).await;
        let summary = window.summary().unwrap();
        assert!(summary.contains("Compacted context notes:"));
        assert!(summary.contains("[tools=2 errors=0 files=src/main.zig]"));
    }

    #[tokio::test]
    async fn heuristic_caps_long_lines() {
        let mut window = ContextWindow::new(100, 1);
        window.append(TurnRole::User, &"y".repeat(600), TurnMeta::default());
        window.append(TurnRole::User, "recent", TurnMeta::default());
        window.compact(None).await;
        let summary = window.summary().unwrap();
        assert!(summary.contains(&"y".repeat(HEURISTIC_LINE_CAP)));
        assert!(!summary.contains(&"y".repeat(HEURISTIC_LINE_CAP + 1)));
    }

    #[test]
    fn build_prompt_includes_summary_and_request() {
        let mut window = ContextWindow::default();
        window.append(TurnRole::User, "earlier question", TurnMeta::default());
        let prompt = window.build_prompt("what about src/main.zig?");
        assert!(prompt.contains("Current user request:\nwhat about src/main.zig?"));
        assert!(prompt.contains("[user] earlier question"));
    }

    #[test]
    fn relevance_prefers_recency_for_identical_content() {
        let mut window = ContextWindow::default();
        for _ in 0..12 {
            window.append(TurnRole::User, "identical filler turn", TurnMeta::default());
        }
        // With 12 identical turns, only the last 4 carry the recency bonus
        // and are the only positive scores.
        let relevant = window.relevant_turns("unrelated request");
        assert_eq!(relevant.len(), 4);
    }

    #[test]
    fn relevance_scores_substring_and_tool_activity() {
        let mut window = ContextWindow::default();
        for n in 0..10 {
            window.append(TurnRole::User, &format!("filler {n}"), TurnMeta::default());
        }
        window.append(
            TurnRole::Assistant,
            "I edited the harness module",
            meta_with_tools(3, &["src/harness.zig"]),
        );
        for n in 0..5 {
            window.append(TurnRole::User, &format!("later filler {n}"), TurnMeta::default());
        }
        let relevant = window.relevant_turns("harness");
        assert!(relevant.iter().any(|t| t.content.contains("edited the harness")));
    }

    #[test]
    fn relevance_caps_at_eight_and_keeps_chronology() {
        let mut window = ContextWindow::default();
        for n in 0..20 {
            window.append(
                TurnRole::Assistant,
                &format!("worked on file number {n}"),
                meta_with_tools(1, &[]),
            );
        }
        let relevant = window.relevant_turns("file");
        assert_eq!(relevant.len(), 8);
        let numbers: Vec<usize> = relevant
            .iter()
            .map(|t| {
                t.content
                    .rsplit(' ')
                    .next()
                    .unwrap()
                    .parse::<usize>()
                    .unwrap()
            })
            .collect();
        let mut sorted = numbers.clone();
        sorted.sort_unstable();
        assert_eq!(numbers, sorted, "selected turns must stay chronological");
    }

    #[test]
    fn save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("context-abcd1234.json");

        let mut window = ContextWindow::default();
        window.append(TurnRole::User, "remember this", TurnMeta::default());
        window.append(
            TurnRole::Assistant,
            "noted",
            meta_with_tools(1, &["notes.txt"]),
        );
        window.save(&path).unwrap();

        let mut restored = ContextWindow::default();
        restored.load(&path).unwrap();
        assert_eq!(restored.turns().len(), 2);
        assert_eq!(restored.turns()[1].files_touched.as_deref(), Some(&["notes.txt".to_string()][..]));
    }
}
