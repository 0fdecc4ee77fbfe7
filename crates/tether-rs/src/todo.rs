//! Ordered work-item list with a status lifecycle and JSON persistence.
//!
//! The agent tracks multi-step work here across loop iterations. Items keep
//! insertion order; ids are `<epoch_ms>_<seq>` with a process-monotone
//! sequence counter that is recovered from the largest suffix when a list
//! is loaded from disk.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::persist::write_atomic;

// ── Items ──────────────────────────────────────────────────────────

/// Lifecycle status of a todo item.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    Pending,
    InProgress,
    Done,
}

impl fmt::Display for TodoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TodoStatus::Pending => write!(f, "[ ]"),
            TodoStatus::InProgress => write!(f, "[~]"),
            TodoStatus::Done => write!(f, "[x]"),
        }
    }
}

impl TodoStatus {
    /// Parse the wire spelling used in tool arguments.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TodoStatus::Pending),
            "in_progress" => Some(TodoStatus::InProgress),
            "done" => Some(TodoStatus::Done),
            _ => None,
        }
    }
}

/// A single work item.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct TodoItem {
    pub id: String,
    pub description: String,
    pub status: TodoStatus,
    /// Epoch milliseconds at creation.
    pub created_at: i64,
    /// Epoch milliseconds at completion; set iff `status == Done`.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub completed_at: Option<i64>,
}

// ── Store ──────────────────────────────────────────────────────────

/// Ordered, mutable todo list owned by the agent loop.
#[derive(Debug, Default)]
pub struct TodoStore {
    items: Vec<TodoItem>,
    next_seq: u64,
}

impl TodoStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new pending item and return its id.
    pub fn add(&mut self, description: impl Into<String>) -> String {
        let id = format!("{}_{}", chrono::Utc::now().timestamp_millis(), self.next_seq);
        self.next_seq += 1;
        self.items.push(TodoItem {
            id: id.clone(),
            description: description.into(),
            status: TodoStatus::Pending,
            created_at: chrono::Utc::now().timestamp_millis(),
            completed_at: None,
        });
        id
    }

    /// Update an item's status. Returns whether the id was found.
    ///
    /// Moving into `Done` stamps `completed_at`; moving out clears it.
    pub fn update(&mut self, id: &str, status: TodoStatus) -> bool {
        let Some(item) = self.items.iter_mut().find(|i| i.id == id) else {
            return false;
        };
        item.status = status;
        item.completed_at = match status {
            TodoStatus::Done => Some(chrono::Utc::now().timestamp_millis()),
            _ => None,
        };
        true
    }

    /// Remove an item. Returns whether the id was found.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|i| i.id != id);
        self.items.len() != before
    }

    /// Drop all completed items.
    pub fn clear_done(&mut self) {
        self.items.retain(|i| i.status != TodoStatus::Done);
    }

    /// Drop everything.
    pub fn clear_all(&mut self) {
        self.items.clear();
    }

    pub fn items(&self) -> &[TodoItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Render the checklist for tool output and the UI.
    pub fn render(&self) -> String {
        if self.items.is_empty() {
            return "Todo list is empty.".into();
        }
        let mut out = String::from("Todo list:\n");
        for item in &self.items {
            out.push_str(&format!("  {} {} ({})\n", item.status, item.description, item.id));
        }
        out
    }

    /// One-line status summary for the soft-budget continuation note.
    pub fn summary(&self) -> String {
        if self.items.is_empty() {
            return "no todos".into();
        }
        let done = self.items.iter().filter(|i| i.status == TodoStatus::Done).count();
        let active = self
            .items
            .iter()
            .filter(|i| i.status == TodoStatus::InProgress)
            .count();
        format!(
            "{done}/{} done, {active} in progress",
            self.items.len()
        )
    }

    // ── Persistence ────────────────────────────────────────────────

    /// Persist as a JSON array of `{id, description, status, created_at}`.
    pub fn save(&self, path: &Path) -> Result<(), String> {
        #[derive(Serialize)]
        struct Persisted<'a> {
            id: &'a str,
            description: &'a str,
            status: TodoStatus,
            created_at: i64,
        }
        let rows: Vec<Persisted<'_>> = self
            .items
            .iter()
            .map(|i| Persisted {
                id: &i.id,
                description: &i.description,
                status: i.status,
                created_at: i.created_at,
            })
            .collect();
        let json = serde_json::to_string_pretty(&rows)
            .map_err(|e| format!("failed to serialize todos: {e}"))?;
        write_atomic(path, &json)
    }

    /// Clear the list, append parsed items, and advance the sequence
    /// counter past the largest id suffix seen.
    pub fn load(&mut self, path: &Path) -> Result<(), String> {
        let json = std::fs::read_to_string(path).map_err(|e| format!("failed to read todos: {e}"))?;
        let rows: Vec<TodoItem> =
            serde_json::from_str(&json).map_err(|e| format!("failed to parse todos: {e}"))?;

        self.items.clear();
        let mut max_seq: Option<u64> = None;
        for mut item in rows {
            if let Some(suffix) = item.id.rsplit('_').next()
                && let Ok(seq) = suffix.parse::<u64>()
            {
                max_seq = Some(max_seq.map_or(seq, |m| m.max(seq)));
            }
            // The persisted format omits completed_at; re-derive the invariant.
            if item.status != TodoStatus::Done {
                item.completed_at = None;
            }
            self.items.push(item);
        }
        self.next_seq = max_seq.map_or(self.next_seq, |m| self.next_seq.max(m + 1));
        debug!("loaded {} todos, next_seq={}", self.items.len(), self.next_seq);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_preserves_insertion_order() {
        let mut store = TodoStore::new();
        store.add("first");
        store.add("second");
        store.add("third");
        let descriptions: Vec<&str> =
            store.items().iter().map(|i| i.description.as_str()).collect();
        assert_eq!(descriptions, ["first", "second", "third"]);
    }

    #[test]
    fn ids_are_unique_within_process() {
        let mut store = TodoStore::new();
        let mut ids = std::collections::HashSet::new();
        for n in 0..50 {
            assert!(ids.insert(store.add(format!("task {n}"))));
        }
    }

    #[test]
    fn update_done_stamps_completed_at() {
        let mut store = TodoStore::new();
        let id = store.add("ship it");
        assert!(store.update(&id, TodoStatus::Done));
        let item = &store.items()[0];
        assert_eq!(item.status, TodoStatus::Done);
        assert!(item.completed_at.is_some());

        // Re-opening clears the stamp, keeping the invariant.
        assert!(store.update(&id, TodoStatus::InProgress));
        assert!(store.items()[0].completed_at.is_none());
    }

    #[test]
    fn update_unknown_id_reports_not_found() {
        let mut store = TodoStore::new();
        assert!(!store.update("123_0", TodoStatus::Done));
    }

    #[test]
    fn remove_and_clear_done() {
        let mut store = TodoStore::new();
        let a = store.add("a");
        let b = store.add("b");
        store.add("c");
        assert!(store.remove(&a));
        assert!(!store.remove(&a));
        store.update(&b, TodoStatus::Done);
        store.clear_done();
        let descriptions: Vec<&str> =
            store.items().iter().map(|i| i.description.as_str()).collect();
        assert_eq!(descriptions, ["c"]);
    }

    #[test]
    fn render_shows_status_markers() {
        let mut store = TodoStore::new();
        let id = store.add("write tests");
        store.update(&id, TodoStatus::InProgress);
        let rendered = store.render();
        assert!(rendered.contains("[~] write tests"));
        store.clear_all();
        assert_eq!(store.render(), "Todo list is empty.");
    }

    #[test]
    fn save_load_round_trip_recovers_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("todos.json");

        let mut store = TodoStore::new();
        store.add("one");
        let id_two = store.add("two");
        store.update(&id_two, TodoStatus::Done);
        store.save(&path).unwrap();

        let mut loaded = TodoStore::new();
        loaded.load(&path).unwrap();
        assert_eq!(loaded.items().len(), 2);
        assert_eq!(loaded.items()[1].status, TodoStatus::Done);

        // Ids added after a load never collide with loaded ids.
        let fresh = loaded.add("three");
        assert!(loaded.items().iter().filter(|i| i.id == fresh).count() == 1);
        let suffix: u64 = fresh.rsplit('_').next().unwrap().parse().unwrap();
        assert!(suffix >= 2, "sequence must advance past loaded suffixes");
    }

    #[test]
    fn summary_counts_statuses() {
        let mut store = TodoStore::new();
        assert_eq!(store.summary(), "no todos");
        let a = store.add("a");
        store.add("b");
        store.update(&a, TodoStatus::Done);
        assert_eq!(store.summary(), "1/2 done, 0 in progress");
    }
}
