//! Core runtime for a tool-augmented terminal agent.
//!
//! `tether-rs` drives a large language model through a multi-step
//! inference/execution/feedback loop against a sandboxed local source tree.
//! A user request enters the [`agent::harness::AgentHarness`]; per iteration
//! the [`router`](router) decides whether a tool should run, the
//! [`executor`](tools::executor::ToolExecutor) runs it inside the
//! [`workspace`](workspace::WorkspaceRoot) sandbox, and the result is fed
//! back into the working prompt until the model produces a final answer or
//! the soft step budget triggers an explicit continuation check.
//!
//! # Where to find things
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`workspace`] | Canonical path sandbox — every tool path flows through it |
//! | [`tools`] | Tool registry, dispatcher, strict replace, patch envelope, bounded reads |
//! | [`todo`] | Ordered work-item list with status lifecycle and JSON persistence |
//! | [`context`] | Conversation turns, relevance selection, compaction, save/load |
//! | [`router`] | Per-iteration tool routing with strict and text-fallback prompts |
//! | [`agent`] | The loop itself, its configuration, and the UI port |
//! | [`llm`] | The LLM client capability trait and a scripted test fake |
//! | [`cancel`] | Process-wide cooperative cancellation flag |
//! | [`persist`] | Project-scoped state files keyed by workspace checksum |
//!
//! # Design principles
//!
//! 1. **One sandbox predicate.** Every filesystem path an LLM can influence
//!    resolves through [`workspace::WorkspaceRoot::resolve`]; there is no
//!    second path-handling code path to audit.
//! 2. **Errors are feedback.** Tool failures become human-readable strings
//!    the model sees on the next iteration. Only cancellation and
//!    provider-layer failures end a request early.
//! 3. **The loop is sequential.** Tools execute in series; collaborators on
//!    other threads interact only through the cancellation flag and the
//!    [`agent::ui::UiPort`].

pub mod agent;
pub mod cancel;
pub mod context;
pub mod llm;
pub mod persist;
pub mod prelude;
pub mod router;
pub mod todo;
pub mod tools;
pub mod workspace;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// ── Constants ──────────────────────────────────────────────────────

/// Cap applied to a tool payload when it is forwarded into the next model
/// prompt. The full payload is still available on the [`ToolResult`].
pub const FORWARDED_PAYLOAD_CAP: usize = 4096;

// ── Schema generation ──────────────────────────────────────────────

/// Generate a JSON Schema `serde_json::Value` from a type that implements
/// `schemars::JsonSchema`. This is the bridge between typed tool argument
/// structs and the schema objects stored in the tool registry.
pub fn json_schema_for<T: JsonSchema>() -> serde_json::Value {
    let schema = schemars::schema_for!(T);
    serde_json::to_value(schema)
        .unwrap_or_else(|_| serde_json::json!({"type": "object", "properties": {}}))
}

// ── Tool invocation / result ───────────────────────────────────────

/// A tool call selected by the router or parsed from model text.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ToolInvocation {
    /// Registry name of the tool.
    pub name: String,
    /// Raw UTF-8 JSON object with the tool arguments.
    pub arguments: String,
}

impl ToolInvocation {
    pub fn new(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: arguments.into(),
        }
    }
}

/// Outcome class of a tool execution.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Ok,
    Error,
    Cancelled,
}

impl std::fmt::Display for ToolStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolStatus::Ok => write!(f, "ok"),
            ToolStatus::Error => write!(f, "error"),
            ToolStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Result of one tool execution.
#[derive(Clone, Debug)]
pub struct ToolResult {
    pub status: ToolStatus,
    /// Size of the payload in bytes before any forwarding cap.
    pub bytes: usize,
    pub duration_ms: u64,
    /// Primary path argument of the call, when the tool had one.
    pub file_path: Option<String>,
    /// Human-readable output appended to the next model prompt.
    pub payload: String,
}

impl ToolResult {
    /// The payload as forwarded to the model, capped at
    /// [`FORWARDED_PAYLOAD_CAP`] bytes with a truncation notice.
    pub fn forwarded_payload(&self) -> String {
        if self.payload.len() <= FORWARDED_PAYLOAD_CAP {
            return self.payload.clone();
        }
        let mut end = FORWARDED_PAYLOAD_CAP;
        while end > 0 && !self.payload.is_char_boundary(end) {
            end -= 1;
        }
        #[allow(clippy::string_slice)] // end is on a char boundary
        let head = &self.payload[..end];
        format!("{head}...\n[truncated: {} bytes total]", self.payload.len())
    }
}

// ── Error kinds ────────────────────────────────────────────────────

/// Error kinds surfaced by the core.
///
/// Tool-execution errors are caught inside the loop and converted to
/// strings fed back to the model; only [`AgentError::Cancelled`] and the
/// provider-layer kinds terminate a request early.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AgentError {
    /// Router or inline parser selected a name absent from the registry.
    InvalidToolName(String),
    /// Schema violation, missing alias, path escape, ambiguous replace,
    /// malformed patch. The payload is a one-paragraph explanation.
    InvalidArgument(String),
    /// Underlying filesystem or process failure.
    Io(String),
    /// Cooperative cancellation.
    Cancelled,
    /// Provider-side failure reported by the LLM boundary.
    Provider(String),
    /// The provider response could not be decoded.
    ResponseParse(String),
    /// The provider response carried no choices.
    MissingChoices,
}

impl std::fmt::Display for AgentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentError::InvalidToolName(name) => write!(f, "unknown tool '{name}'"),
            AgentError::InvalidArgument(msg) => write!(f, "{msg}"),
            AgentError::Io(msg) => write!(f, "I/O error: {msg}"),
            AgentError::Cancelled => write!(f, "operation cancelled"),
            AgentError::Provider(msg) => write!(f, "provider error: {msg}"),
            AgentError::ResponseParse(msg) => write!(f, "response parse error: {msg}"),
            AgentError::MissingChoices => write!(f, "provider response had no choices"),
        }
    }
}

impl std::error::Error for AgentError {}

impl From<std::io::Error> for AgentError {
    fn from(e: std::io::Error) -> Self {
        AgentError::Io(e.to_string())
    }
}
