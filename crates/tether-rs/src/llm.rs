//! The LLM client capability trait.
//!
//! The core is parameterized over [`LlmClient`] — chat queries, forced
//! tool-call inference, and provider-specific decoding of a single-call
//! JSON shape. Concrete HTTP transports live outside the core; tests use
//! the deterministic [`ScriptedClient`].

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use crate::AgentError;
use crate::ToolInvocation;
use crate::tools::registry::ToolDescriptor;

/// Boxed future returned by the async port operations.
///
/// Type alias to keep the trait dyn-compatible, matching the tool-future
/// convention used by the executor.
pub type LlmFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, LlmError>> + Send + 'a>>;

/// Failure kinds at the LLM boundary. All of them terminate the current
/// request; the loop surfaces them as user-visible error strings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LlmError {
    Provider(String),
    ResponseParse(String),
    MissingChoices,
}

impl std::fmt::Display for LlmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmError::Provider(msg) => write!(f, "provider error: {msg}"),
            LlmError::ResponseParse(msg) => write!(f, "response parse error: {msg}"),
            LlmError::MissingChoices => write!(f, "provider response had no choices"),
        }
    }
}

impl From<LlmError> for AgentError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::Provider(msg) => AgentError::Provider(msg),
            LlmError::ResponseParse(msg) => AgentError::ResponseParse(msg),
            LlmError::MissingChoices => AgentError::MissingChoices,
        }
    }
}

/// Result of a tool-call inference round.
#[derive(Clone, Debug, Default)]
pub struct ToolChoice {
    /// The selected call, if the model produced one.
    pub call: Option<ToolInvocation>,
    /// Free-text reasoning emitted alongside the call, when the provider
    /// exposes it.
    pub thinking: Option<String>,
}

/// Capability trait over the model provider.
///
/// Provider, credentials, and model id are state of the implementing
/// client; the port carries only what varies per call.
pub trait LlmClient: Send + Sync {
    /// Free-text chat completion.
    fn query<'a>(&'a self, prompt: &'a str, tools: &'a [ToolDescriptor]) -> LlmFuture<'a, String>;

    /// Ask the model to select a tool call. With `force = true` the model
    /// must produce a call if at all possible.
    fn infer_tool_call<'a>(
        &'a self,
        prompt: &'a str,
        tools: &'a [ToolDescriptor],
        force: bool,
    ) -> LlmFuture<'a, ToolChoice>;

    /// Provider-specific decoder for a single-call JSON shape
    /// (`{"name": ..., "arguments": {...}}`). Returns `None` when `raw`
    /// is not such a shape.
    fn parse_function_call(&self, raw: &str) -> Option<ToolInvocation>;
}

/// Decode the provider-neutral single-call JSON shape.
///
/// Accepts `arguments` as either an object (re-serialized) or a
/// pre-encoded JSON string.
pub fn decode_single_call(raw: &str) -> Option<ToolInvocation> {
    let value: serde_json::Value = serde_json::from_str(raw.trim()).ok()?;
    let name = value.get("name")?.as_str()?.to_string();
    let arguments = match value.get("arguments") {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(obj @ serde_json::Value::Object(_)) => obj.to_string(),
        None => "{}".to_string(),
        Some(_) => return None,
    };
    Some(ToolInvocation { name, arguments })
}

// ── Scripted fake ──────────────────────────────────────────────────

/// A deterministic [`LlmClient`] for tests.
///
/// Responses are scripted in order: each `query` pops the next text
/// response, each `infer_tool_call` pops the next tool choice. An
/// exhausted script yields a provider error so a test that under-scripts
/// fails loudly instead of hanging the loop.
#[derive(Default)]
pub struct ScriptedClient {
    texts: Mutex<VecDeque<String>>,
    choices: Mutex<VecDeque<ToolChoice>>,
    /// Prompts observed by `query`, for assertions.
    pub seen_prompts: Mutex<Vec<String>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the next free-text response (builder pattern).
    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.texts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(text.into());
        self
    }

    /// Script the next inference to select a tool call.
    pub fn with_call(self, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        self.choices
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(ToolChoice {
                call: Some(ToolInvocation::new(name, arguments)),
                thinking: None,
            });
        self
    }

    /// Script the next inference to decline a tool call.
    pub fn with_no_call(self) -> Self {
        self.choices
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(ToolChoice::default());
        self
    }
}

impl LlmClient for ScriptedClient {
    fn query<'a>(&'a self, prompt: &'a str, _tools: &'a [ToolDescriptor]) -> LlmFuture<'a, String> {
        self.seen_prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(prompt.to_string());
        let next = self
            .texts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        Box::pin(async move {
            next.ok_or_else(|| LlmError::Provider("scripted client: no text response left".into()))
        })
    }

    fn infer_tool_call<'a>(
        &'a self,
        _prompt: &'a str,
        _tools: &'a [ToolDescriptor],
        _force: bool,
    ) -> LlmFuture<'a, ToolChoice> {
        let next = self
            .choices
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        Box::pin(async move {
            next.ok_or_else(|| LlmError::Provider("scripted client: no tool choice left".into()))
        })
    }

    fn parse_function_call(&self, raw: &str) -> Option<ToolInvocation> {
        decode_single_call(raw)
    }
}
