//! Bridge-mode orchestrator.
//!
//! The alternative controller: instead of staged routing over free-text
//! prompts, an external bridge speaks the model-side tool-call protocol
//! and emits structured calls per turn. Each turn the orchestrator sends
//! the message list plus the remaining turn allowance, prints the model
//! text, executes every returned call in order, appends each result as a
//! tool-role message, and continues until the bridge returns no calls or
//! the turn cap is reached. Selected via
//! [`Orchestrator::Bridge`](crate::agent::config::Orchestrator).

use std::collections::VecDeque;
use std::sync::Mutex;

use tracing::{debug, info};

use crate::AgentError;
use crate::ToolInvocation;
use crate::agent::harness::CANCELLED_RESPONSE;
use crate::agent::ui::UiPort;
use crate::cancel::CancelFlag;
use crate::llm::{LlmError, LlmFuture};
use crate::tools::executor::ToolExecutor;

/// One message in the bridge protocol.
#[derive(Clone, Debug)]
pub struct BridgeMessage {
    pub role: String,
    pub content: String,
    /// Set on tool-role messages to pair the result with its call.
    pub tool_call_id: Option<String>,
}

impl BridgeMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
            tool_call_id: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".into(),
            content: content.into(),
            tool_call_id: None,
        }
    }

    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: "tool".into(),
            content: content.into(),
            tool_call_id: Some(call_id.into()),
        }
    }
}

/// A structured tool call emitted by the bridge.
#[derive(Clone, Debug)]
pub struct BridgeCall {
    pub id: String,
    pub name: String,
    pub args: serde_json::Value,
}

/// One bridge turn.
#[derive(Clone, Debug, Default)]
pub struct BridgeTurn {
    pub text: String,
    pub finish_reason: Option<String>,
    pub tool_calls: Vec<BridgeCall>,
}

/// The external bridge the orchestrator talks to.
pub trait ToolCallBridge: Send + Sync {
    /// Send the conversation and the remaining turn allowance; receive the
    /// next turn.
    fn next_turn<'a>(
        &'a self,
        messages: &'a [BridgeMessage],
        max_remaining: u32,
    ) -> LlmFuture<'a, BridgeTurn>;
}

/// Drives the bridge protocol against the tool executor.
pub struct BridgeOrchestrator<'a> {
    bridge: &'a dyn ToolCallBridge,
    executor: &'a ToolExecutor,
    ui: &'a dyn UiPort,
    cancel: &'a CancelFlag,
    max_iterations: u32,
}

impl<'a> BridgeOrchestrator<'a> {
    pub fn new(
        bridge: &'a dyn ToolCallBridge,
        executor: &'a ToolExecutor,
        ui: &'a dyn UiPort,
        cancel: &'a CancelFlag,
        max_iterations: u32,
    ) -> Self {
        Self {
            bridge,
            executor,
            ui,
            cancel,
            max_iterations,
        }
    }

    /// Run the turn loop to completion and return the final model text.
    ///
    /// Cancellation is polled at the top of every turn and again when the
    /// bridge call returns, so at most one bridge call is in flight after
    /// the flag is set.
    pub async fn run(&self, mut messages: Vec<BridgeMessage>) -> Result<String, AgentError> {
        let mut last_text = String::new();

        for iteration in 0..self.max_iterations {
            if self.cancel.is_cancelled() {
                info!("bridge run cancelled at turn {}", iteration + 1);
                return Ok(CANCELLED_RESPONSE.into());
            }

            let remaining = self.max_iterations - iteration;
            let turn = self
                .bridge
                .next_turn(&messages, remaining)
                .await
                .map_err(AgentError::from)?;
            if self.cancel.is_cancelled() {
                info!("bridge run cancelled after turn {}", iteration + 1);
                return Ok(CANCELLED_RESPONSE.into());
            }
            debug!(
                "bridge turn {}: {} chars text, {} call(s), finish={:?}",
                iteration + 1,
                turn.text.len(),
                turn.tool_calls.len(),
                turn.finish_reason
            );

            if !turn.text.is_empty() {
                self.ui.append_timeline_line(&turn.text);
                last_text = turn.text.clone();
                messages.push(BridgeMessage::assistant(&turn.text));
            }

            if turn.tool_calls.is_empty() {
                return Ok(last_text);
            }

            for call in &turn.tool_calls {
                let invocation = ToolInvocation::new(&call.name, call.args.to_string());
                let result = self.executor.execute(&invocation).await;
                self.ui.append_timeline_line(&format!(
                    "{} {} in {}ms",
                    call.name, result.status, result.duration_ms
                ));
                messages.push(BridgeMessage::tool_result(
                    &call.id,
                    result.forwarded_payload(),
                ));
            }
        }

        info!("bridge turn cap reached ({})", self.max_iterations);
        Ok(last_text)
    }
}

// ── Scripted bridge for tests ───────────────────────────────────────

/// Deterministic bridge that replays scripted turns.
#[derive(Default)]
pub struct ScriptedBridge {
    turns: Mutex<VecDeque<BridgeTurn>>,
}

impl ScriptedBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_turn(self, turn: BridgeTurn) -> Self {
        self.turns
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(turn);
        self
    }
}

impl ToolCallBridge for ScriptedBridge {
    fn next_turn<'a>(
        &'a self,
        _messages: &'a [BridgeMessage],
        _max_remaining: u32,
    ) -> LlmFuture<'a, BridgeTurn> {
        let next = self
            .turns
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        Box::pin(async move {
            next.ok_or_else(|| LlmError::Provider("scripted bridge: no turn left".into()))
        })
    }
}
