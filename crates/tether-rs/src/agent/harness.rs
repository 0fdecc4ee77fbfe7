//! The router-mode agent loop.
//!
//! One [`AgentHarness::run`] call handles one user request: it builds the
//! working prompt from the context window, then iterates route → execute →
//! feed back until the model produces a final answer, the soft step budget
//! triggers an explicit continuation check, or cancellation lands. All
//! tool-argument errors flow back into the prompt so the model can
//! self-correct; only cancellation, I/O failures, and provider errors end
//! a request early.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::agent::config::AgentConfig;
use crate::agent::ui::UiPort;
use crate::cancel::CancelFlag;
use crate::context::{ContextWindow, TurnMeta, TurnRole};
use crate::llm::LlmClient;
use crate::router::{
    ProbeFlags, RequestProfile, ToolRouter, parse_inline_tool_calls, unmet_targets,
};
use crate::tools::executor::ToolExecutor;
use crate::{ToolInvocation, ToolStatus};

/// The synthetic response for a cancelled request.
pub const CANCELLED_RESPONSE: &str = "Operation cancelled by user.";

/// Result of one user request.
#[derive(Clone, Debug)]
pub struct AgentOutcome {
    /// Final user-facing answer.
    pub response: String,
    pub steps: u32,
    pub tool_call_count: u32,
    pub error_count: u32,
    /// Paths passed as the primary argument to successful tool calls.
    pub touched_paths: Vec<String>,
    pub cancelled: bool,
}

impl AgentOutcome {
    fn text(response: impl Into<String>, state: &RunState) -> Self {
        Self {
            response: response.into(),
            steps: state.step,
            tool_call_count: state.tool_call_count,
            error_count: state.error_count,
            touched_paths: state.touched_paths.clone(),
            cancelled: false,
        }
    }

    fn cancelled(state: &RunState) -> Self {
        Self {
            response: CANCELLED_RESPONSE.into(),
            steps: state.step,
            tool_call_count: state.tool_call_count,
            error_count: state.error_count,
            touched_paths: state.touched_paths.clone(),
            cancelled: true,
        }
    }
}

/// Mutable per-request state, owned by the loop.
#[derive(Debug, Default)]
struct RunState {
    step: u32,
    tool_call_count: u32,
    error_count: u32,
    touched_paths: Vec<String>,
    just_received_tool_call: bool,
    flags: ProbeFlags,
}

/// Router-mode orchestrator.
pub struct AgentHarness<'a> {
    llm: &'a dyn LlmClient,
    executor: &'a ToolExecutor,
    config: AgentConfig,
    cancel: CancelFlag,
    ui: Arc<dyn UiPort>,
}

impl<'a> AgentHarness<'a> {
    pub fn new(
        llm: &'a dyn LlmClient,
        executor: &'a ToolExecutor,
        config: AgentConfig,
        cancel: CancelFlag,
        ui: Arc<dyn UiPort>,
    ) -> Self {
        Self {
            llm,
            executor,
            config,
            cancel,
            ui,
        }
    }

    /// Handle one user request against the shared context window.
    ///
    /// Appends the user turn and the final assistant turn to the window
    /// and compacts it afterwards.
    pub async fn run(&self, user_input: &str, context: &mut ContextWindow) -> AgentOutcome {
        // Fresh request cycle: clear any stale cancellation.
        self.cancel.reset();

        context.append(TurnRole::User, user_input, TurnMeta::default());
        let profile = RequestProfile::classify(user_input);
        debug!(
            "request classified: repo={} mutation={} multi_step={} targets={:?}",
            profile.repo_specific, profile.mutation, profile.multi_step, profile.required_targets
        );

        let mut working_prompt = context.build_prompt(user_input);
        let mut state = RunState::default();
        let router = ToolRouter::new(self.llm, self.executor.registry());

        let outcome = self
            .iterate(&router, &profile, &mut working_prompt, &mut state)
            .await;

        context.append(
            TurnRole::Assistant,
            &outcome.response,
            TurnMeta {
                tool_calls: outcome.tool_call_count,
                error_count: outcome.error_count,
                files_touched: if outcome.touched_paths.is_empty() {
                    None
                } else {
                    Some(outcome.touched_paths.clone())
                },
            },
        );
        context.compact(Some(self.llm)).await;
        outcome
    }

    async fn iterate(
        &self,
        router: &ToolRouter<'_>,
        profile: &RequestProfile,
        working_prompt: &mut String,
        state: &mut RunState,
    ) -> AgentOutcome {
        loop {
            // (a) Cancellation, checked at the top of every iteration.
            if self.cancel.is_cancelled() {
                info!("request cancelled at step {}", state.step);
                return AgentOutcome::cancelled(state);
            }

            // Hard backstop so a chatty model cannot loop forever.
            if state.step >= self.config.max_steps {
                warn!("hard step cap reached ({})", self.config.max_steps);
                return match self.final_answer(working_prompt, state).await {
                    Ok(text) => AgentOutcome::text(text, state),
                    Err(outcome) => outcome,
                };
            }

            // (b) Soft budget: ask the model whether more work is needed.
            if state.step >= self.config.soft_step_limit && !state.just_received_tool_call {
                match self.soft_budget_check(working_prompt, state).await {
                    SoftBudget::Continue => {
                        state.step += 1;
                        continue;
                    }
                    SoftBudget::Final(text) => return AgentOutcome::text(text, state),
                    SoftBudget::Failed(outcome) => return outcome,
                }
            }

            // (c) Route.
            state.just_received_tool_call = false;
            let routed = router
                .route(
                    working_prompt,
                    profile,
                    state.step,
                    state.tool_call_count,
                    &state.touched_paths,
                    &mut state.flags,
                )
                .await;
            let call = match routed {
                Ok(call) => call,
                Err(e) => {
                    state.error_count += 1;
                    return AgentOutcome::text(format!("LLM error: {e}"), state);
                }
            };

            match call {
                // (d) No tool selected.
                None => match self.no_tool_selected(profile, working_prompt, state).await {
                    StepResult::Loop => {
                        state.step += 1;
                    }
                    StepResult::Done(outcome) => return outcome,
                },
                // (e) Tool call selected.
                Some(call) => match self.run_tool_call(&call, working_prompt, state).await {
                    StepResult::Loop => {
                        state.step += 1;
                    }
                    StepResult::Done(outcome) => return outcome,
                },
            }
        }
    }

    /// Handle a routed tool call: validate, execute, feed the result back.
    async fn run_tool_call(
        &self,
        call: &ToolInvocation,
        working_prompt: &mut String,
        state: &mut RunState,
    ) -> StepResult {
        if !self.executor.registry().contains(&call.name) {
            // An unknown name from routing falls back to a free-form answer.
            debug!("router produced unknown tool '{}'", call.name);
            return match self.final_answer(working_prompt, state).await {
                Ok(text) => StepResult::Done(AgentOutcome::text(text, state)),
                Err(outcome) => StepResult::Done(outcome),
            };
        }

        if self.cancel.is_cancelled() {
            return StepResult::Done(AgentOutcome::cancelled(state));
        }

        let result = self.executor.execute(call).await;
        self.ui.append_timeline_line(&format!(
            "{} {} in {}ms ({} bytes)",
            call.name, result.status, result.duration_ms, result.bytes
        ));

        match result.status {
            ToolStatus::Cancelled => StepResult::Done(AgentOutcome::cancelled(state)),
            ToolStatus::Error => {
                // I/O failures terminate with the single-line failure
                // response; argument-level errors are feedback the model
                // can act on next iteration.
                state.error_count += 1;
                if result.payload.starts_with("I/O error:") {
                    return StepResult::Done(AgentOutcome::text(
                        format!(
                            "Tool execution failed at step {} ({}): {}",
                            state.step, call.name, result.payload
                        ),
                        state,
                    ));
                }
                working_prompt.push_str(&format!(
                    "\n\n[tool {} step {} failed]\n{}",
                    call.name,
                    state.step,
                    result.forwarded_payload()
                ));
                state.just_received_tool_call = true;
                StepResult::Loop
            }
            ToolStatus::Ok => {
                state.tool_call_count += 1;
                if let Some(path) = &result.file_path {
                    if !state.touched_paths.contains(path) {
                        state.touched_paths.push(path.clone());
                    }
                }
                // respond_text is the explicit termination signal.
                if self.executor.registry().get(&call.name).map(|d| d.name.as_str())
                    == Some("respond_text")
                {
                    return StepResult::Done(AgentOutcome::text(result.payload, state));
                }
                working_prompt.push_str(&format!(
                    "\n\n[tool {} step {} ok in {}ms]\n{}",
                    call.name,
                    state.step,
                    result.duration_ms,
                    result.forwarded_payload()
                ));
                state.just_received_tool_call = true;
                StepResult::Loop
            }
        }
    }

    /// The no-tool branch: mutation guards, then a free-text answer that
    /// may still carry inline tool calls or keep the loop going.
    async fn no_tool_selected(
        &self,
        profile: &RequestProfile,
        working_prompt: &mut String,
        state: &mut RunState,
    ) -> StepResult {
        if profile.mutation && state.tool_call_count == 0 {
            return StepResult::Done(AgentOutcome::text(
                "The request looks like a file edit but I couldn't determine what to write. \
                 Please restate it with the target file and the change you want.",
                state,
            ));
        }
        if profile.mutation {
            let unmet = unmet_targets(&profile.required_targets, &state.touched_paths);
            if !unmet.is_empty() {
                return StepResult::Done(AgentOutcome::text(
                    format!(
                        "I completed only part of the requested edits; not yet touched: {}.",
                        unmet.join(", ")
                    ),
                    state,
                ));
            }
        }

        // Past the soft budget, a declined route goes through the explicit
        // continuation check instead of a silent final query.
        if state.step >= self.config.soft_step_limit {
            return match self.soft_budget_check(working_prompt, state).await {
                SoftBudget::Continue => StepResult::Loop,
                SoftBudget::Final(text) => StepResult::Done(AgentOutcome::text(text, state)),
                SoftBudget::Failed(outcome) => StepResult::Done(outcome),
            };
        }

        let text = match self.final_answer(working_prompt, state).await {
            Ok(text) => text,
            Err(outcome) => return StepResult::Done(outcome),
        };

        // Inline tool calls keep the loop alive (never terminal).
        if text.trim_start().starts_with("TOOL_CALL ") {
            self.execute_inline_calls(&text, working_prompt, state).await;
            return StepResult::Loop;
        }

        working_prompt.push_str(&format!(
            "\n\n[assistant draft]\n{text}\n[system] If the task is complete, call \
             respond_text with the final answer; otherwise continue with tool calls."
        ));
        StepResult::Loop
    }

    /// Execute every inline `TOOL_CALL` line of a free-text response and
    /// feed the results back. The surrounding prose is kept in the prompt.
    async fn execute_inline_calls(
        &self,
        text: &str,
        working_prompt: &mut String,
        state: &mut RunState,
    ) {
        working_prompt.push_str(&format!("\n\n[assistant]\n{text}"));
        for call in parse_inline_tool_calls(text) {
            if !self.executor.registry().contains(&call.name) {
                debug!("skipping inline call to unknown tool '{}'", call.name);
                continue;
            }
            if self.cancel.is_cancelled() {
                return;
            }
            let result = self.executor.execute(&call).await;
            self.ui.append_timeline_line(&format!(
                "{} {} in {}ms (inline)",
                call.name, result.status, result.duration_ms
            ));
            if result.status == ToolStatus::Ok {
                state.tool_call_count += 1;
                if let Some(path) = &result.file_path {
                    if !state.touched_paths.contains(path) {
                        state.touched_paths.push(path.clone());
                    }
                }
            } else {
                state.error_count += 1;
            }
            working_prompt.push_str(&format!(
                "\n\n[tool {} inline {}]\n{}",
                call.name,
                result.status,
                result.forwarded_payload()
            ));
        }
        state.just_received_tool_call = true;
    }

    /// The soft-budget continuation check.
    async fn soft_budget_check(&self, working_prompt: &mut String, state: &mut RunState) -> SoftBudget {
        working_prompt.push_str(&format!(
            "\n\n[system] You have completed {} steps. Todo status: {}. If more steps are \
             needed, make another tool call; otherwise provide the final answer.",
            state.step,
            self.executor.todo_summary()
        ));
        let response = match self
            .llm
            .query(working_prompt, self.executor.registry().descriptors())
            .await
        {
            Ok(text) => text,
            Err(e) => {
                state.error_count += 1;
                return SoftBudget::Failed(AgentOutcome::text(format!("LLM error: {e}"), state));
            }
        };
        if response.trim_start().starts_with("TOOL_CALL ") {
            // The continuation response becomes the new working prompt.
            *working_prompt = response;
            state.just_received_tool_call = true;
            SoftBudget::Continue
        } else {
            SoftBudget::Final(response)
        }
    }

    /// Query the model for a free-form final answer.
    async fn final_answer(
        &self,
        working_prompt: &str,
        state: &mut RunState,
    ) -> Result<String, AgentOutcome> {
        self.llm
            .query(working_prompt, self.executor.registry().descriptors())
            .await
            .map_err(|e| {
                state.error_count += 1;
                AgentOutcome::text(format!("LLM error: {e}"), state)
            })
    }
}

enum StepResult {
    Loop,
    Done(AgentOutcome),
}

enum SoftBudget {
    Continue,
    Final(String),
    Failed(AgentOutcome),
}
