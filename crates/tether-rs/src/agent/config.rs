//! Loop configuration.

use crate::context::{DEFAULT_KEEP_RECENT, DEFAULT_MAX_CHARS};

/// Which orchestrator drives a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Orchestrator {
    /// Router-mode: staged tool routing over free-text prompts (default).
    #[default]
    Router,
    /// Bridge-mode: structured tool calls from an external bridge.
    Bridge,
}

/// Settings for one agent instance.
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// Model identifier, passed through to the LLM client for display.
    pub model: String,
    /// Steps after which the loop asks the model whether to continue
    /// instead of silently iterating.
    pub soft_step_limit: u32,
    /// Hard iteration cap; the loop forces a final answer at this point.
    pub max_steps: u32,
    /// Context window character budget before compaction.
    pub max_context_chars: usize,
    /// Most-recent turns protected from compaction.
    pub keep_recent_turns: usize,
    /// Orchestrator selection.
    pub orchestrator: Orchestrator,
    /// Turn cap for bridge mode.
    pub bridge_max_iterations: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: "default".into(),
            soft_step_limit: 6,
            max_steps: 24,
            max_context_chars: DEFAULT_MAX_CHARS,
            keep_recent_turns: DEFAULT_KEEP_RECENT,
            orchestrator: Orchestrator::Router,
            bridge_max_iterations: 15,
        }
    }
}

impl AgentConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn with_soft_step_limit(mut self, limit: u32) -> Self {
        self.soft_step_limit = limit;
        self
    }

    pub fn with_max_steps(mut self, max: u32) -> Self {
        self.max_steps = max;
        self
    }

    pub fn with_orchestrator(mut self, orchestrator: Orchestrator) -> Self {
        self.orchestrator = orchestrator;
        self
    }

    pub fn with_context_limits(mut self, max_chars: usize, keep_recent: usize) -> Self {
        self.max_context_chars = max_chars;
        self.keep_recent_turns = keep_recent;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_loop_contract() {
        let config = AgentConfig::default();
        assert_eq!(config.soft_step_limit, 6);
        assert_eq!(config.bridge_max_iterations, 15);
        assert_eq!(config.orchestrator, Orchestrator::Router);
    }

    #[test]
    fn builders_compose() {
        let config = AgentConfig::new("some/model")
            .with_soft_step_limit(3)
            .with_max_steps(10)
            .with_orchestrator(Orchestrator::Bridge)
            .with_context_limits(1000, 2);
        assert_eq!(config.model, "some/model");
        assert_eq!(config.soft_step_limit, 3);
        assert_eq!(config.max_steps, 10);
        assert_eq!(config.orchestrator, Orchestrator::Bridge);
        assert_eq!(config.max_context_chars, 1000);
        assert_eq!(config.keep_recent_turns, 2);
    }
}
