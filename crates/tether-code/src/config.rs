//! Terminal-agent configuration with coding-tuned defaults.

use tether_rs::prelude::{AgentConfig, Orchestrator};

/// Settings for a terminal agent session.
#[derive(Debug, Clone)]
pub struct CodeConfig {
    /// Model identifier. Default: `"anthropic/claude-sonnet-4"`.
    pub model: String,
    /// Working directory for all tools. Default: `"."`.
    pub workdir: String,
    /// Soft step budget before the continuation check. Default: `6`.
    pub soft_step_limit: u32,
    /// Hard iteration cap. Default: `24`.
    pub max_steps: u32,
    /// Use the bridge orchestrator instead of router mode. Default: `false`.
    pub bridge_mode: bool,
}

impl Default for CodeConfig {
    fn default() -> Self {
        Self {
            model: "anthropic/claude-sonnet-4".to_string(),
            workdir: ".".to_string(),
            soft_step_limit: 6,
            max_steps: 24,
            bridge_mode: false,
        }
    }
}

impl CodeConfig {
    /// Build the loop configuration from these settings.
    pub fn build_agent_config(&self) -> AgentConfig {
        let orchestrator = if self.bridge_mode {
            Orchestrator::Bridge
        } else {
            Orchestrator::Router
        };
        AgentConfig::new(self.model.clone())
            .with_soft_step_limit(self.soft_step_limit)
            .with_max_steps(self.max_steps)
            .with_orchestrator(orchestrator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_interactive_tuned() {
        let config = CodeConfig::default();
        assert_eq!(config.soft_step_limit, 6);
        assert_eq!(config.max_steps, 24);
        assert!(!config.bridge_mode);
    }

    #[test]
    fn build_agent_config_carries_settings() {
        let config = CodeConfig {
            model: "some/model".into(),
            bridge_mode: true,
            ..Default::default()
        };
        let agent = config.build_agent_config();
        assert_eq!(agent.model, "some/model");
        assert_eq!(agent.orchestrator, Orchestrator::Bridge);
        assert_eq!(agent.soft_step_limit, 6);
    }
}
