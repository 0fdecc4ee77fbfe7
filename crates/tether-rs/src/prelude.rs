//! Convenience re-exports for building an agent.
//!
//! ```ignore
//! use tether_rs::prelude::*;
//!
//! let root = WorkspaceRoot::new(".")?;
//! let cancel = CancelFlag::new();
//! let executor = ToolExecutor::new(root, cancel.clone(), Arc::new(NoopPort));
//! let agent = AgentHarness::new(&client, &executor, AgentConfig::default(), cancel, Arc::new(NoopPort));
//! ```

pub use crate::agent::bridge::{BridgeMessage, BridgeOrchestrator, BridgeTurn, ToolCallBridge};
pub use crate::agent::config::{AgentConfig, Orchestrator};
pub use crate::agent::harness::{AgentHarness, AgentOutcome, CANCELLED_RESPONSE};
pub use crate::agent::ui::{LogPort, NoopPort, UiPort};
pub use crate::cancel::CancelFlag;
pub use crate::context::{ContextWindow, TurnMeta, TurnRole};
pub use crate::llm::{LlmClient, LlmError, LlmFuture, ScriptedClient, ToolChoice};
pub use crate::router::RequestProfile;
pub use crate::todo::{TodoStatus, TodoStore};
pub use crate::tools::executor::ToolExecutor;
pub use crate::tools::registry::{ToolDescriptor, ToolRegistry};
pub use crate::workspace::WorkspaceRoot;
pub use crate::{AgentError, ToolInvocation, ToolResult, ToolStatus};
