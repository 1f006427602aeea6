//! Convenience re-exports for common use.

pub use crate::agent_loop::{
    AgentLoop, ApprovalHandler, ApprovalPolicy, ApprovalRequest, Checkpoint, RunOutcome,
    RunResult, Thread,
};
pub use crate::config::AbacusConfig;
pub use crate::error::{AbacusError, Result};
pub use crate::memory::{Checkpointer, FileCheckpointer, MemoryCheckpointer};
pub use crate::models::LanguageModel;
pub use crate::provider::ModelProvider;
pub use crate::tools::{Tool, ToolRegistry};
pub use crate::types::{add_messages, AgentToolCall, AgentToolResult, ModelMessage, Role};
