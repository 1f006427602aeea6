//! Human approval of tool calls.

use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::types::AgentToolCall;

/// Instruction shown to the approver alongside each pending tool call.
pub const APPROVAL_INSTRUCTION: &str = "Please approve/reject the tool call";

/// Result recorded in place of a tool's output when the approver rejects it.
pub const REJECTION_RESULT: &str = "Tool call rejected";

/// Tool approval policy for a run.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalPolicy {
    /// Reject every tool call without asking.
    Never,
    /// Suspend before every tool call until a decision arrives.
    #[default]
    Ask,
    /// Approve every tool call without asking.
    Always,
}

/// Payload surfaced to the approver when the loop suspends.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApprovalRequest {
    /// The tool call awaiting review.
    pub tool_call: AgentToolCall,
    /// Free-text instruction for the reviewer.
    pub action: String,
}

impl ApprovalRequest {
    pub fn for_call(tool_call: AgentToolCall) -> Self {
        Self {
            tool_call,
            action: APPROVAL_INSTRUCTION.to_string(),
        }
    }
}

/// Async approval handler: resolves to `true` to run the tool, `false` to reject it.
pub type ApprovalHandler = Arc<dyn Fn(ApprovalRequest) -> BoxFuture<'static, bool> + Send + Sync>;

/// Handler that gives the same answer to every request.
pub fn fixed_handler(approved: bool) -> ApprovalHandler {
    Arc::new(move |_request: ApprovalRequest| -> BoxFuture<'static, bool> {
        Box::pin(async move { approved })
    })
}
