//! Core run types for the agent loop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{AgentToolCall, ModelMessage, Role, Usage};

use super::approvals::ApprovalRequest;

/// Unique run identifier.
pub type RunId = Uuid;

/// An assistant turn whose tool calls are being worked through.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingTurn {
    /// Assistant message carrying the tool calls.
    pub assistant: ModelMessage,
    /// Tool result messages for the calls handled so far, in call order.
    pub results: Vec<ModelMessage>,
}

impl PendingTurn {
    pub fn new(assistant: ModelMessage) -> Self {
        Self {
            assistant,
            results: Vec::new(),
        }
    }

    /// The next tool call without a result.
    pub fn next_call(&self) -> Option<AgentToolCall> {
        self.assistant
            .tool_calls()
            .get(self.results.len())
            .map(|call| (*call).clone())
    }
}

/// Serializable snapshot of a run suspended at an approval point.
///
/// Resuming continues at [`Checkpoint::pending_call`]; model calls and tool
/// calls recorded here are never repeated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Checkpoint {
    pub run_id: RunId,
    /// Conversation merged so far, excluding the pending turn.
    pub messages: Vec<ModelMessage>,
    pub pending: PendingTurn,
    pub model_calls: usize,
    #[serde(default)]
    pub usage: Usage,
    /// Sequence number of the next run event emitted after resuming.
    #[serde(default)]
    pub next_event_seq: u64,
    pub created_at: DateTime<Utc>,
}

impl Checkpoint {
    /// The tool call awaiting a decision.
    pub fn pending_call(&self) -> Option<AgentToolCall> {
        self.pending.next_call()
    }

    /// The payload to show the approver.
    pub fn approval_request(&self) -> Option<ApprovalRequest> {
        self.pending_call().map(ApprovalRequest::for_call)
    }
}

/// Result of a run that reached a final answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunResult {
    pub run_id: RunId,
    /// Full merged conversation, ending with the final assistant message.
    pub messages: Vec<ModelMessage>,
    pub model_calls: usize,
    pub usage: Usage,
    pub finished_at: DateTime<Utc>,
}

impl RunResult {
    /// The final assistant message.
    pub fn final_message(&self) -> Option<&ModelMessage> {
        self.messages
            .last()
            .filter(|m| m.role == Role::Assistant)
    }

    /// Text of the final answer (empty if the model returned none).
    pub fn answer(&self) -> String {
        self.final_message().map(|m| m.text()).unwrap_or_default()
    }
}

/// What a single `invoke`/`resume` step produced.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// The model answered without requesting tools.
    Completed(RunResult),
    /// The run is suspended until `request` is approved or rejected.
    Interrupted {
        request: ApprovalRequest,
        checkpoint: Checkpoint,
    },
}

impl RunOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    pub fn completed(self) -> Option<RunResult> {
        match self {
            Self::Completed(result) => Some(result),
            Self::Interrupted { .. } => None,
        }
    }
}
