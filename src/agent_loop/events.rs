//! Run event stream types.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{AgentToolCall, AgentToolResult, ModelMessage};

use super::approvals::ApprovalRequest;
use super::types::RunId;

/// Callback used for streaming run events.
pub type RunEventSink = Arc<dyn Fn(RunEvent) + Send + Sync>;

/// Run lifecycle event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RunLifecycle {
    Started,
    Resumed,
    Interrupted,
    Completed,
    Failed { error: String },
}

/// Concrete event payloads emitted by the agent loop.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEventPayload {
    Lifecycle { state: RunLifecycle },
    ModelResponse { message: ModelMessage },
    ApprovalRequired { request: ApprovalRequest },
    ToolResult { call: AgentToolCall, result: AgentToolResult },
}

/// Envelope for streaming run events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunEvent {
    pub run_id: RunId,
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub payload: RunEventPayload,
}

pub(crate) struct RunEventEmitter {
    run_id: RunId,
    seq: AtomicU64,
    sink: Option<RunEventSink>,
}

impl RunEventEmitter {
    pub(crate) fn new(run_id: RunId, sink: Option<RunEventSink>) -> Self {
        Self::starting_at(run_id, 1, sink)
    }

    /// Continue numbering a resumed run at `next_seq` (sequence numbers start at 1).
    pub(crate) fn starting_at(run_id: RunId, next_seq: u64, sink: Option<RunEventSink>) -> Self {
        Self {
            run_id,
            seq: AtomicU64::new(next_seq.max(1)),
            sink,
        }
    }

    /// Sequence number the next event will carry.
    pub(crate) fn next_seq(&self) -> u64 {
        self.seq.load(Ordering::SeqCst)
    }

    pub(crate) fn emit(&self, payload: RunEventPayload) {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        let Some(sink) = &self.sink else { return };
        (sink)(RunEvent {
            run_id: self.run_id,
            seq,
            timestamp: Utc::now(),
            payload,
        });
    }

    pub(crate) fn lifecycle(&self, state: RunLifecycle) {
        self.emit(RunEventPayload::Lifecycle { state });
    }
}
