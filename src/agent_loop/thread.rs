//! Named conversations whose history and suspended runs are persisted.

use std::sync::Arc;

use tracing::debug;

use crate::error::AbacusError;
use crate::memory::Checkpointer;
use crate::types::ModelMessage;

use super::approvals::{ApprovalHandler, ApprovalRequest};
use super::runner::AgentLoop;
use super::types::{RunOutcome, RunResult};

/// A conversation thread bound to an agent loop and a checkpointer.
///
/// Each completed run stores the full history, which becomes the `previous`
/// history of the next run. A run suspended for approval is stored as the
/// thread's pending checkpoint until [`Thread::resume`] settles it.
#[derive(Clone)]
pub struct Thread {
    id: String,
    agent: Arc<AgentLoop>,
    store: Arc<dyn Checkpointer>,
}

impl Thread {
    pub fn new(id: impl Into<String>, agent: Arc<AgentLoop>, store: Arc<dyn Checkpointer>) -> Self {
        Self {
            id: id.into(),
            agent,
            store,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Stored history of the thread (empty if none).
    pub fn history(&self) -> Result<Vec<ModelMessage>, AbacusError> {
        Ok(self.store.load_history(&self.id)?.unwrap_or_default())
    }

    /// The approval the thread is waiting on, if any.
    pub fn pending(&self) -> Result<Option<ApprovalRequest>, AbacusError> {
        Ok(self
            .store
            .load_pending(&self.id)?
            .and_then(|cp| cp.approval_request()))
    }

    /// Start a run with `input` on top of the thread's history.
    ///
    /// Fails with `InvalidState` while an approval is pending.
    pub async fn send(&self, input: Vec<ModelMessage>) -> Result<RunOutcome, AbacusError> {
        self.ensure_idle()?;
        let previous = self.store.load_history(&self.id)?;
        let outcome = self.agent.invoke(input, previous).await?;
        self.persist(&outcome)?;
        Ok(outcome)
    }

    /// Settle the pending approval and continue the suspended run.
    ///
    /// If the run fails, the checkpoint stays pending so the call can be
    /// decided again.
    pub async fn resume(&self, approved: bool) -> Result<RunOutcome, AbacusError> {
        let checkpoint = self.store.load_pending(&self.id)?.ok_or_else(|| {
            AbacusError::InvalidState(format!("thread '{}' has no pending approval", self.id))
        })?;
        let outcome = self.agent.resume(checkpoint, approved).await?;
        self.persist(&outcome)?;
        Ok(outcome)
    }

    /// Run to completion, asking `approver` at every approval point.
    pub async fn run(&self, input: Vec<ModelMessage>, approver: &ApprovalHandler) -> Result<RunResult, AbacusError> {
        self.ensure_idle()?;
        let previous = self.store.load_history(&self.id)?;
        let result = self.agent.run(input, previous, approver).await?;
        self.store.save_history(&self.id, &result.messages)?;
        Ok(result)
    }

    fn ensure_idle(&self) -> Result<(), AbacusError> {
        if self.store.load_pending(&self.id)?.is_some() {
            return Err(AbacusError::InvalidState(format!(
                "thread '{}' is waiting for a tool call approval",
                self.id
            )));
        }
        Ok(())
    }

    fn persist(&self, outcome: &RunOutcome) -> Result<(), AbacusError> {
        match outcome {
            RunOutcome::Completed(result) => {
                self.store.save_history(&self.id, &result.messages)?;
                self.store.clear_pending(&self.id)?;
                debug!(thread = %self.id, messages = result.messages.len(), "thread history saved");
            }
            RunOutcome::Interrupted { checkpoint, .. } => {
                self.store.save_pending(&self.id, checkpoint)?;
                debug!(thread = %self.id, "thread checkpoint saved");
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Thread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Thread")
            .field("id", &self.id)
            .field("agent", &self.agent)
            .finish()
    }
}
