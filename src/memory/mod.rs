//! Short-term memory: per-thread conversation history and suspended runs.

pub mod file;

use std::collections::HashMap;
use std::sync::RwLock;

use crate::agent_loop::Checkpoint;
use crate::error::AbacusError;
use crate::types::ModelMessage;

pub use file::FileCheckpointer;

/// Storage for thread history and pending checkpoints.
pub trait Checkpointer: Send + Sync {
    /// History of the last completed run on `thread_id`.
    fn load_history(&self, thread_id: &str) -> Result<Option<Vec<ModelMessage>>, AbacusError>;
    fn save_history(&self, thread_id: &str, messages: &[ModelMessage]) -> Result<(), AbacusError>;
    /// The run suspended on `thread_id`, if any.
    fn load_pending(&self, thread_id: &str) -> Result<Option<Checkpoint>, AbacusError>;
    fn save_pending(&self, thread_id: &str, checkpoint: &Checkpoint) -> Result<(), AbacusError>;
    fn clear_pending(&self, thread_id: &str) -> Result<(), AbacusError>;
}

#[derive(Debug, Default, Clone)]
struct ThreadSlot {
    history: Option<Vec<ModelMessage>>,
    pending: Option<Checkpoint>,
}

/// In-process checkpointer; contents are lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryCheckpointer {
    threads: RwLock<HashMap<String, ThreadSlot>>,
}

impl MemoryCheckpointer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids of every thread with stored state.
    pub fn thread_ids(&self) -> Vec<String> {
        self.threads
            .read()
            .map(|t| t.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn with_slot<T>(&self, thread_id: &str, f: impl FnOnce(&mut ThreadSlot) -> T) -> Result<T, AbacusError> {
        let mut threads = self
            .threads
            .write()
            .map_err(|_| AbacusError::Store("thread map lock poisoned".into()))?;
        Ok(f(threads.entry(thread_id.to_string()).or_default()))
    }

    fn read_slot<T>(&self, thread_id: &str, f: impl FnOnce(&ThreadSlot) -> T) -> Result<Option<T>, AbacusError> {
        let threads = self
            .threads
            .read()
            .map_err(|_| AbacusError::Store("thread map lock poisoned".into()))?;
        Ok(threads.get(thread_id).map(f))
    }
}

impl Checkpointer for MemoryCheckpointer {
    fn load_history(&self, thread_id: &str) -> Result<Option<Vec<ModelMessage>>, AbacusError> {
        Ok(self.read_slot(thread_id, |slot| slot.history.clone())?.flatten())
    }

    fn save_history(&self, thread_id: &str, messages: &[ModelMessage]) -> Result<(), AbacusError> {
        self.with_slot(thread_id, |slot| slot.history = Some(messages.to_vec()))
    }

    fn load_pending(&self, thread_id: &str) -> Result<Option<Checkpoint>, AbacusError> {
        Ok(self.read_slot(thread_id, |slot| slot.pending.clone())?.flatten())
    }

    fn save_pending(&self, thread_id: &str, checkpoint: &Checkpoint) -> Result<(), AbacusError> {
        self.with_slot(thread_id, |slot| slot.pending = Some(checkpoint.clone()))
    }

    fn clear_pending(&self, thread_id: &str) -> Result<(), AbacusError> {
        self.with_slot(thread_id, |slot| slot.pending = None)
    }
}
