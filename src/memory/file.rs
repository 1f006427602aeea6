//! File-backed thread storage.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agent_loop::Checkpoint;
use crate::error::AbacusError;
use crate::types::ModelMessage;

use super::Checkpointer;

/// File-backed checkpointer: one JSON file per thread.
///
/// # Example
/// ```no_run
/// use abacus::memory::{Checkpointer, FileCheckpointer};
/// use abacus::types::ModelMessage;
///
/// let store = FileCheckpointer::new_default();
/// store.save_history("default", &[ModelMessage::user("What is 3 times 4?")])?;
/// # Ok::<(), abacus::error::AbacusError>(())
/// ```
#[derive(Debug, Clone)]
pub struct FileCheckpointer {
    base_dir: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ThreadFile {
    version: u32,
    thread_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    messages: Option<Vec<ModelMessage>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pending: Option<Checkpoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    saved_at: Option<DateTime<Utc>>,
}

impl FileCheckpointer {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Store under `~/.abacus/threads`.
    pub fn new_default() -> Self {
        Self::new(
            directories::UserDirs::new()
                .map(|dirs| dirs.home_dir().join(".abacus").join("threads"))
                .unwrap_or_else(|| PathBuf::from(".abacus/threads")),
        )
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// `<base_dir>/<percent-encoded thread id>.json`.
    ///
    /// Every byte outside `[a-z0-9_-]` is escaped, upper-case letters
    /// included, so distinct ids never share a file even on case-insensitive
    /// filesystems.
    fn thread_path(&self, thread_id: &str) -> Result<PathBuf, AbacusError> {
        if thread_id.is_empty() {
            return Err(AbacusError::InvalidArgument("thread id must not be empty".into()));
        }
        Ok(self.base_dir.join(format!("{}.json", file_stem(thread_id))))
    }

    fn read(&self, thread_id: &str) -> Result<Option<ThreadFile>, AbacusError> {
        let path = self.thread_path(thread_id)?;
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(AbacusError::Io(err)),
        };
        let file: ThreadFile = serde_json::from_str(&raw)
            .map_err(|e| AbacusError::Store(format!("corrupt thread file {}: {e}", path.display())))?;
        if file.thread_id != thread_id {
            return Err(AbacusError::Store(format!(
                "{} belongs to thread '{}', not '{thread_id}'",
                path.display(),
                file.thread_id
            )));
        }
        Ok(Some(file))
    }

    fn update(&self, thread_id: &str, f: impl FnOnce(&mut ThreadFile)) -> Result<(), AbacusError> {
        let mut file = self.read(thread_id)?.unwrap_or_else(|| ThreadFile {
            version: 1,
            thread_id: thread_id.to_string(),
            ..Default::default()
        });
        f(&mut file);
        file.saved_at = Some(Utc::now());

        let path = self.thread_path(thread_id)?;
        fs::create_dir_all(&self.base_dir)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(&file)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

impl Checkpointer for FileCheckpointer {
    fn load_history(&self, thread_id: &str) -> Result<Option<Vec<ModelMessage>>, AbacusError> {
        Ok(self.read(thread_id)?.and_then(|f| f.messages))
    }

    fn save_history(&self, thread_id: &str, messages: &[ModelMessage]) -> Result<(), AbacusError> {
        self.update(thread_id, |f| f.messages = Some(messages.to_vec()))
    }

    fn load_pending(&self, thread_id: &str) -> Result<Option<Checkpoint>, AbacusError> {
        Ok(self.read(thread_id)?.and_then(|f| f.pending))
    }

    fn save_pending(&self, thread_id: &str, checkpoint: &Checkpoint) -> Result<(), AbacusError> {
        self.update(thread_id, |f| f.pending = Some(checkpoint.clone()))
    }

    fn clear_pending(&self, thread_id: &str) -> Result<(), AbacusError> {
        if self.read(thread_id)?.is_none() {
            return Ok(());
        }
        self.update(thread_id, |f| f.pending = None)
    }
}

fn file_stem(thread_id: &str) -> String {
    let encoded = urlencoding::encode(thread_id);
    let mut stem = String::with_capacity(encoded.len());
    let mut chars = encoded.chars();
    while let Some(ch) = chars.next() {
        match ch {
            // An existing escape; its hex digits stay as they are.
            '%' => {
                stem.push('%');
                stem.extend(chars.by_ref().take(2));
            }
            'A'..='Z' | '.' | '~' => stem.push_str(&format!("%{:02X}", ch as u32)),
            _ => stem.push(ch),
        }
    }
    stem
}
