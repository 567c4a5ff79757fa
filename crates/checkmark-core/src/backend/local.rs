use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::backend::StorageBackend;
use crate::datastore::KeyValueStore;
use crate::error::StorageError;
use crate::task::{Task, TaskId, TaskPatch, dedupe_ids};

pub const DEFAULT_STORAGE_KEY: &str = "tasks";

/// Synchronous backend over a [`KeyValueStore`]: the whole list lives as one
/// JSON array under a single key and is rewritten on every mutation.
///
/// Mutations are refused while the stored list has not been read, so an
/// unreadable payload is never replaced by a partial one. A malformed payload
/// counts as read: it is treated as empty and the next write replaces it.
pub struct LocalBackend {
    storage: Box<dyn KeyValueStore>,
    key: String,
    mirror: Vec<Task>,
    loaded: bool,
}

impl LocalBackend {
    pub fn new(storage: Box<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
            mirror: Vec::new(),
            loaded: false,
        }
    }

    fn read(&self) -> Result<Vec<Task>, StorageError> {
        let Some(raw) = self.storage.get_item(&self.key)? else {
            debug!(key = %self.key, "no stored tasks");
            return Ok(Vec::new());
        };
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&raw)?)
    }

    fn ensure_loaded(&mut self) -> Result<(), StorageError> {
        if !self.loaded {
            self.mirror = dedupe_ids(self.read()?);
            self.loaded = true;
            debug!(key = %self.key, count = self.mirror.len(), "re-read stored tasks before writing");
        }
        Ok(())
    }

    fn persist(&self) -> Result<(), StorageError> {
        let serialized = serde_json::to_string(&self.mirror)?;
        self.storage.set_item(&self.key, &serialized)?;
        debug!(key = %self.key, count = self.mirror.len(), "persisted tasks");
        Ok(())
    }

    /// Millisecond timestamp, moved past every id already stored so two
    /// creations in the same millisecond still get distinct ids.
    fn next_id(&self) -> TaskId {
        let now = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0);
        let floor = self
            .mirror
            .iter()
            .map(|t| t.id)
            .max()
            .map_or(0, |max| max.saturating_add(1));
        now.max(floor)
    }

    fn position(&self, id: TaskId) -> Result<usize, StorageError> {
        self.mirror
            .iter()
            .position(|t| t.id == id)
            .ok_or(StorageError::Missing(id))
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    #[tracing::instrument(skip(self))]
    async fn load(&mut self) -> Result<Vec<Task>, StorageError> {
        self.mirror.clear();
        match self.read() {
            Ok(tasks) => {
                let tasks = dedupe_ids(tasks);
                info!(key = %self.key, count = tasks.len(), "loaded local tasks");
                self.mirror = tasks.clone();
                self.loaded = true;
                Ok(tasks)
            }
            Err(err @ StorageError::Malformed(_)) => {
                warn!(error = %err, "stored tasks malformed; the next write replaces them");
                self.loaded = true;
                Err(err)
            }
            Err(err) => {
                warn!(error = %err, "stored tasks unreadable; writes refused until a read succeeds");
                self.loaded = false;
                Err(err)
            }
        }
    }

    #[tracing::instrument(skip(self, text))]
    async fn create(&mut self, text: &str) -> Result<Task, StorageError> {
        self.ensure_loaded()?;
        let task = Task::new_pending(self.next_id(), text);
        self.mirror.insert(0, task.clone());
        if let Err(err) = self.persist() {
            self.mirror.remove(0);
            return Err(err);
        }
        Ok(task)
    }

    #[tracing::instrument(skip(self, patch))]
    async fn update(&mut self, id: TaskId, patch: &TaskPatch) -> Result<(), StorageError> {
        self.ensure_loaded()?;
        let idx = self.position(id)?;
        let undo = self.mirror[idx].apply(patch);
        if let Err(err) = self.persist() {
            self.mirror[idx].apply(&undo);
            return Err(err);
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&mut self, id: TaskId) -> Result<(), StorageError> {
        self.ensure_loaded()?;
        let idx = self.position(id)?;
        let removed = self.mirror.remove(idx);
        if let Err(err) = self.persist() {
            self.mirror.insert(idx, removed);
            return Err(err);
        }
        Ok(())
    }
}
