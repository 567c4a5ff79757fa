//! The canonical in-memory task list and the reconciliation of every
//! mutation with the active storage backend.
//!
//! In-place mutations (toggle, edit) are applied optimistically and rolled
//! back when the backend refuses them. Removals only happen once the backend
//! has confirmed them. Every operation takes `&mut self`, so intents run one
//! after another even when a remote call suspends.

use tracing::{debug, info, warn};

use crate::backend::{BackendKind, StorageBackend};
use crate::error::{Rejection, StorageError, StoreError};
use crate::filter::{FilterMode, filter_view};
use crate::task::{Task, TaskId, TaskPatch, dedupe_ids, normalize_text};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    Unchanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stats {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
}

impl Stats {
    pub fn of(tasks: &[Task]) -> Self {
        let completed = tasks.iter().filter(|t| t.completed).count();
        Self {
            total: tasks.len(),
            completed,
            pending: tasks.len() - completed,
        }
    }
}

/// Everything a front end needs to draw the current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub visible: Vec<Task>,
    pub stats: Stats,
    pub backend: BackendKind,
    pub filter: FilterMode,
}

pub struct TaskStore {
    tasks: Vec<Task>,
    filter: FilterMode,
    active: BackendKind,
    local: Box<dyn StorageBackend>,
    remote: Box<dyn StorageBackend>,
}

impl TaskStore {
    /// Builds an empty store; call [`TaskStore::load_all`] to populate it.
    pub fn new(
        local: Box<dyn StorageBackend>,
        remote: Box<dyn StorageBackend>,
        active: BackendKind,
    ) -> Self {
        Self {
            tasks: Vec::new(),
            filter: FilterMode::default(),
            active,
            local,
            remote,
        }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn filter(&self) -> FilterMode {
        self.filter
    }

    pub fn active_backend(&self) -> BackendKind {
        self.active
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            visible: filter_view(&self.tasks, self.filter),
            stats: Stats::of(&self.tasks),
            backend: self.active,
            filter: self.filter,
        }
    }

    pub fn set_filter(&mut self, mode: FilterMode) -> Outcome {
        if self.filter == mode {
            return Outcome::Unchanged;
        }
        debug!(from = %self.filter, to = %mode, "filter changed");
        self.filter = mode;
        Outcome::Applied
    }

    fn backend(&mut self) -> &mut dyn StorageBackend {
        match self.active {
            BackendKind::Local => self.local.as_mut(),
            BackendKind::Remote => self.remote.as_mut(),
        }
    }

    fn position(&self, id: TaskId) -> Result<usize, Rejection> {
        self.tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or(Rejection::UnknownTask(id))
    }

    /// Replaces the list with the backend's view. A failed load leaves the
    /// list empty.
    #[tracing::instrument(skip(self), fields(backend = %self.active))]
    pub async fn load_all(&mut self) -> Result<Outcome, StoreError> {
        let loaded = self.backend().load().await;
        match loaded {
            Ok(tasks) => {
                self.tasks = dedupe_ids(tasks);
                info!(count = self.tasks.len(), "tasks loaded");
                Ok(Outcome::Applied)
            }
            Err(err) => {
                warn!(error = %err, "load failed; list is now empty");
                self.tasks.clear();
                Err(StoreError::Read(err))
            }
        }
    }

    /// Creates a task through the backend and inserts it at the front once
    /// the backend has assigned its id.
    #[tracing::instrument(skip(self, text), fields(backend = %self.active))]
    pub async fn add(&mut self, text: &str) -> Result<Task, StoreError> {
        let text = normalize_text(text).ok_or(Rejection::EmptyText)?;

        let task = self.backend().create(&text).await.map_err(|err| {
            warn!(error = %err, "create failed");
            StoreError::Write(err)
        })?;

        if self.position(task.id).is_ok() {
            warn!(id = task.id, "backend returned an id already in the list");
            return Err(StoreError::Write(StorageError::DuplicateId(task.id)));
        }

        debug!(id = task.id, "task added");
        self.tasks.insert(0, task.clone());
        Ok(task)
    }

    #[tracing::instrument(skip(self), fields(backend = %self.active))]
    pub async fn toggle(&mut self, id: TaskId) -> Result<Outcome, StoreError> {
        let idx = self.position(id)?;
        let patch = TaskPatch::completed(!self.tasks[idx].completed);
        self.apply_optimistic(idx, patch).await
    }

    #[tracing::instrument(skip(self, text), fields(backend = %self.active))]
    pub async fn edit(&mut self, id: TaskId, text: &str) -> Result<Outcome, StoreError> {
        let text = normalize_text(text).ok_or(Rejection::EmptyText)?;
        let idx = self.position(id)?;
        if self.tasks[idx].text == text {
            return Ok(Outcome::Unchanged);
        }
        self.apply_optimistic(idx, TaskPatch::text(text)).await
    }

    async fn apply_optimistic(
        &mut self,
        idx: usize,
        patch: TaskPatch,
    ) -> Result<Outcome, StoreError> {
        let id = self.tasks[idx].id;
        let undo = self.tasks[idx].apply(&patch);

        let persisted = self.backend().update(id, &patch).await;
        if let Err(err) = persisted {
            warn!(id, error = %err, "update failed; reverting");
            self.tasks[idx].apply(&undo);
            return Err(StoreError::Write(err));
        }

        debug!(id, ?patch, "task updated");
        Ok(Outcome::Applied)
    }

    #[tracing::instrument(skip(self), fields(backend = %self.active))]
    pub async fn remove(&mut self, id: TaskId) -> Result<Outcome, StoreError> {
        self.position(id)?;

        self.backend().delete(id).await.map_err(|err| {
            warn!(id, error = %err, "delete failed");
            StoreError::Write(err)
        })?;

        self.tasks.retain(|t| t.id != id);
        debug!(id, "task removed");
        Ok(Outcome::Applied)
    }

    /// Deletes completed tasks one at a time. Each confirmed delete is
    /// reflected immediately; the first failure stops the batch.
    #[tracing::instrument(skip(self), fields(backend = %self.active))]
    pub async fn clear_completed(&mut self) -> Result<Outcome, StoreError> {
        let ids: Vec<TaskId> = self
            .tasks
            .iter()
            .filter(|t| t.completed)
            .map(|t| t.id)
            .collect();
        if ids.is_empty() {
            return Ok(Outcome::Unchanged);
        }

        let mut removed = 0usize;
        for id in ids {
            let deleted = self.backend().delete(id).await;
            if let Err(source) = deleted {
                warn!(id, removed, error = %source, "clear-completed stopped");
                return Err(if removed == 0 {
                    StoreError::Write(source)
                } else {
                    StoreError::PartialClear { removed, source }
                });
            }
            self.tasks.retain(|t| t.id != id);
            removed += 1;
        }

        info!(removed, "cleared completed tasks");
        Ok(Outcome::Applied)
    }

    /// Activates `kind`, discarding the in-memory list and reloading it from
    /// the newly active backend.
    #[tracing::instrument(skip(self))]
    pub async fn switch_backend(&mut self, kind: BackendKind) -> Result<Outcome, StoreError> {
        if self.active == kind {
            return Ok(Outcome::Unchanged);
        }

        info!(from = %self.active, to = %kind, "switching backend");
        self.active = kind;
        self.tasks.clear();
        self.load_all().await
    }
}

#[cfg(test)]
mod tests {
    use super::Stats;
    use crate::task::Task;

    #[test]
    fn stats_count_completed_and_pending() {
        let mut done = Task::new_pending(2, "b");
        done.completed = true;
        let stats = Stats::of(&[Task::new_pending(1, "a"), done]);
        assert_eq!(
            stats,
            Stats {
                total: 2,
                completed: 1,
                pending: 1
            }
        );
    }
}
