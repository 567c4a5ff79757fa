pub mod local;
pub mod remote;

use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use async_trait::async_trait;

use crate::error::StorageError;
use crate::task::{Task, TaskId, TaskPatch};

pub use local::LocalBackend;
pub use remote::{RemoteBackend, RemoteConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Local,
    Remote,
}

impl BackendKind {
    pub fn label(self) -> &'static str {
        match self {
            BackendKind::Local => "Local Storage",
            BackendKind::Remote => "API Storage",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Local => f.write_str("local"),
            BackendKind::Remote => f.write_str("remote"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(BackendKind::Local),
            "remote" | "api" => Ok(BackendKind::Remote),
            other => Err(anyhow!("unknown backend: {other} (expected local or remote)")),
        }
    }
}

/// Persistence strategy behind the task store.
///
/// Implementations report failures without touching the caller's list; the
/// store decides whether to apply or roll back.
#[async_trait]
pub trait StorageBackend: Send {
    /// Current view of every stored task, newest first.
    async fn load(&mut self) -> Result<Vec<Task>, StorageError>;

    /// Persists a new task and returns it with its backend-assigned id.
    async fn create(&mut self, text: &str) -> Result<Task, StorageError>;

    async fn update(&mut self, id: TaskId, patch: &TaskPatch) -> Result<(), StorageError>;

    async fn delete(&mut self, id: TaskId) -> Result<(), StorageError>;
}
