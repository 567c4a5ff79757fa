use thiserror::Error;

use crate::task::TaskId;

/// Failure reported by a storage backend.
///
/// Transport errors, non-2xx statuses and undecodable payloads are not told
/// apart by callers; they are kept separate here only for logging.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server responded with status {0}")]
    Status(reqwest::StatusCode),

    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("task {0} is not stored in this backend")]
    Missing(TaskId),

    #[error("server assigned id {0} which is already in the list")]
    DuplicateId(TaskId),
}

/// Why an intent was ignored before touching any backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("task text is empty")]
    EmptyText,

    #[error("no task with id {0}")]
    UnknownTask(TaskId),
}

/// Result signal of a task store operation.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to load tasks: {0}")]
    Read(#[source] StorageError),

    #[error("failed to save change: {0}")]
    Write(#[source] StorageError),

    #[error("{0}")]
    Validation(#[from] Rejection),

    #[error("cleared {removed} completed task(s) before failing: {source}")]
    PartialClear {
        removed: usize,
        #[source]
        source: StorageError,
    },
}

impl StoreError {
    pub fn is_validation(&self) -> bool {
        matches!(self, StoreError::Validation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::{Rejection, StorageError, StoreError};

    #[test]
    fn messages_name_the_failure() {
        let err = StoreError::from(Rejection::UnknownTask(4));
        assert_eq!(err.to_string(), "no task with id 4");
        assert!(err.is_validation());

        let err = StoreError::Write(StorageError::Missing(9));
        assert_eq!(
            err.to_string(),
            "failed to save change: task 9 is not stored in this backend"
        );
        assert!(!err.is_validation());
    }
}
