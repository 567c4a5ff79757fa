use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::warn;

pub type TaskId = u64;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: TaskId,

    pub text: String,

    #[serde(default)]
    pub completed: bool,
}

impl Task {
    pub fn new_pending(id: TaskId, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            completed: false,
        }
    }

    /// Applies every field present in `patch` and returns the patch that
    /// would undo it.
    pub fn apply(&mut self, patch: &TaskPatch) -> TaskPatch {
        let mut undo = TaskPatch::default();
        if let Some(text) = &patch.text {
            undo.text = Some(std::mem::replace(&mut self.text, text.clone()));
        }
        if let Some(completed) = patch.completed {
            undo.completed = Some(std::mem::replace(&mut self.completed, completed));
        }
        undo
    }
}

/// Partial update; only the fields that are `Some` are changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub text: Option<String>,
    pub completed: Option<bool>,
}

impl TaskPatch {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            completed: None,
        }
    }

    pub fn completed(completed: bool) -> Self {
        Self {
            text: None,
            completed: Some(completed),
        }
    }
}

/// Trims user input and returns `None` when nothing is left.
pub fn normalize_text(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Keeps the first task for every id, preserving order.
pub fn dedupe_ids(tasks: Vec<Task>) -> Vec<Task> {
    let mut seen = HashSet::with_capacity(tasks.len());
    let before = tasks.len();
    let out: Vec<Task> = tasks.into_iter().filter(|t| seen.insert(t.id)).collect();
    if out.len() != before {
        warn!(dropped = before - out.len(), "dropped tasks with duplicate ids");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{Task, TaskPatch, dedupe_ids, normalize_text};

    #[test]
    fn apply_returns_inverse_patch() {
        let mut task = Task::new_pending(1, "buy milk");
        let undo = task.apply(&TaskPatch::completed(true));
        assert!(task.completed);
        assert_eq!(undo, TaskPatch::completed(false));

        task.apply(&undo);
        assert!(!task.completed);
        assert_eq!(task.text, "buy milk");
    }

    #[test]
    fn persisted_layout_is_id_text_completed() {
        let task = Task::new_pending(7, "write report");
        let json = serde_json::to_value(&task).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({"id": 7, "text": "write report", "completed": false})
        );
    }

    #[test]
    fn dedupe_keeps_first_occurrence() {
        let tasks = vec![
            Task::new_pending(1, "first"),
            Task::new_pending(2, "other"),
            Task::new_pending(1, "second"),
        ];
        let out = dedupe_ids(tasks);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].text, "first");
        assert_eq!(out[1].id, 2);
    }

    #[test]
    fn normalize_rejects_blank_input() {
        assert_eq!(normalize_text("   "), None);
        assert_eq!(normalize_text(""), None);
        assert_eq!(normalize_text("  a b  ").as_deref(), Some("a b"));
    }
}
