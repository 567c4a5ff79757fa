use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;

use crate::task::Task;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterMode {
    #[default]
    All,
    Active,
    Completed,
}

impl FilterMode {
    pub fn matches(self, task: &Task) -> bool {
        match self {
            FilterMode::All => true,
            FilterMode::Active => !task.completed,
            FilterMode::Completed => task.completed,
        }
    }
}

impl fmt::Display for FilterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FilterMode::All => "all",
            FilterMode::Active => "active",
            FilterMode::Completed => "completed",
        };
        f.write_str(name)
    }
}

impl FromStr for FilterMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(FilterMode::All),
            "active" | "pending" => Ok(FilterMode::Active),
            "completed" | "done" => Ok(FilterMode::Completed),
            other => Err(anyhow!(
                "unknown filter: {other} (expected all, active or completed)"
            )),
        }
    }
}

/// Ordered subsequence of `tasks` visible under `mode`.
pub fn filter_view(tasks: &[Task], mode: FilterMode) -> Vec<Task> {
    tasks
        .iter()
        .filter(|task| mode.matches(task))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{FilterMode, filter_view};
    use crate::task::Task;

    fn sample() -> Vec<Task> {
        let mut out = Vec::new();
        for (id, completed) in [(5, false), (4, true), (3, false), (2, true), (1, true)] {
            let mut task = Task::new_pending(id, format!("task {id}"));
            task.completed = completed;
            out.push(task);
        }
        out
    }

    fn is_subsequence(sub: &[Task], of: &[Task]) -> bool {
        let mut rest = of.iter();
        sub.iter().all(|needle| rest.any(|t| t == needle))
    }

    #[test]
    fn all_is_identity() {
        let tasks = sample();
        assert_eq!(filter_view(&tasks, FilterMode::All), tasks);
    }

    #[test]
    fn active_and_completed_partition_in_order() {
        let tasks = sample();
        let active = filter_view(&tasks, FilterMode::Active);
        let completed = filter_view(&tasks, FilterMode::Completed);

        assert_eq!(active.iter().map(|t| t.id).collect::<Vec<_>>(), vec![5, 3]);
        assert_eq!(completed.iter().map(|t| t.id).collect::<Vec<_>>(), vec![4, 2, 1]);
        assert!(is_subsequence(&active, &tasks));
        assert!(is_subsequence(&completed, &tasks));
        assert_eq!(active.len() + completed.len(), tasks.len());
        assert!(active.iter().all(|t| !completed.contains(t)));
    }

    #[test]
    fn partition_holds_for_every_completion_pattern() {
        for bits in 0u8..32 {
            let tasks: Vec<Task> = (0..5u64)
                .map(|i| {
                    let mut t = Task::new_pending(i, "t");
                    t.completed = bits & (1 << i) != 0;
                    t
                })
                .collect();
            let active = filter_view(&tasks, FilterMode::Active);
            let completed = filter_view(&tasks, FilterMode::Completed);
            assert!(is_subsequence(&active, &tasks));
            assert!(is_subsequence(&completed, &tasks));
            assert_eq!(active.len() + completed.len(), tasks.len());
        }
    }

    #[test]
    fn parses_modes() {
        assert_eq!("Active".parse::<FilterMode>().unwrap(), FilterMode::Active);
        assert_eq!("completed".parse::<FilterMode>().unwrap(), FilterMode::Completed);
        assert!("someday".parse::<FilterMode>().is_err());
        assert_eq!(FilterMode::default().to_string(), "all");
    }
}
