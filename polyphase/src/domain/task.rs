//! Task (C2): the generic unit of work in the task graph.

use serde::{Deserialize, Serialize};
use taskgraph::{IndexValue, Record, now_ms};

fn generate_id(prefix: &str) -> String {
    format!("{prefix}-{}-{:04x}", now_ms(), std::process::id() & 0xffff)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    /// `maxAttempts = {CRITICAL:5, HIGH:4, MEDIUM:3, LOW:2}` (§4.2).
    pub fn max_attempts(&self) -> u32 {
        match self {
            Priority::Critical => 5,
            Priority::High => 4,
            Priority::Medium => 3,
            Priority::Low => 2,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Medium => write!(f, "medium"),
            Priority::High => write!(f, "high"),
            Priority::Critical => write!(f, "critical"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
    QaFailed,
    Blocked,
}

impl TaskStatus {
    /// Which statuses this one may transition into.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Pending, InProgress)
                | (InProgress, Completed)
                | (InProgress, Failed)
                | (InProgress, QaFailed)
                | (InProgress, Blocked)
                | (QaFailed, InProgress)
                | (Blocked, InProgress)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub category: String,
    pub target_file: Option<String>,
    pub status: TaskStatus,
    pub attempts: u32,
    pub max_attempts: u32,
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub analysis_data: serde_json::Value,
    #[serde(default)]
    pub error_history: Vec<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Categories whose tasks must carry a `target_file` to be created at all (§3.1).
const FILE_REQUIRED_CATEGORIES: &[&str] = &["coding", "debugging", "refactoring"];

impl Task {
    pub fn new(title: impl Into<String>, description: impl Into<String>, priority: Priority, category: impl Into<String>, target_file: Option<String>) -> Self {
        let now = now_ms();
        Self {
            id: generate_id("task"),
            title: title.into(),
            description: description.into(),
            priority,
            category: category.into(),
            target_file,
            status: TaskStatus::Pending,
            attempts: 0,
            max_attempts: priority.max_attempts(),
            dependencies: Vec::new(),
            analysis_data: serde_json::Value::Null,
            error_history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether this task would be rejected at creation per §3.1's
    /// "empty targetFile and category requiring a file" rule.
    pub fn is_missing_required_file(&self) -> bool {
        FILE_REQUIRED_CATEGORIES.contains(&self.category.as_str()) && self.target_file.as_deref().unwrap_or("").is_empty()
    }

    pub fn start(&mut self) {
        self.status = TaskStatus::InProgress;
        self.attempts += 1;
        self.updated_at = now_ms();
    }

    pub fn complete(&mut self) {
        self.status = TaskStatus::Completed;
        self.updated_at = now_ms();
    }

    /// Exceeding `maxAttempts` is terminal - `Failed` and never
    /// silently flipped back to `Completed`.
    pub fn fail(&mut self, reason: impl Into<String>) {
        self.error_history.push(reason.into());
        self.status = if self.attempts >= self.max_attempts { TaskStatus::Failed } else { TaskStatus::Pending };
        self.updated_at = now_ms();
    }

    pub fn mark_qa_failed(&mut self, issues: impl Into<String>) {
        self.error_history.push(issues.into());
        self.status = TaskStatus::QaFailed;
        self.updated_at = now_ms();
    }

    pub fn mark_blocked(&mut self, reason: impl Into<String>) {
        self.error_history.push(reason.into());
        self.status = TaskStatus::Blocked;
        self.updated_at = now_ms();
    }
}

impl Record for Task {
    fn collection() -> &'static str {
        "tasks"
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn index_fields(&self) -> Vec<(&'static str, IndexValue)> {
        vec![
            ("status", IndexValue::Text(format!("{:?}", self.status))),
            ("priority", IndexValue::Text(format!("{:?}", self.priority))),
            ("category", IndexValue::Text(self.category.clone())),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_orders_low_to_critical() {
        assert!(Priority::Low < Priority::Medium);
        assert!(Priority::Medium < Priority::High);
        assert!(Priority::High < Priority::Critical);
    }

    #[test]
    fn new_task_seeds_max_attempts_from_priority() {
        let task = Task::new("fix bug", "desc", Priority::Critical, "debugging", Some("a.rs".into()));
        assert_eq!(task.max_attempts, 5);
    }

    #[test]
    fn coding_task_without_target_file_is_rejected() {
        let task = Task::new("do work", "desc", Priority::Medium, "coding", None);
        assert!(task.is_missing_required_file());
    }

    #[test]
    fn documentation_task_without_target_file_is_allowed() {
        let task = Task::new("write docs", "desc", Priority::Low, "documentation", None);
        assert!(!task.is_missing_required_file());
    }

    #[test]
    fn fail_below_max_attempts_returns_to_pending() {
        let mut task = Task::new("t", "d", Priority::Low, "coding", Some("a.rs".into()));
        task.start();
        task.fail("boom");
        assert_eq!(task.status, TaskStatus::Pending);
    }

    #[test]
    fn fail_at_max_attempts_becomes_failed_and_stays_failed() {
        let mut task = Task::new("t", "d", Priority::Low, "coding", Some("a.rs".into()));
        for _ in 0..task.max_attempts {
            task.start();
            task.fail("boom");
        }
        assert_eq!(task.status, TaskStatus::Failed);
    }

    #[test]
    fn status_transition_rules_match_invariant_i2() {
        assert!(TaskStatus::Pending.can_transition_to(TaskStatus::InProgress));
        assert!(TaskStatus::QaFailed.can_transition_to(TaskStatus::InProgress));
        assert!(TaskStatus::Blocked.can_transition_to(TaskStatus::InProgress));
        assert!(!TaskStatus::Completed.can_transition_to(TaskStatus::InProgress));
        assert!(!TaskStatus::Pending.can_transition_to(TaskStatus::Completed));
    }
}
