//! RefactoringTask (§3.1/§3.3): a Task specialisation carrying the
//! analysis payload that justifies the refactor, plus the "broken
//! legacy task" garbage-collection rule.

use serde::{Deserialize, Serialize};
use taskgraph::{IndexValue, Record, now_ms};

use super::task::{Priority, TaskStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    Duplicate,
    DeadCode,
    IntegrationConflict,
    Antipattern,
    Complexity,
    Naming,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixApproach {
    Autonomous,
    ReviewReport,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefactoringTask {
    pub id: String,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub target_file: Option<String>,
    pub status: TaskStatus,
    pub attempts: u32,
    pub max_attempts: u32,
    #[serde(default)]
    pub error_history: Vec<String>,
    pub issue_type: IssueType,
    pub fix_approach: FixApproach,
    pub analysis_data: serde_json::Value,
    pub created_at: i64,
    pub updated_at: i64,
}

impl RefactoringTask {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        priority: Priority,
        target_file: Option<String>,
        issue_type: IssueType,
        fix_approach: FixApproach,
        analysis_data: serde_json::Value,
    ) -> Self {
        let now = now_ms();
        Self {
            id: id.into(),
            title: title.into(),
            description: description.into(),
            priority,
            target_file,
            status: TaskStatus::Pending,
            attempts: 0,
            max_attempts: priority.max_attempts(),
            error_history: Vec::new(),
            issue_type,
            fix_approach,
            analysis_data,
            created_at: now,
            updated_at: now,
        }
    }

    /// analysisData empty, or title containing the literal
    /// "Unknown", marks a task as a broken legacy artifact to be
    /// garbage-collected on phase entry.
    pub fn is_broken(&self) -> bool {
        self.analysis_data.is_null() || self.title.contains("Unknown")
    }
}

impl Record for RefactoringTask {
    fn collection() -> &'static str {
        "refactoring_tasks"
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn index_fields(&self) -> Vec<(&'static str, IndexValue)> {
        vec![
            ("status", IndexValue::Text(format!("{:?}", self.status))),
            ("issue_type", IndexValue::Text(format!("{:?}", self.issue_type))),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(title: &str, analysis_data: serde_json::Value) -> RefactoringTask {
        RefactoringTask::new(
            "rt-1",
            title,
            "desc",
            Priority::Medium,
            Some("a.rs".into()),
            IssueType::DeadCode,
            FixApproach::Autonomous,
            analysis_data,
        )
    }

    #[test]
    fn empty_analysis_data_is_broken() {
        let task = sample("dead code in a.rs", serde_json::Value::Null);
        assert!(task.is_broken());
    }

    #[test]
    fn title_with_unknown_literal_is_broken() {
        let task = sample("Unknown issue", serde_json::json!({"lines": [1, 2]}));
        assert!(task.is_broken());
    }

    #[test]
    fn well_formed_task_is_not_broken() {
        let task = sample("dead code in a.rs", serde_json::json!({"lines": [1, 2]}));
        assert!(!task.is_broken());
    }
}
