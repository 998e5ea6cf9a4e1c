//! Issue: reported by QA, consumed by debugging/refactoring selection.

use serde::{Deserialize, Serialize};
use taskgraph::{IndexValue, Record, now_ms};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub id: String,
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub file: Option<String>,
    pub resolved: bool,
    pub created_at: i64,
}

impl Issue {
    pub fn new(id: impl Into<String>, title: impl Into<String>, description: impl Into<String>, severity: Severity, file: Option<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: description.into(),
            severity,
            file,
            resolved: false,
            created_at: now_ms(),
        }
    }
}

impl Record for Issue {
    fn collection() -> &'static str {
        "issues"
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn index_fields(&self) -> Vec<(&'static str, IndexValue)> {
        vec![
            ("severity", IndexValue::Text(format!("{:?}", self.severity))),
            ("resolved", IndexValue::Bool(self.resolved)),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_issue_starts_unresolved() {
        let issue = Issue::new("issue-1", "title", "description", Severity::High, Some("src/lib.rs".to_string()));
        assert!(!issue.resolved);
        assert_eq!(issue.severity, Severity::High);
        assert_eq!(issue.file.as_deref(), Some("src/lib.rs"));
    }

    #[test]
    fn severity_ordering_runs_low_to_critical() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn index_fields_carry_severity_and_resolved() {
        let issue = Issue::new("issue-2", "t", "d", Severity::Critical, None);
        let fields = issue.index_fields();
        assert!(fields.contains(&("severity", IndexValue::Text("Critical".to_string()))));
        assert!(fields.contains(&("resolved", IndexValue::Bool(false))));
    }
}
