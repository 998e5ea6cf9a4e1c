//! Project-planning phase: the coarser-grained sibling of planning - it
//! runs on a longer cadence, looking at the whole tree rather than the
//! current backlog, and can seed refactoring work as well as ordinary
//! tasks.

use crate::coordinator::polytope::Dim7;
use crate::domain::{FixApproach, IssueType, PipelineState, Priority, RefactoringTask, Task};
use crate::errors::PipelineError;
use crate::phase_runner::RunState;

use super::Phase;

pub struct ProjectPlanningPhase;

const PLAN_FILE: &str = "project_plan.json";

#[derive(serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum PlannedItem {
    Task {
        title: String,
        description: String,
        #[serde(default = "default_priority")]
        priority: String,
        category: String,
        #[serde(default)]
        target_file: Option<String>,
    },
    Refactor {
        title: String,
        description: String,
        #[serde(default = "default_priority")]
        priority: String,
        target_file: String,
        issue_type: String,
        #[serde(default)]
        analysis_data: serde_json::Value,
    },
}

fn default_priority() -> String {
    "medium".to_string()
}

fn parse_priority(s: &str) -> Priority {
    match s.to_ascii_lowercase().as_str() {
        "critical" => Priority::Critical,
        "high" => Priority::High,
        "low" => Priority::Low,
        _ => Priority::Medium,
    }
}

fn parse_issue_type(s: &str) -> IssueType {
    match s.to_ascii_lowercase().as_str() {
        "dead_code" => IssueType::DeadCode,
        "integration_conflict" => IssueType::IntegrationConflict,
        "antipattern" => IssueType::Antipattern,
        "complexity" => IssueType::Complexity,
        "naming" => IssueType::Naming,
        _ => IssueType::Duplicate,
    }
}

impl Phase for ProjectPlanningPhase {
    fn name(&self) -> &str {
        "project_planning"
    }

    fn dim7(&self) -> Dim7 {
        Dim7::new(0.8, 0.3, 0.3, 0.9, 0.2, 0.7, 0.7)
    }

    fn system_prompt(&self, _state: &PipelineState) -> String {
        format!(
            "You are the project-planning agent. Survey the whole project, not just the open backlog, \
             and write a JSON array of initiatives to `{PLAN_FILE}` via create_file. Each item is tagged \
             kind:\"task\" (title, description, category, priority, target_file) or \
             kind:\"refactor\" (title, description, priority, target_file, issue_type, analysis_data)."
        )
    }

    fn allowed_tools(&self, _state: &PipelineState) -> Vec<String> {
        vec!["read_file".into(), "list_directory".into(), "glob".into(), "grep".into(), "create_file".into()]
    }

    fn select_or_create_task(&self, state: &mut PipelineState) -> Result<Option<String>, PipelineError> {
        let no_backlog = state.list_pending_tasks()?.is_empty() && state.list_pending_refactoring_tasks()?.is_empty();
        if !no_backlog {
            return Ok(None);
        }
        Ok(Some("project-planning-cycle".to_string()))
    }

    fn on_tool_result(&self, state: &mut PipelineState, _task_id: &str, tool_name: &str, args: &serde_json::Value, success: bool) {
        if tool_name != "create_file" || !success {
            return;
        }
        let Some(path) = args.get("path").and_then(|v| v.as_str()) else { return };
        if !path.ends_with(PLAN_FILE) {
            return;
        }
        let Some(content) = args.get("content").and_then(|v| v.as_str()) else { return };
        let Ok(items) = serde_json::from_str::<Vec<PlannedItem>>(content) else { return };

        for item in items {
            match item {
                PlannedItem::Task { title, description, priority, category, target_file } => {
                    let task = Task::new(title, description, parse_priority(&priority), category, target_file);
                    let _ = state.create_task(task);
                }
                PlannedItem::Refactor { title, description, priority, target_file, issue_type, analysis_data } => {
                    let id = format!("rt-{}", taskgraph::now_ms());
                    let task = RefactoringTask::new(
                        id,
                        title,
                        description,
                        parse_priority(&priority),
                        Some(target_file),
                        parse_issue_type(&issue_type),
                        FixApproach::Autonomous,
                        analysis_data,
                    );
                    let _ = state.create_refactoring_task(task);
                }
            }
        }
    }

    fn completion_predicate(&self, _state: &PipelineState, run_state: &RunState) -> bool {
        run_state.iteration > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn seeds_both_tasks_and_refactoring_tasks() {
        let dir = tempdir().unwrap();
        let mut state = PipelineState::load(dir.path()).unwrap();
        let phase = ProjectPlanningPhase;

        let content = serde_json::json!([
            {"kind": "task", "title": "add retries", "description": "d", "category": "coding", "target_file": "client.rs"},
            {"kind": "refactor", "title": "dedupe http clients", "description": "d", "target_file": "client.rs", "issue_type": "duplicate", "analysis_data": {"n": 2}}
        ])
        .to_string();

        phase.on_tool_result(
            &mut state,
            "project-planning-cycle",
            "create_file",
            &serde_json::json!({"path": "project_plan.json", "content": content}),
            true,
        );

        assert_eq!(state.list_pending_tasks().unwrap().len(), 1);
        assert_eq!(state.list_pending_refactoring_tasks().unwrap().len(), 1);
    }
}
