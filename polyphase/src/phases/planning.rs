//! Planning phase: turns a backlog-less project into an initial set of
//! coding/documentation tasks. There's no `create_task` tool on the wire -
//! instead the agent writes its breakdown to a conventional file via the
//! ordinary `create_file` tool, and this phase turns that file into real
//! `Task` records once it lands.

use crate::coordinator::polytope::Dim7;
use crate::domain::{PipelineState, Priority, Task};
use crate::errors::PipelineError;
use crate::phase_runner::RunState;

use super::Phase;

pub struct PlanningPhase;

const PLAN_FILE: &str = "task_plan.json";

#[derive(serde::Deserialize)]
struct PlannedTask {
    title: String,
    description: String,
    #[serde(default = "default_priority")]
    priority: String,
    category: String,
    #[serde(default)]
    target_file: Option<String>,
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

impl Phase for PlanningPhase {
    fn name(&self) -> &str {
        "planning"
    }

    fn dim7(&self) -> Dim7 {
        Dim7::new(0.6, 0.3, 0.2, 0.9, 0.1, 0.5, 0.3)
    }

    fn system_prompt(&self, _state: &PipelineState) -> String {
        format!(
            "You are the planning agent. Break the remaining work down into concrete tasks and write \
             them as a JSON array to `{PLAN_FILE}` using create_file. Each entry needs title, \
             description, category (coding/debugging/documentation/refactoring), priority \
             (low/medium/high/critical), and target_file for any category that edits a specific file."
        )
    }

    fn allowed_tools(&self, _state: &PipelineState) -> Vec<String> {
        vec!["read_file".into(), "list_directory".into(), "glob".into(), "grep".into(), "create_file".into()]
    }

    fn select_or_create_task(&self, state: &mut PipelineState) -> Result<Option<String>, PipelineError> {
        // Planning only has work to do while the backlog is dry.
        if !state.list_pending_tasks()?.is_empty() {
            return Ok(None);
        }
        Ok(Some("planning-cycle".to_string()))
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
        let Ok(planned) = serde_json::from_str::<Vec<PlannedTask>>(content) else { return };

        for entry in planned {
            let task = Task::new(entry.title, entry.description, parse_priority(&entry.priority), entry.category, entry.target_file);
            // A malformed entry (e.g. a coding task with no target file) is
            // skipped rather than aborting the whole plan.
            let _ = state.create_task(task);
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
    fn has_work_only_when_backlog_is_empty() {
        let dir = tempdir().unwrap();
        let mut state = PipelineState::load(dir.path()).unwrap();
        let phase = PlanningPhase;
        assert_eq!(phase.select_or_create_task(&mut state).unwrap(), Some("planning-cycle".to_string()));

        let task = Task::new("t", "d", Priority::Low, "coding", Some("a.rs".into()));
        state.create_task(task).unwrap();
        assert_eq!(phase.select_or_create_task(&mut state).unwrap(), None);
    }

    #[test]
    fn plan_file_creation_seeds_real_tasks() {
        let dir = tempdir().unwrap();
        let mut state = PipelineState::load(dir.path()).unwrap();
        let phase = PlanningPhase;

        let content = serde_json::json!([
            {"title": "implement parser", "description": "d", "priority": "high", "category": "coding", "target_file": "parser.rs"},
            {"title": "write readme", "description": "d", "category": "documentation"}
        ])
        .to_string();

        phase.on_tool_result(
            &mut state,
            "planning-cycle",
            "create_file",
            &serde_json::json!({"path": "task_plan.json", "content": content}),
            true,
        );

        let pending = state.list_pending_tasks().unwrap();
        assert_eq!(pending.len(), 2);
    }
}
