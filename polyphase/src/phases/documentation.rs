//! Documentation phase: writes or updates docs. Unlike coding/debugging a
//! target file isn't required, so a task can cover README-level work too.

use crate::coordinator::polytope::Dim7;
use crate::domain::{PipelineState, TaskStatus};
use crate::errors::PipelineError;
use crate::phase_runner::RunState;

use super::Phase;

pub struct DocumentationPhase;

const MUTATING_TOOLS: &[&str] = &["create_file", "modify_file", "full_file_rewrite"];

impl Phase for DocumentationPhase {
    fn name(&self) -> &str {
        "documentation"
    }

    fn dim7(&self) -> Dim7 {
        Dim7::new(0.2, 0.6, 0.2, 0.2, 0.1, 0.2, 0.6)
    }

    fn system_prompt(&self, _state: &PipelineState) -> String {
        "You are the documentation agent. Write or update documentation for the assigned task. \
         Prefer accuracy over completeness - read the code you're documenting before describing it."
            .to_string()
    }

    fn allowed_tools(&self, _state: &PipelineState) -> Vec<String> {
        vec![
            "read_file".into(),
            "list_directory".into(),
            "glob".into(),
            "grep".into(),
            "create_file".into(),
            "modify_file".into(),
            "full_file_rewrite".into(),
        ]
    }

    fn select_or_create_task(&self, state: &mut PipelineState) -> Result<Option<String>, PipelineError> {
        let next = state
            .list_pending_tasks()?
            .into_iter()
            .filter(|t| t.category == "documentation")
            .max_by(|a, b| a.priority.cmp(&b.priority).then(b.created_at.cmp(&a.created_at)))
            .map(|t| t.id.clone());
        if let Some(id) = &next {
            state.start_task(id)?;
        }
        Ok(next)
    }

    fn on_tool_result(&self, state: &mut PipelineState, task_id: &str, tool_name: &str, _args: &serde_json::Value, success: bool) {
        if !success || !MUTATING_TOOLS.contains(&tool_name) {
            return;
        }
        if state.get_task(task_id).is_some() {
            let _ = state.complete_task(task_id);
        }
    }

    fn completion_predicate(&self, state: &PipelineState, run_state: &RunState) -> bool {
        run_state
            .task_id
            .and_then(|id| state.get_task(id))
            .map(|t| matches!(t.status, TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Blocked))
            .unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Priority, Task};
    use tempfile::tempdir;

    #[test]
    fn selects_documentation_task_without_target_file() {
        let dir = tempdir().unwrap();
        let mut state = PipelineState::load(dir.path()).unwrap();
        let task = Task::new("write readme", "d", Priority::Medium, "documentation", None);
        let id = task.id.clone();
        state.create_task(task).unwrap();

        let phase = DocumentationPhase;
        let selected = phase.select_or_create_task(&mut state).unwrap();
        assert_eq!(selected, Some(id));
    }
}
