//! Coding phase: implements the next pending coding task against its
//! target file.

use crate::coordinator::polytope::Dim7;
use crate::domain::{PipelineState, TaskStatus};
use crate::errors::PipelineError;
use crate::phase_runner::RunState;

use super::Phase;

pub struct CodingPhase;

const MUTATING_TOOLS: &[&str] = &["create_file", "modify_file", "full_file_rewrite"];

impl Phase for CodingPhase {
    fn name(&self) -> &str {
        "coding"
    }

    fn dim7(&self) -> Dim7 {
        Dim7::new(0.3, 0.9, 0.4, 0.3, 0.2, 0.2, 0.3)
    }

    fn system_prompt(&self, _state: &PipelineState) -> String {
        "You are the coding agent. Implement the assigned task fully, editing only its target file unless \
         a dependency genuinely requires touching another. Read a file before modifying it."
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
            "run_command".into(),
        ]
    }

    fn select_or_create_task(&self, state: &mut PipelineState) -> Result<Option<String>, PipelineError> {
        let pending = state.list_pending_tasks()?;
        let next = pending
            .into_iter()
            .filter(|t| t.category == "coding")
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
    fn selects_highest_priority_coding_task() {
        let dir = tempdir().unwrap();
        let mut state = PipelineState::load(dir.path()).unwrap();
        let low = Task::new("low", "d", Priority::Low, "coding", Some("a.rs".into()));
        let high = Task::new("high", "d", Priority::Critical, "coding", Some("b.rs".into()));
        state.create_task(low).unwrap();
        state.create_task(high.clone()).unwrap();

        let phase = CodingPhase;
        let selected = phase.select_or_create_task(&mut state).unwrap();
        assert_eq!(selected, Some(high.id));
    }

    #[test]
    fn successful_mutation_completes_the_task() {
        let dir = tempdir().unwrap();
        let mut state = PipelineState::load(dir.path()).unwrap();
        let task = Task::new("t", "d", Priority::Low, "coding", Some("a.rs".into()));
        let id = task.id.clone();
        state.create_task(task).unwrap();
        state.start_task(&id).unwrap();

        let phase = CodingPhase;
        phase.on_tool_result(&mut state, &id, "create_file", &serde_json::json!({}), true);
        assert_eq!(state.get_task(&id).unwrap().status, TaskStatus::Completed);
    }
}
