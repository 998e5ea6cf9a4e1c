//! Debugging phase: picks up tasks QA bounced back and tasks explicitly
//! categorised as bugs, and fixes them against their target file.

use crate::coordinator::polytope::Dim7;
use crate::domain::{PipelineState, TaskStatus};
use crate::errors::PipelineError;
use crate::phase_runner::RunState;

use super::Phase;

pub struct DebuggingPhase;

const MUTATING_TOOLS: &[&str] = &["modify_file", "full_file_rewrite", "create_file"];

impl Phase for DebuggingPhase {
    fn name(&self) -> &str {
        "debugging"
    }

    fn dim7(&self) -> Dim7 {
        Dim7::new(0.4, 0.5, 0.3, 0.4, 0.9, 0.6, 0.3)
    }

    fn system_prompt(&self, _state: &PipelineState) -> String {
        "You are the debugging agent. A QA pass flagged a problem with this task - find the root cause \
         in its target file and fix it. Read the file and any QA error history before editing."
            .to_string()
    }

    fn allowed_tools(&self, _state: &PipelineState) -> Vec<String> {
        vec![
            "read_file".into(),
            "list_directory".into(),
            "glob".into(),
            "grep".into(),
            "modify_file".into(),
            "full_file_rewrite".into(),
            "run_command".into(),
        ]
    }

    fn select_or_create_task(&self, state: &mut PipelineState) -> Result<Option<String>, PipelineError> {
        let from_qa = state.list_qa_failed_tasks()?.into_iter().map(|t| t.id.clone());
        let from_backlog = state.list_pending_tasks()?.into_iter().filter(|t| t.category == "debugging").map(|t| t.id.clone());
        let candidate = from_qa.chain(from_backlog).next();

        if let Some(id) = &candidate {
            state.start_task(id)?;
        }
        Ok(candidate)
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
