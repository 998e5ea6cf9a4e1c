//! Refactoring phase: works the backlog of `RefactoringTask`s raised by
//! analysis, applying merges/cleanups or escalating to a human reviewer.

use crate::coordinator::polytope::Dim7;
use crate::domain::PipelineState;
use crate::errors::PipelineError;
use crate::phase_runner::RunState;
use crate::tools::builtin::is_resolving_tool;

use super::Phase;

pub struct RefactoringPhase;

impl Phase for RefactoringPhase {
    fn name(&self) -> &str {
        "refactoring"
    }

    fn dim7(&self) -> Dim7 {
        Dim7::new(0.5, 0.4, 0.6, 0.5, 0.3, 0.4, 0.5)
    }

    fn system_prompt(&self, _state: &PipelineState) -> String {
        "You are the refactoring agent. Resolve the assigned refactoring task: merge duplicate \
         implementations, clean up redundant files, or flag the task for developer review if it's \
         too risky to resolve autonomously. A task only counts as resolved once one of your resolving \
         tools succeeds."
            .to_string()
    }

    fn allowed_tools(&self, _state: &PipelineState) -> Vec<String> {
        vec![
            "read_file".into(),
            "list_directory".into(),
            "glob".into(),
            "grep".into(),
            "merge_file_implementations".into(),
            "cleanup_redundant_files".into(),
            "create_issue_report".into(),
            "request_developer_review".into(),
            "update_refactoring_task".into(),
        ]
    }

    fn select_or_create_task(&self, state: &mut PipelineState) -> Result<Option<String>, PipelineError> {
        // Sweep broken legacy refactoring tasks before picking one up.
        state.gc_broken_refactoring_tasks()?;

        let next = state
            .list_pending_refactoring_tasks()?
            .into_iter()
            .max_by(|a, b| a.priority.cmp(&b.priority).then(b.created_at.cmp(&a.created_at)))
            .map(|t| t.id.clone());

        if let Some(id) = &next {
            if let Some(mut task) = state.get_refactoring_task(id).cloned() {
                task.status = crate::domain::TaskStatus::InProgress;
                task.attempts += 1;
                state.update_refactoring_task(task)?;
            }
        }
        Ok(next)
    }

    fn on_tool_result(&self, state: &mut PipelineState, task_id: &str, tool_name: &str, _args: &serde_json::Value, success: bool) {
        if !success || !is_resolving_tool(tool_name) {
            return;
        }
        if let Some(mut task) = state.get_refactoring_task(task_id).cloned() {
            task.status = crate::domain::TaskStatus::Completed;
            task.updated_at = taskgraph::now_ms();
            let _ = state.update_refactoring_task(task);
        }
    }

    fn completion_predicate(&self, state: &PipelineState, run_state: &RunState) -> bool {
        // The task-resolution rule: only a successful resolving tool call
        // in this run closes the task out.
        if run_state.resolving_tool_succeeded {
            return true;
        }
        run_state
            .task_id
            .and_then(|id| state.get_refactoring_task(id))
            .map(|t| matches!(t.status, crate::domain::TaskStatus::Failed | crate::domain::TaskStatus::Blocked))
            .unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FixApproach, IssueType, Priority, RefactoringTask};
    use tempfile::tempdir;

    #[test]
    fn gc_runs_before_selection_and_pending_task_is_picked() {
        let dir = tempdir().unwrap();
        let mut state = PipelineState::load(dir.path()).unwrap();
        let good = RefactoringTask::new(
            "rt-1",
            "dedupe foo",
            "d",
            Priority::High,
            Some("a.rs".into()),
            IssueType::Duplicate,
            FixApproach::Autonomous,
            serde_json::json!({"x": 1}),
        );
        state.create_refactoring_task(good).unwrap();

        let phase = RefactoringPhase;
        let selected = phase.select_or_create_task(&mut state).unwrap();
        assert_eq!(selected, Some("rt-1".to_string()));
    }

    #[test]
    fn resolving_tool_success_satisfies_completion() {
        let dir = tempdir().unwrap();
        let state = PipelineState::load(dir.path()).unwrap();
        let phase = RefactoringPhase;
        let run_state = RunState { task_id: Some("rt-1"), iteration: 1, resolving_tool_succeeded: true, last_transition: None };
        assert!(phase.completion_predicate(&state, &run_state));
    }
}
