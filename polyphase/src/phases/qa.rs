//! QA phase: re-examines a completed task's target file, runs whatever
//! verification command is configured, and either marks the file verified
//! or bounces the task back to debugging via `create_issue_report`.

use crate::coordinator::polytope::Dim7;
use crate::domain::{Issue, PipelineState, Severity, TaskStatus, VerificationStatus};
use crate::errors::PipelineError;
use crate::phase_runner::RunState;

use super::Phase;

pub struct QaPhase;

impl Phase for QaPhase {
    fn name(&self) -> &str {
        "qa"
    }

    fn dim7(&self) -> Dim7 {
        Dim7::new(0.3, 0.4, 0.2, 0.3, 0.7, 0.5, 0.4)
    }

    fn system_prompt(&self, _state: &PipelineState) -> String {
        "You are the QA agent. Review the target file for the completed task below. Run the project's \
         test/check command if one is available. If it passes, you're done. If it fails, call \
         create_issue_report describing exactly what's wrong so debugging can act on it."
            .to_string()
    }

    fn allowed_tools(&self, _state: &PipelineState) -> Vec<String> {
        vec!["read_file".into(), "grep".into(), "run_command".into(), "create_issue_report".into()]
    }

    fn select_or_create_task(&self, state: &mut PipelineState) -> Result<Option<String>, PipelineError> {
        // A task is QA's to review once it's Completed and its target
        // file hasn't already been verified or failed review.
        let candidate = state
            .list_completed_unverified_tasks()?
            .into_iter()
            .next()
            .map(|t| t.id.clone());
        Ok(candidate)
    }

    fn on_tool_result(&self, state: &mut PipelineState, task_id: &str, tool_name: &str, args: &serde_json::Value, success: bool) {
        let Some(target) = state.get_task(task_id).and_then(|t| t.target_file.clone()) else {
            return;
        };

        match tool_name {
            "run_command" if success => {
                state.set_file_verification(&target, VerificationStatus::Verified);
            }
            "create_issue_report" if success => {
                state.set_file_verification(&target, VerificationStatus::Failed);
                let title = args.get("title").and_then(|v| v.as_str()).unwrap_or("QA found an issue");
                let description = args.get("description").and_then(|v| v.as_str()).unwrap_or("");
                let severity = match args.get("severity").and_then(|v| v.as_str()) {
                    Some("critical") => Severity::Critical,
                    Some("high") => Severity::High,
                    Some("low") => Severity::Low,
                    _ => Severity::Medium,
                };
                let issue = Issue::new(format!("issue-{task_id}"), title, description, severity, Some(target));
                let _ = state.create_issue(issue);
                let _ = state.mark_task_qa_failed(task_id, format!("{title}: {description}"));
            }
            _ => {}
        }
    }

    fn completion_predicate(&self, state: &PipelineState, run_state: &RunState) -> bool {
        run_state
            .task_id
            .and_then(|id| state.get_task(id))
            .map(|t| matches!(t.status, TaskStatus::QaFailed) || state.get_file(t.target_file.as_deref().unwrap_or_default()).map(|f| f.verification_status != VerificationStatus::Unverified).unwrap_or(false))
            .unwrap_or(true)
    }
}
