//! Investigation phase: read-only root-cause analysis for issues that
//! don't have an obvious fix yet. Resolves by filing a clearer issue
//! report, never by editing files.

use crate::coordinator::polytope::Dim7;
use crate::domain::{Issue, PipelineState, Severity};
use crate::errors::PipelineError;
use crate::phase_runner::RunState;
use crate::tools::ToolProfile;

use super::Phase;

pub struct InvestigationPhase;

impl Phase for InvestigationPhase {
    fn name(&self) -> &str {
        "investigation"
    }

    fn dim7(&self) -> Dim7 {
        Dim7::new(0.2, 0.2, 0.3, 0.8, 0.4, 0.3, 0.2)
    }

    fn system_prompt(&self, _state: &PipelineState) -> String {
        "You are the investigation agent. Trace the reported problem to its root cause by reading \
         code and searching the project - do not edit anything. Conclude with create_issue_report \
         describing what you found and where."
            .to_string()
    }

    fn allowed_tools(&self, _state: &PipelineState) -> Vec<String> {
        vec!["read_file".into(), "list_directory".into(), "glob".into(), "grep".into(), "create_issue_report".into()]
    }

    fn tool_profile(&self) -> ToolProfile {
        // Full, not ReadOnly: `create_issue_report` isn't in the read-only
        // allow-list even though it has no file-system effect, and this
        // phase's only non-reporting tools are already read-only above.
        ToolProfile::Full
    }

    fn select_or_create_task(&self, state: &mut PipelineState) -> Result<Option<String>, PipelineError> {
        let next = state
            .list_unresolved_issues()?
            .into_iter()
            .find(|issue| issue.severity >= Severity::Medium)
            .map(|issue| issue.id.clone());
        Ok(next)
    }

    fn on_tool_result(&self, state: &mut PipelineState, task_id: &str, tool_name: &str, args: &serde_json::Value, success: bool) {
        if tool_name != "create_issue_report" || !success {
            return;
        }
        let title = args.get("title").and_then(|v| v.as_str()).unwrap_or("investigation finding");
        let description = args.get("description").and_then(|v| v.as_str()).unwrap_or("");
        let severity = match args.get("severity").and_then(|v| v.as_str()) {
            Some("critical") => Severity::Critical,
            Some("high") => Severity::High,
            Some("low") => Severity::Low,
            _ => Severity::Medium,
        };
        let issue = Issue::new(format!("investigation-{task_id}"), title, description, severity, None);
        let _ = state.create_issue(issue);
        let _ = state.resolve_issue(task_id);
    }

    fn completion_predicate(&self, _state: &PipelineState, run_state: &RunState) -> bool {
        run_state.resolving_tool_succeeded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn selects_unresolved_issue_at_or_above_medium_severity() {
        let dir = tempdir().unwrap();
        let mut state = PipelineState::load(dir.path()).unwrap();
        let low = Issue::new("low-1", "minor", "d", Severity::Low, None);
        let high = Issue::new("high-1", "root cause unclear", "d", Severity::High, None);
        state.create_issue(low).unwrap();
        state.create_issue(high).unwrap();

        let phase = InvestigationPhase;
        let selected = phase.select_or_create_task(&mut state).unwrap();
        assert_eq!(selected, Some("high-1".to_string()));
    }

    #[test]
    fn create_issue_report_resolves_the_original_issue() {
        let dir = tempdir().unwrap();
        let mut state = PipelineState::load(dir.path()).unwrap();
        let issue = Issue::new("high-1", "root cause unclear", "d", Severity::High, None);
        state.create_issue(issue).unwrap();

        let phase = InvestigationPhase;
        phase.on_tool_result(
            &mut state,
            "high-1",
            "create_issue_report",
            &serde_json::json!({"title": "found it", "description": "null deref in parser"}),
            true,
        );

        assert!(state.list_unresolved_issues().unwrap().iter().all(|i| i.id != "high-1"));
    }
}
