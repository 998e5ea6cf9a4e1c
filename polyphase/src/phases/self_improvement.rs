//! Self-improvement phase: a read-only pass over each phase's run history
//! that records a learned pattern when a phase is failing often enough to
//! be worth flagging. Never touches the target project.

use crate::coordinator::polytope::Dim7;
use crate::domain::{PipelineState, Pattern};
use crate::errors::PipelineError;
use crate::phase_runner::RunState;
use crate::tools::ToolProfile;

use super::Phase;

pub struct SelfImprovementPhase;

/// A phase with at least this many runs and a failure rate at or above
/// this threshold gets a pattern recorded against it.
const MIN_RUNS_TO_JUDGE: usize = 3;
const FAILURE_RATE_THRESHOLD: f64 = 0.5;

impl Phase for SelfImprovementPhase {
    fn name(&self) -> &str {
        "self_improvement"
    }

    fn dim7(&self) -> Dim7 {
        Dim7::new(0.9, 0.1, 0.1, 0.6, 0.5, 0.8, 0.2)
    }

    fn system_prompt(&self, _state: &PipelineState) -> String {
        "You are the self-improvement agent. Review recent phase run history and note any recurring \
         failure pattern worth acting on in a future planning cycle. You have no write access; this \
         pass is observational."
            .to_string()
    }

    fn allowed_tools(&self, _state: &PipelineState) -> Vec<String> {
        vec!["read_file".into(), "list_directory".into(), "grep".into()]
    }

    fn tool_profile(&self) -> ToolProfile {
        ToolProfile::ReadOnly
    }

    fn select_or_create_task(&self, state: &mut PipelineState) -> Result<Option<String>, PipelineError> {
        let struggling: Vec<String> = state
            .list_phase_records()
            .filter(|r| {
                let runs = r.runs.len();
                if runs < MIN_RUNS_TO_JUDGE {
                    return false;
                }
                let failures = r.runs.iter().filter(|run| !run.success).count();
                (failures as f64 / runs as f64) >= FAILURE_RATE_THRESHOLD
            })
            .map(|r| r.name.clone())
            .collect();

        for name in &struggling {
            state.record_pattern(
                name.clone(),
                Pattern {
                    timestamp: taskgraph::now_ms(),
                    description: format!("{name} is failing at or above {:.0}% over its recent runs", FAILURE_RATE_THRESHOLD * 100.0),
                    confidence: 0.6,
                },
            );
        }

        if struggling.is_empty() {
            return Ok(None);
        }
        Ok(Some("self-improvement-cycle".to_string()))
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
    fn flags_a_phase_with_a_high_failure_rate() {
        let dir = tempdir().unwrap();
        let mut state = PipelineState::load(dir.path()).unwrap();
        for success in [false, false, true] {
            state.record_phase_run("coding", 0, success, 0, 0, None);
        }

        let phase = SelfImprovementPhase;
        let selected = phase.select_or_create_task(&mut state).unwrap();
        assert_eq!(selected, Some("self-improvement-cycle".to_string()));
    }

    #[test]
    fn leaves_healthy_phases_alone() {
        let dir = tempdir().unwrap();
        let mut state = PipelineState::load(dir.path()).unwrap();
        for _ in 0..5 {
            state.record_phase_run("coding", 0, true, 1, 0, None);
        }

        let phase = SelfImprovementPhase;
        assert_eq!(phase.select_or_create_task(&mut state).unwrap(), None);
    }
}
