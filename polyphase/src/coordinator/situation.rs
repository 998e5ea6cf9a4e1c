//! Situation analysis (§4.8.1): derive a scoring-ready snapshot of "what's
//! going on" from the current pipeline state plus IPC mailbox hints.

use serde::{Deserialize, Serialize};

use crate::domain::PipelineState;
use crate::mailbox::IpcHint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ErrorSeverity {
    None,
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Complexity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Situation {
    pub has_errors: bool,
    pub error_severity: ErrorSeverity,
    pub complexity: Complexity,
    pub urgency: f64,
    pub pending_task_count: usize,
    pub recent_file_creations: usize,
    pub duplicate_patterns_detected: bool,
    pub ipc_hints: Vec<IpcHint>,
    /// Number of outer-loop iterations completed so far, used by the
    /// "every K=20 iterations force refactoring" rule.
    pub iterations_completed: u64,
}

/// How many of the most recent phase runs across every phase define the
/// recency window for counting file creations (§4.8.1's "recentFileCreations").
const RECENCY_WINDOW_RUNS: usize = 10;

/// Count `FileRecord`s created no earlier than the window's threshold -
/// the start time of the Nth-most-recent phase run across all phases, or
/// every file ever created if fewer than N runs have happened yet.
fn recent_file_creation_count(state: &PipelineState) -> usize {
    let mut run_starts: Vec<i64> = state.list_phase_records().flat_map(|p| p.runs.iter().map(|r| r.started_at)).collect();
    run_starts.sort_unstable_by(|a, b| b.cmp(a));
    let threshold = run_starts.get(RECENCY_WINDOW_RUNS - 1).copied().unwrap_or(i64::MIN);
    state.list_files().filter(|f| f.created >= threshold).count()
}

/// Derive a `Situation` from the current state. `ipc_hints` is supplied
/// separately by the coordinator, since reading mailboxes is I/O the
/// coordinator owns (§4.9).
pub fn analyse(state: &PipelineState, ipc_hints: Vec<IpcHint>) -> Situation {
    let unresolved_critical = state.list_unresolved_issues().map(|issues| issues.iter().any(|i| matches!(i.severity, crate::domain::Severity::Critical))).unwrap_or(false);
    let unresolved_count = state.list_unresolved_issues().map(|issues| issues.len()).unwrap_or(0);

    let error_severity = if unresolved_critical {
        ErrorSeverity::Critical
    } else if unresolved_count > 5 {
        ErrorSeverity::High
    } else if unresolved_count > 2 {
        ErrorSeverity::Medium
    } else if unresolved_count > 0 {
        ErrorSeverity::Low
    } else {
        ErrorSeverity::None
    };

    let pending_task_count = state.list_pending_tasks().map(|t| t.len()).unwrap_or(0);
    let pending_refactoring = state.list_pending_refactoring_tasks().map(|t| t.len()).unwrap_or(0);

    let complexity = if pending_task_count + pending_refactoring > 20 {
        Complexity::High
    } else if pending_task_count + pending_refactoring > 5 {
        Complexity::Medium
    } else {
        Complexity::Low
    };

    Situation {
        has_errors: error_severity != ErrorSeverity::None,
        error_severity,
        complexity,
        urgency: if unresolved_critical { 1.0 } else { 0.0 },
        pending_task_count,
        recent_file_creations: recent_file_creation_count(state),
        duplicate_patterns_detected: pending_refactoring > 0,
        ipc_hints,
        iterations_completed: state.phase_history().len() as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn empty_state_has_no_errors() {
        let dir = tempdir().unwrap();
        let state = PipelineState::load(dir.path()).unwrap();
        let situation = analyse(&state, Vec::new());
        assert!(!situation.has_errors);
        assert_eq!(situation.error_severity, ErrorSeverity::None);
        assert_eq!(situation.recent_file_creations, 0);
    }

    #[test]
    fn recent_file_creations_counts_files_with_no_runs_yet() {
        let dir = tempdir().unwrap();
        let mut state = PipelineState::load(dir.path()).unwrap();
        state.touch_file("a.rs", None);
        state.touch_file("b.rs", None);
        let situation = analyse(&state, Vec::new());
        assert_eq!(situation.recent_file_creations, 2);
    }

    #[test]
    fn recent_file_creations_excludes_files_older_than_the_window() {
        let dir = tempdir().unwrap();
        let mut state = PipelineState::load(dir.path()).unwrap();
        state.touch_file("old.rs", None);

        std::thread::sleep(std::time::Duration::from_millis(5));
        let threshold = taskgraph::now_ms();
        for i in 0..RECENCY_WINDOW_RUNS {
            state.record_phase_run("coding", threshold + i as i64, true, 0, 0, None);
        }

        std::thread::sleep(std::time::Duration::from_millis(5));
        state.touch_file("new.rs", None);
        let situation = analyse(&state, Vec::new());
        assert_eq!(situation.recent_file_creations, 1);
    }

    #[test]
    fn analyse_passes_through_supplied_ipc_hints() {
        use crate::mailbox::IpcHint;

        let dir = tempdir().unwrap();
        let state = PipelineState::load(dir.path()).unwrap();
        let hints = vec![IpcHint {
            next_phase: Some("qa".into()),
            files: vec![],
            reason: None,
            from_phase: "coding".into(),
        }];
        let situation = analyse(&state, hints.clone());
        assert_eq!(situation.ipc_hints, hints);
    }
}
