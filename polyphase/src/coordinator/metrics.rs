//! A small metrics/summary surface over `PipelineState`, consumed by the
//! `metrics` CLI subcommand. Ambient observability, not a new feature of
//! the task graph itself.

use serde::Serialize;

use crate::domain::{PipelineState, TaskStatus};

#[derive(Debug, Clone, Serialize)]
pub struct PhaseSummary {
    pub name: String,
    pub experience_count: u32,
    pub awareness_level: f64,
    pub run_count: usize,
    pub success_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineSummary {
    pub run_id: String,
    pub version: u64,
    pub pending_tasks: usize,
    pub completed_tasks: usize,
    pub failed_tasks: usize,
    pub unresolved_issues: usize,
    pub phases: Vec<PhaseSummary>,
    pub iterations_completed: u64,
}

/// Build a point-in-time summary of pipeline health for `polyphase metrics`.
pub fn summarise(state: &PipelineState, phase_names: &[String]) -> PipelineSummary {
    let pending_tasks = state.list_pending_tasks().map(|t| t.len()).unwrap_or(0);
    let completed_tasks = state.list_all_tasks().filter(|t| t.status == TaskStatus::Completed).count();
    let failed_tasks = state.list_all_tasks().filter(|t| t.status == TaskStatus::Failed).count();
    let unresolved_issues = state.list_unresolved_issues().map(|i| i.len()).unwrap_or(0);

    let phases = phase_names
        .iter()
        .filter_map(|name| {
            state.phase_record(name).map(|record| PhaseSummary {
                name: record.name.clone(),
                experience_count: record.experience_count,
                awareness_level: record.awareness_level,
                run_count: record.runs.len(),
                success_count: record.runs.iter().filter(|r| r.success).count(),
            })
        })
        .collect();

    PipelineSummary {
        run_id: state.run_id().to_string(),
        version: state.version(),
        pending_tasks,
        completed_tasks,
        failed_tasks,
        unresolved_issues,
        phases,
        iterations_completed: state.phase_history().len() as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn summary_on_fresh_state_has_no_pending_work() {
        let dir = tempdir().unwrap();
        let state = PipelineState::load(dir.path()).unwrap();
        let summary = summarise(&state, &[]);
        assert_eq!(summary.pending_tasks, 0);
        assert!(summary.phases.is_empty());
    }

    #[test]
    fn summary_counts_completed_and_failed_tasks() {
        use crate::domain::{Priority, Task};

        let dir = tempdir().unwrap();
        let mut state = PipelineState::load(dir.path()).unwrap();

        let done = Task::new("done", "d", Priority::Low, "coding", Some("a.rs".into()));
        let done_id = done.id.clone();
        state.create_task(done).unwrap();
        state.start_task(&done_id).unwrap();
        state.complete_task(&done_id).unwrap();

        let mut failing = Task::new("failing", "d", Priority::Low, "coding", Some("b.rs".into()));
        failing.max_attempts = 1;
        let failing_id = failing.id.clone();
        state.create_task(failing).unwrap();
        state.start_task(&failing_id).unwrap();
        state.fail_task(&failing_id, "boom").unwrap();

        let summary = summarise(&state, &[]);
        assert_eq!(summary.completed_tasks, 1);
        assert_eq!(summary.failed_tasks, 1);
    }
}
