//! PhaseCoordinator (C8): the outer loop, situation analysis, and
//! polytopic phase selection.

pub mod metrics;
pub mod polytope;
mod selection;
mod situation;

pub use polytope::{Dim7, PolytopeState};
pub use selection::select;
pub use situation::{Situation, analyse};

use eyre::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use convostore::ThreadStore;

use crate::config::{PolyphaseConfig, ProjectPaths};
use crate::domain::{PipelineState, TaskStatus};
use crate::errors::PipelineError;
use crate::llm::LlmClient;
use crate::mailbox::{self, Mailbox};
use crate::phase_runner::{PhaseRunner, RunOutcome};
use crate::phases::PhaseRegistry;
use crate::tools::ToolExecutor;

/// Drives `PhaseCoordinator.run()` (§4.8): load state, pick a phase,
/// run it, merge mutations, save, repeat until terminated or the global
/// iteration budget is exhausted.
pub struct PhaseCoordinator {
    state: PipelineState,
    registry: PhaseRegistry,
    config: PolyphaseConfig,
    tools: ToolExecutor,
    thread_store: ThreadStore,
    mailbox_dir: PathBuf,
    project_root: PathBuf,
    cancel: tokio::sync::watch::Receiver<bool>,
}

impl PhaseCoordinator {
    /// Constructs the coordinator and discovers any custom tools dropped
    /// under the project's tools directory (§4.2's `discoverCustom(dir)`,
    /// run once at startup rather than mid-run).
    pub async fn new(state: PipelineState, registry: PhaseRegistry, config: PolyphaseConfig, project_root: impl Into<PathBuf>) -> Self {
        let project_root = project_root.into();
        let paths = ProjectPaths::new(project_root.clone());

        let mut tools = ToolExecutor::standard();
        let tools_dir = paths.tools_dir();
        if tools_dir.is_dir() {
            match tools.discover_custom(&tools_dir).await {
                Ok(count) if count > 0 => info!(count, dir = %tools_dir.display(), "discovered custom tools"),
                Ok(_) => {}
                Err(error) => warn!(%error, dir = %tools_dir.display(), "failed to discover custom tools"),
            }
        }

        let (_sender, cancel) = tokio::sync::watch::channel(false);

        Self {
            state,
            registry,
            config,
            tools,
            thread_store: ThreadStore::open(paths.threads_dir()),
            mailbox_dir: paths.mailboxes_dir(),
            project_root,
            cancel,
        }
    }

    /// Wire a cooperative cancel signal (§5: "cancellation is cooperative");
    /// the caller owns the paired `Sender` (e.g. a ctrl-c handler) and flips
    /// it to `true` to request a stop at the next suspension point.
    pub fn with_cancel_signal(mut self, cancel: tokio::sync::watch::Receiver<bool>) -> Self {
        self.cancel = cancel;
        self
    }

    fn cancel_requested(&self) -> bool {
        *self.cancel.borrow()
    }

    #[instrument(skip(self, llm))]
    pub async fn run(&mut self, llm: Arc<dyn LlmClient>) -> Result<CoordinatorOutcome, PipelineError> {
        let mut iterations = 0u32;
        let mut budget_reached = false;

        loop {
            if self.state.is_terminated() {
                info!("pipeline state reports terminated, stopping outer loop");
                break;
            }

            if self.cancel_requested() {
                info!("cancel signal received, saving state and stopping outer loop");
                self.state.save()?;
                return Err(PipelineError::Cancelled);
            }

            let phase_names = self.registry.names();
            let ipc_hints = self.collect_ipc_hints(&phase_names);
            let situation = situation::analyse(&self.state, ipc_hints);
            let current = self.state.last_phase();
            let next_phase = selection::select(&situation, &self.state, current.as_deref(), self.state.polytope());

            self.state.push_phase_history(next_phase.clone());

            let phase = self
                .registry
                .get(&next_phase)
                .ok_or_else(|| PipelineError::StateCorruption(format!("no phase registered for {}", next_phase)))?;

            let runner = PhaseRunner {
                llm: Arc::clone(&llm),
                tools: &self.tools,
                thread_store: &self.thread_store,
                mailbox_dir: self.mailbox_dir.clone(),
                project_root: self.project_root.clone(),
                cancel: self.cancel.clone(),
            };

            let started_at = taskgraph::now_ms();
            let files_before: std::collections::HashMap<String, (i64, i64)> = self.state.list_files().map(|f| (f.path.clone(), (f.created, f.modified))).collect();
            let outcome = runner.run(phase, &mut self.state, &self.config).await?;

            if matches!(outcome, RunOutcome::Cancelled { .. }) {
                info!(phase = %next_phase, "phase run cancelled mid-run, saving state and stopping outer loop");
                self.state.record_phase_run(&next_phase, started_at, false, 0, 0, Some("cancelled".to_string()));
                self.state.save()?;
                return Err(PipelineError::Cancelled);
            }

            let (files_created, files_modified) = self.count_file_changes(&files_before, started_at);

            let success = matches!(outcome, RunOutcome::Completed { .. });
            let error = match &outcome {
                RunOutcome::Error(msg) => Some(msg.clone()),
                RunOutcome::BudgetExhausted { .. } => Some("phase iteration budget exhausted".to_string()),
                _ => None,
            };
            self.state.record_phase_run(&next_phase, started_at, success, files_created, files_modified, error);

            if matches!(outcome, RunOutcome::Error(_)) {
                warn!(phase = %next_phase, "phase run reported an error, continuing outer loop");
            }

            if let Err(error) = mailbox::publish_all(&self.mailbox_dir, &phase_names) {
                warn!(%error, "failed to publish mailbox hints between phase runs");
            }

            self.state.save()?;

            iterations += 1;
            budget_reached = self.config.pipeline_iteration_budget.map(|b| iterations >= b).unwrap_or(false);
            if budget_reached || self.state.is_terminated() {
                break;
            }
        }

        Ok(self.summarise_outcome(budget_reached))
    }

    /// Read every registered phase's inbox (already fanned in by the
    /// previous iteration's `mailbox::publish_all`) into one hint list.
    fn collect_ipc_hints(&self, phase_names: &[String]) -> Vec<crate::mailbox::IpcHint> {
        phase_names
            .iter()
            .filter_map(|name| Mailbox::new(&self.mailbox_dir, name).read_hint().ok().flatten())
            .collect()
    }

    /// Diff `files_before` against the post-run state to count how many
    /// files this phase run created versus merely modified, for
    /// `PhaseRecord::record_run`'s `files_created`/`files_modified` (§4.8.3).
    fn count_file_changes(&self, files_before: &std::collections::HashMap<String, (i64, i64)>, started_at: i64) -> (u32, u32) {
        let mut created = 0u32;
        let mut modified = 0u32;
        for file in self.state.list_files() {
            match files_before.get(&file.path) {
                None => created += 1,
                Some((_, prev_modified)) if file.modified > *prev_modified && file.modified >= started_at => modified += 1,
                _ => {}
            }
        }
        (created, modified)
    }

    fn summarise_outcome(&self, budget_reached: bool) -> CoordinatorOutcome {
        let any_failed = self.state.list_all_tasks().any(|t| t.status == TaskStatus::Failed);
        let any_pending = self.state.list_all_tasks().any(|t| matches!(t.status, TaskStatus::Pending | TaskStatus::QaFailed | TaskStatus::InProgress));

        if budget_reached && any_pending {
            CoordinatorOutcome::BudgetExhausted
        } else if any_failed {
            CoordinatorOutcome::SomeFailed
        } else {
            CoordinatorOutcome::AllCompleted
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorOutcome {
    AllCompleted,
    SomeFailed,
    BudgetExhausted,
}

impl From<CoordinatorOutcome> for crate::errors::ExitCode {
    fn from(outcome: CoordinatorOutcome) -> Self {
        match outcome {
            CoordinatorOutcome::AllCompleted => crate::errors::ExitCode::AllCompleted,
            CoordinatorOutcome::SomeFailed => crate::errors::ExitCode::SomeFailed,
            CoordinatorOutcome::BudgetExhausted => crate::errors::ExitCode::BudgetExhausted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;
    use crate::phases::PhaseRegistry;
    use tempfile::tempdir;

    #[tokio::test]
    async fn pre_flagged_cancel_signal_stops_before_running_a_phase() {
        let dir = tempdir().unwrap();
        let state = PipelineState::load(dir.path().join("state")).unwrap();
        let (registry, polytope) = PhaseRegistry::standard();
        let mut state = state;
        state.set_polytope(polytope);

        let (cancel_tx, cancel_rx) = tokio::sync::watch::channel(false);
        cancel_tx.send(true).unwrap();

        let mut coordinator = PhaseCoordinator::new(state, registry, PolyphaseConfig::default(), dir.path().to_path_buf())
            .await
            .with_cancel_signal(cancel_rx);

        let llm = Arc::new(MockLlmClient::new(vec![]));
        let result = coordinator.run(llm).await;
        assert!(matches!(result, Err(PipelineError::Cancelled)));
    }
}
