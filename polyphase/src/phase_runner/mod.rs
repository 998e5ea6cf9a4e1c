//! PhaseRunner (C7): the generic per-phase conversational sub-loop shared
//! by every phase implementation. Prompt -> LLM -> parse -> dispatch ->
//! verify -> update, bounded by an iteration budget, instrumented with
//! loop detection and progress tracking.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use convostore::ThreadStore;

use crate::config::PolyphaseConfig;
use crate::conversation::ConversationManager;
use crate::domain::PipelineState;
use crate::errors::PipelineError;
use crate::llm::{LlmClient, parse_tool_calls};
use crate::loopdetect::{ActionFingerprint, ErrorSignature, LoopDetector, ProgressTracker};
use crate::mailbox::Mailbox;
use crate::phases::Phase;
use crate::tools::builtin::{MUTATING_TOOLS, is_resolving_tool};
use crate::tools::{ToolContext, ToolExecutor};
use crate::verifier::{self, VerificationOutcome};

/// Token budget for a phase's conversation, per §4.5's `trim(tokenBudget)`.
const DEFAULT_TOKEN_BUDGET: usize = 32_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The selected task (if any) reached a phase-specific completion state.
    Completed { task_id: Option<String> },
    /// The iteration budget B was exhausted with no completion.
    BudgetExhausted { task_id: Option<String> },
    /// Nothing to do - the phase found no task to select or create.
    NoTask,
    /// A non-fatal error occurred mid-run (fed back as a task failure,
    /// not propagated - see `errors.rs`'s propagation policy).
    Error(String),
    /// A cooperative cancel signal was observed at a suspension point (§5).
    Cancelled { task_id: Option<String> },
}

/// What a phase's `completion_predicate` inspects each iteration.
pub struct RunState<'a> {
    pub task_id: Option<&'a str>,
    pub iteration: u32,
    pub resolving_tool_succeeded: bool,
    pub last_transition: Option<crate::loopdetect::Transition>,
}

/// Two consecutive assistant turns with no tool calls ends the iteration
/// early per §4.7's "allow one thinking turn" rule.
const MAX_CONSECUTIVE_THINKING_TURNS: u32 = 2;

pub struct PhaseRunner<'a> {
    pub llm: Arc<dyn LlmClient>,
    pub tools: &'a ToolExecutor,
    pub thread_store: &'a ThreadStore,
    pub mailbox_dir: std::path::PathBuf,
    pub project_root: std::path::PathBuf,
    pub cancel: tokio::sync::watch::Receiver<bool>,
}

impl<'a> PhaseRunner<'a> {
    #[instrument(skip(self, phase, state, config), fields(phase = phase.name()))]
    pub async fn run(&self, phase: &dyn Phase, state: &mut PipelineState, config: &PolyphaseConfig) -> Result<RunOutcome, PipelineError> {
        let task_id = match phase.select_or_create_task(state)? {
            Some(id) => id,
            None => return Ok(RunOutcome::NoTask),
        };

        let run_id = uuid::Uuid::new_v4().to_string();
        let ctx = ToolContext::new(self.project_root.clone(), run_id);
        let thread_id = format!("{}-{}", phase.name(), task_id);

        let mut conversation = ConversationManager::new_for_phase(self.thread_store, &thread_id, phase.name(), &phase.system_prompt(state))?;

        let mailbox = Mailbox::new(&self.mailbox_dir, phase.name());
        if let Ok(Some(hint)) = mailbox.read_hint() {
            if let Some(reason) = &hint.reason {
                conversation.append_user(format!("[mailbox hint from {}] {}", hint.from_phase, reason));
            }
        }

        let tool_names = phase.allowed_tools(state);
        let tool_defs = self.tools.definitions_for(&tool_names, phase.tool_profile());

        let mut loop_detector = LoopDetector::new();
        let mut progress_tracker = ProgressTracker::new();
        let mut resolving_tool_succeeded = false;
        let mut consecutive_thinking_turns = 0u32;

        for iteration in 1..=config.phase_iteration_budget {
            if *self.cancel.borrow() {
                conversation.snapshot(self.thread_store)?;
                return Ok(RunOutcome::Cancelled { task_id: Some(task_id) });
            }

            let run_state = RunState {
                task_id: Some(&task_id),
                iteration,
                resolving_tool_succeeded,
                last_transition: None,
            };
            if phase.completion_predicate(state, &run_state) {
                conversation.snapshot(self.thread_store)?;
                self.maybe_run_runtime_test(phase.name(), state, &task_id, config).await;
                return Ok(RunOutcome::Completed { task_id: Some(task_id) });
            }

            let user_msg = build_user_message(phase, state, &task_id, iteration);
            conversation.append_user(user_msg);
            conversation.trim(DEFAULT_TOKEN_BUDGET);

            if *self.cancel.borrow() {
                conversation.snapshot(self.thread_store)?;
                return Ok(RunOutcome::Cancelled { task_id: Some(task_id) });
            }

            let request = conversation.to_completion_request(tool_defs.clone(), config.llm.max_tokens);
            let response = self.llm.complete(request).await?;

            let tool_calls = parse_tool_calls(&response);
            conversation.append_assistant(response.content.clone(), tool_calls.clone());

            if tool_calls.is_empty() {
                consecutive_thinking_turns += 1;
                if consecutive_thinking_turns >= MAX_CONSECUTIVE_THINKING_TURNS {
                    warn!(phase = phase.name(), task = %task_id, "two consecutive turns with no tool calls, failing iteration");
                    continue;
                }
                continue;
            }
            consecutive_thinking_turns = 0;

            let mut current_errors = Vec::new();

            for call in &tool_calls {
                if *self.cancel.borrow() {
                    conversation.snapshot(self.thread_store)?;
                    return Ok(RunOutcome::Cancelled { task_id: Some(task_id) });
                }

                let before = call
                    .input
                    .get("path")
                    .and_then(Value::as_str)
                    .map(|path| std::fs::read_to_string(self.project_root.join(path)).unwrap_or_default());

                let result = self.tools.execute(call, &ctx).await;

                if !result.is_error && MUTATING_TOOLS.contains(&call.name.as_str()) {
                    if let Some(path) = call.input.get("path").and_then(Value::as_str) {
                        self.verify_mutation(state, &task_id, path, &call.name, &call.input, before.unwrap_or_default());
                    }
                }

                if !result.is_error && is_resolving_tool(&call.name) {
                    resolving_tool_succeeded = true;
                }

                phase.on_tool_result(state, &task_id, &call.name, &call.input, !result.is_error);

                if result.is_error {
                    current_errors.push(ErrorSignature::new(call.name.clone(), result.content.clone(), task_id.clone(), 0));
                }

                conversation.append_tool_result(call.id.clone(), result.content.clone(), result.is_error);
                loop_detector.record(ActionFingerprint::new(phase.name(), &call.name, &call.input));
            }
            conversation.snapshot(self.thread_store)?;

            let transition = progress_tracker.observe(current_errors);
            loop_detector.note_progress(transition.is_progress());
            debug!(?transition, "progress tracker transition");

            if let Some(report) = loop_detector.check() {
                warn!(?report, phase = phase.name(), task = %task_id, "loop detector raised a report");
            }

            if loop_detector.stuck_without_progress() {
                let guidance = guidance_message(phase.name());
                conversation.append_user(guidance);
                conversation.snapshot(self.thread_store)?;
            }
        }

        info!(phase = phase.name(), task = %task_id, "phase iteration budget exhausted");
        // §4.10: budget exhaustion fails the current task; the run still
        // returns with whatever state mutations already landed. Phases
        // whose task lives outside the generic Task store (e.g.
        // refactoring) manage their own failure bookkeeping, so a missing
        // task here is not itself an error.
        let _ = state.fail_task(&task_id, "phase iteration budget exhausted");
        Ok(RunOutcome::BudgetExhausted { task_id: Some(task_id) })
    }

    /// Re-derive what the tool intended to land on disk from its own
    /// arguments, then check that against what's actually there (§4.4).
    /// `move_file`/`rename_file`/`delete_file` have no content to classify
    /// as wrap-vs-replace and are skipped. A verifier violation marks the
    /// task QA_FAILED rather than being silently accepted (§4.10).
    fn verify_mutation(&self, state: &mut PipelineState, task_id: &str, path: &str, tool_name: &str, args: &Value, before: String) {
        let intended = match tool_name {
            "create_file" | "full_file_rewrite" => args.get("content").and_then(Value::as_str).map(str::to_string),
            "modify_file" => {
                let find = args.get("find").and_then(Value::as_str);
                let replace = args.get("replace").and_then(Value::as_str).unwrap_or("");
                let replace_all = args.get("replace_all").and_then(Value::as_bool).unwrap_or(false);
                find.map(|find| if replace_all { before.replace(find, replace) } else { before.replacen(find, replace, 1) })
            }
            _ => None,
        };

        let Some(intended) = intended else {
            state.touch_file(path, None);
            return;
        };

        let full_path = self.project_root.join(path);
        let Ok(written) = std::fs::read_to_string(&full_path) else {
            return;
        };

        let outcome = verifier::verify_mutation(&before, &intended, &written);
        match outcome {
            VerificationOutcome::Ok { .. } => state.touch_file(path, None),
            other => {
                warn!(path, tool_name, ?other, "verifier flagged a mutation");
                let _ = state.mark_task_qa_failed(task_id, format!("verifier rejected {tool_name} on {path}: {other:?}"));
            }
        }
    }

    /// §6: after coding/debugging completes, run the configured
    /// runtime-test command if one is set, and fold a failure straight
    /// back into the task rather than waiting for a future QA pass.
    async fn maybe_run_runtime_test(&self, phase_name: &str, state: &mut PipelineState, task_id: &str, config: &PolyphaseConfig) {
        if !matches!(phase_name, "coding" | "debugging") {
            return;
        }
        let Some(command) = &config.runtime_test_command else { return };
        let spec = crate::runtime_test::RuntimeTestSpec::new(command.clone(), config.runtime_test_log_file.clone());

        match crate::runtime_test::run(&spec, &self.project_root).await {
            Ok(outcome) if outcome.passed => {
                if let Some(task) = state.get_task(task_id) {
                    if let Some(path) = task.target_file.clone() {
                        state.set_file_verification(&path, crate::domain::VerificationStatus::Verified);
                    }
                }
            }
            Ok(outcome) => {
                warn!(phase = phase_name, task = %task_id, "runtime test failed after phase completion");
                let _ = state.mark_task_qa_failed(task_id, format!("runtime test failed:\n{}", outcome.output_tail));
            }
            Err(e) => {
                warn!(phase = phase_name, task = %task_id, error = %e, "failed to run runtime test command");
            }
        }
    }
}

/// Build the per-iteration user message (§4.7: "build_user_message(task,
/// state, ipc_read_doc)"). Kept deliberately short - phase-specific prompt
/// wording is out of scope (§9's Open Question resolution #1).
fn build_user_message(phase: &dyn Phase, state: &PipelineState, task_id: &str, iteration: u32) -> String {
    let task_desc = state.get_task(task_id).map(|t| t.description.clone()).unwrap_or_else(|| "(task not in the generic task graph - see phase-specific records)".to_string());
    format!("[{} iteration {}] current task: {}", phase.name(), iteration, task_desc)
}

fn guidance_message(phase_name: &str) -> String {
    format!(
        "The last several tool calls in this {phase_name} run look repetitive and haven't resolved the problem. \
         Try a different approach: re-read the affected file before retrying, or consult a different angle on the bug \
         rather than repeating the same call."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::polytope::Dim7;
    use crate::llm::{CompletionResponse, MockLlmClient, StopReason, TokenUsage, ToolCall};
    use crate::tools::ToolProfile;
    use tempfile::tempdir;

    struct StubPhase;

    impl Phase for StubPhase {
        fn name(&self) -> &str {
            "stub"
        }
        fn dim7(&self) -> Dim7 {
            Dim7::zero()
        }
        fn system_prompt(&self, _state: &PipelineState) -> String {
            "you are a stub phase".to_string()
        }
        fn allowed_tools(&self, _state: &PipelineState) -> Vec<String> {
            vec!["read_file".to_string()]
        }
        fn tool_profile(&self) -> ToolProfile {
            ToolProfile::ReadOnly
        }
        fn select_or_create_task(&self, state: &mut PipelineState) -> Result<Option<String>, PipelineError> {
            let task = crate::domain::Task::new("t", "a stub task", crate::domain::Priority::Low, "documentation", None);
            let id = task.id.clone();
            state.create_task(task)?;
            Ok(Some(id))
        }
        fn completion_predicate(&self, state: &PipelineState, run_state: &RunState) -> bool {
            run_state.task_id.and_then(|id| state.get_task(id)).map(|t| t.status == crate::domain::TaskStatus::Completed).unwrap_or(false)
        }
    }

    #[tokio::test]
    async fn runs_until_budget_exhausted_with_no_tool_calls() {
        let dir = tempdir().unwrap();
        let mut state = PipelineState::load(dir.path().join("state")).unwrap();
        let thread_store = ThreadStore::open(dir.path().join("threads"));
        let tools = ToolExecutor::standard();

        let responses: Vec<_> = (0..10)
            .map(|_| CompletionResponse {
                content: Some("thinking...".to_string()),
                tool_calls: vec![],
                stop_reason: StopReason::EndTurn,
                usage: TokenUsage::default(),
            })
            .collect();
        let llm = Arc::new(MockLlmClient::new(responses));

        let (_cancel_tx, cancel_rx) = tokio::sync::watch::channel(false);
        let runner = PhaseRunner {
            llm,
            tools: &tools,
            thread_store: &thread_store,
            mailbox_dir: dir.path().join("mailboxes"),
            project_root: dir.path().to_path_buf(),
            cancel: cancel_rx,
        };

        let config = PolyphaseConfig {
            phase_iteration_budget: 3,
            ..Default::default()
        };

        let outcome = runner.run(&StubPhase, &mut state, &config).await.unwrap();
        assert!(matches!(outcome, RunOutcome::BudgetExhausted { .. }));
    }

    #[tokio::test]
    async fn dispatches_a_tool_call_and_records_its_fingerprint() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hello").unwrap();
        let mut state = PipelineState::load(dir.path().join("state")).unwrap();
        let thread_store = ThreadStore::open(dir.path().join("threads"));
        let tools = ToolExecutor::standard();

        let response = CompletionResponse {
            content: None,
            tool_calls: vec![ToolCall {
                id: "call-1".into(),
                name: "read_file".into(),
                input: serde_json::json!({"path": "a.txt"}),
            }],
            stop_reason: StopReason::ToolUse,
            usage: TokenUsage::default(),
        };
        let llm = Arc::new(MockLlmClient::new(vec![response]));

        let (_cancel_tx, cancel_rx) = tokio::sync::watch::channel(false);
        let runner = PhaseRunner {
            llm,
            tools: &tools,
            thread_store: &thread_store,
            mailbox_dir: dir.path().join("mailboxes"),
            project_root: dir.path().to_path_buf(),
            cancel: cancel_rx,
        };

        let config = PolyphaseConfig {
            phase_iteration_budget: 1,
            ..Default::default()
        };

        let outcome = runner.run(&StubPhase, &mut state, &config).await.unwrap();
        assert!(matches!(outcome, RunOutcome::BudgetExhausted { .. }));
    }

    #[tokio::test]
    async fn cancel_signal_stops_the_run_with_cancelled_outcome() {
        let dir = tempdir().unwrap();
        let mut state = PipelineState::load(dir.path().join("state")).unwrap();
        let thread_store = ThreadStore::open(dir.path().join("threads"));
        let tools = ToolExecutor::standard();

        let responses: Vec<_> = (0..10)
            .map(|_| CompletionResponse {
                content: Some("thinking...".to_string()),
                tool_calls: vec![],
                stop_reason: StopReason::EndTurn,
                usage: TokenUsage::default(),
            })
            .collect();
        let llm = Arc::new(MockLlmClient::new(responses));

        let (cancel_tx, cancel_rx) = tokio::sync::watch::channel(false);
        cancel_tx.send(true).unwrap();

        let runner = PhaseRunner {
            llm,
            tools: &tools,
            thread_store: &thread_store,
            mailbox_dir: dir.path().join("mailboxes"),
            project_root: dir.path().to_path_buf(),
            cancel: cancel_rx,
        };

        let config = PolyphaseConfig {
            phase_iteration_budget: 3,
            ..Default::default()
        };

        let outcome = runner.run(&StubPhase, &mut state, &config).await.unwrap();
        assert!(matches!(outcome, RunOutcome::Cancelled { .. }));
    }
}
