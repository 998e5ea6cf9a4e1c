//! PipelineState: the aggregate root document persisted by StateStore
//! (§3.1, §4.1). Each map-valued field is its own `taskgraph::Store<T>`
//! collection opened from the same `.pipeline` directory; the remaining
//! scalar/append-only fields (`runId`, `phaseHistory`, `performanceMetrics`,
//! `learnedPatterns`, `correlations`, `polytope`) live in a single-record
//! `PipelineRootRecord` so the whole document still gets one atomic,
//! versioned save through the same `Store` machinery the collections use.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use taskgraph::{Filter, IndexValue, Record, Store, now_ms};

use crate::coordinator::polytope::{Dim7, PolytopeState};
use crate::errors::PipelineError;

use super::file_record::FileRecord;
use super::issue::Issue;
use super::metrics::{Correlation, Pattern, Sample};
use super::phase_record::PhaseRecord;
use super::refactoring_task::RefactoringTask;
use super::task::{Priority, Task, TaskStatus};

const ROOT_ID: &str = "root";
const MAX_PHASE_HISTORY: usize = 1000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRootRecord {
    pub id: String,
    pub run_id: String,
    #[serde(default)]
    pub phase_history: Vec<String>,
    #[serde(default)]
    pub performance_metrics: HashMap<String, Vec<Sample>>,
    #[serde(default)]
    pub learned_patterns: HashMap<String, Vec<Pattern>>,
    #[serde(default)]
    pub correlations: Vec<Correlation>,
    #[serde(default)]
    pub polytope: PolytopeState,
    pub terminated: bool,
    pub updated_at: i64,
}

impl PipelineRootRecord {
    fn fresh() -> Self {
        Self {
            id: ROOT_ID.to_string(),
            run_id: uuid::Uuid::new_v4().to_string(),
            phase_history: Vec::new(),
            performance_metrics: HashMap::new(),
            learned_patterns: HashMap::new(),
            correlations: Vec::new(),
            polytope: PolytopeState::new(),
            terminated: false,
            updated_at: now_ms(),
        }
    }
}

impl Record for PipelineRootRecord {
    fn collection() -> &'static str {
        "pipeline_root"
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn index_fields(&self) -> Vec<(&'static str, IndexValue)> {
        Vec::new()
    }
}

/// The whole persisted pipeline document, assembled from several
/// `taskgraph::Store` collections that all live in the same directory.
pub struct PipelineState {
    dir: PathBuf,
    root: Store<PipelineRootRecord>,
    tasks: Store<Task>,
    files: Store<FileRecord>,
    phases: Store<PhaseRecord>,
    refactoring_tasks: Store<RefactoringTask>,
    issues: Store<Issue>,
}

impl PipelineState {
    /// `load()` (§4.1): reads the canonical document, or returns an
    /// initial state with `version=0` if absent.
    pub fn load(dir: impl Into<PathBuf>) -> Result<Self, PipelineError> {
        let dir = dir.into();
        let mut root = Store::<PipelineRootRecord>::open(&dir)?;
        if root.get(ROOT_ID).is_none() {
            root.put(PipelineRootRecord::fresh())?;
        }

        Ok(Self {
            tasks: Store::open(&dir)?,
            files: Store::open(&dir)?,
            phases: Store::open(&dir)?,
            refactoring_tasks: Store::open(&dir)?,
            issues: Store::open(&dir)?,
            root,
            dir,
        })
    }

    fn root_record(&self) -> &PipelineRootRecord {
        self.root.get(ROOT_ID).expect("root record seeded on load")
    }

    pub fn version(&self) -> u64 {
        self.root.version()
    }

    pub fn run_id(&self) -> &str {
        &self.root_record().run_id
    }

    pub fn is_terminated(&self) -> bool {
        self.root_record().terminated
    }

    pub fn terminate(&mut self) {
        let mut record = self.root_record().clone();
        record.terminated = true;
        record.updated_at = now_ms();
        self.root.put(record).expect("in-memory put cannot fail");
    }

    pub fn polytope(&self) -> &PolytopeState {
        &self.root_record().polytope
    }

    pub fn set_polytope(&mut self, polytope: PolytopeState) {
        let mut record = self.root_record().clone();
        record.polytope = polytope;
        record.updated_at = now_ms();
        self.root.put(record).expect("in-memory put cannot fail");
    }

    pub fn last_phase(&self) -> Option<String> {
        self.root_record().phase_history.last().cloned()
    }

    pub fn phase_history(&self) -> &[String] {
        &self.root_record().phase_history
    }

    /// Only append when the phase actually re-enters (i.e. differs
    /// from the last entry), bounded to the last N=1000.
    pub fn push_phase_history(&mut self, phase: String) {
        let mut record = self.root_record().clone();
        if record.phase_history.last() != Some(&phase) {
            record.phase_history.push(phase);
            if record.phase_history.len() > MAX_PHASE_HISTORY {
                let excess = record.phase_history.len() - MAX_PHASE_HISTORY;
                record.phase_history.drain(0..excess);
            }
        }
        record.updated_at = now_ms();
        self.root.put(record).expect("in-memory put cannot fail");
    }

    pub fn record_sample(&mut self, key: impl Into<String>, sample: Sample) {
        let mut record = self.root_record().clone();
        record.performance_metrics.entry(key.into()).or_default().push(sample);
        record.updated_at = now_ms();
        self.root.put(record).expect("in-memory put cannot fail");
    }

    pub fn record_pattern(&mut self, key: impl Into<String>, pattern: Pattern) {
        let mut record = self.root_record().clone();
        record.learned_patterns.entry(key.into()).or_default().push(pattern);
        record.updated_at = now_ms();
        self.root.put(record).expect("in-memory put cannot fail");
    }

    pub fn record_correlation(&mut self, correlation: Correlation) {
        let mut record = self.root_record().clone();
        record.correlations.push(correlation);
        record.updated_at = now_ms();
        self.root.put(record).expect("in-memory put cannot fail");
    }

    // ---- TaskGraph (C2) operations over `tasks` ----

    /// `create(Task)` - rejects id collisions, broken tasks, and tasks
    /// missing a required `targetFile`.
    pub fn create_task(&mut self, task: Task) -> Result<(), PipelineError> {
        if self.tasks.get(&task.id).is_some() {
            return Err(PipelineError::StateCorruption(format!("task id collision: {}", task.id)));
        }
        if task.is_missing_required_file() {
            return Err(PipelineError::StateCorruption(format!("task {} requires a targetFile", task.id)));
        }
        self.tasks.put(task)?;
        Ok(())
    }

    pub fn get_task(&self, id: &str) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn list_all_tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.all()
    }

    /// The task currently being worked (at most one, since exactly one
    /// `PhaseRunner` is ever active); ties broken by most recently started.
    pub fn current_in_progress_task(&self) -> Option<&Task> {
        self.tasks.all().filter(|t| t.status == TaskStatus::InProgress).max_by_key(|t| t.updated_at)
    }

    pub fn list_pending_tasks(&self) -> Result<Vec<&Task>, PipelineError> {
        Ok(self.tasks.list(&[Filter::eq("status", format!("{:?}", TaskStatus::Pending))])?)
    }

    pub fn list_qa_failed_tasks(&self) -> Result<Vec<&Task>, PipelineError> {
        Ok(self.tasks.list(&[Filter::eq("status", format!("{:?}", TaskStatus::QaFailed))])?)
    }

    /// Completed tasks whose target file (if any) hasn't been through a
    /// QA pass yet. Tasks with no target file are immediately eligible.
    pub fn list_completed_unverified_tasks(&self) -> Result<Vec<&Task>, PipelineError> {
        let completed = self.tasks.list(&[Filter::eq("status", format!("{:?}", TaskStatus::Completed))])?;
        Ok(completed
            .into_iter()
            .filter(|t| match &t.target_file {
                Some(path) => self
                    .get_file(path)
                    .map(|f| f.verification_status == super::file_record::VerificationStatus::Unverified)
                    .unwrap_or(true),
                None => true,
            })
            .collect())
    }

    /// `selectNext(priorityPolicy)` - highest priority pending task, ties
    /// broken by oldest `createdAt`.
    pub fn select_next_task(&self) -> Result<Option<&Task>, PipelineError> {
        let mut pending = self.list_pending_tasks()?;
        pending.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.created_at.cmp(&b.created_at)));
        Ok(pending.into_iter().next())
    }

    pub fn start_task(&mut self, id: &str) -> Result<(), PipelineError> {
        let mut task = self.tasks.get(id).cloned().ok_or_else(|| PipelineError::StateCorruption(format!("no such task: {id}")))?;
        task.start();
        self.tasks.put(task)?;
        Ok(())
    }

    pub fn complete_task(&mut self, id: &str) -> Result<(), PipelineError> {
        let mut task = self.tasks.get(id).cloned().ok_or_else(|| PipelineError::StateCorruption(format!("no such task: {id}")))?;
        let target = task.target_file.clone();
        task.complete();
        self.tasks.put(task)?;
        if let Some(path) = target {
            self.touch_file(&path, Some(id));
        }
        Ok(())
    }

    pub fn fail_task(&mut self, id: &str, reason: impl Into<String>) -> Result<(), PipelineError> {
        let mut task = self.tasks.get(id).cloned().ok_or_else(|| PipelineError::StateCorruption(format!("no such task: {id}")))?;
        task.fail(reason);
        self.tasks.put(task)?;
        Ok(())
    }

    pub fn mark_task_qa_failed(&mut self, id: &str, issues: impl Into<String>) -> Result<(), PipelineError> {
        let mut task = self.tasks.get(id).cloned().ok_or_else(|| PipelineError::StateCorruption(format!("no such task: {id}")))?;
        task.mark_qa_failed(issues);
        self.tasks.put(task)?;
        Ok(())
    }

    pub fn mark_task_blocked(&mut self, id: &str, reason: impl Into<String>) -> Result<(), PipelineError> {
        let mut task = self.tasks.get(id).cloned().ok_or_else(|| PipelineError::StateCorruption(format!("no such task: {id}")))?;
        task.mark_blocked(reason);
        self.tasks.put(task)?;
        Ok(())
    }

    /// `delete(id)` - only for broken/legacy refactoring tasks and
    /// completed tasks at GC time; callers are responsible for checking
    /// the precondition before calling this.
    pub fn delete_task(&mut self, id: &str) -> Result<Option<Task>, PipelineError> {
        Ok(self.tasks.remove(id)?)
    }

    // ---- RefactoringTask operations ----

    pub fn create_refactoring_task(&mut self, task: RefactoringTask) -> Result<(), PipelineError> {
        if task.is_broken() {
            return Err(PipelineError::StateCorruption(format!("refactoring task {} is broken at creation", task.id)));
        }
        self.refactoring_tasks.put(task)?;
        Ok(())
    }

    pub fn get_refactoring_task(&self, id: &str) -> Option<&RefactoringTask> {
        self.refactoring_tasks.get(id)
    }

    pub fn list_refactoring_tasks(&self) -> impl Iterator<Item = &RefactoringTask> {
        self.refactoring_tasks.all()
    }

    pub fn list_pending_refactoring_tasks(&self) -> Result<Vec<&RefactoringTask>, PipelineError> {
        Ok(self.refactoring_tasks.list(&[Filter::eq("status", format!("{:?}", TaskStatus::Pending))])?)
    }

    /// Garbage-collect broken legacy refactoring tasks. Called on
    /// entry to the refactoring phase.
    pub fn gc_broken_refactoring_tasks(&mut self) -> Result<usize, PipelineError> {
        let broken: Vec<String> = self.refactoring_tasks.all().filter(|t| t.is_broken()).map(|t| t.id.clone()).collect();
        for id in &broken {
            self.refactoring_tasks.remove(id)?;
        }
        Ok(broken.len())
    }

    pub fn update_refactoring_task(&mut self, task: RefactoringTask) -> Result<(), PipelineError> {
        self.refactoring_tasks.put(task)?;
        Ok(())
    }

    pub fn delete_refactoring_task(&mut self, id: &str) -> Result<Option<RefactoringTask>, PipelineError> {
        Ok(self.refactoring_tasks.remove(id)?)
    }

    // ---- FileRecord operations ----

    pub fn touch_file(&mut self, path: &str, task_id: Option<&str>) {
        let mut record = self.files.get(path).cloned().unwrap_or_else(|| FileRecord::new(path));
        record.touch(task_id);
        // `put` only fails on index errors, which can't happen for our
        // own well-formed index fields.
        self.files.put(record).expect("file record index fields are well-formed");
    }

    pub fn get_file(&self, path: &str) -> Option<&FileRecord> {
        self.files.get(path)
    }

    pub fn list_files(&self) -> impl Iterator<Item = &FileRecord> {
        self.files.all()
    }

    pub fn set_file_verification(&mut self, path: &str, status: super::file_record::VerificationStatus) {
        let mut record = self.files.get(path).cloned().unwrap_or_else(|| FileRecord::new(path));
        record.verification_status = status;
        self.files.put(record).expect("file record index fields are well-formed");
    }

    // ---- Issue operations ----

    pub fn create_issue(&mut self, issue: Issue) -> Result<(), PipelineError> {
        self.issues.put(issue)?;
        Ok(())
    }

    pub fn list_unresolved_issues(&self) -> Result<Vec<&Issue>, PipelineError> {
        Ok(self.issues.list(&[Filter::eq("resolved", false)])?)
    }

    pub fn resolve_issue(&mut self, id: &str) -> Result<(), PipelineError> {
        if let Some(mut issue) = self.issues.get(id).cloned() {
            issue.resolved = true;
            self.issues.put(issue)?;
        }
        Ok(())
    }

    // ---- PhaseRecord operations ----

    pub fn phase_record(&self, name: &str) -> Option<&PhaseRecord> {
        self.phases.get(name)
    }

    pub fn list_phase_records(&self) -> impl Iterator<Item = &PhaseRecord> {
        self.phases.all()
    }

    /// §4.8.3: append a run record and update `experienceCount`/`awarenessLevel`.
    pub fn record_phase_run(&mut self, name: &str, started_at: i64, success: bool, files_created: u32, files_modified: u32, error: Option<String>) {
        let mut record = self.phases.get(name).cloned().unwrap_or_else(|| PhaseRecord::new(name));
        record.record_run(started_at, success, files_created, files_modified, error);
        self.phases.put(record).expect("phase record has no index fields");
    }

    pub fn register_phase_vertex(&mut self, name: impl Into<String>, dim7: Dim7) {
        let mut polytope = self.polytope().clone();
        polytope.add_vertex(name, dim7);
        self.set_polytope(polytope);
    }

    pub fn register_phase_edge(&mut self, from: impl Into<String>, to: impl Into<String>) {
        let mut polytope = self.polytope().clone();
        polytope.add_edge(from, to);
        self.set_polytope(polytope);
    }

    // ---- Persistence ----

    /// `save(state)` (§4.1): persist every collection. Each underlying
    /// `Store` increments and checks its own monotonic version, so a
    /// torn write to one collection can never corrupt another.
    pub fn save(&mut self) -> Result<(), PipelineError> {
        self.root.save()?;
        self.tasks.save()?;
        self.files.save()?;
        self.phases.save()?;
        self.refactoring_tasks.save()?;
        self.issues.save()?;
        Ok(())
    }

    /// `snapshot(label)` (§4.1): snapshot every collection under the same label.
    pub fn snapshot(&self, label: &str) -> Result<(), PipelineError> {
        self.root.snapshot(label)?;
        self.tasks.snapshot(label)?;
        self.files.snapshot(label)?;
        self.phases.snapshot(label)?;
        self.refactoring_tasks.snapshot(label)?;
        self.issues.snapshot(label)?;
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn load_on_empty_dir_starts_with_fresh_root_record() {
        let dir = tempdir().unwrap();
        let state = PipelineState::load(dir.path()).unwrap();
        assert!(!state.run_id().is_empty());
        assert!(!state.is_terminated());
    }

    #[test]
    fn create_task_rejects_id_collision() {
        let dir = tempdir().unwrap();
        let mut state = PipelineState::load(dir.path()).unwrap();
        let task = Task::new("t", "d", Priority::Low, "coding", Some("a.rs".into()));
        state.create_task(task.clone()).unwrap();
        assert!(state.create_task(task).is_err());
    }

    #[test]
    fn create_task_rejects_missing_required_file() {
        let dir = tempdir().unwrap();
        let mut state = PipelineState::load(dir.path()).unwrap();
        let task = Task::new("t", "d", Priority::Low, "coding", None);
        assert!(state.create_task(task).is_err());
    }

    #[test]
    fn select_next_task_prefers_higher_priority_then_oldest() {
        let dir = tempdir().unwrap();
        let mut state = PipelineState::load(dir.path()).unwrap();
        let low = Task::new("low", "d", Priority::Low, "documentation", None);
        let high = Task::new("high", "d", Priority::High, "documentation", None);
        state.create_task(low).unwrap();
        state.create_task(high.clone()).unwrap();

        let next = state.select_next_task().unwrap().unwrap();
        assert_eq!(next.id, high.id);
    }

    #[test]
    fn complete_task_creates_file_record_association() {
        let dir = tempdir().unwrap();
        let mut state = PipelineState::load(dir.path()).unwrap();
        let task = Task::new("t", "d", Priority::Low, "coding", Some("a.rs".into()));
        let id = task.id.clone();
        state.create_task(task).unwrap();
        state.start_task(&id).unwrap();
        state.complete_task(&id).unwrap();

        let file = state.get_file("a.rs").unwrap();
        assert!(file.associated_task_ids.contains(&id));
    }

    #[test]
    fn gc_removes_broken_refactoring_tasks_only() {
        use super::super::refactoring_task::{FixApproach, IssueType};
        let dir = tempdir().unwrap();
        let mut state = PipelineState::load(dir.path()).unwrap();

        let good = RefactoringTask::new("rt-good", "dedupe foo", "d", Priority::Low, Some("a.rs".into()), IssueType::Duplicate, FixApproach::Autonomous, serde_json::json!({"x": 1}));
        state.create_refactoring_task(good).unwrap();

        // Bypass create_refactoring_task's own rejection to simulate a
        // legacy broken record already on disk.
        let broken = RefactoringTask::new("rt-broken", "Unknown", "d", Priority::Low, None, IssueType::DeadCode, FixApproach::Autonomous, serde_json::json!({}));
        state.update_refactoring_task(broken).unwrap();

        let removed = state.gc_broken_refactoring_tasks().unwrap();
        assert_eq!(removed, 1);
        assert!(state.get_refactoring_task("rt-good").is_some());
        assert!(state.get_refactoring_task("rt-broken").is_none());
    }

    #[test]
    fn save_then_reload_round_trips_tasks() {
        let dir = tempdir().unwrap();
        let id = {
            let mut state = PipelineState::load(dir.path()).unwrap();
            let task = Task::new("t", "d", Priority::Low, "coding", Some("a.rs".into()));
            let id = task.id.clone();
            state.create_task(task).unwrap();
            state.save().unwrap();
            id
        };

        let reloaded = PipelineState::load(dir.path()).unwrap();
        assert!(reloaded.get_task(&id).is_some());
    }

    #[test]
    fn list_files_reflects_touched_files() {
        let dir = tempdir().unwrap();
        let mut state = PipelineState::load(dir.path()).unwrap();
        state.touch_file("a.rs", Some("task-1"));
        state.touch_file("b.rs", None);
        let paths: Vec<&str> = state.list_files().map(|f| f.path.as_str()).collect();
        assert_eq!(paths.len(), 2);
        assert!(paths.contains(&"a.rs"));
        assert!(paths.contains(&"b.rs"));
    }

    #[test]
    fn push_phase_history_skips_consecutive_duplicates() {
        let dir = tempdir().unwrap();
        let mut state = PipelineState::load(dir.path()).unwrap();
        state.push_phase_history("coding".into());
        state.push_phase_history("coding".into());
        state.push_phase_history("qa".into());
        assert_eq!(state.phase_history(), &["coding".to_string(), "qa".to_string()]);
    }
}
