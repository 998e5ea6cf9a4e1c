//! ToolContext - execution context scoped to one PhaseRunner run.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::ToolError;

/// Every tool call within a phase run shares one context, scoped to the
/// target project directory. Sandboxing is enforced here, not per-tool.
#[derive(Clone)]
pub struct ToolContext {
    /// Target project directory - all file ops are constrained here.
    pub project_root: PathBuf,

    /// Identifies the run for logging/correlation.
    pub run_id: String,

    read_files: Arc<Mutex<HashSet<PathBuf>>>,

    pub sandbox_enabled: bool,
}

impl ToolContext {
    pub fn new(project_root: PathBuf, run_id: String) -> Self {
        Self {
            project_root,
            run_id,
            read_files: Arc::new(Mutex::new(HashSet::new())),
            sandbox_enabled: true,
        }
    }

    pub fn new_unsandboxed(project_root: PathBuf, run_id: String) -> Self {
        Self {
            project_root,
            run_id,
            read_files: Arc::new(Mutex::new(HashSet::new())),
            sandbox_enabled: false,
        }
    }

    pub async fn track_read(&self, path: &Path) {
        let mut read_files = self.read_files.lock().await;
        read_files.insert(self.normalize_path(path));
    }

    pub async fn was_read(&self, path: &Path) -> bool {
        let read_files = self.read_files.lock().await;
        read_files.contains(&self.normalize_path(path))
    }

    /// Called at the start of each new phase-runner iteration (§4.7): read
    /// tracking does not persist across iterations within a run.
    pub async fn clear_reads(&self) {
        let mut read_files = self.read_files.lock().await;
        read_files.clear();
    }

    fn normalize_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        }
    }

    /// Validate that `path` resolves inside `project_root`.
    pub fn validate_path(&self, path: &Path) -> Result<PathBuf, ToolError> {
        let normalized = self.normalize_path(path);

        if !self.sandbox_enabled {
            return Ok(normalized);
        }

        let canonical = if normalized.exists() {
            normalized.canonicalize().unwrap_or_else(|_| normalized.clone())
        } else if let Some(parent) = normalized.parent() {
            if parent.exists() {
                let canonical_parent = parent.canonicalize().unwrap_or_else(|_| parent.to_path_buf());
                canonical_parent.join(normalized.file_name().unwrap_or_default())
            } else {
                normalized.clone()
            }
        } else {
            normalized.clone()
        };

        let root_canonical = self.project_root.canonicalize().unwrap_or_else(|_| self.project_root.clone());

        if canonical.starts_with(&root_canonical) {
            Ok(canonical)
        } else {
            Err(ToolError::SandboxViolation {
                path: path.to_path_buf(),
                root: self.project_root.clone(),
            })
        }
    }
}

impl std::fmt::Debug for ToolContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolContext")
            .field("project_root", &self.project_root)
            .field("run_id", &self.run_id)
            .field("sandbox_enabled", &self.sandbox_enabled)
            .finish()
    }
}
