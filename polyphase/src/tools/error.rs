//! Tool error types.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("path {path} escapes project root {root}")]
    SandboxViolation { path: PathBuf, root: PathBuf },

    #[error("tool not found: {name}")]
    UnknownTool { name: String },

    #[error("invalid argument: {0}")]
    InvalidArgs(String),

    #[error("tool '{name}' timed out after {timeout_ms}ms")]
    ToolTimeout { name: String, timeout_ms: u64 },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("must read file before editing: {path}")]
    EditWithoutRead { path: String },

    #[error("pattern '{pattern}' not found in file")]
    PatternNotFound { pattern: String },

    #[error("pattern found {count} times, expected 1 (use replace_all=true)")]
    PatternNotUnique { count: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sandbox_violation_message_names_both_paths() {
        let err = ToolError::SandboxViolation {
            path: PathBuf::from("/etc/passwd"),
            root: PathBuf::from("/tmp/project"),
        };
        let msg = err.to_string();
        assert!(msg.contains("/etc/passwd"));
        assert!(msg.contains("/tmp/project"));
    }
}
