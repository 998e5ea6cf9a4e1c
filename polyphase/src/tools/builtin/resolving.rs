//! Resolving tools for refactoring tasks (§4.7's task-resolution rule): a
//! refactoring task may only be marked COMPLETED if one of these succeeds
//! in the run. `RESOLVING_TOOLS` is the name set `PhaseRunner` checks
//! against; purely analytical tool successes never satisfy it.
//!
//! These tools don't mutate `PipelineState` themselves (tools never do,
//! per §4.3) - they perform their file-level effect and return a summary;
//! the runner is what folds the "a resolving tool succeeded" fact into the
//! task's status.

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;

use crate::tools::{Tool, ToolContext, ToolResult};

pub const RESOLVING_TOOLS: &[&str] = &[
    "merge_file_implementations",
    "cleanup_redundant_files",
    "create_issue_report",
    "request_developer_review",
    "update_refactoring_task",
];

pub fn is_resolving_tool(name: &str) -> bool {
    RESOLVING_TOOLS.contains(&name)
}

pub struct MergeFileImplementationsTool;

#[async_trait]
impl Tool for MergeFileImplementationsTool {
    fn name(&self) -> &'static str {
        "merge_file_implementations"
    }

    fn description(&self) -> &'static str {
        "Merge the contents of a duplicate file into a canonical target, then remove the duplicate."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "source": { "type": "string", "description": "Duplicate file to merge from" },
                "target": { "type": "string", "description": "Canonical file to merge into" },
                "merged_content": { "type": "string", "description": "Full content of target after merging" }
            },
            "required": ["source", "target", "merged_content"]
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult {
        let source = match input["source"].as_str() {
            Some(s) => s,
            None => return ToolResult::error("source is required"),
        };
        let target = match input["target"].as_str() {
            Some(t) => t,
            None => return ToolResult::error("target is required"),
        };
        let merged = match input["merged_content"].as_str() {
            Some(m) => m,
            None => return ToolResult::error("merged_content is required"),
        };

        let full_target = match ctx.validate_path(Path::new(target)) {
            Ok(p) => p,
            Err(e) => return ToolResult::error(e.to_string()),
        };
        let full_source = match ctx.validate_path(Path::new(source)) {
            Ok(p) => p,
            Err(e) => return ToolResult::error(e.to_string()),
        };

        if let Err(e) = tokio::fs::write(&full_target, merged).await {
            return ToolResult::error(format!("failed to write merged target: {}", e));
        }
        if full_source.exists() {
            if let Err(e) = tokio::fs::remove_file(&full_source).await {
                return ToolResult::error(format!("merged target but failed to remove duplicate: {}", e));
            }
        }

        ctx.track_read(&full_target).await;
        ToolResult::success(format!("merged {} into {}", source, target))
    }
}

pub struct CleanupRedundantFilesTool;

#[async_trait]
impl Tool for CleanupRedundantFilesTool {
    fn name(&self) -> &'static str {
        "cleanup_redundant_files"
    }

    fn description(&self) -> &'static str {
        "Delete files identified as redundant after a refactor."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "paths": { "type": "array", "items": { "type": "string" }, "description": "Files to delete" }
            },
            "required": ["paths"]
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult {
        let paths: Vec<String> = match input["paths"].as_array() {
            Some(arr) => arr.iter().filter_map(|v| v.as_str().map(String::from)).collect(),
            None => return ToolResult::error("paths is required"),
        };
        if paths.is_empty() {
            return ToolResult::error("paths must not be empty");
        }

        let mut removed = Vec::new();
        let mut failed = Vec::new();
        for path in &paths {
            let full_path = match ctx.validate_path(Path::new(path)) {
                Ok(p) => p,
                Err(e) => {
                    failed.push(format!("{}: {}", path, e));
                    continue;
                }
            };
            match tokio::fs::remove_file(&full_path).await {
                Ok(()) => removed.push(path.clone()),
                Err(e) => failed.push(format!("{}: {}", path, e)),
            }
        }

        if removed.is_empty() {
            return ToolResult::error(format!("failed to remove any file: {}", failed.join(", ")));
        }

        let mut summary = format!("removed {} file(s): {}", removed.len(), removed.join(", "));
        if !failed.is_empty() {
            summary.push_str(&format!(" (failed: {})", failed.join(", ")));
        }
        ToolResult::success(summary)
    }
}

pub struct CreateIssueReportTool;

#[async_trait]
impl Tool for CreateIssueReportTool {
    fn name(&self) -> &'static str {
        "create_issue_report"
    }

    fn description(&self) -> &'static str {
        "Record an issue discovered during refactoring for later triage, resolving the current task."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "title": { "type": "string" },
                "description": { "type": "string" },
                "severity": { "type": "string", "enum": ["low", "medium", "high", "critical"] }
            },
            "required": ["title", "description"]
        })
    }

    async fn execute(&self, input: Value, _ctx: &ToolContext) -> ToolResult {
        let title = match input["title"].as_str() {
            Some(t) => t,
            None => return ToolResult::error("title is required"),
        };
        let description = match input["description"].as_str() {
            Some(d) => d,
            None => return ToolResult::error("description is required"),
        };
        let severity = input["severity"].as_str().unwrap_or("medium");

        ToolResult::success(format!("issue reported: [{}] {} - {}", severity, title, description))
    }
}

pub struct RequestDeveloperReviewTool;

#[async_trait]
impl Tool for RequestDeveloperReviewTool {
    fn name(&self) -> &'static str {
        "request_developer_review"
    }

    fn description(&self) -> &'static str {
        "Flag the current task as requiring human review instead of automated resolution."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "reason": { "type": "string", "description": "Why this needs a human" }
            },
            "required": ["reason"]
        })
    }

    async fn execute(&self, input: Value, _ctx: &ToolContext) -> ToolResult {
        let reason = match input["reason"].as_str() {
            Some(r) => r,
            None => return ToolResult::error("reason is required"),
        };
        ToolResult::success(format!("flagged for developer review: {}", reason))
    }
}

pub struct UpdateRefactoringTaskTool;

#[async_trait]
impl Tool for UpdateRefactoringTaskTool {
    fn name(&self) -> &'static str {
        "update_refactoring_task"
    }

    fn description(&self) -> &'static str {
        "Record progress notes on the current refactoring task."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "notes": { "type": "string", "description": "Progress notes to attach to the task" }
            },
            "required": ["notes"]
        })
    }

    async fn execute(&self, input: Value, _ctx: &ToolContext) -> ToolResult {
        let notes = match input["notes"].as_str() {
            Some(n) => n,
            None => return ToolResult::error("notes is required"),
        };
        ToolResult::success(format!("task updated: {}", notes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn resolving_tool_set_matches_spec_enumeration() {
        assert!(is_resolving_tool("merge_file_implementations"));
        assert!(is_resolving_tool("update_refactoring_task"));
        assert!(!is_resolving_tool("read_file"));
        assert!(!is_resolving_tool("grep"));
    }

    #[tokio::test]
    async fn merge_writes_target_and_removes_source() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("dup.rs"), "old").unwrap();
        fs::write(temp.path().join("canonical.rs"), "canonical").unwrap();
        let ctx = ToolContext::new(temp.path().to_path_buf(), "run".to_string());

        let result = MergeFileImplementationsTool
            .execute(
                serde_json::json!({"source": "dup.rs", "target": "canonical.rs", "merged_content": "merged"}),
                &ctx,
            )
            .await;

        assert!(!result.is_error);
        assert!(!temp.path().join("dup.rs").exists());
        assert_eq!(fs::read_to_string(temp.path().join("canonical.rs")).unwrap(), "merged");
    }

    #[tokio::test]
    async fn cleanup_removes_listed_files() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("a.rs"), "").unwrap();
        fs::write(temp.path().join("b.rs"), "").unwrap();
        let ctx = ToolContext::new(temp.path().to_path_buf(), "run".to_string());

        let result = CleanupRedundantFilesTool
            .execute(serde_json::json!({"paths": ["a.rs", "b.rs"]}), &ctx)
            .await;

        assert!(!result.is_error);
        assert!(!temp.path().join("a.rs").exists());
        assert!(!temp.path().join("b.rs").exists());
    }

    #[tokio::test]
    async fn create_issue_report_succeeds_without_file_effects() {
        let temp = tempdir().unwrap();
        let ctx = ToolContext::new(temp.path().to_path_buf(), "run".to_string());
        let result = CreateIssueReportTool
            .execute(serde_json::json!({"title": "dup logic", "description": "found in two files"}), &ctx)
            .await;
        assert!(!result.is_error);
    }
}
