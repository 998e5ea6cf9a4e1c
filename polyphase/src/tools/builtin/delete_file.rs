//! delete_file - remove a file from the project.

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;

use crate::tools::{Tool, ToolContext, ToolResult};

pub struct DeleteFileTool;

#[async_trait]
impl Tool for DeleteFileTool {
    fn name(&self) -> &'static str {
        "delete_file"
    }

    fn description(&self) -> &'static str {
        "Delete a file from the project."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "File path relative to project root" }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult {
        let path = match input["path"].as_str() {
            Some(p) => p,
            None => return ToolResult::error("path is required"),
        };

        let full_path = match ctx.validate_path(Path::new(path)) {
            Ok(p) => p,
            Err(e) => return ToolResult::error(e.to_string()),
        };

        if !full_path.exists() {
            return ToolResult::error(format!("{} does not exist", path));
        }

        if let Err(e) = tokio::fs::remove_file(&full_path).await {
            return ToolResult::error(format!("failed to delete file: {}", e));
        }

        ToolResult::success(format!("deleted {}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn deletes_existing_file() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("a.txt"), "content").unwrap();
        let ctx = ToolContext::new(temp.path().to_path_buf(), "run".to_string());

        let result = DeleteFileTool.execute(serde_json::json!({"path": "a.txt"}), &ctx).await;
        assert!(!result.is_error);
        assert!(!temp.path().join("a.txt").exists());
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let temp = tempdir().unwrap();
        let ctx = ToolContext::new(temp.path().to_path_buf(), "run".to_string());

        let result = DeleteFileTool.execute(serde_json::json!({"path": "nope.txt"}), &ctx).await;
        assert!(result.is_error);
    }
}
