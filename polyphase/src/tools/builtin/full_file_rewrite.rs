//! full_file_rewrite - replace an entire file's contents in one shot.

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;

use crate::tools::{Tool, ToolContext, ToolResult};

pub struct FullFileRewriteTool;

#[async_trait]
impl Tool for FullFileRewriteTool {
    fn name(&self) -> &'static str {
        "full_file_rewrite"
    }

    fn description(&self) -> &'static str {
        "Overwrite an existing file's entire contents. Creates parent directories if needed."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "File path relative to project root" },
                "content": { "type": "string", "description": "New content for the whole file" }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult {
        let path = match input["path"].as_str() {
            Some(p) => p,
            None => return ToolResult::error("path is required"),
        };
        let content = match input["content"].as_str() {
            Some(c) => c,
            None => return ToolResult::error("content is required"),
        };

        let full_path = match ctx.validate_path(Path::new(path)) {
            Ok(p) => p,
            Err(e) => return ToolResult::error(e.to_string()),
        };

        if let Some(parent) = full_path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return ToolResult::error(format!("failed to create directories: {}", e));
            }
        }

        if let Err(e) = tokio::fs::write(&full_path, content).await {
            return ToolResult::error(format!("failed to write file: {}", e));
        }

        ctx.track_read(&full_path).await;
        ToolResult::success(format!("rewrote {} ({} bytes)", path, content.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn rewrites_existing_file_wholesale() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("a.txt"), "old content here").unwrap();
        let ctx = ToolContext::new(temp.path().to_path_buf(), "run".to_string());

        let result = FullFileRewriteTool
            .execute(serde_json::json!({"path": "a.txt", "content": "brand new"}), &ctx)
            .await;

        assert!(!result.is_error);
        assert_eq!(fs::read_to_string(temp.path().join("a.txt")).unwrap(), "brand new");
    }
}
