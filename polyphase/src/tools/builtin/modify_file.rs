//! modify_file - targeted find/replace edit. Requires a prior read_file
//! call in the current iteration (per §4.3's sandboxing discipline).

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;

use crate::tools::{Tool, ToolContext, ToolError, ToolResult};

pub struct ModifyFileTool;

#[async_trait]
impl Tool for ModifyFileTool {
    fn name(&self) -> &'static str {
        "modify_file"
    }

    fn description(&self) -> &'static str {
        "Replace an exact string match in a file. The file must have been read first in this iteration."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "File path relative to project root" },
                "find": { "type": "string", "description": "Exact text to find" },
                "replace": { "type": "string", "description": "Replacement text" },
                "replace_all": { "type": "boolean", "description": "Replace every occurrence instead of requiring exactly one" }
            },
            "required": ["path", "find", "replace"]
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult {
        let path = match input["path"].as_str() {
            Some(p) => p,
            None => return ToolResult::error("path is required"),
        };
        let find = match input["find"].as_str() {
            Some(f) => f,
            None => return ToolResult::error("find is required"),
        };
        let replace = input["replace"].as_str().unwrap_or("");
        let replace_all = input["replace_all"].as_bool().unwrap_or(false);

        let full_path = match ctx.validate_path(Path::new(path)) {
            Ok(p) => p,
            Err(e) => return ToolResult::error(e.to_string()),
        };

        if !ctx.was_read(&full_path).await {
            return ToolResult::error(ToolError::EditWithoutRead { path: path.to_string() }.to_string());
        }

        let content = match tokio::fs::read_to_string(&full_path).await {
            Ok(c) => c,
            Err(e) => return ToolResult::error(format!("failed to read file: {}", e)),
        };

        let count = content.matches(find).count();
        if count == 0 {
            return ToolResult::error(ToolError::PatternNotFound { pattern: find.to_string() }.to_string());
        }
        if count > 1 && !replace_all {
            return ToolResult::error(ToolError::PatternNotUnique { count }.to_string());
        }

        let new_content = if replace_all {
            content.replace(find, replace)
        } else {
            content.replacen(find, replace, 1)
        };

        if let Err(e) = tokio::fs::write(&full_path, &new_content).await {
            return ToolResult::error(format!("failed to write file: {}", e));
        }

        ctx.track_read(&full_path).await;
        ToolResult::success(format!("modified {} ({} replacement(s))", path, if replace_all { count } else { 1 }))
    }
}
