//! move_file and rename_file - both are a sandboxed filesystem rename;
//! rename_file keeps the file in its current directory, move_file may
//! change directory too. Kept as separate tool names per the mutating-tool
//! set the verifier classifies (§4.3), even though the implementation is
//! shared.

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;

use crate::tools::{Tool, ToolContext, ToolResult};

async fn do_move(input: Value, ctx: &ToolContext) -> ToolResult {
    let from = match input["from"].as_str() {
        Some(p) => p,
        None => return ToolResult::error("from is required"),
    };
    let to = match input["to"].as_str() {
        Some(p) => p,
        None => return ToolResult::error("to is required"),
    };

    let full_from = match ctx.validate_path(Path::new(from)) {
        Ok(p) => p,
        Err(e) => return ToolResult::error(e.to_string()),
    };
    let full_to = match ctx.validate_path(Path::new(to)) {
        Ok(p) => p,
        Err(e) => return ToolResult::error(e.to_string()),
    };

    if !full_from.exists() {
        return ToolResult::error(format!("{} does not exist", from));
    }

    if let Some(parent) = full_to.parent() {
        if let Err(e) = tokio::fs::create_dir_all(parent).await {
            return ToolResult::error(format!("failed to create directories: {}", e));
        }
    }

    if let Err(e) = tokio::fs::rename(&full_from, &full_to).await {
        return ToolResult::error(format!("failed to move file: {}", e));
    }

    ctx.track_read(&full_to).await;
    ToolResult::success(format!("moved {} to {}", from, to))
}

pub struct MoveFileTool;

#[async_trait]
impl Tool for MoveFileTool {
    fn name(&self) -> &'static str {
        "move_file"
    }

    fn description(&self) -> &'static str {
        "Move a file to a new path, possibly in a different directory."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "from": { "type": "string", "description": "Current path relative to project root" },
                "to": { "type": "string", "description": "Destination path relative to project root" }
            },
            "required": ["from", "to"]
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult {
        do_move(input, ctx).await
    }
}

pub struct RenameFileTool;

#[async_trait]
impl Tool for RenameFileTool {
    fn name(&self) -> &'static str {
        "rename_file"
    }

    fn description(&self) -> &'static str {
        "Rename a file in place, keeping it in the same directory."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "from": { "type": "string", "description": "Current path relative to project root" },
                "to": { "type": "string", "description": "New path relative to project root" }
            },
            "required": ["from", "to"]
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult {
        do_move(input, ctx).await
    }
}
