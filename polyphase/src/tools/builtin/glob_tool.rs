//! glob - find files matching a glob pattern.

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;

use crate::tools::{Tool, ToolContext, ToolResult};

pub struct GlobTool;

#[async_trait]
impl Tool for GlobTool {
    fn name(&self) -> &'static str {
        "glob"
    }

    fn description(&self) -> &'static str {
        "Find files matching a glob pattern (e.g. **/*.rs)."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "pattern": { "type": "string", "description": "Glob pattern to match" },
                "path": { "type": "string", "description": "Base directory (default: project root)" }
            },
            "required": ["pattern"]
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult {
        let pattern = match input["pattern"].as_str() {
            Some(p) => p,
            None => return ToolResult::error("pattern is required"),
        };
        let base = input["path"].as_str().unwrap_or(".");

        let base_path = match ctx.validate_path(Path::new(base)) {
            Ok(p) => p,
            Err(e) => return ToolResult::error(e.to_string()),
        };

        let full_pattern = base_path.join(pattern);
        let pattern_str = match full_pattern.to_str() {
            Some(s) => s,
            None => return ToolResult::error("invalid pattern path"),
        };

        let matches: Vec<String> = match glob::glob(pattern_str) {
            Ok(paths) => paths
                .filter_map(|r| r.ok())
                .filter(|p| p.starts_with(&ctx.project_root))
                .filter_map(|p| p.strip_prefix(&ctx.project_root).ok().map(|rel| rel.to_string_lossy().to_string()))
                .take(1000)
                .collect(),
            Err(e) => return ToolResult::error(format!("invalid glob pattern: {}", e)),
        };

        if matches.is_empty() {
            ToolResult::success("no matches found")
        } else {
            ToolResult::success(matches.join("\n"))
        }
    }
}
