//! run_command - execute a shell command under the project root, bounded
//! by a hard per-tool timeout (§4.3).

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;

use crate::tools::{Tool, ToolContext, ToolResult};

const DEFAULT_TIMEOUT_MS: u64 = 30_000;
const HARD_CEILING_MS: u64 = 300_000;

pub struct RunCommandTool;

#[async_trait]
impl Tool for RunCommandTool {
    fn name(&self) -> &'static str {
        "run_command"
    }

    fn description(&self) -> &'static str {
        "Run a shell command in the project directory and capture its output."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": { "type": "string", "description": "Shell command to run" },
                "timeout_ms": { "type": "integer", "description": "Timeout in milliseconds (default 30000, hard ceiling 300000)" }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult {
        let command = match input["command"].as_str() {
            Some(c) => c,
            None => return ToolResult::error("command is required"),
        };
        let timeout_ms = input["timeout_ms"].as_u64().unwrap_or(DEFAULT_TIMEOUT_MS).min(HARD_CEILING_MS);

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .current_dir(&ctx.project_root)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let run = cmd.output();
        let output = match tokio::time::timeout(Duration::from_millis(timeout_ms), run).await {
            Ok(Ok(o)) => o,
            Ok(Err(e)) => return ToolResult::error(format!("failed to spawn command: {}", e)),
            Err(_) => {
                return ToolResult::error(crate::tools::ToolError::ToolTimeout {
                    name: self.name().to_string(),
                    timeout_ms,
                }
                .to_string());
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let summary = format!("exit code: {}\n--- stdout ---\n{}\n--- stderr ---\n{}", output.status.code().unwrap_or(-1), stdout, stderr);

        if output.status.success() {
            ToolResult::success(summary)
        } else {
            ToolResult::error(summary)
        }
    }
}
