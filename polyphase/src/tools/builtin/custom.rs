//! Subprocess-isolated handler for externally defined tools (`discoverCustom`).
//!
//! A custom tool is a directory entry `<name>.json` describing its schema
//! plus a sibling executable `<name>` (or `<name>.sh`) invoked as a
//! subprocess with the call's JSON input on stdin and its JSON `ToolResult`
//! expected on stdout. Resource budget is just the timeout; the process
//! runs as the same user with no elevated isolation beyond what
//! `ToolContext`'s working-directory scoping already gives every tool.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::tools::{Tool, ToolContext, ToolError, ToolResult};

#[derive(Debug, Clone, Deserialize)]
pub struct CustomToolSpec {
    pub name: String,
    pub description: String,
    #[serde(default = "default_schema")]
    pub input_schema: Value,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_schema() -> Value {
    serde_json::json!({ "type": "object" })
}

fn default_timeout_ms() -> u64 {
    30_000
}

const HARD_CEILING_MS: u64 = 300_000;

pub struct CustomTool {
    spec: CustomToolSpec,
    executable: PathBuf,
    /// Leaked once at registration time so `name()`/`description()` can
    /// return `&'static str` without cloning on every call.
    name_static: &'static str,
    description_static: &'static str,
}

impl CustomTool {
    pub fn new(spec: CustomToolSpec, executable: PathBuf) -> Self {
        let name_static: &'static str = Box::leak(spec.name.clone().into_boxed_str());
        let description_static: &'static str = Box::leak(spec.description.clone().into_boxed_str());
        Self {
            spec,
            executable,
            name_static,
            description_static,
        }
    }
}

#[async_trait]
impl Tool for CustomTool {
    fn name(&self) -> &'static str {
        self.name_static
    }

    fn description(&self) -> &'static str {
        self.description_static
    }

    fn input_schema(&self) -> Value {
        self.spec.input_schema.clone()
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult {
        let timeout_ms = self.spec.timeout_ms.min(HARD_CEILING_MS);

        let mut child = match Command::new(&self.executable)
            .current_dir(&ctx.project_root)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(c) => c,
            Err(e) => return ToolResult::error(format!("failed to spawn custom tool '{}': {}", self.spec.name, e)),
        };

        if let Some(mut stdin) = child.stdin.take() {
            let payload = input.to_string();
            if let Err(e) = stdin.write_all(payload.as_bytes()).await {
                return ToolResult::error(format!("failed to write input to custom tool: {}", e));
            }
        }

        let wait = child.wait_with_output();
        let output = match tokio::time::timeout(Duration::from_millis(timeout_ms), wait).await {
            Ok(Ok(o)) => o,
            Ok(Err(e)) => return ToolResult::error(format!("custom tool process error: {}", e)),
            Err(_) => {
                return ToolResult::error(
                    ToolError::ToolTimeout {
                        name: self.spec.name.clone(),
                        timeout_ms,
                    }
                    .to_string(),
                );
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            return ToolResult::error(format!("custom tool '{}' exited with failure: {}", self.spec.name, stderr));
        }

        match serde_json::from_str::<ToolResultWire>(&stdout) {
            Ok(wire) => ToolResult {
                content: wire.content,
                is_error: wire.is_error,
            },
            Err(_) => ToolResult::success(stdout),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ToolResultWire {
    content: String,
    #[serde(default)]
    is_error: bool,
}

/// Scan `dir` for `<name>.json` spec files paired with an executable of the
/// same stem, building one `CustomTool` per pair. Non-matching or malformed
/// entries are skipped rather than failing the whole scan.
pub async fn discover_custom_tools(dir: &Path) -> std::io::Result<Vec<CustomTool>> {
    let mut tools = Vec::new();
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(e) => e,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(tools),
        Err(e) => return Err(e),
    };

    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }

        let Ok(raw) = tokio::fs::read_to_string(&path).await else {
            continue;
        };
        let Ok(spec) = serde_json::from_str::<CustomToolSpec>(&raw) else {
            continue;
        };

        let stem = path.with_extension("");
        let candidates = [stem.clone(), stem.with_extension("sh")];
        if let Some(executable) = candidates.into_iter().find(|c| c.exists()) {
            tools.push(CustomTool::new(spec, executable));
        }
    }

    Ok(tools)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::tempdir;

    #[tokio::test]
    async fn discovers_paired_spec_and_executable() {
        let temp = tempdir().unwrap();
        fs::write(
            temp.path().join("echoer.json"),
            serde_json::json!({"name": "echoer", "description": "echoes input"}).to_string(),
        )
        .unwrap();

        let script = temp.path().join("echoer");
        fs::write(&script, "#!/bin/sh\ncat <<'EOF'\n{\"content\": \"ok\", \"is_error\": false}\nEOF\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        let tools = discover_custom_tools(temp.path()).await.unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name(), "echoer");
    }

    #[tokio::test]
    async fn missing_executable_is_skipped() {
        let temp = tempdir().unwrap();
        fs::write(
            temp.path().join("ghost.json"),
            serde_json::json!({"name": "ghost", "description": "no executable"}).to_string(),
        )
        .unwrap();

        let tools = discover_custom_tools(temp.path()).await.unwrap();
        assert!(tools.is_empty());
    }

    #[tokio::test]
    async fn custom_tool_executes_and_parses_wire_result() {
        let temp = tempdir().unwrap();
        let script = temp.path().join("echoer");
        fs::write(&script, "#!/bin/sh\ncat <<'EOF'\n{\"content\": \"hi there\", \"is_error\": false}\nEOF\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        let spec = CustomToolSpec {
            name: "echoer".to_string(),
            description: "echoes".to_string(),
            input_schema: default_schema(),
            timeout_ms: default_timeout_ms(),
        };
        let tool = CustomTool::new(spec, script);
        let ctx = ToolContext::new(temp.path().to_path_buf(), "run".to_string());

        let result = tool.execute(serde_json::json!({}), &ctx).await;
        assert!(!result.is_error);
        assert_eq!(result.content, "hi there");
    }
}
