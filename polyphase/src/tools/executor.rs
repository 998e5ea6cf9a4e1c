//! ToolExecutor - the dispatch half of the ToolRegistry & Dispatcher (C3).

use std::collections::HashMap;
use std::path::Path;

use crate::llm::{ToolCall, ToolDefinition};

use super::builtin::{
    CleanupRedundantFilesTool, CreateFileTool, CreateIssueReportTool, DeleteFileTool, FullFileRewriteTool, GlobTool,
    GrepTool, ListDirectoryTool, MergeFileImplementationsTool, ModifyFileTool, MoveFileTool, RenameFileTool,
    RequestDeveloperReviewTool, RunCommandTool, UpdateRefactoringTaskTool, discover_custom_tools,
};
use super::{Tool, ToolContext, ToolError, ToolResult};

/// Name -> handler map, with argument validation against each tool's own
/// schema delegated to the handler (schemas describe shape for the LLM,
/// not a validation DSL the dispatcher itself enforces).
pub struct ToolExecutor {
    tools: HashMap<String, Box<dyn Tool>>,
}

/// Which subset of the registered tools a phase may call (§4.2's
/// per-phase tool allow-list).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolProfile {
    Full,
    ReadOnly,
}

const READ_ONLY_TOOLS: &[&str] = &["read_file", "list_directory", "glob", "grep"];

impl ToolExecutor {
    /// Register every built-in tool (no custom tools - see `register_custom_tools_from`).
    pub fn standard() -> Self {
        let mut tools: HashMap<String, Box<dyn Tool>> = HashMap::new();

        tools.insert("read_file".into(), Box::new(super::builtin::ReadFileTool));
        tools.insert("create_file".into(), Box::new(CreateFileTool));
        tools.insert("modify_file".into(), Box::new(ModifyFileTool));
        tools.insert("full_file_rewrite".into(), Box::new(FullFileRewriteTool));
        tools.insert("move_file".into(), Box::new(MoveFileTool));
        tools.insert("rename_file".into(), Box::new(RenameFileTool));
        tools.insert("delete_file".into(), Box::new(DeleteFileTool));
        tools.insert("list_directory".into(), Box::new(ListDirectoryTool));
        tools.insert("glob".into(), Box::new(GlobTool));
        tools.insert("grep".into(), Box::new(GrepTool));
        tools.insert("run_command".into(), Box::new(RunCommandTool));

        tools.insert("merge_file_implementations".into(), Box::new(MergeFileImplementationsTool));
        tools.insert("cleanup_redundant_files".into(), Box::new(CleanupRedundantFilesTool));
        tools.insert("create_issue_report".into(), Box::new(CreateIssueReportTool));
        tools.insert("request_developer_review".into(), Box::new(RequestDeveloperReviewTool));
        tools.insert("update_refactoring_task".into(), Box::new(UpdateRefactoringTaskTool));

        Self { tools }
    }

    pub fn empty() -> Self {
        Self { tools: HashMap::new() }
    }

    /// `register(tool)` - name must be unique; re-registration replaces.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// `discoverCustom(dir)` - scan a directory for external tool
    /// definitions and register each as a subprocess-isolated handler.
    /// Called by the coordinator between iterations (§4.8), never mid-run.
    pub async fn discover_custom(&mut self, dir: &Path) -> std::io::Result<usize> {
        let discovered = discover_custom_tools(dir).await?;
        let count = discovered.len();
        for tool in discovered {
            self.register(Box::new(tool));
        }
        Ok(count)
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .values()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                input_schema: t.input_schema(),
            })
            .collect()
    }

    /// Definitions restricted to a phase's allow-list, further filtered by
    /// `profile` (a read-only phase never sees mutating tools even if
    /// listed).
    pub fn definitions_for(&self, tool_names: &[String], profile: ToolProfile) -> Vec<ToolDefinition> {
        tool_names
            .iter()
            .filter(|name| profile != ToolProfile::ReadOnly || READ_ONLY_TOOLS.contains(&name.as_str()))
            .filter_map(|name| self.tools.get(name))
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                input_schema: t.input_schema(),
            })
            .collect()
    }

    /// `dispatch(name, args, ctx) -> ToolResult`. Unknown tool names are
    /// fed back to the LLM as a structured error rather than failing the
    /// run, so the model can self-correct.
    pub async fn execute(&self, tool_call: &ToolCall, ctx: &ToolContext) -> ToolResult {
        match self.tools.get(&tool_call.name) {
            Some(tool) => tool.execute(tool_call.input.clone(), ctx).await,
            None => ToolResult::error(
                ToolError::UnknownTool {
                    name: tool_call.name.clone(),
                }
                .to_string(),
            ),
        }
    }

    /// Dispatch every call in order, appending results in dispatch order
    /// (§4.7: "tool calls are dispatched in the order they appear").
    pub async fn execute_all(&self, tool_calls: &[ToolCall], ctx: &ToolContext) -> Vec<(String, ToolResult)> {
        let mut results = Vec::with_capacity(tool_calls.len());
        for call in tool_calls {
            let result = self.execute(call, ctx).await;
            results.push((call.id.clone(), result));
        }
        results
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }
}

impl Default for ToolExecutor {
    fn default() -> Self {
        Self::standard()
    }
}
