//! Tool trait definition.

use async_trait::async_trait;
use serde_json::Value;

use super::context::ToolContext;

/// A tool that can be dispatched by a `PhaseRunner` on behalf of the LLM.
///
/// Side effects stay scoped to the project working directory via
/// `ToolContext`; tools never touch pipeline state directly, they return
/// data and the runner decides how to fold it into state.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn input_schema(&self) -> Value;

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult;
}

#[derive(Debug, Clone)]
pub struct ToolResult {
    pub content: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }
}
