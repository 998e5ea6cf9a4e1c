//! LLM transport for the orchestration engine.
//!
//! Protocol bodies beyond the OpenAI-compatible chat-completions shape are
//! out of scope (LLM transport is treated as an external collaborator);
//! what lives here is the trait seam, the retry/backoff policy, and the
//! native-vs-text-fallback tool-call parsing the core depends on.

use std::sync::Arc;

mod client;
mod error;
mod http;
mod parse;
mod types;

pub use client::{LlmClient, MockLlmClient};
pub use error::LlmError;
pub use http::HttpLlmClient;
pub use parse::{parse_native_tool_calls, parse_text_tool_calls};
pub use types::{
    CompletionRequest, CompletionResponse, ContentBlock, Message, MessageContent, Role, StopReason, StreamChunk,
    TokenUsage, ToolCall, ToolDefinition,
};

use crate::config::{LlmConfig, ResolvedLlmConfig};

/// Construct a client from user-facing config (resolves provider defaults first).
pub fn create_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    let resolved = config.resolve().map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
    create_client_from_resolved(&resolved)
}

pub fn create_client_from_resolved(config: &ResolvedLlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    Ok(Arc::new(HttpLlmClient::from_config(config)?))
}

/// Merge native and text-fallback tool calls: if the backend already
/// produced structured calls, trust those; otherwise fall back to scanning
/// the content string.
pub fn parse_tool_calls(response: &CompletionResponse) -> Vec<ToolCall> {
    if !response.tool_calls.is_empty() {
        return parse_native_tool_calls(&response.tool_calls);
    }
    response.content.as_deref().map(parse_text_tool_calls).unwrap_or_default()
}
