//! ConversationManager (C5): owns one `convostore::ConversationThread` per
//! `PhaseRunner` run and translates between its durable, role-tagged
//! message log and the `llm` crate's wire-level `Message` list.
//!
//! This is a deliberate divergence from the "fresh context every
//! iteration" philosophy the rest of this codebase's prompt-driving loops
//! follow: within one phase run the message list accumulates (per §4.7's
//! `PhaseRunner` algorithm), and only snapshots to `convostore` at
//! checkpoints rather than starting over each iteration. Between separate
//! runs, a fresh thread is still the default - see `ConversationManager::new_for_phase`.

use serde::{Deserialize, Serialize};

use convostore::{ConversationThread, Message as StoredMessage, Role as StoredRole, ThreadStore};

use crate::errors::PipelineError;
use crate::llm::{CompletionRequest, ContentBlock, Message, MessageContent, Role, ToolCall, ToolDefinition};

/// What an assistant turn actually said, serialized into the stored
/// message's content so conversion back to `llm::Message` is lossless.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct AssistantTurn {
    text: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ToolCall>,
}

pub struct ConversationManager {
    thread: ConversationThread,
}

impl ConversationManager {
    /// Load an existing thread for (thread_id, phase), or start a fresh
    /// one seeded with the system prompt.
    pub fn new_for_phase(store: &ThreadStore, thread_id: &str, phase: &str, system_prompt: &str) -> Result<Self, PipelineError> {
        let mut thread = store.load(thread_id, phase).map_err(|e| PipelineError::StateCorruption(e.to_string()))?;
        if thread.messages.is_empty() {
            thread.append(StoredMessage::system(system_prompt));
        }
        Ok(Self { thread })
    }

    pub fn append_user(&mut self, content: impl Into<String>) {
        self.thread.append(StoredMessage::user(content));
    }

    pub fn append_assistant(&mut self, text: Option<String>, tool_calls: Vec<ToolCall>) {
        let turn = AssistantTurn { text, tool_calls };
        let encoded = serde_json::to_string(&turn).unwrap_or_default();
        self.thread.append(StoredMessage::assistant(encoded));
    }

    /// Tool results are stored as Tool-role messages; `tool_use_id` rides
    /// in the stored message's `tool_name` slot so round-tripping can
    /// rebuild the `ContentBlock::ToolResult` that matches the assistant's
    /// `ToolUse` call.
    pub fn append_tool_result(&mut self, tool_use_id: impl Into<String>, content: impl Into<String>, is_error: bool) {
        let content = content.into();
        let prefixed = if is_error { format!("ERROR: {}", content) } else { content };
        self.thread.append(StoredMessage::tool(tool_use_id.into(), prefixed));
    }

    /// Drop oldest non-system messages until under `token_budget`, per §4.5.
    pub fn trim(&mut self, token_budget: usize) {
        self.thread.trim(token_budget);
    }

    pub fn snapshot(&mut self, store: &ThreadStore) -> Result<(), PipelineError> {
        store.snapshot_thread(&mut self.thread).map_err(|e| PipelineError::StateCorruption(e.to_string()))
    }

    /// Build an LLM request from the current thread: the leading System
    /// message becomes `system_prompt`, everything after becomes `messages`.
    pub fn to_completion_request(&self, tools: Vec<ToolDefinition>, max_tokens: u32) -> CompletionRequest {
        let mut system_prompt = String::new();
        let mut messages = Vec::new();

        for stored in &self.thread.messages {
            match stored.role {
                StoredRole::System => system_prompt.push_str(&stored.content),
                StoredRole::User => messages.push(Message {
                    role: Role::User,
                    content: MessageContent::Text(stored.content.clone()),
                }),
                StoredRole::Assistant => messages.push(decode_assistant_message(&stored.content)),
                StoredRole::Tool => {
                    let (is_error, content) = match stored.content.strip_prefix("ERROR: ") {
                        Some(rest) => (true, rest.to_string()),
                        None => (false, stored.content.clone()),
                    };
                    let tool_use_id = stored.tool_name.clone().unwrap_or_default();
                    messages.push(Message::tool_result(tool_use_id, content, is_error));
                }
            }
        }

        CompletionRequest {
            system_prompt,
            messages,
            tools,
            max_tokens,
        }
    }

    pub fn message_count(&self) -> usize {
        self.thread.messages.len()
    }
}

fn decode_assistant_message(content: &str) -> Message {
    match serde_json::from_str::<AssistantTurn>(content) {
        Ok(turn) if turn.tool_calls.is_empty() => Message {
            role: Role::Assistant,
            content: MessageContent::Text(turn.text.unwrap_or_default()),
        },
        Ok(turn) => {
            let mut blocks = Vec::new();
            if let Some(text) = turn.text.filter(|t| !t.is_empty()) {
                blocks.push(ContentBlock::Text { text });
            }
            for call in turn.tool_calls {
                blocks.push(ContentBlock::ToolUse {
                    id: call.id,
                    name: call.name,
                    input: call.input,
                });
            }
            Message {
                role: Role::Assistant,
                content: MessageContent::Blocks(blocks),
            }
        }
        // Pre-existing plain-text assistant content (e.g. from an older thread format).
        Err(_) => Message {
            role: Role::Assistant,
            content: MessageContent::Text(content.to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn fresh_thread_seeds_system_prompt() {
        let temp = tempdir().unwrap();
        let store = ThreadStore::open(temp.path().to_path_buf());
        let manager = ConversationManager::new_for_phase(&store, "thread-1", "coding", "you are a coding agent").unwrap();

        let request = manager.to_completion_request(vec![], 1000);
        assert_eq!(request.system_prompt, "you are a coding agent");
        assert!(request.messages.is_empty());
    }

    #[test]
    fn round_trips_assistant_tool_calls_through_storage() {
        let temp = tempdir().unwrap();
        let store = ThreadStore::open(temp.path().to_path_buf());
        let mut manager = ConversationManager::new_for_phase(&store, "thread-1", "coding", "sys").unwrap();

        manager.append_user("please fix the bug");
        manager.append_assistant(
            Some("I'll read the file first".to_string()),
            vec![ToolCall {
                id: "call-1".into(),
                name: "read_file".into(),
                input: serde_json::json!({"path": "a.py"}),
            }],
        );
        manager.append_tool_result("call-1", "file contents here", false);

        let request = manager.to_completion_request(vec![], 1000);
        assert_eq!(request.messages.len(), 3);

        match &request.messages[1].content {
            MessageContent::Blocks(blocks) => {
                assert!(blocks.iter().any(|b| matches!(b, ContentBlock::ToolUse { name, .. } if name == "read_file")));
            }
            _ => panic!("expected blocks"),
        }

        match &request.messages[2].content {
            MessageContent::Blocks(blocks) => {
                assert!(blocks.iter().any(|b| matches!(b, ContentBlock::ToolResult { tool_use_id, .. } if tool_use_id == "call-1")));
            }
            _ => panic!("expected tool result blocks"),
        }
    }

    #[test]
    fn error_tool_result_round_trips_is_error_flag() {
        let temp = tempdir().unwrap();
        let store = ThreadStore::open(temp.path().to_path_buf());
        let mut manager = ConversationManager::new_for_phase(&store, "thread-1", "coding", "sys").unwrap();

        manager.append_tool_result("call-1", "boom", true);
        let request = manager.to_completion_request(vec![], 1000);

        match &request.messages[0].content {
            MessageContent::Blocks(blocks) => {
                assert!(blocks.iter().any(|b| matches!(b, ContentBlock::ToolResult { is_error, content, .. } if *is_error && content == "boom")));
            }
            _ => panic!("expected tool result blocks"),
        }
    }

    #[test]
    fn snapshot_persists_thread_for_later_reload() {
        let temp = tempdir().unwrap();
        let store = ThreadStore::open(temp.path().to_path_buf());
        let mut manager = ConversationManager::new_for_phase(&store, "thread-1", "coding", "sys").unwrap();
        manager.append_user("hello");
        manager.snapshot(&store).unwrap();

        let reloaded = ConversationManager::new_for_phase(&store, "thread-1", "coding", "sys").unwrap();
        assert_eq!(reloaded.message_count(), 2);
    }
}
