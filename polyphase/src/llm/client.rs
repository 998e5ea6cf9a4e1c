//! `LlmClient` trait definition.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{CompletionRequest, CompletionResponse, LlmError, StreamChunk};

/// Stateless LLM client - each call is independent. `PhaseRunner` supplies
/// the full growing message list on every call (see `polyphase::conversation`);
/// the client itself holds no conversation state between calls.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    async fn stream(
        &self,
        request: CompletionRequest,
        chunk_tx: mpsc::Sender<StreamChunk>,
    ) -> Result<CompletionResponse, LlmError>;
}

/// Mock client for `PhaseRunner` tests: replays a fixed script of responses.
pub struct MockLlmClient {
    responses: std::sync::Mutex<Vec<CompletionResponse>>,
    call_count: std::sync::atomic::AtomicUsize,
}

impl MockLlmClient {
    pub fn new(responses: Vec<CompletionResponse>) -> Self {
        Self {
            responses: std::sync::Mutex::new(responses),
            call_count: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.call_count.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Err(LlmError::InvalidResponse("no more mock responses".to_string()));
        }
        Ok(responses.remove(0))
    }

    async fn stream(
        &self,
        request: CompletionRequest,
        _chunk_tx: mpsc::Sender<StreamChunk>,
    ) -> Result<CompletionResponse, LlmError> {
        self.complete(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{StopReason, TokenUsage};

    #[tokio::test]
    async fn mock_client_replays_responses_in_order() {
        let client = MockLlmClient::new(vec![
            CompletionResponse {
                content: Some("first".into()),
                tool_calls: vec![],
                stop_reason: StopReason::EndTurn,
                usage: TokenUsage::default(),
            },
            CompletionResponse {
                content: Some("second".into()),
                tool_calls: vec![],
                stop_reason: StopReason::EndTurn,
                usage: TokenUsage::default(),
            },
        ]);

        let req = CompletionRequest {
            system_prompt: "test".into(),
            messages: vec![],
            tools: vec![],
            max_tokens: 100,
        };

        assert_eq!(client.complete(req.clone()).await.unwrap().content.as_deref(), Some("first"));
        assert_eq!(client.complete(req).await.unwrap().content.as_deref(), Some("second"));
        assert_eq!(client.call_count(), 2);
    }

    #[tokio::test]
    async fn mock_client_errors_when_exhausted() {
        let client = MockLlmClient::new(vec![]);
        let req = CompletionRequest {
            system_prompt: "test".into(),
            messages: vec![],
            tools: vec![],
            max_tokens: 100,
        };
        assert!(client.complete(req).await.is_err());
    }
}
