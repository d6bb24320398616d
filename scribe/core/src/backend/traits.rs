//! LLM Backend Traits
//!
//! Trait definitions for the generation services that produce reply text.
//! A backend turns an [`LlmRequest`] into an ordered channel of
//! [`Fragment`]s; everything downstream (decoding, applying edits) only ever
//! sees that channel.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

/// Failures reported by the upstream stream itself.
///
/// These are never retried by the decoder; they end the decode session
/// immediately.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The service reported an error mid-stream
    #[error("streaming error: {0}")]
    Upstream(String),

    /// The stream stopped without a completion signal
    #[error("streaming error: unexpected end of stream")]
    UnexpectedTermination,

    /// The request deadline passed while the reply was still streaming
    #[error("streaming error: deadline exceeded")]
    DeadlineExceeded,
}

/// One event of a streamed reply, in arrival order
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Fragment {
    /// A chunk of reply text
    Text(String),
    /// The reply completed successfully
    Done,
    /// The stream failed
    Error(TransportError),
}

/// Configuration for an LLM request
#[derive(Clone, Debug, Default)]
pub struct LlmRequest {
    /// Model to use (backend-specific identifier)
    pub model: String,
    /// System instructions
    pub system: Option<String>,
    /// Input items, sent in order
    pub inputs: Vec<String>,
    /// JSON schema the reply must conform to
    pub response_schema: Option<serde_json::Value>,
    /// Maximum tokens in response (0 = default)
    pub max_tokens: u32,
}

impl LlmRequest {
    /// Create a new request for the given model
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    /// Set system instructions
    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Append an input item
    #[must_use]
    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.inputs.push(input.into());
        self
    }

    /// Constrain the reply to a JSON schema
    #[must_use]
    pub fn with_response_schema(mut self, schema: serde_json::Value) -> Self {
        self.response_schema = Some(schema);
        self
    }

    /// Set max tokens
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// LLM Backend trait
///
/// Implementations spawn their own producer task and must stop it once the
/// returned receiver is closed or dropped.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Get the backend name (e.g., "OpenAI")
    fn name(&self) -> &str;

    /// Send a request and get a streaming response
    ///
    /// The channel yields text fragments followed by exactly one terminal
    /// `Done` or `Error`. A channel that closes without either means the
    /// stream ended early.
    async fn send_streaming(
        &self,
        request: &LlmRequest,
    ) -> anyhow::Result<mpsc::Receiver<Fragment>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llm_request_builder() {
        let request = LlmRequest::new("gpt-4.1-mini")
            .with_system("Reply in JSON")
            .with_input("first")
            .with_input("second")
            .with_response_schema(serde_json::json!({"type": "object"}))
            .with_max_tokens(100);

        assert_eq!(request.model, "gpt-4.1-mini");
        assert_eq!(request.system.as_deref(), Some("Reply in JSON"));
        assert_eq!(request.inputs, vec!["first", "second"]);
        assert!(request.response_schema.is_some());
        assert_eq!(request.max_tokens, 100);
    }

    #[test]
    fn test_transport_error_display() {
        assert_eq!(
            TransportError::Upstream("boom".into()).to_string(),
            "streaming error: boom"
        );
        assert!(TransportError::UnexpectedTermination
            .to_string()
            .contains("unexpected end"));
        assert!(TransportError::DeadlineExceeded
            .to_string()
            .contains("deadline"));
    }
}
