//! OpenAI Backend Implementation
//!
//! Streams structured replies from the OpenAI Responses API.
//!
//! # Responses API
//!
//! - `POST /responses` with `stream: true` returns a server-sent event body
//! - `response.output_text.delta` events carry reply text
//! - `response.completed` ends a successful reply
//! - `response.failed`, `response.incomplete` and `error` end a failed one
//!
//! Every other event (`response.created`, `response.output_item.added`, ...)
//! is ignored.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::sse::{SseBuffer, SseEvent};
use super::traits::{Fragment, LlmBackend, LlmRequest, TransportError};
use crate::config::ScribeConfig;

/// Fragments buffered between the HTTP task and the decoder
const FRAGMENT_BUFFER: usize = 100;

/// OpenAI backend client
#[derive(Clone)]
pub struct OpenAiBackend {
    /// API base URL, without trailing slash
    base_url: String,
    /// Bearer token
    api_key: String,
    /// HTTP client
    http_client: reqwest::Client,
}

impl OpenAiBackend {
    /// Create a new OpenAI backend
    ///
    /// `timeout` bounds the whole request, including the streamed body.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let base_url: String = base_url.into();
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            http_client: reqwest::Client::builder().timeout(timeout).build()?,
        })
    }

    /// Create from configuration, reading the API key from the configured
    /// environment variable
    ///
    /// # Errors
    ///
    /// Returns an error if the API key variable is unset or empty.
    pub fn from_config(config: &ScribeConfig) -> anyhow::Result<Self> {
        let key_var = &config.backend.api_key_env;
        let api_key = std::env::var(key_var).unwrap_or_default();
        if api_key.is_empty() {
            anyhow::bail!("no value set for ${key_var}");
        }
        Self::new(&config.backend.base_url, api_key, config.backend.timeout)
    }

    /// Get the responses endpoint URL
    fn responses_url(&self) -> String {
        format!("{}/responses", self.base_url)
    }
}

/// Build the JSON body for a streaming responses request
fn request_body(request: &LlmRequest) -> Value {
    let content: Vec<Value> = request
        .inputs
        .iter()
        .map(|text| json!({ "type": "input_text", "text": text }))
        .collect();

    let mut body = json!({
        "model": request.model,
        "stream": true,
        "input": [{ "role": "user", "content": content }],
    });

    if let Some(ref system) = request.system {
        body["instructions"] = json!(system);
    }
    if let Some(ref schema) = request.response_schema {
        body["text"] = json!({
            "format": {
                "type": "json_schema",
                "name": "reply",
                "strict": true,
                "schema": schema,
            }
        });
    }
    if request.max_tokens > 0 {
        body["max_output_tokens"] = json!(request.max_tokens);
    }
    body
}

/// Map one SSE event to a fragment; `None` for events that carry nothing
/// the decoder needs.
fn fragment_for(event: &SseEvent) -> Option<Fragment> {
    let data: Value = match serde_json::from_str(&event.data) {
        Ok(v) => v,
        Err(e) => {
            debug!(error = %e, "Ignoring non-JSON event data");
            return None;
        }
    };
    let name = event
        .event
        .as_deref()
        .or_else(|| data.get("type").and_then(Value::as_str))?;

    match name {
        "response.output_text.delta" => data
            .get("delta")
            .and_then(Value::as_str)
            .map(|delta| Fragment::Text(delta.to_string())),
        "response.completed" => Some(Fragment::Done),
        "response.failed" => {
            let message = data
                .pointer("/response/error/message")
                .and_then(Value::as_str)
                .unwrap_or("response failed");
            Some(Fragment::Error(TransportError::Upstream(message.to_string())))
        }
        "response.incomplete" => {
            let reason = data
                .pointer("/response/incomplete_details/reason")
                .and_then(Value::as_str)
                .unwrap_or("unknown reason");
            Some(Fragment::Error(TransportError::Upstream(format!(
                "response incomplete: {reason}"
            ))))
        }
        "error" => {
            let message = data
                .get("message")
                .or_else(|| data.pointer("/error/message"))
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            Some(Fragment::Error(TransportError::Upstream(message.to_string())))
        }
        _ => None,
    }
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    fn name(&self) -> &str {
        "OpenAI"
    }

    async fn send_streaming(
        &self,
        request: &LlmRequest,
    ) -> anyhow::Result<mpsc::Receiver<Fragment>> {
        let (tx, rx) = mpsc::channel(FRAGMENT_BUFFER);

        let response = self
            .http_client
            .post(self.responses_url())
            .bearer_auth(&self.api_key)
            .json(&request_body(request))
            .send()
            .await?;

        // Check for HTTP errors
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("OpenAI returned {status}: {body}");
        }

        let mut stream = response.bytes_stream();

        // Spawn task to process stream
        tokio::spawn(async move {
            let mut sse = SseBuffer::new();

            loop {
                let chunk = tokio::select! {
                    () = tx.closed() => {
                        debug!("Fragment receiver closed, dropping response stream");
                        return;
                    }
                    chunk = stream.next() => chunk,
                };

                match chunk {
                    Some(Ok(bytes)) => {
                        sse.push_chunk(&bytes);
                        while let Some(event) = sse.next_event() {
                            let Some(fragment) = fragment_for(&event) else {
                                continue;
                            };
                            let terminal = !matches!(fragment, Fragment::Text(_));
                            if tx.send(fragment).await.is_err() || terminal {
                                return;
                            }
                        }
                    }
                    Some(Err(e)) => {
                        let error = if e.is_timeout() {
                            TransportError::DeadlineExceeded
                        } else {
                            TransportError::Upstream(e.to_string())
                        };
                        warn!(error = %error, "Response stream failed");
                        let _ = tx.send(Fragment::Error(error)).await;
                        return;
                    }
                    // Ended without a completion event; the receiver sees
                    // the channel close and reports it.
                    None => {
                        if sse.has_remaining() {
                            debug!("Response stream ended mid-event");
                        }
                        return;
                    }
                }
            }
        });

        Ok(rx)
    }
}
