//! Replay Backend
//!
//! Streams previously captured reply text back through the normal fragment
//! channel, in fixed-size chunks. Used to re-run decoding against a reply
//! saved from a failed session without contacting the service.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use super::traits::{Fragment, LlmBackend, LlmRequest};

/// Default chunk size in characters
pub const DEFAULT_CHUNK_CHARS: usize = 16;

/// Backend that replays fixed text
#[derive(Clone, Debug)]
pub struct ReplayBackend {
    /// Reply text to replay
    text: String,
    /// Characters per fragment (at least 1)
    chunk_chars: usize,
}

impl ReplayBackend {
    /// Create a replay backend with the given chunk size
    pub fn new(text: impl Into<String>, chunk_chars: usize) -> Self {
        Self {
            text: text.into(),
            chunk_chars: chunk_chars.max(1),
        }
    }

    /// Split the text into fragments on character boundaries
    #[must_use]
    pub fn chunks(&self) -> Vec<String> {
        let chars: Vec<char> = self.text.chars().collect();
        chars
            .chunks(self.chunk_chars)
            .map(|c| c.iter().collect())
            .collect()
    }
}

#[async_trait]
impl LlmBackend for ReplayBackend {
    fn name(&self) -> &str {
        "Replay"
    }

    async fn send_streaming(
        &self,
        request: &LlmRequest,
    ) -> anyhow::Result<mpsc::Receiver<Fragment>> {
        let (tx, rx) = mpsc::channel(1);
        let chunks = self.chunks();
        debug!(model = %request.model, fragments = chunks.len(), "Replaying captured reply");

        tokio::spawn(async move {
            for chunk in chunks {
                if tx.send(Fragment::Text(chunk)).await.is_err() {
                    // Receiver dropped, stop streaming
                    return;
                }
            }
            let _ = tx.send(Fragment::Done).await;
        });

        Ok(rx)
    }
}
