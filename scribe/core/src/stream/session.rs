//! Decode Session
//!
//! [`PartStream`] ties one backend reply to the caller:
//!
//! ```text
//!   Receiver<Fragment> ─▶ EventAdapter ─▶ pump task ─▶ RelayWriter
//!                                                          │
//!   caller ◀─ ReplyPart ◀─ walker ◀─ Tokenizer ◀─ RelayReader ─▶ Capture
//! ```
//!
//! The pump runs as its own task. The walker runs inside [`PartStream::next`]
//! on the caller's task, reads the `{"parts": [` envelope once, and then
//! decodes one array element per call. Nothing past the closing `]` is read.
//!
//! Dropping the stream (or calling [`PartStream::cancel`]) closes the relay
//! reader; the pump notices on its next write or while waiting for the next
//! fragment, cancels the adapter, and exits.

use futures::Stream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use super::adapter::EventAdapter;
use super::error::{DecodeError, ReplyError};
use super::relay::{self, Capture, RelayReader, RelayWriter};
use super::tokenizer::{Token, TokenKind, Tokenizer};
use crate::backend::{Fragment, LlmBackend, LlmRequest};
use crate::parts::ReplyPart;

/// The only key the envelope object must start with
const PARTS_KEY: &str = "parts";

/// Lifecycle of a decode session
///
/// ```text
///   Idle ─▶ ReadingEnvelope ─▶ ReadingElement ─▶ Closed
///     │            │                 │
///     └────────────┴─────────────────┴──▶ Failed | Cancelled
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing read yet
    Idle,
    /// Reading `{"parts": [`
    ReadingEnvelope,
    /// Inside the array
    ReadingElement,
    /// The array closed normally
    Closed,
    /// A fatal error was returned
    Failed,
    /// The caller stopped early
    Cancelled,
}

impl SessionState {
    /// Whether the session can make no further progress
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Failed | Self::Cancelled)
    }
}

/// Lazily decoded sequence of reply parts for one request
pub struct PartStream {
    tokenizer: Tokenizer<RelayReader>,
    state: SessionState,
    capture: Capture,
    session_id: Uuid,
    producer: Option<JoinHandle<()>>,
    /// A `next` call was dropped before it finished
    busy: bool,
}

impl PartStream {
    /// Start decoding the fragments arriving on `rx`
    ///
    /// Spawns the producer task, so this must be called from within a Tokio
    /// runtime.
    #[must_use]
    pub fn spawn(rx: mpsc::Receiver<Fragment>) -> Self {
        let capture = Capture::new();
        let (writer, reader) = relay::channel(capture.clone());
        let session_id = Uuid::new_v4();
        let producer = tokio::spawn(pump(EventAdapter::new(rx), writer, session_id));

        debug!(session = %session_id, "Decode session started");

        Self {
            tokenizer: Tokenizer::new(reader),
            state: SessionState::Idle,
            capture,
            session_id,
            producer: Some(producer),
            busy: false,
        }
    }

    /// Send `request` to `backend` and decode its reply
    ///
    /// # Errors
    ///
    /// Returns the backend's error if the request could not be started.
    pub async fn start(backend: &dyn LlmBackend, request: &LlmRequest) -> anyhow::Result<Self> {
        let rx = backend.send_streaming(request).await?;
        debug!(backend = backend.name(), model = %request.model, "Reply stream opened");
        Ok(Self::spawn(rx))
    }

    /// Decode the next part
    ///
    /// Returns `None` once the `parts` array has closed, or after the
    /// session has failed or been cancelled. The first error ends the
    /// session and carries everything captured up to that point.
    ///
    /// Not cancel-safe: if the returned future is dropped before it
    /// completes, the session is cancelled.
    pub async fn next(&mut self) -> Option<Result<ReplyPart, ReplyError>> {
        if self.state.is_terminal() {
            return None;
        }
        if self.busy {
            warn!(session = %self.session_id, "Previous read was interrupted, cancelling session");
            self.shutdown(SessionState::Cancelled);
            return None;
        }

        self.busy = true;
        let result = self.step().await;
        self.busy = false;

        match result {
            Ok(Some(part)) => {
                trace!(session = %self.session_id, kind = %part.kind(), "Decoded part");
                Some(Ok(part))
            }
            Ok(None) => {
                debug!(
                    session = %self.session_id,
                    bytes = self.capture.len(),
                    "Reply complete"
                );
                self.shutdown(SessionState::Closed);
                None
            }
            Err(error) => Some(Err(self.fail(error))),
        }
    }

    /// Walk one step: the envelope if not yet read, then one element
    async fn step(&mut self) -> Result<Option<ReplyPart>, DecodeError> {
        if self.state == SessionState::Idle {
            self.transition(SessionState::ReadingEnvelope);
            self.read_envelope().await?;
            self.transition(SessionState::ReadingElement);
        }

        match self.tokenizer.peek_kind().await? {
            TokenKind::ArrayEnd => {
                self.tokenizer.read_token().await?;
                Ok(None)
            }
            TokenKind::ObjectStart => {
                let raw = self.tokenizer.read_raw_value().await?;
                ReplyPart::decode(&raw).map(Some)
            }
            TokenKind::End => Err(DecodeError::Truncated {
                offset: self.tokenizer.offset(),
            }),
            found => Err(DecodeError::UnexpectedToken {
                offset: self.tokenizer.offset(),
                expected: TokenKind::ObjectStart,
                found,
            }),
        }
    }

    async fn read_envelope(&mut self) -> Result<(), DecodeError> {
        self.expect(TokenKind::ObjectStart).await?;

        if let (offset, Token::Key(key)) = self.expect(TokenKind::Key).await? {
            if key != PARTS_KEY {
                return Err(DecodeError::UnexpectedKey {
                    offset,
                    expected: PARTS_KEY,
                    found: key,
                });
            }
        }

        self.expect(TokenKind::ArrayStart).await?;
        Ok(())
    }

    /// Consume the next token, which must be of `expected` kind, and return
    /// it with its offset
    async fn expect(&mut self, expected: TokenKind) -> Result<(usize, Token), DecodeError> {
        let found = self.tokenizer.peek_kind().await?;
        let offset = self.tokenizer.offset();
        if found == TokenKind::End {
            return Err(DecodeError::Truncated { offset });
        }
        if found != expected {
            return Err(DecodeError::UnexpectedToken {
                offset,
                expected,
                found,
            });
        }
        Ok((offset, self.tokenizer.read_token().await?))
    }

    fn fail(&mut self, error: DecodeError) -> ReplyError {
        self.shutdown(SessionState::Failed);
        let captured = self.capture.to_string_lossy();
        warn!(
            session = %self.session_id,
            kind = %error.kind(),
            error = %error,
            bytes = captured.len(),
            "Decode session failed"
        );
        ReplyError::new(error, captured)
    }

    /// Enter a terminal state and release the producer
    fn shutdown(&mut self, state: SessionState) {
        if self.state.is_terminal() {
            return;
        }
        self.transition(state);
        self.tokenizer.source_mut().close();
    }

    fn transition(&mut self, next: SessionState) {
        debug!(session = %self.session_id, from = ?self.state, to = ?next, "Decode session transition");
        self.state = next;
    }

    /// Stop decoding and wait for the producer task to exit
    pub async fn cancel(mut self) {
        self.shutdown(SessionState::Cancelled);
        if let Some(producer) = self.producer.take() {
            if let Err(e) = producer.await {
                warn!(session = %self.session_id, error = %e, "Producer task did not exit cleanly");
            }
        }
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Everything received so far
    #[must_use]
    pub fn capture(&self) -> &Capture {
        &self.capture
    }

    /// Identifier used in this session's log events
    #[must_use]
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Adapt into a [`Stream`] of parts
    ///
    /// Dropping the stream cancels the session.
    pub fn into_stream(self) -> impl Stream<Item = Result<ReplyPart, ReplyError>> + Send {
        futures::stream::unfold(self, |mut parts| async move {
            let item = parts.next().await?;
            Some((item, parts))
        })
    }
}

impl Drop for PartStream {
    fn drop(&mut self) {
        if !self.state.is_terminal() {
            debug!(session = %self.session_id, "Decode session dropped before completion");
            self.shutdown(SessionState::Cancelled);
        }
    }
}

impl std::fmt::Debug for PartStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartStream")
            .field("session_id", &self.session_id)
            .field("state", &self.state)
            .field("captured", &self.capture.len())
            .finish_non_exhaustive()
    }
}

/// Producer task: forward fragments into the relay until the upstream ends
/// or the reader goes away
async fn pump(mut adapter: EventAdapter, writer: RelayWriter, session: Uuid) {
    loop {
        let item = tokio::select! {
            () = writer.closed() => {
                debug!(session = %session, "Decoder stopped reading, releasing upstream");
                adapter.cancel();
                return;
            }
            item = adapter.next() => item,
        };

        match item {
            Some(Ok(text)) => {
                if writer.write(text.into_bytes()).await.is_err() {
                    debug!(session = %session, "Decoder stopped reading, releasing upstream");
                    adapter.cancel();
                    return;
                }
            }
            Some(Err(error)) => {
                debug!(session = %session, error = %error, "Upstream failed");
                writer.fail(error).await;
                return;
            }
            None => {
                trace!(session = %session, "Upstream complete");
                writer.finish();
                return;
            }
        }
    }
}
