//! Tee Relay
//!
//! Moves reply bytes from the producer task to the decoder through a
//! one-slot channel, copying every byte into a [`Capture`] as it is handed
//! over.
//!
//! ```text
//!   RelayWriter ──[ 1 chunk ]──▶ RelayReader ──▶ Tokenizer
//!                                    │
//!                                    ▼
//!                                 Capture
//! ```
//!
//! - A write waits while the previous chunk is still unread, so the
//!   producer is never more than one chunk ahead of the decoder.
//! - Closing or dropping the reader fails any pending and future writes.
//! - An upstream error is queued behind the chunks already written and
//!   surfaces on the read that reaches it.

use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::backend::TransportError;

/// Append-only copy of every byte handed to the decoder
#[derive(Clone, Debug, Default)]
pub struct Capture {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl Capture {
    /// Create an empty capture
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn append(&self, chunk: &[u8]) {
        self.bytes.lock().extend_from_slice(chunk);
    }

    /// Number of bytes captured
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.lock().len()
    }

    /// Whether nothing has been captured yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.lock().is_empty()
    }

    /// Copy of the captured bytes
    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> {
        self.bytes.lock().clone()
    }

    /// Captured bytes as text, replacing invalid UTF-8
    #[must_use]
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.bytes.lock()).into_owned()
    }
}

/// The reading side of the relay has gone away
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("relay reader closed")]
pub struct RelayClosed;

type Item = Result<Vec<u8>, TransportError>;

/// Create a relay whose reader tees into `capture`
#[must_use]
pub fn channel(capture: Capture) -> (RelayWriter, RelayReader) {
    let (tx, rx) = mpsc::channel(1);
    (
        RelayWriter { tx },
        RelayReader {
            rx,
            capture,
            finished: false,
        },
    )
}

/// Producer half of the relay
#[derive(Debug)]
pub struct RelayWriter {
    tx: mpsc::Sender<Item>,
}

impl RelayWriter {
    /// Hand a chunk to the reader, waiting while the previous one is unread
    ///
    /// # Errors
    ///
    /// Returns [`RelayClosed`] once the reader is closed or dropped,
    /// including while this write is waiting.
    pub async fn write(&self, chunk: Vec<u8>) -> Result<(), RelayClosed> {
        if chunk.is_empty() {
            return if self.tx.is_closed() {
                Err(RelayClosed)
            } else {
                Ok(())
            };
        }
        self.tx.send(Ok(chunk)).await.map_err(|_| RelayClosed)
    }

    /// End the stream with an upstream error
    pub async fn fail(self, error: TransportError) {
        // A closed reader has already stopped caring
        let _ = self.tx.send(Err(error)).await;
    }

    /// End the stream normally
    pub fn finish(self) {
        drop(self);
    }

    /// Resolves once the reader is closed or dropped
    pub async fn closed(&self) {
        self.tx.closed().await;
    }

    /// Whether the reader is closed or dropped
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer half of the relay
#[derive(Debug)]
pub struct RelayReader {
    rx: mpsc::Receiver<Item>,
    capture: Capture,
    finished: bool,
}

impl RelayReader {
    /// Receive the next chunk
    ///
    /// Returns `Ok(None)` once the writer has finished normally. The chunk
    /// is appended to the capture before it is returned.
    ///
    /// # Errors
    ///
    /// Returns the upstream error the writer failed with. After the first
    /// `None` or error every further call returns `Ok(None)`.
    pub async fn read(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        if self.finished {
            return Ok(None);
        }
        match self.rx.recv().await {
            Some(Ok(chunk)) => {
                self.capture.append(&chunk);
                Ok(Some(chunk))
            }
            Some(Err(error)) => {
                self.finished = true;
                Err(error)
            }
            None => {
                self.finished = true;
                Ok(None)
            }
        }
    }

    /// Stop reading; pending and future writes fail
    pub fn close(&mut self) {
        self.finished = true;
        self.rx.close();
    }

    /// The capture this reader tees into
    #[must_use]
    pub fn capture(&self) -> &Capture {
        &self.capture
    }
}
