//! Event Adapter
//!
//! Turns a backend's fragment channel into an ordered sequence of text
//! chunks that ends exactly once: normally on [`Fragment::Done`], or with
//! a [`TransportError`].

use tokio::sync::mpsc;
use tracing::debug;

use crate::backend::{Fragment, TransportError};

/// Normalized view of an upstream fragment channel
#[derive(Debug)]
pub struct EventAdapter {
    rx: mpsc::Receiver<Fragment>,
    finished: bool,
}

impl EventAdapter {
    /// Wrap the receiver returned by a backend
    #[must_use]
    pub fn new(rx: mpsc::Receiver<Fragment>) -> Self {
        Self {
            rx,
            finished: false,
        }
    }

    /// Next text chunk
    ///
    /// Returns `None` after the upstream signalled completion. A channel
    /// that closes without a completion signal yields
    /// [`TransportError::UnexpectedTermination`]. Once `None` or an error
    /// has been returned, every later call returns `None`.
    pub async fn next(&mut self) -> Option<Result<String, TransportError>> {
        if self.finished {
            return None;
        }
        let item = match self.rx.recv().await {
            Some(Fragment::Text(text)) => return Some(Ok(text)),
            Some(Fragment::Done) => None,
            Some(Fragment::Error(error)) => Some(Err(error)),
            None => Some(Err(TransportError::UnexpectedTermination)),
        };
        self.finished = true;
        item
    }

    /// Stop drawing from the upstream
    ///
    /// Closes the channel so the backend task observes it and drops its
    /// connection. Fragments already buffered are discarded.
    pub fn cancel(&mut self) {
        if !self.finished {
            debug!("Cancelling upstream fragment stream");
        }
        self.finished = true;
        self.rx.close();
    }

    /// Whether the sequence has ended
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_text_then_done() {
        let (tx, rx) = mpsc::channel(4);
        tx.send(Fragment::Text("{\"parts\"".into())).await.unwrap();
        tx.send(Fragment::Text(":[]}".into())).await.unwrap();
        tx.send(Fragment::Done).await.unwrap();
        tx.send(Fragment::Text("ignored".into())).await.unwrap();

        let mut adapter = EventAdapter::new(rx);
        assert_eq!(adapter.next().await, Some(Ok("{\"parts\"".to_string())));
        assert_eq!(adapter.next().await, Some(Ok(":[]}".to_string())));
        assert_eq!(adapter.next().await, None);
        assert!(adapter.is_finished());
        assert_eq!(adapter.next().await, None);
    }

    #[tokio::test]
    async fn test_error_ends_sequence_once() {
        let (tx, rx) = mpsc::channel(4);
        tx.send(Fragment::Text("{".into())).await.unwrap();
        tx.send(Fragment::Error(TransportError::DeadlineExceeded))
            .await
            .unwrap();

        let mut adapter = EventAdapter::new(rx);
        assert_eq!(adapter.next().await, Some(Ok("{".to_string())));
        assert_eq!(
            adapter.next().await,
            Some(Err(TransportError::DeadlineExceeded))
        );
        assert_eq!(adapter.next().await, None);
    }

    #[tokio::test]
    async fn test_closed_channel_is_unexpected_termination() {
        let (tx, rx) = mpsc::channel(4);
        tx.send(Fragment::Text("{\"parts\":[".into())).await.unwrap();
        drop(tx);

        let mut adapter = EventAdapter::new(rx);
        assert!(matches!(adapter.next().await, Some(Ok(_))));
        assert_eq!(
            adapter.next().await,
            Some(Err(TransportError::UnexpectedTermination))
        );
        assert_eq!(adapter.next().await, None);
    }

    #[tokio::test]
    async fn test_cancel_closes_upstream() {
        let (tx, rx) = mpsc::channel(4);
        let mut adapter = EventAdapter::new(rx);

        adapter.cancel();
        assert!(tx.is_closed());
        assert!(tx.send(Fragment::Done).await.is_err());
        assert_eq!(adapter.next().await, None);
    }
}
