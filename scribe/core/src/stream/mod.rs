//! Streaming reply decoding
//!
//! Decodes a `{"parts": [...]}` reply while it is still being generated,
//! handing each element to the caller as soon as its object closes.
//!
//! # Pipeline
//!
//! ```text
//!   backend ─▶ EventAdapter ─▶ relay ─▶ Tokenizer ─▶ PartStream ─▶ caller
//!                                │
//!                                └─▶ Capture (raw text for diagnostics)
//! ```
//!
//! - The relay holds at most one chunk, so the backend cannot run ahead of
//!   the decoder by more than that.
//! - Only the element currently being decoded is buffered.
//! - Dropping the [`PartStream`] tears the whole pipeline down.
//!
//! # Example
//!
//! ```no_run
//! # async fn run(rx: tokio::sync::mpsc::Receiver<scribe_core::backend::Fragment>) {
//! use scribe_core::stream::PartStream;
//!
//! let mut parts = PartStream::spawn(rx);
//! while let Some(part) = parts.next().await {
//!     match part {
//!         Ok(part) => println!("{}: {}", part.kind(), part.text()),
//!         Err(e) => eprintln!("{e}\n{}", e.captured()),
//!     }
//! }
//! # }
//! ```

mod adapter;
mod error;
pub mod relay;
mod session;
pub mod tokenizer;

pub use adapter::EventAdapter;
pub use error::{DecodeError, ErrorKind, ReplyError};
pub use relay::Capture;
pub use session::{PartStream, SessionState};
pub use tokenizer::{Token, TokenKind, Tokenizer};
