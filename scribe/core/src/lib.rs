//! Scribe Core - Streaming Structured Edits
//!
//! This crate asks a generation service to edit a selection of a document
//! and applies the reply while it is still streaming. The reply is a JSON
//! document of the form `{"parts": [...]}`; each element is decoded and
//! handed over the moment its object closes.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   LlmRequest   ┌──────────────────────────────────┐
//! │    prompt    │ ─────────────▶ │ backend (OpenAI, replay)         │
//! │  + schema    │                └───────────────┬──────────────────┘
//! └──────▲───────┘                                │ Fragment
//!        │                                        ▼
//! ┌──────┴───────┐   ReplyPart    ┌──────────────────────────────────┐
//! │    editor    │ ◀───────────── │ stream: adapter → relay →        │
//! │ (apply_part) │                │         tokenizer → PartStream   │
//! └──────────────┘                └──────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`stream::PartStream`]: one reply being decoded
//! - [`parts::ReplyPart`]: a decoded element
//! - [`backend::LlmBackend`]: where fragments come from
//! - [`editor::EditorSession`]: where parts are applied
//!
//! # Module Overview
//!
//! - [`backend`]: generation service clients
//! - [`config`]: layered configuration
//! - [`editor`]: documents and cumulative part application
//! - [`parts`]: the reply element types and their decoding
//! - [`prompt`]: request construction
//! - [`schema`]: request item and reply schemas
//! - [`stream`]: the incremental decoder

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod config;
pub mod editor;
pub mod parts;
pub mod prompt;
pub mod schema;
pub mod stream;

pub use config::{load_config, ScribeConfig};
pub use editor::{apply_part, EditorSession, TextBuffer};
pub use parts::{PartKind, ReplyPart};
pub use stream::{ErrorKind, PartStream, ReplyError};
