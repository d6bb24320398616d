//! LLM Backend Integration
//!
//! This module provides access to the generation service through a common
//! trait interface. A backend only has to deliver an ordered channel of
//! [`Fragment`]s; decoding happens in [`crate::stream`].
//!
//! # Available Backends
//!
//! - **OpenAI**: Responses API with structured (JSON schema) output
//! - **Replay**: re-streams a previously captured reply
//!
//! # Usage
//!
//! ```ignore
//! use scribe_core::backend::{LlmBackend, LlmRequest, OpenAiBackend};
//!
//! let backend = OpenAiBackend::from_config(&config)?;
//! let request = LlmRequest::new("gpt-4.1-mini").with_input("Hello!");
//! let rx = backend.send_streaming(&request).await?;
//! ```

mod openai;
mod replay;
mod sse;
mod traits;

pub use openai::OpenAiBackend;
pub use replay::{ReplayBackend, DEFAULT_CHUNK_CHARS};
pub use traits::{Fragment, LlmBackend, LlmRequest, TransportError};
