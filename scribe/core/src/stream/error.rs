//! Decode Errors
//!
//! Every way a decode session can fail, grouped into the four categories
//! callers act on:
//!
//! ```text
//!   DecodeError                      ErrorKind
//!   ├── Transport(TransportError)    Transport       ← upstream failure / early end
//!   ├── Syntax                       Protocol        ← malformed JSON
//!   ├── Truncated                    Protocol        ← input ended mid-document
//!   ├── UnexpectedToken              Protocol        ← envelope/array shape wrong
//!   ├── UnexpectedKey                Protocol        ← envelope key is not "parts"
//!   ├── UnknownVariant               UnknownVariant  ← unrecognized "type" tag
//!   ├── Discriminator                ElementDecode   ← "type" is not a string
//!   └── Element                      ElementDecode   ← known tag, bad fields
//! ```
//!
//! All of them are fatal to the session. The error handed to the caller is
//! a [`ReplyError`], which also carries the raw reply text captured so far.

use thiserror::Error;

use super::tokenizer::TokenKind;
use crate::backend::TransportError;

/// Coarse classification of a [`DecodeError`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// The upstream stream failed or ended early
    Transport,
    /// The reply is not a well-formed `{"parts": [...]}` document
    Protocol,
    /// An element named a variant that does not exist
    UnknownVariant,
    /// An element of a known variant could not be decoded
    ElementDecode,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport => write!(f, "transport"),
            Self::Protocol => write!(f, "protocol"),
            Self::UnknownVariant => write!(f, "unknown variant"),
            Self::ElementDecode => write!(f, "element decode"),
        }
    }
}

/// Errors raised while decoding a streamed reply
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The fragment stream failed
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The byte stream is not valid JSON
    #[error("invalid JSON at offset {offset}: {reason}")]
    Syntax {
        /// Absolute byte offset into the reply
        offset: usize,
        /// What was wrong
        reason: String,
    },

    /// The input ended before the document was complete
    #[error("unexpected end of reply at offset {offset}")]
    Truncated {
        /// Number of bytes received
        offset: usize,
    },

    /// A structurally valid token appeared where another was required
    #[error("unexpected token at offset {offset}; want {expected} but got {found}")]
    UnexpectedToken {
        /// Absolute byte offset of the token
        offset: usize,
        /// What the envelope requires here
        expected: TokenKind,
        /// What was actually read
        found: TokenKind,
    },

    /// The envelope key is not the expected one
    #[error("unexpected key at offset {offset}; want {expected:?} but got {found:?}")]
    UnexpectedKey {
        /// Absolute byte offset of the key
        offset: usize,
        /// Required key
        expected: &'static str,
        /// Key that was read
        found: String,
    },

    /// The element's discriminator names no known variant
    #[error("unknown discrimination type {tag:?}")]
    UnknownVariant {
        /// The offending `type` value
        tag: String,
    },

    /// The element's discriminator is present but neither a string nor `null`
    #[error("cannot read part type: {0}")]
    Discriminator(#[source] serde_json::Error),

    /// The element's fields do not match its variant
    #[error("cannot decode {tag:?} part: {source}")]
    Element {
        /// The element's `type` value
        tag: &'static str,
        /// Underlying field error
        #[source]
        source: serde_json::Error,
    },
}

impl DecodeError {
    /// Classify this error
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(_) => ErrorKind::Transport,
            Self::Syntax { .. }
            | Self::Truncated { .. }
            | Self::UnexpectedToken { .. }
            | Self::UnexpectedKey { .. } => ErrorKind::Protocol,
            Self::UnknownVariant { .. } => ErrorKind::UnknownVariant,
            Self::Discriminator(_) | Self::Element { .. } => ErrorKind::ElementDecode,
        }
    }
}

/// Terminal error of a decode session
///
/// Wraps the [`DecodeError`] together with a snapshot of every byte the
/// decoder received before failing, so the raw (possibly partial) reply can
/// be shown instead of discarded.
#[derive(Debug, Error)]
#[error("{source}")]
pub struct ReplyError {
    source: DecodeError,
    captured: String,
}

impl ReplyError {
    /// Wrap a decode error with the captured reply text
    pub fn new(source: DecodeError, captured: impl Into<String>) -> Self {
        Self {
            source,
            captured: captured.into(),
        }
    }

    /// Classify the underlying error
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.source.kind()
    }

    /// The underlying decode error
    #[must_use]
    pub fn decode_error(&self) -> &DecodeError {
        &self.source
    }

    /// Raw reply text received before the failure
    #[must_use]
    pub fn captured(&self) -> &str {
        &self.captured
    }

    /// Split into the decode error and the captured text
    #[must_use]
    pub fn into_parts(self) -> (DecodeError, String) {
        (self.source, self.captured)
    }
}
