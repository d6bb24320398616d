//! Reply Parts
//!
//! The elements of a structured reply's `parts` array. Each element is a
//! JSON object whose `type` field selects one of six shapes:
//!
//! | `type`             | Variant                    | Field         |
//! |--------------------|----------------------------|---------------|
//! | `instruction`      | `FurtherInstructionNeeded` | `message`     |
//! | `entire`           | `FullContent`              | `fullContent` |
//! | `commentary`       | `Commentary`               | `text`        |
//! | `selectionAppend`  | `SelectionAppend`          | `text`        |
//! | `selectionInsert`  | `SelectionInsert`          | `text`        |
//! | `selectionReplace` | `SelectionReplace`         | `text`        |
//!
//! Decoding reads the `type` first, then decodes the whole object again
//! against the matching shape. Unrecognized fields are ignored.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::stream::DecodeError;

/// The model needs more information before it can act
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FurtherInstructionNeeded {
    /// Question or explanation for the user
    pub message: String,
}

/// Replacement for the whole document
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullContent {
    /// New document body
    #[serde(rename = "fullContent", default, skip_serializing_if = "String::is_empty")]
    pub full_content: String,
}

/// Remarks about the edit that are not part of the document
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commentary {
    /// Remark text
    pub text: String,
}

/// Text to add after the selection
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionAppend {
    /// Text to add
    pub text: String,
}

/// Text to add before the selection
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionInsert {
    /// Text to add
    pub text: String,
}

/// Replacement for the selection
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionReplace {
    /// Replacement text
    pub text: String,
}

/// One decoded element of a reply
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum ReplyPart {
    /// `instruction`
    #[serde(rename = "instruction")]
    FurtherInstructionNeeded(FurtherInstructionNeeded),
    /// `entire`
    #[serde(rename = "entire")]
    FullContent(FullContent),
    /// `commentary`
    #[serde(rename = "commentary")]
    Commentary(Commentary),
    /// `selectionAppend`
    #[serde(rename = "selectionAppend")]
    SelectionAppend(SelectionAppend),
    /// `selectionInsert`
    #[serde(rename = "selectionInsert")]
    SelectionInsert(SelectionInsert),
    /// `selectionReplace`
    #[serde(rename = "selectionReplace")]
    SelectionReplace(SelectionReplace),
}

/// The discriminator of a [`ReplyPart`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PartKind {
    /// `instruction`
    Instruction,
    /// `entire`
    Entire,
    /// `commentary`
    Commentary,
    /// `selectionAppend`
    SelectionAppend,
    /// `selectionInsert`
    SelectionInsert,
    /// `selectionReplace`
    SelectionReplace,
}

impl PartKind {
    /// Every kind, in schema order
    pub const ALL: [PartKind; 6] = [
        PartKind::Instruction,
        PartKind::Entire,
        PartKind::SelectionAppend,
        PartKind::SelectionReplace,
        PartKind::SelectionInsert,
        PartKind::Commentary,
    ];

    /// Wire value of the `type` field
    #[must_use]
    pub fn as_tag(self) -> &'static str {
        match self {
            Self::Instruction => "instruction",
            Self::Entire => "entire",
            Self::Commentary => "commentary",
            Self::SelectionAppend => "selectionAppend",
            Self::SelectionInsert => "selectionInsert",
            Self::SelectionReplace => "selectionReplace",
        }
    }

    /// Look up a kind by its wire value
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "instruction" => Some(Self::Instruction),
            "entire" => Some(Self::Entire),
            "commentary" => Some(Self::Commentary),
            "selectionAppend" => Some(Self::SelectionAppend),
            "selectionInsert" => Some(Self::SelectionInsert),
            "selectionReplace" => Some(Self::SelectionReplace),
            _ => None,
        }
    }

    /// Decode a whole element as this kind
    fn decode(self, raw: &[u8]) -> Result<ReplyPart, DecodeError> {
        match self {
            Self::Instruction => body(self, raw).map(ReplyPart::FurtherInstructionNeeded),
            Self::Entire => body(self, raw).map(ReplyPart::FullContent),
            Self::Commentary => body(self, raw).map(ReplyPart::Commentary),
            Self::SelectionAppend => body(self, raw).map(ReplyPart::SelectionAppend),
            Self::SelectionInsert => body(self, raw).map(ReplyPart::SelectionInsert),
            Self::SelectionReplace => body(self, raw).map(ReplyPart::SelectionReplace),
        }
    }
}

impl std::fmt::Display for PartKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_tag())
    }
}

fn body<T: DeserializeOwned>(kind: PartKind, raw: &[u8]) -> Result<T, DecodeError> {
    serde_json::from_slice(raw).map_err(|source| DecodeError::Element {
        tag: kind.as_tag(),
        source,
    })
}

/// The discriminator alone, read before the element's real shape is known
#[derive(Debug, Deserialize)]
pub struct GenericReply {
    /// Value of the `type` field; absent and `null` both read as no tag
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

impl ReplyPart {
    /// Decode one complete element
    ///
    /// # Errors
    ///
    /// - [`DecodeError::Discriminator`] if `type` is neither a string nor `null`
    /// - [`DecodeError::UnknownVariant`] if `type` names no variant, including
    ///   a missing or `null` `type`, reported as the empty tag
    /// - [`DecodeError::Element`] if the fields do not fit the variant
    pub fn decode(raw: &[u8]) -> Result<Self, DecodeError> {
        let generic: GenericReply =
            serde_json::from_slice(raw).map_err(DecodeError::Discriminator)?;
        let tag = generic.kind.unwrap_or_default();
        match PartKind::from_tag(&tag) {
            Some(kind) => kind.decode(raw),
            None => Err(DecodeError::UnknownVariant { tag }),
        }
    }

    /// The variant's discriminator
    #[must_use]
    pub fn kind(&self) -> PartKind {
        match self {
            Self::FurtherInstructionNeeded(_) => PartKind::Instruction,
            Self::FullContent(_) => PartKind::Entire,
            Self::Commentary(_) => PartKind::Commentary,
            Self::SelectionAppend(_) => PartKind::SelectionAppend,
            Self::SelectionInsert(_) => PartKind::SelectionInsert,
            Self::SelectionReplace(_) => PartKind::SelectionReplace,
        }
    }

    /// The variant's payload text
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::FurtherInstructionNeeded(p) => &p.message,
            Self::FullContent(p) => &p.full_content,
            Self::Commentary(p) => &p.text,
            Self::SelectionAppend(p) => &p.text,
            Self::SelectionInsert(p) => &p.text,
            Self::SelectionReplace(p) => &p.text,
        }
    }

    /// Encode to the wire shape, `type` included
    ///
    /// # Errors
    ///
    /// Only fails if serialization itself fails.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// `instruction` part
    pub fn instruction(message: impl Into<String>) -> Self {
        Self::FurtherInstructionNeeded(FurtherInstructionNeeded {
            message: message.into(),
        })
    }

    /// `entire` part
    pub fn full_content(full_content: impl Into<String>) -> Self {
        Self::FullContent(FullContent {
            full_content: full_content.into(),
        })
    }

    /// `commentary` part
    pub fn commentary(text: impl Into<String>) -> Self {
        Self::Commentary(Commentary { text: text.into() })
    }

    /// `selectionAppend` part
    pub fn append(text: impl Into<String>) -> Self {
        Self::SelectionAppend(SelectionAppend { text: text.into() })
    }

    /// `selectionInsert` part
    pub fn insert(text: impl Into<String>) -> Self {
        Self::SelectionInsert(SelectionInsert { text: text.into() })
    }

    /// `selectionReplace` part
    pub fn replace(text: impl Into<String>) -> Self {
        Self::SelectionReplace(SelectionReplace { text: text.into() })
    }
}

/// A whole reply document, `{"parts": [...]}`
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Reply {
    /// Elements in order
    pub parts: Vec<ReplyPart>,
}

impl Reply {
    /// Encode to the wire shape
    ///
    /// # Errors
    ///
    /// Only fails if serialization itself fails.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
