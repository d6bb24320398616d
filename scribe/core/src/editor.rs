//! Editor Session
//!
//! The document a reply is applied to. [`apply_part`] carries out one
//! decoded [`ReplyPart`] against an [`EditorSession`] as soon as it arrives.
//!
//! # Selection tracking
//!
//! Edits are cumulative within one reply: each part applies to the
//! selection as left by the previous part, not to the original one.
//!
//! | Part               | Change                    | Selection afterwards      |
//! |--------------------|---------------------------|---------------------------|
//! | `selectionAppend`  | text added after it       | grows to cover the text   |
//! | `selectionInsert`  | text added before it      | grows to cover the text   |
//! | `selectionReplace` | text replaces it          | the new text              |
//! | `entire`           | text replaces the body    | the whole body            |
//! | `commentary`       | none, shown to the user   | unchanged                 |
//! | `instruction`      | none, shown to the user   | unchanged                 |
//!
//! So two `selectionAppend` parts `"a"` then `"b"` leave `…selab…` with the
//! selection covering `selab`.

use std::ops::Range;

use thiserror::Error;
use tracing::debug;

use crate::parts::ReplyPart;

/// Errors raised while editing a document
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EditError {
    /// A range extends past the end of the body or is reversed
    #[error("range {start}..{end} is outside the body (length {len})")]
    OutOfBounds {
        /// Range start
        start: usize,
        /// Range end
        end: usize,
        /// Body length in bytes
        len: usize,
    },

    /// A range boundary falls inside a multi-byte character
    #[error("offset {0} is not on a character boundary")]
    NotCharBoundary(usize),
}

/// Something to show the user rather than write into the document
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notice {
    /// Remarks about the edit
    Commentary(String),
    /// The model needs more information
    NeedsInstruction(String),
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Commentary(text) => f.write_str(text),
            Self::NeedsInstruction(message) => write!(f, "more information needed: {message}"),
        }
    }
}

/// A live document with a selection
///
/// Ranges are byte offsets into [`body`](Self::body).
pub trait EditorSession {
    /// Current document text
    fn body(&self) -> &str;

    /// Current selection
    fn selection(&self) -> Range<usize>;

    /// Name of the document, if it has one
    fn filename(&self) -> Option<&str>;

    /// Replace `range` with `text`
    ///
    /// # Errors
    ///
    /// Returns an error if `range` is not a valid range of the body.
    fn replace(&mut self, range: Range<usize>, text: &str) -> Result<(), EditError>;

    /// Move the selection
    ///
    /// # Errors
    ///
    /// Returns an error if `range` is not a valid range of the body.
    fn set_selection(&mut self, range: Range<usize>) -> Result<(), EditError>;

    /// Show something to the user
    fn notify(&mut self, notice: Notice);
}

/// Outcome of [`apply_part`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Applied {
    /// The document changed; this is the new selection
    Edited {
        /// Selection after the edit
        selection: Range<usize>,
    },
    /// A notice was shown
    Notified,
}

/// Apply one part to the editor
///
/// # Errors
///
/// Returns an error if the editor rejects the edit.
pub fn apply_part<E>(editor: &mut E, part: &ReplyPart) -> Result<Applied, EditError>
where
    E: EditorSession + ?Sized,
{
    let Range { start, end } = editor.selection();

    let (edit, selection) = match part {
        ReplyPart::Commentary(c) => {
            editor.notify(Notice::Commentary(c.text.clone()));
            return Ok(Applied::Notified);
        }
        ReplyPart::FurtherInstructionNeeded(f) => {
            editor.notify(Notice::NeedsInstruction(f.message.clone()));
            return Ok(Applied::Notified);
        }
        ReplyPart::SelectionAppend(p) => (end..end, start..end + p.text.len()),
        ReplyPart::SelectionInsert(p) => (start..start, start..end + p.text.len()),
        ReplyPart::SelectionReplace(p) => (start..end, start..start + p.text.len()),
        ReplyPart::FullContent(p) => (0..editor.body().len(), 0..p.full_content.len()),
    };

    debug!(
        kind = %part.kind(),
        range = ?edit,
        bytes = part.text().len(),
        "Applying part"
    );
    editor.replace(edit, part.text())?;
    editor.set_selection(selection.clone())?;
    Ok(Applied::Edited { selection })
}

/// Byte offset of the `chars`-th character of `body`
///
/// Offsets past the end clamp to the body length.
#[must_use]
pub fn char_to_byte_offset(body: &str, chars: usize) -> usize {
    body.char_indices().nth(chars).map_or(body.len(), |(i, _)| i)
}

/// In-memory [`EditorSession`]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TextBuffer {
    body: String,
    selection: Range<usize>,
    filename: Option<String>,
    notices: Vec<Notice>,
}

impl TextBuffer {
    /// Create a buffer with the given selection
    ///
    /// # Errors
    ///
    /// Returns an error if `selection` is not a valid range of `body`.
    pub fn new(body: impl Into<String>, selection: Range<usize>) -> Result<Self, EditError> {
        let body = body.into();
        check_range(&body, &selection)?;
        Ok(Self {
            body,
            selection,
            filename: None,
            notices: Vec::new(),
        })
    }

    /// Create a buffer with everything selected
    pub fn whole(body: impl Into<String>) -> Self {
        let body = body.into();
        let selection = 0..body.len();
        Self {
            body,
            selection,
            filename: None,
            notices: Vec::new(),
        }
    }

    /// Set the document name
    #[must_use]
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Selected text
    #[must_use]
    pub fn selected(&self) -> &str {
        &self.body[self.selection.clone()]
    }

    /// Notices received so far
    #[must_use]
    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    /// Take the document text
    #[must_use]
    pub fn into_body(self) -> String {
        self.body
    }
}

fn check_range(body: &str, range: &Range<usize>) -> Result<(), EditError> {
    if range.start > range.end || range.end > body.len() {
        return Err(EditError::OutOfBounds {
            start: range.start,
            end: range.end,
            len: body.len(),
        });
    }
    for offset in [range.start, range.end] {
        if !body.is_char_boundary(offset) {
            return Err(EditError::NotCharBoundary(offset));
        }
    }
    Ok(())
}

impl EditorSession for TextBuffer {
    fn body(&self) -> &str {
        &self.body
    }

    fn selection(&self) -> Range<usize> {
        self.selection.clone()
    }

    fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    fn replace(&mut self, range: Range<usize>, text: &str) -> Result<(), EditError> {
        check_range(&self.body, &range)?;
        self.body.replace_range(range, text);
        // Keep the selection valid until the caller moves it
        let len = self.body.len();
        self.selection.start = self.selection.start.min(len);
        self.selection.end = self.selection.end.min(len);
        while !self.body.is_char_boundary(self.selection.start) {
            self.selection.start -= 1;
        }
        while !self.body.is_char_boundary(self.selection.end) {
            self.selection.end -= 1;
        }
        self.selection.end = self.selection.end.max(self.selection.start);
        Ok(())
    }

    fn set_selection(&mut self, range: Range<usize>) -> Result<(), EditError> {
        check_range(&self.body, &range)?;
        self.selection = range;
        Ok(())
    }

    fn notify(&mut self, notice: Notice) {
        self.notices.push(notice);
    }
}
