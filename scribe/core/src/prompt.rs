//! Prompt construction
//!
//! Builds the request for one edit from the editor state and the user's
//! instructions. Two modes:
//!
//! - **Selection only** (default): the content sent is the selected text.
//! - **Context**: the content is the whole document with the selection
//!   bracketed by a random marker, so the model sees the surroundings.

use rand::Rng;
use serde_json::Value;

use crate::backend::LlmRequest;
use crate::editor::EditorSession;
use crate::schema::Part;

const REPLY_GUIDE: &str = "\
Reply with a JSON object whose \"parts\" array lists what to do, in order:
- \"selectionReplace\" replaces the selection with \"text\".
- \"selectionAppend\" adds \"text\" after the selection.
- \"selectionInsert\" adds \"text\" before the selection.
- \"entire\" replaces the whole file with \"fullContent\".
- \"commentary\" shows \"text\" to the user without changing the file.
- \"instruction\" asks the user for more information with \"message\".
Each part applies to the selection as left by the parts before it.";

/// A request ready to be sent
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Prompt {
    /// System instructions
    pub system: String,
    /// Input items
    pub parts: Vec<Part>,
    /// Selection marker, in context mode
    pub delimiter: Option<String>,
}

impl Prompt {
    /// Turn into a request for `model`, constrained to `schema`
    ///
    /// # Errors
    ///
    /// Only fails if encoding an input item fails.
    pub fn into_request(
        self,
        model: impl Into<String>,
        schema: Value,
    ) -> serde_json::Result<LlmRequest> {
        let mut request = LlmRequest::new(model)
            .with_system(self.system)
            .with_response_schema(schema);
        for part in &self.parts {
            request = request.with_input(part.to_input_text()?);
        }
        Ok(request)
    }
}

/// Random marker that does not occur in `body`
fn unique_delimiter(body: &str) -> String {
    let mut rng = rand::thread_rng();
    loop {
        let mut bytes = [0u8; 16];
        rng.fill(&mut bytes);
        let delimiter = hex::encode(bytes);
        if !body.contains(&delimiter) {
            return delimiter;
        }
    }
}

fn describe_file(filename: Option<&str>) -> String {
    match filename {
        Some(name) if !name.is_empty() => format!("a file named {name:?}"),
        _ => "a file".to_string(),
    }
}

/// Build the prompt for `instructions` against the editor's selection
pub fn build_prompt<E>(editor: &E, instructions: &str, include_context: bool) -> Prompt
where
    E: EditorSession + ?Sized,
{
    let body = editor.body();
    let selection = editor.selection();
    let file = describe_file(editor.filename());

    let (intro, content, delimiter) = if include_context {
        let delimiter = unique_delimiter(body);
        let mut content = String::with_capacity(body.len() + 2 * delimiter.len());
        content.push_str(&body[..selection.start]);
        content.push_str(&delimiter);
        content.push_str(&body[selection.clone()]);
        content.push_str(&delimiter);
        content.push_str(&body[selection.end..]);

        let intro = format!(
            "The content is the whole of {file}. The selected section starts and ends \
             with the marker {delimiter:?}, which is not part of the file. Follow the \
             instructions for the selected section."
        );
        (intro, content, Some(delimiter))
    } else {
        let intro = format!(
            "The content is a selection from {file}. Follow the instructions for the \
             selection."
        );
        (intro, body[selection].to_string(), None)
    };

    Prompt {
        system: format!("{intro}\n{REPLY_GUIDE}"),
        parts: vec![Part {
            instructions: instructions.to_string(),
            filename: editor.filename().unwrap_or_default().to_string(),
            base64: false,
            content,
        }],
        delimiter,
    }
}
