//! Request and reply schemas
//!
//! [`reply_schema`] is sent with every request so the service constrains
//! its output to the `{"parts": [...]}` shape decoded by
//! [`crate::stream::PartStream`]. [`Part`] is the shape of each input item
//! sent to it.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::parts::PartKind;

/// One input item of a request, sent as JSON text
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    /// Instructions that apply to this content
    pub instructions: String,

    /// Name of the file the content comes from
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub filename: String,

    /// Whether `content` is base64-encoded
    pub base64: bool,

    /// The content itself
    pub content: String,
}

impl Part {
    /// Encode as the text of an input item
    ///
    /// # Errors
    ///
    /// Only fails if serialization itself fails.
    pub fn to_input_text(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

fn describe(kind: PartKind) -> (&'static str, &'static str, &'static str) {
    match kind {
        PartKind::Instruction => (
            "More information is needed before the request can be carried out.",
            "message",
            "Message to the user, in Markdown.",
        ),
        PartKind::Entire => (
            "The entire new content of the file.",
            "fullContent",
            "New file content.",
        ),
        PartKind::Commentary => (
            "Text for the user that does not change the file.",
            "text",
            "Text to show.",
        ),
        PartKind::SelectionAppend => (
            "Text to add at the end of the current selection.",
            "text",
            "Text to add.",
        ),
        PartKind::SelectionInsert => (
            "Text to add at the start of the current selection.",
            "text",
            "Text to add.",
        ),
        PartKind::SelectionReplace => (
            "Text that replaces the current selection.",
            "text",
            "Replacement text.",
        ),
    }
}

fn variant_schema(kind: PartKind) -> Value {
    let (description, field, field_description) = describe(kind);

    let mut properties = Map::new();
    properties.insert(
        "type".to_string(),
        json!({ "type": "string", "enum": [kind.as_tag()] }),
    );
    properties.insert(
        field.to_string(),
        json!({ "type": "string", "description": field_description }),
    );

    json!({
        "type": "object",
        "description": description,
        "properties": properties,
        "required": ["type", field],
        "additionalProperties": false,
    })
}

/// JSON schema of a whole reply, in the strict subset accepted for
/// structured output
#[must_use]
pub fn reply_schema() -> Value {
    let variants: Vec<Value> = PartKind::ALL.into_iter().map(variant_schema).collect();
    json!({
        "type": "object",
        "description": "The full reply: changes and remarks, applied in order.",
        "properties": {
            "parts": {
                "type": "array",
                "items": { "anyOf": variants },
            },
        },
        "required": ["parts"],
        "additionalProperties": false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_part_encoding() {
        let part = Part {
            instructions: "fix the typo".into(),
            filename: String::new(),
            base64: false,
            content: "helo".into(),
        };
        assert_eq!(
            part.to_input_text().unwrap(),
            r#"{"instructions":"fix the typo","base64":false,"content":"helo"}"#
        );

        let named = Part {
            filename: "main.rs".into(),
            ..part
        };
        let value: Value = serde_json::from_str(&named.to_input_text().unwrap()).unwrap();
        assert_eq!(value["filename"], "main.rs");
    }

    #[test]
    fn test_schema_covers_every_variant() {
        let schema = reply_schema();
        let variants = schema["properties"]["parts"]["items"]["anyOf"]
            .as_array()
            .unwrap();
        assert_eq!(variants.len(), PartKind::ALL.len());

        for (variant, kind) in variants.iter().zip(PartKind::ALL) {
            assert_eq!(variant["properties"]["type"]["enum"][0], kind.as_tag());
            assert_eq!(variant["additionalProperties"], false);
            let required = variant["required"].as_array().unwrap();
            let properties = variant["properties"].as_object().unwrap();
            assert_eq!(required.len(), properties.len(), "{kind}: strict mode requires every property");
        }
    }

    #[test]
    fn test_schema_field_names_match_wire_shape() {
        let schema = reply_schema();
        let variants = schema["properties"]["parts"]["items"]["anyOf"]
            .as_array()
            .unwrap();
        let entire = variants
            .iter()
            .find(|v| v["properties"]["type"]["enum"][0] == "entire")
            .unwrap();
        assert!(entire["properties"].get("fullContent").is_some());

        let instruction = variants
            .iter()
            .find(|v| v["properties"]["type"]["enum"][0] == "instruction")
            .unwrap();
        assert!(instruction["properties"].get("message").is_some());
    }
}
