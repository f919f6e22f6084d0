//! Structured-message decoding: raw text to protocol tag

use serde_json::Value;
use thiserror::Error;

/// Reasons a payload could not be decoded into a protocol tag.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The payload is not valid JSON.
    #[error("payload is not valid JSON: {0}")]
    NotJson(#[from] serde_json::Error),

    /// The payload decoded but carries no usable tag field.
    #[error("payload has no string `{field}` field")]
    MissingTag { field: String },
}

/// Trait for extracting the protocol tag from a raw text payload.
///
/// Decode failure means the message is dropped, never that the
/// connection closes.
pub trait MessageDecoder: Send + Sync + 'static {
    fn decode(&self, text: &str) -> Result<String, DecodeError>;
}

/// Decoder for JSON objects carrying their intent in a string field.
pub struct JsonTagDecoder {
    field: String,
}

impl JsonTagDecoder {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }
}

impl Default for JsonTagDecoder {
    fn default() -> Self {
        Self::new("action")
    }
}

impl MessageDecoder for JsonTagDecoder {
    fn decode(&self, text: &str) -> Result<String, DecodeError> {
        let value: Value = serde_json::from_str(text)?;
        value
            .get(&self.field)
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| DecodeError::MissingTag {
                field: self.field.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_the_tag_field() {
        let decoder = JsonTagDecoder::default();
        let tag = decoder
            .decode(r#"{"action":"join","room":"general"}"#)
            .unwrap();
        assert_eq!(tag, "join");
    }

    #[test]
    fn custom_field_name() {
        let decoder = JsonTagDecoder::new("kind");
        assert_eq!(decoder.decode(r#"{"kind":"chat"}"#).unwrap(), "chat");
    }

    #[test]
    fn rejects_non_json() {
        let decoder = JsonTagDecoder::default();
        assert!(matches!(
            decoder.decode("not json at all"),
            Err(DecodeError::NotJson(_))
        ));
    }

    #[test]
    fn rejects_missing_or_non_string_tag() {
        let decoder = JsonTagDecoder::default();
        assert!(matches!(
            decoder.decode(r#"{"other":"x"}"#),
            Err(DecodeError::MissingTag { .. })
        ));
        assert!(matches!(
            decoder.decode(r#"{"action":42}"#),
            Err(DecodeError::MissingTag { .. })
        ));
    }
}
