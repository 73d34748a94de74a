use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

/// Structured output of a successful generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedContent {
    pub title: String,
    pub description: String,

    /// Everything else the generator returned (sections, vocabulary, exercises).
    #[serde(default)]
    pub body: JsonValue,
}

impl GeneratedContent {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            body: JsonValue::Null,
        }
    }

    pub fn with_body(mut self, body: JsonValue) -> Self {
        self.body = body;
        self
    }

    /// Parse a generator response object.
    ///
    /// `title` and `description` are required and must be non-blank; every other
    /// field is kept verbatim in `body`.
    pub fn from_json(value: JsonValue) -> Result<Self, GenerationError> {
        let JsonValue::Object(mut map) = value else {
            return Err(GenerationError::InvalidResponse(
                "expected a JSON object".to_string(),
            ));
        };

        let mut take_text = |key: &str| -> Result<String, GenerationError> {
            match map.remove(key) {
                Some(JsonValue::String(s)) if !s.trim().is_empty() => Ok(s),
                Some(_) => Err(GenerationError::InvalidResponse(format!(
                    "field `{key}` must be a non-empty string"
                ))),
                None => Err(GenerationError::InvalidResponse(format!(
                    "missing field `{key}`"
                ))),
            }
        };

        let title = take_text("title")?;
        let description = take_text("description")?;

        Ok(Self {
            title,
            description,
            body: JsonValue::Object(map),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("generation failed: {0}")]
    Failed(String),

    #[error("invalid generator response: {0}")]
    InvalidResponse(String),

    #[error("transport error: {0}")]
    Transport(String),
}
