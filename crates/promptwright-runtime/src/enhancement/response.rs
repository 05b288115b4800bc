//! Parsing of enhancement replies.
//!
//! Backends are asked for a JSON object but wrap it in prose or code fences
//! often enough that extraction has to be lenient about the surroundings.
//! The object itself is not repaired: it must parse, pass the content
//! schema and carry a non-empty directive.

use lazy_static::lazy_static;
use promptwright_core::PromptContent;
use regex::Regex;
use serde_json::Value as JsonValue;
use thiserror::Error;

lazy_static! {
    /// A fenced block holding a JSON object
    static ref FENCED_JSON: Regex =
        Regex::new(r"(?s)```(?:json|JSON)?\s*(\{.*?\})\s*```").unwrap();
}

/// Why a reply could not be used.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("reply contains no JSON object")]
    NoJson,

    #[error("reply JSON is malformed: {0}")]
    MalformedJson(String),

    #[error("enhanced content is invalid: {0}")]
    InvalidContent(String),
}

/// Content extracted from a reply.
#[derive(Debug, Clone, PartialEq)]
pub struct EnhancedContent {
    pub content: PromptContent,
    pub rationale: Option<String>,
}

/// Extract enhanced content from a backend reply.
///
/// Accepts `{"content": {...}, "rationale": "..."}` or a bare content
/// object, either alone or inside a fenced block.
pub fn parse_enhanced_content(reply: &str) -> Result<EnhancedContent, ParseError> {
    let json = extract_json(reply).ok_or(ParseError::NoJson)?;
    let value: JsonValue =
        serde_json::from_str(json).map_err(|e| ParseError::MalformedJson(e.to_string()))?;

    let (content_value, rationale) = match value {
        JsonValue::Object(mut map) if map.get("content").is_some_and(JsonValue::is_object) => {
            let rationale = map
                .get("rationale")
                .and_then(JsonValue::as_str)
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(String::from);
            let content = map.remove("content").unwrap_or(JsonValue::Null);
            (content, rationale)
        }
        other => (other, None),
    };

    let content = PromptContent::from_value(content_value)
        .map_err(|e| ParseError::InvalidContent(e.to_string()))?;

    Ok(EnhancedContent { content, rationale })
}

fn extract_json(reply: &str) -> Option<&str> {
    if let Some(block) = FENCED_JSON.captures(reply).and_then(|c| c.get(1)) {
        return Some(block.as_str());
    }

    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    (end > start).then(|| &reply[start..=end])
}
