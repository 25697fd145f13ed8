//! Helpers for pulling structured output out of LLM replies.
//!
//! Models asked for JSON often wrap it in prose or a fenced code block.

use serde::de::DeserializeOwned;

/// The outermost `{ ... }` span of `text`, if any.
pub fn extract_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Parse the first JSON object embedded in `text`.
pub fn parse_embedded<T: DeserializeOwned>(text: &str) -> Result<T, serde_json::Error> {
    serde_json::from_str(extract_object(text).unwrap_or(text))
}
