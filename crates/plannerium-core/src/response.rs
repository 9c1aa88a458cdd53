//! Response parser: pull the JSON payload out of free-form model text.
//!
//! Models tend to wrap JSON in a fenced code block, sometimes with a `json`
//! tag and sometimes without. The first `json`-tagged fence wins, then the
//! first fence of any kind, then the whole trimmed text. No repair is
//! attempted on the candidate.

use serde_json::Value;
use thiserror::Error;

/// The generator's output could not be decoded into the expected shape.
///
/// Only carries a short cause; the raw completion text is never included.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("malformed response: {message}")]
pub struct MalformedResponse {
    pub message: String,
}

impl MalformedResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for MalformedResponse {
    fn from(err: serde_json::Error) -> Self {
        Self::new(err.to_string())
    }
}

const FENCE: &str = "```";
const JSON_FENCE: &str = "```json";

/// Return the slice of `text` that should be decoded as JSON.
pub fn extract_payload(text: &str) -> &str {
    if let Some(start) = text.find(JSON_FENCE) {
        return fenced_interior(text, start + JSON_FENCE.len());
    }
    if let Some(start) = text.find(FENCE) {
        return fenced_interior(text, start + FENCE.len());
    }
    text.trim()
}

/// Interior of a fence whose opening marker ends at `body_start`. An
/// unterminated fence runs to the end of the text.
fn fenced_interior(text: &str, body_start: usize) -> &str {
    let rest = &text[body_start..];
    let end = rest.find(FENCE).unwrap_or(rest.len());
    rest[..end].trim()
}

/// Decode the JSON payload embedded in `text`.
pub fn parse_response(text: &str) -> Result<Value, MalformedResponse> {
    let payload = extract_payload(text);
    serde_json::from_str(payload).map_err(|e| MalformedResponse::new(format!("invalid JSON: {e}")))
}
