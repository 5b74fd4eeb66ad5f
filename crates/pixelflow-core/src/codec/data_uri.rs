//! Base64 text transport with optional data-URI wrapping.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use super::OutputFormat;

/// Return the base64 payload of `text`, dropping a `data:...,` prefix.
///
/// Input without a prefix is returned trimmed and otherwise unchanged.
pub fn strip_data_uri_prefix(text: &str) -> &str {
    let trimmed = text.trim();
    match trimmed.strip_prefix("data:") {
        Some(rest) => match rest.find(',') {
            Some(comma) => &rest[comma + 1..],
            None => trimmed,
        },
        None => trimmed,
    }
}

/// Decode base64 text (prefix already stripped), ignoring embedded whitespace.
pub(crate) fn decode_payload(payload: &str) -> Result<Vec<u8>, base64::DecodeError> {
    if payload.bytes().any(|b| b.is_ascii_whitespace()) {
        let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        STANDARD.decode(compact)
    } else {
        STANDARD.decode(payload)
    }
}

/// Encode bytes as raw base64 (no prefix).
pub fn to_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Encode bytes as a data URI with the MIME type of `format`.
pub fn to_data_uri(bytes: &[u8], format: OutputFormat) -> String {
    format!("data:{};base64,{}", format.mime_type(), STANDARD.encode(bytes))
}
