//! Inline (base64) media payloads.

use base64::Engine;

use crate::error::{Error, Result};
use crate::types::MediaKind;

/// Decode an inline base64 payload. Accepts an optional `data:<mime>;base64,`
/// prefix and ignores embedded whitespace/newlines.
pub fn decode_base64(payload: &str, kind: MediaKind) -> Result<Vec<u8>> {
    let mut data = payload.trim();

    if let Some(rest) = data.strip_prefix("data:") {
        let (header, body) = rest.split_once(',').ok_or_else(|| {
            Error::InvalidInput(format!("malformed data URI for {kind}"))
        })?;
        if !header.ends_with(";base64") {
            return Err(Error::InvalidInput(format!(
                "data URI for {kind} is not base64-encoded"
            )));
        }
        data = body;
    }

    let compact: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if compact.is_empty() {
        return Err(Error::InvalidInput(format!("{kind} payload is empty")));
    }

    base64::engine::general_purpose::STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| Error::InvalidInput(format!("invalid base64 {kind} data: {e}")))
}
