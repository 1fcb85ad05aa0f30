//! Content transport codec.
//!
//! The repository host transports file bodies as base64 over UTF-8 bytes.
//! Encoding is total; decoding fails on malformed transport text. The
//! round-trip law `decode(encode(s)) == s` holds for arbitrary UTF-8,
//! including multi-byte code points.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;

/// Errors from decoding transport text.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("decoded bytes are not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Encode raw text into transport-safe form. Total for any string.
pub fn encode(raw: &str) -> String {
    STANDARD.encode(raw.as_bytes())
}

/// Decode transport text back into raw text.
///
/// The GitHub contents API inserts newlines into long payloads, so all
/// ASCII whitespace is stripped before decoding.
pub fn decode(transport: &str) -> Result<String, CodecError> {
    let compact: String = transport.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = STANDARD.decode(compact.as_bytes())?;
    Ok(String::from_utf8(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn round_trip_ascii() {
        let s = "const x = 1;\n";
        assert_eq!(decode(&encode(s)).unwrap(), s);
    }

    #[test]
    fn round_trip_multibyte() {
        for s in ["héllo wörld", "日本語のテキスト", "emoji: 🦀🚀", ""] {
            assert_eq!(decode(&encode(s)).unwrap(), s, "failed for {s:?}");
        }
    }

    #[test]
    fn decode_tolerates_embedded_newlines() {
        let encoded = encode("a long enough body to wrap");
        let (head, tail) = encoded.split_at(8);
        let wrapped = format!("{head}\n{tail}\n");
        assert_eq!(decode(&wrapped).unwrap(), "a long enough body to wrap");
    }

    #[test]
    fn decode_rejects_invalid_base64() {
        assert!(matches!(decode("!!not base64!!"), Err(CodecError::Base64(_))));
    }

    #[test]
    fn decode_rejects_invalid_utf8() {
        // 0xFF 0xFE is not valid UTF-8
        let bad = STANDARD.encode([0xFF, 0xFE]);
        assert!(matches!(decode(&bad), Err(CodecError::Utf8(_))));
    }
}
