//! MIME encoding and decoding utilities.
//!
//! Supports Base64 bodies (RFC 2045) and RFC 2047 "B" encoded words for
//! header values.

use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Charset label used for every encoded word and text body.
pub const CHARSET: &str = "UTF-8";

/// Maximum length of a Base64 body line (RFC 2045 section 6.8).
pub const MAX_LINE_LENGTH: usize = 76;

/// Largest number of raw bytes placed in a single encoded word.
///
/// 45 bytes encode to 60 characters which, with the `=?UTF-8?B?` and `?=`
/// delimiters, stays under the 75 character limit of RFC 2047.
const WORD_CHUNK_BYTES: usize = 45;

/// Encodes data as Base64.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decodes Base64 data.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &str) -> Result<Vec<u8>> {
    STANDARD.decode(data).map_err(Into::into)
}

/// Encodes data as Base64 hard-wrapped at 76 characters per line.
///
/// Every line, including the last, ends with CRLF. Empty input yields an
/// empty string.
#[must_use]
pub fn encode_base64_lines(data: &[u8]) -> String {
    let encoded = encode_base64(data);
    let line_count = encoded.len() / MAX_LINE_LENGTH + 1;
    let mut wrapped = String::with_capacity(encoded.len() + line_count * 2);

    // Base64 output is pure ASCII, one char per byte.
    for chunk in encoded.as_bytes().chunks(MAX_LINE_LENGTH) {
        wrapped.extend(chunk.iter().copied().map(char::from));
        wrapped.push_str("\r\n");
    }

    wrapped
}

/// Decodes wrapped Base64, ignoring any whitespace between lines.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64_lines(data: &str) -> Result<Vec<u8>> {
    let cleaned: String = data.chars().filter(|c| !c.is_whitespace()).collect();
    decode_base64(&cleaned)
}

/// Encodes a header value using RFC 2047 only if it needs it.
///
/// Plain ASCII without `=?` sequences is returned as-is.
#[must_use]
pub fn encode_rfc2047(text: &str) -> String {
    if text
        .chars()
        .all(|c| c.is_ascii() && !c.is_ascii_control() && c != '=' && c != '?')
    {
        return text.to_string();
    }

    encode_word(text)
}

/// Encodes text as one or more RFC 2047 "B" encoded words.
///
/// Long values are split on character boundaries into several encoded words
/// joined by a folding whitespace (`CRLF SP`).
#[must_use]
pub fn encode_word(text: &str) -> String {
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut end = 0;

    for (idx, ch) in text.char_indices() {
        let next = idx + ch.len_utf8();
        if next - start > WORD_CHUNK_BYTES {
            chunks.push(&text[start..end]);
            start = idx;
        }
        end = next;
    }
    chunks.push(&text[start..end]);

    chunks
        .iter()
        .map(|chunk| format!("=?{CHARSET}?B?{}?=", encode_base64(chunk.as_bytes())))
        .collect::<Vec<_>>()
        .join("\r\n ")
}

/// Decodes a header value that may contain RFC 2047 "B" encoded words.
///
/// Whitespace (including folds) between two adjacent encoded words is
/// dropped, as RFC 2047 requires.
///
/// # Errors
///
/// Returns an error if an encoded word is malformed or uses an unsupported
/// encoding.
pub fn decode_rfc2047(text: &str) -> Result<String> {
    let mut decoded = String::new();
    let mut previous_encoded = false;

    for token in text.split_whitespace() {
        match decode_word(token)? {
            Some(word) => {
                if !decoded.is_empty() && !previous_encoded {
                    decoded.push(' ');
                }
                decoded.push_str(&word);
                previous_encoded = true;
            }
            None => {
                if !decoded.is_empty() {
                    decoded.push(' ');
                }
                decoded.push_str(token);
                previous_encoded = false;
            }
        }
    }

    Ok(decoded)
}

fn decode_word(token: &str) -> Result<Option<String>> {
    let Some(inner) = token
        .strip_prefix("=?")
        .and_then(|rest| rest.strip_suffix("?="))
    else {
        return Ok(None);
    };

    let parts: Vec<&str> = inner.split('?').collect();
    if parts.len() != 3 {
        return Err(Error::InvalidEncoding(format!(
            "Invalid RFC 2047 word: {token}"
        )));
    }

    if !parts[1].eq_ignore_ascii_case("B") {
        return Err(Error::InvalidEncoding(format!(
            "Unsupported encoding: {}",
            parts[1]
        )));
    }

    let bytes = decode_base64(parts[2])?;
    Ok(Some(String::from_utf8(bytes)?))
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_base64_encode_decode() {
        let data = b"Hello, World!";
        let encoded = encode_base64(data);
        assert_eq!(encoded, "SGVsbG8sIFdvcmxkIQ==");

        let decoded = decode_base64(&encoded).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_base64_lines_wraps_at_76() {
        let data = vec![b'x'; 200];
        let wrapped = encode_base64_lines(&data);
        let lines: Vec<&str> = wrapped.split("\r\n").collect();

        // 200 bytes -> 268 chars -> 76 + 76 + 76 + 40, plus the trailing empty split
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0].len(), 76);
        assert_eq!(lines[3].len(), 40);
        assert_eq!(lines[4], "");
    }

    #[test]
    fn test_base64_lines_empty() {
        assert_eq!(encode_base64_lines(b""), "");
    }

    #[test]
    fn test_rfc2047_passthrough_ascii() {
        assert_eq!(encode_rfc2047("Weekly report"), "Weekly report");
    }

    #[test]
    fn test_rfc2047_encodes_non_ascii() {
        let encoded = encode_rfc2047("Héllo");
        assert_eq!(encoded, "=?UTF-8?B?SMOpbGxv?=");
    }

    #[test]
    fn test_encode_word_always_encodes() {
        assert_eq!(encode_word("Hi"), "=?UTF-8?B?SGk=?=");
    }

    #[test]
    fn test_encode_word_empty() {
        assert_eq!(encode_word(""), "=?UTF-8?B??=");
        assert_eq!(decode_rfc2047("=?UTF-8?B??=").unwrap(), "");
    }

    #[test]
    fn test_encode_word_splits_long_values() {
        let subject = "Ünïcödé ".repeat(20);
        let encoded = encode_word(&subject);

        for word in encoded.split("\r\n ") {
            assert!(word.len() <= 75, "encoded word too long: {word}");
            assert!(word.starts_with("=?UTF-8?B?"));
        }
        assert_eq!(decode_rfc2047(&encoded).unwrap(), subject);
    }

    #[test]
    fn test_decode_mixed_words() {
        let decoded = decode_rfc2047("Re: =?UTF-8?B?SMOpbGxv?= world").unwrap();
        assert_eq!(decoded, "Re: Héllo world");
    }

    #[test]
    fn test_decode_rejects_q_encoding() {
        assert!(decode_rfc2047("=?utf-8?Q?H=C3=A9llo?=").is_err());
    }

    proptest! {
        #[test]
        fn wrapped_lines_never_exceed_limit(
            data in proptest::collection::vec(any::<u8>(), 0..2048),
        ) {
            let wrapped = encode_base64_lines(&data);
            for line in wrapped.split("\r\n") {
                prop_assert!(line.len() <= MAX_LINE_LENGTH);
            }
            prop_assert_eq!(decode_base64_lines(&wrapped).unwrap(), data);
        }
    }
}
