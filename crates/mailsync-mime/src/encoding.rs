//! Content-transfer decoding.
//!
//! Supports Base64 (standard and URL-safe alphabets), Quoted-Printable and
//! RFC 2047 encoded header words.

use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use std::fmt;

/// Transfer encoding of a provider body part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferEncoding {
    /// 7-bit ASCII, no decoding needed.
    #[default]
    SevenBit,
    /// 8-bit text, no decoding needed.
    EightBit,
    /// Binary, no decoding needed.
    Binary,
    /// Standard Base64 (RFC 2045).
    Base64,
    /// URL-safe Base64 as used by REST mail APIs (padding optional).
    Base64Url,
    /// Quoted-Printable.
    QuotedPrintable,
}

impl TransferEncoding {
    /// Decodes raw part data into bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the data is not valid for this encoding.
    pub fn decode(self, data: &str) -> Result<Vec<u8>> {
        match self {
            Self::SevenBit | Self::EightBit | Self::Binary => Ok(data.as_bytes().to_vec()),
            Self::Base64 => decode_base64(data),
            Self::Base64Url => decode_base64_url(data),
            Self::QuotedPrintable => decode_quoted_printable_bytes(data),
        }
    }

    /// Decodes raw part data into text, replacing invalid UTF-8 sequences.
    ///
    /// # Errors
    ///
    /// Returns an error if the data is not valid for this encoding.
    pub fn decode_text(self, data: &str) -> Result<String> {
        let bytes = self.decode(data)?;
        Ok(String::from_utf8(bytes)
            .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned()))
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SevenBit => write!(f, "7bit"),
            Self::EightBit => write!(f, "8bit"),
            Self::Binary => write!(f, "binary"),
            Self::Base64 => write!(f, "base64"),
            Self::Base64Url => write!(f, "base64url"),
            Self::QuotedPrintable => write!(f, "quoted-printable"),
        }
    }
}

/// Decodes standard Base64 data, ignoring embedded whitespace.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &str) -> Result<Vec<u8>> {
    let cleaned: String = data.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD.decode(cleaned).map_err(Into::into)
}

/// Decodes URL-safe Base64 data with or without padding.
///
/// # Errors
///
/// Returns an error if the input is not valid URL-safe Base64.
pub fn decode_base64_url(data: &str) -> Result<Vec<u8>> {
    let cleaned: String = data
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '=')
        .collect();
    URL_SAFE_NO_PAD.decode(cleaned).map_err(Into::into)
}

/// Encodes bytes as unpadded URL-safe Base64.
#[must_use]
pub fn encode_base64_url(data: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(data)
}

fn decode_quoted_printable_bytes(text: &str) -> Result<Vec<u8>> {
    let mut result = Vec::with_capacity(text.len());
    let bytes = text.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        let byte = bytes[i];
        if byte != b'=' {
            result.push(byte);
            i += 1;
            continue;
        }

        // Soft line break
        match bytes.get(i + 1..) {
            Some([b'\r', b'\n', ..]) => {
                i += 3;
                continue;
            }
            Some([b'\n', ..]) => {
                i += 2;
                continue;
            }
            _ => {}
        }

        let hex = bytes
            .get(i + 1..i + 3)
            .ok_or_else(|| Error::InvalidEncoding("Incomplete escape sequence".to_string()))?;
        let hex = std::str::from_utf8(hex)
            .map_err(|e| Error::InvalidEncoding(format!("Invalid hex: {e}")))?;
        let value = u8::from_str_radix(hex, 16)
            .map_err(|e| Error::InvalidEncoding(format!("Invalid hex: {e}")))?;
        result.push(value);
        i += 3;
    }

    Ok(result)
}

/// Decodes every RFC 2047 encoded-word in a header value.
///
/// Text outside encoded-words is kept as-is; whitespace between two adjacent
/// encoded-words is dropped. ISO-8859-1 and US-ASCII words are decoded
/// exactly; any other charset is read as UTF-8 with invalid sequences
/// replaced.
///
/// # Errors
///
/// Returns an error if an encoded-word is malformed.
pub fn decode_rfc2047(text: &str) -> Result<String> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    let mut pending_space = String::new();
    let mut last_was_word = false;

    while let Some(start) = rest.find("=?") {
        let (before, tail) = rest.split_at(start);
        let Some(word_len) = encoded_word_len(tail) else {
            break;
        };

        if last_was_word && before.trim().is_empty() {
            pending_space.clear();
        } else {
            out.push_str(&pending_space);
            out.push_str(before);
            pending_space.clear();
        }

        out.push_str(&decode_encoded_word(&tail[..word_len])?);
        last_was_word = true;
        rest = &tail[word_len..];

        let ws_len = rest.len() - rest.trim_start().len();
        pending_space.push_str(&rest[..ws_len]);
        rest = &rest[ws_len..];
    }

    out.push_str(&pending_space);
    out.push_str(rest);
    Ok(out)
}

/// Length of the encoded-word at the start of `text`, if there is one.
fn encoded_word_len(text: &str) -> Option<usize> {
    let inner = text.strip_prefix("=?")?;
    let charset_end = inner.find('?')?;
    let after_charset = &inner[charset_end + 1..];
    let encoding_end = after_charset.find('?')?;
    let after_encoding = &after_charset[encoding_end + 1..];
    let text_end = after_encoding.find("?=")?;
    Some(2 + charset_end + 1 + encoding_end + 1 + text_end + 2)
}

fn decode_encoded_word(word: &str) -> Result<String> {
    let inner = &word[2..word.len() - 2];
    let parts: Vec<&str> = inner.splitn(3, '?').collect();

    if parts.len() != 3 {
        return Err(Error::InvalidEncoding(
            "Invalid RFC 2047 format".to_string(),
        ));
    }

    let encoding = parts[1].to_uppercase();
    let encoded_text = parts[2];

    let bytes = match encoding.as_str() {
        "B" => decode_base64(encoded_text)?,
        "Q" => decode_quoted_printable_bytes(&encoded_text.replace('_', " "))?,
        _ => {
            return Err(Error::InvalidEncoding(format!(
                "Unknown encoding: {encoding}"
            )));
        }
    };
    Ok(decode_charset(parts[0], bytes))
}

/// Converts encoded-word bytes to text according to `charset`.
fn decode_charset(charset: &str, bytes: Vec<u8>) -> String {
    // RFC 2231 allows a `*language` suffix
    let charset = charset.split('*').next().unwrap_or_default().to_lowercase();
    match charset.as_str() {
        "iso-8859-1" | "latin1" | "us-ascii" => bytes.into_iter().map(char::from).collect(),
        _ => String::from_utf8(bytes)
            .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_transfer_encoding_display() {
        assert_eq!(TransferEncoding::Base64Url.to_string(), "base64url");
        assert_eq!(TransferEncoding::QuotedPrintable.to_string(), "quoted-printable");
        assert_eq!(TransferEncoding::default().to_string(), "7bit");
    }

    #[test]
    fn test_base64_decode_ignores_line_breaks() {
        let decoded = decode_base64("SGVsbG8s\r\nIFdvcmxkIQ==").unwrap();
        assert_eq!(decoded, b"Hello, World!");
    }

    #[test]
    fn test_base64_url_decode_with_and_without_padding() {
        // "??>" encodes to "Pz8-" in the URL-safe alphabet
        assert_eq!(decode_base64_url("Pz8-").unwrap(), b"??>");
        assert_eq!(decode_base64_url("SGk").unwrap(), b"Hi");
        assert_eq!(decode_base64_url("SGk=").unwrap(), b"Hi");
    }

    #[test]
    fn test_base64_url_rejects_garbage() {
        assert!(decode_base64_url("!!!").is_err());
    }

    #[test]
    fn test_quoted_printable_decode() {
        let qp = TransferEncoding::QuotedPrintable;
        assert_eq!(qp.decode_text("Hello, World!").unwrap(), "Hello, World!");
        assert_eq!(qp.decode_text("H=C3=A9llo").unwrap(), "Héllo");
        assert_eq!(qp.decode_text("Hello=\r\nWorld").unwrap(), "HelloWorld");
        assert_eq!(qp.decode_text("Hello=\nWorld").unwrap(), "HelloWorld");
    }

    #[test]
    fn test_quoted_printable_incomplete_escape() {
        assert!(TransferEncoding::QuotedPrintable.decode("abc=4").is_err());
        assert!(TransferEncoding::QuotedPrintable.decode("abc=ZZ").is_err());
    }

    #[test]
    fn test_decode_text_is_lossy_on_invalid_utf8() {
        let text = TransferEncoding::QuotedPrintable.decode_text("caf=E9").unwrap();
        assert!(text.starts_with("caf"));
    }

    #[test]
    fn test_rfc2047_decode() {
        assert_eq!(decode_rfc2047("Hello").unwrap(), "Hello");
        assert_eq!(decode_rfc2047("=?utf-8?B?SMOpbGxv?=").unwrap(), "Héllo");
        assert_eq!(decode_rfc2047("=?utf-8?Q?H=C3=A9llo?=").unwrap(), "Héllo");
    }

    #[test]
    fn test_rfc2047_mixed_and_adjacent_words() {
        assert_eq!(
            decode_rfc2047("Re: =?utf-8?Q?caf=C3=A9?= meeting").unwrap(),
            "Re: café meeting"
        );
        assert_eq!(
            decode_rfc2047("=?utf-8?Q?a?= =?utf-8?Q?b?=").unwrap(),
            "ab"
        );
    }

    #[test]
    fn test_rfc2047_latin1_words() {
        assert_eq!(decode_rfc2047("=?iso-8859-1?Q?caf=E9?=").unwrap(), "café");
        assert_eq!(decode_rfc2047("=?ISO-8859-1?B?Y2Fm6Q==?=").unwrap(), "café");
        assert_eq!(decode_rfc2047("=?iso-8859-1*fr?Q?caf=E9?=").unwrap(), "café");
    }

    #[test]
    fn test_rfc2047_invalid_utf8_is_lossy() {
        let decoded = decode_rfc2047("=?utf-8?Q?caf=E9?= ok").unwrap();
        assert_eq!(decoded, "caf\u{FFFD} ok");
        let decoded = decode_rfc2047("=?windows-1252?Q?caf=E9?=").unwrap();
        assert!(decoded.starts_with("caf"));
    }

    #[test]
    fn test_rfc2047_unknown_encoding() {
        assert!(decode_rfc2047("=?utf-8?X?abc?=").is_err());
    }

    proptest! {
        #[test]
        fn base64_url_roundtrips_arbitrary_bytes(data in proptest::collection::vec(any::<u8>(), 0..256)) {
            let encoded = encode_base64_url(&data);
            prop_assert_eq!(decode_base64_url(&encoded).unwrap(), data);
        }
    }
}
