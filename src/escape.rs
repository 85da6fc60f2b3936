// ABOUTME: Binary-safe text codec so raw bytes survive a trip through JSON text.
// ABOUTME: A private byte <-> pseudo-code-point bijection, not standard \u escape semantics.

use crate::error::{Error, Result};
use memchr::memchr_iter;

/// Printable bytes pass through unescaped: the ASCII visible range plus the
/// five whitespace controls (HT, LF, VT, FF, CR). The backslash is excluded
/// so a literal `\uXXXX` in the input cannot be confused with an escape;
/// without this the codec would not be a bijection.
#[inline]
fn is_printable(byte: u8) -> bool {
    byte != b'\\' && matches!(byte, 0x20..=0x7e | 0x09..=0x0d)
}

/// Escape arbitrary bytes into printable-safe text.
///
/// Printable bytes are emitted as their literal character; every other byte
/// becomes the 6-character escape `\uXXXX` with the byte value zero-padded to
/// 4 hex digits. The output is always ASCII and therefore safe to embed in
/// JSON strings.
///
/// ```rust
/// use formbody::escape::escape_bytes;
///
/// assert_eq!(escape_bytes(b"ab\xffc"), "ab\\u00ffc");
/// ```
#[must_use]
pub fn escape_bytes(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len());
    for &byte in data {
        if is_printable(byte) {
            out.push(byte as char);
        } else {
            out.push_str(&format!("\\u{byte:04x}"));
        }
    }
    out
}

/// Replace every `\uXXXX` escape with the character of that code point.
///
/// Everything that is not a well-formed 6-character escape passes through
/// untouched. This reverses [`escape_bytes`] at the text level; it is NOT a
/// general JSON unescaper and knows nothing about surrogate pairs.
#[must_use]
pub fn unescape(escaped: &str) -> String {
    let bytes = escaped.as_bytes();
    let mut out = String::with_capacity(escaped.len());
    let mut pos = 0;
    for bs in memchr_iter(b'\\', bytes) {
        if bs < pos {
            // Inside a span already consumed by a previous escape.
            continue;
        }
        let Some(code) = parse_escape(&bytes[bs..]) else {
            continue;
        };
        out.push_str(&escaped[pos..bs]);
        match char::from_u32(u32::from(code)) {
            Some(ch) => out.push(ch),
            // Surrogate range: not representable, keep the escape as-is.
            None => out.push_str(&escaped[bs..bs + 6]),
        }
        pos = bs + 6;
    }
    out.push_str(&escaped[pos..]);
    out
}

/// Decode escaped text back to raw bytes.
///
/// Characters map 1:1 to bytes (latin-1 style); an escape that decodes above
/// U+00FF cannot be a byte and is reported as [`Error::InvalidEscape`].
/// Invariant: `unescape_bytes(&escape_bytes(b)) == Ok(b)` for every `b`.
pub fn unescape_bytes(escaped: &str) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(escaped.len());
    for ch in unescape(escaped).chars() {
        let cp = u32::from(ch);
        if cp > 0xff {
            return Err(Error::InvalidEscape(cp));
        }
        out.push(cp as u8);
    }
    Ok(out)
}

/// Map text to bytes: chars below U+0100 convert 1:1, anything wider falls
/// back to its UTF-8 encoding. Total, unlike [`unescape_bytes`].
#[must_use]
pub fn text_to_bytes(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    for ch in text.chars() {
        let cp = u32::from(ch);
        if cp <= 0xff {
            out.push(cp as u8);
        } else {
            let mut buf = [0u8; 4];
            out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
        }
    }
    out
}

/// Map bytes to text, each byte becoming the char of the same value.
/// The exact inverse of [`text_to_bytes`] for byte-valued chars.
#[must_use]
pub fn bytes_to_text(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Parse `\uXXXX` at the start of `bytes`, returning the code point.
fn parse_escape(bytes: &[u8]) -> Option<u16> {
    if bytes.len() < 6 || bytes[1] != b'u' {
        return None;
    }
    let mut code: u16 = 0;
    for &b in &bytes[2..6] {
        let digit = (b as char).to_digit(16)?;
        code = code * 16 + digit as u16;
    }
    Some(code)
}
