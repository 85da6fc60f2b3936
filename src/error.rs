// ABOUTME: Error types for form serialization and cross-format conversion.
// ABOUTME: Recoverable "no value" conditions are Options elsewhere; this enum is for hard failures.

use std::fmt;

/// The result type for form operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during form serialization or conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The Content-Type has no registered serializer.
    UnsupportedContentType(String),

    /// A multipart body cannot be framed without a boundary parameter.
    MissingBoundary,

    /// The Content-Type is not a multipart mimetype where one was required.
    NotMultipart(String),

    /// A `\uXXXX` escape decoded to a code point outside the single-byte range.
    InvalidEscape(u32),

    /// A form was handed to a serializer of a different kind.
    FormatMismatch {
        /// The serializer's format.
        expected: &'static str,
        /// The format of the form that was passed.
        found: &'static str,
    },

    /// JSON text could not be produced for a form.
    Json(String),

    /// Custom error message.
    Custom(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnsupportedContentType(ct) => {
                write!(f, "unimplemented form content-type: {ct}")
            }
            Error::MissingBoundary => write!(f, "missing boundary in content-type header"),
            Error::NotMultipart(mime) => {
                write!(f, "unexpected mimetype in content-type: '{mime}'")
            }
            Error::InvalidEscape(cp) => {
                write!(f, "escape decoded to non-byte code point U+{cp:04X}")
            }
            Error::FormatMismatch { expected, found } => {
                write!(f, "expected a {expected} form, got {found}")
            }
            Error::Json(msg) => write!(f, "JSON error: {msg}"),
            Error::Custom(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err.to_string())
    }
}
