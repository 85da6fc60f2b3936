// ABOUTME: HTTP form body data model with any-to-any conversion between representations.
// ABOUTME: Provides JSON, URL-encoded and multipart forms plus the bracket-path query codec.

//! # formbody
//!
//! A data model for HTTP form bodies with lossless conversion between the
//! three common representations: `application/json`,
//! `application/x-www-form-urlencoded` and `multipart/form-data`.
//!
//! Every representation can flatten itself to raw key/value pairs (an
//! [`ExportedForm`]) and be rebuilt from them, so converting a body from
//! one format to another is a single export/import step. Nesting survives
//! the trip through flat formats via PHP-style bracket paths
//! (`a[b][]=1`), and arbitrary binary content survives the trip through
//! JSON via a `\uXXXX` byte escape.
//!
//! ## Quick Start
//!
//! ```rust
//! use formbody::{convert, FormFormat, Form, MessageContext};
//!
//! let mut ctx = MessageContext::new(Some("application/x-www-form-urlencoded".to_owned()));
//! let form = FormFormat::UrlEncoded
//!     .deserialize(b"user[name]=alice&user[tags][]=a&user[tags][]=b", &ctx)
//!     .unwrap();
//!
//! // Convert to JSON, recovering the nesting.
//! let json = convert(&form, FormFormat::Json, &mut ctx).unwrap();
//! let Form::Json(json) = json else { unreachable!() };
//! assert_eq!(
//!     json.get("user"),
//!     Some(&serde_json::json!({"name": "alice", "tags": ["a", "b"]}))
//! );
//! ```
//!
//! ## Query String Codec
//!
//! The bracket-path codec is also usable on its own:
//!
//! ```rust
//! use formbody::{nested, qs, NestedValue};
//!
//! let parsed = qs::parse_qs("a[b]=1&a[c][]=x");
//! assert_eq!(
//!     NestedValue::Map(parsed.clone()),
//!     nested!({"a": {"b": "1", "c": ["x"]}})
//! );
//! assert_eq!(qs::build_qs(&parsed), "a[b]=1&a[c][]=x");
//! ```

pub mod error;
pub mod escape;
pub mod form;
pub mod json;
pub mod merge;
pub mod mime;
pub mod multipart;
pub mod qs;
pub mod urlencoded;
pub mod value;

// Re-export commonly used items at the crate root
pub use error::{Error, Result};
pub use form::{
    convert, ExportedForm, Form, FormFormat, FormSerializer, HeaderContext, MessageContext,
};
pub use json::{JsonForm, JsonFormSerializer};
pub use merge::merge;
pub use multipart::{MultiPartForm, MultiPartFormField, MultiPartFormSerializer};
pub use urlencoded::{UrlEncodedForm, UrlEncodedFormSerializer};
pub use value::NestedValue;

// Needed by the nested! macro expansion
pub use indexmap::IndexMap;

// The nested! macro is automatically exported at crate root via #[macro_export]

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_preserves_pairs_across_all_formats() {
        let mut ctx = MessageContext::new(Some("application/x-www-form-urlencoded".to_owned()));
        let start = FormFormat::UrlEncoded
            .deserialize(b"a[b]=1&a[c][]=x&a[c][]=y&d=2", &ctx)
            .unwrap();
        let exported = start.export();

        let json = convert(&start, FormFormat::Json, &mut ctx).unwrap();
        assert_eq!(json.export(), exported);

        let multipart = convert(&json, FormFormat::Multipart, &mut ctx).unwrap();
        assert_eq!(multipart.export(), exported);

        let back = convert(&multipart, FormFormat::UrlEncoded, &mut ctx).unwrap();
        assert_eq!(back.export(), exported);
        assert_eq!(back, start);
    }

    #[test]
    fn test_format_selected_from_content_type() {
        let ctx = MessageContext::new(Some("application/json; charset=utf-8".to_owned()));
        let format = FormFormat::from_content_type(&ctx.content_type().unwrap()).unwrap();
        let form = format.deserialize(br#"{"k": "v"}"#, &ctx).unwrap();
        assert_eq!(form.format(), FormFormat::Json);
    }
}
