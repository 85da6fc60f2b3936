// ABOUTME: MIME header plumbing: content-type parameters, boundary extraction,
// ABOUTME: disposition parameter escaping and filename-based type inference.

use crate::error::{Error, Result};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Fallback content type when nothing better is known.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Fixed boundary token used when a multipart body must be framed and the
/// headers carry none.
pub const DEFAULT_BOUNDARY: &str = "----WebKitFormBoundaryy6klzjxzTk68s1dI";

/// Content-Type value announcing a multipart body with the default boundary.
pub const DEFAULT_MULTIPART_CONTENT_TYPE: &str =
    "multipart/form-data; boundary=----WebKitFormBoundaryy6klzjxzTk68s1dI";

/// Everything outside RFC 8187 attr-char must be percent-encoded in the
/// extended parameter escaping mode.
const ATTR_CHAR_COMPLEMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'^')
    .remove(b'_')
    .remove(b'`')
    .remove(b'|')
    .remove(b'~');

/// Strip the parameters off a header value: `text/html; charset=utf-8`
/// becomes `text/html`. This is the lookup key for serializer selection.
#[must_use]
pub fn strip_params(header_value: &str) -> &str {
    header_value
        .split(';')
        .next()
        .unwrap_or(header_value)
        .trim()
}

/// Split a MIME header value into its main value and raw parameter string:
/// `multipart/form-data; boundary=xyz` -> `("multipart/form-data", "boundary=xyz")`.
#[must_use]
pub fn split_header_value(header_value: &str) -> (&str, &str) {
    match header_value.split_once(';') {
        Some((main, params)) => (main.trim(), params.trim()),
        None => (header_value.trim(), ""),
    }
}

/// Parse `key1="val1"; key2=val2; ...` into key/value pairs.
///
/// Splits on `;` outside of double quotes and strips one layer of quotes
/// from each value.
#[must_use]
pub fn parse_header_params(header_params: &str) -> Vec<(String, String)> {
    let mut params = Vec::new();
    let mut inside_quotes = false;
    let mut start = 0;
    let bytes = header_params.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'"' => inside_quotes = !inside_quotes,
            b';' if !inside_quotes => {
                push_param(&header_params[start..i], &mut params);
                start = i + 1;
            }
            _ => {}
        }
    }
    push_param(&header_params[start..], &mut params);
    params
}

fn push_param(pair: &str, params: &mut Vec<(String, String)>) {
    if let Some((key, value)) = pair.split_once('=') {
        params.push((
            key.trim().to_owned(),
            value.trim().trim_matches('"').to_owned(),
        ));
    }
}

/// Parse a full header into `[(key, main value), (param, value), ...]`.
#[must_use]
pub fn parse_header(key: &str, value: &str) -> Vec<(String, String)> {
    let (main, raw_params) = split_header_value(value);
    let mut parsed = parse_header_params(raw_params);
    parsed.insert(0, (key.to_owned(), main.to_owned()));
    parsed
}

/// Rebuild a header value from [`parse_header`] output (the leading element
/// supplies the main value; the header key itself is not included).
#[must_use]
pub fn unparse_header_value(parsed_header: &[(String, String)]) -> String {
    let Some((_, main)) = parsed_header.first() else {
        return String::new();
    };
    let mut header_value = main.clone();
    for (param_key, param_value) in &parsed_header[1..] {
        let quoted: String = utf8_percent_encode(param_value, ATTR_CHAR_COMPLEMENT).collect();
        header_value.push_str(&format!("; {param_key}=\"{quoted}\""));
    }
    header_value
}

/// Find a parameter by key in [`parse_header`] output.
#[must_use]
pub fn find_param<'a>(
    params: &'a [(String, String)],
    key: &str,
) -> Option<&'a (String, String)> {
    params.iter().find(|(k, _)| k == key)
}

/// Copy `params`, updating the first matching key or appending the pair.
#[must_use]
pub fn update_param(
    params: &[(String, String)],
    key: &str,
    value: &str,
) -> Vec<(String, String)> {
    let mut new_params = Vec::with_capacity(params.len() + 1);
    let mut found = false;
    for (pkey, pvalue) in params {
        if !found && pkey == key {
            new_params.push((pkey.clone(), value.to_owned()));
            found = true;
        } else {
            new_params.push((pkey.clone(), pvalue.clone()));
        }
    }
    if !found {
        new_params.push((key.to_owned(), value.to_owned()));
    }
    new_params
}

/// Extract the multipart boundary from a Content-Type header value.
///
/// The mimetype must be `multipart/*` and the boundary parameter must be
/// present; a multipart body cannot be framed without one.
pub fn extract_boundary(content_type: &str) -> Result<Vec<u8>> {
    let (mimetype, raw_params) = split_header_value(content_type);
    if !mimetype
        .split('/')
        .next()
        .unwrap_or("")
        .eq_ignore_ascii_case("multipart")
    {
        return Err(Error::NotMultipart(mimetype.to_owned()));
    }
    for (key, value) in parse_header_params(raw_params) {
        if key.eq_ignore_ascii_case("boundary") {
            return Ok(value.into_bytes());
        }
    }
    Err(Error::MissingBoundary)
}

/// Guess the MIME type from a filename extension, defaulting to
/// `application/octet-stream` (including for `None`).
#[must_use]
pub fn guess_mime(filename: Option<&str>) -> &'static str {
    let ext = filename
        .and_then(|f| f.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase());
    match ext.as_deref() {
        Some("txt") => "text/plain",
        Some("htm" | "html") => "text/html",
        Some("css") => "text/css",
        Some("csv") => "text/csv",
        Some("js" | "mjs") => "text/javascript",
        Some("json") => "application/json",
        Some("xml") => "application/xml",
        Some("pdf") => "application/pdf",
        Some("zip") => "application/zip",
        Some("gz") => "application/gzip",
        Some("tar") => "application/x-tar",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("svg") => "image/svg+xml",
        Some("webp") => "image/webp",
        Some("ico") => "image/vnd.microsoft.icon",
        Some("bmp") => "image/bmp",
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("ogg") => "audio/ogg",
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        Some("avi") => "video/x-msvideo",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",
        Some("otf") => "font/otf",
        Some("doc") => "application/msword",
        Some("bin") => "application/octet-stream",
        _ => DEFAULT_CONTENT_TYPE,
    }
}

/// Escape a Content-Disposition parameter value.
///
/// The plain mode only replaces `"` with its percent escape so quoted
/// parameters cannot be broken out of; browsers do the same for filenames
/// even though RFC 7578 leaves them unencoded. The extended mode
/// percent-encodes the full RFC 8187 attr-char complement for names that are
/// not ASCII-safe.
#[must_use]
pub fn escape_parameter(param: &str, extended: bool) -> String {
    if !extended {
        return param.replace('"', "%22");
    }
    utf8_percent_encode(param, ATTR_CHAR_COMPLEMENT).collect()
}
