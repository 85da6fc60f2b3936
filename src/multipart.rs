// ABOUTME: Multipart/form-data representation: ordered field list with case-insensitive headers.
// ABOUTME: Field identity is the Content-Disposition name parameter; framing is CRLF-delimited.

use crate::error::{Error, Result};
use crate::form::{ExportedForm, FormSerializer, HeaderContext};
use crate::mime::{
    escape_parameter, extract_boundary, find_param, guess_mime, parse_header,
    unparse_header_value, update_param, DEFAULT_MULTIPART_CONTENT_TYPE,
};
use memchr::memmem;
use tracing::debug;

const CONTENT_TYPE_KEY: &str = "Content-Type";
const CONTENT_DISPOSITION_KEY: &str = "Content-Disposition";

/// An ordered header map with case-insensitive lookup. Stored key casing is
/// preserved for serialization.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Case-insensitive lookup of the first matching header.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Replace the first matching header in place, or append.
    pub fn set(&mut self, key: &str, value: &str) {
        match self
            .entries
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
        {
            Some((_, v)) => *v = value.to_owned(),
            None => self.entries.push((key.to_owned(), value.to_owned())),
        }
    }

    /// Remove every header matching the key.
    pub fn remove(&mut self, key: &str) {
        self.entries.retain(|(k, _)| !k.eq_ignore_ascii_case(key));
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, String)> for Headers {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// One field of a `multipart/form-data` body: a header map and raw content.
///
/// Lookup identity is the `name` parameter of the `Content-Disposition`
/// header; fields built by [`MultiPartFormField::make`] always carry one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiPartFormField {
    /// Part headers, case-insensitive.
    pub headers: Headers,
    /// Raw part content.
    pub content: Vec<u8>,
}

impl MultiPartFormField {
    #[must_use]
    pub fn new(headers: Headers, content: Vec<u8>) -> Self {
        Self { headers, content }
    }

    /// Build a field from a name, optional filename and content.
    ///
    /// Quotes in the name and filename are escaped so the disposition
    /// quoting cannot be broken. A filename triggers a `Content-Type` header
    /// inferred from its extension unless one is given explicitly.
    #[must_use]
    pub fn make(
        name: &str,
        filename: Option<&str>,
        body: Vec<u8>,
        content_type: Option<&str>,
    ) -> Self {
        let escaped_name = escape_parameter(name, false);
        let mut disposition = format!("form-data; name=\"{escaped_name}\"");

        let mut headers = Headers::new();
        if let Some(filename) = filename {
            let escaped_filename = escape_parameter(filename, false);
            disposition.push_str(&format!("; filename=\"{escaped_filename}\""));
            headers.set(CONTENT_DISPOSITION_KEY, &disposition);
            let content_type = content_type.unwrap_or_else(|| guess_mime(Some(filename)));
            headers.set(CONTENT_TYPE_KEY, content_type);
        } else {
            headers.set(CONTENT_DISPOSITION_KEY, &disposition);
            if let Some(content_type) = content_type {
                headers.set(CONTENT_TYPE_KEY, content_type);
            }
        }

        Self::new(headers, body)
    }

    /// The part content decoded latin-1 style, total.
    #[must_use]
    pub fn text(&self) -> String {
        crate::escape::bytes_to_text(&self.content)
    }

    /// The part's own `Content-Type` header, if any.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE_KEY)
    }

    /// Set or clear the part's `Content-Type` header.
    pub fn set_content_type(&mut self, content_type: Option<&str>) {
        match content_type {
            Some(value) => self.headers.set(CONTENT_TYPE_KEY, value),
            None => self.headers.remove(CONTENT_TYPE_KEY),
        }
    }

    fn parse_disposition(&self) -> Vec<(String, String)> {
        let value = self.headers.get(CONTENT_DISPOSITION_KEY).unwrap_or("");
        parse_header(CONTENT_DISPOSITION_KEY, value)
    }

    /// A parameter of the `Content-Disposition` header.
    #[must_use]
    pub fn disposition_param(&self, key: &str) -> Option<String> {
        let parsed = self.parse_disposition();
        find_param(&parsed[1..], key).map(|(_, v)| v.clone())
    }

    /// Set a `Content-Disposition` header parameter, preserving the others.
    pub fn set_disposition_param(&mut self, key: &str, value: &str) {
        let parsed = self.parse_disposition();
        let updated = update_param(&parsed, key, value);
        self.headers
            .set(CONTENT_DISPOSITION_KEY, &unparse_header_value(&updated));
    }

    /// The field name from the disposition header.
    #[must_use]
    pub fn name(&self) -> Option<String> {
        self.disposition_param("name")
    }

    pub fn set_name(&mut self, name: &str) {
        self.set_disposition_param("name", name);
    }

    /// The filename parameter, if present.
    #[must_use]
    pub fn filename(&self) -> Option<String> {
        self.disposition_param("filename")
    }

    pub fn set_filename(&mut self, filename: &str) {
        self.set_disposition_param("filename", filename);
    }

    /// Render the part body: headers, blank line, content.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.content.len() + 64);
        for (i, (key, value)) in self.headers.iter().enumerate() {
            if i > 0 {
                out.extend_from_slice(b"\r\n");
            }
            out.extend_from_slice(key.as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(value.as_bytes());
        }
        out.extend_from_slice(b"\r\n\r\n");
        out.extend_from_slice(&self.content);
        out
    }
}

/// A `multipart/form-data` body: an ordered sequence of fields plus the
/// content type (with boundary) the body was framed with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiPartForm {
    fields: Vec<MultiPartFormField>,
    /// The owning message's Content-Type; the boundary lives in here.
    pub content_type: String,
}

impl MultiPartForm {
    #[must_use]
    pub fn new(fields: Vec<MultiPartFormField>, content_type: &str) -> Self {
        Self {
            fields,
            content_type: content_type.to_owned(),
        }
    }

    /// Parse a raw multipart body. The content type must carry the boundary.
    pub fn from_bytes(content: &[u8], content_type: &str) -> Result<Self> {
        let boundary = extract_boundary(content_type)?;
        let delimiter = [b"--", boundary.as_slice()].concat();
        let positions: Vec<usize> = memmem::find_iter(content, &delimiter).collect();
        if positions.is_empty() {
            return Err(Error::Custom("no boundary delimiter in body".to_owned()));
        }

        let mut fields = Vec::new();
        for window in positions.windows(2) {
            let segment = &content[window[0] + delimiter.len()..window[1]];
            fields.push(parse_part(segment)?);
        }
        // The bytes after the final delimiter must be the closing marker.
        let tail = &content[positions[positions.len() - 1] + delimiter.len()..];
        if !tail.starts_with(b"--") {
            return Err(Error::Custom("unterminated multipart body".to_owned()));
        }

        Ok(Self::new(fields, content_type))
    }

    /// The boundary from this form's content type.
    pub fn boundary(&self) -> Result<Vec<u8>> {
        extract_boundary(&self.content_type)
    }

    /// Render the whole body, terminal `--boundary--` marker included.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let boundary = self.boundary()?;
        let mut out = Vec::new();
        for field in &self.fields {
            out.extend_from_slice(b"--");
            out.extend_from_slice(&boundary);
            out.extend_from_slice(b"\r\n");
            out.extend_from_slice(&field.to_bytes());
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(b"--");
        out.extend_from_slice(&boundary);
        out.extend_from_slice(b"--\r\n\r\n");
        Ok(out)
    }

    /// All fields with the given name, in order.
    #[must_use]
    pub fn get_all(&self, name: &str) -> Vec<&MultiPartFormField> {
        self.fields
            .iter()
            .filter(|f| f.name().as_deref() == Some(name))
            .collect()
    }

    /// The first field with the given name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&MultiPartFormField> {
        self.fields
            .iter()
            .find(|f| f.name().as_deref() == Some(name))
    }

    /// Replace the first field with a matching name, or append.
    pub fn set_field(&mut self, field: MultiPartFormField) {
        let name = field.name();
        match self
            .fields
            .iter_mut()
            .find(|f| name.is_some() && f.name() == name)
        {
            Some(slot) => *slot = field,
            None => self.fields.push(field),
        }
    }

    /// Set a field from a name and raw content.
    pub fn set(&mut self, name: &str, content: Vec<u8>) {
        self.set_field(MultiPartFormField::make(name, None, content, None));
    }

    /// Append a field regardless of existing names.
    pub fn append(&mut self, field: MultiPartFormField) {
        self.fields.push(field);
    }

    /// Insert a field at a position.
    pub fn insert(&mut self, index: usize, field: MultiPartFormField) {
        self.fields.insert(index, field);
    }

    /// Remove every field with the given name.
    pub fn remove_all(&mut self, name: &str) {
        self.fields.retain(|f| f.name().as_deref() != Some(name));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate over the fields in order.
    pub fn iter(&self) -> impl Iterator<Item = &MultiPartFormField> {
        self.fields.iter()
    }

    /// Field names in order (a field without a name yields an empty string).
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.fields
            .iter()
            .map(|f| f.name().unwrap_or_default())
            .collect()
    }
}

/// Parse one delimiter-to-delimiter segment into a field.
fn parse_part(segment: &[u8]) -> Result<MultiPartFormField> {
    // The segment starts right after the delimiter: a CRLF, the part
    // headers, a blank line, the content, and the CRLF preceding the next
    // delimiter.
    let segment = segment.strip_prefix(b"\r\n").unwrap_or(segment);
    let segment = segment.strip_suffix(b"\r\n").unwrap_or(segment);

    let split = memmem::find(segment, b"\r\n\r\n")
        .ok_or_else(|| Error::Custom("part without header/content split".to_owned()))?;
    let (raw_headers, content) = (&segment[..split], &segment[split + 4..]);

    let mut headers = Headers::new();
    for line in raw_headers.split(|&b| b == b'\n') {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.is_empty() {
            continue;
        }
        let text = crate::escape::bytes_to_text(line);
        let Some((key, value)) = text.split_once(':') else {
            return Err(Error::Custom(format!("malformed part header: {text}")));
        };
        headers.set(key.trim(), value.trim());
    }

    Ok(MultiPartFormField::new(headers, content.to_vec()))
}

/// Make sure the context declares a boundary-bearing multipart content type,
/// writing the default one back into the headers when it does not.
pub(crate) fn ensure_multipart_content_type(ctx: &mut dyn HeaderContext) -> String {
    if let Some(content_type) = ctx.content_type() {
        if extract_boundary(&content_type).is_ok() {
            return content_type;
        }
    }
    ctx.set_content_type(DEFAULT_MULTIPART_CONTENT_TYPE);
    DEFAULT_MULTIPART_CONTENT_TYPE.to_owned()
}

/// Serializer for `multipart/form-data` bodies.
#[derive(Debug, Clone, Copy, Default)]
pub struct MultiPartFormSerializer;

impl FormSerializer for MultiPartFormSerializer {
    type Form = MultiPartForm;

    fn serialize(&self, form: &MultiPartForm, ctx: &mut dyn HeaderContext) -> Result<Vec<u8>> {
        // An up-to-date boundary in the message headers wins over the one
        // the form was parsed with.
        match ctx.content_type() {
            Some(content_type) if extract_boundary(&content_type).is_ok() => {
                MultiPartForm {
                    fields: form.fields.clone(),
                    content_type,
                }
                .to_bytes()
            }
            _ => form.to_bytes(),
        }
    }

    fn deserialize(&self, body: &[u8], ctx: &dyn HeaderContext) -> Option<MultiPartForm> {
        let content_type = ctx.content_type()?;
        if body.is_empty() {
            return None;
        }
        match MultiPartForm::from_bytes(body, &content_type) {
            Ok(form) => Some(form),
            Err(err) => {
                debug!(%err, "failed to parse multipart body");
                None
            }
        }
    }

    fn get_empty_form(&self, ctx: &mut dyn HeaderContext) -> Result<MultiPartForm> {
        let content_type = ensure_multipart_content_type(ctx);
        Ok(MultiPartForm::new(Vec::new(), &content_type))
    }

    fn export_form(&self, form: &MultiPartForm) -> ExportedForm {
        // Only name and content survive; auxiliary part headers are dropped
        // by design.
        form.iter()
            .map(|field| {
                let name = field.name().unwrap_or_default();
                (crate::escape::text_to_bytes(&name), Some(field.content.clone()))
            })
            .collect()
    }

    fn import_form(
        &self,
        exported: &ExportedForm,
        ctx: &mut dyn HeaderContext,
    ) -> Result<MultiPartForm> {
        let content_type = ensure_multipart_content_type(ctx);
        let fields = exported
            .iter()
            .map(|(name, value)| {
                let name = crate::escape::bytes_to_text(name);
                MultiPartFormField::make(
                    &name,
                    None,
                    value.clone().unwrap_or_default(),
                    None,
                )
            })
            .collect();
        Ok(MultiPartForm::new(fields, &content_type))
    }
}
