// ABOUTME: Format-independent form surface: the serializer contract, the exported
// ABOUTME: flat-pair interchange, and the tagged Form enum with any-to-any conversion.

use crate::error::{Error, Result};
use crate::json::{JsonForm, JsonFormSerializer};
use crate::mime::strip_params;
use crate::multipart::{MultiPartForm, MultiPartFormSerializer};
use crate::urlencoded::{UrlEncodedForm, UrlEncodedFormSerializer};
use tracing::debug;

/// The flat interchange every representation exports to and imports from.
///
/// Each entry is a raw key and an optional raw value. `None` means the
/// source format has no value for that key at all (as opposed to an empty
/// one); importers are free to skip such entries.
pub type ExportedForm = Vec<(Vec<u8>, Option<Vec<u8>>)>;

/// Access to the header state a form body lives next to.
///
/// Serializers read the `Content-Type` to pick apart parameters such as the
/// multipart boundary, and write it back when they have to synthesize one.
pub trait HeaderContext {
    fn content_type(&self) -> Option<String>;
    fn set_content_type(&mut self, value: &str);
}

/// A free-standing header context, for use outside of a full HTTP message.
#[derive(Debug, Clone, Default)]
pub struct MessageContext {
    content_type: Option<String>,
}

impl MessageContext {
    #[must_use]
    pub fn new(content_type: Option<String>) -> Self {
        Self { content_type }
    }
}

impl HeaderContext for MessageContext {
    fn content_type(&self) -> Option<String> {
        self.content_type.clone()
    }

    fn set_content_type(&mut self, value: &str) {
        self.content_type = Some(value.to_owned());
    }
}

/// The contract every body format implements.
///
/// `deserialize` never fails: a body that does not parse as this format
/// yields `None`. `serialize` and the import path return errors only for
/// conditions the caller can act on, such as a missing multipart boundary.
pub trait FormSerializer {
    type Form;

    /// Render the form as body bytes, updating headers where the format
    /// requires it.
    fn serialize(&self, form: &Self::Form, ctx: &mut dyn HeaderContext) -> Result<Vec<u8>>;

    /// Parse body bytes into a form, or `None` when the body is not a
    /// valid instance of this format.
    fn deserialize(&self, body: &[u8], ctx: &dyn HeaderContext) -> Option<Self::Form>;

    /// A form with no fields, with headers made consistent for the format.
    fn get_empty_form(&self, ctx: &mut dyn HeaderContext) -> Result<Self::Form>;

    /// Flatten the form to raw key/value pairs.
    fn export_form(&self, form: &Self::Form) -> ExportedForm;

    /// Rebuild a form of this format from flattened pairs.
    fn import_form(&self, exported: &ExportedForm, ctx: &mut dyn HeaderContext)
        -> Result<Self::Form>;
}

/// A parsed body in one of the supported representations.
#[derive(Debug, Clone, PartialEq)]
pub enum Form {
    Json(JsonForm),
    UrlEncoded(UrlEncodedForm),
    Multipart(MultiPartForm),
}

impl Form {
    /// The format tag of this form.
    #[must_use]
    pub fn format(&self) -> FormFormat {
        match self {
            Form::Json(_) => FormFormat::Json,
            Form::UrlEncoded(_) => FormFormat::UrlEncoded,
            Form::Multipart(_) => FormFormat::Multipart,
        }
    }

    /// Flatten to the interchange pairs, whatever the representation.
    #[must_use]
    pub fn export(&self) -> ExportedForm {
        match self {
            Form::Json(form) => JsonFormSerializer.export_form(form),
            Form::UrlEncoded(form) => UrlEncodedFormSerializer.export_form(form),
            Form::Multipart(form) => MultiPartFormSerializer.export_form(form),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Form::Json(_) => "json",
            Form::UrlEncoded(_) => "urlencoded",
            Form::Multipart(_) => "multipart",
        }
    }
}

impl From<JsonForm> for Form {
    fn from(form: JsonForm) -> Self {
        Form::Json(form)
    }
}

impl From<UrlEncodedForm> for Form {
    fn from(form: UrlEncodedForm) -> Self {
        Form::UrlEncoded(form)
    }
}

impl From<MultiPartForm> for Form {
    fn from(form: MultiPartForm) -> Self {
        Form::Multipart(form)
    }
}

/// The body formats with a known serializer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormFormat {
    UrlEncoded,
    Json,
    Multipart,
}

const CONTENT_TYPE_TABLE: [(&str, FormFormat); 3] = [
    ("application/x-www-form-urlencoded", FormFormat::UrlEncoded),
    ("application/json", FormFormat::Json),
    ("multipart/form-data", FormFormat::Multipart),
];

impl FormFormat {
    /// The bare content type this format answers to.
    #[must_use]
    pub const fn content_type(self) -> &'static str {
        match self {
            FormFormat::UrlEncoded => "application/x-www-form-urlencoded",
            FormFormat::Json => "application/json",
            FormFormat::Multipart => "multipart/form-data",
        }
    }

    fn kind(self) -> &'static str {
        match self {
            FormFormat::Json => "json",
            FormFormat::UrlEncoded => "urlencoded",
            FormFormat::Multipart => "multipart",
        }
    }

    /// Look up the format for a `Content-Type` header value.
    ///
    /// Parameters are ignored, so `multipart/form-data; boundary=x`
    /// resolves like the bare type.
    pub fn from_content_type(content_type: &str) -> Result<Self> {
        let bare = strip_params(content_type);
        CONTENT_TYPE_TABLE
            .iter()
            .find(|(name, _)| *name == bare)
            .map(|&(_, format)| format)
            .ok_or_else(|| Error::UnsupportedContentType(content_type.to_owned()))
    }

    /// Like [`FormFormat::from_content_type`], but an unknown type keeps
    /// the current format instead of failing.
    #[must_use]
    pub fn from_content_type_or(content_type: &str, current: Self) -> Self {
        match Self::from_content_type(content_type) {
            Ok(format) => format,
            Err(_) => {
                debug!(content_type, "unknown content type, keeping current format");
                current
            }
        }
    }

    /// Parse body bytes as this format.
    #[must_use]
    pub fn deserialize(self, body: &[u8], ctx: &dyn HeaderContext) -> Option<Form> {
        match self {
            FormFormat::Json => JsonFormSerializer.deserialize(body, ctx).map(Form::Json),
            FormFormat::UrlEncoded => UrlEncodedFormSerializer
                .deserialize(body, ctx)
                .map(Form::UrlEncoded),
            FormFormat::Multipart => MultiPartFormSerializer
                .deserialize(body, ctx)
                .map(Form::Multipart),
        }
    }

    /// Render a form of this format as body bytes.
    ///
    /// The form's variant must match; a mismatch is a
    /// [`Error::FormatMismatch`] rather than a silent conversion.
    pub fn serialize(self, form: &Form, ctx: &mut dyn HeaderContext) -> Result<Vec<u8>> {
        match (self, form) {
            (FormFormat::Json, Form::Json(form)) => JsonFormSerializer.serialize(form, ctx),
            (FormFormat::UrlEncoded, Form::UrlEncoded(form)) => {
                UrlEncodedFormSerializer.serialize(form, ctx)
            }
            (FormFormat::Multipart, Form::Multipart(form)) => {
                MultiPartFormSerializer.serialize(form, ctx)
            }
            (_, form) => Err(Error::FormatMismatch {
                expected: self.kind(),
                found: form.kind(),
            }),
        }
    }

    /// An empty form of this format, with headers made consistent.
    pub fn empty_form(self, ctx: &mut dyn HeaderContext) -> Result<Form> {
        Ok(match self {
            FormFormat::Json => Form::Json(JsonFormSerializer.get_empty_form(ctx)?),
            FormFormat::UrlEncoded => {
                Form::UrlEncoded(UrlEncodedFormSerializer.get_empty_form(ctx)?)
            }
            FormFormat::Multipart => Form::Multipart(MultiPartFormSerializer.get_empty_form(ctx)?),
        })
    }

    /// Rebuild a form of this format from interchange pairs.
    pub fn import_form(self, exported: &ExportedForm, ctx: &mut dyn HeaderContext) -> Result<Form> {
        Ok(match self {
            FormFormat::Json => Form::Json(JsonFormSerializer.import_form(exported, ctx)?),
            FormFormat::UrlEncoded => {
                Form::UrlEncoded(UrlEncodedFormSerializer.import_form(exported, ctx)?)
            }
            FormFormat::Multipart => {
                Form::Multipart(MultiPartFormSerializer.import_form(exported, ctx)?)
            }
        })
    }
}

/// Convert a form to another representation by exporting its pairs and
/// importing them into the target format. Headers are updated as the
/// target requires, so converting to multipart installs a boundary.
pub fn convert(form: &Form, to: FormFormat, ctx: &mut dyn HeaderContext) -> Result<Form> {
    to.import_form(&form.export(), ctx)
}
