// ABOUTME: URL-encoded form representation: an ordered multi-map over byte strings.
// ABOUTME: Duplicate keys are preserved positionally; nesting only exists inside bracket-path keys.

use crate::form::{ExportedForm, FormSerializer, HeaderContext};
use crate::error::Result;
use percent_encoding::{percent_decode, percent_encode, AsciiSet, CONTROLS};

/// Percent-encode everything except unreserved characters and `[` / `]`,
/// which must stay literal so bracket-path keys survive on the wire.
const QUERY_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'!')
    .add(b'"')
    .add(b'#')
    .add(b'$')
    .add(b'%')
    .add(b'&')
    .add(b'\'')
    .add(b'(')
    .add(b')')
    .add(b'*')
    .add(b'+')
    .add(b',')
    .add(b'/')
    .add(b':')
    .add(b';')
    .add(b'<')
    .add(b'=')
    .add(b'>')
    .add(b'?')
    .add(b'@')
    .add(b'\\')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}')
    .add(b'\x7f');

/// An `application/x-www-form-urlencoded` body as an ordered multi-map.
///
/// Keys and values are byte strings; duplicate keys keep their positions.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UrlEncodedForm {
    fields: Vec<(Vec<u8>, Vec<u8>)>,
}

impl UrlEncodedForm {
    /// Create a form from key/value pairs.
    #[must_use]
    pub fn new(fields: Vec<(Vec<u8>, Vec<u8>)>) -> Self {
        Self { fields }
    }

    /// The first value for `key`, if any.
    #[must_use]
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_slice())
    }

    /// All values for `key`, in order.
    #[must_use]
    pub fn get_all(&self, key: &[u8]) -> Vec<&[u8]> {
        self.fields
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_slice())
            .collect()
    }

    /// The first value for `key` as text (latin-1 style, total).
    #[must_use]
    pub fn get_text(&self, key: &str) -> Option<String> {
        self.get(key.as_bytes()).map(crate::escape::bytes_to_text)
    }

    /// Replace the first occurrence of `key` (dropping later duplicates) or
    /// append the pair when the key is absent.
    pub fn set(&mut self, key: &[u8], value: &[u8]) {
        let Some(first) = self.fields.iter().position(|(k, _)| k == key) else {
            self.append(key, value);
            return;
        };
        self.fields[first].1 = value.to_vec();
        let mut index = 0;
        self.fields.retain(|(k, _)| {
            let drop = k == key && index != first;
            index += 1;
            !drop
        });
    }

    /// Append a pair regardless of existing keys.
    pub fn append(&mut self, key: &[u8], value: &[u8]) {
        self.fields.push((key.to_vec(), value.to_vec()));
    }

    /// Remove every pair with the given key.
    pub fn remove_all(&mut self, key: &[u8]) {
        self.fields.retain(|(k, _)| k != key);
    }

    /// Number of pairs, duplicates included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true when the form holds no pairs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate over the pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &[u8])> {
        self.fields.iter().map(|(k, v)| (k.as_slice(), v.as_slice()))
    }

    /// The underlying pair storage.
    #[must_use]
    pub fn fields(&self) -> &[(Vec<u8>, Vec<u8>)] {
        &self.fields
    }
}

impl FromIterator<(Vec<u8>, Vec<u8>)> for UrlEncodedForm {
    fn from_iter<I: IntoIterator<Item = (Vec<u8>, Vec<u8>)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Serializer for `application/x-www-form-urlencoded` bodies.
#[derive(Debug, Clone, Copy, Default)]
pub struct UrlEncodedFormSerializer;

impl FormSerializer for UrlEncodedFormSerializer {
    type Form = UrlEncodedForm;

    fn serialize(&self, form: &UrlEncodedForm, _ctx: &mut dyn HeaderContext) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        for (i, (key, value)) in form.iter().enumerate() {
            if i > 0 {
                out.push(b'&');
            }
            out.extend(percent_encode(key, QUERY_SET).to_string().into_bytes());
            out.push(b'=');
            out.extend(percent_encode(value, QUERY_SET).to_string().into_bytes());
        }
        Ok(out)
    }

    fn deserialize(&self, body: &[u8], _ctx: &dyn HeaderContext) -> Option<UrlEncodedForm> {
        if body.is_empty() {
            return None;
        }
        let fields = body
            .split(|&b| b == b'&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (name, value) = match pair.iter().position(|&b| b == b'=') {
                    Some(eq) => (&pair[..eq], &pair[eq + 1..]),
                    None => (pair, &pair[pair.len()..]),
                };
                (decode_component(name), decode_component(value))
            })
            .collect();
        Some(UrlEncodedForm::new(fields))
    }

    fn get_empty_form(&self, _ctx: &mut dyn HeaderContext) -> Result<UrlEncodedForm> {
        Ok(UrlEncodedForm::default())
    }

    fn export_form(&self, form: &UrlEncodedForm) -> ExportedForm {
        form.iter()
            .map(|(k, v)| (k.to_vec(), Some(v.to_vec())))
            .collect()
    }

    fn import_form(
        &self,
        exported: &ExportedForm,
        _ctx: &mut dyn HeaderContext,
    ) -> Result<UrlEncodedForm> {
        // Pairs without a value do not exist in this representation.
        Ok(exported
            .iter()
            .filter_map(|(key, value)| {
                value.as_ref().map(|v| (key.clone(), v.clone()))
            })
            .collect())
    }
}

/// Byte-exact `+`-and-percent decoding of one component.
fn decode_component(raw: &[u8]) -> Vec<u8> {
    let spaced: Vec<u8> = raw
        .iter()
        .map(|&b| if b == b'+' { b' ' } else { b })
        .collect();
    percent_decode(&spaced).collect()
}
