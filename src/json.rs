// ABOUTME: JSON form representation and its serializer.
// ABOUTME: Export/import go through the bracket-path codec; binary leaves ride the \uXXXX escape.

use crate::error::Result;
use crate::escape::{escape_bytes, text_to_bytes, unescape};
use crate::form::{ExportedForm, FormSerializer, HeaderContext};
use crate::qs;
use crate::value::NestedValue;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::trace;

/// A JSON object form. Values hold escaped text for any leaf that carries
/// raw bytes (see [`crate::escape`]); the JSON text itself therefore stays
/// plain ASCII/UTF-8 no matter the payload.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JsonForm(pub Map<String, Value>);

impl JsonForm {
    /// An empty JSON object.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl std::ops::Deref for JsonForm {
    type Target = Map<String, Value>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::ops::DerefMut for JsonForm {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl From<Map<String, Value>> for JsonForm {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Serializer for `application/json` bodies.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormSerializer;

impl FormSerializer for JsonFormSerializer {
    type Form = JsonForm;

    fn serialize(&self, form: &JsonForm, _ctx: &mut dyn HeaderContext) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&form.0)?)
    }

    fn deserialize(&self, body: &[u8], _ctx: &dyn HeaderContext) -> Option<JsonForm> {
        match serde_json::from_slice::<Value>(body) {
            Ok(Value::Object(map)) => Some(JsonForm(map)),
            Ok(_) => None,
            Err(err) => {
                trace!(%err, "body is not valid JSON");
                None
            }
        }
    }

    fn get_empty_form(&self, _ctx: &mut dyn HeaderContext) -> Result<JsonForm> {
        Ok(JsonForm::new())
    }

    fn export_form(&self, form: &JsonForm) -> ExportedForm {
        // Flatten the tree to bracket-path pairs, undoing the binary-safety
        // escaping so the exported bytes are the raw payload.
        let mut nested = IndexMap::new();
        for (key, value) in &form.0 {
            nested.insert(unescape(key), to_nested(value));
        }
        qs::build_pairs(&nested)
            .into_iter()
            .map(|(key, value)| (text_to_bytes(&key), Some(text_to_bytes(&value))))
            .collect()
    }

    fn import_form(
        &self,
        exported: &ExportedForm,
        _ctx: &mut dyn HeaderContext,
    ) -> Result<JsonForm> {
        // Escape both sides so arbitrary bytes become printable text, then
        // let the bracket-path parser rebuild the nesting.
        let escaped: Vec<(String, String)> = exported
            .iter()
            .map(|(key, value)| {
                (
                    escape_bytes(key),
                    escape_bytes(value.as_deref().unwrap_or_default()),
                )
            })
            .collect();
        let parsed = qs::parse_pairs(escaped.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        match NestedValue::Map(parsed).to_json() {
            Value::Object(map) => Ok(JsonForm(map)),
            _ => Ok(JsonForm::new()),
        }
    }
}

/// Convert a JSON value to the nested tree, stringifying leaves.
///
/// Strings are unescaped back to their raw (latin-1 style) text; numbers
/// keep serde_json's rendering so `5.0` stays `5.0`; booleans become `1`/`0`
/// and null becomes blank, the same scalar convention the multipart
/// conversion uses.
fn to_nested(value: &Value) -> NestedValue {
    match value {
        Value::Object(map) => NestedValue::Map(
            map.iter()
                .map(|(k, v)| (unescape(k), to_nested(v)))
                .collect(),
        ),
        Value::Array(arr) => NestedValue::Array(arr.iter().map(to_nested).collect()),
        Value::String(s) => NestedValue::Scalar(unescape(s)),
        Value::Number(n) => NestedValue::Scalar(n.to_string()),
        Value::Bool(b) => NestedValue::Scalar(if *b { "1" } else { "0" }.to_owned()),
        Value::Null => NestedValue::Scalar(String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::MessageContext;
    use serde_json::json;

    fn ctx() -> MessageContext {
        MessageContext::new(Some("application/json".to_owned()))
    }

    fn form_from(value: Value) -> JsonForm {
        match value {
            Value::Object(map) => JsonForm(map),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_deserialize_object_only() {
        let serializer = JsonFormSerializer;
        let form = serializer.deserialize(br#"{"a": 1}"#, &ctx()).unwrap();
        assert_eq!(form.get("a"), Some(&json!(1)));
        assert_eq!(serializer.deserialize(b"[1, 2]", &ctx()), None);
        assert_eq!(serializer.deserialize(b"not json", &ctx()), None);
        assert_eq!(serializer.deserialize(b"", &ctx()), None);
    }

    #[test]
    fn test_serialize_round_trip() {
        let serializer = JsonFormSerializer;
        let form = form_from(json!({"a": {"b": ["1", "2"]}, "c": 3}));
        let bytes = serializer.serialize(&form, &mut ctx()).unwrap();
        assert_eq!(serializer.deserialize(&bytes, &ctx()).unwrap(), form);
    }

    #[test]
    fn test_export_flattens_nesting() {
        let form = form_from(json!({"key1": {"key2": {"key3": "nested_value"}}}));
        let exported = JsonFormSerializer.export_form(&form);
        assert_eq!(
            exported,
            vec![(
                b"key1[key2][key3]".to_vec(),
                Some(b"nested_value".to_vec())
            )]
        );
    }

    #[test]
    fn test_export_scalar_rendering() {
        let form = form_from(json!({"i": 1, "f": 5.0, "t": true, "n": null}));
        let exported = JsonFormSerializer.export_form(&form);
        assert_eq!(
            exported,
            vec![
                (b"i".to_vec(), Some(b"1".to_vec())),
                (b"f".to_vec(), Some(b"5.0".to_vec())),
                (b"t".to_vec(), Some(b"1".to_vec())),
                (b"n".to_vec(), Some(b"".to_vec())),
            ]
        );
    }

    #[test]
    fn test_import_rebuilds_nesting() {
        let exported: ExportedForm = vec![
            (b"key1[key2][key3]".to_vec(), Some(b"nested_value".to_vec())),
            (b"key1[other]".to_vec(), Some(b"x".to_vec())),
        ];
        let form = JsonFormSerializer.import_form(&exported, &mut ctx()).unwrap();
        assert_eq!(
            form.get("key1"),
            Some(&json!({"key2": {"key3": "nested_value"}, "other": "x"}))
        );
    }

    #[test]
    fn test_import_escapes_binary() {
        let exported: ExportedForm = vec![(b"k".to_vec(), Some(vec![0x00, 0xff]))];
        let form = JsonFormSerializer.import_form(&exported, &mut ctx()).unwrap();
        assert_eq!(form.get("k"), Some(&json!("\\u0000\\u00ff")));
        // JSON text stays plain ASCII
        let bytes = JsonFormSerializer.serialize(&form, &mut ctx()).unwrap();
        assert!(bytes.is_ascii());
    }

    #[test]
    fn test_export_import_binary_round_trip() {
        let exported: ExportedForm = vec![(b"k".to_vec(), Some(vec![0x00, 0xff, 0x41]))];
        let form = JsonFormSerializer.import_form(&exported, &mut ctx()).unwrap();
        let back = JsonFormSerializer.export_form(&form);
        assert_eq!(back, exported);
    }

    #[test]
    fn test_export_array_duplicate_key_merge() {
        // Duplicate keys collapsing into arrays mirrors the parse side.
        let exported: ExportedForm = vec![
            (b"a[]".to_vec(), Some(b"1".to_vec())),
            (b"a[]".to_vec(), Some(b"2".to_vec())),
        ];
        let form = JsonFormSerializer.import_form(&exported, &mut ctx()).unwrap();
        assert_eq!(form.get("a"), Some(&json!(["1", "2"])));
        assert_eq!(JsonFormSerializer.export_form(&form), exported);
    }
}
