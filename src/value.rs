// ABOUTME: Generic nested value tree shared by the bracket-path codec and the merge engine.
// ABOUTME: Maps are insertion-ordered; integer-keyed maps are interchangeable with arrays.

use indexmap::IndexMap;
use std::fmt;

/// A nested form value: a text scalar, an ordered array, or an
/// insertion-ordered map.
///
/// This is the tree produced by parsing PHP-style bracket paths
/// (`a[b][c][]=v`) and consumed by the query-string builder. A `Map` whose
/// keys are all non-negative integers in textual form (`"0"`, `"1"`, ...) is
/// semantically convertible to an `Array`; the merge engine relies on this.
#[derive(Clone, Debug, PartialEq)]
pub enum NestedValue {
    /// A leaf value. Raw bytes travel through scalars via the latin-1 style
    /// char/byte mapping (see [`crate::escape`]).
    Scalar(String),
    /// An ordered sequence; positions matter, keys do not exist.
    Array(Vec<NestedValue>),
    /// An insertion-ordered mapping with unique keys. Equality is
    /// order-insensitive (`IndexMap` semantics), matching how the wire
    /// formats compare.
    Map(IndexMap<String, NestedValue>),
}

impl Default for NestedValue {
    fn default() -> Self {
        NestedValue::Map(IndexMap::new())
    }
}

impl NestedValue {
    /// Returns true if this value is a scalar.
    #[must_use]
    pub fn is_scalar(&self) -> bool {
        matches!(self, NestedValue::Scalar(_))
    }

    /// Returns true if this value is an array.
    #[must_use]
    pub fn is_array(&self) -> bool {
        matches!(self, NestedValue::Array(_))
    }

    /// Returns true if this value is a map.
    #[must_use]
    pub fn is_map(&self) -> bool {
        matches!(self, NestedValue::Map(_))
    }

    /// If this is a scalar, returns the text.
    #[must_use]
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            NestedValue::Scalar(s) => Some(s),
            _ => None,
        }
    }

    /// If this is an array, returns a reference to it.
    #[must_use]
    pub fn as_array(&self) -> Option<&Vec<NestedValue>> {
        match self {
            NestedValue::Array(a) => Some(a),
            _ => None,
        }
    }

    /// If this is an array, returns a mutable reference to it.
    pub fn as_array_mut(&mut self) -> Option<&mut Vec<NestedValue>> {
        match self {
            NestedValue::Array(a) => Some(a),
            _ => None,
        }
    }

    /// If this is a map, returns a reference to it.
    #[must_use]
    pub fn as_map(&self) -> Option<&IndexMap<String, NestedValue>> {
        match self {
            NestedValue::Map(m) => Some(m),
            _ => None,
        }
    }

    /// If this is a map, returns a mutable reference to it.
    pub fn as_map_mut(&mut self) -> Option<&mut IndexMap<String, NestedValue>> {
        match self {
            NestedValue::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Index into an array. Returns None if not an array or out of bounds.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&NestedValue> {
        self.as_array().and_then(|a| a.get(index))
    }

    /// Index into a map by key. Returns None if not a map or key not found.
    #[must_use]
    pub fn get_key(&self, key: &str) -> Option<&NestedValue> {
        self.as_map().and_then(|m| m.get(key))
    }

    /// Convert this tree to a `serde_json::Value`. Scalars stay strings;
    /// callers needing typed leaves parse them afterwards.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            NestedValue::Scalar(s) => serde_json::Value::String(s.clone()),
            NestedValue::Array(a) => {
                serde_json::Value::Array(a.iter().map(NestedValue::to_json).collect())
            }
            NestedValue::Map(m) => serde_json::Value::Object(
                m.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

/// Maps an array to its integer-keyed map equivalent:
/// `["a", "b"] -> {"0": "a", "1": "b"}`.
///
/// This is how PHP-style query strings see arrays, and the merge engine uses
/// it whenever a non-integer key has to be inserted into an array.
#[must_use]
pub fn index_map(values: Vec<NestedValue>) -> IndexMap<String, NestedValue> {
    values
        .into_iter()
        .enumerate()
        .map(|(i, value)| (i.to_string(), value))
        .collect()
}

impl fmt::Display for NestedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NestedValue::Scalar(s) => write!(f, "\"{}\"", s.escape_default()),
            NestedValue::Array(a) => {
                write!(f, "[")?;
                for (i, v) in a.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
            NestedValue::Map(m) => {
                write!(f, "{{")?;
                for (i, (k, v)) in m.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "\"{}\": {}", k.escape_default(), v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl serde::Serialize for NestedValue {
    fn serialize<S: serde::Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        match self {
            NestedValue::Scalar(s) => serializer.serialize_str(s),
            NestedValue::Array(a) => {
                use serde::ser::SerializeSeq;
                let mut seq = serializer.serialize_seq(Some(a.len()))?;
                for item in a {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            NestedValue::Map(m) => {
                use serde::ser::SerializeMap;
                let mut map = serializer.serialize_map(Some(m.len()))?;
                for (key, val) in m {
                    map.serialize_entry(key, val)?;
                }
                map.end()
            }
        }
    }
}

impl From<&str> for NestedValue {
    fn from(s: &str) -> Self {
        NestedValue::Scalar(s.to_owned())
    }
}

impl From<String> for NestedValue {
    fn from(s: String) -> Self {
        NestedValue::Scalar(s)
    }
}

impl<T: Into<NestedValue>> From<Vec<T>> for NestedValue {
    fn from(v: Vec<T>) -> Self {
        NestedValue::Array(v.into_iter().map(Into::into).collect())
    }
}

impl From<IndexMap<String, NestedValue>> for NestedValue {
    fn from(m: IndexMap<String, NestedValue>) -> Self {
        NestedValue::Map(m)
    }
}

impl<T: Into<NestedValue>> FromIterator<T> for NestedValue {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        NestedValue::Array(iter.into_iter().map(Into::into).collect())
    }
}

/// Macro for building [`NestedValue`] trees in tests and examples.
///
/// ```rust
/// use formbody::nested;
///
/// let value = nested!({
///     "key1": ["1", "2"],
///     "key2": { "inner": "v" }
/// });
/// ```
#[macro_export]
macro_rules! nested {
    // array
    ([ $($elem:tt),* $(,)? ]) => {
        $crate::NestedValue::Array(vec![ $( $crate::nested!($elem) ),* ])
    };

    // map
    ({ $($key:tt : $value:tt),* $(,)? }) => {
        {
            let mut map = $crate::IndexMap::new();
            $(
                map.insert(String::from($key), $crate::nested!($value));
            )*
            $crate::NestedValue::Map(map)
        }
    };

    // scalars and other expressions
    ($other:expr) => {
        $crate::NestedValue::from($other)
    };
}
