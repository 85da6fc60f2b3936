// ABOUTME: Bracket-path codec for PHP-style nested field names (a[b][c][]=v).
// ABOUTME: Parses flat key/value pairs into a NestedValue tree and builds the inverse.

use crate::merge::merge;
use crate::value::NestedValue;
use indexmap::IndexMap;
use percent_encoding::percent_decode_str;

/// One bracket group of a field name: `[]` or `[key]`.
enum Bracket<'a> {
    Empty,
    Key(&'a str),
}

/// Check whether a field name follows the bracket-path grammar:
/// `base ( "[" key? "]" )*` where base and key exclude `[`, `]` and `&`.
///
/// Names that do not match are treated as a single opaque key by the parser
/// rather than rejected, so arbitrary field names keep working.
#[must_use]
pub fn is_bracket_path(name: &str) -> bool {
    tokenize(name).is_some()
}

/// Split a field name into its base token and bracket groups.
/// Returns `None` when the name does not match the grammar.
fn tokenize(name: &str) -> Option<(&str, Vec<Bracket<'_>>)> {
    let bytes = name.as_bytes();
    let base_end = bytes
        .iter()
        .position(|&b| b == b'[')
        .unwrap_or(bytes.len());
    let base = &name[..base_end];
    if base.is_empty() || base.bytes().any(|b| b == b']' || b == b'&') {
        return None;
    }

    let mut brackets = Vec::new();
    let mut pos = base_end;
    while pos < bytes.len() {
        if bytes[pos] != b'[' {
            return None;
        }
        let close = bytes[pos + 1..]
            .iter()
            .position(|&b| b == b']')
            .map(|i| pos + 1 + i)?;
        let key = &name[pos + 1..close];
        if key.bytes().any(|b| b == b'[' || b == b'&') {
            return None;
        }
        brackets.push(if key.is_empty() {
            Bracket::Empty
        } else {
            Bracket::Key(key)
        });
        pos = close + 1;
    }
    Some((base, brackets))
}

/// Insert one name/value pair into the accumulating result.
///
/// The value is built bottom-up from the innermost bracket: `[]` wraps in a
/// one-element array, `[key]` wraps in a one-entry map, and the base token
/// merges the construction into `tokens`. An `[]` at a non-innermost position
/// is undefined in the wire format; PHP-style parsers self-concatenate the
/// value there and that behavior is preserved for arrays (anything else is
/// wrapped in a one-element array instead).
fn insert_pair(tokens: &mut IndexMap<String, NestedValue>, name: &str, value: &str) {
    let Some((base, brackets)) = tokenize(name) else {
        // Opaque key, no nesting.
        tokens.insert(name.to_owned(), NestedValue::Scalar(value.to_owned()));
        return;
    };

    if brackets.is_empty() {
        // Bare key: last occurrence wins, unless an array accumulated here
        // already, in which case the scalar is appended.
        match tokens.get_mut(base) {
            Some(NestedValue::Array(existing)) => {
                existing.push(NestedValue::Scalar(value.to_owned()));
            }
            _ => {
                tokens.insert(base.to_owned(), NestedValue::Scalar(value.to_owned()));
            }
        }
        return;
    }

    let mut new_value = NestedValue::Scalar(value.to_owned());
    for (i, bracket) in brackets.iter().rev().enumerate() {
        new_value = match bracket {
            Bracket::Empty if i == 0 => NestedValue::Array(vec![new_value]),
            Bracket::Empty => match new_value {
                NestedValue::Array(mut arr) => {
                    let copy = arr.clone();
                    arr.extend(copy);
                    NestedValue::Array(arr)
                }
                other => NestedValue::Array(vec![other]),
            },
            Bracket::Key(key) => {
                let mut map = IndexMap::new();
                map.insert((*key).to_owned(), new_value);
                NestedValue::Map(map)
            }
        };
    }

    match tokens.get_mut(base) {
        None => {
            tokens.insert(base.to_owned(), new_value);
        }
        Some(slot) => {
            let existing = std::mem::take(slot);
            *slot = match existing {
                // A scalar that was here first keeps its position as the
                // leading array element.
                NestedValue::Scalar(s) => {
                    merge(NestedValue::Array(vec![NestedValue::Scalar(s)]), new_value)
                }
                NestedValue::Array(_) => merge(existing, new_value),
                NestedValue::Map(_) => match new_value {
                    NestedValue::Map(_) => merge(new_value, existing),
                    other => merge(other, existing),
                },
            };
        }
    }
}

/// Parse a sequence of already-decoded name/value pairs into a nested tree.
pub fn parse_pairs<'a, I>(pairs: I) -> IndexMap<String, NestedValue>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut tokens = IndexMap::new();
    for (name, value) in pairs {
        insert_pair(&mut tokens, name, value);
    }
    tokens
}

/// Parse a query string using the bracket-path nesting syntax.
///
/// Pairs are split on `&` and `;`, a missing `=` yields a blank value, and
/// names and values are plus/percent-decoded before nesting is applied.
///
/// ```rust
/// use formbody::qs::parse_qs;
///
/// let parsed = parse_qs("a[]=1&a[]=2");
/// assert_eq!(parsed["a"].get(1).and_then(|v| v.as_scalar()), Some("2"));
/// ```
#[must_use]
pub fn parse_qs(qs: &str) -> IndexMap<String, NestedValue> {
    let mut tokens = IndexMap::new();
    for pair in qs.split('&').flat_map(|seg| seg.split(';')) {
        if pair.is_empty() {
            continue;
        }
        let (name, value) = match pair.split_once('=') {
            Some((n, v)) => (n, v),
            None => (pair, ""),
        };
        insert_pair(&mut tokens, &unquote_plus(name), &unquote_plus(value));
    }
    tokens
}

/// Plus-to-space then percent decoding, byte-exact (chars map to single
/// bytes latin-1 style).
fn unquote_plus(text: &str) -> String {
    let spaced = text.replace('+', " ");
    let decoded: Vec<u8> = percent_decode_str(&spaced).collect();
    crate::escape::bytes_to_text(&decoded)
}

/// Flatten a nested tree to `(bracket-path, value)` pairs, depth first.
///
/// The first path segment renders bare, subsequent segments as `[key]`.
/// Array leaves repeat `path[]=element`, appending the empty-bracket suffix
/// only when the path does not already carry it; map elements inside arrays
/// recurse beneath `path[]`.
#[must_use]
pub fn build_pairs(query: &IndexMap<String, NestedValue>) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for (key, value) in query {
        walk(value, key.clone(), &mut out);
    }
    out
}

fn walk(value: &NestedValue, path: String, out: &mut Vec<(String, String)>) {
    match value {
        NestedValue::Scalar(s) => out.push((path, s.clone())),
        NestedValue::Map(m) => {
            for (key, val) in m {
                walk(val, format!("{path}[{key}]"), out);
            }
        }
        NestedValue::Array(a) => {
            let path = if path.ends_with("[]") {
                path
            } else {
                format!("{path}[]")
            };
            for val in a {
                walk(val, path.clone(), out);
            }
        }
    }
}

/// Build a query string from a nested tree.
///
/// Values are percent-encoded (`quote_plus` style, space as `+`); keys are
/// emitted verbatim so bracket paths stay readable on the wire.
#[must_use]
pub fn build_qs(query: &IndexMap<String, NestedValue>) -> String {
    build_pairs(query)
        .iter()
        .map(|(key, value)| {
            let encoded: String = form_urlencoded::byte_serialize(value.as_bytes()).collect();
            format!("{key}={encoded}")
        })
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nested;

    fn scalar_at<'a>(
        tokens: &'a IndexMap<String, NestedValue>,
        path: &[&str],
    ) -> Option<&'a str> {
        let mut cur = tokens.get(path[0])?;
        for key in &path[1..] {
            cur = cur.get_key(key)?;
        }
        cur.as_scalar()
    }

    #[test]
    fn test_flat_pairs() {
        let parsed = parse_qs("a=1&b=2&c=3");
        assert_eq!(scalar_at(&parsed, &["a"]), Some("1"));
        assert_eq!(scalar_at(&parsed, &["c"]), Some("3"));
    }

    #[test]
    fn test_keeps_blank_values() {
        let parsed = parse_qs("a=1&b=2&c");
        assert_eq!(scalar_at(&parsed, &["c"]), Some(""));
    }

    #[test]
    fn test_semicolon_separator() {
        let parsed = parse_qs("a=1;b=2");
        assert_eq!(scalar_at(&parsed, &["b"]), Some("2"));
    }

    #[test]
    fn test_bare_duplicates_overwrite() {
        let parsed = parse_qs("a=1&a=2&a=3&a=4");
        assert_eq!(parsed["a"], nested!("4"));
    }

    #[test]
    fn test_bracket_array_accumulation() {
        let parsed = parse_qs("a[]=1&a[]=2&a[]=3&a[]=4");
        assert_eq!(parsed["a"], nested!(["1", "2", "3", "4"]));
    }

    #[test]
    fn test_bare_scalar_appends_to_existing_array() {
        let parsed = parse_qs("a[]=1&a[]=2&a=3");
        assert_eq!(parsed["a"], nested!(["1", "2", "3"]));
    }

    #[test]
    fn test_nested_keys() {
        let parsed = parse_qs("key1[key2][key3]=v");
        assert_eq!(scalar_at(&parsed, &["key1", "key2", "key3"]), Some("v"));
    }

    #[test]
    fn test_nested_complex() {
        let parsed = parse_qs(
            "key1[key2][key3][key4][]=ho&key1[key2][key3][key4][]=hey\
             &key1[key2][key3][key4][]=choco&key1[key2][key3][key4][key5][]=nest\
             &key1[key2][key3][key4][key5][key6]=deep&key1[key2][key3][key4][key5][]=along\
             &key1[key2][key3][key4][key5][key5_1]=hello",
        );
        let expected = nested!({
            "key1": {"key2": {"key3": {"key4": {
                "0": "ho",
                "1": "hey",
                "2": "choco",
                "key5": {
                    "0": "nest",
                    "key6": "deep",
                    "1": "along",
                    "key5_1": "hello"
                }
            }}}}
        });
        let tree = NestedValue::Map(parsed);
        assert_eq!(tree, expected);
    }

    #[test]
    fn test_is_bracket_path() {
        assert!(is_bracket_path("a"));
        assert!(is_bracket_path("a[]"));
        assert!(is_bracket_path("a[b]"));
        assert!(is_bracket_path("a[b][]"));
        assert!(is_bracket_path("a[b][c][]"));

        assert!(!is_bracket_path(""));
        assert!(!is_bracket_path("[]"));
        assert!(!is_bracket_path("a]b["));
        assert!(!is_bracket_path("a[b"));
        assert!(!is_bracket_path("a[[b]]"));
        assert!(!is_bracket_path("a[b]c"));
        assert!(!is_bracket_path("a&b"));
    }

    #[test]
    fn test_invalid_name_is_opaque_key() {
        let parsed = parse_qs("a]b[=1");
        assert_eq!(scalar_at(&parsed, &["a]b["]), Some("1"));

        let parsed = parse_qs("[]=x");
        assert_eq!(scalar_at(&parsed, &["[]"]), Some("x"));
    }

    #[test]
    fn test_percent_and_plus_decoding() {
        let parsed = parse_qs("na%5Bme=v%26al+ue");
        assert_eq!(scalar_at(&parsed, &["na[me"]), Some("v&al ue"));
    }

    #[test]
    fn test_build_pairs_nested() {
        let query = nested!({"key1": {"key2": {"key3": "nested_value"}}});
        let NestedValue::Map(map) = query else { unreachable!() };
        assert_eq!(
            build_pairs(&map),
            vec![("key1[key2][key3]".to_owned(), "nested_value".to_owned())]
        );
    }

    #[test]
    fn test_build_pairs_array_suffix() {
        let query = nested!({"a": ["1", "2"]});
        let NestedValue::Map(map) = query else { unreachable!() };
        assert_eq!(
            build_pairs(&map),
            vec![
                ("a[]".to_owned(), "1".to_owned()),
                ("a[]".to_owned(), "2".to_owned())
            ]
        );
    }

    #[test]
    fn test_build_qs_encodes_values_only() {
        let query = nested!({"k": {"sub": "a b&c"}});
        let NestedValue::Map(map) = query else { unreachable!() };
        assert_eq!(build_qs(&map), "k[sub]=a+b%26c");
    }

    #[test]
    fn test_parse_build_round_trip() {
        let qs = "key1[]=1&key1[]=2&key1[]=3&key2=2";
        let parsed = parse_qs(qs);
        assert_eq!(build_qs(&parsed), qs);
    }
}
