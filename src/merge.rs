// ABOUTME: Structural merge engine reconciling two nested value trees.
// ABOUTME: Resolves scalar/array/map shape conflicts deterministically; never errors.

use crate::value::{index_map, NestedValue};
use indexmap::IndexMap;

/// Parse a map key as a non-negative array index.
#[inline]
fn as_index(key: &str) -> Option<usize> {
    // Reject "+1", " 1" and the like; usize::from_str accepts a leading '+'.
    if key.is_empty() || !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    key.parse().ok()
}

/// Returns true if every key of the map parses as a non-negative integer.
#[must_use]
pub fn is_integer_keyed(map: &IndexMap<String, NestedValue>) -> bool {
    map.keys().all(|k| as_index(k).is_some())
}

/// Combine two nested values into one, source taking precedence on scalar
/// conflicts. Consumes both inputs, so the result can never alias data the
/// caller still holds; use [`merge_cloned`] to keep the originals.
///
/// Shape rules:
/// - Map + Map: union of keys, shared keys recurse.
/// - Array + Array: source elements first, destination elements after.
/// - Map + Array: integer keys are extracted (ascending) and prepended to the
///   array; if non-integer keys remain the array is coerced to an
///   index-keyed map and those entries are merged into it.
/// - Array + Map: the array is coerced to an index-keyed map first.
/// - A scalar source replaces whatever the destination holds; a scalar
///   destination is replaced by any container source.
#[must_use]
pub fn merge(source: NestedValue, destination: NestedValue) -> NestedValue {
    match (source, destination) {
        (NestedValue::Array(mut src), NestedValue::Array(dst)) => {
            src.extend(dst);
            NestedValue::Array(src)
        }
        (NestedValue::Map(src), NestedValue::Array(dst)) => merge_map_into_array(src, dst),
        (NestedValue::Array(src), NestedValue::Map(dst)) => {
            merge_maps(index_map(src), dst)
        }
        (NestedValue::Map(src), NestedValue::Map(dst)) => merge_maps(src, dst),
        // Scalar on either side: source wins.
        (source, _) => source,
    }
}

/// Borrowing convenience over [`merge`]; clones both inputs up front.
#[must_use]
pub fn merge_cloned(source: &NestedValue, destination: &NestedValue) -> NestedValue {
    merge(source.clone(), destination.clone())
}

fn merge_maps(
    source: IndexMap<String, NestedValue>,
    mut destination: IndexMap<String, NestedValue>,
) -> NestedValue {
    for (key, value) in source {
        // In-place update keeps the destination's key positions stable.
        match destination.get_mut(&key) {
            Some(slot) => {
                let existing = std::mem::take(slot);
                *slot = match value {
                    // Existing elements keep their positions ahead of new ones.
                    NestedValue::Array(_) => merge(existing, value),
                    NestedValue::Map(_) => merge(value, existing),
                    scalar => scalar,
                };
            }
            None => {
                destination.insert(key, value);
            }
        }
    }
    NestedValue::Map(destination)
}

/// Merge a map into an array destination.
///
/// Integer-keyed entries are pulled out in ascending key order and prepended
/// to the array. A fully integer-keyed map therefore yields a plain array;
/// leftover non-integer entries force the combined array into an index-keyed
/// map that the remaining entries are merged into.
#[must_use]
pub fn merge_map_into_array(
    source: IndexMap<String, NestedValue>,
    destination: Vec<NestedValue>,
) -> NestedValue {
    let mut int_keys: Vec<(usize, &String)> = source
        .keys()
        .filter_map(|k| as_index(k).map(|i| (i, k)))
        .collect();
    int_keys.sort_by_key(|(i, _)| *i);

    let mut merged: Vec<NestedValue> = int_keys
        .iter()
        .filter_map(|(_, k)| source.get(*k).cloned())
        .collect();
    let all_integer = int_keys.len() == source.len();
    merged.extend(destination);

    if all_integer {
        return NestedValue::Array(merged);
    }

    let remainder: IndexMap<String, NestedValue> = source
        .into_iter()
        .filter(|(k, _)| as_index(k).is_none())
        .collect();
    merge_maps(remainder, index_map(merged))
}
