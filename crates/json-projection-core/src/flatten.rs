//! Document flattening — nested JSON to `(flat path, scalar)` pairs.
//!
//! Flat paths use `$` as root, `.key` for map fields and `[i]` suffixes for
//! list indices (`$.a.b[0].c`, nested lists yield `$.a[0][1]`). They address
//! scalar leaves only and never contain queries.

use serde_json::Value;

/// Flatten a document depth-first into `(flat path, scalar)` pairs.
///
/// Every scalar leaf (including `null`) yields exactly one pair; empty maps
/// and empty lists yield nothing. Map fields are visited in document order,
/// so the output order is reproducible for a given input.
pub fn flatten(data: &Value) -> Vec<(String, Value)> {
    let mut pairs = Vec::new();
    flatten_into(data, "$".to_string(), &mut pairs);
    pairs
}

fn flatten_into(node: &Value, path: String, out: &mut Vec<(String, Value)>) {
    match node {
        Value::Object(map) => {
            for (key, child) in map {
                flatten_into(child, format!("{path}.{key}"), out);
            }
        }
        Value::Array(items) => {
            for (idx, child) in items.iter().enumerate() {
                flatten_into(child, format!("{path}[{idx}]"), out);
            }
        }
        leaf => out.push((path, leaf.clone())),
    }
}

// ===========================================================================
// Tests
// ===========================================================================
