//! Projection writer — materializes manifest entries into a nested document.
//!
//! Two passes, never merged: entries whose path carries no query are applied
//! first, then query entries. Query rules may need to *find* elements the
//! plain pass populated; running plain first lets predicates match existing
//! elements instead of always appending placeholders.

use serde_json::{Map, Value};

use crate::error::{json_type, ProjectError};
use crate::manifest::Manifest;
use crate::path::{parse_path, PathSegment, Predicate};

/// Materialize the manifest into a nested document.
pub fn write_projection(manifest: &Manifest) -> Result<Value, ProjectError> {
    let mut record = Value::Object(Map::new());
    let mut queries = Vec::new();

    for (path, value) in &manifest.entries {
        if path.contains('?') {
            queries.push((path, value));
            continue;
        }
        insert_value(&mut record, path, value.clone())?;
    }
    for (path, value) in queries {
        insert_query(&mut record, path, value.clone())?;
    }

    Ok(record)
}

// ---------------------------------------------------------------------------
// Plain navigation
// ---------------------------------------------------------------------------

/// Insert a value at a plain (query-free) output path, creating intermediate
/// maps on demand and extending lists with empty-map placeholders up to the
/// needed index. The terminal assignment overwrites any existing value.
pub fn insert_value(record: &mut Value, path: &str, value: Value) -> Result<(), ProjectError> {
    let mut parts: Vec<&str> = path.split('.').collect();
    if parts.first() == Some(&"$") {
        parts.remove(0);
    }
    if parts.is_empty() {
        return Ok(());
    }
    write_plain(record, &parts, value, path)
}

fn write_plain(
    node: &mut Value,
    parts: &[&str],
    value: Value,
    full_path: &str,
) -> Result<(), ProjectError> {
    let (raw, rest) = match parts.split_first() {
        Some(split) => split,
        None => return Ok(()),
    };
    let map = match node {
        Value::Object(map) => map,
        other => {
            return Err(ProjectError::TypeConflict {
                path: full_path.to_string(),
                expected: "object",
                found: json_type(other),
            })
        }
    };
    let (key, indices) = split_indices(raw, full_path)?;

    if indices.is_empty() {
        if rest.is_empty() {
            map.insert(key.to_string(), value);
            return Ok(());
        }
        let child = map
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        return write_plain(child, rest, value, full_path);
    }

    // List navigation: walk the bracket indices, extending with placeholders.
    let mut current = map
        .entry(key.to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    let last = indices.len() - 1;
    for (depth, &idx) in indices.iter().enumerate() {
        let list = match current {
            Value::Array(list) => list,
            other => {
                return Err(ProjectError::TypeConflict {
                    path: full_path.to_string(),
                    expected: "array",
                    found: json_type(other),
                })
            }
        };
        while list.len() <= idx {
            // Inner bracket levels hold nested lists, the final level maps.
            if depth < last {
                list.push(Value::Array(Vec::new()));
            } else {
                list.push(Value::Object(Map::new()));
            }
        }
        current = &mut list[idx];
    }

    if rest.is_empty() {
        *current = value;
        Ok(())
    } else {
        write_plain(current, rest, value, full_path)
    }
}

/// Split a raw plain segment into its key and bracket indices
/// (`"items[2]"` → `("items", [2])`).
fn split_indices<'a>(raw: &'a str, full_path: &str) -> Result<(&'a str, Vec<usize>), ProjectError> {
    let syntax = |message: String| ProjectError::PathSyntax {
        path: full_path.to_string(),
        message,
    };

    let Some(open) = raw.find('[') else {
        if raw.is_empty() {
            return Err(syntax("empty path segment".to_string()));
        }
        return Ok((raw, Vec::new()));
    };
    let key = &raw[..open];
    if key.is_empty() {
        return Err(syntax(format!("segment `{raw}` has no key")));
    }

    let mut indices = Vec::new();
    let mut rest = &raw[open..];
    while !rest.is_empty() {
        let Some(stripped) = rest.strip_prefix('[') else {
            return Err(syntax(format!("unexpected `{rest}` in segment `{raw}`")));
        };
        let Some(close) = stripped.find(']') else {
            return Err(syntax(format!("unterminated `[` in segment `{raw}`")));
        };
        let digits = &stripped[..close];
        let index = digits
            .parse::<usize>()
            .map_err(|_| syntax(format!("`{digits}` is not a list index in segment `{raw}`")))?;
        indices.push(index);
        rest = &stripped[close + 1..];
    }
    Ok((key, indices))
}

// ---------------------------------------------------------------------------
// Query navigation
// ---------------------------------------------------------------------------

/// Insert a value at an output path that may carry predicate queries.
///
/// Four cases per segment: query with index (select by position among the
/// matching elements), query alone (write through every matching element),
/// index alone (plain list navigation), key alone (plain map navigation).
/// When a query matches nothing, a placeholder element pre-populated with the
/// predicate equalities is appended, so the written element satisfies its
/// own query.
pub fn insert_query(record: &mut Value, path: &str, value: Value) -> Result<(), ProjectError> {
    let segments = parse_path(path)?;
    write_query(record, &segments, &value, path)
}

fn write_query(
    node: &mut Value,
    segments: &[PathSegment],
    value: &Value,
    full_path: &str,
) -> Result<(), ProjectError> {
    let (segment, rest) = match segments.split_first() {
        Some(split) => split,
        None => return Ok(()),
    };
    let map = match node {
        Value::Object(map) => map,
        other => {
            return Err(ProjectError::TypeConflict {
                path: full_path.to_string(),
                expected: "object",
                found: json_type(other),
            })
        }
    };

    match (&segment.query, segment.index) {
        (Some(predicates), Some(index)) => {
            let list = ensure_list(map, &segment.key, full_path)?;
            let matches = matching_indices(list, predicates);
            let slot = if let Some(&found) = matches.get(index) {
                found
            } else {
                for _ in 0..index + 1 - matches.len() {
                    list.push(placeholder(predicates));
                }
                list.len() - 1
            };
            descend(&mut list[slot], rest, value, full_path)?;
        }
        (Some(predicates), None) => {
            let list = ensure_list(map, &segment.key, full_path)?;
            let mut matches = matching_indices(list, predicates);
            if matches.is_empty() {
                list.push(placeholder(predicates));
                matches.push(list.len() - 1);
            }
            for idx in matches {
                descend(&mut list[idx], rest, value, full_path)?;
            }
        }
        (None, Some(index)) => {
            let list = ensure_list(map, &segment.key, full_path)?;
            while list.len() <= index {
                list.push(Value::Object(Map::new()));
            }
            descend(&mut list[index], rest, value, full_path)?;
        }
        (None, None) => {
            if rest.is_empty() {
                map.insert(segment.key.clone(), value.clone());
            } else {
                let child = map
                    .entry(segment.key.clone())
                    .or_insert_with(|| Value::Object(Map::new()));
                write_query(child, rest, value, full_path)?;
            }
        }
    }
    Ok(())
}

/// Assign at the end of the path, or keep walking.
fn descend(
    slot: &mut Value,
    rest: &[PathSegment],
    value: &Value,
    full_path: &str,
) -> Result<(), ProjectError> {
    if rest.is_empty() {
        *slot = value.clone();
        Ok(())
    } else {
        write_query(slot, rest, value, full_path)
    }
}

fn ensure_list<'a>(
    map: &'a mut Map<String, Value>,
    key: &str,
    full_path: &str,
) -> Result<&'a mut Vec<Value>, ProjectError> {
    let entry = map
        .entry(key.to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    match entry {
        Value::Array(list) => Ok(list),
        other => Err(ProjectError::TypeConflict {
            path: full_path.to_string(),
            expected: "array",
            found: json_type(other),
        }),
    }
}

/// Indices of list elements that are maps satisfying every predicate.
/// Comparison is strict `Value` equality, no coercion.
pub(crate) fn matching_indices(list: &[Value], predicates: &[Predicate]) -> Vec<usize> {
    list.iter()
        .enumerate()
        .filter(|(_, element)| {
            predicates
                .iter()
                .all(|p| element.get(&p.key) == Some(&p.value))
        })
        .map(|(idx, _)| idx)
        .collect()
}

/// A fresh list element pre-populated with the predicate equalities.
fn placeholder(predicates: &[Predicate]) -> Value {
    let mut map = Map::new();
    for p in predicates {
        map.insert(p.key.clone(), p.value.clone());
    }
    Value::Object(map)
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn empty() -> Value {
        Value::Object(Map::new())
    }

    // -----------------------------------------------------------------------
    // Plain navigation
    // -----------------------------------------------------------------------

    #[test]
    fn test_insert_value_builds_nested_maps() {
        let mut record = empty();
        insert_value(&mut record, "$.a.b.c", json!("x")).unwrap();
        assert_eq!(record, json!({ "a": { "b": { "c": "x" } } }));
    }

    #[test]
    fn test_insert_value_terminal_overwrites() {
        let mut record = empty();
        insert_value(&mut record, "$.a", json!(1)).unwrap();
        insert_value(&mut record, "$.a", json!(2)).unwrap();
        assert_eq!(record, json!({ "a": 2 }));
    }

    #[test]
    fn test_insert_value_extends_lists_with_placeholders() {
        let mut record = empty();
        insert_value(&mut record, "$.xs[2].k", json!("c")).unwrap();
        assert_eq!(record, json!({ "xs": [ {}, {}, { "k": "c" } ] }));
    }

    #[test]
    fn test_insert_value_nested_list_indices() {
        let mut record = empty();
        insert_value(&mut record, "$.grid[1][0]", json!(9)).unwrap();
        assert_eq!(record, json!({ "grid": [ [], [9] ] }));
    }

    #[test]
    fn test_insert_value_type_conflict_scalar_vs_list() {
        let mut record = empty();
        insert_value(&mut record, "$.a", json!("scalar")).unwrap();
        let err = insert_value(&mut record, "$.a[0]", json!(1)).unwrap_err();
        match err {
            ProjectError::TypeConflict {
                expected, found, ..
            } => {
                assert_eq!(expected, "array");
                assert_eq!(found, "string");
            }
            other => panic!("expected TypeConflict, got {other:?}"),
        }
    }

    #[test]
    fn test_insert_value_type_conflict_scalar_vs_map() {
        let mut record = empty();
        insert_value(&mut record, "$.a.b", json!("scalar")).unwrap();
        let err = insert_value(&mut record, "$.a.b.c", json!(1)).unwrap_err();
        assert!(matches!(err, ProjectError::TypeConflict { expected: "object", .. }));
    }

    #[test]
    fn test_insert_value_rejects_malformed_segment() {
        let mut record = empty();
        assert!(insert_value(&mut record, "$.a[", json!(1)).is_err());
        assert!(insert_value(&mut record, "$.a[]", json!(1)).is_err());
        assert!(insert_value(&mut record, "$..a", json!(1)).is_err());
    }

    // -----------------------------------------------------------------------
    // Query navigation
    // -----------------------------------------------------------------------

    #[test]
    fn test_insert_query_seeds_placeholder_from_predicates() {
        let mut record = empty();
        insert_query(
            &mut record,
            "$.reports[?(@.title=='R')].name",
            json!("r1"),
        )
        .unwrap();
        assert_eq!(record, json!({ "reports": [ { "title": "R", "name": "r1" } ] }));
    }

    #[test]
    fn test_insert_query_entries_merge_into_matching_element() {
        let mut record = empty();
        insert_query(&mut record, "$.reports[?(@.title=='R')].name", json!("r1")).unwrap();
        insert_query(&mut record, "$.reports[?(@.title=='R')].val", json!(42)).unwrap();
        assert_eq!(
            record,
            json!({ "reports": [ { "title": "R", "name": "r1", "val": 42 } ] })
        );
    }

    #[test]
    fn test_insert_query_writes_every_matching_element() {
        let mut record = json!({
            "rows": [
                { "kind": "x", "n": 1 },
                { "kind": "y", "n": 2 },
                { "kind": "x", "n": 3 }
            ]
        });
        insert_query(&mut record, "$.rows[?(@.kind=='x')].seen", json!(true)).unwrap();
        assert_eq!(
            record,
            json!({
                "rows": [
                    { "kind": "x", "n": 1, "seen": true },
                    { "kind": "y", "n": 2 },
                    { "kind": "x", "n": 3, "seen": true }
                ]
            })
        );
    }

    #[test]
    fn test_insert_query_with_index_selects_among_matches() {
        let mut record = json!({
            "rows": [
                { "kind": "x" },
                { "kind": "y" },
                { "kind": "x" }
            ]
        });
        // The second `kind == x` element is rows[2]
        insert_query(&mut record, "$.rows[?(@.kind=='x')][1].tag", json!("b")).unwrap();
        assert_eq!(
            record,
            json!({
                "rows": [
                    { "kind": "x" },
                    { "kind": "y" },
                    { "kind": "x", "tag": "b" }
                ]
            })
        );
    }

    #[test]
    fn test_insert_query_with_index_appends_missing_matches() {
        let mut record = empty();
        insert_query(&mut record, "$.rows[?(@.kind=='x')][1].tag", json!("b")).unwrap();
        assert_eq!(
            record,
            json!({ "rows": [ { "kind": "x" }, { "kind": "x", "tag": "b" } ] })
        );
    }

    #[test]
    fn test_insert_query_predicates_do_not_coerce_types() {
        let mut record = json!({ "rows": [ { "n": "2" } ] });
        // Integer literal 2 does not match the string "2" — a new element is seeded
        insert_query(&mut record, "$.rows[?(@.n==2)].hit", json!(true)).unwrap();
        assert_eq!(
            record,
            json!({ "rows": [ { "n": "2" }, { "n": 2, "hit": true } ] })
        );
    }

    #[test]
    fn test_insert_query_intermediate_keys_are_stored() {
        let mut record = empty();
        insert_query(&mut record, "$.out.rows[?(@.k=='v')].x", json!(1)).unwrap();
        assert_eq!(record, json!({ "out": { "rows": [ { "k": "v", "x": 1 } ] } }));
    }

    #[test]
    fn test_insert_query_type_conflict_on_non_list() {
        let mut record = json!({ "rows": { "not": "a list" } });
        let err = insert_query(&mut record, "$.rows[?(@.k=='v')].x", json!(1)).unwrap_err();
        assert!(matches!(err, ProjectError::TypeConflict { expected: "array", .. }));
    }

    // -----------------------------------------------------------------------
    // Two-pass discipline
    // -----------------------------------------------------------------------

    #[test]
    fn test_plain_entries_apply_before_query_entries() {
        // The query entry comes first in the manifest but must still find the
        // element the plain entry creates.
        let manifest = Manifest {
            entries: vec![
                ("$.rows[?(@.id==1)].name".to_string(), json!("one")),
                ("$.rows[0].id".to_string(), json!(1)),
            ],
            filters: Vec::new(),
        };
        let record = write_projection(&manifest).unwrap();
        assert_eq!(record, json!({ "rows": [ { "id": 1, "name": "one" } ] }));
    }

    #[test]
    fn test_empty_manifest_projects_empty_document() {
        let manifest = Manifest {
            entries: Vec::new(),
            filters: Vec::new(),
        };
        assert_eq!(write_projection(&manifest).unwrap(), json!({}));
    }
}
