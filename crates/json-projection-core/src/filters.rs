//! Post-projection filters.
//!
//! Filters groom the projected record after the writer has materialized it.
//! The only kind currently declared by rules is `UNIQUE` — deduplicate the
//! list at a (possibly query-bearing) output path.

use serde_json::Value;

use crate::error::ProjectError;
use crate::manifest::{Filter, FilterKind};
use crate::path::{parse_path, PathSegment};
use crate::writer::matching_indices;

/// Apply the declared filters to the projected record.
///
/// Filters are best-effort: a filter whose path does not parse or does not
/// resolve to a list is skipped with a debug log, leaving the record as the
/// writer produced it.
pub fn apply_filters(filters: &[Filter], record: &mut Value) {
    for filter in filters {
        match filter.kind {
            FilterKind::Unique => {
                if let Err(err) = dedup_at(record, &filter.path) {
                    tracing::debug!(path = %filter.path, %err, "skipping filter_unique");
                }
            }
        }
    }
}

fn dedup_at(record: &mut Value, path: &str) -> Result<(), ProjectError> {
    let segments = parse_path(path)?;
    walk(record, &segments);
    Ok(())
}

/// Walk existing structure along the parsed segments and deduplicate the
/// list (or lists, for multi-match queries) at the end of the path. Unlike
/// the writer, resolution never creates structure: a missing key, short
/// list, or unmatched query ends the walk.
fn walk(node: &mut Value, segments: &[PathSegment]) {
    let (segment, rest) = match segments.split_first() {
        Some(split) => split,
        None => return,
    };
    let Some(map) = node.as_object_mut() else { return };
    let Some(child) = map.get_mut(&segment.key) else {
        return;
    };

    match (&segment.query, segment.index) {
        (Some(predicates), Some(index)) => {
            let Some(list) = child.as_array_mut() else { return };
            let matches = matching_indices(list, predicates);
            if let Some(&slot) = matches.get(index) {
                visit(&mut list[slot], rest);
            }
        }
        (Some(predicates), None) => {
            let Some(list) = child.as_array_mut() else { return };
            for idx in matching_indices(list, predicates) {
                visit(&mut list[idx], rest);
            }
        }
        (None, Some(index)) => {
            let Some(list) = child.as_array_mut() else { return };
            if let Some(element) = list.get_mut(index) {
                visit(element, rest);
            }
        }
        (None, None) => visit(child, rest),
    }
}

fn visit(target: &mut Value, rest: &[PathSegment]) {
    if rest.is_empty() {
        dedup_list(target);
    } else {
        walk(target, rest);
    }
}

/// Deduplicate a list in place, preserving first-seen order. Element
/// equality is JSON value equality — for map elements that is "same set of
/// (key, value) entries", insensitive to key order.
fn dedup_list(target: &mut Value) {
    let Some(list) = target.as_array_mut() else {
        tracing::debug!("filter_unique target is not a list, skipping");
        return;
    };
    let mut unique: Vec<Value> = Vec::new();
    for element in list.drain(..) {
        if !unique.contains(&element) {
            unique.push(element);
        }
    }
    *list = unique;
}

// ===========================================================================
// Tests
// ===========================================================================
