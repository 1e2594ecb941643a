//! Manifest construction — rules applied to the flattened input.
//!
//! The manifest is the intermediate product of phase one: an ordered sequence
//! of `(output path, value)` entries plus the filters to run after
//! projection. Entries are emitted in rule order, then in flatten order
//! within a rule, so later rules can overwrite earlier values at the same
//! output path.

use std::collections::HashMap;

use regex::Regex;
use serde_json::Value;

use crate::flatten::flatten;
use crate::rules::{IterateRule, Rule, RuleKind};

// ---------------------------------------------------------------------------
// Manifest model
// ---------------------------------------------------------------------------

/// Ordered `(output path, value)` entries plus post-projection filters.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    pub entries: Vec<(String, Value)>,
    pub filters: Vec<Filter>,
}

/// A post-projection transform declared by a rule.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub kind: FilterKind,
    pub path: String,
}

/// The supported filter kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    /// Deduplicate the list at the filter path.
    Unique,
}

impl Manifest {
    /// Apply `rules` to `data`, producing entries in emission order.
    ///
    /// Building a manifest never fails: rules that match nothing emit
    /// nothing, and path syntax is only checked when the projection writer
    /// consumes the entries.
    pub fn build(data: &Value, rules: &[Rule]) -> Manifest {
        let flat = flatten(data);
        let mut entries = Vec::new();
        let mut filters = Vec::new();
        // Iterate cursors are shared across rules so a later iterate rule on
        // the same target list resumes past the earlier block.
        let mut target_track: HashMap<String, usize> = HashMap::new();

        for rule in RuleKind::compile(rules) {
            match rule {
                RuleKind::Source { source, target } => {
                    for (path, value) in &flat {
                        if *path == source {
                            entries.push((target.clone(), value.clone()));
                        }
                    }
                }
                RuleKind::CheckMatch { prefixes, target } => {
                    if let Some(matched) = check_match(&flat, &prefixes) {
                        entries.push((target, Value::Bool(matched)));
                    }
                }
                RuleKind::Iterate(rule) => {
                    apply_iterate(&rule, &flat, &mut target_track, &mut entries);
                }
                RuleKind::FilterUnique { path } => filters.push(Filter {
                    kind: FilterKind::Unique,
                    path,
                }),
            }
        }

        Manifest { entries, filters }
    }
}

// ---------------------------------------------------------------------------
// check_match
// ---------------------------------------------------------------------------

/// Gather `(suffix, value)` candidates per prefix (substring containment,
/// first occurrence of the prefix removed) and compare the distinct sets.
/// All prefixes must yield the same set for the check to hold. Returns `None`
/// when no flat path contains any prefix — the rule emits nothing.
fn check_match(flat: &[(String, Value)], prefixes: &[String]) -> Option<bool> {
    let mut groups: Vec<Vec<(String, &Value)>> = vec![Vec::new(); prefixes.len()];
    for (path, value) in flat {
        for (slot, prefix) in prefixes.iter().enumerate() {
            if path.contains(prefix.as_str()) {
                groups[slot].push((path.replacen(prefix.as_str(), "", 1), value));
            }
        }
    }
    if groups.iter().all(|group| group.is_empty()) {
        return None;
    }

    let sets: Vec<Vec<&(String, &Value)>> = groups.iter().map(|group| distinct(group)).collect();
    let (first, rest) = sets.split_first()?;
    Some(rest.iter().all(|set| set_eq(first, set)))
}

fn distinct<'a>(group: &'a [(String, &'a Value)]) -> Vec<&'a (String, &'a Value)> {
    let mut unique: Vec<&(String, &Value)> = Vec::new();
    for pair in group {
        if !unique.iter().any(|seen| **seen == *pair) {
            unique.push(pair);
        }
    }
    unique
}

fn set_eq(a: &[&(String, &Value)], b: &[&(String, &Value)]) -> bool {
    a.len() == b.len() && a.iter().all(|pair| b.iter().any(|other| **other == **pair))
}

// ---------------------------------------------------------------------------
// iterate
// ---------------------------------------------------------------------------

/// Walk flat pairs in order, advancing the target cursor whenever a fresh
/// source-list element token (`SL[i]`) appears. After the rule, the cursor
/// advances once more so a subsequent iterate rule on the same target list
/// starts a new block — gated on at least one emission, so a rule that
/// matched nothing leaves the cursor untouched.
fn apply_iterate(
    rule: &IterateRule,
    flat: &[(String, Value)],
    target_track: &mut HashMap<String, usize>,
    entries: &mut Vec<(String, Value)>,
) {
    let token_pattern = format!(r"{}\[\d+\]", regex::escape(&rule.source_list));
    let token_re = match Regex::new(&token_pattern) {
        Ok(re) => re,
        Err(err) => {
            tracing::debug!(
                %err,
                source_list = %rule.source_list,
                "source-list token pattern failed to compile, skipping iterate rule"
            );
            return;
        }
    };

    let mut source_seen: Vec<String> = Vec::new();
    let mut emitted = false;

    for (path, value) in flat {
        if !path.starts_with(rule.source_list.as_str()) {
            continue;
        }
        for mapping in &rule.mappings {
            if !path.contains(mapping.source.as_str()) {
                continue;
            }

            let cursor = target_track.entry(rule.target_list.clone()).or_insert(0);
            if let Some(found) = token_re.find(path) {
                let token = found.as_str();
                if !source_seen.iter().any(|seen| seen == token) {
                    if !source_seen.is_empty() {
                        *cursor += 1;
                    }
                    source_seen.push(token.to_string());
                }
            }

            entries.push((
                format!("{}[{}]{}", rule.target_list, cursor, mapping.target),
                value.clone(),
            ));
            emitted = true;
        }
    }

    if emitted {
        *target_track.entry(rule.target_list.clone()).or_insert(0) += 1;
    }
}

// ===========================================================================
// Tests
// ===========================================================================
