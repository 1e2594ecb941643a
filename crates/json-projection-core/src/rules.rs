//! Declarative mapping rules.
//!
//! Rules arrive as JSON objects carrying one (or more) of four discriminating
//! keys: `source`/`target` point copies, `check_match` equality checks,
//! `iterate` list iteration, and `filter_unique` post-projection dedup.
//! Unknown keys are ignored. A rule that carries several discriminators is
//! processed once per discriminator, in the order of the table in
//! [`RuleKind`].

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Wire model
// ---------------------------------------------------------------------------

/// A mapping rule as it appears in a rule catalog.
///
/// All fields are optional; the discriminators present decide what the rule
/// does. `target` is shared by the `source` and `check_match` forms.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Rule {
    /// Flat path to copy from (`source` form).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Output path written by the `source` and `check_match` forms.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Flat-path prefixes whose suffix-keyed values are compared for equality.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_match: Option<Vec<String>>,
    /// Iteration over a variable-length source list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iterate: Option<IterateRule>,
    /// Output path of a list to deduplicate after projection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_unique: Option<String>,
}

/// The `iterate` form: one target-list element per source-list element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterateRule {
    /// Flat path of the source list (e.g. `$.applications`).
    pub source_list: String,
    /// Output path of the target list (e.g. `$.reports`).
    pub target_list: String,
    /// Per-element field mappings, relative to the list elements.
    pub mappings: Vec<FieldMapping>,
}

/// One relative source→target field copy inside an [`IterateRule`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMapping {
    pub source: String,
    pub target: String,
}

// ---------------------------------------------------------------------------
// Compiled model
// ---------------------------------------------------------------------------

/// A rule compiled down to a single discriminator.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleKind {
    /// Copy the value at every matching flat path to the target output path.
    Source { source: String, target: String },
    /// Emit a boolean: do all prefixes yield the same suffix-keyed value set?
    CheckMatch {
        prefixes: Vec<String>,
        target: String,
    },
    /// Emit one target-list element per source-list element.
    Iterate(IterateRule),
    /// Deduplicate the list at the given output path after projection.
    FilterUnique { path: String },
}

impl RuleKind {
    /// Expand a rule list into compiled single-discriminator rules, in rule
    /// order. A rule without any recognized discriminator compiles to
    /// nothing; a `source` or `check_match` discriminator without a `target`
    /// is likewise dropped.
    pub fn compile(rules: &[Rule]) -> Vec<RuleKind> {
        let mut compiled = Vec::new();
        for rule in rules {
            let before = compiled.len();

            if let Some(source) = &rule.source {
                match &rule.target {
                    Some(target) => compiled.push(RuleKind::Source {
                        source: source.clone(),
                        target: target.clone(),
                    }),
                    None => tracing::debug!(%source, "source rule without target, skipping"),
                }
            }
            if let Some(prefixes) = &rule.check_match {
                match &rule.target {
                    Some(target) => compiled.push(RuleKind::CheckMatch {
                        prefixes: prefixes.clone(),
                        target: target.clone(),
                    }),
                    None => tracing::debug!("check_match rule without target, skipping"),
                }
            }
            if let Some(iterate) = &rule.iterate {
                compiled.push(RuleKind::Iterate(iterate.clone()));
            }
            if let Some(path) = &rule.filter_unique {
                compiled.push(RuleKind::FilterUnique { path: path.clone() });
            }

            if compiled.len() == before {
                tracing::debug!("rule without recognized discriminator, skipping");
            }
        }
        compiled
    }
}

// ===========================================================================
// Tests
// ===========================================================================
