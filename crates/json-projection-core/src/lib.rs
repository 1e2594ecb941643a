//! Rule-driven JSON projection.
//!
//! The engine turns an input document and a declarative rule set into a
//! projected document in two phases. Phase one flattens the input into
//! `(flat path, scalar)` pairs and matches them against the rules, producing
//! a [`Manifest`] — an ordered sequence of `(output path, value)` entries
//! plus post-projection filters. Phase two reconstitutes the entries into a
//! nested document, honoring plain indices and predicate queries, then runs
//! the filters.
//!
//! ```
//! use json_projection_core::{project, Rule};
//! use serde_json::json;
//!
//! let data = json!({ "a": { "b": "x" } });
//! let rules: Vec<Rule> = serde_json::from_value(json!([
//!     { "source": "$.a.b", "target": "$.out" }
//! ])).unwrap();
//!
//! assert_eq!(project(&data, &rules).unwrap(), json!({ "out": "x" }));
//! ```
//!
//! The engine is synchronous and shares no state across invocations: the
//! output is a pure function of the input data, the rule-list order, and the
//! input's list orders.

pub mod error;
pub mod filters;
pub mod flatten;
pub mod manifest;
pub mod path;
pub mod rules;
pub mod writer;

pub use error::ProjectError;
pub use filters::apply_filters;
pub use flatten::flatten;
pub use manifest::{Filter, FilterKind, Manifest};
pub use path::{parse_path, PathSegment, Predicate};
pub use rules::{FieldMapping, IterateRule, Rule, RuleKind};
pub use writer::{insert_query, insert_value, write_projection};

use serde_json::Value;

/// Project `data` through `rules`: build the manifest, write the projection,
/// apply the filters.
///
/// Returns an empty document when no rule emitted anything. Fails only on a
/// malformed output path or a type conflict while writing; the input is
/// never mutated.
pub fn project(data: &Value, rules: &[Rule]) -> Result<Value, ProjectError> {
    let manifest = Manifest::build(data, rules);
    tracing::debug!(
        entries = manifest.entries.len(),
        filters = manifest.filters.len(),
        "manifest built"
    );

    let mut record = write_projection(&manifest)?;
    apply_filters(&manifest.filters, &mut record);
    Ok(record)
}
