//! Error types for the projection engine.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("JSON (de)serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Malformed output path `{path}`: {message}")]
    PathSyntax { path: String, message: String },

    #[error("Type conflict at {path}: segment demands {expected}, found {found}")]
    TypeConflict {
        path: String,
        expected: &'static str,
        found: &'static str,
    },
}

impl ProjectError {
    /// Returns the output-path context, if available.
    ///
    /// Returns `None` for `JsonError` (no path context).
    pub fn path(&self) -> Option<&str> {
        match self {
            ProjectError::JsonError(_) => None,
            ProjectError::PathSyntax { path, .. } => Some(path),
            ProjectError::TypeConflict { path, .. } => Some(path),
        }
    }
}

/// Short type name of a JSON value, for error messages.
pub(crate) fn json_type(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

// ===========================================================================
// Tests
// ===========================================================================
