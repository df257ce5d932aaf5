//! Error types with fix suggestions

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use crate::value::Kind;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

/// Failure of a single field binder.
///
/// Only raised when the incoming value's kind is not one of the recognized
/// scalar kinds. Unparsable text of a recognized kind silently defaults
/// instead (see [`crate::coerce`]).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BindError {
    #[error("unsupported value type: {kind}")]
    UnsupportedValueKind { kind: Kind },
}

/// Failure of a collaborator parser. Aborts the whole decode call.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("invalid JSON body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid XML body: {0}")]
    Xml(String),

    #[error("invalid form body: {0}")]
    Form(String),
}

/// Per-field coercion failures collected during one decode call.
///
/// Keyed by canonical (lowercased) field key, iterated in key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<String, BindError>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, err: BindError) {
        self.0.insert(key.into(), err);
    }

    pub fn get(&self, key: &str) -> Option<&BindError> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BindError)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, err)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{key}: {err}")?;
        }
        Ok(())
    }
}

/// Result of a failed decode call.
///
/// A caller sees either per-field problems or the missing-fields message,
/// never both.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("invalid input: {shape}")]
    UnsupportedInput { shape: String },

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("{0}")]
    Fields(FieldErrors),

    #[error("Please fill required fields: {}", .0.join(", "))]
    MissingRequired(Vec<String>),
}

impl DecodeError {
    /// Field-keyed coercion failures, if that is what this error carries.
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            DecodeError::Fields(errs) => Some(errs),
            _ => None,
        }
    }

    /// Names of required fields that were never satisfied.
    pub fn missing_fields(&self) -> &[String] {
        match self {
            DecodeError::MissingRequired(names) => names,
            _ => &[],
        }
    }
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        DecodeError::Parse(ParseError::Json(err))
    }
}

impl FixSuggestion for DecodeError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            DecodeError::UnsupportedInput { .. } => {
                Some("Pass a request, a key/value map, a multi-value map or a JSON object")
            }
            DecodeError::Parse(ParseError::Json(_)) => {
                Some("Send a JSON object body with Content-Type: application/json")
            }
            DecodeError::Parse(ParseError::Xml(_)) => {
                Some("Send a well-formed XML document with one root element")
            }
            DecodeError::Parse(ParseError::Form(_)) => {
                Some("Percent-encode form values and separate pairs with '&'")
            }
            DecodeError::Fields(_) => Some("Send scalar values (string, number, bool) for each field"),
            DecodeError::MissingRequired(_) => Some("Provide a non-empty value for every required field"),
        }
    }
}
