//! Runtime-shaped records
//!
//! When the destination shape is only known at runtime (a config file, a CLI
//! argument), a [`ShapeFile`] describes the fields and [`Record`] stores the
//! coerced values by declared field name.
//!
//! ```yaml
//! fields:
//!   - name: User
//!     type: string
//!     required: true
//!   - name: Age
//!     type: uint8
//!     rename: years
//! ```

use std::collections::{BTreeMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::decoder::Decoder;
use crate::error::FixSuggestion;
use crate::shape::{Field, Shape};
use crate::value::{Kind, Value};

static FIELD_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid field name pattern"));

#[derive(Error, Debug)]
pub enum ShapeError {
    #[error("shape file parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("shape declares no fields")]
    Empty,

    #[error("invalid field name '{name}'")]
    InvalidName { name: String },

    #[error("duplicate field '{name}'")]
    DuplicateField { name: String },

    #[error("field '{field}' has unknown type '{kind}'")]
    UnknownKind { field: String, kind: String },
}

impl FixSuggestion for ShapeError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            ShapeError::Yaml(_) => Some("Check YAML syntax: a top-level 'fields:' list"),
            ShapeError::Empty => Some("Declare at least one entry under 'fields:'"),
            ShapeError::InvalidName { .. } => {
                Some("Field names start with a letter or '_' and contain only letters, digits, '_'")
            }
            ShapeError::DuplicateField { .. } => Some("Give every field a unique name"),
            ShapeError::UnknownKind { .. } => Some(
                "Use one of: bool, int, int8, int16, int32, int64, uint, uint8, uint16, uint32, uint64, float32, float64, string",
            ),
        }
    }
}

/// Required marker as written in YAML: a bool or free text.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Marker {
    Flag(bool),
    Text(String),
}

impl Marker {
    fn text(&self) -> String {
        match self {
            Marker::Flag(b) => b.to_string(),
            Marker::Text(t) => t.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub rename: Option<String>,
    #[serde(default)]
    pub required: Option<Marker>,
}

/// YAML description of a record shape.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShapeFile {
    pub fields: Vec<FieldSpec>,
}

impl ShapeFile {
    /// Parse and validate.
    pub fn from_yaml(text: &str) -> Result<Self, ShapeError> {
        let file: ShapeFile = serde_yaml::from_str(text)?;
        file.validate()?;
        Ok(file)
    }

    pub fn validate(&self) -> Result<(), ShapeError> {
        if self.fields.is_empty() {
            return Err(ShapeError::Empty);
        }
        let mut seen = HashSet::new();
        for spec in &self.fields {
            if !FIELD_NAME.is_match(&spec.name) {
                return Err(ShapeError::InvalidName {
                    name: spec.name.clone(),
                });
            }
            if !seen.insert(spec.name.as_str()) {
                return Err(ShapeError::DuplicateField {
                    name: spec.name.clone(),
                });
            }
            spec_kind(spec)?;
        }
        Ok(())
    }

    pub fn to_shape(&self) -> Result<Shape<Record>, ShapeError> {
        self.validate()?;
        let mut shape = Shape::new();
        for spec in &self.fields {
            let name = spec.name.clone();
            let mut field = Field::dynamic(spec.name.clone(), spec_kind(spec)?, move |rec: &mut Record, v| {
                rec.set(name.clone(), v)
            });
            if let Some(rename) = &spec.rename {
                field = field.rename(rename.clone());
            }
            if let Some(marker) = &spec.required {
                field = field.required_marker(marker.text());
            }
            shape.push(field);
        }
        Ok(shape)
    }

    pub fn decoder(&self) -> Result<Decoder<Record>, ShapeError> {
        Ok(Decoder::new(self.to_shape()?))
    }

    /// Record holding the zero value of every declared field.
    pub fn new_record(&self) -> Record {
        let mut record = Record::new();
        for spec in &self.fields {
            if let Ok(kind) = spec_kind(spec) {
                record.set(spec.name.clone(), zero_value(kind));
            }
        }
        record
    }
}

fn spec_kind(spec: &FieldSpec) -> Result<Kind, ShapeError> {
    Kind::from_name(&spec.kind).ok_or_else(|| ShapeError::UnknownKind {
        field: spec.name.clone(),
        kind: spec.kind.clone(),
    })
}

fn zero_value(kind: Kind) -> Value {
    match kind {
        Kind::Bool => Value::Bool(false),
        Kind::Int => Value::Int(0),
        Kind::Int8 => Value::Int8(0),
        Kind::Int16 => Value::Int16(0),
        Kind::Int32 => Value::Int32(0),
        Kind::Int64 => Value::Int64(0),
        Kind::Uint => Value::Uint(0),
        Kind::Uint8 => Value::Uint8(0),
        Kind::Uint16 => Value::Uint16(0),
        Kind::Uint32 => Value::Uint32(0),
        Kind::Uint64 => Value::Uint64(0),
        Kind::Float32 => Value::Float32(0.0),
        Kind::Float64 => Value::Float64(0.0),
        Kind::String => Value::Str(String::new()),
        Kind::Null | Kind::List | Kind::Map => Value::Null,
    }
}

/// Field name → coerced value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Record {
    values: BTreeMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DecodeError;
    use crate::value::FlatMap;

    const LOGIN: &str = r#"
fields:
  - name: User
    type: string
    required: true
  - name: Password
    type: string
    required: "1"
  - name: Age
    type: uint8
    rename: years
  - name: Admin
    type: bool
    required: someday
"#;

    fn map(pairs: &[(&str, &str)]) -> FlatMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Value::from(*v)))
            .collect()
    }

    #[test]
    fn parses_markers_and_renames() {
        let file = ShapeFile::from_yaml(LOGIN).unwrap();
        assert_eq!(file.fields.len(), 4);
        assert_eq!(file.fields[0].required, Some(Marker::Flag(true)));
        assert_eq!(file.fields[1].required, Some(Marker::Text("1".into())));

        let decoder = file.decoder().unwrap();
        assert_eq!(decoder.required_keys(), ["password", "user"]);
        assert!(decoder.contains("years"));
        assert!(!decoder.contains("age"));
    }

    #[test]
    fn decodes_into_record() {
        let file = ShapeFile::from_yaml(LOGIN).unwrap();
        let decoder = file.decoder().unwrap();
        let mut record = file.new_record();

        decoder
            .decode_map(
                &mut record,
                &map(&[("user", "bob"), ("password", "b0b"), ("YEARS", "33")]),
            )
            .unwrap();

        assert_eq!(record.get("User"), Some(&Value::from("bob")));
        assert_eq!(record.get("Age"), Some(&Value::Uint8(33)));
        assert_eq!(record.get("Admin"), Some(&Value::Bool(false)));
    }

    #[test]
    fn record_serializes_flat() {
        let file = ShapeFile::from_yaml(LOGIN).unwrap();
        let record = file.new_record();
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"Admin": false, "Age": 0, "Password": "", "User": ""})
        );
    }

    #[test]
    fn missing_required_reported() {
        let file = ShapeFile::from_yaml(LOGIN).unwrap();
        let mut record = Record::new();
        let err = file
            .decoder()
            .unwrap()
            .decode_map(&mut record, &map(&[("user", "bob")]))
            .unwrap_err();
        assert!(matches!(err, DecodeError::MissingRequired(ref m) if m == &["password"]));
    }

    #[test]
    fn rejects_bad_shapes() {
        assert!(matches!(
            ShapeFile::from_yaml("fields: []"),
            Err(ShapeError::Empty)
        ));
        assert!(matches!(
            ShapeFile::from_yaml("fields:\n  - {name: '9x', type: string}"),
            Err(ShapeError::InvalidName { .. })
        ));
        assert!(matches!(
            ShapeFile::from_yaml("fields:\n  - {name: a, type: string}\n  - {name: a, type: int}"),
            Err(ShapeError::DuplicateField { .. })
        ));
        assert!(matches!(
            ShapeFile::from_yaml("fields:\n  - {name: a, type: decimal}"),
            Err(ShapeError::UnknownKind { .. })
        ));
        assert!(matches!(
            ShapeFile::from_yaml("fields:\n  - {name: a, type: string, default: x}"),
            Err(ShapeError::Yaml(_))
        ));
    }

    #[test]
    fn every_shape_error_has_a_suggestion() {
        let err = ShapeError::UnknownKind {
            field: "a".into(),
            kind: "decimal".into(),
        };
        assert!(err.fix_suggestion().unwrap().contains("float64"));
        assert!(ShapeError::Empty.fix_suggestion().is_some());
    }
}
