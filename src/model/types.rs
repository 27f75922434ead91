//! Declared model types
//!
//! These are the canonical, validated forms of a service's model declarations.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Longest identifier accepted for tables and fields
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// Semantic type of a declared field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Integer,
    Text,
    Float,
    Boolean,
    Timestamp,
    Json,
}

impl FieldType {
    pub fn all() -> &'static [FieldType] {
        &[
            FieldType::Integer,
            FieldType::Text,
            FieldType::Float,
            FieldType::Boolean,
            FieldType::Timestamp,
            FieldType::Json,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            FieldType::Integer => "integer",
            FieldType::Text => "text",
            FieldType::Float => "float",
            FieldType::Boolean => "boolean",
            FieldType::Timestamp => "timestamp",
            FieldType::Json => "json",
        }
    }

    /// Column type used when this field is created by a repair
    pub fn physical_type(&self) -> &'static str {
        match self {
            FieldType::Integer => "INTEGER",
            FieldType::Text => "TEXT",
            FieldType::Float => "REAL",
            FieldType::Boolean => "BOOLEAN",
            FieldType::Timestamp => "TIMESTAMP",
            FieldType::Json => "JSON",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for FieldType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "integer" => Ok(FieldType::Integer),
            "text" => Ok(FieldType::Text),
            "float" => Ok(FieldType::Float),
            "boolean" => Ok(FieldType::Boolean),
            "timestamp" => Ok(FieldType::Timestamp),
            "json" => Ok(FieldType::Json),
            _ => Err(format!("unknown field type '{}'", s)),
        }
    }
}

/// One declared field of a model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub field_type: FieldType,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
        }
    }
}

/// Canonical declared model
///
/// Only [`normalize`](super::normalize) constructs these, so every instance
/// carries valid identifiers and at least one field. Fields keep the order
/// in which they were declared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelInfo {
    name: String,
    table_name: String,
    fields: Vec<FieldSpec>,
}

impl ModelInfo {
    pub(crate) fn new_unchecked(name: String, table_name: String, fields: Vec<FieldSpec>) -> Self {
        Self {
            name,
            table_name,
            fields,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Look up a field by name, ignoring case
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
    }

    /// Lower-cased table name, used as the matching key everywhere
    pub fn table_key(&self) -> String {
        self.table_name.to_ascii_lowercase()
    }
}

/// A raw declaration that did not produce a [`ModelInfo`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedModel {
    pub raw: Value,
    pub reason: String,
}

/// Output of normalization: accepted models plus everything that was skipped
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Normalized {
    pub valid: Vec<ModelInfo>,
    pub rejected: Vec<RejectedModel>,
}

impl Normalized {
    pub fn is_empty(&self) -> bool {
        self.valid.is_empty()
    }

    /// Table names of all valid models
    pub fn table_names(&self) -> Vec<&str> {
        self.valid.iter().map(|m| m.table_name()).collect()
    }
}

/// Check identifier rules: 1-63 ASCII letters, digits or underscores, not
/// starting with a digit.
pub fn is_valid_identifier(s: &str) -> bool {
    if s.is_empty() || s.len() > MAX_IDENTIFIER_LEN {
        return false;
    }
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
