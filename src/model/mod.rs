//! Model declarations
//!
//! Services hand in their models as raw JSON values:
//!
//! ```json
//! {"name": "TestModel", "table_name": "test_table", "fields": {"id": "integer", "name": "text"}}
//! ```
//!
//! [`normalize`] turns a batch of these into [`ModelInfo`] records. A bad
//! entry never aborts the batch; it lands in [`Normalized::rejected`] with the
//! reason it was refused.

pub mod registry;
pub mod types;

pub use registry::TableRegistry;
pub use types::{
    is_valid_identifier, FieldSpec, FieldType, ModelInfo, Normalized, RejectedModel,
    MAX_IDENTIFIER_LEN,
};

use crate::error::{ReconcileError, ValidationError};
use serde_json::Value;
use std::collections::HashSet;
use std::str::FromStr;
use tracing::debug;

/// Validate a service name
///
/// Service names may contain ASCII letters, digits, `_`, `-` and `.`.
pub fn validate_service_name(service_name: &str) -> Result<(), ReconcileError> {
    let ok = !service_name.is_empty()
        && service_name.len() <= 128
        && service_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if ok {
        Ok(())
    } else {
        Err(ReconcileError::InvalidServiceName(service_name.to_string()))
    }
}

/// Normalize a service's raw model declarations
///
/// Only a malformed `service_name` fails the call. Everything else is sorted
/// into accepted models and rejected entries.
pub fn normalize(service_name: &str, raw_models: &[Value]) -> Result<Normalized, ReconcileError> {
    validate_service_name(service_name)?;

    let mut out = Normalized::default();
    let mut seen_tables: HashSet<String> = HashSet::new();

    for raw in raw_models {
        let result = parse_model(raw).and_then(|model| {
            if seen_tables.insert(model.table_key()) {
                Ok(model)
            } else {
                Err(ValidationError::DuplicateTableInBatch(
                    model.table_name().to_string(),
                ))
            }
        });

        match result {
            Ok(model) => out.valid.push(model),
            Err(e) => {
                debug!("service {}: rejected model: {}", service_name, e);
                out.rejected.push(RejectedModel {
                    raw: raw.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    Ok(out)
}

fn parse_model(raw: &Value) -> Result<ModelInfo, ValidationError> {
    let obj = raw
        .as_object()
        .ok_or_else(|| ValidationError::NotAnObject(json_kind(raw)))?;

    let name = obj
        .get("name")
        .and_then(Value::as_str)
        .ok_or(ValidationError::MissingField("name"))?
        .trim();
    if name.is_empty() {
        return Err(ValidationError::EmptyName);
    }

    let table_name = obj
        .get("table_name")
        .and_then(Value::as_str)
        .ok_or(ValidationError::MissingField("table_name"))?;
    if !is_valid_identifier(table_name) {
        return Err(ValidationError::InvalidIdentifier {
            kind: "table",
            value: table_name.to_string(),
        });
    }
    if table_name.to_ascii_lowercase().starts_with("sqlite_") {
        return Err(ValidationError::ReservedTableName(table_name.to_string()));
    }

    let raw_fields = obj
        .get("fields")
        .and_then(Value::as_object)
        .filter(|f| !f.is_empty())
        .ok_or_else(|| ValidationError::EmptyFields(name.to_string()))?;

    let mut fields = Vec::with_capacity(raw_fields.len());
    let mut seen: HashSet<String> = HashSet::new();
    for (field_name, type_value) in raw_fields {
        if !is_valid_identifier(field_name) {
            return Err(ValidationError::InvalidIdentifier {
                kind: "field",
                value: field_name.clone(),
            });
        }
        if !seen.insert(field_name.to_ascii_lowercase()) {
            return Err(ValidationError::DuplicateField(field_name.clone()));
        }
        let type_name = type_value
            .as_str()
            .ok_or_else(|| ValidationError::FieldTypeNotString {
                field: field_name.clone(),
            })?;
        let field_type =
            FieldType::from_str(type_name).map_err(|_| ValidationError::UnknownFieldType {
                field: field_name.clone(),
                type_name: type_name.to_string(),
            })?;
        fields.push(FieldSpec::new(field_name.clone(), field_type));
    }

    Ok(ModelInfo::new_unchecked(
        name.to_string(),
        table_name.to_string(),
        fields,
    ))
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
