//! Declared-type / physical-type compatibility
//!
//! The matrix is explicit. A live type is compatible with a declared type
//! only if its normalized spelling appears in that type's list.

use crate::model::FieldType;

const INTEGER_TYPES: &[&str] = &[
    "INTEGER",
    "INT",
    "BIGINT",
    "SMALLINT",
    "TINYINT",
    "MEDIUMINT",
    "INT2",
    "INT4",
    "INT8",
    "UNSIGNED BIG INT",
];

const TEXT_TYPES: &[&str] = &[
    "TEXT",
    "VARCHAR",
    "CHAR",
    "CHARACTER",
    "NCHAR",
    "NVARCHAR",
    "VARYING CHARACTER",
    "NATIVE CHARACTER",
    "CLOB",
    "STRING",
];

const FLOAT_TYPES: &[&str] = &[
    "REAL",
    "FLOAT",
    "DOUBLE",
    "DOUBLE PRECISION",
    "NUMERIC",
    "DECIMAL",
];

// SQLite stores booleans as 0/1 integers
const BOOLEAN_TYPES: &[&str] = &["BOOLEAN", "BOOL", "INTEGER", "INT", "TINYINT"];

const TIMESTAMP_TYPES: &[&str] = &[
    "TIMESTAMP",
    "DATETIME",
    "TIMESTAMPTZ",
    "TIMESTAMP WITH TIME ZONE",
    "TIMESTAMP WITHOUT TIME ZONE",
];

const JSON_TYPES: &[&str] = &["JSON", "JSONB", "TEXT"];

/// Physical types accepted for a declared type
pub fn compatible_types(field_type: FieldType) -> &'static [&'static str] {
    match field_type {
        FieldType::Integer => INTEGER_TYPES,
        FieldType::Text => TEXT_TYPES,
        FieldType::Float => FLOAT_TYPES,
        FieldType::Boolean => BOOLEAN_TYPES,
        FieldType::Timestamp => TIMESTAMP_TYPES,
        FieldType::Json => JSON_TYPES,
    }
}

/// Normalize a physical type spelling: upper-case, drop `(..)` parameters,
/// collapse whitespace
///
/// `varchar(255)` becomes `VARCHAR`, `double   precision` becomes
/// `DOUBLE PRECISION`.
pub fn normalize_physical_type(physical: &str) -> String {
    let base = match physical.find('(') {
        Some(idx) => &physical[..idx],
        None => physical,
    };
    base.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_uppercase()
}

/// Whether a live column of type `physical` can hold a declared `field_type`
pub fn is_compatible(field_type: FieldType, physical: &str) -> bool {
    let normalized = normalize_physical_type(physical);
    if normalized.is_empty() {
        return false;
    }
    compatible_types(field_type).contains(&normalized.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_physical_type() {
        assert_eq!(normalize_physical_type("varchar(255)"), "VARCHAR");
        assert_eq!(normalize_physical_type("  double   precision "), "DOUBLE PRECISION");
        assert_eq!(normalize_physical_type("NUMERIC(10, 2)"), "NUMERIC");
        assert_eq!(normalize_physical_type(""), "");
    }

    #[test]
    fn test_canonical_types_are_self_compatible() {
        for t in FieldType::all() {
            assert!(
                is_compatible(*t, t.physical_type()),
                "{} should accept {}",
                t,
                t.physical_type()
            );
        }
    }

    #[test]
    fn test_matrix() {
        assert!(is_compatible(FieldType::Integer, "bigint"));
        assert!(is_compatible(FieldType::Text, "VARCHAR(64)"));
        assert!(is_compatible(FieldType::Boolean, "INTEGER"));
        assert!(is_compatible(FieldType::Json, "text"));
        assert!(is_compatible(FieldType::Timestamp, "datetime"));

        assert!(!is_compatible(FieldType::Integer, "TEXT"));
        assert!(!is_compatible(FieldType::Text, "INTEGER"));
        assert!(!is_compatible(FieldType::Float, "INTEGER"));
        assert!(!is_compatible(FieldType::Timestamp, "DATE"));
        assert!(!is_compatible(FieldType::Text, ""));
    }
}
