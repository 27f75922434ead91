//! Error types for reconciliation
//!
//! Every failure category maps to one of these types. Only
//! [`ReconcileError`] ever escapes a facade call; the others are recovered
//! locally and recorded in the [`ReconciliationReport`](crate::ReconciliationReport).

use thiserror::Error;

/// Why a raw model declaration was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Raw model is not a JSON object
    #[error("model declaration must be an object, got {0}")]
    NotAnObject(&'static str),

    /// A required key is absent or has the wrong JSON type
    #[error("model is missing required string field '{0}'")]
    MissingField(&'static str),

    #[error("model name must not be empty")]
    EmptyName,

    /// `fields` is absent, not an object, or empty
    #[error("model '{0}' must declare a non-empty 'fields' mapping")]
    EmptyFields(String),

    #[error("invalid {kind} identifier '{value}'")]
    InvalidIdentifier { kind: &'static str, value: String },

    #[error("table name '{0}' uses the reserved 'sqlite_' prefix")]
    ReservedTableName(String),

    /// Field type value is not a string
    #[error("field '{field}' type must be a string")]
    FieldTypeNotString { field: String },

    #[error("field '{field}' has unknown type '{type_name}'")]
    UnknownFieldType { field: String, type_name: String },

    #[error("field '{0}' is declared more than once")]
    DuplicateField(String),

    #[error("table '{0}' is declared by more than one model in this batch")]
    DuplicateTableInBatch(String),

    #[error("table '{table}' is already owned by service '{owner}'")]
    TableOwnedByOtherService { table: String, owner: String },
}

/// Failure to read the live schema
#[derive(Error, Debug, Clone)]
pub enum IntrospectionError {
    #[error("database error while reading schema: {0}")]
    Database(String),

    #[error("schema introspection timed out after {0} ms")]
    Timeout(u128),

    /// The blocking database task panicked or was aborted
    #[error("introspection task failed: {0}")]
    Task(String),
}

/// Failure to apply one DDL action
#[derive(Error, Debug, Clone)]
pub enum RepairError {
    #[error("DDL execution failed on table '{table}': {message}")]
    Database { table: String, message: String },

    #[error("DDL on table '{table}' timed out after {millis} ms")]
    Timeout { table: String, millis: u128 },

    #[error("repair task for table '{table}' failed: {message}")]
    Task { table: String, message: String },
}

/// Call-level failure, raised only for structurally invalid top-level input
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("invalid service name '{0}'")]
    InvalidServiceName(String),
}

impl From<rusqlite::Error> for IntrospectionError {
    fn from(e: rusqlite::Error) -> Self {
        IntrospectionError::Database(e.to_string())
    }
}

impl RepairError {
    pub fn database(table: impl Into<String>, message: impl ToString) -> Self {
        RepairError::Database {
            table: table.into(),
            message: message.to_string(),
        }
    }

    /// Table the failed action targeted
    pub fn table(&self) -> &str {
        match self {
            RepairError::Database { table, .. }
            | RepairError::Timeout { table, .. }
            | RepairError::Task { table, .. } => table,
        }
    }
}
