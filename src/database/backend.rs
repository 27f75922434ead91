//! Database backend seam
//!
//! The reconciliation engine talks to the shared database only through
//! [`SchemaBackend`], so any relational engine (or a test double) can sit
//! behind it.

use async_trait::async_trait;
use std::collections::BTreeSet;

use crate::database::core::ApplyOutcome;
use crate::error::{IntrospectionError, RepairError};
use crate::introspect::SchemaSnapshot;
use crate::repair::RepairAction;

/// Live schema reads and DDL execution
///
/// Each call is one database round trip and may suspend.
#[async_trait]
pub trait SchemaBackend: Send + Sync {
    /// Read the structure of exactly the named tables
    ///
    /// Tables that do not exist are absent from the snapshot.
    async fn introspect(&self, tables: &BTreeSet<String>)
        -> Result<SchemaSnapshot, IntrospectionError>;

    /// Apply one action in its own transaction
    async fn apply(&self, action: &RepairAction) -> Result<ApplyOutcome, RepairError>;
}
