#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

//! modelsync - keep a shared database schema in line with declared models
//!
//! Several services share one physical database, and each declares the
//! tables it owns as a list of models. modelsync compares those declarations
//! with the live schema, reports drift and, when asked, repairs the safe
//! part of it (creating missing tables and adding missing columns). It never
//! drops or rewrites live structure.
//!
//! # Feature Flags
//!
//! | Feature | Description | Key Dependencies |
//! |---------|-------------|------------------|
//! | `display` | Table formatting of reports | `tabled` |
//! | `cli` | `modelsync` binary | All above + `clap`, `tracing-subscriber`, `dotenvy` |
//!
//! # Architecture
//!
//! - **[`model`]**: model declarations, normalization and the table ownership registry
//! - **[`database`]**: the [`SchemaBackend`] seam and its SQLite implementation
//! - **[`introspect`]**: cached snapshots of live table structure
//! - **[`diff`]**: pure drift detection with an explicit type compatibility matrix
//! - **[`repair`]**: repair planning and per-table execution
//! - **[`reconcile`]**: the [`ConsistencyChecker`] orchestrating a run
//! - **[`manager`]**: the [`DatabaseManager`] facade used by services
//! - **[`config`]**: configuration management
//! - **[`output`]**: report formatting
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use modelsync::DatabaseManager;
//! use serde_json::json;
//!
//! let manager = DatabaseManager::open_in_memory()?;
//! let models = vec![json!({
//!     "name": "TestModel",
//!     "table_name": "test_table",
//!     "fields": {"id": "integer", "name": "text"}
//! })];
//!
//! // validate, claim the tables and create whatever is missing
//! let registered = manager.register_models("billing", &models, true).await?;
//!
//! // read-only check, never touches the schema
//! let report = manager.check_consistency("billing", &models).await?;
//! assert!(report.is_clean());
//! ```

pub mod config;
pub mod database;
pub mod diff;
pub mod error;
pub mod introspect;
pub mod manager;
pub mod model;
pub mod output;
pub mod reconcile;
pub mod repair;

#[cfg(test)]
mod test_support;

// =============================================================================
// Configuration
// =============================================================================

pub use config::ModelsyncConfig;

// =============================================================================
// Facade and orchestration
// =============================================================================

pub use manager::DatabaseManager;
pub use reconcile::{ConsistencyChecker, ReconcileState, ReconciliationReport, ReconciliationStatus};

// =============================================================================
// Models, drift and repairs
// =============================================================================

pub use diff::{diff, DriftItem, DriftKind};
pub use model::{normalize, FieldSpec, FieldType, ModelInfo, Normalized, RejectedModel};
pub use repair::{FailedRepair, RepairAction, SkipReason, SkippedRepair};

// =============================================================================
// Database seam
// =============================================================================

pub use database::{SchemaBackend, SqliteBackend};
pub use introspect::{Introspector, MemorySnapshotCache, SchemaSnapshot, SnapshotCache};

// =============================================================================
// Errors and output
// =============================================================================

pub use error::{IntrospectionError, ReconcileError, RepairError, ValidationError};
pub use output::OutputFormat;
