//! Database module
//!
//! This module provides all access to the shared database, organized into:
//!
//! - **core**: SQLite connection wrapper, schema introspection and repair DDL
//! - **backend**: the async [`SchemaBackend`] seam used by the engine
//! - **sqlite**: [`SqliteBackend`], the SQLite implementation of that seam
//!
//! # Architecture
//!
//! ```text
//! database/
//! ├── core/           # Foundation
//! │   ├── connection  # SQLite DatabaseConn wrapper
//! │   └── schema      # Table introspection and DDL (SchemaManager)
//! │
//! ├── backend         # SchemaBackend trait
//! └── sqlite          # SchemaBackend over a shared rusqlite connection
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use modelsync::database::{SchemaBackend, SqliteBackend};
//!
//! let backend = SqliteBackend::open("/var/lib/shared.sqlite3", Duration::from_secs(10))?;
//! let snapshot = backend.introspect(&tables).await?;
//! ```

pub mod core;

mod backend;
mod sqlite;

pub use backend::SchemaBackend;
pub use core::{ApplyOutcome, DatabaseConn, SchemaDefinitions, SchemaManager};
pub use sqlite::{SqliteBackend, DEFAULT_STATEMENT_TIMEOUT};

/// Ensure the data directory exists
pub fn ensure_data_dir(data_dir: &str) -> anyhow::Result<()> {
    std::fs::create_dir_all(data_dir)
        .map_err(|e| anyhow::anyhow!("Failed to create data directory '{}': {}", data_dir, e))
}
