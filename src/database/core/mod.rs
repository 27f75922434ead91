//! Core database infrastructure
//!
//! - `DatabaseConn`: SQLite connection wrapper with configuration
//! - `SchemaManager`: live table introspection and repair DDL
//! - `SchemaDefinitions`: the SQL both of them run

mod connection;
mod schema;

pub use connection::DatabaseConn;
pub use schema::{ApplyOutcome, SchemaDefinitions, SchemaManager};
