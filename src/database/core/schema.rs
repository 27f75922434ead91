//! Live schema access
//!
//! `SchemaDefinitions` holds the SQL used to read table structure and builds
//! the DDL for repairs. `SchemaManager` runs both against a connection.

use rusqlite::{Connection, OptionalExtension};
use std::collections::HashSet;

use crate::introspect::{LiveColumn, LiveTable, SchemaSnapshot};
use crate::model::FieldSpec;
use crate::repair::RepairAction;

/// SQL used to inspect and change the shared database
pub struct SchemaDefinitions;

impl SchemaDefinitions {
    /// Resolve a table name to its stored spelling
    pub const TABLE_LOOKUP: &'static str =
        "SELECT name FROM sqlite_master WHERE type='table' AND name = ?1 COLLATE NOCASE";

    /// Columns of a table in table order
    pub const TABLE_COLUMNS: &'static str =
        r#"SELECT name, type, "notnull", pk FROM pragma_table_info(?1) ORDER BY cid"#;

    /// Indexes defined on a table
    pub const TABLE_INDEXES: &'static str = "SELECT name FROM pragma_index_list(?1)";

    /// Columns covered by an index (expression entries have no name)
    pub const INDEX_COLUMNS: &'static str =
        "SELECT name FROM pragma_index_info(?1) WHERE name IS NOT NULL";

    /// Quote an identifier for use in DDL
    pub fn quote_ident(ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    /// `CREATE TABLE` with exactly the declared columns
    pub fn create_table(table: &str, columns: &[FieldSpec]) -> String {
        let cols = columns
            .iter()
            .map(|c| {
                format!(
                    "{} {}",
                    Self::quote_ident(&c.name),
                    c.field_type.physical_type()
                )
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!("CREATE TABLE {} ({})", Self::quote_ident(table), cols)
    }

    /// `ALTER TABLE .. ADD COLUMN` for one declared field
    pub fn add_column(table: &str, column: &FieldSpec) -> String {
        format!(
            "ALTER TABLE {} ADD COLUMN {} {}",
            Self::quote_ident(table),
            Self::quote_ident(&column.name),
            column.field_type.physical_type()
        )
    }
}

/// Result of applying one repair action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// DDL executed and committed
    Applied,
    /// The live schema already contained the change
    AlreadySatisfied,
}

/// Reads and alters live schema through one connection
pub struct SchemaManager<'a> {
    conn: &'a Connection,
}

impl<'a> SchemaManager<'a> {
    /// Create a new schema manager for the given connection
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Read the structure of one table, `None` if it does not exist
    pub fn read_table(&self, table_name: &str) -> rusqlite::Result<Option<LiveTable>> {
        let stored: Option<String> = self
            .conn
            .query_row(SchemaDefinitions::TABLE_LOOKUP, [table_name], |row| {
                row.get(0)
            })
            .optional()?;
        let Some(stored) = stored else {
            return Ok(None);
        };

        let indexed = self.indexed_columns(&stored)?;

        let mut stmt = self.conn.prepare(SchemaDefinitions::TABLE_COLUMNS)?;
        let columns = stmt
            .query_map([&stored], |row| {
                let name: String = row.get(0)?;
                let physical_type: Option<String> = row.get(1)?;
                let not_null: i64 = row.get(2)?;
                let pk: i64 = row.get(3)?;
                Ok(LiveColumn {
                    indexed: indexed.contains(&name.to_ascii_lowercase()),
                    name,
                    physical_type: physical_type.unwrap_or_default(),
                    nullable: not_null == 0,
                    primary_key: pk > 0,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(Some(LiveTable::new(stored, columns)))
    }

    /// Read several tables into a snapshot; missing tables are left out
    pub fn read_snapshot<'n>(
        &self,
        table_names: impl IntoIterator<Item = &'n str>,
    ) -> rusqlite::Result<SchemaSnapshot> {
        let mut tables = Vec::new();
        for name in table_names {
            if let Some(table) = self.read_table(name)? {
                tables.push(table);
            }
        }
        Ok(SchemaSnapshot::new(tables))
    }

    /// Lower-cased names of columns that appear in any index
    fn indexed_columns(&self, table_name: &str) -> rusqlite::Result<HashSet<String>> {
        let mut index_stmt = self.conn.prepare(SchemaDefinitions::TABLE_INDEXES)?;
        let indexes = index_stmt
            .query_map([table_name], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut columns = HashSet::new();
        let mut col_stmt = self.conn.prepare(SchemaDefinitions::INDEX_COLUMNS)?;
        for index in indexes {
            let names = col_stmt
                .query_map([&index], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            columns.extend(names.into_iter().map(|n| n.to_ascii_lowercase()));
        }
        Ok(columns)
    }

    /// Apply one repair action inside its own transaction
    ///
    /// The live state is re-read inside the transaction, so an action another
    /// run already performed reports `AlreadySatisfied` instead of failing.
    pub fn apply(&self, action: &RepairAction) -> rusqlite::Result<ApplyOutcome> {
        let tx = self.conn.unchecked_transaction()?;
        let manager = SchemaManager::new(&tx);
        let live = manager.read_table(action.table())?;

        let outcome = match action {
            RepairAction::CreateTable { table, columns } => {
                if live.is_some() {
                    ApplyOutcome::AlreadySatisfied
                } else {
                    tx.execute(&SchemaDefinitions::create_table(table, columns), [])?;
                    ApplyOutcome::Applied
                }
            }
            RepairAction::AddColumn {
                table,
                column,
                field_type,
            } => {
                // a missing table falls through to SQLite's "no such table"
                if live.is_some_and(|t| t.column(column).is_some()) {
                    ApplyOutcome::AlreadySatisfied
                } else {
                    let spec = FieldSpec::new(column.clone(), *field_type);
                    tx.execute(&SchemaDefinitions::add_column(table, &spec), [])?;
                    ApplyOutcome::Applied
                }
            }
        };

        tx.commit()?;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::core::DatabaseConn;
    use crate::model::FieldType;

    fn create_test_db() -> DatabaseConn {
        DatabaseConn::open_in_memory().unwrap()
    }

    #[test]
    fn test_create_table_sql() {
        let sql = SchemaDefinitions::create_table(
            "test_table",
            &[
                FieldSpec::new("id", FieldType::Integer),
                FieldSpec::new("name", FieldType::Text),
            ],
        );
        assert_eq!(
            sql,
            r#"CREATE TABLE "test_table" ("id" INTEGER, "name" TEXT)"#
        );
    }

    #[test]
    fn test_read_missing_table() {
        let db = create_test_db();
        let manager = SchemaManager::new(&db.conn);
        assert_eq!(manager.read_table("nope").unwrap(), None);
    }

    #[test]
    fn test_read_table_structure() {
        let db = create_test_db();
        db.execute("CREATE TABLE Users (id INTEGER PRIMARY KEY, email VARCHAR(80) NOT NULL, bio)")
            .unwrap();
        db.execute("CREATE INDEX idx_users_email ON Users(email)")
            .unwrap();

        let manager = SchemaManager::new(&db.conn);
        let table = manager.read_table("users").unwrap().unwrap();
        assert_eq!(table.name, "Users");
        assert_eq!(table.columns.len(), 3);

        let id = &table.columns[0];
        assert!(id.primary_key);
        assert_eq!(id.physical_type, "INTEGER");

        let email = table.column("EMAIL").unwrap();
        assert_eq!(email.physical_type, "VARCHAR(80)");
        assert!(!email.nullable);
        assert!(email.indexed);

        let bio = table.column("bio").unwrap();
        assert_eq!(bio.physical_type, "");
        assert!(bio.nullable);
        assert!(!bio.indexed);
    }

    #[test]
    fn test_read_snapshot_skips_missing() {
        let db = create_test_db();
        db.execute("CREATE TABLE a (x TEXT)").unwrap();

        let manager = SchemaManager::new(&db.conn);
        let snapshot = manager.read_snapshot(["a", "b"]).unwrap();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.contains("A"));
    }

    #[test]
    fn test_apply_create_and_add() {
        let db = create_test_db();
        let manager = SchemaManager::new(&db.conn);

        let create = RepairAction::CreateTable {
            table: "events".to_string(),
            columns: vec![FieldSpec::new("id", FieldType::Integer)],
        };
        assert_eq!(manager.apply(&create).unwrap(), ApplyOutcome::Applied);
        assert_eq!(
            manager.apply(&create).unwrap(),
            ApplyOutcome::AlreadySatisfied
        );

        let add = RepairAction::AddColumn {
            table: "EVENTS".to_string(),
            column: "payload".to_string(),
            field_type: FieldType::Json,
        };
        assert_eq!(manager.apply(&add).unwrap(), ApplyOutcome::Applied);
        assert_eq!(manager.apply(&add).unwrap(), ApplyOutcome::AlreadySatisfied);

        let table = manager.read_table("events").unwrap().unwrap();
        assert_eq!(table.column("payload").unwrap().physical_type, "JSON");
    }

    #[test]
    fn test_apply_add_column_to_missing_table_fails() {
        let db = create_test_db();
        let manager = SchemaManager::new(&db.conn);

        let add = RepairAction::AddColumn {
            table: "ghost".to_string(),
            column: "x".to_string(),
            field_type: FieldType::Text,
        };
        assert!(manager.apply(&add).is_err());
        assert!(!db.table_exists("ghost").unwrap());
    }
}
