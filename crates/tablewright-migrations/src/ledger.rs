//! The `migrations` ledger table.
//!
//! One row per applied migration file. The `UNIQUE` constraint on `name`
//! guarantees a file is recorded at most once even if two replays race past
//! the lock.

use chrono::NaiveDateTime;
use tablewright_core::{TablewrightError, TablewrightResult};
use tablewright_db_backends::{DatabaseBackend, Value};

use crate::builder::builder_for;
use crate::definition::{ColumnSpec, TableDefinition};
use crate::identifier::quote_identifier;

/// Name of the ledger table.
pub const LEDGER_TABLE: &str = "migrations";

/// A row of the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationLedgerEntry {
    /// Surrogate key.
    pub id: i64,
    /// The migration filename.
    pub name: String,
    /// When the migration was recorded, in UTC.
    pub created_at: NaiveDateTime,
}

/// Reads and writes the ledger. Holds no state of its own.
#[derive(Debug, Clone, Copy, Default)]
pub struct MigrationLedger;

impl MigrationLedger {
    /// Creates a ledger handle.
    pub const fn new() -> Self {
        Self
    }

    /// The ledger schema, rendered through the regular DDL builders so each
    /// dialect gets its own serial key spelling.
    pub fn table_definition() -> TableDefinition {
        TableDefinition::new(LEDGER_TABLE)
            .column(ColumnSpec::new("id", "INTEGER").primary().auto_increment())
            .column(ColumnSpec::new("name", "VARCHAR(255)").unique().not_null())
            .column(ColumnSpec::new("created_at", "TIMESTAMP").not_null())
    }

    /// Creates the ledger table if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the DDL is rejected.
    pub async fn ensure_ledger_table(&self, backend: &dyn DatabaseBackend) -> TablewrightResult<()> {
        let statements = builder_for(backend.dialect()).build_create(&Self::table_definition())?;
        for sql in &statements {
            tracing::debug!(sql = %sql, "ensuring ledger table");
            backend.execute(sql, &[]).await?;
        }
        Ok(())
    }

    /// Returns whether `filename` has been recorded.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be created or queried.
    pub async fn is_applied(
        &self,
        backend: &dyn DatabaseBackend,
        filename: &str,
    ) -> TablewrightResult<bool> {
        self.ensure_ledger_table(backend).await?;
        let dialect = backend.dialect();
        let sql = format!(
            "SELECT {id} FROM {table} WHERE {name} = {p}",
            id = quote_identifier(dialect, "id"),
            table = quote_identifier(dialect, LEDGER_TABLE),
            name = quote_identifier(dialect, "name"),
            p = dialect.placeholder(1),
        );
        match backend.query(&sql, &[Value::from(filename)]).await {
            Ok(rows) => Ok(!rows.is_empty()),
            Err(TablewrightError::DatabaseError(msg)) if is_missing_table(&msg) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Records `filename` as applied at the current UTC time.
    ///
    /// # Errors
    ///
    /// Returns [`TablewrightError::LedgerError`] if the insert fails. The DDL
    /// has already run at that point, so the caller must surface the error.
    pub async fn record_applied(
        &self,
        backend: &dyn DatabaseBackend,
        filename: &str,
    ) -> TablewrightResult<()> {
        let dialect = backend.dialect();
        let sql = format!(
            "INSERT INTO {table} ({name}, {created_at}) VALUES ({p1}, {p2})",
            table = quote_identifier(dialect, LEDGER_TABLE),
            name = quote_identifier(dialect, "name"),
            created_at = quote_identifier(dialect, "created_at"),
            p1 = dialect.placeholder(1),
            p2 = dialect.placeholder(2),
        );
        let now = chrono::Utc::now().naive_utc();
        match backend
            .execute(&sql, &[Value::from(filename), Value::DateTime(now)])
            .await
        {
            Ok(_) => {
                tracing::info!(file = %filename, "recorded migration");
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    file = %filename,
                    error = %e,
                    "migration applied but not recorded; it will run again on the next replay"
                );
                Err(TablewrightError::LedgerError {
                    filename: filename.to_string(),
                    message: e.to_string(),
                })
            }
        }
    }

    /// Returns every ledger row ordered by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be created or queried, or a row
    /// has an unexpected shape.
    pub async fn applied(
        &self,
        backend: &dyn DatabaseBackend,
    ) -> TablewrightResult<Vec<MigrationLedgerEntry>> {
        self.ensure_ledger_table(backend).await?;
        let dialect = backend.dialect();
        let q = |ident| quote_identifier(dialect, ident);
        let sql = format!(
            "SELECT {}, {}, {} FROM {} ORDER BY {}",
            q("id"),
            q("name"),
            q("created_at"),
            q(LEDGER_TABLE),
            q("name"),
        );
        backend
            .query(&sql, &[])
            .await?
            .iter()
            .map(|row| {
                Ok(MigrationLedgerEntry {
                    id: row.get("id")?,
                    name: row.get("name")?,
                    created_at: row.get("created_at")?,
                })
            })
            .collect()
    }
}

fn is_missing_table(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    message.contains("no such table")
        || message.contains("does not exist")
        || message.contains("doesn't exist")
}

#[cfg(test)]
mod tests {
    use tablewright_db_backends::sqlite::SqliteBackend;
    use tablewright_db_backends::Dialect;

    use super::*;

    #[test]
    fn test_ledger_ddl_per_dialect() {
        let def = MigrationLedger::table_definition();
        assert_eq!(
            builder_for(Dialect::Postgres).build_create(&def).unwrap()[0],
            "CREATE TABLE IF NOT EXISTS \"migrations\" (\"id\" SERIAL PRIMARY KEY, \"name\" VARCHAR(255) UNIQUE NOT NULL, \"created_at\" TIMESTAMP NOT NULL)"
        );
        assert_eq!(
            builder_for(Dialect::MySql).build_create(&def).unwrap()[0],
            "CREATE TABLE IF NOT EXISTS `migrations` (`id` INTEGER AUTO_INCREMENT PRIMARY KEY, `name` VARCHAR(255) UNIQUE NOT NULL, `created_at` TIMESTAMP NOT NULL)"
        );
        assert_eq!(
            builder_for(Dialect::Sqlite).build_create(&def).unwrap()[0],
            "CREATE TABLE IF NOT EXISTS \"migrations\" (\"id\" INTEGER PRIMARY KEY AUTOINCREMENT, \"name\" VARCHAR(255) UNIQUE NOT NULL, \"created_at\" TIMESTAMP NOT NULL)"
        );
    }

    #[test]
    fn test_missing_table_messages() {
        assert!(is_missing_table("no such table: migrations"));
        assert!(is_missing_table("relation \"migrations\" does not exist"));
        assert!(is_missing_table("Table 'db.migrations' doesn't exist"));
        assert!(!is_missing_table("syntax error"));
    }

    #[tokio::test]
    async fn test_ensure_is_idempotent() {
        let backend = SqliteBackend::memory().unwrap();
        let ledger = MigrationLedger::new();
        ledger.ensure_ledger_table(&backend).await.unwrap();
        ledger.ensure_ledger_table(&backend).await.unwrap();
        assert!(ledger.applied(&backend).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_record_and_query() {
        let backend = SqliteBackend::memory().unwrap();
        let ledger = MigrationLedger::new();
        assert!(!ledger.is_applied(&backend, "1-create_table_a.json").await.unwrap());

        ledger.record_applied(&backend, "2-create_table_b.json").await.unwrap();
        ledger.record_applied(&backend, "1-create_table_a.json").await.unwrap();

        assert!(ledger.is_applied(&backend, "1-create_table_a.json").await.unwrap());
        let entries = ledger.applied(&backend).await.unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["1-create_table_a.json", "2-create_table_b.json"]);
    }

    #[tokio::test]
    async fn test_duplicate_record_is_ledger_error() {
        let backend = SqliteBackend::memory().unwrap();
        let ledger = MigrationLedger::new();
        ledger.ensure_ledger_table(&backend).await.unwrap();
        ledger.record_applied(&backend, "1-create_table_a.json").await.unwrap();

        let err = ledger
            .record_applied(&backend, "1-create_table_a.json")
            .await
            .unwrap_err();
        assert!(err.is_recoverable());
        assert_eq!(err.target(), Some("1-create_table_a.json"));
    }
}
