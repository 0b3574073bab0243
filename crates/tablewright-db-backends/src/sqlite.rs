//! SQLite database backend using `rusqlite`.
//!
//! This module provides the [`SqliteBackend`] which implements the
//! [`DatabaseBackend`](crate::base::DatabaseBackend) trait using `rusqlite`
//! wrapped in `tokio::task::spawn_blocking` for async compatibility.
//!
//! Features:
//! - WAL mode enabled for file-based databases
//! - In-memory database support via `:memory:` path (great for testing)
//! - Transactional DDL batches

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tablewright_core::{DatabaseSettings, TablewrightError, TablewrightResult};
use tokio::sync::Mutex;

use crate::base::{rejected, DatabaseBackend, Dialect};
use crate::value::{Row, Value};

/// A SQLite database backend.
///
/// Uses `rusqlite` for database access with a `Mutex`-based concurrency
/// model. All operations are run via `tokio::task::spawn_blocking` to
/// avoid blocking the async runtime.
pub struct SqliteBackend {
    /// The path to the database file (or ":memory:").
    path: PathBuf,
    /// The connection, guarded by an async mutex.
    conn: Arc<Mutex<rusqlite::Connection>>,
}

impl SqliteBackend {
    /// Opens a SQLite database at the given path.
    ///
    /// If the path is `:memory:`, an in-memory database is created.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn open(path: impl Into<PathBuf>) -> TablewrightResult<Self> {
        let path = path.into();
        let in_memory = path.to_str() == Some(":memory:");
        let conn = if in_memory {
            rusqlite::Connection::open_in_memory()
        } else {
            rusqlite::Connection::open(&path)
        }
        .map_err(|e| TablewrightError::ConnectionError(format!("SQLite open failed: {e}")))?;

        let pragmas = if in_memory {
            "PRAGMA foreign_keys=ON;"
        } else {
            "PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;"
        };
        conn.execute_batch(pragmas).map_err(|e| {
            TablewrightError::ConnectionError(format!("Failed to set pragmas: {e}"))
        })?;

        Ok(Self {
            path,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Opens an in-memory database (convenience constructor).
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created.
    pub fn memory() -> TablewrightResult<Self> {
        Self::open(":memory:")
    }

    /// Opens the database named by `settings`: the URL with any `sqlite://`
    /// prefix stripped, else the name, else an in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn from_settings(settings: &DatabaseSettings) -> TablewrightResult<Self> {
        let target = settings
            .url
            .as_deref()
            .map(|url| {
                url.strip_prefix("sqlite://")
                    .or_else(|| url.strip_prefix("sqlite:"))
                    .unwrap_or(url)
            })
            .filter(|path| !path.is_empty())
            .or_else(|| Some(settings.name.as_str()).filter(|name| !name.is_empty()))
            .unwrap_or(":memory:");
        Self::open(target)
    }

    /// Returns the database file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn bind_params(
        stmt: &mut rusqlite::Statement<'_>,
        params: &[Value],
    ) -> TablewrightResult<()> {
        for (i, param) in params.iter().enumerate() {
            let idx = i + 1;
            match param {
                Value::Null => stmt.raw_bind_parameter(idx, rusqlite::types::Null),
                Value::Bool(b) => stmt.raw_bind_parameter(idx, b),
                Value::Int(v) => stmt.raw_bind_parameter(idx, v),
                Value::Float(v) => stmt.raw_bind_parameter(idx, v),
                Value::String(s) => stmt.raw_bind_parameter(idx, s.as_str()),
                Value::DateTime(dt) => stmt.raw_bind_parameter(
                    idx,
                    dt.format("%Y-%m-%d %H:%M:%S%.f").to_string().as_str(),
                ),
            }
            .map_err(|e| TablewrightError::DatabaseError(format!("Bind error: {e}")))?;
        }
        Ok(())
    }

    fn convert_row(sqlite_row: &rusqlite::Row<'_>, column_names: &[String]) -> Row {
        use rusqlite::types::ValueRef;

        let values: Vec<Value> = (0..column_names.len())
            .map(|i| match sqlite_row.get_ref(i).unwrap_or(ValueRef::Null) {
                ValueRef::Null => Value::Null,
                ValueRef::Integer(v) => Value::Int(v),
                ValueRef::Real(v) => Value::Float(v),
                ValueRef::Text(b) | ValueRef::Blob(b) => {
                    Value::String(String::from_utf8_lossy(b).to_string())
                }
            })
            .collect();

        Row::new(column_names.to_vec(), values)
    }

    fn run_batch(conn: &rusqlite::Connection, statements: &[String]) -> TablewrightResult<()> {
        conn.execute_batch("BEGIN")
            .map_err(|e| TablewrightError::DatabaseError(format!("BEGIN failed: {e}")))?;
        for sql in statements {
            if let Err(e) = conn.execute_batch(sql) {
                if let Err(rollback) = conn.execute_batch("ROLLBACK") {
                    tracing::warn!(error = %rollback, "ROLLBACK failed after rejected statement");
                }
                return Err(rejected(sql, e));
            }
        }
        conn.execute_batch("COMMIT")
            .map_err(|e| TablewrightError::DatabaseError(format!("COMMIT failed: {e}")))
    }
}

#[async_trait::async_trait]
impl DatabaseBackend for SqliteBackend {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> TablewrightResult<u64> {
        let conn = self.conn.clone();
        let sql = sql.to_string();
        let params = params.to_vec();

        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| TablewrightError::DatabaseError(format!("{e}")))?;
            Self::bind_params(&mut stmt, &params)?;
            let count = stmt
                .raw_execute()
                .map_err(|e| TablewrightError::DatabaseError(format!("{e}")))?;
            Ok(count as u64)
        })
        .await
        .map_err(|e| TablewrightError::DatabaseError(format!("Task join error: {e}")))?
    }

    async fn query(&self, sql: &str, params: &[Value]) -> TablewrightResult<Vec<Row>> {
        let conn = self.conn.clone();
        let sql = sql.to_string();
        let params = params.to_vec();

        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| TablewrightError::DatabaseError(format!("{e}")))?;

            let column_names: Vec<String> = stmt
                .column_names()
                .into_iter()
                .map(String::from)
                .collect();

            Self::bind_params(&mut stmt, &params)?;

            let mut raw_rows = stmt.raw_query();
            let mut rows = Vec::new();
            while let Some(row) = raw_rows
                .next()
                .map_err(|e| TablewrightError::DatabaseError(format!("{e}")))?
            {
                rows.push(Self::convert_row(row, &column_names));
            }

            Ok(rows)
        })
        .await
        .map_err(|e| TablewrightError::DatabaseError(format!("Task join error: {e}")))?
    }

    async fn execute_batch(&self, statements: &[String]) -> TablewrightResult<()> {
        if statements.is_empty() {
            return Ok(());
        }
        let conn = self.conn.clone();
        let statements = statements.to_vec();

        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            Self::run_batch(&conn, &statements)
        })
        .await
        .map_err(|e| TablewrightError::DatabaseError(format!("Task join error: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sqlite_memory_open() {
        let backend = SqliteBackend::memory().unwrap();
        assert_eq!(backend.vendor(), "sqlite");
        assert_eq!(backend.dialect(), Dialect::Sqlite);
    }

    #[tokio::test]
    async fn test_sqlite_insert_and_query() {
        let backend = SqliteBackend::memory().unwrap();
        backend
            .execute(
                "CREATE TABLE widgets (id INTEGER PRIMARY KEY, label TEXT)",
                &[],
            )
            .await
            .unwrap();
        let inserted = backend
            .execute(
                "INSERT INTO widgets (label) VALUES (?)",
                &[Value::from("sprocket")],
            )
            .await
            .unwrap();
        assert_eq!(inserted, 1);

        let row = backend
            .query_one("SELECT label FROM widgets WHERE id = ?", &[Value::from(1)])
            .await
            .unwrap();
        assert_eq!(row.get::<String>("label").unwrap(), "sprocket");
    }

    #[tokio::test]
    async fn test_query_one_no_rows() {
        let backend = SqliteBackend::memory().unwrap();
        backend
            .execute("CREATE TABLE t (id INTEGER)", &[])
            .await
            .unwrap();
        assert!(backend.query_one("SELECT id FROM t", &[]).await.is_err());
    }

    #[tokio::test]
    async fn test_execute_batch_commits() {
        let backend = SqliteBackend::memory().unwrap();
        backend
            .execute_batch(&[
                "CREATE TABLE t (id INTEGER)".to_string(),
                "ALTER TABLE t ADD COLUMN label TEXT".to_string(),
            ])
            .await
            .unwrap();
        backend
            .execute("INSERT INTO t (id, label) VALUES (1, 'a')", &[])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_execute_batch_rolls_back_on_failure() {
        let backend = SqliteBackend::memory().unwrap();
        let err = backend
            .execute_batch(&[
                "CREATE TABLE t (id INTEGER)".to_string(),
                "ALTER TABLE missing ADD COLUMN x TEXT".to_string(),
            ])
            .await
            .unwrap_err();

        match err {
            TablewrightError::DdlExecutionError { sql, .. } => {
                assert!(sql.contains("missing"));
            }
            other => panic!("unexpected error: {other}"),
        }

        let rows = backend
            .query(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 't'",
                &[],
            )
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_from_settings_strips_url_scheme() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("from_settings.db");
        let settings = DatabaseSettings {
            url: Some(format!("sqlite://{}", path.display())),
            ..DatabaseSettings::default()
        };
        let backend = SqliteBackend::from_settings(&settings).unwrap();
        assert_eq!(backend.path(), path.as_path());
        assert!(path.exists());
    }

    #[test]
    fn test_from_settings_defaults_to_memory() {
        let backend = SqliteBackend::from_settings(&DatabaseSettings::default()).unwrap();
        assert_eq!(backend.path(), Path::new(":memory:"));
    }
}
