//! Base database backend trait and common types.
//!
//! This module defines the [`Dialect`] enum naming the supported SQL
//! dialects, the [`DatabaseBackend`] trait every driver implements, and the
//! [`connect`] factory that builds a backend from [`Settings`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tablewright_core::{Settings, TablewrightError, TablewrightResult};

use crate::value::{Row, Value};

/// A supported SQL dialect.
///
/// # Examples
///
/// ```
/// use tablewright_db_backends::Dialect;
///
/// let dialect: Dialect = "postgresql".parse().unwrap();
/// assert_eq!(dialect, Dialect::Postgres);
/// assert_eq!(dialect.as_str(), "postgres");
/// assert_eq!(dialect.placeholder(2), "$2");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// PostgreSQL.
    Postgres,
    /// MySQL / MariaDB.
    MySql,
    /// SQLite.
    Sqlite,
}

impl Dialect {
    /// Every dialect, in a stable order.
    pub const ALL: [Self; 3] = [Self::Postgres, Self::MySql, Self::Sqlite];

    /// Returns the canonical lowercase name, also used as the migration
    /// store subdirectory.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::MySql => "mysql",
            Self::Sqlite => "sqlite",
        }
    }

    /// Returns the bind-parameter placeholder for the 1-based position `index`.
    pub fn placeholder(self, index: usize) -> String {
        match self {
            Self::Postgres => format!("${index}"),
            Self::MySql | Self::Sqlite => "?".to_string(),
        }
    }

    /// Returns `true` when DDL statements can be rolled back as part of a
    /// transaction.
    pub const fn supports_transactional_ddl(self) -> bool {
        matches!(self, Self::Postgres | Self::Sqlite)
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dialect {
    type Err = TablewrightError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            "mysql" | "mariadb" => Ok(Self::MySql),
            "sqlite" | "sqlite3" => Ok(Self::Sqlite),
            other => Err(TablewrightError::ConfigurationError(format!(
                "Unknown dialect '{other}' (expected postgres, mysql, or sqlite)"
            ))),
        }
    }
}

/// The core trait for database backends.
///
/// Each database engine (PostgreSQL, SQLite, MySQL) implements this trait to
/// provide a uniform interface for executing DDL and reading the ledger.
///
/// All methods are async because database operations are inherently I/O-bound.
/// Backends built on synchronous drivers (like `rusqlite`) wrap operations in
/// `spawn_blocking` to maintain the async interface.
#[async_trait::async_trait]
pub trait DatabaseBackend: Send + Sync {
    /// Returns the dialect this backend speaks.
    fn dialect(&self) -> Dialect;

    /// Returns the vendor name (e.g., "postgres", "sqlite", "mysql").
    fn vendor(&self) -> &str {
        self.dialect().as_str()
    }

    /// Executes a SQL statement that does not return rows.
    ///
    /// Returns the number of rows affected.
    async fn execute(&self, sql: &str, params: &[Value]) -> TablewrightResult<u64>;

    /// Executes a SQL query and returns all result rows.
    async fn query(&self, sql: &str, params: &[Value]) -> TablewrightResult<Vec<Row>>;

    /// Executes a SQL query and returns exactly one row.
    async fn query_one(&self, sql: &str, params: &[Value]) -> TablewrightResult<Row> {
        let rows = self.query(sql, params).await?;
        let count = rows.len();
        let mut rows = rows.into_iter();
        match (rows.next(), count) {
            (Some(row), 1) => Ok(row),
            (None, _) => Err(TablewrightError::DatabaseError(
                "No rows returned".to_string(),
            )),
            _ => Err(TablewrightError::DatabaseError(format!(
                "Expected 1 row, got {count}"
            ))),
        }
    }

    /// Executes parameterless DDL statements in order as one unit.
    ///
    /// On dialects with transactional DDL the statements share a single
    /// transaction and a failure leaves no partial change behind. Elsewhere
    /// they run one by one and earlier statements stay applied.
    ///
    /// A rejected statement is reported as
    /// [`TablewrightError::DdlExecutionError`] carrying the statement text
    /// and an empty target.
    async fn execute_batch(&self, statements: &[String]) -> TablewrightResult<()>;
}

/// Builds a [`DdlExecutionError`](TablewrightError::DdlExecutionError) for a
/// rejected statement. The caller attaches the target.
#[cfg_attr(
    not(any(feature = "postgres", feature = "mysql", feature = "sqlite")),
    allow(dead_code)
)]
pub(crate) fn rejected(sql: &str, err: impl fmt::Display) -> TablewrightError {
    TablewrightError::DdlExecutionError {
        target: String::new(),
        sql: sql.to_string(),
        message: err.to_string(),
    }
}

/// Creates the backend selected by `settings.dialect`.
///
/// Backends compiled out by cargo features produce a configuration error
/// naming the missing feature.
///
/// # Errors
///
/// Returns an error if the dialect is unknown, its feature is disabled, or
/// the connection settings are invalid. Pools connect lazily, so an
/// unreachable server surfaces on first use.
pub fn connect(settings: &Settings) -> TablewrightResult<Box<dyn DatabaseBackend>> {
    let dialect: Dialect = settings.dialect.parse()?;
    tracing::debug!(dialect = %dialect, "creating database backend");
    match dialect {
        #[cfg(feature = "postgres")]
        Dialect::Postgres => Ok(Box::new(
            crate::postgresql::PostgresBackend::from_settings(&settings.database)?,
        )),
        #[cfg(feature = "mysql")]
        Dialect::MySql => Ok(Box::new(crate::mysql::MySqlBackend::from_settings(
            &settings.database,
        )?)),
        #[cfg(feature = "sqlite")]
        Dialect::Sqlite => Ok(Box::new(crate::sqlite::SqliteBackend::from_settings(
            &settings.database,
        )?)),
        #[allow(unreachable_patterns)]
        other => Err(TablewrightError::ConfigurationError(format!(
            "tablewright was built without the `{other}` feature"
        ))),
    }
}
