//! # tablewright-db-backends
//!
//! Database backends for tablewright. Each backend executes DDL batches and
//! the small bookkeeping queries the migration ledger needs.
//!
//! Supported backends, each behind a cargo feature of the same name:
//! - `PostgreSQL` (`postgres`)
//! - `MySQL` (`mysql`)
//! - `SQLite` (`sqlite`)

pub mod base;
pub mod value;

#[cfg(feature = "mysql")]
pub mod mysql;
#[cfg(feature = "postgres")]
pub mod postgresql;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use base::{connect, DatabaseBackend, Dialect};
pub use value::{FromValue, Row, Value};

#[cfg(feature = "mysql")]
pub use mysql::MySqlBackend;
#[cfg(feature = "postgres")]
pub use postgresql::PostgresBackend;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteBackend;
