//! # tablewright
//!
//! Declarative schema migrations. Table definitions go in as JSON, come out
//! as dialect-specific DDL, and every change is written to an append-only
//! file log before it runs, so any database can be rebuilt by replaying the
//! log with `migrate`.
//!
//! This is the meta-crate that re-exports the sub-crates. Enable the
//! `postgres`, `mysql`, or `sqlite` feature for the backends you need.
//!
//! ```rust,no_run
//! use tablewright::core::Settings;
//! use tablewright::db_backends::connect;
//! use tablewright::migrations::{ColumnSpec, SchemaEngine, TableDefinition};
//!
//! # async fn demo() -> tablewright::core::TablewrightResult<()> {
//! let settings = Settings::default();
//! let backend = connect(&settings)?;
//! let engine = SchemaEngine::from_settings(&settings)?;
//!
//! let widgets = TableDefinition::new("widgets")
//!     .column(ColumnSpec::new("id", "INTEGER").primary().auto_increment())
//!     .column(ColumnSpec::new("label", "VARCHAR(100)").not_null());
//! engine.create(backend.as_ref(), &widgets).await?;
//! # Ok(())
//! # }
//! ```

/// Error types, settings, and logging.
pub use tablewright_core as core;

/// Database backends: `PostgreSQL`, `MySQL`, `SQLite`.
pub use tablewright_db_backends as db_backends;

/// DDL builders, migration file store, ledger, and replay runner.
pub use tablewright_migrations as migrations;

/// Management commands (CLI).
#[cfg(feature = "cli")]
pub use tablewright_cli as cli;

pub use tablewright_core::{Settings, TablewrightError, TablewrightResult};
pub use tablewright_migrations::{SchemaEngine, TableDefinition};
