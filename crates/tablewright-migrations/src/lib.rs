//! # tablewright-migrations
//!
//! Migration engine for tablewright. Turns table definitions into
//! dialect-specific DDL, keeps a file-based intent log of every schema
//! change, and replays pending changes against a database.
//!
//! ## Architecture
//!
//! - [`TableDefinition`] and [`AlterOperation`] describe a requested change.
//! - [`DdlBuilder`] translates them into PostgreSQL, MySQL, or SQLite DDL.
//! - [`MigrationFileStore`] writes one immutable JSON record per change.
//! - [`MigrationLedger`] tracks applied files in the `migrations` table.
//! - [`MigrationRunner`] replays pending files in chronological order.
//! - [`SchemaEngine`] ties these together for authoring and `migrate`.
//!
//! ## Module Overview
//!
//! - [`definition`] - Definitions, alter operations, on-disk records
//! - [`identifier`] - Identifier validation and quoting, type grammar
//! - [`builder`] - `DdlBuilder` trait and the three dialect builders
//! - [`store`] - `MigrationFileStore`, filename scheme
//! - [`ledger`] - `MigrationLedger`
//! - [`runner`] - `MigrationRunner`, `MigrationSummary`
//! - [`lock`] - Cross-process replay lock
//! - [`engine`] - `SchemaEngine`

// Clippy overrides appropriate for a DDL generation / migration crate.
#![allow(clippy::too_many_lines)]
#![allow(clippy::result_large_err)]
#![allow(clippy::format_push_string)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::use_self)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::unnecessary_literal_bound)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::missing_errors_doc)]

pub mod builder;
pub mod definition;
pub mod engine;
pub mod identifier;
pub mod ledger;
pub mod lock;
pub mod runner;
pub mod store;

// Re-export key types at the crate root.
pub use builder::{builder_for, DdlBuilder, MySqlDdlBuilder, PostgresDdlBuilder, SqliteDdlBuilder};
pub use definition::{
    AlterClause, AlterOperation, ClauseKind, ColumnChange, ColumnPayload, ColumnRename,
    ColumnSpec, DefaultChange, DefaultValue, MigrationKind, MigrationRecord, TableDefinition,
};
pub use engine::{DropOutcome, SchemaEngine};
pub use ledger::{MigrationLedger, MigrationLedgerEntry};
pub use lock::MigrationLock;
pub use runner::{FileOutcome, FileStatus, MigrationRunner, MigrationSummary, RunState, RunnerOptions};
pub use store::{MigrationFileName, MigrationFileStore};
