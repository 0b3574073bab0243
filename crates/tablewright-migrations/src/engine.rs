//! The authoring facade.
//!
//! [`SchemaEngine`] is what the request layer talks to. Every authoring call
//! follows the same write-ahead order:
//!
//! 1. validate the request and build its DDL (no I/O);
//! 2. write the intent file;
//! 3. execute the DDL;
//! 4. record the file in the ledger.
//!
//! A crash after step 2 leaves an unrecorded intent that the next
//! [`migrate`](SchemaEngine::migrate) replays. If the database rejects the
//! DDL in step 3 the intent is renamed to `.rejected` so it cannot poison
//! later replays.

use tablewright_core::logging::migration_span;
use tablewright_core::{Settings, TablewrightError, TablewrightResult};
use tablewright_db_backends::{DatabaseBackend, Dialect};
use tokio::sync::Mutex;
use tracing::Instrument;

use crate::builder::{builder_for, DdlBuilder};
use crate::definition::{
    AlterOperation, ClauseKind, ColumnPayload, MigrationKind, MigrationRecord, TableDefinition,
};
use crate::ledger::{MigrationLedger, MigrationLedgerEntry};
use crate::lock::MigrationLock;
use crate::runner::{execute_statements, MigrationRunner, MigrationSummary, RunnerOptions};
use crate::store::MigrationFileStore;

/// The outcome of dropping one table.
#[derive(Debug)]
pub struct DropOutcome {
    /// The table.
    pub table: String,
    /// The migration filename, or why the drop failed.
    pub result: TablewrightResult<String>,
}

impl DropOutcome {
    /// Returns `true` if the table was dropped and recorded.
    pub const fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// Returns the migration filename on success.
    pub fn filename(&self) -> Option<&str> {
        self.result.as_deref().ok()
    }
}

/// Authors and replays migrations for one dialect.
///
/// # Examples
///
/// ```no_run
/// use tablewright_db_backends::{DatabaseBackend, Dialect};
/// use tablewright_migrations::definition::{ColumnSpec, TableDefinition};
/// use tablewright_migrations::{MigrationFileStore, RunnerOptions, SchemaEngine};
///
/// # async fn example(backend: &dyn DatabaseBackend) -> tablewright_core::TablewrightResult<()> {
/// let engine = SchemaEngine::new(
///     MigrationFileStore::new("migrations"),
///     Dialect::Postgres,
///     RunnerOptions::default(),
/// );
/// let widgets = TableDefinition::new("widgets")
///     .column(ColumnSpec::new("id", "INTEGER").primary().auto_increment())
///     .column(ColumnSpec::new("label", "VARCHAR(100)").not_null());
/// let filename = engine.create(backend, &widgets).await?;
/// println!("wrote {filename}");
/// # Ok(())
/// # }
/// ```
pub struct SchemaEngine {
    runner: MigrationRunner,
    ledger: MigrationLedger,
    serial: Mutex<()>,
}

impl SchemaEngine {
    /// Creates an engine.
    pub fn new(store: MigrationFileStore, dialect: Dialect, options: RunnerOptions) -> Self {
        Self {
            runner: MigrationRunner::new(store, dialect).with_options(options),
            ledger: MigrationLedger::new(),
            serial: Mutex::new(()),
        }
    }

    /// Creates an engine from settings.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an unknown dialect.
    pub fn from_settings(settings: &Settings) -> TablewrightResult<Self> {
        let dialect: Dialect = settings.dialect.parse()?;
        Ok(Self::new(
            MigrationFileStore::new(&settings.migrations_root),
            dialect,
            RunnerOptions::from_settings(settings),
        ))
    }

    /// Returns the dialect.
    pub const fn dialect(&self) -> Dialect {
        self.runner.dialect()
    }

    /// Returns the file store.
    pub const fn store(&self) -> &MigrationFileStore {
        self.runner.store()
    }

    /// Returns the runner used by [`migrate`](Self::migrate).
    pub const fn runner(&self) -> &MigrationRunner {
        &self.runner
    }

    fn builder(&self, backend: &dyn DatabaseBackend) -> TablewrightResult<Box<dyn DdlBuilder>> {
        if backend.dialect() != self.dialect() {
            return Err(TablewrightError::ConfigurationError(format!(
                "engine targets {} but the backend speaks {}",
                self.dialect(),
                backend.dialect()
            )));
        }
        Ok(builder_for(self.dialect()))
    }

    /// Creates a table and returns the migration filename.
    ///
    /// Creating an existing table succeeds (`IF NOT EXISTS`) and still
    /// writes and records a new file.
    ///
    /// # Errors
    ///
    /// Returns a validation error before any I/O, an I/O error if the intent
    /// cannot be written, [`TablewrightError::DdlExecutionError`] if the
    /// database rejects the DDL, or [`TablewrightError::LedgerError`] if it
    /// ran but could not be recorded.
    pub async fn create(
        &self,
        backend: &dyn DatabaseBackend,
        definition: &TableDefinition,
    ) -> TablewrightResult<String> {
        let statements = self.builder(backend)?.build_create(definition)?;
        let record = MigrationRecord::create(definition);
        self.author(backend, MigrationKind::Create, &definition.table, &record, &statements)
            .await
    }

    /// Alters a table from request payloads.
    ///
    /// `columns` are interpreted according to `clause`; see
    /// [`AlterOperation::from_payload`].
    ///
    /// # Errors
    ///
    /// As [`create`](Self::create), plus
    /// [`TablewrightError::UnsupportedOperation`] for `alter_column` on SQLite.
    pub async fn alter(
        &self,
        backend: &dyn DatabaseBackend,
        table_name: &str,
        clause: ClauseKind,
        columns: &[ColumnPayload],
    ) -> TablewrightResult<String> {
        let operation = AlterOperation::from_payload(table_name, clause, columns)?;
        self.alter_operation(backend, &operation).await
    }

    /// Alters a table from a typed operation.
    ///
    /// # Errors
    ///
    /// As [`alter`](Self::alter).
    pub async fn alter_operation(
        &self,
        backend: &dyn DatabaseBackend,
        operation: &AlterOperation,
    ) -> TablewrightResult<String> {
        let statements = self.builder(backend)?.build_alter(operation)?;
        let record = MigrationRecord::alter(operation);
        self.author(backend, MigrationKind::Alter, &operation.table, &record, &statements)
            .await
    }

    /// Drops tables, one record and one independent statement per table.
    ///
    /// A failure on one table does not stop the others. Cancellation is
    /// checked before each table; tables not reached report
    /// [`TablewrightError::Cancelled`].
    ///
    /// # Errors
    ///
    /// Returns a validation error, before any I/O, if any name is invalid.
    pub async fn drop(
        &self,
        backend: &dyn DatabaseBackend,
        tables: &[String],
    ) -> TablewrightResult<Vec<DropOutcome>> {
        let statements = self.builder(backend)?.build_drop(tables)?;
        let cancel = &self.runner.options().cancel;

        let mut outcomes = Vec::with_capacity(tables.len());
        for (table, sql) in tables.iter().zip(statements) {
            let result = if cancel.is_cancelled() {
                Err(TablewrightError::Cancelled(table.clone()))
            } else {
                let record = MigrationRecord::delete(table);
                self.author(backend, MigrationKind::Delete, table, &record, &[sql])
                    .await
            };
            if let Err(e) = &result {
                tracing::warn!(table = %table, error = %e, "drop failed");
            }
            outcomes.push(DropOutcome {
                table: table.clone(),
                result,
            });
        }
        Ok(outcomes)
    }

    /// Replays every pending migration under the replay lock.
    ///
    /// # Errors
    ///
    /// Returns [`TablewrightError::MigrationLocked`] if another process is
    /// replaying, or a scanning error. Per-file failures are reported in the
    /// summary.
    pub async fn migrate(&self, backend: &dyn DatabaseBackend) -> TablewrightResult<MigrationSummary> {
        let _serial = self.serial.lock().await;
        let _lock = MigrationLock::acquire(self.store(), self.dialect())?;
        self.runner.run(backend).await
    }

    /// Returns the pending filenames in replay order.
    ///
    /// # Errors
    ///
    /// See [`MigrationRunner::plan`].
    pub async fn pending(&self, backend: &dyn DatabaseBackend) -> TablewrightResult<Vec<String>> {
        self.runner.plan(backend).await
    }

    /// Returns the ledger rows.
    ///
    /// # Errors
    ///
    /// See [`MigrationLedger::applied`].
    pub async fn applied(
        &self,
        backend: &dyn DatabaseBackend,
    ) -> TablewrightResult<Vec<MigrationLedgerEntry>> {
        self.ledger.applied(backend).await
    }

    async fn author(
        &self,
        backend: &dyn DatabaseBackend,
        kind: MigrationKind,
        table: &str,
        record: &MigrationRecord,
        statements: &[String],
    ) -> TablewrightResult<String> {
        // Both replay locks are held from the intent write to the ledger
        // record, so no migrate() in this or another process can apply the
        // intent in between.
        let _serial = self.serial.lock().await;
        let dialect = self.dialect();
        let _lock = MigrationLock::acquire(self.store(), dialect)?;
        self.ledger.ensure_ledger_table(backend).await?;
        let filename = self.store().write_record(dialect, kind, table, record)?;

        self.apply_intent(backend, &filename, statements)
            .instrument(migration_span(dialect.as_str(), &filename))
            .await?;
        tracing::info!(file = %filename, kind = %kind, table = %table, "authored migration");
        Ok(filename)
    }

    async fn apply_intent(
        &self,
        backend: &dyn DatabaseBackend,
        filename: &str,
        statements: &[String],
    ) -> TablewrightResult<()> {
        let timeout = self.runner.options().statement_timeout;
        if let Err(err) = execute_statements(backend, statements, timeout).await {
            let err = err.with_target(filename);
            if matches!(err, TablewrightError::DdlExecutionError { .. }) {
                self.store().mark_rejected(self.dialect(), filename)?;
            }
            tracing::error!(error = %err, "DDL failed");
            return Err(err);
        }
        self.ledger.record_applied(backend, filename).await
    }
}

#[cfg(test)]
mod tests {
    use tablewright_db_backends::sqlite::SqliteBackend;

    use super::*;
    use crate::definition::ColumnSpec;

    fn engine(dir: &tempfile::TempDir) -> SchemaEngine {
        SchemaEngine::new(
            MigrationFileStore::new(dir.path()),
            Dialect::Sqlite,
            RunnerOptions::default(),
        )
    }

    fn widgets() -> TableDefinition {
        TableDefinition::new("widgets")
            .column(ColumnSpec::new("id", "INTEGER").primary().auto_increment())
            .column(ColumnSpec::new("label", "VARCHAR(100)").not_null())
    }

    #[tokio::test]
    async fn test_create_writes_executes_records() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(&dir);
        let backend = SqliteBackend::memory().unwrap();

        let filename = engine.create(&backend, &widgets()).await.unwrap();
        assert!(filename.ends_with("-create_table_widgets.json"));
        assert_eq!(
            engine.store().list_records(Dialect::Sqlite).unwrap(),
            vec![filename.clone()]
        );
        let applied = engine.applied(&backend).await.unwrap();
        assert_eq!(applied.len(), 1);
        assert_eq!(applied[0].name, filename);
        assert!(engine.pending(&backend).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_definition_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(&dir);
        let backend = SqliteBackend::memory().unwrap();

        let bad = TableDefinition::new("widgets").column(ColumnSpec::new("id", "NOT A TYPE;"));
        let err = engine.create(&backend, &bad).await.unwrap_err();
        assert!(matches!(err, TablewrightError::ValidationError(_)));
        assert!(!engine.store().directory(Dialect::Sqlite).exists());
    }

    #[tokio::test]
    async fn test_rejected_ddl_marks_intent() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(&dir);
        let backend = SqliteBackend::memory().unwrap();

        let err = engine
            .alter(&backend, "ghost", ClauseKind::Drop, &[ColumnPayload::named("x")])
            .await
            .unwrap_err();
        let target = err.target().unwrap().to_string();
        assert!(matches!(err, TablewrightError::DdlExecutionError { .. }));
        assert!(target.ends_with("-alter_table_ghost.json"));

        assert!(engine.store().list_records(Dialect::Sqlite).unwrap().is_empty());
        assert!(engine
            .store()
            .directory(Dialect::Sqlite)
            .join(format!("{target}.rejected"))
            .exists());
        assert!(engine.applied(&backend).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_drop_is_independent_per_table() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(&dir);
        let backend = SqliteBackend::memory().unwrap();
        engine.create(&backend, &widgets()).await.unwrap();

        let outcomes = engine
            .drop(&backend, &["widgets".to_string(), "never_existed".to_string()])
            .await
            .unwrap();
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(DropOutcome::is_success));
        assert!(outcomes[1].filename().unwrap().ends_with("-delete_table_never_existed.json"));
        assert_eq!(engine.applied(&backend).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_drop_honours_cancellation() {
        let dir = tempfile::tempdir().unwrap();
        let options = RunnerOptions::default();
        let engine = SchemaEngine::new(
            MigrationFileStore::new(dir.path()),
            Dialect::Sqlite,
            options.clone(),
        );
        let backend = SqliteBackend::memory().unwrap();
        options.cancel.cancel();

        let outcomes = engine.drop(&backend, &["a".to_string()]).await.unwrap();
        assert!(matches!(outcomes[0].result, Err(TablewrightError::Cancelled(_))));
        assert!(engine.store().list_records(Dialect::Sqlite).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_drop_rejects_bad_names_up_front() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(&dir);
        let backend = SqliteBackend::memory().unwrap();
        let err = engine
            .drop(&backend, &["fine".to_string(), "not fine".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, TablewrightError::ValidationError(_)));
        assert!(engine.store().list_records(Dialect::Sqlite).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_migrate_replays_unrecorded_intent() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(&dir);
        let authored_on = SqliteBackend::memory().unwrap();
        let filename = engine.create(&authored_on, &widgets()).await.unwrap();

        // A fresh database has none of the authored schema.
        let fresh = SqliteBackend::memory().unwrap();
        let summary = engine.migrate(&fresh).await.unwrap();
        assert_eq!(summary.applied(), vec![filename.as_str()]);
    }

    #[tokio::test]
    async fn test_authoring_refuses_held_lock() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(&dir);
        let backend = SqliteBackend::memory().unwrap();

        let held = MigrationLock::acquire(engine.store(), Dialect::Sqlite).unwrap();
        let err = engine.create(&backend, &widgets()).await.unwrap_err();
        assert!(matches!(err, TablewrightError::MigrationLocked(_)));
        let outcomes = engine.drop(&backend, &["widgets".to_string()]).await.unwrap();
        assert!(matches!(
            outcomes[0].result,
            Err(TablewrightError::MigrationLocked(_))
        ));
        assert!(engine.store().list_records(Dialect::Sqlite).unwrap().is_empty());

        drop(held);
        engine.create(&backend, &widgets()).await.unwrap();
        // The authoring lock is released once the change is recorded.
        assert!(!engine
            .store()
            .directory(Dialect::Sqlite)
            .join(crate::lock::LOCK_FILE_NAME)
            .exists());
    }

    #[tokio::test]
    async fn test_wrong_dialect_backend_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let engine = SchemaEngine::new(
            MigrationFileStore::new(dir.path()),
            Dialect::MySql,
            RunnerOptions::default(),
        );
        let backend = SqliteBackend::memory().unwrap();
        let err = engine.create(&backend, &widgets()).await.unwrap_err();
        assert!(matches!(err, TablewrightError::ConfigurationError(_)));
    }

    #[test]
    fn test_from_settings() {
        let settings = Settings {
            dialect: "sqlite".into(),
            migrations_root: "db/migrations".into(),
            statement_timeout_secs: 5,
            ..Settings::default()
        };
        let engine = SchemaEngine::from_settings(&settings).unwrap();
        assert_eq!(engine.dialect(), Dialect::Sqlite);
        assert_eq!(engine.store().root(), std::path::Path::new("db/migrations"));
        assert_eq!(
            engine.runner().options().statement_timeout,
            Some(std::time::Duration::from_secs(5))
        );
    }
}
