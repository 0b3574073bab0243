//! Replay of pending migration files.
//!
//! The [`MigrationRunner`] brings a database up to date with the intent log:
//! it lists every record for its dialect, drops those already in the ledger,
//! and applies the rest in lexical (and therefore chronological) order. The
//! run stops at the first failure; files applied before it stay applied.
//!
//! ```text
//! Idle -> Scanning -> Replaying -> Done
//!                        |
//!                        +-------> Failed
//! ```

use std::fmt;
use std::time::Duration;

use tablewright_core::logging::migration_span;
use tablewright_core::{Settings, TablewrightError, TablewrightResult};
use tablewright_db_backends::{DatabaseBackend, Dialect};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::builder::{builder_for, DdlBuilder};
use crate::ledger::MigrationLedger;
use crate::store::{MigrationFileName, MigrationFileStore};

/// Statement deadline used when none is configured.
pub const DEFAULT_STATEMENT_TIMEOUT: Duration = Duration::from_secs(300);

/// Knobs shared by replays and authoring.
#[derive(Debug, Clone)]
pub struct RunnerOptions {
    /// Upper bound on one DDL execution. `None` waits forever.
    pub statement_timeout: Option<Duration>,
    /// Checked between files and between independent drop statements.
    pub cancel: CancellationToken,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            statement_timeout: Some(DEFAULT_STATEMENT_TIMEOUT),
            cancel: CancellationToken::new(),
        }
    }
}

impl RunnerOptions {
    /// Builds options from settings with a fresh cancellation token.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            statement_timeout: settings.statement_timeout(),
            cancel: CancellationToken::new(),
        }
    }
}

/// Where a run is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Not started.
    Idle,
    /// Reading the ledger and the file list.
    Scanning,
    /// Applying pending files.
    Replaying,
    /// Every pending file was applied.
    Done,
    /// A file failed or the run was cancelled.
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Scanning => "scanning",
            Self::Replaying => "replaying",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// What happened to one pending file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    /// DDL ran and the ledger recorded it.
    Applied,
    /// The file failed; carries the error text.
    Failed(String),
    /// An earlier failure or a cancellation stopped the run first.
    NotAttempted,
}

/// The outcome of one pending file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOutcome {
    /// The migration filename.
    pub filename: String,
    /// What happened.
    pub status: FileStatus,
}

/// The result of a replay.
#[derive(Debug)]
pub struct MigrationSummary {
    /// Final state, `Done` or `Failed`.
    pub state: RunState,
    /// One outcome per pending file, in replay order.
    pub outcomes: Vec<FileOutcome>,
    error: Option<TablewrightError>,
}

impl MigrationSummary {
    fn done(outcomes: Vec<FileOutcome>) -> Self {
        Self {
            state: RunState::Done,
            outcomes,
            error: None,
        }
    }

    /// Filenames applied by this run, in order.
    pub fn applied(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.status == FileStatus::Applied)
            .map(|o| o.filename.as_str())
            .collect()
    }

    /// The file that failed, if any.
    pub fn failure(&self) -> Option<&FileOutcome> {
        self.outcomes
            .iter()
            .find(|o| matches!(o.status, FileStatus::Failed(_)))
    }

    /// The error that stopped the run, if any.
    pub fn error(&self) -> Option<&TablewrightError> {
        self.error.as_ref()
    }

    /// Returns `true` when every pending file was applied.
    pub fn is_success(&self) -> bool {
        self.state == RunState::Done
    }

    /// Turns a failed run into its underlying error.
    ///
    /// # Errors
    ///
    /// Returns the error that stopped the run. It names the failing file.
    pub fn into_result(mut self) -> TablewrightResult<Self> {
        match self.error.take() {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }
}

/// Runs parameterless DDL through the backend as one batch, bounded by
/// `timeout`. Errors carry an empty target for the caller to fill in.
pub(crate) async fn execute_statements(
    backend: &dyn DatabaseBackend,
    statements: &[String],
    timeout: Option<Duration>,
) -> TablewrightResult<()> {
    for sql in statements {
        tracing::debug!(sql = %sql, "executing DDL");
    }
    let batch = backend.execute_batch(statements);
    match timeout {
        Some(after) => tokio::time::timeout(after, batch)
            .await
            .map_err(|_| TablewrightError::Timeout {
                target: String::new(),
                after,
            })?,
        None => batch.await,
    }
}

/// Applies pending migration files for one dialect.
pub struct MigrationRunner {
    store: MigrationFileStore,
    dialect: Dialect,
    ledger: MigrationLedger,
    options: RunnerOptions,
}

impl MigrationRunner {
    /// Creates a runner with default options.
    pub fn new(store: MigrationFileStore, dialect: Dialect) -> Self {
        Self {
            store,
            dialect,
            ledger: MigrationLedger::new(),
            options: RunnerOptions::default(),
        }
    }

    /// Replaces the options.
    pub fn with_options(mut self, options: RunnerOptions) -> Self {
        self.options = options;
        self
    }

    /// Returns the dialect.
    pub const fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Returns the file store.
    pub const fn store(&self) -> &MigrationFileStore {
        &self.store
    }

    /// Returns the options.
    pub const fn options(&self) -> &RunnerOptions {
        &self.options
    }

    fn check_backend(&self, backend: &dyn DatabaseBackend) -> TablewrightResult<()> {
        if backend.dialect() == self.dialect {
            Ok(())
        } else {
            Err(TablewrightError::ConfigurationError(format!(
                "runner targets {} but the backend speaks {}",
                self.dialect,
                backend.dialect()
            )))
        }
    }

    /// Returns the pending filenames in replay order without running them.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger or the migration directory cannot be
    /// read, or the backend speaks another dialect.
    pub async fn plan(&self, backend: &dyn DatabaseBackend) -> TablewrightResult<Vec<String>> {
        self.check_backend(backend)?;
        self.ledger.ensure_ledger_table(backend).await?;

        let mut pending = Vec::new();
        for filename in self.store.list_records(self.dialect)? {
            if !self.ledger.is_applied(backend, &filename).await? {
                pending.push(filename);
            }
        }
        pending.sort();
        Ok(pending)
    }

    /// Renders the DDL a stored record produces for this runner's dialect.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, its name and content
    /// disagree, or the record is not valid for the dialect.
    pub fn sql_for(&self, filename: &str) -> TablewrightResult<Vec<String>> {
        self.statements_for(builder_for(self.dialect).as_ref(), filename)
    }

    fn statements_for(
        &self,
        builder: &dyn DdlBuilder,
        filename: &str,
    ) -> TablewrightResult<Vec<String>> {
        let parse_error = |message: String| TablewrightError::ParseError {
            filename: filename.to_string(),
            message,
        };
        let name = MigrationFileName::parse(filename).ok_or_else(|| {
            parse_error("expected <stamp>-<create|alter|delete>_table_<table>.json".to_string())
        })?;
        let record = self.store.read_record(self.dialect, filename)?;
        if let Some(kind) = record.kind {
            if kind != name.kind {
                return Err(parse_error(format!(
                    "filename says {} but the record says {kind}",
                    name.kind
                )));
            }
        }
        if record.table != name.table {
            return Err(parse_error(format!(
                "filename names table '{}' but the record names '{}'",
                name.table, record.table
            )));
        }
        builder.build_record(name.kind, &record)
    }

    async fn apply_file(
        &self,
        backend: &dyn DatabaseBackend,
        builder: &dyn DdlBuilder,
        filename: &str,
    ) -> TablewrightResult<()> {
        let statements = self.statements_for(builder, filename)?;
        execute_statements(backend, &statements, self.options.statement_timeout)
            .await
            .map_err(|e| e.with_target(filename))?;
        self.ledger.record_applied(backend, filename).await?;
        tracing::info!(statements = statements.len(), "applied migration");
        Ok(())
    }

    /// Applies every pending file in order, stopping at the first failure.
    ///
    /// Failures while replaying are reported in the returned summary, not as
    /// `Err`; use [`MigrationSummary::into_result`] to turn them into one.
    ///
    /// # Errors
    ///
    /// Returns an error only if scanning fails: the ledger cannot be created
    /// or the directory cannot be listed.
    pub async fn run(&self, backend: &dyn DatabaseBackend) -> TablewrightResult<MigrationSummary> {
        let mut state = RunState::Idle;
        tracing::debug!(dialect = %self.dialect, %state, "starting replay");

        state = RunState::Scanning;
        tracing::debug!(dialect = %self.dialect, %state, "scanning migrations");
        let pending = self.plan(backend).await?;
        if pending.is_empty() {
            tracing::info!(dialect = %self.dialect, "no pending migrations");
            return Ok(MigrationSummary::done(Vec::new()));
        }

        state = RunState::Replaying;
        tracing::info!(dialect = %self.dialect, %state, pending = pending.len(), "replaying migrations");

        let builder = builder_for(self.dialect);
        let mut outcomes: Vec<FileOutcome> = pending
            .iter()
            .map(|filename| FileOutcome {
                filename: filename.clone(),
                status: FileStatus::NotAttempted,
            })
            .collect();

        for (idx, filename) in pending.iter().enumerate() {
            if self.options.cancel.is_cancelled() {
                tracing::warn!(file = %filename, "replay cancelled");
                return Ok(MigrationSummary {
                    state: RunState::Failed,
                    outcomes,
                    error: Some(TablewrightError::Cancelled(filename.clone())),
                });
            }

            let span = migration_span(self.dialect.as_str(), filename);
            match self
                .apply_file(backend, builder.as_ref(), filename)
                .instrument(span)
                .await
            {
                Ok(()) => outcomes[idx].status = FileStatus::Applied,
                Err(err) => {
                    tracing::error!(file = %filename, error = %err, "migration failed; stopping replay");
                    outcomes[idx].status = FileStatus::Failed(err.to_string());
                    return Ok(MigrationSummary {
                        state: RunState::Failed,
                        outcomes,
                        error: Some(err),
                    });
                }
            }
        }

        tracing::info!(dialect = %self.dialect, applied = outcomes.len(), "replay done");
        Ok(MigrationSummary::done(outcomes))
    }
}
