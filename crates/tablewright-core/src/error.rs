//! Error types for tablewright.
//!
//! [`TablewrightError`] covers every failure the migration engine can surface:
//! definition validation, file store I/O, corrupt migration records, database
//! connectivity, rejected DDL, and ledger bookkeeping. Variants raised while
//! handling a particular migration carry the offending filename or table so
//! operators can act on an error without further correlation.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// A definition failed validation before any I/O took place.
///
/// # Examples
///
/// ```
/// use tablewright_core::error::ValidationError;
///
/// let err = ValidationError::new("column name is required", "required")
///     .with_table("widgets");
/// assert_eq!(err.to_string(), "widgets: column name is required");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The human readable message.
    pub message: String,
    /// A short machine readable code (e.g. "required", "invalid_identifier").
    pub code: String,
    /// The table the definition targeted, if known.
    pub table: Option<String>,
    /// The column at fault, if any.
    pub column: Option<String>,
}

impl ValidationError {
    /// Creates a new `ValidationError` with a message and code.
    pub fn new(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: code.into(),
            table: None,
            column: None,
        }
    }

    /// Attaches the table name.
    #[must_use]
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Attaches the column name.
    #[must_use]
    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.table, &self.column) {
            (Some(table), Some(column)) => write!(f, "{table}.{column}: {}", self.message),
            (Some(table), None) => write!(f, "{table}: {}", self.message),
            (None, Some(column)) => write!(f, "{column}: {}", self.message),
            (None, None) => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ValidationError {}

/// The primary error type for tablewright.
#[derive(Error, Debug)]
pub enum TablewrightError {
    // ── Definitions ──────────────────────────────────────────────────

    /// A table or column definition is malformed.
    #[error("Validation error: {0}")]
    ValidationError(ValidationError),

    /// The request names an operation the engine or dialect cannot perform.
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    // ── File store ───────────────────────────────────────────────────

    /// A migration directory or file could not be created, read, or written.
    #[error("IO error at '{}': {source}", path.display())]
    IoError {
        /// The path being accessed.
        path: PathBuf,
        /// The underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// A migration record is not valid JSON or has an unexpected shape.
    #[error("Parse error in '{filename}': {message}")]
    ParseError {
        /// The migration filename.
        filename: String,
        /// What went wrong.
        message: String,
    },

    // ── Database ─────────────────────────────────────────────────────

    /// The database could not be reached or a pooled connection was refused.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The database rejected a DDL statement.
    #[error("DDL execution failed for '{target}': {message} (statement: {sql})")]
    DdlExecutionError {
        /// The migration filename or table the statement belonged to.
        target: String,
        /// The rejected statement.
        sql: String,
        /// The driver's error message.
        message: String,
    },

    /// A non-DDL query failed.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// A connection or database failure while applying a migration, such
    /// as a refused pool checkout or a failed `COMMIT`.
    #[error("Failed while applying '{target}': {source}")]
    Applying {
        /// The migration filename or table being applied.
        target: String,
        /// The connection or database error.
        #[source]
        source: Box<TablewrightError>,
    },

    /// The DDL ran but recording it in the ledger failed.
    ///
    /// The migration will be attempted again on the next replay.
    #[error("Ledger error for '{filename}': {message}")]
    LedgerError {
        /// The migration filename that is applied but unrecorded.
        filename: String,
        /// The driver's error message.
        message: String,
    },

    /// A statement exceeded the configured deadline.
    #[error("Timed out after {after:?} while applying '{target}'")]
    Timeout {
        /// The migration filename or table.
        target: String,
        /// The deadline that elapsed.
        after: Duration,
    },

    /// The run was cancelled between statements.
    #[error("Cancelled before '{0}'")]
    Cancelled(String),

    /// Another replay holds the migration lock.
    #[error("Migration lock is held: {}", .0.display())]
    MigrationLocked(PathBuf),

    // ── Configuration ────────────────────────────────────────────────

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// A value could not be serialized.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl TablewrightError {
    /// Returns `true` when the failure leaves the schema applied but untracked,
    /// so the next replay will attempt the migration again.
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::LedgerError { .. })
    }

    /// Returns the migration filename or table this error is about, if any.
    pub fn target(&self) -> Option<&str> {
        match self {
            Self::ValidationError(err) => err.table.as_deref(),
            Self::ParseError { filename, .. } | Self::LedgerError { filename, .. } => {
                Some(filename)
            }
            Self::DdlExecutionError { target, .. }
            | Self::Applying { target, .. }
            | Self::Timeout { target, .. }
            | Self::Cancelled(target) => Some(target),
            _ => None,
        }
    }

    /// Attributes a statement-level failure to a migration file or table.
    ///
    /// Backends report rejected statements without knowing which migration
    /// they belong to; the engine fills the target in afterwards. Connection
    /// and database errors are wrapped in [`Applying`](Self::Applying).
    #[must_use]
    pub fn with_target(self, new_target: impl Into<String>) -> Self {
        match self {
            Self::DdlExecutionError { sql, message, .. } => Self::DdlExecutionError {
                target: new_target.into(),
                sql,
                message,
            },
            Self::Timeout { after, .. } => Self::Timeout {
                target: new_target.into(),
                after,
            },
            Self::Cancelled(_) => Self::Cancelled(new_target.into()),
            Self::Applying { source, .. } => Self::Applying {
                target: new_target.into(),
                source,
            },
            err @ (Self::ConnectionError(_) | Self::DatabaseError(_)) => Self::Applying {
                target: new_target.into(),
                source: Box::new(err),
            },
            other => other,
        }
    }

    /// Builds an [`IoError`](Self::IoError) for `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::IoError {
            path: path.into(),
            source,
        }
    }
}

impl From<ValidationError> for TablewrightError {
    fn from(err: ValidationError) -> Self {
        Self::ValidationError(err)
    }
}

/// A convenience type alias for `Result<T, TablewrightError>`.
pub type TablewrightResult<T> = Result<T, TablewrightError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display_plain() {
        let err = ValidationError::new("type is required", "required");
        assert_eq!(err.to_string(), "type is required");
    }

    #[test]
    fn test_validation_error_display_with_context() {
        let err = ValidationError::new("type is required", "required")
            .with_table("widgets")
            .with_column("label");
        assert_eq!(err.to_string(), "widgets.label: type is required");
        assert_eq!(err.code, "required");
    }

    #[test]
    fn test_only_ledger_errors_are_recoverable() {
        let ledger = TablewrightError::LedgerError {
            filename: "1700000000-create_table_widgets.json".into(),
            message: "connection reset".into(),
        };
        assert!(ledger.is_recoverable());
        assert!(!TablewrightError::DatabaseError("x".into()).is_recoverable());
    }

    #[test]
    fn test_target_carries_filename() {
        let err = TablewrightError::DdlExecutionError {
            target: "1700000000-alter_table_widgets.json".into(),
            sql: "ALTER TABLE ...".into(),
            message: "column exists".into(),
        };
        assert_eq!(err.target(), Some("1700000000-alter_table_widgets.json"));
        assert!(err.to_string().contains("column exists"));
    }

    #[test]
    fn test_with_target_rewrites_statement_errors() {
        let err = TablewrightError::DdlExecutionError {
            target: String::new(),
            sql: "DROP TABLE \"t\"".into(),
            message: "no such table".into(),
        }
        .with_target("t");
        assert_eq!(err.target(), Some("t"));

        let untouched = TablewrightError::ConfigurationError("x".into()).with_target("t");
        assert_eq!(untouched.target(), None);
    }

    #[test]
    fn test_with_target_wraps_connection_and_database_errors() {
        let file = "1700000000.000000-create_table_widgets.json";
        for err in [
            TablewrightError::ConnectionError("pool timed out".into()),
            TablewrightError::DatabaseError("COMMIT failed".into()),
        ] {
            let wrapped = err.with_target(file);
            assert_eq!(wrapped.target(), Some(file));
            let text = wrapped.to_string();
            assert!(text.contains(file));
            assert!(text.contains("pool timed out") || text.contains("COMMIT failed"));
            assert!(std::error::Error::source(&wrapped).is_some());
        }

        // Re-targeting replaces the target instead of nesting.
        let twice = TablewrightError::DatabaseError("x".into())
            .with_target("a")
            .with_target("b");
        match twice {
            TablewrightError::Applying { target, source } => {
                assert_eq!(target, "b");
                assert!(matches!(*source, TablewrightError::DatabaseError(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_validation_target_is_table() {
        let err: TablewrightError = ValidationError::new("bad", "invalid")
            .with_table("orders")
            .into();
        assert_eq!(err.target(), Some("orders"));
    }

    #[test]
    fn test_io_error_display_includes_path() {
        let err = TablewrightError::io(
            "/srv/migrations/postgres",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let text = err.to_string();
        assert!(text.contains("/srv/migrations/postgres"));
        assert!(text.contains("denied"));
    }
}
