//! Settings for the tablewright engine.
//!
//! [`Settings`] holds everything a migration run needs to know: which SQL
//! dialect to target, how to reach the database, where migration records
//! live, and how long a single statement may run.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Database connection configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// A full connection URL. Takes precedence over the discrete fields.
    pub url: Option<String>,
    /// The database name (or file path for SQLite, `:memory:` for in-memory).
    pub name: String,
    /// The database host.
    pub host: String,
    /// The database port. `0` selects the dialect's default.
    pub port: u16,
    /// The database user.
    pub user: String,
    /// The database password.
    pub password: String,
}

/// The complete set of engine settings.
///
/// # Examples
///
/// ```
/// use tablewright_core::settings::Settings;
///
/// let settings = Settings::default();
/// assert_eq!(settings.dialect, "postgres");
/// assert_eq!(settings.statement_timeout_secs, 300);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Enables human readable log output.
    pub debug: bool,
    /// The tracing filter directive (e.g. "info", "tablewright_migrations=debug").
    pub log_level: String,
    /// The SQL dialect: "postgres", "mysql", or "sqlite".
    pub dialect: String,
    /// How to reach the database.
    pub database: DatabaseSettings,
    /// Root directory of the migration file store. Records for a dialect
    /// live in `<migrations_root>/<dialect>/`.
    pub migrations_root: PathBuf,
    /// Deadline for a single DDL execution, in seconds. `0` disables it.
    pub statement_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: false,
            log_level: "info".to_string(),
            dialect: "postgres".to_string(),
            database: DatabaseSettings::default(),
            migrations_root: PathBuf::from("migrations"),
            statement_timeout_secs: 300,
        }
    }
}

impl Settings {
    /// Returns the statement deadline, or `None` when disabled.
    pub const fn statement_timeout(&self) -> Option<Duration> {
        if self.statement_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.statement_timeout_secs))
        }
    }
}
