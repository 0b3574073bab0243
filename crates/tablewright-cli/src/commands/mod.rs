//! Built-in management commands.
//!
//! Each command loads its engine and backend from the settings it is handed,
//! so a command runs the same whether invoked from the binary or a test.

pub mod altertable;
pub mod createtable;
pub mod droptable;
pub mod migrate;
pub mod showmigrations;
pub mod sqlmigrate;

pub use altertable::AltertableCommand;
pub use createtable::CreatetableCommand;
pub use droptable::DroptableCommand;
pub use migrate::MigrateCommand;
pub use showmigrations::ShowmigrationsCommand;
pub use sqlmigrate::SqlmigrateCommand;

use std::path::Path;

use serde::Deserialize;
use tablewright_core::{Settings, TablewrightError};
use tablewright_db_backends::{connect, DatabaseBackend};
use tablewright_migrations::{ColumnPayload, SchemaEngine};

use crate::command::CommandRegistry;

/// Registers all built-in commands into the given registry.
pub fn register_builtin_commands(registry: &mut CommandRegistry) {
    registry.register(Box::new(MigrateCommand));
    registry.register(Box::new(ShowmigrationsCommand));
    registry.register(Box::new(SqlmigrateCommand));
    registry.register(Box::new(CreatetableCommand));
    registry.register(Box::new(AltertableCommand));
    registry.register(Box::new(DroptableCommand));
}

/// A table request file, as read by `createtable` and `altertable`.
///
/// ```json
/// { "table": "widgets", "columns": [ { "name": "id", "type": "INTEGER" } ] }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TableRequest {
    /// The target table.
    pub table: String,
    /// Column payloads, interpreted per operation.
    #[serde(default)]
    pub columns: Vec<ColumnPayload>,
    /// The alter clause, when the file carries one. Kept as text so an
    /// unknown clause is reported as unsupported rather than unparsable.
    #[serde(default)]
    pub clause: Option<String>,
}

impl TableRequest {
    /// Reads and parses a request file.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read, or a parse error
    /// naming the file if it is not a valid request.
    pub fn from_file(path: &Path) -> Result<Self, TablewrightError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| TablewrightError::io(path, e))?;
        serde_json::from_str(&contents).map_err(|e| TablewrightError::ParseError {
            filename: path.display().to_string(),
            message: e.to_string(),
        })
    }
}

/// Builds the engine and connects the backend named by `settings`.
pub(crate) fn open(
    settings: &Settings,
) -> Result<(SchemaEngine, Box<dyn DatabaseBackend>), TablewrightError> {
    let engine = SchemaEngine::from_settings(settings)?;
    let backend = connect(settings)?;
    Ok((engine, backend))
}

/// The `--file` argument shared by the authoring commands.
pub(crate) fn file_arg() -> clap::Arg {
    clap::Arg::new("file")
        .long("file")
        .short('f')
        .value_name("PATH")
        .required(true)
        .help("JSON request file with `table` and `columns`")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_builtin_commands() {
        let mut registry = CommandRegistry::new();
        register_builtin_commands(&mut registry);
        assert_eq!(
            registry.list_commands(),
            vec![
                "altertable",
                "createtable",
                "droptable",
                "migrate",
                "showmigrations",
                "sqlmigrate"
            ]
        );
    }

    #[test]
    fn test_table_request_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("widgets.json");
        std::fs::write(
            &path,
            r#"{"table": "widgets", "clause": "rename",
                "columns": [{"name": "label", "new_name": "title"}]}"#,
        )
        .unwrap();

        let request = TableRequest::from_file(&path).unwrap();
        assert_eq!(request.table, "widgets");
        assert_eq!(request.clause.as_deref(), Some("rename"));
        assert_eq!(request.columns[0].new_name.as_deref(), Some("title"));
    }

    #[test]
    fn test_table_request_errors_name_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{\"columns\": []}").unwrap();

        match TableRequest::from_file(&path).unwrap_err() {
            TablewrightError::ParseError { filename, .. } => {
                assert!(filename.ends_with("broken.json"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(matches!(
            TableRequest::from_file(&dir.path().join("missing.json")),
            Err(TablewrightError::IoError { .. })
        ));
    }
}
