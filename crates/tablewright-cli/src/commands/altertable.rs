//! The `altertable` management command.

use std::path::PathBuf;

use async_trait::async_trait;
use tablewright_core::{Settings, TablewrightError};
use tablewright_migrations::ClauseKind;

use super::TableRequest;
use crate::command::ManagementCommand;

/// Alters a table from a JSON request file.
///
/// The clause comes from `--clause`, or from the file's `clause` key when
/// the flag is omitted.
pub struct AltertableCommand;

impl AltertableCommand {
    /// Picks the clause: the flag wins over the file.
    ///
    /// # Errors
    ///
    /// Returns an unsupported-operation error for an unknown clause, or a
    /// configuration error if neither source names a clause.
    pub fn clause(
        flag: Option<&str>,
        request: &TableRequest,
    ) -> Result<ClauseKind, TablewrightError> {
        match flag.or(request.clause.as_deref()) {
            Some(clause) => clause.parse(),
            None => Err(TablewrightError::ConfigurationError(format!(
                "no alter clause given for '{}'; pass --clause add|drop|rename|alter_column",
                request.table
            ))),
        }
    }
}

#[async_trait]
impl ManagementCommand for AltertableCommand {
    fn name(&self) -> &'static str {
        "altertable"
    }

    fn help(&self) -> &'static str {
        "Alter a table from a JSON request"
    }

    fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
        cmd.arg(super::file_arg().value_parser(clap::value_parser!(PathBuf)))
            .arg(
                clap::Arg::new("clause")
                    .long("clause")
                    .value_parser(["add", "drop", "rename", "alter_column"])
                    .help("Alter clause; overrides the file's `clause` key"),
            )
    }

    async fn handle(
        &self,
        matches: &clap::ArgMatches,
        settings: &Settings,
    ) -> Result<(), TablewrightError> {
        let path = matches
            .get_one::<PathBuf>("file")
            .ok_or_else(|| TablewrightError::ConfigurationError("--file is required".into()))?;
        let request = TableRequest::from_file(path)?;
        let clause = Self::clause(
            matches.get_one::<String>("clause").map(String::as_str),
            &request,
        )?;

        let (engine, backend) = super::open(settings)?;
        let filename = engine
            .alter(backend.as_ref(), &request.table, clause, &request.columns)
            .await?;
        println!("Altered table '{}' with {clause} ({filename})", request.table);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(clause: Option<&str>) -> TableRequest {
        TableRequest {
            table: "widgets".into(),
            columns: Vec::new(),
            clause: clause.map(str::to_string),
        }
    }

    #[test]
    fn test_flag_overrides_file() {
        let req = request(Some("drop"));
        assert_eq!(
            AltertableCommand::clause(Some("alter_column"), &req).unwrap(),
            ClauseKind::AlterColumn
        );
        assert_eq!(AltertableCommand::clause(None, &req).unwrap(), ClauseKind::Drop);
    }

    #[test]
    fn test_missing_clause() {
        assert!(matches!(
            AltertableCommand::clause(None, &request(None)),
            Err(TablewrightError::ConfigurationError(_))
        ));
        assert!(matches!(
            AltertableCommand::clause(Some("truncate"), &request(None)),
            Err(TablewrightError::UnsupportedOperation(_))
        ));
    }

    #[test]
    fn test_unknown_clause_in_file_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("truncate.json");
        std::fs::write(
            &path,
            r#"{"table": "widgets", "clause": "truncate", "columns": []}"#,
        )
        .unwrap();

        let req = TableRequest::from_file(&path).unwrap();
        assert!(matches!(
            AltertableCommand::clause(None, &req),
            Err(TablewrightError::UnsupportedOperation(_))
        ));
    }
}
