//! The `createtable` management command.

use std::path::PathBuf;

use async_trait::async_trait;
use tablewright_core::{Settings, TablewrightError, ValidationError};
use tablewright_migrations::{ColumnSpec, TableDefinition};

use super::TableRequest;
use crate::command::ManagementCommand;

/// Creates a table from a JSON request file.
///
/// The change is written to the file store before it runs and recorded in
/// the ledger after, like every authored change.
pub struct CreatetableCommand;

impl CreatetableCommand {
    /// Turns a request into a table definition. Names and types are checked
    /// when the DDL is built.
    ///
    /// # Errors
    ///
    /// Returns a validation error naming the table if a column has no type.
    pub fn definition(request: TableRequest) -> Result<TableDefinition, TablewrightError> {
        let table = request.table;
        let columns = request
            .columns
            .into_iter()
            .map(ColumnSpec::try_from)
            .collect::<Result<Vec<_>, ValidationError>>()
            .map_err(|e| e.with_table(&table))?;
        Ok(TableDefinition { table, columns })
    }
}

#[async_trait]
impl ManagementCommand for CreatetableCommand {
    fn name(&self) -> &'static str {
        "createtable"
    }

    fn help(&self) -> &'static str {
        "Create a table from a JSON definition"
    }

    fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
        cmd.arg(super::file_arg().value_parser(clap::value_parser!(PathBuf)))
    }

    async fn handle(
        &self,
        matches: &clap::ArgMatches,
        settings: &Settings,
    ) -> Result<(), TablewrightError> {
        let path = matches
            .get_one::<PathBuf>("file")
            .ok_or_else(|| TablewrightError::ConfigurationError("--file is required".into()))?;
        let definition = Self::definition(TableRequest::from_file(path)?)?;

        let (engine, backend) = super::open(settings)?;
        let filename = engine.create(backend.as_ref(), &definition).await?;
        println!("Created table '{}' ({filename})", definition.table);
        Ok(())
    }
}
