//! The `sqlmigrate` management command.

use async_trait::async_trait;
use tablewright_core::{Settings, TablewrightError};
use tablewright_migrations::SchemaEngine;

use crate::command::ManagementCommand;

/// Prints the DDL a migration file produces for the configured dialect.
///
/// Reads only the file store; no database connection is made.
pub struct SqlmigrateCommand;

#[async_trait]
impl ManagementCommand for SqlmigrateCommand {
    fn name(&self) -> &'static str {
        "sqlmigrate"
    }

    fn help(&self) -> &'static str {
        "Print the SQL for a migration file"
    }

    fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
        cmd.arg(
            clap::Arg::new("filename")
                .required(true)
                .help("Migration filename, e.g. 1700000000.000000-create_table_widgets.json"),
        )
    }

    async fn handle(
        &self,
        matches: &clap::ArgMatches,
        settings: &Settings,
    ) -> Result<(), TablewrightError> {
        let filename = matches
            .get_one::<String>("filename")
            .ok_or_else(|| TablewrightError::ConfigurationError("filename is required".into()))?;

        let engine = SchemaEngine::from_settings(settings)?;
        for statement in engine.runner().sql_for(filename)? {
            println!("{statement};");
        }
        Ok(())
    }
}
