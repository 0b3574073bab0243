//! The `droptable` management command.

use async_trait::async_trait;
use tablewright_core::{Settings, TablewrightError};

use crate::command::ManagementCommand;

/// Drops one or more tables.
///
/// Each table gets its own migration file and statement, so one failure
/// does not stop the rest. The command fails with the first error after
/// reporting every table.
pub struct DroptableCommand;

#[async_trait]
impl ManagementCommand for DroptableCommand {
    fn name(&self) -> &'static str {
        "droptable"
    }

    fn help(&self) -> &'static str {
        "Drop tables"
    }

    fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
        cmd.arg(
            clap::Arg::new("tables")
                .required(true)
                .num_args(1..)
                .help("Tables to drop"),
        )
    }

    async fn handle(
        &self,
        matches: &clap::ArgMatches,
        settings: &Settings,
    ) -> Result<(), TablewrightError> {
        let tables: Vec<String> = matches
            .get_many::<String>("tables")
            .map(|values| values.cloned().collect())
            .unwrap_or_default();

        let (engine, backend) = super::open(settings)?;
        let outcomes = engine.drop(backend.as_ref(), &tables).await?;

        let mut first_error = None;
        for outcome in outcomes {
            match outcome.result {
                Ok(filename) => println!("Dropped table '{}' ({filename})", outcome.table),
                Err(e) => {
                    println!("Failed to drop '{}': {e}", outcome.table);
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
