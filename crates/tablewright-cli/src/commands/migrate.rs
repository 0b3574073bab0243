//! The `migrate` management command.
//!
//! Replays every pending migration file for the configured dialect, in
//! timestamp order, under the replay lock. Ctrl-C cancels the run before
//! the next file starts.

use async_trait::async_trait;
use tablewright_core::{Settings, TablewrightError};
use tablewright_migrations::FileStatus;

use crate::command::ManagementCommand;

/// Applies pending migrations.
///
/// With `--plan`, lists the pending files without applying anything.
pub struct MigrateCommand;

#[async_trait]
impl ManagementCommand for MigrateCommand {
    fn name(&self) -> &'static str {
        "migrate"
    }

    fn help(&self) -> &'static str {
        "Apply pending migrations"
    }

    fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
        cmd.arg(
            clap::Arg::new("plan")
                .long("plan")
                .action(clap::ArgAction::SetTrue)
                .help("List pending migrations without applying them"),
        )
    }

    async fn handle(
        &self,
        matches: &clap::ArgMatches,
        settings: &Settings,
    ) -> Result<(), TablewrightError> {
        let (engine, backend) = super::open(settings)?;

        if matches.get_flag("plan") {
            let pending = engine.pending(backend.as_ref()).await?;
            if pending.is_empty() {
                println!("No migrations to apply.");
            }
            for filename in pending {
                println!("  {filename}");
            }
            return Ok(());
        }

        let cancel = engine.runner().options().cancel.clone();
        let interrupt = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, stopping after the current file");
                cancel.cancel();
            }
        });

        tracing::info!(dialect = %engine.dialect(), "running migrations");
        let result = engine.migrate(backend.as_ref()).await;
        interrupt.abort();
        let summary = result?;

        if summary.outcomes.is_empty() {
            println!("No migrations to apply.");
        }
        for outcome in &summary.outcomes {
            match &outcome.status {
                FileStatus::Applied => println!("  Applying {}... OK", outcome.filename),
                FileStatus::Failed(message) => {
                    println!("  Applying {}... FAILED: {message}", outcome.filename);
                }
                FileStatus::NotAttempted => println!("  Skipped {}", outcome.filename),
            }
        }

        summary.into_result().map(|_| ())
    }
}
