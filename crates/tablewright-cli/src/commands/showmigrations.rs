//! The `showmigrations` management command.

use std::collections::HashSet;

use async_trait::async_trait;
use tablewright_core::{Settings, TablewrightError};

use crate::command::ManagementCommand;

/// Lists migration files with their applied status.
///
/// Applied files are marked `[X]`. Ledger rows whose file is gone are listed
/// afterwards so an operator can spot a pruned directory.
pub struct ShowmigrationsCommand;

#[async_trait]
impl ManagementCommand for ShowmigrationsCommand {
    fn name(&self) -> &'static str {
        "showmigrations"
    }

    fn help(&self) -> &'static str {
        "Show migration status"
    }

    async fn handle(
        &self,
        _matches: &clap::ArgMatches,
        settings: &Settings,
    ) -> Result<(), TablewrightError> {
        let (engine, backend) = super::open(settings)?;
        let applied = engine.applied(backend.as_ref()).await?;
        let files = engine.store().list_records(engine.dialect())?;

        let applied_names: HashSet<&str> = applied.iter().map(|e| e.name.as_str()).collect();
        let on_disk: HashSet<&str> = files.iter().map(String::as_str).collect();

        println!("{}:", engine.store().directory(engine.dialect()).display());
        if files.is_empty() {
            println!(" (no migrations)");
        }
        for filename in &files {
            let mark = if applied_names.contains(filename.as_str()) { 'X' } else { ' ' };
            println!(" [{mark}] {filename}");
        }

        let orphans: Vec<_> = applied
            .iter()
            .filter(|e| !on_disk.contains(e.name.as_str()))
            .collect();
        if !orphans.is_empty() {
            tracing::warn!(count = orphans.len(), "ledger rows without a migration file");
            println!("Recorded but missing on disk:");
            for entry in orphans {
                println!(" [X] {} ({})", entry.name, entry.created_at);
            }
        }
        Ok(())
    }
}
