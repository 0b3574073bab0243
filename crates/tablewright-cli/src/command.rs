//! Management command framework.
//!
//! A [`ManagementCommand`] names itself, declares its clap arguments, and
//! handles a parsed invocation against the loaded [`Settings`]. The
//! [`CommandRegistry`] collects commands, builds the top-level clap
//! application, and dispatches to the selected subcommand.
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use tablewright_cli::command::ManagementCommand;
//! use tablewright_core::{Settings, TablewrightError};
//!
//! struct DialectCommand;
//!
//! #[async_trait]
//! impl ManagementCommand for DialectCommand {
//!     fn name(&self) -> &str { "dialect" }
//!     fn help(&self) -> &str { "Print the configured dialect" }
//!
//!     async fn handle(
//!         &self,
//!         _matches: &clap::ArgMatches,
//!         settings: &Settings,
//!     ) -> Result<(), TablewrightError> {
//!         println!("{}", settings.dialect);
//!         Ok(())
//!     }
//! }
//! ```

use std::collections::HashMap;

use async_trait::async_trait;
use tablewright_core::{Settings, TablewrightError};

/// Name of the top-level binary.
pub const BIN_NAME: &str = "tablewright";

/// A command invocable as a `tablewright` subcommand.
#[async_trait]
pub trait ManagementCommand: Send + Sync {
    /// The subcommand name.
    fn name(&self) -> &str;

    /// One-line help text.
    fn help(&self) -> &str;

    /// Adds arguments to the subcommand. The default adds none.
    fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
        cmd
    }

    /// Runs the command.
    async fn handle(
        &self,
        matches: &clap::ArgMatches,
        settings: &Settings,
    ) -> Result<(), TablewrightError>;
}

/// Commands registered by name.
pub struct CommandRegistry {
    commands: HashMap<String, Box<dyn ManagementCommand>>,
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            commands: HashMap::new(),
        }
    }

    /// Registers a command, replacing any command with the same name.
    pub fn register(&mut self, command: Box<dyn ManagementCommand>) {
        let name = command.name().to_string();
        self.commands.insert(name, command);
    }

    /// Looks up a command by name.
    pub fn get(&self, name: &str) -> Option<&dyn ManagementCommand> {
        self.commands.get(name).map(AsRef::as_ref)
    }

    /// Returns the registered names, sorted.
    pub fn list_commands(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.commands.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Returns the number of registered commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Builds the clap application: a global `--settings` option plus one
    /// subcommand per registered command.
    pub fn build_cli(&self) -> clap::Command {
        let mut app = clap::Command::new(BIN_NAME)
            .about("Declarative schema migrations with a file-based intent log")
            .subcommand_required(true)
            .arg_required_else_help(true)
            .arg(
                clap::Arg::new("settings")
                    .long("settings")
                    .global(true)
                    .value_name("FILE")
                    .help("TOML settings file (TABLEWRIGHT_* variables override it)"),
            );

        let mut entries: Vec<_> = self.commands.iter().collect();
        entries.sort_by(|(a, _), (b, _)| a.cmp(b));

        for (name, cmd) in entries {
            // clap wants &'static str names; commands live for the whole process.
            let static_name: &'static str = Box::leak(name.clone().into_boxed_str());
            let subcmd = clap::Command::new(static_name).about(cmd.help().to_string());
            app = app.subcommand(cmd.add_arguments(subcmd));
        }

        app
    }

    /// Dispatches to the subcommand selected in `matches`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no or an unknown subcommand was
    /// given, otherwise whatever the command returns.
    pub async fn execute(
        &self,
        matches: &clap::ArgMatches,
        settings: &Settings,
    ) -> Result<(), TablewrightError> {
        let (name, sub_matches) = matches.subcommand().ok_or_else(|| {
            TablewrightError::ConfigurationError("No subcommand specified".to_string())
        })?;

        let cmd = self.get(name).ok_or_else(|| {
            TablewrightError::ConfigurationError(format!("Unknown command: {name}"))
        })?;

        tracing::debug!(command = name, "dispatching management command");
        cmd.handle(sub_matches, settings).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoCommand {
        cmd_name: String,
    }

    impl EchoCommand {
        fn new(name: &str) -> Self {
            Self {
                cmd_name: name.to_string(),
            }
        }
    }

    #[async_trait]
    impl ManagementCommand for EchoCommand {
        fn name(&self) -> &str {
            &self.cmd_name
        }

        fn help(&self) -> &'static str {
            "Echo a table name"
        }

        fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
            cmd.arg(clap::Arg::new("table").required(true))
        }

        async fn handle(
            &self,
            matches: &clap::ArgMatches,
            _settings: &Settings,
        ) -> Result<(), TablewrightError> {
            let table = matches.get_one::<String>("table").map_or("", String::as_str);
            if table == "bad name" {
                return Err(TablewrightError::ConfigurationError("bad table".to_string()));
            }
            Ok(())
        }
    }

    #[test]
    fn test_registry_starts_empty() {
        let registry = CommandRegistry::default();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
        assert!(registry.get("migrate").is_none());
    }

    #[test]
    fn test_register_replaces_and_sorts() {
        let mut registry = CommandRegistry::new();
        registry.register(Box::new(EchoCommand::new("sqlmigrate")));
        registry.register(Box::new(EchoCommand::new("droptable")));
        registry.register(Box::new(EchoCommand::new("sqlmigrate")));

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.list_commands(), vec!["droptable", "sqlmigrate"]);
        assert_eq!(registry.get("droptable").unwrap().help(), "Echo a table name");
    }

    #[test]
    fn test_build_cli_accepts_global_settings() {
        let mut registry = CommandRegistry::new();
        registry.register(Box::new(EchoCommand::new("echo")));

        let matches = registry
            .build_cli()
            .try_get_matches_from([BIN_NAME, "echo", "widgets", "--settings", "tw.toml"])
            .unwrap();
        assert_eq!(
            matches.get_one::<String>("settings").map(String::as_str),
            Some("tw.toml")
        );
        let (name, sub) = matches.subcommand().unwrap();
        assert_eq!(name, "echo");
        assert_eq!(sub.get_one::<String>("table").unwrap(), "widgets");
    }

    #[test]
    fn test_build_cli_requires_subcommand() {
        let registry = CommandRegistry::new();
        assert!(registry.build_cli().try_get_matches_from([BIN_NAME]).is_err());
    }

    #[tokio::test]
    async fn test_execute_dispatches() {
        let mut registry = CommandRegistry::new();
        registry.register(Box::new(EchoCommand::new("echo")));
        let settings = Settings::default();

        let ok = registry
            .build_cli()
            .try_get_matches_from([BIN_NAME, "echo", "widgets"])
            .unwrap();
        assert!(registry.execute(&ok, &settings).await.is_ok());

        let bad = registry
            .build_cli()
            .try_get_matches_from([BIN_NAME, "echo", "bad name"])
            .unwrap();
        assert!(matches!(
            registry.execute(&bad, &settings).await,
            Err(TablewrightError::ConfigurationError(_))
        ));
    }
}
