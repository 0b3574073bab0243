//! # tablewright-cli
//!
//! Management commands for tablewright, dispatched through a
//! [`CommandRegistry`] the way the `tablewright` binary does it.
//!
//! ```rust
//! use tablewright_cli::command::CommandRegistry;
//! use tablewright_cli::commands::register_builtin_commands;
//!
//! let mut registry = CommandRegistry::new();
//! register_builtin_commands(&mut registry);
//!
//! let names = registry.list_commands();
//! assert!(names.contains(&"migrate"));
//! assert!(names.contains(&"sqlmigrate"));
//! ```

// These clippy lints are intentionally allowed:
// - result_large_err: TablewrightError is the workspace-wide error type
// - doc_markdown: backtick requirements for documentation items are too strict
// - missing_const_for_fn: some functions may gain runtime logic later
// - module_name_repetitions: re-exports make module-prefixed names redundant
// - unused_async: command handlers maintain consistent async signatures
#![allow(clippy::result_large_err)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::unused_async)]

pub mod command;
pub mod commands;

use std::path::Path;

use tablewright_core::{settings_loader, Settings, TablewrightError};

pub use command::{CommandRegistry, ManagementCommand};
pub use commands::{register_builtin_commands, TableRequest};

/// Returns a registry holding every built-in command.
pub fn builtin_registry() -> CommandRegistry {
    let mut registry = CommandRegistry::new();
    register_builtin_commands(&mut registry);
    registry
}

/// Loads settings from an optional TOML file, then applies `TABLEWRIGHT_*`
/// environment overrides.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_settings(path: Option<&Path>) -> Result<Settings, TablewrightError> {
    match path {
        Some(path) => settings_loader::from_toml_file_with_env(path),
        None => Ok(settings_loader::from_env()),
    }
}
