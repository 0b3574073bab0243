//! # tablewright-core
//!
//! Foundation types shared by every tablewright crate. This crate has no
//! database dependencies.
//!
//! ## Modules
//!
//! - [`error`] - The [`TablewrightError`] taxonomy and result alias
//! - [`settings`] - Engine configuration with sensible defaults
//! - [`settings_loader`] - TOML/JSON loading and environment overrides
//! - [`logging`] - Tracing-based logging integration

pub mod error;
pub mod logging;
pub mod settings;
pub mod settings_loader;

// Re-export the most commonly used types at the crate root.
pub use error::{TablewrightError, TablewrightResult, ValidationError};
pub use settings::{DatabaseSettings, Settings};
