//! Logging integration.
//!
//! Provides helpers for configuring [`tracing`]-based logging from
//! [`Settings`](crate::settings::Settings) and for creating per-migration spans.

use crate::settings::Settings;

/// Sets up the global tracing subscriber based on the given settings.
///
/// The filter is read from `settings.log_level`. In debug mode a pretty,
/// human-readable format is used; otherwise one JSON object per line.
/// Installing a second subscriber is a no-op.
pub fn setup_logging(settings: &Settings) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&settings.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    if settings.debug {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .pretty()
            .try_init()
            .ok();
    } else {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .try_init()
            .ok();
    }
}

/// Creates a span covering the application of one migration file.
///
/// # Examples
///
/// ```
/// use tablewright_core::logging::migration_span;
///
/// let span = migration_span("postgres", "1700000000-create_table_widgets.json");
/// let _guard = span.enter();
/// tracing::info!("applying");
/// ```
pub fn migration_span(dialect: &str, filename: &str) -> tracing::Span {
    tracing::info_span!("migration", dialect, file = filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_logging_twice_is_harmless() {
        let settings = Settings {
            log_level: "not a [valid filter".to_string(),
            ..Settings::default()
        };
        setup_logging(&settings);
        setup_logging(&Settings::default());
    }

    #[test]
    fn test_migration_span_fields() {
        let span = migration_span("sqlite", "1700000000.000000-create_table_widgets.json");
        let _guard = span.enter();
        tracing::debug!("inside span");
    }
}
