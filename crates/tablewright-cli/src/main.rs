//! The `tablewright` binary.

use std::path::Path;
use std::process::ExitCode;

use anyhow::Context;
use tablewright_cli::{builtin_registry, load_settings};
use tablewright_core::logging::setup_logging;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<()> {
    let registry = builtin_registry();
    let matches = registry.build_cli().get_matches();

    let settings_path = matches.get_one::<String>("settings").map(Path::new);
    let settings = load_settings(settings_path).with_context(|| match settings_path {
        Some(path) => format!("loading settings from {}", path.display()),
        None => "loading settings from the environment".to_string(),
    })?;
    setup_logging(&settings);

    registry.execute(&matches, &settings).await?;
    Ok(())
}
