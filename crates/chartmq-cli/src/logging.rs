//! Tracing subscriber setup

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::{LogFormat, LogSettings};
use crate::error::{CliError, Result};

/// Filter directive for the configured level; each `-v` raises it one step
pub fn directive(settings: &LogSettings, verbose: u8) -> String {
    let level = match verbose {
        0 => settings.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    format!("{level},lapin=warn,tower_http=info")
}

/// Install the global subscriber. `RUST_LOG` wins over the settings.
pub fn init(settings: &LogSettings, verbose: u8) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(directive(settings, verbose))
            .map_err(|e| CliError::config(format!("invalid log.level: {e}")))?,
    };

    let registry = tracing_subscriber::registry().with(filter);
    let installed = match settings.format {
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
    };
    installed.map_err(|e| CliError::internal(format!("failed to initialize tracing: {e}")))
}
