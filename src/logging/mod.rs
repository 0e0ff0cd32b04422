pub mod config;
pub mod context;
pub mod layers;

pub use context::{detect_context, ExecutionContext};
pub use layers::console::{ConsoleOutput, LogFormat};

use crate::logging::config::LoggingConfig;
use crate::logging::layers::console;
use crate::Result;
use anyhow::{anyhow, Context};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::Registry;

static LOGGER_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Inputs gathered from global CLI flags.
#[derive(Debug, Clone, Default)]
pub struct LoggingOptions {
    /// Directory holding `logging.toml`, normally the config file's directory.
    pub config_dir: Option<PathBuf>,
    pub verbose: bool,
    pub enable_colors: bool,
}

/// Initialize tracing for one CLI invocation.
///
/// Filter precedence is `--verbose`, then `RUST_LOG`, then `logging.default_level`.
/// Errors when invoked more than once per process unless tests reset the guard.
pub fn init(options: &LoggingOptions) -> Result<LoggingConfig> {
    if LOGGER_INITIALIZED
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return Err(anyhow!("logging already initialized"));
    }

    let config = LoggingConfig::load(options.config_dir.as_deref())?;
    let env_filter = if options.verbose {
        EnvFilter::try_new("debug")
    } else {
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.default_level))
    }
    .context("failed to configure tracing level")?;

    let ansi = detect_context().allows_ansi(options.enable_colors);
    let console_layer =
        console::console_layer::<Registry>(config.console_output, config.format, ansi);

    tracing_subscriber::registry()
        .with(console_layer)
        .with(env_filter)
        .try_init()
        .context("failed to install tracing subscriber")?;

    Ok(config)
}

#[cfg(test)]
/// Reset the initialization guard so tests can reconfigure logging multiple times.
pub fn reset_for_tests() {
    LOGGER_INITIALIZED.store(false, Ordering::SeqCst);
}
