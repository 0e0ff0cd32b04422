#![allow(clippy::result_large_err)]

use super::{ConfigError, GflowsConfig};
use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use std::env;
use std::path::{Path, PathBuf};

/// Location of the config file relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = ".gflows/config.yml";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Resolve the config path: explicit argument, then `GFLOWS_CONFIG`, then the default.
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        explicit
            .map(Path::to_path_buf)
            .or_else(|| env::var("GFLOWS_CONFIG").ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    /// Load config from `path`, falling back to defaults when the file does not exist.
    /// Environment variables override config file values.
    pub fn load(path: &Path) -> Result<GflowsConfig, AppError> {
        let mut config = Self::load_from_file(path)?.unwrap_or_default();
        Self::apply_env_overrides(&mut config);
        Self::validate_config(&config)?;
        Ok(config)
    }

    /// Load config from specific file path
    /// Returns Ok(None) if file doesn't exist
    pub fn load_from_file(path: &Path) -> Result<Option<GflowsConfig>, AppError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).map_err(|e| AppError::io("read", path, e))?;

        // An empty file is a valid "all defaults" config.
        if content.trim().is_empty() {
            return Ok(Some(GflowsConfig::default()));
        }

        let config: GflowsConfig = serde_yaml::from_str(&content).map_err(|e| {
            AppError::with_source(
                ErrorCategory::ConfigError,
                format!("Failed to parse config file {}: {}", path.display(), e),
                e,
            )
        })?;

        Ok(Some(config))
    }

    fn apply_env_overrides(config: &mut GflowsConfig) {
        if let Ok(github_dir) = env::var("GFLOWS_GITHUB_DIR") {
            config.github_dir = github_dir;
        }

        if let Ok(engine) = env::var("GFLOWS_ENGINE") {
            config.templates.engine = Some(engine);
        }
    }

    /// Get documentation for supported environment variables
    pub fn env_var_documentation() -> &'static [&'static str] {
        &[
            "GFLOWS_CONFIG - Override the config file path (default: .gflows/config.yml)",
            "GFLOWS_GITHUB_DIR - Override the generated workflows directory (default: .github)",
            "GFLOWS_ENGINE - Override the template engine (jsonnet or ytt)",
            "GFLOWS_LOG_OUTPUT - Override the log sink (stdout, stderr or none)",
            "NO_COLOR - Disable colored output",
            "RUST_LOG - Override the log filter",
        ]
    }

    /// Validate configuration values
    pub fn validate_config(config: &GflowsConfig) -> Result<(), AppError> {
        let config_error = |e: ConfigError| {
            AppError::with_source(ErrorCategory::ConfigError, e.to_string(), e)
        };

        if config.github_dir.trim().is_empty() {
            return Err(config_error(ConfigError::EmptyGithubDir));
        }

        config.engine().map_err(config_error)?;

        Ok(())
    }
}
