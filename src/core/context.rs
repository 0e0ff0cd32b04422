#![allow(clippy::result_large_err)]

use crate::core::config::{ConfigLoader, EngineKind, GflowsConfig};
use crate::core::error::AppError;
use crate::core::package::{Package, PathInfo};
use std::env;
use std::path::{Path, PathBuf};

/// Resolved run configuration. Created once per invocation and never mutated.
#[derive(Debug, Clone)]
pub struct Context {
    /// Working directory the run was started from.
    pub base_dir: PathBuf,
    pub config_path: PathBuf,
    /// Directory holding the config file, `workflows/` and `libs/`.
    pub dir: PathBuf,
    pub github_dir: PathBuf,
    pub config: GflowsConfig,
    pub engine: EngineKind,
    pub enable_colors: bool,
}

/// Options collected from CLI flags.
#[derive(Debug, Clone, Default)]
pub struct ContextOptions {
    pub config_path: Option<PathBuf>,
    pub disable_colors: bool,
}

/// Colors are on unless `--disable-colors` is passed or `NO_COLOR` is set.
pub fn colors_enabled(disable_colors: bool) -> bool {
    !disable_colors && env::var_os("NO_COLOR").is_none()
}

impl Context {
    pub fn load(options: &ContextOptions) -> Result<Self, AppError> {
        let config_path = ConfigLoader::resolve_path(options.config_path.as_deref());
        let config = ConfigLoader::load(&config_path)?;
        let base_dir = env::current_dir().map_err(|e| AppError::io("resolve", Path::new("."), e))?;
        Self::from_config(
            base_dir,
            config_path,
            config,
            colors_enabled(options.disable_colors),
        )
    }

    /// Build a context from an already-loaded config.
    pub fn from_config(
        base_dir: PathBuf,
        config_path: PathBuf,
        config: GflowsConfig,
        enable_colors: bool,
    ) -> Result<Self, AppError> {
        ConfigLoader::validate_config(&config)?;
        let engine = config.engine().map_err(|e| {
            AppError::with_source(
                crate::core::types::ErrorCategory::ConfigError,
                e.to_string(),
                e,
            )
        })?;
        let dir = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let github_dir = PathBuf::from(&config.github_dir);
        let github_dir = if github_dir.is_relative() && config_path.is_absolute() {
            base_dir.join(github_dir)
        } else {
            github_dir
        };

        Ok(Context {
            base_dir,
            config_path,
            dir,
            github_dir,
            config,
            engine,
            enable_colors,
        })
    }

    /// Directory that receives generated workflow files.
    pub fn output_dir(&self) -> PathBuf {
        self.github_dir.join("workflows")
    }

    /// Destination of the generated file for a workflow.
    pub fn destination_for(&self, workflow_name: &str) -> PathBuf {
        self.output_dir().join(format!("{}.yml", workflow_name))
    }

    /// Resolve a configured local dependency path.
    pub fn resolve_local(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// Display form of a path, relative to the working directory when possible.
    pub fn display_path(&self, path: &Path) -> String {
        path.strip_prefix(&self.base_dir)
            .unwrap_or(path)
            .display()
            .to_string()
    }
}

impl Package for Context {
    fn workflows_dir(&self) -> PathBuf {
        self.dir.join("workflows")
    }

    fn libs_dir(&self) -> PathBuf {
        self.dir.join("libs")
    }

    fn path_info(&self, local_path: &Path) -> Result<PathInfo, AppError> {
        let display = self.display_path(local_path);
        Ok(PathInfo {
            local_path: local_path.to_path_buf(),
            source_path: display.clone(),
            description: display,
        })
    }
}
