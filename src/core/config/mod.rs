use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub mod loader;

pub use loader::ConfigLoader;

/// Schema used when neither the workflow nor the defaults configure one.
pub const DEFAULT_SCHEMA_URI: &str = "https://json.schemastore.org/github-workflow.json";

/// Main gflows configuration loaded from `.gflows/config.yml`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GflowsConfig {
    /// Directory that receives generated workflows (under `workflows/`)
    #[serde(default = "default_github_dir")]
    pub github_dir: String,

    /// Template engine and dependency settings
    #[serde(default)]
    pub templates: TemplatesConfig,

    /// Check settings applied to every workflow
    #[serde(default)]
    pub defaults: WorkflowConfig,

    /// Per-workflow check overrides, keyed by workflow name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub workflows: BTreeMap<String, WorkflowConfig>,
}

/// Template engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct TemplatesConfig {
    /// Engine name; resolved into [`EngineKind`] when the config is loaded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,

    #[serde(default)]
    pub defaults: DependencyConfig,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub overrides: BTreeMap<String, DependencyConfig>,
}

/// Library search paths for template evaluation
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct DependencyConfig {
    #[serde(default, alias = "libs", skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct WorkflowConfig {
    #[serde(default)]
    pub checks: ChecksConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ChecksConfig {
    #[serde(default)]
    pub schema: SchemaCheckConfig,
    #[serde(default)]
    pub content: ContentCheckConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct SchemaCheckConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ContentCheckConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

/// Template engines understood by gflows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineKind {
    #[default]
    Jsonnet,
    Ytt,
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineKind::Jsonnet => write!(f, "jsonnet"),
            EngineKind::Ytt => write!(f, "ytt"),
        }
    }
}

impl FromStr for EngineKind {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "jsonnet" => Ok(EngineKind::Jsonnet),
            "ytt" => Ok(EngineKind::Ytt),
            _ => Err(ConfigError::UnknownEngine(value.to_string())),
        }
    }
}

/// Errors raised while interpreting a loaded configuration.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("unknown template engine '{0}'; supported engines are jsonnet, ytt")]
    UnknownEngine(String),
    #[error("githubDir cannot be empty")]
    EmptyGithubDir,
}

fn default_github_dir() -> String {
    ".github".to_string()
}

impl Default for GflowsConfig {
    fn default() -> Self {
        GflowsConfig {
            github_dir: default_github_dir(),
            templates: TemplatesConfig::default(),
            defaults: WorkflowConfig::default(),
            workflows: BTreeMap::new(),
        }
    }
}

impl GflowsConfig {
    pub fn engine(&self) -> Result<EngineKind, ConfigError> {
        match &self.templates.engine {
            Some(name) => name.parse(),
            None => Ok(EngineKind::default()),
        }
    }

    pub fn schema_enabled(&self, workflow: &str) -> bool {
        self.workflows
            .get(workflow)
            .and_then(|w| w.checks.schema.enabled)
            .or(self.defaults.checks.schema.enabled)
            .unwrap_or(true)
    }

    pub fn content_enabled(&self, workflow: &str) -> bool {
        self.workflows
            .get(workflow)
            .and_then(|w| w.checks.content.enabled)
            .or(self.defaults.checks.content.enabled)
            .unwrap_or(true)
    }

    /// Schema URI for a workflow, or `None` when it uses the default schema.
    pub fn schema_override(&self, workflow: &str) -> Option<&str> {
        self.workflows
            .get(workflow)
            .and_then(|w| w.checks.schema.uri.as_deref())
            .filter(|uri| !uri.trim().is_empty())
    }

    pub fn default_schema_uri(&self) -> &str {
        self.defaults
            .checks
            .schema
            .uri
            .as_deref()
            .filter(|uri| !uri.trim().is_empty())
            .unwrap_or(DEFAULT_SCHEMA_URI)
    }

    pub fn schema_uri(&self, workflow: &str) -> &str {
        self.schema_override(workflow)
            .unwrap_or_else(|| self.default_schema_uri())
    }

    pub fn dependencies(&self, workflow: &str) -> &[String] {
        self.templates
            .overrides
            .get(workflow)
            .and_then(|o| o.dependencies.as_deref())
            .or(self.templates.defaults.dependencies.as_deref())
            .unwrap_or(&[])
    }

    /// Every dependency named anywhere in the templates config, in first-seen order.
    pub fn all_dependencies(&self) -> Vec<String> {
        let mut seen = Vec::new();
        let defaults = self.templates.defaults.dependencies.iter().flatten();
        let overrides = self
            .templates
            .overrides
            .values()
            .flat_map(|o| o.dependencies.iter().flatten());
        for dependency in defaults.chain(overrides) {
            if !seen.contains(dependency) {
                seen.push(dependency.clone());
            }
        }
        seen
    }
}
