#![allow(clippy::result_large_err)]

//! Template engine protocol shared by the Jsonnet and ytt engines.

pub mod backend;
pub mod jsonnet;
pub mod ytt;

pub use backend::{BackendError, CommandBackend, TemplateBackend};
pub use jsonnet::JsonnetEngine;
pub use ytt::YttEngine;

use crate::core::config::EngineKind;
use crate::core::context::Context;
use crate::core::error::AppError;
use crate::core::library::{is_manifest, LibraryResolver};
use crate::core::package::{Package, PathInfo};
use crate::core::paths;
use crate::core::types::ErrorCategory;
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

/// First line of every generated file.
pub const GENERATED_HEADER: &str = "# File generated by gflows, do not modify";

/// Token replaced by the workflow name in generator destinations.
pub const WORKFLOW_NAME_TOKEN: &str = "$WORKFLOW_NAME";

/// Generation-time status of a definition.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DefinitionStatus {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// The compiled result for one workflow.
#[derive(Debug, Clone)]
pub struct Definition {
    pub name: String,
    pub source: String,
    pub destination: PathBuf,
    /// Full generated text, provenance header included.
    pub content: String,
    /// Structured form of the generated output, used for schema checks.
    pub document: Option<Value>,
    pub status: DefinitionStatus,
}

impl Definition {
    fn generated(name: String, info: &PathInfo, destination: PathBuf, output: &str) -> Self {
        let content = format!("{}{}", provenance_header(&info.description), output);
        let (document, status) = match serde_yaml::from_str::<Value>(output) {
            Ok(document) => (
                Some(document),
                DefinitionStatus {
                    valid: true,
                    errors: Vec::new(),
                },
            ),
            Err(e) => (
                None,
                DefinitionStatus {
                    valid: false,
                    errors: vec![format!("generated output is not valid YAML: {}", e)],
                },
            ),
        };
        Definition {
            name,
            source: info.description.clone(),
            destination,
            content,
            document,
            status,
        }
    }

    fn failed(name: String, info: &PathInfo, destination: PathBuf, error: &BackendError) -> Self {
        Definition {
            name,
            source: info.description.clone(),
            destination,
            content: String::new(),
            document: None,
            status: DefinitionStatus {
                valid: false,
                errors: vec![error.message.trim().to_string()],
            },
        }
    }
}

/// Two-line header naming the generator and the source of a generated file.
pub fn provenance_header(source: &str) -> String {
    format!("{}\n# Source: {}\n", GENERATED_HEADER, source)
}

/// Remove a leading provenance header, if present.
pub fn strip_provenance_header(content: &str) -> &str {
    match content.strip_prefix(GENERATED_HEADER) {
        Some(rest) => {
            let rest = rest.strip_prefix('\n').unwrap_or(rest);
            if rest.starts_with("# Source:") {
                rest.split_once('\n').map(|(_, body)| body).unwrap_or("")
            } else {
                rest
            }
        }
        None => content,
    }
}

/// Variables available to scaffold generation.
#[derive(Debug, Clone)]
pub struct TemplateVars {
    pub workflow_name: String,
    pub github_dir: String,
}

impl Default for TemplateVars {
    fn default() -> Self {
        TemplateVars {
            workflow_name: "gflows".to_string(),
            github_dir: ".github".to_string(),
        }
    }
}

/// One scaffold file: a logical source name, its content and where it goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorEntry {
    pub source: &'static str,
    pub content: String,
    pub destination: PathBuf,
}

/// Files written by `gflows init`.
#[derive(Debug, Clone, Default)]
pub struct GeneratorManifest {
    pub entries: Vec<GeneratorEntry>,
}

impl GeneratorManifest {
    pub(crate) fn from_templates(
        root: &Path,
        templates: &[(&'static str, &'static str, &'static str)],
        vars: &TemplateVars,
    ) -> Self {
        let entries = templates
            .iter()
            .map(|&(source, destination, content)| GeneratorEntry {
                source,
                content: substitute(content, vars),
                destination: root.join(substitute(destination, vars)),
            })
            .collect();
        GeneratorManifest { entries }
    }

    pub fn sources(&self) -> Vec<&'static str> {
        self.entries.iter().map(|e| e.source).collect()
    }
}

fn substitute(text: &str, vars: &TemplateVars) -> String {
    text.replace(WORKFLOW_NAME_TOKEN, &vars.workflow_name)
        .replace("$GITHUB_DIR", &vars.github_dir)
}

/// Capability interface implemented by every template engine.
#[async_trait]
pub trait TemplateEngine: Send + Sync {
    /// Local files that should trigger regeneration when they change.
    fn observable_sources(&self) -> Vec<PathBuf>;

    async fn workflow_definitions(&self) -> Result<Vec<Definition>, AppError>;

    /// Convert an existing generated workflow into template source; returns the new path.
    async fn import_workflow(&self, existing_file: &Path) -> Result<PathBuf, AppError>;

    fn generator_manifest(&self, vars: &TemplateVars) -> GeneratorManifest;
}

/// Build the engine selected by the context.
pub fn create_engine(
    context: Arc<Context>,
    resolver: Arc<LibraryResolver>,
    backend: Option<Arc<dyn TemplateBackend>>,
) -> Box<dyn TemplateEngine> {
    match context.engine {
        EngineKind::Jsonnet => {
            let backend = backend
                .unwrap_or_else(|| Arc::new(CommandBackend::jsonnet()) as Arc<dyn TemplateBackend>);
            Box::new(JsonnetEngine::new(context, resolver, backend))
        }
        EngineKind::Ytt => {
            let backend = backend
                .unwrap_or_else(|| Arc::new(CommandBackend::ytt()) as Arc<dyn TemplateBackend>);
            Box::new(YttEngine::new(context, resolver, backend))
        }
    }
}

/// State and helpers shared by both engines.
pub(crate) struct EngineCore {
    pub context: Arc<Context>,
    pub resolver: Arc<LibraryResolver>,
    pub backend: Arc<dyn TemplateBackend>,
}

impl EngineCore {
    /// The local context followed by every library named in the templates config.
    pub async fn packages(&self) -> Result<Vec<Arc<dyn Package>>, AppError> {
        let context: Arc<dyn Package> = self.context.clone();
        let mut packages = vec![context];
        for dependency in self.context.config.all_dependencies() {
            if is_manifest(&dependency) {
                let manifest = self.manifest_reference(&dependency);
                packages.push(self.resolver.resolve(&manifest).await?);
            }
        }
        Ok(packages)
    }

    /// Search paths for one workflow: its package's libs, the local libs, then dependencies.
    /// Paths missing on disk are left out.
    pub async fn library_paths(
        &self,
        workflow: &str,
        package: &dyn Package,
    ) -> Result<Vec<PathBuf>, AppError> {
        let mut candidates = vec![package.libs_dir(), self.context.libs_dir()];

        for dependency in self.context.config.dependencies(workflow) {
            let path = if is_manifest(dependency) {
                let manifest = self.manifest_reference(dependency);
                self.resolver.resolve(&manifest).await?.libs_dir()
            } else if paths::is_remote(dependency) {
                return Err(AppError::new(
                    ErrorCategory::ConfigError,
                    format!(
                        "remote dependency {} must be a library manifest ending in {}",
                        dependency,
                        crate::core::library::MANIFEST_SUFFIX
                    ),
                ));
            } else {
                self.context.resolve_local(dependency)
            };
            candidates.push(path);
        }

        let mut library_paths = Vec::new();
        for path in candidates {
            if library_paths.contains(&path) {
                continue;
            }
            if !path.exists() {
                tracing::debug!(
                    workflow = %workflow,
                    path = %path.display(),
                    "skipping missing library path"
                );
                continue;
            }
            library_paths.push(path);
        }
        Ok(library_paths)
    }

    /// Evaluate one workflow; evaluation failures become an invalid definition.
    pub async fn evaluate(
        &self,
        name: String,
        entry: &Path,
        package: &dyn Package,
    ) -> Result<Definition, AppError> {
        let info = package.path_info(entry)?;
        let destination = self.context.destination_for(&name);
        let library_paths = self.library_paths(&name, package).await?;

        tracing::debug!(workflow = %name, source = %info.description, "generating workflow");
        let definition = match self.backend.evaluate(entry, &library_paths).await {
            Ok(output) => Definition::generated(name, &info, destination, &output),
            Err(e) => {
                tracing::warn!(
                    workflow = %name,
                    error = %e.message.trim(),
                    "template evaluation failed"
                );
                Definition::failed(name, &info, destination, &e)
            }
        };
        Ok(definition)
    }

    /// Observable files: context workflow/libs trees and local dependencies.
    pub fn observable_sources(&self) -> Vec<PathBuf> {
        let mut sources = list_files(&self.context.workflows_dir(), |_| true);
        sources.extend(list_files(&self.context.libs_dir(), |_| true));
        for dependency in self.context.config.all_dependencies() {
            if paths::is_remote(&dependency) {
                continue;
            }
            let path = self.context.resolve_local(&dependency);
            if path.is_dir() {
                sources.extend(list_files(&path, |_| true));
            } else {
                sources.push(path);
            }
        }
        sources
    }

    /// Local manifest paths in config are relative to the working directory.
    fn manifest_reference(&self, dependency: &str) -> String {
        if paths::is_remote(dependency) {
            dependency.to_string()
        } else {
            self.context.resolve_local(dependency).display().to_string()
        }
    }
}

/// Every file under `root` accepted by `filter`, in sorted order. Missing roots yield nothing.
pub(crate) fn list_files(root: &Path, filter: impl Fn(&Path) -> bool) -> Vec<PathBuf> {
    if !root.is_dir() {
        return Vec::new();
    }
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(
                    root = %root.display(),
                    error = %e,
                    "skipping unreadable entry"
                );
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| filter(path))
        .collect()
}
