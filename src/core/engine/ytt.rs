#![allow(clippy::result_large_err)]

use super::{
    list_files, strip_provenance_header, Definition, EngineCore, GeneratorManifest,
    TemplateBackend, TemplateEngine, TemplateVars,
};
use crate::core::context::Context;
use crate::core::error::AppError;
use crate::core::library::LibraryResolver;
use crate::core::package::Package;
use crate::core::writer::ContentWriter;
use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const SCAFFOLD: &[(&str, &str, &str)] = &[
    ("config.yml", "config.yml", CONFIG_TEMPLATE),
    (
        "workflows/workflow/config.yml",
        "workflows/$WORKFLOW_NAME/config.yml",
        WORKFLOW_TEMPLATE,
    ),
    ("libs/steps.lib.yml", "libs/steps.lib.yml", STEPS_TEMPLATE),
];

const CONFIG_TEMPLATE: &str = "\
githubDir: $GITHUB_DIR
templates:
  engine: ytt
";

const WORKFLOW_TEMPLATE: &str = "\
#@ load(\"steps.lib.yml\", \"checkout\", \"check_workflows\")
name: $WORKFLOW_NAME
on:
  push:
    branches: [main]
  pull_request: {}
jobs:
  check:
    runs-on: ubuntu-latest
    steps:
    - #@ checkout()
    - #@ check_workflows()
";

const STEPS_TEMPLATE: &str = "\
#@ def checkout():
uses: actions/checkout@v4
#@ end

#@ def check_workflows():
name: Check workflows are up to date
run: gflows check
#@ end
";

/// Engine for ytt workflows: each subdirectory of a workflows dir is one workflow.
pub struct YttEngine {
    core: EngineCore,
    writer: ContentWriter,
}

impl YttEngine {
    pub fn new(
        context: Arc<Context>,
        resolver: Arc<LibraryResolver>,
        backend: Arc<dyn TemplateBackend>,
    ) -> Self {
        YttEngine {
            core: EngineCore {
                context,
                resolver,
                backend,
            },
            writer: ContentWriter::new(),
        }
    }

    /// Workflow directories served by one package, sorted by name.
    pub fn workflow_dirs(package: &dyn Package) -> Result<Vec<PathBuf>, AppError> {
        let root = package.workflows_dir();
        if !root.is_dir() {
            return Ok(Vec::new());
        }
        let mut dirs = Vec::new();
        for entry in fs::read_dir(&root).map_err(|e| AppError::io("list", &root, e))? {
            let path = entry.map_err(|e| AppError::io("list", &root, e))?.path();
            if path.is_dir() {
                dirs.push(path);
            }
        }
        dirs.sort();
        Ok(dirs)
    }
}

#[async_trait]
impl TemplateEngine for YttEngine {
    fn observable_sources(&self) -> Vec<PathBuf> {
        self.core.observable_sources()
    }

    async fn workflow_definitions(&self) -> Result<Vec<Definition>, AppError> {
        let mut definitions = Vec::new();
        for package in self.core.packages().await? {
            for dir in Self::workflow_dirs(package.as_ref())? {
                if list_files(&dir, |_| true).is_empty() {
                    tracing::debug!(dir = %dir.display(), "skipping empty workflow directory");
                    continue;
                }
                let name = dir_name(&dir);
                definitions.push(self.core.evaluate(name, &dir, package.as_ref()).await?);
            }
        }
        Ok(definitions)
    }

    async fn import_workflow(&self, existing_file: &Path) -> Result<PathBuf, AppError> {
        let content =
            fs::read_to_string(existing_file).map_err(|e| AppError::io("read", existing_file, e))?;
        let body = strip_provenance_header(&content);

        let name = existing_file
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_default();
        let destination = self
            .core
            .context
            .workflows_dir()
            .join(&name)
            .join(format!("{}.yml", name));
        let outcome = self.writer.write(&destination, body.as_bytes())?;
        tracing::info!(
            workflow = %name,
            path = %outcome.path.display(),
            action = %outcome.action,
            "imported workflow"
        );
        Ok(outcome.path)
    }

    fn generator_manifest(&self, vars: &TemplateVars) -> GeneratorManifest {
        GeneratorManifest::from_templates(&self.core.context.dir, SCAFFOLD, vars)
    }
}

fn dir_name(dir: &Path) -> String {
    dir.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default()
}
