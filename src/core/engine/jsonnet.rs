#![allow(clippy::result_large_err)]

use super::{
    list_files, Definition, EngineCore, GeneratorManifest, TemplateBackend, TemplateEngine,
    TemplateVars,
};
use crate::core::context::Context;
use crate::core::error::AppError;
use crate::core::import;
use crate::core::library::LibraryResolver;
use crate::core::package::Package;
use crate::core::writer::ContentWriter;
use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const TEMPLATE_EXTENSION: &str = "jsonnet";

const SCAFFOLD: &[(&str, &str, &str)] = &[
    ("config.yml", "config.yml", CONFIG_TEMPLATE),
    (
        "workflows/workflow.jsonnet",
        "workflows/$WORKFLOW_NAME.jsonnet",
        WORKFLOW_TEMPLATE,
    ),
    ("libs/steps.libsonnet", "libs/steps.libsonnet", STEPS_TEMPLATE),
];

const CONFIG_TEMPLATE: &str = "\
githubDir: $GITHUB_DIR
templates:
  engine: jsonnet
";

const WORKFLOW_TEMPLATE: &str = "\
local steps = import 'steps.libsonnet';

local workflow = {
  name: '$WORKFLOW_NAME',
  on: {
    push: { branches: ['main'] },
    pull_request: {},
  },
  jobs: {
    check: {
      'runs-on': 'ubuntu-latest',
      steps: [
        steps.checkout,
        steps.check_workflows,
      ],
    },
  },
};

std.manifestYamlDoc(workflow)
";

const STEPS_TEMPLATE: &str = "\
{
  checkout: { uses: 'actions/checkout@v4' },
  check_workflows: {
    name: 'Check workflows are up to date',
    run: 'gflows check',
  },
}
";

/// Engine for `*.jsonnet` workflow templates.
pub struct JsonnetEngine {
    core: EngineCore,
    writer: ContentWriter,
}

impl JsonnetEngine {
    pub fn new(
        context: Arc<Context>,
        resolver: Arc<LibraryResolver>,
        backend: Arc<dyn TemplateBackend>,
    ) -> Self {
        JsonnetEngine {
            core: EngineCore {
                context,
                resolver,
                backend,
            },
            writer: ContentWriter::new(),
        }
    }

    /// Workflow templates served by one package, in traversal order.
    pub fn workflow_sources(package: &dyn Package) -> Vec<PathBuf> {
        list_files(&package.workflows_dir(), |path| {
            path.extension().and_then(|e| e.to_str()) == Some(TEMPLATE_EXTENSION)
        })
    }
}

#[async_trait]
impl TemplateEngine for JsonnetEngine {
    fn observable_sources(&self) -> Vec<PathBuf> {
        self.core.observable_sources()
    }

    async fn workflow_definitions(&self) -> Result<Vec<Definition>, AppError> {
        let mut definitions = Vec::new();
        for package in self.core.packages().await? {
            for source in Self::workflow_sources(package.as_ref()) {
                let name = workflow_name(&source);
                let definition = self.core.evaluate(name, &source, package.as_ref()).await?;
                definitions.push(definition);
            }
        }
        Ok(definitions)
    }

    async fn import_workflow(&self, existing_file: &Path) -> Result<PathBuf, AppError> {
        let content =
            fs::read_to_string(existing_file).map_err(|e| AppError::io("read", existing_file, e))?;
        let document = import::normalize(&content)
            .map_err(|e| e.with_context("path", existing_file.display().to_string()))?;
        let source = import::to_template_source(&document)?;

        let name = workflow_name(existing_file);
        let destination = self
            .core
            .context
            .workflows_dir()
            .join(format!("{}.{}", name, TEMPLATE_EXTENSION));
        let outcome = self.writer.write(&destination, source.as_bytes())?;
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

fn workflow_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_default()
}
