use async_trait::async_trait;
use gflows::core::engine::{BackendError, GENERATED_HEADER};
use gflows::core::types::ErrorCategory;
use gflows::core::{
    create_engine, Context, DefaultContentReader, GflowsConfig, LibraryResolver, TemplateBackend,
    TemplateEngine,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Treats template files as already-rendered YAML; files starting with `error:` fail.
#[derive(Default)]
struct RecordingBackend {
    calls: Mutex<Vec<(PathBuf, Vec<PathBuf>)>>,
}

impl RecordingBackend {
    fn library_paths_for(&self, entry_name: &str) -> Vec<PathBuf> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .find(|(entry, _)| entry.ends_with(entry_name))
            .map(|(_, libs)| libs.clone())
            .unwrap()
    }
}

#[async_trait]
impl TemplateBackend for RecordingBackend {
    async fn evaluate(
        &self,
        entry: &Path,
        library_paths: &[PathBuf],
    ) -> Result<String, BackendError> {
        self.calls
            .lock()
            .unwrap()
            .push((entry.to_path_buf(), library_paths.to_vec()));

        let source = if entry.is_dir() {
            entry.join("config.yml")
        } else {
            entry.to_path_buf()
        };
        let content = fs::read_to_string(&source).map_err(|e| BackendError::new(e.to_string()))?;
        match content.strip_prefix("error:") {
            Some(message) => Err(BackendError::new(format!("RUNTIME ERROR:{}", message))),
            None => Ok(content),
        }
    }
}

struct Fixture {
    root: TempDir,
    temp_root: TempDir,
}

impl Fixture {
    fn new(config: &str) -> Self {
        let root = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join(".gflows/workflows")).unwrap();
        fs::create_dir_all(root.path().join(".gflows/libs")).unwrap();
        fs::write(root.path().join(".gflows/config.yml"), config).unwrap();
        Fixture {
            root,
            temp_root: TempDir::new().unwrap(),
        }
    }

    fn path(&self, relative: &str) -> PathBuf {
        self.root.path().join(relative)
    }

    fn write(&self, relative: &str, content: &str) {
        let path = self.path(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn engine(
        &self,
        backend: Arc<RecordingBackend>,
    ) -> (Box<dyn TemplateEngine>, Arc<LibraryResolver>) {
        let config_path = self.path(".gflows/config.yml");
        let config: GflowsConfig =
            serde_yaml::from_str(&fs::read_to_string(&config_path).unwrap()).unwrap_or_default();
        let context = Arc::new(
            Context::from_config(self.root.path().to_path_buf(), config_path, config, false)
                .unwrap(),
        );
        let resolver = Arc::new(LibraryResolver::with_temp_root(
            Arc::new(DefaultContentReader::new()),
            self.temp_root.path().to_path_buf(),
        ));
        let engine = create_engine(context, Arc::clone(&resolver), Some(backend));
        (engine, resolver)
    }
}

#[tokio::test]
async fn test_definitions_carry_provenance_and_destination() {
    let fixture = Fixture::new("githubDir: .github\n");
    fixture.write(".gflows/workflows/test.jsonnet", "name: test\njobs: {}\n");

    let backend = Arc::new(RecordingBackend::default());
    let (engine, _) = fixture.engine(Arc::clone(&backend));
    let definitions = engine.workflow_definitions().await.unwrap();

    assert_eq!(definitions.len(), 1);
    let definition = &definitions[0];
    assert_eq!(definition.name, "test");
    assert_eq!(definition.source, ".gflows/workflows/test.jsonnet");
    assert_eq!(definition.destination, fixture.path(".github/workflows/test.yml"));
    assert_eq!(
        definition.content,
        format!(
            "{}\n# Source: .gflows/workflows/test.jsonnet\nname: test\njobs: {{}}\n",
            GENERATED_HEADER
        )
    );
    assert!(definition.status.valid);
    assert_eq!(definition.document.as_ref().unwrap()["name"], "test");
}

#[tokio::test]
async fn test_broken_template_does_not_block_others() {
    let fixture = Fixture::new("");
    fixture.write(".gflows/workflows/a.jsonnet", "name: a\n");
    fixture.write(".gflows/workflows/b.jsonnet", "error: unknown variable 'steps'\n");
    fixture.write(".gflows/workflows/c.jsonnet", "name: c\n");

    let (engine, _) = fixture.engine(Arc::new(RecordingBackend::default()));
    let definitions = engine.workflow_definitions().await.unwrap();

    let names: Vec<_> = definitions.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["a", "b", "c"]);
    assert!(definitions[0].status.valid);
    assert!(!definitions[1].status.valid);
    assert_eq!(
        definitions[1].status.errors,
        vec!["RUNTIME ERROR: unknown variable 'steps'"]
    );
    assert!(definitions[1].content.is_empty());
    assert!(definitions[2].status.valid);
}

#[tokio::test]
async fn test_non_yaml_output_is_invalid_definition() {
    let fixture = Fixture::new("");
    fixture.write(".gflows/workflows/bad.jsonnet", "name: [unclosed\n");

    let (engine, _) = fixture.engine(Arc::new(RecordingBackend::default()));
    let definitions = engine.workflow_definitions().await.unwrap();

    assert!(!definitions[0].status.valid);
    assert!(definitions[0].status.errors[0].starts_with("generated output is not valid YAML"));
}

#[tokio::test]
async fn test_library_workflows_follow_local_ones() {
    let fixture = Fixture::new(
        "templates:\n  defaults:\n    dependencies:\n      - vendor/shared.gflowslib\n      - vendor/plain\n",
    );
    fixture.write(".gflows/workflows/local.jsonnet", "name: local\n");
    fixture.write("vendor/workflows/shared.jsonnet", "name: shared\n");
    fixture.write("vendor/libs/steps.libsonnet", "{}\n");
    fixture.write(
        "vendor/shared.gflowslib",
        r#"{"files":["workflows/shared.jsonnet","libs/steps.libsonnet"]}"#,
    );
    fs::create_dir_all(fixture.path("vendor/plain")).unwrap();

    let backend = Arc::new(RecordingBackend::default());
    let (engine, resolver) = fixture.engine(Arc::clone(&backend));
    let definitions = engine.workflow_definitions().await.unwrap();

    let names: Vec<_> = definitions.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["local", "shared"]);
    let manifest = fixture.path("vendor/shared.gflowslib").display().to_string();
    assert_eq!(
        definitions[1].source,
        format!(
            "{} (from {})",
            fixture.path("vendor/workflows/shared.jsonnet").display(),
            manifest
        )
    );
    assert_eq!(
        definitions[1].destination,
        fixture.path(".github/workflows/shared.yml")
    );

    let libraries = resolver.libraries().await;
    assert_eq!(libraries.len(), 1);
    let library_libs = libraries[0].local_dir.join("libs");

    assert_eq!(
        backend.library_paths_for("local.jsonnet"),
        vec![
            fixture.path(".gflows/libs"),
            library_libs.clone(),
            fixture.path("vendor/plain"),
        ]
    );
    assert_eq!(
        backend.library_paths_for("shared.jsonnet"),
        vec![
            library_libs,
            fixture.path(".gflows/libs"),
            fixture.path("vendor/plain"),
        ]
    );
}

#[tokio::test]
async fn test_remote_dependency_must_be_manifest() {
    let fixture = Fixture::new(
        "templates:\n  defaults:\n    dependencies:\n      - https://example.com/libs/steps\n",
    );
    fixture.write(".gflows/workflows/test.jsonnet", "name: test\n");

    let (engine, _) = fixture.engine(Arc::new(RecordingBackend::default()));
    let err = engine.workflow_definitions().await.unwrap_err();
    assert_eq!(err.category, ErrorCategory::ConfigError);
    assert!(err.message.contains("must be a library manifest"));
}

#[tokio::test]
async fn test_ytt_workflows_are_directories() {
    let fixture = Fixture::new("templates:\n  engine: ytt\n");
    fixture.write(".gflows/workflows/build/config.yml", "name: build\n");
    fixture.write(".gflows/workflows/deploy/config.yml", "name: deploy\n");
    fixture.write(".gflows/workflows/stray.yml", "name: stray\n");
    fs::create_dir_all(fixture.path(".gflows/workflows/empty")).unwrap();

    let backend = Arc::new(RecordingBackend::default());
    let (engine, _) = fixture.engine(Arc::clone(&backend));
    let definitions = engine.workflow_definitions().await.unwrap();

    let names: Vec<_> = definitions.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["build", "deploy"]);
    assert_eq!(definitions[0].source, ".gflows/workflows/build");
    assert!(definitions[1].content.ends_with("name: deploy\n"));
}

#[tokio::test]
async fn test_observable_sources_include_local_dependencies() {
    let fixture =
        Fixture::new("templates:\n  defaults:\n    libs:\n      - vendor/steps.libsonnet\n");
    fixture.write(".gflows/workflows/test.jsonnet", "name: test\n");
    fixture.write(".gflows/libs/common.libsonnet", "{}\n");
    fixture.write("vendor/steps.libsonnet", "{}\n");

    let (engine, _) = fixture.engine(Arc::new(RecordingBackend::default()));
    let sources = engine.observable_sources();

    assert_eq!(
        sources,
        vec![
            fixture.path(".gflows/workflows/test.jsonnet"),
            fixture.path(".gflows/libs/common.libsonnet"),
            fixture.path("vendor/steps.libsonnet"),
        ]
    );
}
