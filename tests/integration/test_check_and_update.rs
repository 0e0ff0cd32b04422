use async_trait::async_trait;
use gflows::core::engine::BackendError;
use gflows::core::types::WriteAction;
use gflows::core::{
    create_engine, Context, ContentReader, DefaultContentReader, GflowsConfig, JsonSchemaValidator,
    LibraryResolver, TemplateBackend, Validator, WorkflowManager,
};
use serde_json::json;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Returns the template file verbatim.
struct PassthroughBackend;

#[async_trait]
impl TemplateBackend for PassthroughBackend {
    async fn evaluate(
        &self,
        entry: &Path,
        _library_paths: &[PathBuf],
    ) -> Result<String, BackendError> {
        fs::read_to_string(entry).map_err(|e| BackendError::new(e.to_string()))
    }
}

/// Cloneable in-memory sink for manager output.
#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    fn take(&self) -> String {
        let mut buffer = self.0.lock().unwrap();
        let text = String::from_utf8(buffer.clone()).unwrap();
        buffer.clear();
        text
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

const SCHEMA_DISABLED: &str = "defaults:\n  checks:\n    schema:\n      enabled: false\n";

fn context(root: &Path, config: &str) -> Arc<Context> {
    let config: GflowsConfig = serde_yaml::from_str(config).unwrap_or_default();
    Arc::new(
        Context::from_config(
            root.to_path_buf(),
            root.join(".gflows/config.yml"),
            config,
            false,
        )
        .unwrap(),
    )
}

fn manager(context: Arc<Context>, validator: Validator, out: &SharedBuffer) -> WorkflowManager {
    let resolver = Arc::new(LibraryResolver::new(Arc::new(DefaultContentReader::new())));
    let engine = create_engine(
        Arc::clone(&context),
        resolver,
        Some(Arc::new(PassthroughBackend)),
    );
    WorkflowManager::new(context, engine, validator).with_output(Box::new(out.clone()))
}

fn write_template(root: &Path, name: &str, content: &str) {
    let path = root.join(format!(".gflows/workflows/{}.jsonnet", name));
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

#[tokio::test]
async fn test_check_update_lifecycle() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write_template(root, "test", "name: test\non: push\n");

    let context = context(root, SCHEMA_DISABLED);
    let reader: Arc<dyn ContentReader> = Arc::new(DefaultContentReader::new());
    let validator = Validator::new(Arc::clone(&context), reader).await.unwrap();
    let out = SharedBuffer::default();
    let mut manager = manager(context, validator, &out);

    let summary = manager.validate(false).await.unwrap();
    assert!(!summary.is_valid());
    assert_eq!(summary.failed, vec!["test"]);
    assert_eq!(
        out.take(),
        "checking test ... FAILED\n  Workflow missing for \"test\" (expected workflow at .github/workflows/test.yml)\n"
    );

    let update = manager.update().await.unwrap();
    assert_eq!(update.written[0].action, WriteAction::Create);
    assert_eq!(out.take(), "   create .github/workflows/test.yml\n");
    let written = fs::read_to_string(root.join(".github/workflows/test.yml")).unwrap();
    assert!(written.starts_with("# File generated by gflows, do not modify\n"));
    assert!(written.ends_with("name: test\non: push\n"));

    let summary = manager.validate(false).await.unwrap();
    assert!(summary.is_valid());
    assert_eq!(out.take(), "checking test ... OK (schema check skipped)\n");

    let update = manager.update().await.unwrap();
    assert_eq!(update.written[0].action, WriteAction::Identical);
    assert_eq!(update.changed(), 0);
    assert_eq!(out.take(), "identical .github/workflows/test.yml\n");
}

#[tokio::test]
async fn test_drift_is_reported_with_diff() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write_template(root, "test", "name: test\non: push\n");

    let context = context(root, SCHEMA_DISABLED);
    let reader: Arc<dyn ContentReader> = Arc::new(DefaultContentReader::new());
    let validator = Validator::new(Arc::clone(&context), reader).await.unwrap();
    let out = SharedBuffer::default();
    let mut manager = manager(context, validator, &out);

    manager.update().await.unwrap();
    write_template(root, "test", "name: test\non: pull_request\n");
    out.take();

    let summary = manager.validate(true).await.unwrap();
    assert!(!summary.is_valid());
    let report = out.take();
    assert!(report.starts_with("checking test ... FAILED\n"));
    assert!(report.contains(
        "  Workflow out of date for \"test\" (run gflows update to regenerate .github/workflows/test.yml)\n"
    ));
    assert!(report.contains("  --- .github/workflows/test.yml (committed)\n"));
    assert!(report.contains("  -on: push\n"));
    assert!(report.contains("  +on: pull_request\n"));

    let update = manager.update().await.unwrap();
    assert_eq!(update.written[0].action, WriteAction::Update);
    assert!(manager.validate(false).await.unwrap().is_valid());
}

#[tokio::test]
async fn test_update_skips_schema_invalid_workflows() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write_template(root, "good", "name: good\njobs: {}\n");
    write_template(root, "bad", "name: bad\n");

    let context = context(root, "");
    let schema = JsonSchemaValidator::new(&json!({
        "type": "object",
        "required": ["jobs"]
    }))
    .unwrap();
    let validator = Validator::with_schema(
        Arc::clone(&context),
        Arc::new(DefaultContentReader::new()),
        Arc::new(schema),
    );
    let out = SharedBuffer::default();
    let mut manager = manager(context, validator, &out);

    let update = manager.update().await.unwrap();
    assert_eq!(update.failed, vec!["bad"]);
    assert_eq!(update.written.len(), 1);
    assert!(!root.join(".github/workflows/bad.yml").exists());
    assert!(root.join(".github/workflows/good.yml").exists());

    let report = out.take();
    assert!(report.contains("    error bad\n"));
    assert!(report.contains("\"jobs\" is a required property"));

    let summary = manager.validate(false).await.unwrap();
    assert_eq!(summary.checked, 2);
    assert_eq!(summary.failed, vec!["bad"]);
}

#[tokio::test]
async fn test_content_check_can_be_disabled_per_workflow() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write_template(root, "local", "name: local\n");

    let config = format!(
        "{}workflows:\n  local:\n    checks:\n      content:\n        enabled: false\n",
        SCHEMA_DISABLED
    );
    let context = context(root, &config);
    let reader: Arc<dyn ContentReader> = Arc::new(DefaultContentReader::new());
    let validator = Validator::new(Arc::clone(&context), reader).await.unwrap();
    let out = SharedBuffer::default();
    let mut manager = manager(context, validator, &out);

    assert!(manager.validate(false).await.unwrap().is_valid());
    assert_eq!(
        out.take(),
        "checking local ... OK (schema check skipped, content check skipped)\n"
    );
}

#[tokio::test]
async fn test_list_reports_status() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write_template(root, "fresh", "name: fresh\n");
    write_template(root, "missing", "name: missing\n");

    let context = context(root, SCHEMA_DISABLED);
    let reader: Arc<dyn ContentReader> = Arc::new(DefaultContentReader::new());
    let validator = Validator::new(Arc::clone(&context), reader).await.unwrap();
    let out = SharedBuffer::default();
    let mut manager = manager(context, validator, &out);

    manager.update().await.unwrap();
    fs::remove_file(root.join(".github/workflows/missing.yml")).unwrap();
    out.take();

    manager.list().await.unwrap();
    let table = out.take();
    let lines: Vec<_> = table.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("NAME"));
    assert!(lines[1].starts_with("fresh") && lines[1].ends_with("up to date"));
    assert!(lines[2].starts_with("missing") && lines[2].ends_with("missing"));
}

fn gflows(dir: &Path) -> Command {
    let mut command = Command::new(assert_cmd::cargo::cargo_bin!("gflows"));
    command
        .current_dir(dir)
        .env("NO_COLOR", "1")
        .env_remove("GFLOWS_CONFIG")
        .env_remove("GFLOWS_ENGINE")
        .env_remove("GFLOWS_GITHUB_DIR")
        .env_remove("RUST_LOG");
    command
}

#[test]
fn test_check_without_workflows_succeeds() {
    let temp_dir = TempDir::new().unwrap();
    fs::create_dir_all(temp_dir.path().join(".gflows")).unwrap();
    fs::write(temp_dir.path().join(".gflows/config.yml"), SCHEMA_DISABLED).unwrap();

    let output = gflows(temp_dir.path()).arg("check").output().unwrap();
    assert_eq!(output.status.code(), Some(0));
    let stdout = std::str::from_utf8(&output.stdout).unwrap();
    assert!(stdout.contains("no workflows found in .gflows"));
}

#[test]
fn test_failed_workflow_exits_with_one() {
    let temp_dir = TempDir::new().unwrap();
    fs::create_dir_all(temp_dir.path().join(".gflows")).unwrap();
    fs::write(temp_dir.path().join(".gflows/config.yml"), SCHEMA_DISABLED).unwrap();
    write_template(temp_dir.path(), "test", "{ name: 'test' }\n");

    let output = gflows(temp_dir.path()).arg("check").output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    let stdout = std::str::from_utf8(&output.stdout).unwrap();
    assert!(stdout.contains("checking test ... FAILED"));
}

#[test]
fn test_configuration_error_exits_with_two() {
    let temp_dir = TempDir::new().unwrap();
    fs::create_dir_all(temp_dir.path().join(".gflows")).unwrap();
    fs::write(
        temp_dir.path().join(".gflows/config.yml"),
        "templates:\n  engine: mustache\n",
    )
    .unwrap();

    let output = gflows(temp_dir.path()).arg("check").output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    let stderr = std::str::from_utf8(&output.stderr).unwrap();
    assert!(stderr.contains("unknown template engine 'mustache'"));
}

const UNREACHABLE_SCHEMA: &str =
    "defaults:\n  checks:\n    schema:\n      uri: http://127.0.0.1:9/github-workflow.json\n";

#[test]
fn test_import_does_not_fetch_schema() {
    let temp_dir = TempDir::new().unwrap();
    fs::create_dir_all(temp_dir.path().join(".gflows")).unwrap();
    fs::write(temp_dir.path().join(".gflows/config.yml"), UNREACHABLE_SCHEMA).unwrap();
    fs::create_dir_all(temp_dir.path().join(".github/workflows")).unwrap();
    fs::write(
        temp_dir.path().join(".github/workflows/ci.yml"),
        "name: ci\njobs:\n  test:\n    runs-on: ubuntu-latest\n",
    )
    .unwrap();

    let output = gflows(temp_dir.path()).arg("import").output().unwrap();
    assert_eq!(
        output.status.code(),
        Some(0),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(temp_dir.path().join(".gflows/workflows/ci.jsonnet").is_file());
}

#[test]
fn test_ls_does_not_fetch_schema() {
    let temp_dir = TempDir::new().unwrap();
    fs::create_dir_all(temp_dir.path().join(".gflows")).unwrap();
    fs::write(temp_dir.path().join(".gflows/config.yml"), UNREACHABLE_SCHEMA).unwrap();

    let output = gflows(temp_dir.path()).arg("ls").output().unwrap();
    assert_eq!(
        output.status.code(),
        Some(0),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(std::str::from_utf8(&output.stdout).unwrap().starts_with("NAME"));
}

#[test]
fn test_check_fails_fast_on_unreachable_schema() {
    let temp_dir = TempDir::new().unwrap();
    fs::create_dir_all(temp_dir.path().join(".gflows")).unwrap();
    fs::write(temp_dir.path().join(".gflows/config.yml"), UNREACHABLE_SCHEMA).unwrap();

    let output = gflows(temp_dir.path()).arg("check").output().unwrap();
    assert_eq!(output.status.code(), Some(2));
}
