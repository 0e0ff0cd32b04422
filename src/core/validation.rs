#![allow(clippy::result_large_err)]

//! Schema and content drift checks for generated definitions.

use crate::core::context::Context;
use crate::core::engine::Definition;
use crate::core::error::AppError;
use crate::core::paths;
use crate::core::reader::ContentReader;
use crate::core::types::ErrorCategory;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Outcome of one check.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
    /// On-disk content when a content check found drift.
    pub actual_content: Option<String>,
    /// Set when the check was disabled; `valid` is still `true`.
    pub skip_reason: Option<String>,
}

impl ValidationResult {
    pub fn passed() -> Self {
        ValidationResult {
            valid: true,
            ..Default::default()
        }
    }

    pub fn failed(errors: Vec<String>) -> Self {
        ValidationResult {
            valid: false,
            errors,
            ..Default::default()
        }
    }

    pub fn skipped<T: Into<String>>(reason: T) -> Self {
        ValidationResult {
            valid: true,
            skip_reason: Some(reason.into()),
            ..Default::default()
        }
    }

    pub fn is_skipped(&self) -> bool {
        self.skip_reason.is_some()
    }
}

/// A compiled schema: document in, violation messages out.
pub trait SchemaValidator: Send + Sync {
    fn validate(&self, document: &Value) -> Vec<String>;
}

/// [`SchemaValidator`] backed by the `jsonschema` crate.
#[derive(Debug)]
pub struct JsonSchemaValidator {
    inner: jsonschema::Validator,
}

impl JsonSchemaValidator {
    pub fn new(schema: &Value) -> Result<Self, AppError> {
        let inner = jsonschema::validator_for(schema).map_err(|e| {
            AppError::new(ErrorCategory::SchemaError, format!("invalid schema: {}", e))
        })?;
        Ok(JsonSchemaValidator { inner })
    }
}

impl SchemaValidator for JsonSchemaValidator {
    fn validate(&self, document: &Value) -> Vec<String> {
        self.inner
            .iter_errors(document)
            .map(|error| {
                let path = error.instance_path.to_string();
                if path.is_empty() {
                    error.to_string()
                } else {
                    format!("{}: {}", path, error)
                }
            })
            .collect()
    }
}

/// Runs the schema and content checks for definitions of one run.
///
/// The default schema is loaded on construction; per-workflow overrides are loaded the
/// first time a workflow needs them and cached by URI.
pub struct Validator {
    context: Arc<Context>,
    reader: Arc<dyn ContentReader>,
    default_schema: Option<Arc<dyn SchemaValidator>>,
    overrides: Mutex<HashMap<String, Arc<dyn SchemaValidator>>>,
}

impl Validator {
    pub async fn new(
        context: Arc<Context>,
        reader: Arc<dyn ContentReader>,
    ) -> Result<Self, AppError> {
        let default_schema = if uses_default_schema(&context) {
            let uri = context.config.default_schema_uri().to_string();
            Some(load_schema(&context, reader.as_ref(), &uri).await?)
        } else {
            tracing::debug!("schema checks disabled, default schema not loaded");
            None
        };
        Ok(Validator {
            context,
            reader,
            default_schema,
            overrides: Mutex::new(HashMap::new()),
        })
    }

    /// Build a validator that fetches the default schema only when a schema check runs.
    pub fn lazy(context: Arc<Context>, reader: Arc<dyn ContentReader>) -> Self {
        Validator {
            context,
            reader,
            default_schema: None,
            overrides: Mutex::new(HashMap::new()),
        }
    }

    /// Build a validator around an already compiled default schema.
    pub fn with_schema(
        context: Arc<Context>,
        reader: Arc<dyn ContentReader>,
        default_schema: Arc<dyn SchemaValidator>,
    ) -> Self {
        Validator {
            context,
            reader,
            default_schema: Some(default_schema),
            overrides: Mutex::new(HashMap::new()),
        }
    }

    pub async fn validate_schema(
        &self,
        definition: &Definition,
    ) -> Result<ValidationResult, AppError> {
        let name = &definition.name;
        if !self.context.config.schema_enabled(name) {
            return Ok(ValidationResult::skipped(format!(
                "schema check disabled for \"{}\"",
                name
            )));
        }
        let Some(document) = &definition.document else {
            return Ok(ValidationResult::failed(definition.status.errors.clone()));
        };

        let schema = self.schema_for(name).await?;
        let errors = schema.validate(document);
        if errors.is_empty() {
            Ok(ValidationResult::passed())
        } else {
            Ok(ValidationResult::failed(errors))
        }
    }

    pub fn validate_content(&self, definition: &Definition) -> Result<ValidationResult, AppError> {
        let name = &definition.name;
        if !self.context.config.content_enabled(name) {
            return Ok(ValidationResult::skipped(format!(
                "content check disabled for \"{}\"",
                name
            )));
        }

        let destination = &definition.destination;
        let display = self.context.display_path(destination);
        let actual = match fs::read(destination) {
            Ok(actual) => actual,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok(ValidationResult::failed(vec![format!(
                    "Workflow missing for \"{}\" (expected workflow at {})",
                    name, display
                )]));
            }
            Err(e) => return Err(AppError::io("read", destination, e)),
        };

        if actual == definition.content.as_bytes() {
            return Ok(ValidationResult::passed());
        }
        let mut result = ValidationResult::failed(vec![format!(
            "Workflow out of date for \"{}\" (run gflows update to regenerate {})",
            name, display
        )]);
        result.actual_content = Some(String::from_utf8_lossy(&actual).into_owned());
        Ok(result)
    }

    async fn schema_for(&self, workflow: &str) -> Result<Arc<dyn SchemaValidator>, AppError> {
        match (self.context.config.schema_override(workflow), &self.default_schema) {
            (Some(uri), _) => self.cached_schema(uri).await,
            (None, Some(schema)) => Ok(Arc::clone(schema)),
            (None, None) => {
                let uri = self.context.config.default_schema_uri().to_string();
                self.cached_schema(&uri).await
            }
        }
    }

    async fn cached_schema(&self, uri: &str) -> Result<Arc<dyn SchemaValidator>, AppError> {
        let mut overrides = self.overrides.lock().await;
        if let Some(schema) = overrides.get(uri) {
            return Ok(Arc::clone(schema));
        }
        let schema = load_schema(&self.context, self.reader.as_ref(), uri).await?;
        overrides.insert(uri.to_string(), Arc::clone(&schema));
        Ok(schema)
    }
}

/// `true` unless schema checks are off by default and no configured workflow turns them
/// back on without its own schema.
fn uses_default_schema(context: &Context) -> bool {
    let config = &context.config;
    if config.defaults.checks.schema.enabled != Some(false) {
        return true;
    }
    config
        .workflows
        .keys()
        .any(|name| config.schema_enabled(name) && config.schema_override(name).is_none())
}

async fn load_schema(
    context: &Context,
    reader: &dyn ContentReader,
    uri: &str,
) -> Result<Arc<dyn SchemaValidator>, AppError> {
    let location = if paths::is_remote(uri) {
        uri.to_string()
    } else {
        context.resolve_local(uri).display().to_string()
    };
    tracing::debug!(schema = %location, "loading schema");

    let content = reader
        .read_to_string(&location)
        .await
        .map_err(|e| e.with_context("schema", uri))?;
    let schema: Value = serde_json::from_str(&content).map_err(|e| {
        AppError::with_source(
            ErrorCategory::SchemaError,
            format!("schema {} is not valid JSON: {}", uri, e),
            e,
        )
    })?;
    let validator = JsonSchemaValidator::new(&schema).map_err(|e| e.with_context("schema", uri))?;
    Ok(Arc::new(validator))
}
