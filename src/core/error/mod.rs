use crate::core::types::{ErrorCategory, ErrorSeverity};
use std::collections::BTreeMap;
use std::path::Path;

/// Fatal error raised by library resolution, file writes, configuration and schema loading.
///
/// Per-workflow problems (template evaluation, schema or content drift) are not
/// `AppError`s; they are recorded on the definition or validation result instead.
#[derive(Debug)]
pub struct AppError {
    pub category: ErrorCategory,
    pub severity: ErrorSeverity,
    pub code: String,
    pub message: String,
    pub context: BTreeMap<String, String>,
    pub source: Option<anyhow::Error>,
}

impl AppError {
    pub fn new<T: Into<String>>(category: ErrorCategory, message: T) -> Self {
        let severity = match category {
            ErrorCategory::ConfigError => ErrorSeverity::Fatal,
            ErrorCategory::ResolutionError
            | ErrorCategory::NetworkError
            | ErrorCategory::IoError
            | ErrorCategory::SchemaError
            | ErrorCategory::SerializationError => ErrorSeverity::Error,
        };
        let code = match category {
            ErrorCategory::ConfigError => "GFL-CFG",
            ErrorCategory::ResolutionError => "GFL-LIB",
            ErrorCategory::NetworkError => "GFL-NET",
            ErrorCategory::IoError => "GFL-IO",
            ErrorCategory::SchemaError => "GFL-SCH",
            ErrorCategory::SerializationError => "GFL-SER",
        };
        AppError {
            category,
            severity,
            code: code.to_string(),
            message: message.into(),
            context: BTreeMap::new(),
            source: None,
        }
    }

    pub fn with_source<T: Into<String>>(
        category: ErrorCategory,
        message: T,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        let mut error = AppError::new(category, message);
        error.source = Some(source.into());
        error
    }

    /// Shorthand for an I/O failure against a specific path.
    pub fn io(action: &str, path: &Path, source: std::io::Error) -> Self {
        AppError::with_source(
            ErrorCategory::IoError,
            format!("failed to {} {}: {}", action, path.display(), source),
            source,
        )
        .with_context("path", path.display().to_string())
    }

    pub fn with_context<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn severity(&self) -> ErrorSeverity {
        self.severity
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| &**e as &(dyn std::error::Error + 'static))
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::with_source(ErrorCategory::IoError, e.to_string(), e)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::with_source(ErrorCategory::SerializationError, e.to_string(), e)
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(e: serde_yaml::Error) -> Self {
        AppError::with_source(ErrorCategory::SerializationError, e.to_string(), e)
    }
}
