use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// Evaluation failure reported by a templating backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct BackendError {
    pub message: String,
}

impl BackendError {
    pub fn new<T: Into<String>>(message: T) -> Self {
        BackendError {
            message: message.into(),
        }
    }
}

/// Black-box template evaluator: entry file (or directory) plus library search paths in,
/// rendered text out.
#[async_trait]
pub trait TemplateBackend: Send + Sync {
    async fn evaluate(
        &self,
        entry: &Path,
        library_paths: &[PathBuf],
    ) -> Result<String, BackendError>;
}

/// Backend that shells out to an evaluator binary.
#[derive(Debug, Clone)]
pub struct CommandBackend {
    program: String,
    leading_args: Vec<String>,
    library_flag: String,
    entry_flag: Option<String>,
}

impl CommandBackend {
    /// `jsonnet -S [-J lib]... <entry>`; `-S` emits the manifested string verbatim.
    pub fn jsonnet() -> Self {
        CommandBackend {
            program: "jsonnet".to_string(),
            leading_args: vec!["-S".to_string()],
            library_flag: "-J".to_string(),
            entry_flag: None,
        }
    }

    /// `ytt [-f lib]... -f <entry>`
    pub fn ytt() -> Self {
        CommandBackend {
            program: "ytt".to_string(),
            leading_args: Vec::new(),
            library_flag: "-f".to_string(),
            entry_flag: Some("-f".to_string()),
        }
    }

    pub fn with_program<T: Into<String>>(mut self, program: T) -> Self {
        self.program = program.into();
        self
    }

    pub fn args(&self, entry: &Path, library_paths: &[PathBuf]) -> Vec<String> {
        let mut args = self.leading_args.clone();
        for library in library_paths {
            args.push(self.library_flag.clone());
            args.push(library.display().to_string());
        }
        if let Some(flag) = &self.entry_flag {
            args.push(flag.clone());
        }
        args.push(entry.display().to_string());
        args
    }
}

#[async_trait]
impl TemplateBackend for CommandBackend {
    async fn evaluate(
        &self,
        entry: &Path,
        library_paths: &[PathBuf],
    ) -> Result<String, BackendError> {
        let args = self.args(entry, library_paths);
        tracing::debug!(program = %self.program, args = ?args, "evaluating template");

        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| BackendError::new(format!("failed to run {}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = if stderr.trim().is_empty() {
                format!("{} exited with {}", self.program, output.status)
            } else {
                stderr.to_string()
            };
            return Err(BackendError::new(message));
        }

        String::from_utf8(output.stdout)
            .map_err(|_| BackendError::new(format!("{} produced non UTF-8 output", self.program)))
    }
}
