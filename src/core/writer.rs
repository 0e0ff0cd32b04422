#![allow(clippy::result_large_err)]

use crate::core::error::AppError;
use crate::core::types::WriteAction;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Result of materializing one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    pub action: WriteAction,
    pub path: PathBuf,
}

impl WriteOutcome {
    /// `true` for `create` and `update`.
    pub fn changed(&self) -> bool {
        self.action != WriteAction::Identical
    }
}

/// Idempotent file writer that classifies what each write did.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentWriter;

impl ContentWriter {
    pub fn new() -> Self {
        ContentWriter
    }

    /// Write `content` to `destination`, creating parent directories as needed.
    ///
    /// The file is rewritten even when identical.
    pub fn write(&self, destination: &Path, content: &[u8]) -> Result<WriteOutcome, AppError> {
        if let Some(parent) = destination.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| AppError::io("create", parent, e))?;
            }
        }

        let action = match fs::read(destination) {
            Ok(existing) if existing == content => WriteAction::Identical,
            Ok(_) => WriteAction::Update,
            Err(e) if e.kind() == ErrorKind::NotFound => WriteAction::Create,
            Err(e) => return Err(AppError::io("read", destination, e)),
        };

        fs::write(destination, content).map_err(|e| AppError::io("write", destination, e))?;
        tracing::debug!(path = %destination.display(), %action, "wrote file");

        Ok(WriteOutcome {
            action,
            path: destination.to_path_buf(),
        })
    }
}
