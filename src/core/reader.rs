use crate::core::error::AppError;
use crate::core::paths;
use crate::core::types::ErrorCategory;
use async_trait::async_trait;
use std::path::PathBuf;

/// Failure modes when reading a local file or fetching a remote one.
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("request to {url} returned status {status}")]
    Status { url: String, status: u16 },
}

impl ReadError {
    /// HTTP status code for non-2xx responses.
    pub fn status(&self) -> Option<u16> {
        match self {
            ReadError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<ReadError> for AppError {
    fn from(e: ReadError) -> Self {
        let category = match e {
            ReadError::Io { .. } => ErrorCategory::IoError,
            ReadError::Request { .. } | ReadError::Status { .. } => ErrorCategory::NetworkError,
        };
        let status = e.status();
        let mut error = AppError::with_source(category, e.to_string(), e);
        if let Some(status) = status {
            error = error.with_context("status", status.to_string());
        }
        error
    }
}

/// Reads content by path, dispatching to the filesystem or HTTP based on the path kind.
#[async_trait]
pub trait ContentReader: Send + Sync {
    async fn read(&self, path: &str) -> Result<Vec<u8>, ReadError>;

    async fn read_to_string(&self, path: &str) -> Result<String, AppError> {
        let bytes = self.read(path).await?;
        String::from_utf8(bytes).map_err(|e| {
            AppError::with_source(
                ErrorCategory::SerializationError,
                format!("{} is not valid UTF-8", path),
                e,
            )
        })
    }
}

/// Default reader backed by `tokio::fs` and a shared `reqwest` client.
#[derive(Clone, Default)]
pub struct DefaultContentReader {
    http: reqwest::Client,
}

impl DefaultContentReader {
    pub fn new() -> Self {
        DefaultContentReader {
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ContentReader for DefaultContentReader {
    async fn read(&self, path: &str) -> Result<Vec<u8>, ReadError> {
        if !paths::is_remote(path) {
            tracing::debug!(path, "reading local file");
            return tokio::fs::read(path).await.map_err(|source| ReadError::Io {
                path: PathBuf::from(path),
                source,
            });
        }

        tracing::debug!(url = path, "fetching remote file");
        let request_error = |source| ReadError::Request {
            url: path.to_string(),
            source,
        };
        let response = self.http.get(path).send().await.map_err(request_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ReadError::Status {
                url: path.to_string(),
                status: status.as_u16(),
            });
        }
        let body = response.bytes().await.map_err(request_error)?;
        Ok(body.to_vec())
    }
}
