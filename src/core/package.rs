use crate::core::error::AppError;
use std::path::{Path, PathBuf};

/// Where a discovered local file originally came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathInfo {
    /// File on the local filesystem that the engine evaluates.
    pub local_path: PathBuf,
    /// Canonical identity of the file: a local path or a URL.
    pub source_path: String,
    /// Human-readable origin used in provenance headers and reports.
    pub description: String,
}

/// A place from which workflow sources and shared libraries are served.
///
/// Implemented by the local [`Context`](crate::core::context::Context) and by every
/// resolved [`Library`](crate::core::library::Library).
pub trait Package: Send + Sync {
    fn workflows_dir(&self) -> PathBuf;

    fn libs_dir(&self) -> PathBuf;

    fn path_info(&self, local_path: &Path) -> Result<PathInfo, AppError>;
}
