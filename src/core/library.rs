#![allow(clippy::result_large_err)]

use crate::core::error::AppError;
use crate::core::package::{Package, PathInfo};
use crate::core::paths;
use crate::core::reader::ContentReader;
use crate::core::types::ErrorCategory;
use indexmap::IndexMap;
use serde::Deserialize;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Suffix identifying a dependency entry as a library manifest.
pub const MANIFEST_SUFFIX: &str = ".gflowslib";

/// Returns `true` when a dependency entry should be resolved through the library cache.
pub fn is_manifest(dependency: &str) -> bool {
    dependency.ends_with(MANIFEST_SUFFIX)
}

/// Manifest document listing the files that make up a library.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LibraryManifest {
    pub files: Vec<String>,
}

/// A dependency manifest materialized into a local working directory.
#[derive(Debug)]
pub struct Library {
    pub manifest_path: String,
    pub name: String,
    pub local_dir: PathBuf,
}

impl Package for Library {
    fn workflows_dir(&self) -> PathBuf {
        self.local_dir.join("workflows")
    }

    fn libs_dir(&self) -> PathBuf {
        self.local_dir.join("libs")
    }

    fn path_info(&self, local_path: &Path) -> Result<PathInfo, AppError> {
        let relative = local_path.strip_prefix(&self.local_dir).map_err(|_| {
            AppError::new(
                ErrorCategory::ResolutionError,
                format!(
                    "{} is not inside library {}",
                    local_path.display(),
                    self.name
                ),
            )
        })?;
        let relative = relative.to_string_lossy().replace('\\', "/");
        let source_path = paths::join(&paths::parent(&self.manifest_path), &relative);
        Ok(PathInfo {
            local_path: local_path.to_path_buf(),
            description: format!("{} (from {})", source_path, self.manifest_path),
            source_path,
        })
    }
}

/// Materializes library manifests at most once per run.
///
/// Single-writer: the cache lock is held for the whole fetch, so a second request for
/// the same manifest waits for the first and receives the same [`Library`].
pub struct LibraryResolver {
    reader: Arc<dyn ContentReader>,
    temp_root: PathBuf,
    cache: Mutex<IndexMap<String, Arc<Library>>>,
}

impl LibraryResolver {
    pub fn new(reader: Arc<dyn ContentReader>) -> Self {
        Self::with_temp_root(reader, std::env::temp_dir())
    }

    pub fn with_temp_root(reader: Arc<dyn ContentReader>, temp_root: PathBuf) -> Self {
        LibraryResolver {
            reader,
            temp_root,
            cache: Mutex::new(IndexMap::new()),
        }
    }

    pub async fn resolve(&self, manifest_path: &str) -> Result<Arc<Library>, AppError> {
        let mut cache = self.cache.lock().await;
        if let Some(library) = cache.get(manifest_path) {
            return Ok(Arc::clone(library));
        }

        let library = Arc::new(self.materialize(manifest_path).await?);
        tracing::info!(
            manifest = manifest_path,
            dir = %library.local_dir.display(),
            "resolved library"
        );
        cache.insert(manifest_path.to_string(), Arc::clone(&library));
        Ok(library)
    }

    /// Libraries resolved so far, in resolution order.
    pub async fn libraries(&self) -> Vec<Arc<Library>> {
        self.cache.lock().await.values().cloned().collect()
    }

    /// Remove every materialized library directory and clear the cache.
    pub async fn cleanup(&self) -> Result<(), AppError> {
        let mut cache = self.cache.lock().await;
        for (manifest, library) in cache.drain(..) {
            tracing::debug!(
                manifest = %manifest,
                dir = %library.local_dir.display(),
                "removing library"
            );
            if library.local_dir.exists() {
                fs::remove_dir_all(&library.local_dir)
                    .map_err(|e| AppError::io("remove", &library.local_dir, e))?;
            }
        }
        Ok(())
    }

    async fn materialize(&self, manifest_path: &str) -> Result<Library, AppError> {
        let name = paths::stem(manifest_path);
        let content = self.reader.read_to_string(manifest_path).await?;
        let manifest: LibraryManifest = serde_json::from_str(&content).map_err(|e| {
            AppError::with_source(
                ErrorCategory::ResolutionError,
                format!("invalid library manifest {}: {}", manifest_path, e),
                e,
            )
            .with_context("manifest", manifest_path)
        })?;

        let local_dir = self
            .temp_root
            .join(format!("gflows-{}-{}", name, uuid::Uuid::new_v4()));
        fs::create_dir_all(&local_dir).map_err(|e| AppError::io("create", &local_dir, e))?;

        if let Err(e) = self.copy_files(manifest_path, &manifest, &local_dir).await {
            if let Err(remove) = fs::remove_dir_all(&local_dir) {
                tracing::warn!(
                    dir = %local_dir.display(),
                    error = %remove,
                    "failed to remove partial library"
                );
            }
            return Err(e);
        }

        Ok(Library {
            manifest_path: manifest_path.to_string(),
            name,
            local_dir,
        })
    }

    async fn copy_files(
        &self,
        manifest_path: &str,
        manifest: &LibraryManifest,
        local_dir: &Path,
    ) -> Result<(), AppError> {
        let root = paths::parent(manifest_path);
        for file in &manifest.files {
            let relative = checked_relative(manifest_path, file)?;
            let source = paths::join(&root, file);
            tracing::debug!(source = %source, "copying library file");
            let bytes = self.reader.read(&source).await?;

            let destination = local_dir.join(relative);
            if let Some(parent) = destination.parent() {
                fs::create_dir_all(parent).map_err(|e| AppError::io("create", parent, e))?;
            }
            fs::write(&destination, bytes).map_err(|e| AppError::io("write", &destination, e))?;
        }
        Ok(())
    }
}

/// Manifest entries must stay inside the library directory.
fn checked_relative<'a>(manifest_path: &str, file: &'a str) -> Result<&'a Path, AppError> {
    let relative = Path::new(file);
    let escapes = relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes || file.is_empty() {
        return Err(AppError::new(
            ErrorCategory::ResolutionError,
            format!(
                "invalid file '{}' in library manifest {}: paths must be relative",
                file, manifest_path
            ),
        ));
    }
    Ok(relative)
}
