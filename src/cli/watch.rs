use crate::core::Context;
use crate::Result;
use anyhow::Context as _;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

/// Quiet period used to coalesce bursts of file events into one re-run.
const DEBOUNCE: Duration = Duration::from_millis(250);

/// Watches template sources and yields debounced batches of changed paths.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    events: UnboundedReceiver<notify::Result<Event>>,
    roots: Vec<PathBuf>,
}

impl FileWatcher {
    /// Watch `package_dir` recursively plus the directory of every source outside it.
    pub fn new(package_dir: &Path, sources: &[PathBuf]) -> Result<Self> {
        let roots = watch_roots(package_dir, sources);
        let (tx, events) = unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |event: notify::Result<Event>| {
            let _ = tx.send(event);
        })
        .context("failed to start file watcher")?;

        for root in &roots {
            watcher
                .watch(root, RecursiveMode::Recursive)
                .with_context(|| format!("failed to watch {}", root.display()))?;
            tracing::debug!(path = %root.display(), "watching");
        }

        Ok(FileWatcher {
            _watcher: watcher,
            events,
            roots,
        })
    }

    pub fn describe(&self, context: &Context) -> String {
        self.roots
            .iter()
            .map(|root| context.display_path(root))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Wait for the next change, then drain events until the debounce window is quiet.
    ///
    /// Returns `None` once the watcher has shut down.
    pub async fn next_change(&mut self) -> Option<Vec<PathBuf>> {
        let mut changed = BTreeSet::new();
        loop {
            let event = self.events.recv().await?;
            collect_paths(event, &mut changed);
            if !changed.is_empty() {
                break;
            }
        }

        while let Ok(Some(event)) = tokio::time::timeout(DEBOUNCE, self.events.recv()).await {
            collect_paths(event, &mut changed);
        }
        Some(changed.into_iter().collect())
    }
}

fn collect_paths(event: notify::Result<Event>, changed: &mut BTreeSet<PathBuf>) {
    match event {
        Ok(event) if is_change(&event.kind) => changed.extend(event.paths),
        Ok(_) => {}
        Err(e) => tracing::warn!(error = %e, "file watch error"),
    }
}

fn is_change(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

/// Existing directories to watch: the package dir and parents of sources outside it.
fn watch_roots(package_dir: &Path, sources: &[PathBuf]) -> Vec<PathBuf> {
    let mut roots: Vec<PathBuf> = Vec::new();
    let package_dir = if package_dir.as_os_str().is_empty() {
        Path::new(".")
    } else {
        package_dir
    };
    if package_dir.is_dir() {
        roots.push(package_dir.to_path_buf());
    }

    for source in sources {
        if source.starts_with(package_dir) {
            continue;
        }
        let Some(parent) = source.parent().filter(|p| p.is_dir()) else {
            continue;
        };
        if !roots.iter().any(|root| parent.starts_with(root)) {
            roots.push(parent.to_path_buf());
        }
    }
    roots
}
