// src/watch/watcher.rs

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::errors::{Result, SentinelError};
use crate::watch::event::{ChangeKind, FileChangeEvent};
use crate::watch::path_utils::relative_str;
use crate::watch::patterns::PathFilter;

/// Recursive OS-level watch over one or more roots inside a project.
#[derive(Debug, Clone)]
pub struct SourceWatcher {
    project_root: PathBuf,
    roots: Vec<PathBuf>,
    filter: Arc<PathFilter>,
}

/// Live stream of filtered change events.
///
/// Owns the underlying `notify` watcher; dropping the stream stops watching.
pub struct WatchStream {
    inner: RecommendedWatcher,
    events_rx: mpsc::UnboundedReceiver<FileChangeEvent>,
    failed_rx: mpsc::UnboundedReceiver<PathBuf>,
    project_root: PathBuf,
    dropped: HashSet<PathBuf>,
}

impl std::fmt::Debug for WatchStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchStream")
            .field("dropped", &self.dropped)
            .finish_non_exhaustive()
    }
}

impl SourceWatcher {
    /// `roots` may be absolute or relative to `project_root`.
    pub fn new(
        project_root: impl Into<PathBuf>,
        roots: Vec<PathBuf>,
        filter: PathFilter,
    ) -> Self {
        let project_root = project_root.into();
        let roots = roots
            .into_iter()
            .map(|r| if r.is_absolute() { r } else { project_root.join(r) })
            .collect();
        Self {
            project_root,
            roots,
            filter: Arc::new(filter),
        }
    }

    /// Start a fresh OS watch over every root.
    ///
    /// A root that is missing or cannot be watched is fatal.
    pub fn watch(&self) -> Result<WatchStream> {
        let project_root = self
            .project_root
            .canonicalize()
            .map_err(|e| SentinelError::WatchSetup {
                path: self.project_root.clone(),
                reason: e.to_string(),
            })?;

        let (events_tx, events_rx) = mpsc::unbounded_channel::<FileChangeEvent>();
        let (failed_tx, failed_rx) = mpsc::unbounded_channel::<PathBuf>();

        let callback_root = project_root.clone();
        let callback_filter = Arc::clone(&self.filter);

        // Called synchronously by notify on its own thread.
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    for change in classify(&event, &callback_root, &callback_filter) {
                        if events_tx.send(change).is_err() {
                            return;
                        }
                    }
                }
                Err(err) => {
                    warn!(error = %err, paths = ?err.paths, "file watch error");
                    for path in err.paths {
                        let _ = failed_tx.send(path);
                    }
                }
            },
            Config::default(),
        )?;

        for root in &self.roots {
            let root = root.canonicalize().map_err(|e| SentinelError::WatchSetup {
                path: root.clone(),
                reason: e.to_string(),
            })?;
            watcher
                .watch(&root, RecursiveMode::Recursive)
                .map_err(|e| SentinelError::WatchSetup {
                    path: root.clone(),
                    reason: e.to_string(),
                })?;
            info!(root = %root.display(), "watching");
        }

        Ok(WatchStream {
            inner: watcher,
            events_rx,
            failed_rx,
            project_root,
            dropped: HashSet::new(),
        })
    }
}

impl WatchStream {
    /// Next change event; `None` once the underlying watcher is gone.
    pub async fn recv(&mut self) -> Option<FileChangeEvent> {
        loop {
            tokio::select! {
                Some(path) = self.failed_rx.recv() => self.drop_path(path),
                event = self.events_rx.recv() => {
                    let event = event?;
                    if self.is_dropped(&event.path) {
                        trace!(path = %event.path.display(), "ignoring change under dropped path");
                        continue;
                    }
                    return Some(event);
                }
            }
        }
    }

    /// Stop watching a path that produced an error; other paths are unaffected.
    fn drop_path(&mut self, path: PathBuf) {
        if let Err(e) = self.inner.unwatch(&path) {
            // Paths inside a recursive root cannot be unwatched individually;
            // they are filtered in `recv` instead.
            debug!(path = %path.display(), error = %e, "unwatch failed, filtering instead");
        }
        let rel = relative_str(&self.project_root, &path)
            .map(PathBuf::from)
            .unwrap_or(path);
        warn!(path = %rel.display(), "no longer watching path after error");
        self.dropped.insert(rel);
    }

    fn is_dropped(&self, rel: &Path) -> bool {
        self.dropped.iter().any(|d| rel.starts_with(d))
    }
}

/// Map one raw notify event onto filtered, project-relative change events.
pub fn classify(event: &Event, project_root: &Path, filter: &PathFilter) -> Vec<FileChangeEvent> {
    let kinds: Vec<(usize, ChangeKind)> = match event.kind {
        EventKind::Create(_) => all_paths(event, ChangeKind::Created),
        EventKind::Remove(_) => all_paths(event, ChangeKind::Removed),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            all_paths(event, ChangeKind::Removed)
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            all_paths(event, ChangeKind::Created)
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            vec![(0, ChangeKind::Removed), (1, ChangeKind::Created)]
        }
        EventKind::Modify(_) | EventKind::Any => all_paths(event, ChangeKind::Modified),
        EventKind::Access(_) | EventKind::Other => Vec::new(),
    };

    kinds
        .into_iter()
        .filter_map(|(idx, kind)| {
            let path = event.paths.get(idx)?;
            let rel = relative_str(project_root, path)?;
            if !filter.matches(&rel) {
                trace!(path = %rel, "change filtered out");
                return None;
            }
            Some(FileChangeEvent::new(rel, kind))
        })
        .collect()
}

fn all_paths(event: &Event, kind: ChangeKind) -> Vec<(usize, ChangeKind)> {
    (0..event.paths.len()).map(|i| (i, kind)).collect()
}
