// src/watch/event.rs

use std::path::PathBuf;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
}

impl ChangeKind {
    /// Combine two changes to the same path, `self` being the earlier one.
    ///
    /// A file created and then edited is still new; a file removed and then
    /// recreated has merely been modified.
    pub fn merge(self, later: ChangeKind) -> ChangeKind {
        match (self, later) {
            (ChangeKind::Created, ChangeKind::Modified) => ChangeKind::Created,
            (ChangeKind::Removed, ChangeKind::Created) => ChangeKind::Modified,
            (_, later) => later,
        }
    }
}

/// A single filtered filesystem change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChangeEvent {
    /// Relative to the project root, forward slashes.
    pub path: PathBuf,
    pub kind: ChangeKind,
    pub timestamp: Instant,
}

impl FileChangeEvent {
    pub fn new(path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
            timestamp: Instant::now(),
        }
    }
}

/// Changes released together after a quiet period; one entry per path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeBatch {
    pub events: Vec<FileChangeEvent>,
    pub settled_at: Instant,
}

impl ChangeBatch {
    pub fn paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.events.iter().map(|e| &e.path)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Whether the set of files (not just their contents) changed.
    pub fn has_structural_change(&self) -> bool {
        self.events.iter().any(|e| {
            e.kind != ChangeKind::Modified
                || e.path.file_name().is_some_and(|n| n == "go.mod")
        })
    }
}
