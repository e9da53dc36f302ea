// src/cache/store.rs

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::model::{Fingerprint, TestSuite};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub fingerprint: Fingerprint,
    pub suite: TestSuite,
    /// Files the fingerprint was computed from, relative to the project root.
    pub dependencies: Vec<PathBuf>,
    pub created_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn depends_on(&self, path: &Path) -> bool {
        self.dependencies.iter().any(|d| d == path)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    pub fn lookups(&self) -> u64 {
        self.hits + self.misses
    }
}

type Snapshot = Arc<HashMap<Fingerprint, Arc<CacheEntry>>>;

/// Fingerprint-keyed store of clean suites.
///
/// Readers clone the current snapshot under a short read lock and never wait
/// on writers doing real work; writers serialise on `writer` and publish a
/// modified copy.
#[derive(Debug, Default)]
pub struct ResultCache {
    entries: RwLock<Snapshot>,
    writer: Mutex<()>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a cache from persisted entries; later duplicates win.
    pub fn from_entries(entries: impl IntoIterator<Item = CacheEntry>) -> Self {
        let map: HashMap<Fingerprint, Arc<CacheEntry>> = entries
            .into_iter()
            .map(|e| (e.fingerprint.clone(), Arc::new(e)))
            .collect();
        Self {
            entries: RwLock::new(Arc::new(map)),
            ..Self::default()
        }
    }

    fn snapshot(&self) -> Snapshot {
        Arc::clone(&self.entries.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn publish(&self, next: HashMap<Fingerprint, Arc<CacheEntry>>) {
        *self.entries.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(next);
    }

    pub fn get(&self, fingerprint: &Fingerprint) -> Option<CacheEntry> {
        let found = self.snapshot().get(fingerprint).map(|e| CacheEntry::clone(e));
        match &found {
            Some(_) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                trace!(%fingerprint, "cache hit");
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                trace!(%fingerprint, "cache miss");
            }
        }
        found
    }

    /// Insert or replace the entry for `fingerprint`.
    pub fn put(&self, fingerprint: Fingerprint, suite: TestSuite, dependencies: Vec<PathBuf>) {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = HashMap::clone(&self.snapshot());
        let entry = CacheEntry {
            fingerprint: fingerprint.clone(),
            suite,
            dependencies,
            created_at: Utc::now(),
        };
        debug!(%fingerprint, suite = %entry.suite.file_path.display(), "caching suite");
        next.insert(fingerprint, Arc::new(entry));
        self.publish(next);
    }

    /// Evict every entry whose dependency closure contains `path`.
    pub fn invalidate(&self, path: &Path) -> usize {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.snapshot();
        if !current.values().any(|e| e.depends_on(path)) {
            return 0;
        }

        let mut next = HashMap::clone(&current);
        next.retain(|_, e| !e.depends_on(path));
        let removed = current.len() - next.len();
        self.publish(next);
        debug!(path = %path.display(), removed, "invalidated cache entries");
        removed
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Owned copies of every entry, sorted by suite path then fingerprint.
    pub fn entries(&self) -> Vec<CacheEntry> {
        let mut all: Vec<CacheEntry> = self.snapshot().values().map(|e| CacheEntry::clone(e)).collect();
        all.sort_by(|a, b| {
            a.suite
                .file_path
                .cmp(&b.suite.file_path)
                .then_with(|| a.fingerprint.cmp(&b.fingerprint))
        });
        all
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
