// src/cache/persist.rs

//! Persistence of the result cache between sessions.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cache::store::{CacheEntry, ResultCache};
use crate::fs::FileSystem;
use crate::types::CacheStorageMode;

/// Relative path (from the project root) to the cache file.
pub const CACHE_FILE_PATH: &str = ".sentinel/cache.json";

/// Bumped whenever the on-disk layout changes; other versions load cold.
const CACHE_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    entries: Vec<CacheEntry>,
}

/// Abstract storage for cache entries.
pub trait CacheStore: Send + Sync {
    fn load(&self) -> Result<Vec<CacheEntry>>;
    fn save(&mut self, entries: &[CacheEntry]) -> Result<()>;
}

/// Stores entries as JSON in `<root>/.sentinel/cache.json`.
#[derive(Debug)]
pub struct FileCacheStore {
    path: PathBuf,
    fs: Arc<dyn FileSystem>,
}

impl FileCacheStore {
    pub fn new(root: &Path, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            path: root.join(CACHE_FILE_PATH),
            fs,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CacheStore for FileCacheStore {
    fn load(&self) -> Result<Vec<CacheEntry>> {
        if !self.fs.exists(&self.path) {
            return Ok(Vec::new());
        }
        let raw = self.fs.read_to_string(&self.path)?;
        let file: CacheFile = serde_json::from_str(&raw)
            .with_context(|| format!("decoding cache file {:?}", self.path))?;
        if file.version != CACHE_FORMAT_VERSION {
            anyhow::bail!(
                "cache file {:?} has format version {} (expected {})",
                self.path,
                file.version,
                CACHE_FORMAT_VERSION
            );
        }
        Ok(file.entries)
    }

    fn save(&mut self, entries: &[CacheEntry]) -> Result<()> {
        let file = CacheFile {
            version: CACHE_FORMAT_VERSION,
            entries: entries.to_vec(),
        };
        let json = serde_json::to_vec_pretty(&file).context("encoding cache file")?;
        self.fs.write(&self.path, &json)?;
        info!(path = %self.path.display(), entries = entries.len(), "stored result cache (file)");
        Ok(())
    }
}

/// Keeps entries for the lifetime of the process only.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: Vec<CacheEntry>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for MemoryCacheStore {
    fn load(&self) -> Result<Vec<CacheEntry>> {
        Ok(self.entries.clone())
    }

    fn save(&mut self, entries: &[CacheEntry]) -> Result<()> {
        self.entries = entries.to_vec();
        info!(entries = entries.len(), "stored result cache (memory)");
        Ok(())
    }
}

pub fn store_for(mode: CacheStorageMode, root: &Path, fs: Arc<dyn FileSystem>) -> Box<dyn CacheStore> {
    match mode {
        CacheStorageMode::File => Box::new(FileCacheStore::new(root, fs)),
        CacheStorageMode::Memory => Box::new(MemoryCacheStore::new()),
    }
}

/// Build a cache from `store`, starting cold if the stored data is unusable.
pub fn load_or_cold(store: &dyn CacheStore) -> ResultCache {
    match store.load() {
        Ok(entries) => {
            info!(entries = entries.len(), "loaded result cache");
            ResultCache::from_entries(entries)
        }
        Err(e) => {
            warn!(error = %format!("{e:#}"), "result cache unreadable, starting cold");
            ResultCache::new()
        }
    }
}
