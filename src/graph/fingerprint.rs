// src/graph/fingerprint.rs

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use blake3::Hasher;
use tracing::{debug, trace};

use crate::fs::FileSystem;
use crate::graph::index::PackageIndex;
use crate::model::{Fingerprint, TestTarget};

/// Module files that affect every package.
const MODULE_FILES: &[&str] = &["go.mod", "go.sum"];

/// In-memory cache of file content hashes.
///
/// An entry is reused only while the file's mtime is unchanged, so a file is
/// re-read when it is edited even if no invalidation reached the cache.
#[derive(Debug, Default)]
pub struct FileHashCache {
    hashes: HashMap<PathBuf, (SystemTime, String)>,
}

impl FileHashCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the hash for a file, computing and caching it if necessary.
    pub fn get_or_compute(&mut self, fs: &dyn FileSystem, path: &Path) -> Result<(SystemTime, String)> {
        let modified = fs.modified(path)?;
        if let Some((cached_at, hash)) = self.hashes.get(path)
            && *cached_at == modified
        {
            return Ok((modified, hash.clone()));
        }

        trace!(path = %path.display(), "hashing file");
        let content = fs.read(path)?;
        let hash = blake3::hash(&content).to_hex().to_string();
        self.hashes
            .insert(path.to_path_buf(), (modified, hash.clone()));
        Ok((modified, hash))
    }

    /// Invalidate the cached hash for a file (e.g. on change).
    pub fn invalidate(&mut self, path: &Path) {
        if self.hashes.remove(path).is_some() {
            debug!(path = %path.display(), "invalidated file hash");
        }
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}

/// Computes target fingerprints from file contents, mtimes and the local
/// import closure.
#[derive(Debug)]
pub struct Fingerprinter {
    fs: Arc<dyn FileSystem>,
    root: PathBuf,
    hashes: FileHashCache,
    command: Option<String>,
}

impl Fingerprinter {
    pub fn new(fs: Arc<dyn FileSystem>, root: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            root: root.into(),
            hashes: FileHashCache::new(),
            command: None,
        }
    }

    /// Mix the harness command line into every fingerprint, so results
    /// produced by a different command (or `-run` filter) never match.
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    /// Forget memoised hashes for changed files (paths relative to the root).
    pub fn invalidate<'a>(&mut self, rel_paths: impl IntoIterator<Item = &'a PathBuf>) {
        for rel in rel_paths {
            self.hashes.invalidate(&self.root.join(rel));
        }
    }

    /// Build the [`TestTarget`] for package `dir`.
    ///
    /// The dependency list holds every file that fed the fingerprint: the
    /// package's own files, those of each transitively imported local package,
    /// and the module files.
    pub fn target(&mut self, index: &PackageIndex, dir: &Path) -> Result<TestTarget> {
        let mut packages = vec![dir.to_path_buf()];
        packages.extend(index.dependency_closure(dir));

        let mut files: Vec<PathBuf> = packages
            .iter()
            .filter_map(|p| index.package(p))
            .flat_map(|p| p.files.iter().cloned())
            .collect();
        for name in MODULE_FILES {
            if self.fs.is_file(&self.root.join(name)) {
                files.push(PathBuf::from(name));
            }
        }
        files.sort();
        files.dedup();

        let mut hasher = Hasher::new();
        hasher.update(dir.to_string_lossy().as_bytes());
        if let Some(command) = &self.command {
            hasher.update(b"\0cmd\0");
            hasher.update(command.as_bytes());
        }
        for rel in &files {
            let abs = self.root.join(rel);
            hasher.update(b"\0");
            hasher.update(rel.to_string_lossy().as_bytes());
            match self.hashes.get_or_compute(self.fs.as_ref(), &abs) {
                Ok((modified, hash)) => {
                    let nanos = modified
                        .duration_since(UNIX_EPOCH)
                        .map(|d| d.as_nanos())
                        .unwrap_or_default();
                    hasher.update(hash.as_bytes());
                    hasher.update(&nanos.to_le_bytes());
                }
                Err(e) => {
                    // Vanished between scan and hash; the next batch rescans.
                    debug!(file = %rel.display(), error = %e, "file unreadable while fingerprinting");
                    hasher.update(b"<missing>");
                }
            }
        }

        let fingerprint = Fingerprint(hasher.finalize().to_hex().to_string());
        trace!(target = %dir.display(), %fingerprint, files = files.len(), "fingerprinted target");

        Ok(TestTarget {
            path: dir.to_path_buf(),
            fingerprint,
            dependencies: files,
        })
    }
}
