// src/coordinator/resolve.rs

//! Mapping settled change batches to test targets.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::graph::{Fingerprinter, PackageIndex};
use crate::model::TestTarget;
use crate::types::WatchMode;
use crate::watch::event::ChangeBatch;

/// Files whose change affects every package of the module.
const MODULE_FILES: &[&str] = &["go.mod", "go.sum"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Ordered by package path, unique.
    pub targets: Vec<TestTarget>,
    /// Changed paths that belong to no known package.
    pub unresolved: Vec<PathBuf>,
    /// Problems hit while refreshing the index or fingerprinting.
    pub warnings: Vec<String>,
}

/// Owns the package index and fingerprinter, and applies the watch mode.
#[derive(Debug)]
pub struct TargetResolver {
    index: PackageIndex,
    fingerprinter: Fingerprinter,
    mode: WatchMode,
    related_depth: Option<usize>,
}

impl TargetResolver {
    pub fn new(
        index: PackageIndex,
        fingerprinter: Fingerprinter,
        mode: WatchMode,
        related_depth: Option<usize>,
    ) -> Self {
        Self {
            index,
            fingerprinter,
            mode,
            related_depth,
        }
    }

    pub fn mode(&self) -> WatchMode {
        self.mode
    }

    pub fn index(&self) -> &PackageIndex {
        &self.index
    }

    /// Every test target with a fresh fingerprint.
    pub fn resolve_all(&mut self) -> Resolution {
        let dirs: BTreeSet<PathBuf> = self.index.targets().into_iter().collect();
        let mut resolution = Resolution::default();
        self.materialise(dirs, &mut resolution);
        resolution
    }

    /// Targets affected by `batch` under the configured mode.
    ///
    /// Packages are looked up both before and after the index is refreshed,
    /// so dependents of a removed package are still found.
    pub fn resolve(&mut self, batch: &ChangeBatch) -> Resolution {
        let (mut affected, before_missing) = self.affected(batch);

        let mut warnings = Vec::new();
        if let Err(e) = self.refresh(batch) {
            warn!(error = %e, "failed to refresh package index; using the previous one");
            warnings.push(format!("package index refresh failed: {e:#}"));
        }

        if self.mode == WatchMode::All {
            let mut resolution = self.resolve_all();
            resolution.warnings.splice(0..0, warnings);
            return resolution;
        }

        let (after, after_missing) = self.affected(batch);
        affected.extend(after);

        let unresolved: Vec<PathBuf> = before_missing
            .intersection(&after_missing)
            .cloned()
            .collect();
        let dirs: BTreeSet<PathBuf> = affected
            .into_iter()
            .filter(|d| self.index.is_target(d))
            .collect();

        debug!(
            mode = %self.mode,
            changes = batch.len(),
            targets = dirs.len(),
            unresolved = unresolved.len(),
            "resolved change batch"
        );

        let mut resolution = Resolution {
            targets: Vec::new(),
            unresolved,
            warnings,
        };
        self.materialise(dirs, &mut resolution);
        resolution
    }

    /// Drop memoised hashes for the changed files and update the index.
    pub fn refresh(&mut self, batch: &ChangeBatch) -> anyhow::Result<()> {
        self.fingerprinter.invalidate(batch.paths());
        self.index.refresh(batch)
    }

    /// Packages touched by `batch` (plus dependents in related mode) and
    /// the paths that belong to none.
    fn affected(&self, batch: &ChangeBatch) -> (BTreeSet<PathBuf>, BTreeSet<PathBuf>) {
        let mut changed = BTreeSet::new();
        let mut missing = BTreeSet::new();

        for path in batch.paths() {
            if is_module_file(path) {
                changed.extend(self.index.packages().map(|p| p.dir.clone()));
                continue;
            }
            match self.index.package_of(path) {
                Some(dir) => {
                    changed.insert(dir);
                }
                None => {
                    missing.insert(path.clone());
                }
            }
        }

        if self.mode == WatchMode::Related {
            let dependents: Vec<PathBuf> = changed
                .iter()
                .flat_map(|dir| self.index.dependents_of(dir, self.related_depth))
                .collect();
            changed.extend(dependents);
        }
        (changed, missing)
    }

    fn materialise(&mut self, dirs: BTreeSet<PathBuf>, resolution: &mut Resolution) {
        for dir in dirs {
            match self.fingerprinter.target(&self.index, &dir) {
                Ok(target) => resolution.targets.push(target),
                Err(e) => {
                    warn!(target = %dir.display(), error = %e, "failed to fingerprint target");
                    resolution
                        .warnings
                        .push(format!("could not fingerprint {}: {e:#}", dir.display()));
                }
            }
        }
    }
}

fn is_module_file(path: &Path) -> bool {
    MODULE_FILES.iter().any(|name| path == Path::new(name))
}
