// src/graph/index.rs

//! Package discovery and the local import graph.
//!
//! Every directory holding `.go` files is a package node; an edge `a → b`
//! means package `a` imports package `b`. Directories with `*_test.go` files
//! are test targets.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use petgraph::Direction;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use tracing::{debug, info, warn};

use crate::fs::FileSystem;
use crate::graph::imports;
use crate::watch::event::ChangeBatch;
use crate::watch::path_utils::package_dir_of;
use crate::watch::patterns::PathFilter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageInfo {
    /// Relative to the project root; `.` for the root package.
    pub dir: PathBuf,
    /// Relative `.go` files directly inside `dir`, sorted.
    pub files: Vec<PathBuf>,
    pub has_tests: bool,
}

#[derive(Debug)]
pub struct PackageIndex {
    root: PathBuf,
    fs: Arc<dyn FileSystem>,
    filter: PathFilter,
    module_path: Option<String>,
    graph: StableDiGraph<PathBuf, ()>,
    nodes: HashMap<PathBuf, NodeIndex>,
    packages: BTreeMap<PathBuf, PackageInfo>,
}

impl PackageIndex {
    /// Walk `root` and build the index from scratch.
    pub fn scan(fs: Arc<dyn FileSystem>, root: impl Into<PathBuf>, filter: PathFilter) -> Result<Self> {
        let mut index = Self {
            root: root.into(),
            fs,
            filter,
            module_path: None,
            graph: StableDiGraph::new(),
            nodes: HashMap::new(),
            packages: BTreeMap::new(),
        };
        index.rescan()?;
        Ok(index)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn module_path(&self) -> Option<&str> {
        self.module_path.as_deref()
    }

    pub fn packages(&self) -> impl Iterator<Item = &PackageInfo> {
        self.packages.values()
    }

    pub fn package(&self, dir: &Path) -> Option<&PackageInfo> {
        self.packages.get(dir)
    }

    /// Test target directories, sorted.
    pub fn targets(&self) -> Vec<PathBuf> {
        self.packages
            .values()
            .filter(|p| p.has_tests)
            .map(|p| p.dir.clone())
            .collect()
    }

    pub fn is_target(&self, dir: &Path) -> bool {
        self.packages.get(dir).is_some_and(|p| p.has_tests)
    }

    /// Package owning a changed file, if the file belongs to a known package.
    pub fn package_of(&self, rel_file: &Path) -> Option<PathBuf> {
        let dir = package_dir_of(rel_file);
        self.packages.contains_key(&dir).then_some(dir)
    }

    /// Direct imports of `dir` that are local packages, sorted.
    pub fn imports_of(&self, dir: &Path) -> Vec<PathBuf> {
        self.neighbours(dir, Direction::Outgoing)
    }

    /// Packages importing `dir`, up to `depth` hops (`None` = unbounded).
    ///
    /// The result excludes `dir` itself and is sorted.
    pub fn dependents_of(&self, dir: &Path, depth: Option<usize>) -> Vec<PathBuf> {
        self.walk(dir, Direction::Incoming, depth)
    }

    /// Every local package `dir` transitively imports, sorted.
    pub fn dependency_closure(&self, dir: &Path) -> Vec<PathBuf> {
        self.walk(dir, Direction::Outgoing, None)
    }

    /// Bring the index up to date after a batch of changes.
    ///
    /// Added or removed files (and `go.mod` edits) change the package set, so
    /// they trigger a full rescan; pure content edits only re-read the imports
    /// of the touched packages.
    pub fn refresh(&mut self, batch: &ChangeBatch) -> Result<()> {
        if batch.has_structural_change() {
            debug!(changes = batch.len(), "structural change, rescanning packages");
            return self.rescan();
        }

        let touched: HashSet<PathBuf> = batch
            .paths()
            .filter(|p| p.extension().is_some_and(|e| e == "go"))
            .filter_map(|p| self.package_of(p))
            .collect();

        for dir in touched {
            self.relink(&dir)?;
        }
        Ok(())
    }

    /// Rebuild packages, nodes and edges from disk.
    pub fn rescan(&mut self) -> Result<()> {
        self.module_path = self.read_module_path();
        self.graph.clear();
        self.nodes.clear();
        self.packages = self.discover_packages()?;

        for dir in self.packages.keys() {
            let idx = self.graph.add_node(dir.clone());
            self.nodes.insert(dir.clone(), idx);
        }

        let dirs: Vec<PathBuf> = self.packages.keys().cloned().collect();
        for dir in dirs {
            self.relink(&dir)?;
        }

        info!(
            packages = self.packages.len(),
            targets = self.targets().len(),
            edges = self.graph.edge_count(),
            module = self.module_path.as_deref().unwrap_or("<none>"),
            "package index built"
        );
        Ok(())
    }

    fn read_module_path(&self) -> Option<String> {
        let go_mod = self.root.join("go.mod");
        if !self.fs.is_file(&go_mod) {
            warn!(path = %go_mod.display(), "no go.mod found, import graph will be empty");
            return None;
        }
        match self.fs.read_to_string(&go_mod) {
            Ok(contents) => imports::module_path(&contents),
            Err(e) => {
                warn!(error = %e, "failed to read go.mod");
                None
            }
        }
    }

    fn discover_packages(&self) -> Result<BTreeMap<PathBuf, PackageInfo>> {
        let mut packages: BTreeMap<PathBuf, PackageInfo> = BTreeMap::new();
        let mut stack = vec![self.root.clone()];

        while let Some(dir) = stack.pop() {
            let entries = self
                .fs
                .read_dir(&dir)
                .with_context(|| format!("scanning {:?} for Go packages", dir))?;

            for path in entries {
                let Ok(rel) = path.strip_prefix(&self.root) else {
                    continue;
                };
                let rel_str = rel.to_string_lossy().replace('\\', "/");

                if self.fs.is_dir(&path) {
                    if !self.filter.excludes_dir(&rel_str) {
                        stack.push(path);
                    }
                    continue;
                }

                if !rel_str.ends_with(".go") || !self.filter.matches(&rel_str) {
                    continue;
                }

                let rel_file = PathBuf::from(&rel_str);
                let pkg_dir = package_dir_of(&rel_file);
                let entry = packages.entry(pkg_dir.clone()).or_insert_with(|| PackageInfo {
                    dir: pkg_dir,
                    files: Vec::new(),
                    has_tests: false,
                });
                entry.has_tests |= rel_str.ends_with("_test.go");
                entry.files.push(rel_file);
            }
        }

        for info in packages.values_mut() {
            info.files.sort();
        }
        Ok(packages)
    }

    /// Replace the outgoing edges of `dir` with its current imports.
    fn relink(&mut self, dir: &Path) -> Result<()> {
        let Some(&from) = self.nodes.get(dir) else {
            return Ok(());
        };

        let stale: Vec<_> = self
            .graph
            .edges_directed(from, Direction::Outgoing)
            .map(|e| e.id())
            .collect();
        for edge in stale {
            self.graph.remove_edge(edge);
        }

        let Some(module) = self.module_path.clone() else {
            return Ok(());
        };
        let files = self
            .packages
            .get(dir)
            .map(|p| p.files.clone())
            .unwrap_or_default();

        let mut linked = HashSet::new();
        for file in files {
            let source = match self.fs.read_to_string(&self.root.join(&file)) {
                Ok(s) => s,
                Err(e) => {
                    warn!(file = %file.display(), error = %e, "skipping unreadable source file");
                    continue;
                }
            };
            for import in imports::imports(&source) {
                let Some(local) = imports::local_dir(&module, &import) else {
                    continue;
                };
                let target = PathBuf::from(local);
                if target == dir || !linked.insert(target.clone()) {
                    continue;
                }
                if let Some(&to) = self.nodes.get(&target) {
                    self.graph.add_edge(from, to, ());
                }
            }
        }
        Ok(())
    }

    fn neighbours(&self, dir: &Path, direction: Direction) -> Vec<PathBuf> {
        let Some(&idx) = self.nodes.get(dir) else {
            return Vec::new();
        };
        let mut out: Vec<PathBuf> = self
            .graph
            .neighbors_directed(idx, direction)
            .filter_map(|n| self.graph.node_weight(n).cloned())
            .collect();
        out.sort();
        out.dedup();
        out
    }

    /// Breadth-first walk limited to `depth` hops.
    fn walk(&self, dir: &Path, direction: Direction, depth: Option<usize>) -> Vec<PathBuf> {
        let Some(&start) = self.nodes.get(dir) else {
            return Vec::new();
        };

        let mut seen = HashSet::from([start]);
        let mut queue = VecDeque::from([(start, 0usize)]);
        let mut out = Vec::new();

        while let Some((node, hops)) = queue.pop_front() {
            if depth.is_some_and(|max| hops >= max) {
                continue;
            }
            for next in self.graph.neighbors_directed(node, direction) {
                if seen.insert(next) {
                    if let Some(path) = self.graph.node_weight(next) {
                        out.push(path.clone());
                    }
                    queue.push_back((next, hops + 1));
                }
            }
        }

        out.sort();
        out
    }
}
