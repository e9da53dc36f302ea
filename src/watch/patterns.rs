// src/watch/patterns.rs

use std::fmt;

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::config::model::WatchSection;

/// Excludes applied on top of whatever the config lists.
///
/// Hidden directories cover `.git` and the `.sentinel/` state dir.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    "**/.*/**",
    "**/vendor/**",
    "**/node_modules/**",
    "**/*~",
    "**/*.swp",
];

/// Compiled include/exclude globs, evaluated against paths relative to the
/// project root (e.g. `"pkg/store/store.go"`).
#[derive(Clone)]
pub struct PathFilter {
    include: GlobSet,
    include_all: bool,
    exclude: GlobSet,
}

impl fmt::Debug for PathFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathFilter")
            .field("include_patterns", &self.include.len())
            .field("exclude_patterns", &self.exclude.len())
            .finish_non_exhaustive()
    }
}

impl PathFilter {
    /// An empty `include` list accepts every path that is not excluded.
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self> {
        let include_set = build_globset(include).context("building include globset")?;

        let mut all_excludes: Vec<String> =
            DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect();
        all_excludes.extend(exclude.iter().cloned());
        let exclude_set = build_globset(&all_excludes).context("building exclude globset")?;

        Ok(Self {
            include: include_set,
            include_all: include.is_empty(),
            exclude: exclude_set,
        })
    }

    pub fn from_config(watch: &WatchSection) -> Result<Self> {
        Self::new(&watch.include, &watch.exclude)
    }

    /// Returns true if a file at `rel_path` should be reported.
    pub fn matches(&self, rel_path: &str) -> bool {
        if self.exclude.is_match(rel_path) {
            return false;
        }
        self.include_all || self.include.is_match(rel_path)
    }

    /// Returns true if nothing under the directory `rel_dir` can match, so a
    /// walk may skip it entirely.
    pub fn excludes_dir(&self, rel_dir: &str) -> bool {
        if rel_dir.is_empty() || rel_dir == "." {
            return false;
        }
        let probe = format!("{}/__probe__", rel_dir.trim_end_matches('/'));
        self.exclude.is_match(&probe)
    }
}

/// Build a GlobSet from simple string patterns.
fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat).with_context(|| format!("invalid glob pattern: {pat}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}
