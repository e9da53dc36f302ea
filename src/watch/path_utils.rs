// src/watch/path_utils.rs

//! Path helpers shared by the watcher and the package index.

use std::path::{Path, PathBuf};

/// Convert a path into a string relative to `root`, with forward slashes.
///
/// Tries a plain `strip_prefix` first, then retries with both sides
/// canonicalised (symlinked temp dirs, `/private/var` on macOS). A path
/// equal to `root` yields `"."`.
///
/// Returns `None` if the path cannot be reasonably related to `root`.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    if let Ok(rel) = path.strip_prefix(root) {
        return Some(to_slash(rel));
    }

    // A removed file cannot be canonicalised; fall back to its parent.
    let path_canon = path.canonicalize().ok().or_else(|| {
        let parent = path.parent()?.canonicalize().ok()?;
        Some(parent.join(path.file_name()?))
    });

    if let (Ok(root_canon), Some(path_canon)) = (root.canonicalize(), path_canon)
        && let Ok(rel) = path_canon.strip_prefix(&root_canon)
    {
        return Some(to_slash(rel));
    }

    None
}

fn to_slash(rel: &Path) -> String {
    let s = rel.to_string_lossy().replace('\\', "/");
    if s.is_empty() { ".".to_string() } else { s }
}

/// Package directory of a relative file path (`"pkg/a/a.go"` → `"pkg/a"`,
/// `"main.go"` → `"."`).
pub fn package_dir_of(rel_file: &Path) -> PathBuf {
    match rel_file.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
