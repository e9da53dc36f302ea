// src/fs/mock.rs

use std::collections::{BTreeSet, HashMap};
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};

use anyhow::{Result, anyhow};

use super::FileSystem;

#[derive(Debug, Clone)]
pub enum MockEntry {
    File { content: Vec<u8>, modified: SystemTime },
    Dir(BTreeSet<String>),
}

/// In-memory filesystem for tests.
///
/// Paths are normalised (`./a/b` and `a/b` name the same entry). Every write
/// advances a logical clock so rewritten files get a fresh mtime.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    entries: Arc<Mutex<HashMap<PathBuf, MockEntry>>>,
    clock: Arc<AtomicU64>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        let fs = Self::default();
        fs.lock()
            .insert(PathBuf::from("."), MockEntry::Dir(BTreeSet::new()));
        fs
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let path = normalise(path.as_ref());
        let tick = self.clock.fetch_add(1, Ordering::SeqCst) + 1;
        let modified = SystemTime::UNIX_EPOCH + Duration::from_secs(tick);

        let mut entries = self.lock();
        entries.insert(
            path.clone(),
            MockEntry::File {
                content: content.into(),
                modified,
            },
        );
        link_into_parents(&mut entries, &path);
    }

    pub fn remove_file(&self, path: impl AsRef<Path>) {
        let path = normalise(path.as_ref());
        let mut entries = self.lock();
        entries.remove(&path);
        let (Some(parent), Some(name)) = (parent_of(&path), path.file_name()) else {
            return;
        };
        if let Some(MockEntry::Dir(children)) = entries.get_mut(&parent) {
            children.remove(&name.to_string_lossy().into_owned());
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PathBuf, MockEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Drop `.` components so lookups do not depend on how a path was spelled.
fn normalise(path: &Path) -> PathBuf {
    let cleaned: PathBuf = path
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();
    if cleaned.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        cleaned
    }
}

fn parent_of(path: &Path) -> Option<PathBuf> {
    match path.parent() {
        Some(p) if p.as_os_str().is_empty() => Some(PathBuf::from(".")),
        Some(p) => Some(p.to_path_buf()),
        None => None,
    }
}

fn link_into_parents(entries: &mut HashMap<PathBuf, MockEntry>, path: &Path) {
    let mut child = path.to_path_buf();
    while let Some(parent) = parent_of(&child) {
        let Some(name) = child.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            break;
        };
        let entry = entries
            .entry(parent.clone())
            .or_insert_with(|| MockEntry::Dir(BTreeSet::new()));
        match entry {
            MockEntry::Dir(children) => {
                children.insert(name);
            }
            MockEntry::File { .. } => break,
        }
        if parent == child {
            break;
        }
        child = parent;
    }
}

impl FileSystem for MockFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        let content = self.read(path)?;
        String::from_utf8(content).map_err(|e| anyhow!("Invalid UTF-8 in {:?}: {}", path, e))
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        match self.lock().get(&normalise(path)) {
            Some(MockEntry::File { content, .. }) => Ok(content.clone()),
            Some(MockEntry::Dir(_)) => Err(anyhow!("Is a directory: {:?}", path)),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        self.add_file(path, contents);
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.lock().contains_key(&normalise(path))
    }

    fn is_file(&self, path: &Path) -> bool {
        matches!(self.lock().get(&normalise(path)), Some(MockEntry::File { .. }))
    }

    fn is_dir(&self, path: &Path) -> bool {
        matches!(self.lock().get(&normalise(path)), Some(MockEntry::Dir(_)))
    }

    fn modified(&self, path: &Path) -> Result<SystemTime> {
        match self.lock().get(&normalise(path)) {
            Some(MockEntry::File { modified, .. }) => Ok(*modified),
            Some(MockEntry::Dir(_)) => Err(anyhow!("Is a directory: {:?}", path)),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    /// Children are joined onto `path` exactly as the caller spelled it.
    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        match self.lock().get(&normalise(path)) {
            Some(MockEntry::Dir(children)) => {
                Ok(children.iter().map(|name| path.join(name)).collect())
            }
            _ => Err(anyhow!("Not a directory or not found: {:?}", path)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_files_create_directory_chain() {
        let fs = MockFileSystem::new();
        fs.add_file("pkg/a/a.go", "package a");

        assert!(fs.is_dir(Path::new("pkg")));
        assert!(fs.is_dir(Path::new("./pkg/a")));
        assert_eq!(fs.read_dir(Path::new(".")).unwrap(), vec![PathBuf::from("./pkg")]);
        assert_eq!(fs.read_to_string(Path::new("./pkg/a/a.go")).unwrap(), "package a");
    }

    #[test]
    fn rewriting_a_file_advances_its_mtime() {
        let fs = MockFileSystem::new();
        fs.add_file("a.go", "v1");
        let first = fs.modified(Path::new("a.go")).unwrap();
        fs.add_file("a.go", "v2");
        assert!(fs.modified(Path::new("a.go")).unwrap() > first);
    }
}
