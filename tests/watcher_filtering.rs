// tests/watcher_filtering.rs

mod common;
use crate::common::{Outcome, init_tracing};

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::event::{AccessKind, CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Event, EventKind};
use tempfile::tempdir;

use sentinel::errors::SentinelError;
use sentinel::watch::{ChangeKind, PathFilter, SourceWatcher, classify};

fn go_filter() -> PathFilter {
    PathFilter::new(
        &["**/*.go".to_string(), "**/go.mod".to_string()],
        &["**/testdata/**".to_string()],
    )
    .expect("filter")
}

fn changes(event: Event) -> Vec<(PathBuf, ChangeKind)> {
    classify(&event, Path::new("/proj"), &go_filter())
        .into_iter()
        .map(|c| (c.path, c.kind))
        .collect()
}

#[test]
fn event_kinds_map_to_change_kinds() {
    let create = Event::new(EventKind::Create(CreateKind::File)).add_path("/proj/a/a.go".into());
    assert_eq!(changes(create), vec![(PathBuf::from("a/a.go"), ChangeKind::Created)]);

    let modify = Event::new(EventKind::Modify(ModifyKind::Any)).add_path("/proj/main.go".into());
    assert_eq!(changes(modify), vec![(PathBuf::from("main.go"), ChangeKind::Modified)]);

    let remove = Event::new(EventKind::Remove(RemoveKind::File)).add_path("/proj/go.mod".into());
    assert_eq!(changes(remove), vec![(PathBuf::from("go.mod"), ChangeKind::Removed)]);

    let access = Event::new(EventKind::Access(AccessKind::Any)).add_path("/proj/main.go".into());
    assert!(changes(access).is_empty());
}

#[test]
fn renames_become_remove_and_create() {
    let from = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::From)))
        .add_path("/proj/old.go".into());
    assert_eq!(changes(from), vec![(PathBuf::from("old.go"), ChangeKind::Removed)]);

    let to = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::To)))
        .add_path("/proj/new.go".into());
    assert_eq!(changes(to), vec![(PathBuf::from("new.go"), ChangeKind::Created)]);

    let both = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
        .add_path("/proj/old.go".into())
        .add_path("/proj/new.go".into());
    assert_eq!(
        changes(both),
        vec![
            (PathBuf::from("old.go"), ChangeKind::Removed),
            (PathBuf::from("new.go"), ChangeKind::Created),
        ]
    );
}

#[test]
fn filtered_paths_are_not_emitted() {
    for path in [
        "/proj/README.md",
        "/proj/vendor/x/x.go",
        "/proj/.git/index",
        "/proj/.sentinel/cache.json",
        "/proj/pkg/testdata/fixture.go",
        "/elsewhere/main.go",
    ] {
        let event = Event::new(EventKind::Modify(ModifyKind::Any)).add_path(path.into());
        assert!(changes(event).is_empty(), "{path} should be filtered");
    }
}

#[test]
fn missing_root_is_a_watch_setup_error() -> Outcome {
    init_tracing();
    let dir = tempdir()?;
    let watcher = SourceWatcher::new(dir.path(), vec![PathBuf::from("does-not-exist")], go_filter());

    match watcher.watch() {
        Err(SentinelError::WatchSetup { path, .. }) => {
            assert!(path.ends_with("does-not-exist"));
        }
        other => panic!("expected WatchSetup, got {:?}", other.map(|_| ())),
    }
    Ok(())
}

#[tokio::test]
async fn real_watcher_reports_go_file_changes() -> Outcome {
    init_tracing();
    let dir = tempdir()?;
    std::fs::create_dir_all(dir.path().join("pkg"))?;

    let watcher = SourceWatcher::new(dir.path(), vec![PathBuf::from(".")], go_filter());
    let mut stream = watcher.watch()?;

    // Give the OS watch a moment to attach.
    tokio::time::sleep(Duration::from_millis(100)).await;
    std::fs::write(dir.path().join("notes.txt"), "ignored")?;
    std::fs::write(dir.path().join("pkg/a.go"), "package pkg\n")?;

    let event = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match stream.recv().await {
                Some(ev) if ev.path == Path::new("pkg/a.go") => return Some(ev),
                Some(ev) => assert_ne!(ev.path, PathBuf::from("notes.txt")),
                None => return None,
            }
        }
    })
    .await?;

    assert!(event.is_some(), "watch stream closed without reporting pkg/a.go");
    Ok(())
}
