//! Integration tests for the resource providers.

use arbor_resource::{
    ChangeKind, MemoryResourceProvider, ResourceProvider, StdResourceProvider, WatchMessage,
};
use std::path::{Path, PathBuf};

/// Events for one root arrive in mutation order.
#[test]
fn test_memory_events_are_fifo_per_root() {
    let fs = MemoryResourceProvider::new();
    fs.write_file(Path::new("/a/lib/x.dart"), "");
    let mut sub = fs.watch(Path::new("/a")).unwrap();

    fs.write_file(Path::new("/a/lib/y.dart"), "");
    fs.write_file(Path::new("/a/lib/x.dart"), "changed");
    fs.remove_file(Path::new("/a/lib/y.dart"));

    let mut seen = Vec::new();
    while let Some(WatchMessage::Event(event)) = sub.try_next() {
        seen.push((event.path, event.kind));
    }
    assert_eq!(
        seen,
        vec![
            (PathBuf::from("/a/lib/y.dart"), ChangeKind::Created),
            (PathBuf::from("/a/lib/x.dart"), ChangeKind::Modified),
            (PathBuf::from("/a/lib/y.dart"), ChangeKind::Deleted),
        ]
    );
}

/// Two subscriptions over nested roots both observe a change below them.
#[test]
fn test_memory_nested_roots_both_notified() {
    let fs = MemoryResourceProvider::new();
    fs.write_file(Path::new("/a/sub/lib/y.dart"), "");
    let mut outer = fs.watch(Path::new("/a")).unwrap();
    let mut inner = fs.watch(Path::new("/a/sub")).unwrap();

    fs.write_file(Path::new("/a/sub/lib/z.dart"), "");

    assert!(matches!(outer.try_next(), Some(WatchMessage::Event(_))));
    assert!(matches!(inner.try_next(), Some(WatchMessage::Event(_))));
}

/// The async receive path delivers the same events as polling.
#[tokio::test]
async fn test_memory_async_receive() {
    let fs = MemoryResourceProvider::new();
    fs.make_dir(Path::new("/a"));
    let mut sub = fs.watch(Path::new("/a")).unwrap();

    fs.write_file(Path::new("/a/x.dart"), "");

    match sub.next().await {
        Some(WatchMessage::Event(event)) => {
            assert_eq!(event.path, PathBuf::from("/a/x.dart"));
            assert_eq!(event.kind, ChangeKind::Created);
        }
        other => panic!("unexpected message: {:?}", other),
    }
}

/// The std provider agrees with the memory provider on listing shape.
#[test]
fn test_std_listing_matches_memory_semantics() {
    let temp_dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(temp_dir.path().join("lib")).unwrap();
    std::fs::write(temp_dir.path().join("pubspec.yaml"), "name: demo\n").unwrap();
    std::fs::write(temp_dir.path().join("lib/x.dart"), "").unwrap();

    let provider = StdResourceProvider::new();
    let entries = provider.list_dir(temp_dir.path()).unwrap();
    let names: Vec<String> = entries
        .iter()
        .map(|e| e.path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["lib", "pubspec.yaml"]);
    assert!(entries[0].is_dir);
    assert!(!entries[1].is_dir);

    assert_eq!(
        provider
            .read_to_string(&temp_dir.path().join("pubspec.yaml"))
            .unwrap(),
        "name: demo\n"
    );
}
