//! Folder exclusion applied during a walk

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use fsindex::watcher::decode::FILE_ACTION_ADDED;
use fsindex::watcher::RawNotification;
use fsindex::{FilterConfig, FolderFilterPolicy, Reconciler};

use crate::common::{self, TestStore, TestTree};

fn policy(tree: &TestTree, config: FilterConfig, data_dir: PathBuf) -> Arc<FolderFilterPolicy> {
    Arc::new(FolderFilterPolicy::from_config(&config, &data_dir, &[tree.path().to_path_buf()]).unwrap())
}

fn no_defaults() -> FilterConfig {
    FilterConfig {
        hidden: false,
        system: false,
        folders: Vec::new(),
        name_patterns: Vec::new(),
    }
}

#[test]
fn excluded_folder_is_never_descended() {
    let tree = TestTree::new();
    tree.add_file("Windows/System32/a.txt", 4).add_file("Users/me/notes.txt", 2);
    let fixture = TestStore::new();
    let config = FilterConfig {
        folders: vec![tree.join("Windows").to_string_lossy().into_owned()],
        ..no_defaults()
    };

    let stats = Reconciler::new(
        fixture.store.clone(),
        policy(&tree, config, fixture.dir.path().to_path_buf()),
        CancellationToken::new(),
    )
    .scan_volume(&tree.volume());

    assert_eq!(stats.skipped_dirs, 1);
    // root, Users, Users/me, notes.txt
    assert_eq!(stats.visited, 4);
    assert!(fixture.store.query("a.txt", 10).unwrap().is_empty());
    assert!(fixture.store.query("System32", 10).unwrap().is_empty());
    assert!(fixture.store.query("Windows", 10).unwrap().is_empty());
    assert_eq!(fixture.store.query("notes", 10).unwrap().len(), 1);
}

#[test]
fn hidden_folders_below_root_are_skipped() {
    let tree = TestTree::new();
    tree.add_file(".cache/blob.bin", 8).add_file("visible/keep.txt", 1);
    let fixture = TestStore::new();
    let config = FilterConfig {
        hidden: true,
        ..no_defaults()
    };

    let stats = Reconciler::new(
        fixture.store.clone(),
        policy(&tree, config, fixture.dir.path().to_path_buf()),
        CancellationToken::new(),
    )
    .scan_volume(&tree.volume());

    assert_eq!(stats.skipped_dirs, 1);
    assert!(fixture.store.query("blob", 10).unwrap().is_empty());
    assert_eq!(fixture.store.query("keep", 10).unwrap().len(), 1);
}

#[test]
fn name_patterns_exclude_matching_folders() {
    let tree = TestTree::new();
    tree.add_file("node_modules/pkg/index.js", 10)
        .add_file("src/main.js", 10);
    let fixture = TestStore::new();
    let config = FilterConfig {
        name_patterns: vec!["^node_modules$".to_string()],
        ..no_defaults()
    };

    Reconciler::new(
        fixture.store.clone(),
        policy(&tree, config, fixture.dir.path().to_path_buf()),
        CancellationToken::new(),
    )
    .scan_volume(&tree.volume());

    assert!(fixture.store.query("index.js", 10).unwrap().is_empty());
    assert_eq!(fixture.store.query("main.js", 10).unwrap().len(), 1);
}

#[test]
fn own_data_directory_is_excluded() {
    let tree = TestTree::new();
    tree.add_file("state/index.db", 16).add_file("docs/readme.md", 3);
    let fixture = TestStore::new();

    Reconciler::new(
        fixture.store.clone(),
        policy(&tree, no_defaults(), tree.join("state")),
        CancellationToken::new(),
    )
    .scan_volume(&tree.volume());

    assert!(fixture.store.query("index.db", 10).unwrap().is_empty());
    assert_eq!(fixture.store.query("readme", 10).unwrap().len(), 1);
}

#[test]
fn live_events_inside_excluded_folder_agree_with_scan() {
    let tree = TestTree::new();
    tree.add_file("node_modules/pkg/index.js", 10)
        .add_file("node_modules/pkg/lib/util.js", 10)
        .add_file("src/main.js", 10);
    let config = FilterConfig {
        name_patterns: vec!["^node_modules$".to_string()],
        ..no_defaults()
    };

    let scanned = TestStore::new();
    let filter = policy(&tree, config, scanned.dir.path().to_path_buf());
    Reconciler::new(scanned.store.clone(), filter.clone(), CancellationToken::new())
        .scan_volume(&tree.volume());

    let live = TestStore::new();
    common::replay(
        &live,
        &tree,
        filter,
        vec![
            RawNotification::new(FILE_ACTION_ADDED, tree.join("node_modules/pkg/index.js")),
            RawNotification::new(FILE_ACTION_ADDED, tree.join("node_modules/pkg/lib")),
            RawNotification::new(FILE_ACTION_ADDED, tree.join("node_modules/pkg/lib/util.js")),
            RawNotification::new(FILE_ACTION_ADDED, tree.join("src/main.js")),
        ],
    );

    for store in [&scanned, &live] {
        assert!(store.store.query("index.js", 10).unwrap().is_empty());
        assert!(store.store.query("util.js", 10).unwrap().is_empty());
        assert!(store.store.query("lib", 10).unwrap().is_empty());
        assert_eq!(store.store.query("main.js", 10).unwrap().len(), 1);
    }
}
