//! Rename sequences replayed through a change listener
//!
//! Each listener event is built from the disk state at the time it is read, so
//! the final table depends on which names still exist when the notification
//! is processed. These tests pin the observable outcome for the common shapes.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fsindex::watcher::decode::{FILE_ACTION_RENAMED_NEW_NAME, FILE_ACTION_RENAMED_OLD_NAME};
use fsindex::watcher::RawNotification;
use fsindex::{FileRecord, FolderFilter};

use crate::common::{self, TestStore, TestTree};

struct AllowAll;

impl FolderFilter for AllowAll {
    fn is_excluded(&self, _: &Path) -> bool {
        false
    }
}

fn rename_from(path: PathBuf) -> RawNotification {
    RawNotification::new(FILE_ACTION_RENAMED_OLD_NAME, path)
}

fn rename_to(path: PathBuf) -> RawNotification {
    RawNotification::new(FILE_ACTION_RENAMED_NEW_NAME, path)
}

fn replay(fixture: &TestStore, tree: &TestTree, batch: Vec<RawNotification>) {
    common::replay(fixture, tree, Arc::new(AllowAll), batch);
}

fn seed(fixture: &TestStore, tree: &TestTree, relative: &str) {
    let volume = tree.path().to_string_lossy();
    let record = FileRecord::stat(&tree.join(relative), &volume).unwrap();
    fixture.store.upsert(&record).unwrap();
}

fn stored(fixture: &TestStore, tree: &TestTree, relative: &str) -> bool {
    let target = tree.join(relative).to_string_lossy().into_owned();
    fixture.paths().contains(&target)
}

#[test]
fn rename_moves_the_record() {
    let tree = TestTree::new();
    let fixture = TestStore::new();
    tree.add_file("a.txt", 3);
    seed(&fixture, &tree, "a.txt");
    fs::rename(tree.join("a.txt"), tree.join("b.txt")).unwrap();

    replay(&fixture, &tree, vec![rename_from(tree.join("a.txt")), rename_to(tree.join("b.txt"))]);

    assert!(!stored(&fixture, &tree, "a.txt"));
    assert!(stored(&fixture, &tree, "b.txt"));
    assert_eq!(fixture.store.count().unwrap(), 1);
}

#[test]
fn rename_and_back_restores_original() {
    let tree = TestTree::new();
    let fixture = TestStore::new();
    tree.add_file("a.txt", 3);
    seed(&fixture, &tree, "a.txt");
    fs::rename(tree.join("a.txt"), tree.join("b.txt")).unwrap();
    fs::rename(tree.join("b.txt"), tree.join("a.txt")).unwrap();

    replay(
        &fixture,
        &tree,
        vec![
            rename_from(tree.join("a.txt")),
            rename_to(tree.join("b.txt")),
            rename_from(tree.join("b.txt")),
            rename_to(tree.join("a.txt")),
        ],
    );

    assert!(stored(&fixture, &tree, "a.txt"));
    assert!(!stored(&fixture, &tree, "b.txt"));
    assert_eq!(fixture.store.count().unwrap(), 1);
}

#[test]
fn out_of_order_pairs_drop_the_vanished_name() {
    let tree = TestTree::new();
    let fixture = TestStore::new();
    tree.add_file("a.txt", 3);
    seed(&fixture, &tree, "a.txt");
    fs::rename(tree.join("a.txt"), tree.join("b.txt")).unwrap();

    // The new-name half of the first pair arrives for a path that is gone.
    replay(
        &fixture,
        &tree,
        vec![
            rename_from(tree.join("b.txt")),
            rename_to(tree.join("a.txt")),
            rename_from(tree.join("a.txt")),
            rename_to(tree.join("b.txt")),
        ],
    );

    assert!(!stored(&fixture, &tree, "a.txt"));
    assert!(stored(&fixture, &tree, "b.txt"));
}

#[test]
fn rename_to_then_from_on_empty_store_leaves_nothing() {
    let tree = TestTree::new();
    let fixture = TestStore::new();

    replay(&fixture, &tree, vec![rename_to(tree.join("a.txt")), rename_from(tree.join("a.txt"))]);

    assert!(!stored(&fixture, &tree, "a.txt"));
    assert_eq!(fixture.store.count().unwrap(), 0);
}

#[test]
fn held_events_land_after_release() {
    let tree = TestTree::new();
    let fixture = TestStore::new();
    tree.add_file("late.txt", 1);

    fixture.store.hold_live_events().unwrap();
    replay(
        &fixture,
        &tree,
        vec![RawNotification::new(
            fsindex::watcher::decode::FILE_ACTION_ADDED,
            tree.join("late.txt"),
        )],
    );
    assert_eq!(fixture.store.count().unwrap(), 0);

    fixture.store.release_live_events().unwrap();
    fixture.store.flush().unwrap();
    assert!(stored(&fixture, &tree, "late.txt"));
}
