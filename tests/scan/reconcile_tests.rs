//! Rebuild semantics: reset, rescan and cancellation

use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use fsindex::{ChangeEvent, ChangeKind, FolderFilter, Reconciler, VolumeConfig};

use crate::common::{record, TestStore, TestTree};

struct Nothing;

impl FolderFilter for Nothing {
    fn is_excluded(&self, _: &Path) -> bool {
        false
    }
}

fn sample_tree() -> TestTree {
    let tree = TestTree::new();
    tree.add_file("docs/a.txt", 1)
        .add_file("docs/b.txt", 2)
        .add_file("media/c.png", 3)
        .add_dir("empty");
    tree
}

#[test]
fn reset_then_rescan_restores_count() {
    let tree = sample_tree();
    let fixture = TestStore::new();
    let reconciler = Reconciler::new(fixture.store.clone(), Arc::new(Nothing), CancellationToken::new());

    let first = reconciler.rebuild(&[tree.volume()]).unwrap();
    let indexed = fixture.store.count().unwrap();
    // root, docs, media, empty, a.txt, b.txt, c.png
    assert_eq!(indexed, 7);
    assert_eq!(first.recorded, 7);

    fixture.store.reset().unwrap();
    assert_eq!(fixture.store.count().unwrap(), 0);

    reconciler.rebuild(&[tree.volume()]).unwrap();
    assert_eq!(fixture.store.count().unwrap(), indexed);
}

#[test]
fn rebuild_drops_records_for_vanished_files() {
    let tree = sample_tree();
    let fixture = TestStore::new();
    fixture.store.upsert(&record("/nowhere/ghost.txt", 9)).unwrap();

    Reconciler::new(fixture.store.clone(), Arc::new(Nothing), CancellationToken::new())
        .rebuild(&[tree.volume()])
        .unwrap();

    assert!(fixture.store.query("ghost", 10).unwrap().is_empty());
    assert_eq!(fixture.store.query("c.png", 10).unwrap()[0].size, 3);
}

#[test]
fn rebuild_covers_every_enabled_volume() {
    let first = sample_tree();
    let second = TestTree::new();
    second.add_file("other.log", 5);
    let disabled = TestTree::new();
    disabled.add_file("skipped.log", 5);
    let fixture = TestStore::new();

    let stats = Reconciler::new(fixture.store.clone(), Arc::new(Nothing), CancellationToken::new())
        .with_batch_size(2)
        .rebuild(&[
            first.volume(),
            second.volume(),
            VolumeConfig {
                enabled: false,
                ..disabled.volume()
            },
        ])
        .unwrap();

    assert_eq!(stats.recorded, 9);
    assert_eq!(fixture.store.query("other.log", 10).unwrap().len(), 1);
    assert!(fixture.store.query("skipped", 10).unwrap().is_empty());
}

#[test]
fn missing_volume_counts_an_error() {
    let fixture = TestStore::new();
    let gone = TestTree::new().path().join("missing");

    let stats = Reconciler::new(fixture.store.clone(), Arc::new(Nothing), CancellationToken::new())
        .scan_volume(&VolumeConfig::new(gone.to_string_lossy()));

    assert_eq!(stats.recorded, 0);
    assert!(stats.errors >= 1);
}

#[test]
fn cancelled_rebuild_writes_nothing() {
    let tree = sample_tree();
    let fixture = TestStore::new();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let stats = Reconciler::new(fixture.store.clone(), Arc::new(Nothing), cancel)
        .rebuild(&[tree.volume(), tree.volume()])
        .unwrap();

    assert!(stats.cancelled);
    assert_eq!(stats.visited, 0);
    assert_eq!(fixture.store.count().unwrap(), 0);
}

#[test]
fn live_changes_held_during_rebuild_win_over_scan() {
    let tree = sample_tree();
    let fixture = TestStore::new();
    let notifier = fixture.store.notifier();
    let scanned_path = tree.join("docs/a.txt").to_string_lossy().into_owned();

    fixture.store.hold_live_events().unwrap();
    notifier
        .send(ChangeEvent::upsert(ChangeKind::Added, record("/live/arrived.bin", 11)))
        .unwrap();
    notifier
        .send(ChangeEvent::removal(ChangeKind::Removed, scanned_path.clone()))
        .unwrap();

    Reconciler::new(fixture.store.clone(), Arc::new(Nothing), CancellationToken::new())
        .rebuild(&[tree.volume()])
        .unwrap();
    fixture.store.flush().unwrap();
    assert!(fixture.paths().contains(&scanned_path));
    assert!(fixture.store.query("arrived", 10).unwrap().is_empty());

    fixture.store.release_live_events().unwrap();
    fixture.store.flush().unwrap();

    assert_eq!(fixture.store.query("arrived.bin", 10).unwrap()[0].size, 11);
    assert!(!fixture.paths().contains(&scanned_path));
    assert_eq!(fixture.store.count().unwrap(), 7);
}
