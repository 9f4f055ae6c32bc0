//! Substring and glob query dispatch

use fsindex::QueryMode;

use crate::common::{record, TestStore};

fn seeded(paths: &[&str]) -> TestStore {
    let fixture = TestStore::new();
    let records: Vec<_> = paths.iter().map(|p| record(p, 1)).collect();
    fixture.store.upsert_batch(&records).unwrap();
    fixture
}

fn names(fixture: &TestStore, pattern: &str) -> Vec<String> {
    let mut names: Vec<_> = fixture
        .store
        .query(pattern, 100)
        .unwrap()
        .into_iter()
        .map(|r| r.name)
        .collect();
    names.sort();
    names
}

#[test]
fn substring_is_case_insensitive() {
    let fixture = seeded(&["C:\\docs\\Report.TXT", "C:\\docs\\annual-report.pdf", "C:\\docs\\memo.txt"]);
    assert_eq!(names(&fixture, "report"), vec!["Report.TXT", "annual-report.pdf"]);
    assert_eq!(names(&fixture, "REPORT"), vec!["Report.TXT", "annual-report.pdf"]);
}

#[test]
fn substring_folds_ascii_case_only() {
    let fixture = seeded(&["C:\\docs\\ÉTÉ.txt", "C:\\docs\\Été-notes.md"]);
    assert_eq!(names(&fixture, "été"), Vec::<String>::new());
    assert_eq!(names(&fixture, "ÉTÉ"), vec!["ÉTÉ.txt"]);
    assert_eq!(names(&fixture, "Été"), vec!["Été-notes.md"]);
    assert_eq!(names(&fixture, "TXT"), vec!["ÉTÉ.txt"]);
}

#[test]
fn substring_matches_name_only() {
    let fixture = seeded(&["C:\\report\\notes.txt", "C:\\misc\\report.txt"]);
    assert_eq!(names(&fixture, "report"), vec!["report.txt"]);
}

#[test]
fn glob_only_when_pattern_has_metacharacters() {
    let fixture = seeded(&["C:\\a\\abtxtc", "C:\\a\\photo.txt"]);

    assert_eq!(QueryMode::for_pattern("txt"), QueryMode::Substring);
    assert_eq!(names(&fixture, "txt"), vec!["abtxtc", "photo.txt"]);

    assert_eq!(QueryMode::for_pattern("*.txt"), QueryMode::Glob);
    assert_eq!(names(&fixture, "*.txt"), vec!["photo.txt"]);
}

#[test]
fn glob_is_case_sensitive_and_supports_classes() {
    let fixture = seeded(&["C:\\p\\IMG_01.JPG", "C:\\p\\img_02.jpg", "C:\\p\\img_x3.jpg"]);

    assert_eq!(names(&fixture, "*.jpg"), vec!["img_02.jpg", "img_x3.jpg"]);
    assert_eq!(names(&fixture, "img_0?.jpg"), vec!["img_02.jpg"]);
    assert_eq!(names(&fixture, "img_[^0]*"), vec!["img_x3.jpg"]);
    assert_eq!(names(&fixture, "[iI]MG_*"), vec!["IMG_01.JPG"]);
}

#[test]
fn empty_store_returns_nothing() {
    let fixture = TestStore::new();
    assert!(fixture.store.query("anything", 10).unwrap().is_empty());
    assert!(fixture.store.query("*", 10).unwrap().is_empty());
}
