//! `search` and `open` called directly on the handler

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::CallToolResult;

use fsindex::mcp_server::{FileOpener, OpenRequest, SearchRequest};
use fsindex::FileIndexServer;

use crate::common::{record, TestStore};

fn seeded() -> TestStore {
    let fixture = TestStore::new();
    fixture
        .store
        .upsert_batch(&[
            record("C:\\data\\report.txt", 2048),
            record("C:\\data\\image.png", 5_000_000),
        ])
        .unwrap();
    fixture
}

fn text(result: &CallToolResult) -> String {
    result.content[0]
        .as_text()
        .map(|t| t.text.clone())
        .unwrap_or_default()
}

fn search(filename: &str, limit: Option<i64>) -> Parameters<SearchRequest> {
    Parameters(SearchRequest {
        filename: filename.to_string(),
        limit,
    })
}

#[tokio::test]
async fn search_returns_csv_with_human_sizes() {
    let fixture = seeded();
    let server = FileIndexServer::new(fixture.store.clone());

    let result = server.search(search("report", None)).await.unwrap();
    assert_ne!(result.is_error, Some(true));

    let body = text(&result);
    let mut lines = body.lines();
    assert_eq!(
        lines.next(),
        Some("name,isDirectory,path,extension,volume,modifiedTime,size")
    );
    let row = lines.next().unwrap();
    assert!(row.starts_with("report.txt,false,C:\\data\\report.txt,txt,C:\\,"));
    assert!(row.ends_with(",2.0KB"));
    assert_eq!(lines.next(), None);
}

#[tokio::test]
async fn glob_search_honours_limit() {
    let fixture = seeded();
    fixture
        .store
        .upsert(&record("C:\\data\\second.png", 10))
        .unwrap();
    let server = FileIndexServer::new(fixture.store.clone());

    let body = text(&server.search(search("*.png", Some(1))).await.unwrap());
    assert_eq!(body.lines().count(), 2);

    let body = text(&server.search(search("image.png", None)).await.unwrap());
    assert!(body.lines().nth(1).unwrap().ends_with(",4.8MB"));
}

#[tokio::test]
async fn non_positive_limit_falls_back_to_default() {
    let fixture = TestStore::new();
    let records: Vec<_> = (0..150)
        .map(|i| record(&format!("C:\\bulk\\item{:03}.dat", i), 1))
        .collect();
    fixture.store.upsert_batch(&records).unwrap();
    let server = FileIndexServer::new(fixture.store.clone());

    for limit in [None, Some(0), Some(-5)] {
        let body = text(&server.search(search("item", limit)).await.unwrap());
        assert_eq!(body.lines().count(), 101, "limit {:?}", limit);
    }
}

#[tokio::test]
async fn empty_result_is_a_tool_error() {
    let fixture = seeded();
    let server = FileIndexServer::new(fixture.store.clone());

    let result = server.search(search("zzz", None)).await.unwrap();
    assert_eq!(result.is_error, Some(true));
    assert!(text(&result).contains("no files found"));
}

#[tokio::test]
async fn empty_filename_is_rejected() {
    let fixture = seeded();
    let server = FileIndexServer::new(fixture.store.clone());

    let result = server.search(search("", None)).await.unwrap();
    assert_eq!(result.is_error, Some(true));

    let result = server
        .open(Parameters(OpenRequest {
            filename: String::new(),
        }))
        .await
        .unwrap();
    assert_eq!(result.is_error, Some(true));
}

#[tokio::test]
async fn search_after_close_reports_failure() {
    let fixture = seeded();
    let server = FileIndexServer::new(fixture.store.clone());
    fixture.store.close();

    let result = server.search(search("report", None)).await.unwrap();
    assert_eq!(result.is_error, Some(true));
}

#[derive(Default)]
struct RecordingOpener {
    opened: Mutex<Vec<PathBuf>>,
    fail: bool,
}

impl FileOpener for RecordingOpener {
    fn open(&self, path: &Path) -> io::Result<()> {
        self.opened.lock().push(path.to_path_buf());
        if self.fail {
            Err(io::Error::new(io::ErrorKind::NotFound, "no handler"))
        } else {
            Ok(())
        }
    }
}

#[tokio::test]
async fn open_delegates_to_opener() {
    let fixture = seeded();
    let opener = Arc::new(RecordingOpener::default());
    let server = FileIndexServer::with_opener(fixture.store.clone(), opener.clone());

    let result = server
        .open(Parameters(OpenRequest {
            filename: "C:\\data\\report.txt".to_string(),
        }))
        .await
        .unwrap();

    assert_ne!(result.is_error, Some(true));
    assert_eq!(text(&result), "ok");
    assert_eq!(*opener.opened.lock(), vec![PathBuf::from("C:\\data\\report.txt")]);
}

#[tokio::test]
async fn open_failure_is_a_tool_error() {
    let fixture = seeded();
    let opener = Arc::new(RecordingOpener {
        fail: true,
        ..Default::default()
    });
    let server = FileIndexServer::with_opener(fixture.store.clone(), opener);

    let result = server
        .open(Parameters(OpenRequest {
            filename: "/missing".to_string(),
        }))
        .await
        .unwrap();

    assert_eq!(result.is_error, Some(true));
    assert!(text(&result).contains("no handler"));
}
