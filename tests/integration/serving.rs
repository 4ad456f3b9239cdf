//! Integration tests for serving a granted local directory over HTTP

use handlefs::host::{DirRef, LocalDirectory, LocalHost};
use handlefs::serve::{inject, routes, Interceptor, ServerState, DEFAULT_PREFIX};
use handlefs::store::{IndexLocation, PersistedIndex};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

struct Served {
    _temp_dir: TempDir,
    site: PathBuf,
    state: Arc<ServerState>,
}

async fn served_site() -> Served {
    let temp_dir = TempDir::new().unwrap();
    let site = temp_dir.path().join("site");
    fs::create_dir_all(site.join("docs")).unwrap();
    fs::write(
        site.join("index.html"),
        "<!doctype html><html><head><title>t</title></head><body></body></html>",
    )
    .unwrap();
    fs::write(site.join("docs/index.html"), "<html><head></head></html>").unwrap();
    fs::write(site.join("docs/read me.txt"), "plain").unwrap();
    fs::write(site.join("style.css"), "body {}").unwrap();

    let location = IndexLocation::new(temp_dir.path().join("index"));
    let dir: DirRef = Arc::new(LocalDirectory::open(&site).unwrap());
    PersistedIndex::new(location.clone())
        .register_root(&dir)
        .await
        .unwrap();

    let interceptor = Interceptor::new(Arc::new(LocalHost::new()), location, DEFAULT_PREFIX);
    Served {
        _temp_dir: temp_dir,
        site,
        state: Arc::new(ServerState::new(interceptor, None)),
    }
}

async fn get(served: &Served, path: &str) -> warp::http::Response<bytes::Bytes> {
    warp::test::request()
        .method("GET")
        .path(path)
        .reply(&routes(Arc::clone(&served.state)))
        .await
}

/// Test that the root document is served with instrumentation inside its head
#[tokio::test]
async fn test_root_document_is_instrumented() {
    let served = served_site().await;
    let response = get(&served, "/entries/index.html").await;

    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["content-type"], "text/html");
    let body = String::from_utf8(response.body().to_vec()).unwrap();
    let marker = body.find(inject::INSTRUMENTATION_MARKER).unwrap();
    assert!(marker < body.find("</head>").unwrap());
    assert_eq!(body.matches(inject::INSTRUMENTATION_MARKER).count(), 1);
}

/// Test that nested index documents are instrumented too, and other files are not
#[tokio::test]
async fn test_only_index_documents_are_instrumented() {
    let served = served_site().await;

    let nested = get(&served, "/entries/docs/index.html").await;
    assert!(inject::is_instrumented(nested.body()));

    let css = get(&served, "/entries/style.css").await;
    assert_eq!(css.headers()["content-type"], "text/css");
    assert_eq!(&css.body()[..], b"body {}");
}

/// Test that query strings are ignored and escapes decoded
#[tokio::test]
async fn test_query_and_percent_escapes() {
    let served = served_site().await;
    let response = get(&served, "/entries/docs/read%20me.txt?v=3").await;

    assert_eq!(response.status(), 200);
    assert_eq!(&response.body()[..], b"plain");
}

/// Test that edits on disk are visible on the next request
#[tokio::test]
async fn test_serves_current_content() {
    let served = served_site().await;
    assert_eq!(get(&served, "/entries/new.txt").await.status(), 404);

    fs::write(served.site.join("new.txt"), "fresh").unwrap();
    let response = get(&served, "/entries/new.txt").await;
    assert_eq!(response.status(), 200);
    assert_eq!(&response.body()[..], b"fresh");
}

/// Test that directories and paths outside the prefix pass through
#[tokio::test]
async fn test_passthrough_cases() {
    let served = served_site().await;

    assert_eq!(get(&served, "/entries/docs").await.status(), 404);
    assert_eq!(get(&served, "/index.html").await.status(), 404);
    assert_eq!(get(&served, "/entries/missing.js").await.status(), 404);
}

/// Test that a file stored under a decomposed name is served for either spelling
#[tokio::test]
async fn test_decomposed_file_name_is_served() {
    let served = served_site().await;
    fs::write(served.site.join("docs/cafe\u{301}.txt"), "menu").unwrap();

    for path in ["/entries/docs/cafe%CC%81.txt", "/entries/docs/caf%C3%A9.txt"] {
        let response = get(&served, path).await;
        assert_eq!(response.status(), 200, "{path}");
        assert_eq!(&response.body()[..], b"menu");
    }
}
