//! End-to-end workspace scenarios against a real directory on disk

use handlefs::error::ApiError;
use handlefs::host::{DirRef, LocalDirectory, LocalHost};
use handlefs::serve::{inject, Interception, Interceptor, DEFAULT_PREFIX};
use handlefs::store::IndexLocation;
use handlefs::tree::entry::EntryKind;
use handlefs::workspace::{ChangeOutcome, Workspace};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

struct Site {
    _temp_dir: TempDir,
    root: PathBuf,
    workspace: Workspace,
}

async fn granted_site() -> Site {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("project");
    fs::create_dir_all(root.join("src/components")).unwrap();
    fs::create_dir_all(root.join("public")).unwrap();
    fs::write(root.join("index.html"), "<html><head></head></html>").unwrap();
    fs::write(root.join("src/main.js"), "main()").unwrap();
    fs::write(root.join("src/components/button.js"), "button()").unwrap();
    fs::write(root.join("public/logo.svg"), "<svg/>").unwrap();

    let location = IndexLocation::new(temp_dir.path().join("index"));
    let workspace = Workspace::new(Arc::new(LocalHost::new()), location);
    let dir: DirRef = Arc::new(LocalDirectory::open(&root).unwrap());
    workspace.grant_handle(&dir).await.unwrap();

    Site {
        _temp_dir: temp_dir,
        root,
        workspace,
    }
}

/// Test that a fresh workspace has no root and refuses edits
#[tokio::test]
async fn test_ungranted_workspace() {
    let temp_dir = TempDir::new().unwrap();
    let workspace = Workspace::new(
        Arc::new(LocalHost::new()),
        IndexLocation::new(temp_dir.path().join("index")),
    );

    assert!(workspace.snapshot().await.unwrap().is_empty());
    assert!(workspace.tree().await.unwrap().is_none());
    let result = workspace.create("/", "a.txt", EntryKind::File).await;
    assert!(matches!(result, Err(ApiError::NoRoot)));
}

/// Test that the snapshot mirrors the granted directory
#[tokio::test]
async fn test_snapshot_after_grant() {
    let site = granted_site().await;
    let snapshot = site.workspace.snapshot().await.unwrap();

    assert!(snapshot.contains("/src/components/button.js"));
    assert!(snapshot.contains("/public/logo.svg"));
    assert_eq!(snapshot.files().count(), 4);
}

/// Test a sequence of edits, checked against the disk after each step
#[tokio::test]
async fn test_edit_sequence() {
    let site = granted_site().await;
    let ws = &site.workspace;

    let outcome = ws.create("/src", "lib", EntryKind::Directory).await.unwrap();
    assert!(outcome.is_applied());
    assert!(site.root.join("src/lib").is_dir());

    ws.write_file("/src/lib/util.js", b"util()").await.unwrap();
    assert_eq!(
        fs::read_to_string(site.root.join("src/lib/util.js")).unwrap(),
        "util()"
    );

    let outcome = ws.rename("/src/components", "widgets").await.unwrap();
    match &outcome {
        ChangeOutcome::Applied { snapshot, transfer } => {
            assert!(snapshot.contains("/src/widgets/button.js"));
            assert!(!snapshot.contains("/src/components"));
            let transfer = transfer.as_ref().unwrap();
            assert_eq!(transfer.files, 1);
            assert_eq!(transfer.bytes, "button()".len() as u64);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert!(site.root.join("src/widgets/button.js").is_file());
    assert!(!site.root.join("src/components").exists());

    let outcome = ws.move_to("/src/lib", "/public").await.unwrap();
    let snapshot = outcome.snapshot().unwrap();
    assert!(snapshot.contains("/public/lib/util.js"));
    assert!(site.root.join("public/lib/util.js").is_file());
    assert!(!site.root.join("src/lib").exists());

    ws.remove("/public").await.unwrap();
    assert!(!site.root.join("public").exists());

    let body = ws.read_file("/src/main.js").await.unwrap();
    assert_eq!(&body[..], b"main()");
}

/// Test that refused edits leave the disk untouched
#[tokio::test]
async fn test_refused_edits() {
    let site = granted_site().await;
    let ws = &site.workspace;

    let err = ws.move_to("/src", "/src/components").await.unwrap_err();
    assert!(matches!(err, ApiError::MoveIntoDescendant { .. }));

    fs::write(site.root.join("public/main.js"), "other").unwrap();
    let err = ws.move_to("/src/main.js", "/public").await.unwrap_err();
    assert!(matches!(err, ApiError::AlreadyExists(_)));
    assert_eq!(fs::read_to_string(site.root.join("src/main.js")).unwrap(), "main()");

    let err = ws.rename("/src/main.js", "main.js").await;
    assert!(matches!(err, Ok(ChangeOutcome::Unchanged(_))));

    let outcome = ws.remove("/nowhere").await.unwrap();
    assert!(matches!(outcome, ChangeOutcome::Missing(_)));

    let err = ws.read_file("/src").await.unwrap_err();
    assert!(matches!(err, ApiError::HostError(_)));
}

/// Test that a decomposed file name on disk is addressable by its composed path
#[tokio::test]
async fn test_decomposed_file_name_round_trip() {
    let site = granted_site().await;
    let ws = &site.workspace;
    let stored = site.root.join("public/cafe\u{301}.txt");
    fs::write(&stored, "menu").unwrap();

    let snapshot = ws.snapshot().await.unwrap();
    let entry = snapshot.get("/public/caf\u{e9}.txt").unwrap();
    assert_eq!(entry.name, "cafe\u{301}.txt");

    let body = ws.read_file("/public/caf\u{e9}.txt").await.unwrap();
    assert_eq!(&body[..], b"menu");

    ws.write_file("/public/caf\u{e9}.txt", b"new menu").await.unwrap();
    assert_eq!(fs::read_to_string(&stored).unwrap(), "new menu");
    assert_eq!(fs::read_dir(site.root.join("public")).unwrap().count(), 2);

    let outcome = ws.rename("/public/cafe\u{301}.txt", "menu.txt").await.unwrap();
    let ChangeOutcome::Applied { snapshot, .. } = outcome else {
        panic!("expected the rename to apply");
    };
    assert!(snapshot.contains("/public/menu.txt"));
    assert!(!snapshot.contains("/public/caf\u{e9}.txt"));
    assert!(!stored.exists());
    assert_eq!(fs::read_to_string(site.root.join("public/menu.txt")).unwrap(), "new menu");
}

/// Test that the grant survives a new workspace on the same store
#[tokio::test]
async fn test_grant_survives_restart() {
    let site = granted_site().await;
    let location = site.workspace.index().location().clone();

    let reopened = Workspace::new(Arc::new(LocalHost::new()), location);
    let status = reopened.status().await.unwrap();
    assert_eq!(status.root.unwrap().name, "project");
    assert_eq!(status.walk.unwrap().files, 4);
}

/// Test that a deleted root directory is reported rather than silently empty
#[tokio::test]
async fn test_vanished_root() {
    let site = granted_site().await;
    fs::remove_dir_all(&site.root).unwrap();

    let err = site.workspace.snapshot().await.unwrap_err();
    assert!(matches!(err, ApiError::StorageError(_)));
}

/// Test grant, rename and serve on a two-file project
#[tokio::test]
async fn test_grant_rename_serve_scenario() {
    let temp_dir = TempDir::new().unwrap();
    let proj = temp_dir.path().join("proj");
    fs::create_dir_all(proj.join("sub")).unwrap();
    fs::write(proj.join("index.html"), "<html><head></head><body>hi</body></html>").unwrap();
    fs::write(proj.join("sub/a.js"), "console.log('a')").unwrap();

    let location = IndexLocation::new(temp_dir.path().join("index"));
    let host = Arc::new(LocalHost::new());
    let workspace = Workspace::new(host.clone(), location.clone());
    let dir: DirRef = Arc::new(LocalDirectory::open(&proj).unwrap());
    workspace.grant_handle(&dir).await.unwrap();

    let paths: Vec<String> = workspace
        .snapshot()
        .await
        .unwrap()
        .paths()
        .map(str::to_string)
        .collect();
    assert_eq!(paths, vec!["/", "/index.html", "/sub", "/sub/a.js"]);

    workspace.rename("/sub", "components").await.unwrap();
    let snapshot = workspace.snapshot().await.unwrap();
    let paths: Vec<&str> = snapshot.paths().collect();
    assert_eq!(paths, vec!["/", "/components", "/components/a.js", "/index.html"]);
    let body = workspace.read_file("/components/a.js").await.unwrap();
    assert_eq!(&body[..], b"console.log('a')");

    let interceptor = Interceptor::new(host, location, DEFAULT_PREFIX);
    match interceptor.intercept("/entries/index.html").await {
        Interception::Respond(file) => {
            assert!(file.injected);
            let text = String::from_utf8(file.body.to_vec()).unwrap();
            assert_eq!(text.matches(inject::INSTRUMENTATION_MARKER).count(), 1);
            assert!(text.contains("<body>hi</body>"));
        }
        Interception::Passthrough => panic!("root document was not served"),
    }
}
