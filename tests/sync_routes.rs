mod common;

use std::fs;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

use common::RecordingDrive;
use slatedrive::config::Config;
use slatedrive::db::models::ProjectRecord;
use slatedrive::db::projects::ProjectStore;
use slatedrive::router::{SlateState, slatedrive_router};
use slatedrive::share::ShareTokenCodec;
use slatedrive::sync::paths;

const ADMIN_KEY: &str = "test-admin-key";
const API_KEY: &str = "test-api-key";
const SHARE_SECRET: &str = "test-share-secret";
const ROOT_NAME: &str = "J-100 - Nordlicht - ACME";

fn test_config(database_url: String) -> Config {
    Config {
        database_url,
        listen: "127.0.0.1:0".to_string(),
        loglevel: "warn".to_string(),
        admin_key: ADMIN_KEY.to_string(),
        api_key: API_KEY.to_string(),
        share_secret: Some(SHARE_SECRET.to_string()),
        cookie_key: None,
        drive_client_id: None,
        drive_client_secret: None,
        drive_redirect_url: "http://localhost:8000/drive/oauth/callback".to_string(),
    }
}

struct TestApp {
    app: axum::Router,
    projects: ProjectStore,
    drive: Arc<RecordingDrive>,
    db_path: std::path::PathBuf,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.db_path);
    }
}

/// App wired to the in-memory remote double instead of the real provider.
async fn spawn_app(tag: &str) -> TestApp {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before UNIX_EPOCH")
        .as_nanos();

    let mut db_path = std::env::temp_dir();
    db_path.push(format!(
        "slatedrive-{tag}-{}-{}.sqlite",
        std::process::id(),
        nanos
    ));

    let database_url = format!("sqlite:{}", db_path.display());
    let pool = slatedrive::db::spawn(&database_url).await.expect("db open");
    slatedrive::db::init_schema(&pool).await.expect("schema");

    let cfg = test_config(database_url);
    let projects = ProjectStore::new(pool.clone());
    let drive = Arc::new(RecordingDrive::new());
    let state = SlateState::with_remote(&cfg, pool, drive.clone()).expect("state");
    TestApp {
        app: slatedrive_router(state),
        projects,
        drive,
        db_path,
    }
}

async fn seed_project(projects: &ProjectStore, id: &str) {
    let budget = json!({
        "prep": {
            "Camera": {"rows": [
                {"kind": "labor", "name": "Ada"},
                {"kind": "cost", "name": "Lens rental"}
            ]}
        }
    });
    projects
        .upsert(&ProjectRecord {
            id: id.to_string(),
            job_id: "J-100".to_string(),
            name: "Nordlicht".to_string(),
            client: "ACME".to_string(),
            budget: budget.to_string(),
            drive_root_folder_id: None,
        })
        .await
        .expect("seed project");
}

async fn body_json(resp: axum::response::Response) -> Value {
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    serde_json::from_slice(&bytes).expect("response body was not JSON")
}

async fn sync_once(app: &axum::Router, id: &str) -> axum::response::Response {
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/projects/{id}/drive/sync"))
                .header("x-slate-key", ADMIN_KEY)
                .header("content-type", "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .expect("request failed")
}

fn multipart_upload(uri: &str, key: Option<&str>, department: Option<&str>, mime: &str) -> Request<Body> {
    let b = "test-boundary";
    let mut body = String::new();
    if let Some(dept) = department {
        body.push_str(&format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"department\"\r\n\r\n{dept}\r\n"
        ));
    }
    body.push_str(&format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"receipt.pdf\"\r\nContent-Type: {mime}\r\n\r\n%PDF\r\n--{b}--\r\n"
    ));

    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", format!("multipart/form-data; boundary={b}"));
    if let Some(key) = key {
        builder = builder.header("x-slate-key", key);
    }
    builder.body(Body::from(body)).unwrap()
}

#[tokio::test]
async fn first_sync_builds_the_structure_from_the_budget() {
    let t = spawn_app("structure").await;
    seed_project(&t.projects, "prj-1").await;

    let resp = sync_once(&t.app, "prj-1").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["recreated"], true);

    let root = body["root_id"].as_str().expect("root_id missing");
    assert_eq!(t.drive.children_named("root", ROOT_NAME), 1);
    for fixed in ["Contracts", "Call Sheets", "Team", "Cast", "Expenses"] {
        assert_eq!(t.drive.children_named(root, fixed), 1, "folder: {fixed}");
    }
    assert!(paths::exists(t.drive.as_ref(), root, "Team/Ada").await.unwrap());
    assert!(paths::exists(t.drive.as_ref(), root, "Expenses/Camera").await.unwrap());

    let stored = t.projects.get("prj-1").await.unwrap().unwrap();
    assert_eq!(stored.drive_root_folder_id.as_deref(), Some(root));
}

#[tokio::test]
async fn concurrent_first_syncs_agree_on_one_root() {
    let t = spawn_app("concurrent-sync").await;
    seed_project(&t.projects, "prj-1").await;

    let (a, b) = tokio::join!(sync_once(&t.app, "prj-1"), sync_once(&t.app, "prj-1"));
    assert_eq!(a.status(), StatusCode::OK);
    assert_eq!(b.status(), StatusCode::OK);
    let a = body_json(a).await;
    let b = body_json(b).await;

    // Whichever request lost the lock race must reuse the winner's root,
    // not create and persist a second one.
    assert_eq!(a["root_id"], b["root_id"]);
    assert_ne!(a["recreated"], b["recreated"]);
    assert_eq!(t.drive.children_named("root", ROOT_NAME), 1);
    // Root, the five fixed folders, Team/Ada and Expenses/Camera, each once.
    assert_eq!(t.drive.create_calls(), 8);

    let stored = t.projects.get("prj-1").await.unwrap().unwrap();
    assert_eq!(stored.drive_root_folder_id, a["root_id"].as_str().map(str::to_string));
}

#[tokio::test]
async fn share_upload_joins_the_slug_matched_folder() {
    let t = spawn_app("share-slug").await;
    seed_project(&t.projects, "prj-1").await;

    let resp = sync_once(&t.app, "prj-1").await;
    let root = body_json(resp).await["root_id"]
        .as_str()
        .expect("root_id missing")
        .to_string();

    let codec = ShareTokenCodec::new(Some(SHARE_SECRET));
    let token = codec.sign("prj-1", "Camera").unwrap();

    // Sync created "Expenses/Camera"; the consumer spells it "camera".
    let resp = t
        .app
        .clone()
        .oneshot(multipart_upload(
            &format!("/share/{token}/upload"),
            None,
            Some("camera"),
            "application/pdf",
        ))
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::OK);

    // No lowercase sibling next to the existing folder.
    let expenses = paths::resolve_existing(t.drive.as_ref(), &root, "Expenses")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(t.drive.children_named(&expenses, "Camera"), 1);
    assert_eq!(t.drive.children_named(&expenses, "camera"), 0);

    // The same link lists the file it just uploaded.
    let resp = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(format!("/share/{token}/files"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["files"][0]["name"], "receipt.pdf");
}

#[tokio::test]
async fn disallowed_upload_mime_is_rejected_before_any_remote_call() {
    let t = spawn_app("mime-gate").await;
    seed_project(&t.projects, "prj-1").await;
    sync_once(&t.app, "prj-1").await;
    let uploads_after_sync = t.drive.upload_calls();

    let resp = t
        .app
        .clone()
        .oneshot(multipart_upload(
            "/projects/prj-1/drive/upload",
            Some(API_KEY),
            None,
            "application/x-msdownload",
        ))
        .await
        .expect("request failed");

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = body_json(resp).await;
    assert_eq!(body["error"]["code"], "VALIDATION");
    assert_eq!(t.drive.upload_calls(), uploads_after_sync);
}
