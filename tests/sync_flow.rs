mod common;

use std::collections::BTreeMap;
use std::sync::Arc;

use common::RecordingDrive;
use slatedrive::sync::{ProjectLocks, SyncRequest, paths, synchronize};

fn request(existing_root_id: Option<String>) -> SyncRequest {
    let mut cost = BTreeMap::new();
    cost.insert("Camera".to_string(), vec!["Lens rental".to_string()]);
    SyncRequest {
        job_id: "J-100".to_string(),
        name: "Nordlicht".to_string(),
        client_name: "ACME".to_string(),
        team: vec!["Ada".to_string(), "Grace".to_string()],
        cast: vec!["Marta".to_string()],
        cost_items_by_department: cost,
        existing_root_id,
        parent_folder_id: None,
    }
}

#[tokio::test]
async fn resolve_or_create_is_idempotent() {
    let drive = RecordingDrive::new();
    let first = paths::resolve_or_create(&drive, "root", "Team/Ada").await.unwrap();
    let creates_after_first = drive.create_calls();
    let second = paths::resolve_or_create(&drive, "root", "Team/Ada").await.unwrap();

    assert_eq!(first, second);
    assert_eq!(drive.create_calls(), creates_after_first);
    assert_eq!(drive.children_named("root", "Team"), 1);
}

#[tokio::test]
async fn empty_path_resolves_to_the_root_itself() {
    let drive = RecordingDrive::new();
    let id = paths::resolve_or_create(&drive, "root", "").await.unwrap();
    assert_eq!(id, "root");
    assert_eq!(drive.create_calls(), 0);
}

#[tokio::test]
async fn exists_is_false_before_and_true_after_creation() {
    let drive = RecordingDrive::new();
    assert!(!paths::exists(&drive, "root", "Team/Ada").await.unwrap());
    paths::resolve_or_create(&drive, "root", "Team/Ada").await.unwrap();
    assert!(paths::exists(&drive, "root", "Team/Ada").await.unwrap());
    // exists never created the missing prefix ahead of time.
    assert_eq!(drive.children_named("root", "Team"), 1);
}

#[tokio::test]
async fn exists_does_not_mutate() {
    let drive = RecordingDrive::new();
    assert!(!paths::exists(&drive, "root", "Team/Ada/Receipts").await.unwrap());
    assert_eq!(drive.create_calls(), 0);
}

#[tokio::test]
async fn second_sync_with_same_root_creates_nothing() {
    let drive = RecordingDrive::new();

    let first = synchronize(&drive, &request(None)).await.unwrap();
    assert!(first.recreated);
    let creates_after_first = drive.create_calls();

    let second = synchronize(&drive, &request(Some(first.root_id.clone())))
        .await
        .unwrap();
    assert!(!second.recreated);
    assert_eq!(second.root_id, first.root_id);
    assert_eq!(drive.create_calls(), creates_after_first);
}

#[tokio::test]
async fn reconciliation_is_additive_only() {
    let drive = RecordingDrive::new();
    let first = synchronize(&drive, &request(None)).await.unwrap();
    let creates_after_first = drive.create_calls();

    // One member joined, one left.
    let mut req = request(Some(first.root_id.clone()));
    req.team = vec!["Ada".to_string(), "Niko".to_string()];
    let second = synchronize(&drive, &req).await.unwrap();

    assert!(!second.recreated);
    assert_eq!(drive.create_calls(), creates_after_first + 1);

    let team_id = paths::resolve_existing(&drive, &first.root_id, "Team")
        .await
        .unwrap()
        .unwrap();
    // Grace's folder survives her removal from the team.
    assert_eq!(drive.children_named(&team_id, "Grace"), 1);
    assert_eq!(drive.children_named(&team_id, "Niko"), 1);
}

#[tokio::test]
async fn forced_recreation_yields_a_fresh_root() {
    let drive = RecordingDrive::new();
    let first = synchronize(&drive, &request(None)).await.unwrap();
    let second = synchronize(&drive, &request(None)).await.unwrap();

    assert!(first.recreated);
    assert!(second.recreated);
    assert_ne!(first.root_id, second.root_id);
}

#[tokio::test]
async fn duplicate_member_names_share_one_folder() {
    let drive = RecordingDrive::new();
    let mut req = request(None);
    req.team = vec!["Ada".to_string(), "Ada".to_string()];
    let outcome = synchronize(&drive, &req).await.unwrap();

    let team_id = paths::resolve_existing(&drive, &outcome.root_id, "Team")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(drive.children_named(&team_id, "Ada"), 1);
}

#[tokio::test]
async fn uploads_land_in_the_resolved_folder() {
    use slatedrive::drive::RemoteFolderClient;

    let drive = RecordingDrive::new();
    let folder = paths::resolve_or_create(&drive, "root", "Expenses/Camera")
        .await
        .unwrap();
    let uploaded = drive
        .upload_file(&folder, "receipt.pdf", "application/pdf", b"%PDF".to_vec())
        .await
        .unwrap();

    assert_eq!(drive.upload_calls(), 1);
    let files = drive.list_files(&folder).await.unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].id, uploaded.id);
    assert_eq!(files[0].name, "receipt.pdf");
}

#[tokio::test]
async fn concurrent_resolution_under_the_lock_creates_each_segment_once() {
    let drive = Arc::new(RecordingDrive::new());
    let locks = ProjectLocks::new();

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let drive = drive.clone();
        let locks = locks.clone();
        tasks.push(tokio::spawn(async move {
            let _guard = locks.acquire("prj-1").await;
            paths::resolve_or_create(drive.as_ref(), "root", "Expenses/Camera")
                .await
                .unwrap()
        }));
    }

    let mut ids = Vec::new();
    for task in tasks {
        ids.push(task.await.unwrap());
    }

    // Two segments, each created exactly once, every caller saw the same id.
    assert_eq!(drive.create_calls(), 2);
    assert_eq!(drive.children_named("root", "Expenses"), 1);
    ids.dedup();
    assert_eq!(ids.len(), 1);
}
