//! Project synchronization and authenticated folder access.

use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::db::models::ProjectRecord;
use crate::drive::{RemoteFile, UploadedFile};
use crate::error::SlateError;
use crate::handlers::is_allowed_upload_mime;
use crate::middleware::auth::{RequireAdminKey, RequireApiKey};
use crate::router::SlateState;
use crate::sync::{SyncRequest, paths, structure, synchronize};

/// Upper bound on one batch existence check.
const MAX_EXISTS_BATCH: usize = 25;

fn budget_document(project: &ProjectRecord) -> Value {
    serde_json::from_str(&project.budget).unwrap_or(Value::Null)
}

async fn load_project(state: &SlateState, id: &str) -> Result<ProjectRecord, SlateError> {
    state
        .projects
        .get(id)
        .await?
        .ok_or(SlateError::NotFound("project"))
}

fn require_root(project: &ProjectRecord) -> Result<String, SlateError> {
    project
        .drive_root_folder_id
        .clone()
        .ok_or_else(|| SlateError::Validation("project has no drive folder yet".to_string()))
}

#[derive(Debug, Default, Deserialize)]
pub struct SyncBody {
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Serialize)]
pub struct SyncResponse {
    pub root_id: String,
    pub recreated: bool,
}

/// POST /projects/{id}/drive/sync
pub async fn sync_project(
    _auth: RequireAdminKey,
    State(state): State<SlateState>,
    Path(id): Path<String>,
    body: Option<Json<SyncBody>>,
) -> Result<Json<SyncResponse>, SlateError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();

    // Serialize all tree mutation for this project; released on every exit
    // path when the guard drops. The record is loaded under the lock so the
    // stored root already reflects any synchronization we waited behind.
    let _guard = state.locks.acquire(&id).await;
    let project = load_project(&state, &id).await?;

    if body.force && project.drive_root_folder_id.is_some() {
        state.projects.clear_drive_root(&id).await?;
    }
    let existing_root_id = if body.force {
        None
    } else {
        project.drive_root_folder_id.clone()
    };

    let parent_folder_id = state
        .connections
        .get()
        .await?
        .and_then(|conn| conn.root_folder_id);

    let budget = budget_document(&project);
    let request = SyncRequest {
        job_id: project.job_id.clone(),
        name: project.name.clone(),
        client_name: project.client.clone(),
        team: structure::team_member_names(&budget),
        cast: structure::cast_member_names(&budget),
        cost_items_by_department: structure::cost_items_by_department(&budget),
        existing_root_id,
        parent_folder_id,
    };

    let outcome = synchronize(state.drive.as_ref(), &request).await?;
    state.projects.set_drive_root(&id, &outcome.root_id).await?;

    info!(project = %id, root = %outcome.root_id, recreated = outcome.recreated, "sync finished");
    Ok(Json(SyncResponse {
        root_id: outcome.root_id,
        recreated: outcome.recreated,
    }))
}

#[derive(Debug, Deserialize)]
pub struct FolderQuery {
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Serialize)]
pub struct FolderContents {
    pub folder_id: String,
    pub files: Vec<RemoteFile>,
}

/// GET /projects/{id}/drive/folder?path=Team/Ada — read-only, no creation.
pub async fn folder_contents(
    _auth: RequireApiKey,
    State(state): State<SlateState>,
    Path(id): Path<String>,
    Query(query): Query<FolderQuery>,
) -> Result<Json<FolderContents>, SlateError> {
    let project = load_project(&state, &id).await?;
    let root = require_root(&project)?;

    let folder_id = paths::resolve_existing(state.drive.as_ref(), &root, &query.path)
        .await?
        .ok_or(SlateError::NotFound("folder"))?;
    let files = state.drive.list_files(&folder_id).await?;
    Ok(Json(FolderContents { folder_id, files }))
}

#[derive(Debug, Deserialize)]
pub struct ExistsBody {
    pub paths: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ExistsResponse {
    pub results: Vec<bool>,
}

/// POST /projects/{id}/drive/exists — batch, bounded, non-mutating.
pub async fn exists_batch(
    _auth: RequireApiKey,
    State(state): State<SlateState>,
    Path(id): Path<String>,
    Json(body): Json<ExistsBody>,
) -> Result<Json<ExistsResponse>, SlateError> {
    if body.paths.len() > MAX_EXISTS_BATCH {
        return Err(SlateError::Validation(format!(
            "at most {MAX_EXISTS_BATCH} paths per request"
        )));
    }
    let project = load_project(&state, &id).await?;
    let root = require_root(&project)?;

    let mut results = Vec::with_capacity(body.paths.len());
    for path in &body.paths {
        results.push(paths::exists(state.drive.as_ref(), &root, path).await?);
    }
    Ok(Json(ExistsResponse { results }))
}

pub struct UploadParts {
    pub path: String,
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
    pub department: Option<String>,
}

/// Pull the expected fields out of a multipart body. The MIME type comes
/// from the part header, falling back to a guess from the file name.
pub async fn read_upload_multipart(mut multipart: Multipart) -> Result<UploadParts, SlateError> {
    let mut path = String::new();
    let mut department = None;
    let mut file: Option<(String, String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| SlateError::Validation(format!("invalid multipart body: {e}")))?
    {
        match field.name() {
            Some("path") => {
                path = field
                    .text()
                    .await
                    .map_err(|e| SlateError::Validation(format!("invalid path field: {e}")))?;
            }
            Some("department") => {
                department = Some(field.text().await.map_err(|e| {
                    SlateError::Validation(format!("invalid department field: {e}"))
                })?);
            }
            Some("file") => {
                let file_name = field
                    .file_name()
                    .map(str::to_string)
                    .filter(|n| !n.is_empty())
                    .ok_or_else(|| {
                        SlateError::Validation("file part needs a filename".to_string())
                    })?;
                let mime_type = match field.content_type() {
                    Some(ct) => ct.to_string(),
                    None => mime_guess::from_path(&file_name)
                        .first_or_octet_stream()
                        .essence_str()
                        .to_string(),
                };
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| SlateError::Validation(format!("invalid file field: {e}")))?;
                file = Some((file_name, mime_type, bytes.to_vec()));
            }
            _ => {}
        }
    }

    let (file_name, mime_type, bytes) =
        file.ok_or_else(|| SlateError::Validation("missing file part".to_string()))?;
    if !is_allowed_upload_mime(&mime_type) {
        return Err(SlateError::Validation(format!(
            "file type {mime_type} is not allowed; documents and images only"
        )));
    }
    Ok(UploadParts {
        path,
        file_name,
        mime_type,
        bytes,
        department,
    })
}

/// POST /projects/{id}/drive/upload — multipart `path` + `file`.
pub async fn upload_file(
    _auth: RequireApiKey,
    State(state): State<SlateState>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Json<UploadedFile>, SlateError> {
    let parts = read_upload_multipart(multipart).await?;

    // Creating missing path segments mutates the tree: take the lock, and
    // read the root under it so a concurrent forced re-sync cannot swap the
    // root out from underneath this upload.
    let _guard = state.locks.acquire(&id).await;
    let project = load_project(&state, &id).await?;
    let root = require_root(&project)?;
    let folder_id = paths::resolve_or_create(state.drive.as_ref(), &root, &parts.path).await?;
    let uploaded = state
        .drive
        .upload_file(&folder_id, &parts.file_name, &parts.mime_type, parts.bytes)
        .await?;
    info!(project = %id, file = %parts.file_name, "file uploaded");
    Ok(Json(uploaded))
}
