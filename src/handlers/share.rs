//! Capability-token issuance and the unauthenticated expense-link surface.

use axum::{
    Json,
    extract::{Multipart, Path, State},
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::db::models::ProjectRecord;
use crate::drive::{RemoteFile, RemoteFolderClient, UploadedFile};
use crate::error::SlateError;
use crate::handlers::sync::read_upload_multipart;
use crate::middleware::auth::RequireAdminKey;
use crate::router::SlateState;
use crate::share::{SharePayload, department_slug, token::SHARE_TOKEN_TTL_DAYS};
use crate::sync::paths;
use crate::sync::project::EXPENSES_FOLDER;

#[derive(Debug, Deserialize)]
pub struct IssueBody {
    pub department: String,
}

#[derive(Debug, Serialize)]
pub struct IssuedLink {
    pub token: String,
    pub department: String,
    pub expires_at: DateTime<Utc>,
}

/// POST /projects/{id}/share — issue a token scoped to one department.
pub async fn issue_share_link(
    _auth: RequireAdminKey,
    State(state): State<SlateState>,
    Path(id): Path<String>,
    Json(body): Json<IssueBody>,
) -> Result<Json<IssuedLink>, SlateError> {
    if body.department.trim().is_empty() {
        return Err(SlateError::Validation("department must not be empty".to_string()));
    }
    state
        .projects
        .get(&id)
        .await?
        .ok_or(SlateError::NotFound("project"))?;

    let token = state.share.sign(&id, &body.department)?;
    info!(project = %id, department = %body.department, "share link issued");
    Ok(Json(IssuedLink {
        token,
        department: department_slug(&body.department),
        expires_at: Utc::now() + Duration::days(SHARE_TOKEN_TTL_DAYS),
    }))
}

/// Load the project a verified payload points at. A vanished project is
/// reported exactly like a bad token; link consumers learn nothing.
async fn project_and_root(
    state: &SlateState,
    payload: &SharePayload,
) -> Result<(ProjectRecord, String), SlateError> {
    let project = state
        .projects
        .get(&payload.project_id)
        .await?
        .ok_or(SlateError::TokenInvalid)?;
    let root = project
        .drive_root_folder_id
        .clone()
        .ok_or_else(|| SlateError::Validation("project has no drive folder yet".to_string()))?;
    Ok((project, root))
}

/// Locate the expense folder whose name slugs to the token's department.
async fn find_department_folder<C>(
    client: &C,
    root: &str,
    slug: &str,
) -> Result<Option<String>, SlateError>
where
    C: RemoteFolderClient + ?Sized,
{
    let Some(expenses_id) = paths::resolve_existing(client, root, EXPENSES_FOLDER).await? else {
        return Ok(None);
    };
    let children = client.list_children(&expenses_id).await?;
    Ok(children
        .into_iter()
        .find(|c| c.is_folder && department_slug(&c.name) == slug)
        .map(|c| c.id))
}

/// POST /share/{token}/upload — multipart `department` + `file`, no session.
pub async fn share_upload(
    State(state): State<SlateState>,
    Path(token): Path<String>,
    multipart: Multipart,
) -> Result<Json<UploadedFile>, SlateError> {
    let payload = state.share.verify(&token)?;
    let parts = read_upload_multipart(multipart).await?;

    // The submitted label must slug back to exactly the department the
    // token was issued for.
    let label = parts
        .department
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .ok_or(SlateError::TokenInvalid)?;
    if department_slug(label) != payload.department {
        return Err(SlateError::TokenInvalid);
    }

    let _guard = state.locks.acquire(&payload.project_id).await;
    let (project, root) = project_and_root(&state, &payload).await?;

    // Uploads join the folder whose name slugs to the department, however
    // the consumer spelled the label; a fresh folder is created only when no
    // slug-equivalent sibling exists, so listing and uploading through the
    // same link always see one folder.
    let folder_id =
        match find_department_folder(state.drive.as_ref(), &root, &payload.department).await? {
            Some(id) => id,
            None => {
                paths::resolve_or_create(
                    state.drive.as_ref(),
                    &root,
                    &format!("{EXPENSES_FOLDER}/{label}"),
                )
                .await?
            }
        };
    let uploaded = state
        .drive
        .upload_file(&folder_id, &parts.file_name, &parts.mime_type, parts.bytes)
        .await?;
    info!(project = %project.id, department = %payload.department, "expense uploaded via share link");
    Ok(Json(uploaded))
}

#[derive(Debug, Serialize)]
pub struct SharedFiles {
    pub department: String,
    pub files: Vec<RemoteFile>,
}

/// GET /share/{token}/files — list the department's expense files.
pub async fn share_files(
    State(state): State<SlateState>,
    Path(token): Path<String>,
) -> Result<Json<SharedFiles>, SlateError> {
    let payload = state.share.verify(&token)?;
    let (_project, root) = project_and_root(&state, &payload).await?;

    let files = match find_department_folder(state.drive.as_ref(), &root, &payload.department)
        .await?
    {
        Some(folder_id) => state.drive.list_files(&folder_id).await?,
        None => Vec::new(),
    };
    Ok(Json(SharedFiles {
        department: payload.department,
        files,
    }))
}
