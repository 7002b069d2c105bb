//! Minimal capability surface the sync engine needs from the storage
//! provider, plus the Google Drive v3 implementation of it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::io::Write;
use std::sync::Arc;
use tracing::debug;

use crate::drive::oauth::TokenLifecycle;
use crate::error::SlateError;

const DRIVE_FILES_URL: &str = "https://www.googleapis.com/drive/v3/files";
const DRIVE_UPLOAD_URL: &str = "https://www.googleapis.com/upload/drive/v3/files";
const FOLDER_MIME: &str = "application/vnd.google-apps.folder";
const PAGE_SIZE: u32 = 1000;

#[derive(Debug, Clone, PartialEq)]
pub struct RemoteChild {
    pub id: String,
    pub name: String,
    pub is_folder: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemoteFile {
    pub id: String,
    pub name: String,
    pub view_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadedFile {
    pub id: String,
    pub view_url: Option<String>,
}

/// What the core consumes from the provider. Tests substitute a recording
/// double; production uses [`DriveClient`].
#[async_trait]
pub trait RemoteFolderClient: Send + Sync {
    async fn list_children(&self, folder_id: &str) -> Result<Vec<RemoteChild>, SlateError>;
    async fn create_folder(&self, parent_id: &str, name: &str) -> Result<String, SlateError>;
    async fn upload_file(
        &self,
        parent_id: &str,
        name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadedFile, SlateError>;
    async fn list_files(&self, folder_id: &str) -> Result<Vec<RemoteFile>, SlateError>;
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFileMeta {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    web_view_link: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFileList {
    #[serde(default)]
    files: Vec<DriveFileMeta>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// Google Drive v3 client. Each call obtains a currently-valid access token
/// from the lifecycle manager, so a near-expiry token is refreshed lazily
/// before the request goes out.
#[derive(Clone)]
pub struct DriveClient {
    lifecycle: Arc<TokenLifecycle>,
    http: reqwest::Client,
}

impl DriveClient {
    pub fn new(lifecycle: Arc<TokenLifecycle>, http: reqwest::Client) -> Self {
        Self { lifecycle, http }
    }

    async fn list_page(
        &self,
        token: &str,
        query: &str,
        page_token: Option<&str>,
    ) -> Result<DriveFileList, SlateError> {
        let page_size = PAGE_SIZE.to_string();
        let mut req = self
            .http
            .get(DRIVE_FILES_URL)
            .bearer_auth(token)
            .query(&[
                ("q", query),
                ("fields", "nextPageToken,files(id,name,mimeType,webViewLink)"),
                ("pageSize", page_size.as_str()),
            ]);
        if let Some(pt) = page_token {
            req = req.query(&[("pageToken", pt)]);
        }
        let resp = req.send().await?;
        let resp = Self::check_status(resp, "list folder contents").await?;
        Ok(resp.json().await?)
    }

    async fn list_all(&self, folder_id: &str) -> Result<Vec<DriveFileMeta>, SlateError> {
        let token = self.lifecycle.valid_access_token().await?;
        let query = format!("'{}' in parents and trashed = false", escape_query(folder_id));
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let page = self
                .list_page(&token, &query, page_token.as_deref())
                .await?;
            files.extend(page.files);
            match page.next_page_token {
                Some(pt) => page_token = Some(pt),
                None => break,
            }
        }
        Ok(files)
    }

    /// Turn provider-side failures into [`SlateError::Remote`]. A 404 on a
    /// folder id means external tampering with the tree and is surfaced,
    /// never repaired here.
    async fn check_status(
        resp: reqwest::Response,
        what: &str,
    ) -> Result<reqwest::Response, SlateError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let detail = resp.text().await.unwrap_or_default();
        debug!(status = %status, detail = %detail, "drive call failed: {what}");
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(SlateError::Remote(format!("{what}: folder not found")));
        }
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(SlateError::RemoteAuth(format!("{what}: token rejected")));
        }
        Err(SlateError::Remote(format!("{what}: provider returned {status}")))
    }
}

/// Single quotes are the only character with meaning inside a Drive query
/// string literal.
fn escape_query(raw: &str) -> String {
    raw.replace('\'', "\\'")
}

fn upload_boundary() -> String {
    format!("slatedrive-{:032x}", rand::random::<u128>())
}

fn multipart_related_body(
    boundary: &str,
    metadata: &serde_json::Value,
    mime_type: &str,
    bytes: &[u8],
) -> Result<Vec<u8>, SlateError> {
    let mut body = Vec::with_capacity(bytes.len() + 512);
    write!(
        body,
        "--{boundary}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{metadata}\r\n--{boundary}\r\nContent-Type: {mime_type}\r\n\r\n"
    )
    .map_err(|e| SlateError::Remote(format!("upload body assembly failed: {e}")))?;
    body.extend_from_slice(bytes);
    write!(body, "\r\n--{boundary}--\r\n")
        .map_err(|e| SlateError::Remote(format!("upload body assembly failed: {e}")))?;
    Ok(body)
}

#[async_trait]
impl RemoteFolderClient for DriveClient {
    async fn list_children(&self, folder_id: &str) -> Result<Vec<RemoteChild>, SlateError> {
        let files = self.list_all(folder_id).await?;
        Ok(files
            .into_iter()
            .map(|f| RemoteChild {
                id: f.id,
                name: f.name,
                is_folder: f.mime_type == FOLDER_MIME,
            })
            .collect())
    }

    async fn create_folder(&self, parent_id: &str, name: &str) -> Result<String, SlateError> {
        let token = self.lifecycle.valid_access_token().await?;
        let resp = self
            .http
            .post(DRIVE_FILES_URL)
            .bearer_auth(&token)
            .query(&[("fields", "id")])
            .json(&json!({
                "name": name,
                "mimeType": FOLDER_MIME,
                "parents": [parent_id],
            }))
            .send()
            .await?;
        let resp = Self::check_status(resp, "create folder").await?;
        let meta: DriveFileMeta = resp.json().await?;
        debug!(folder = %name, id = %meta.id, "created drive folder");
        Ok(meta.id)
    }

    async fn upload_file(
        &self,
        parent_id: &str,
        name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadedFile, SlateError> {
        let token = self.lifecycle.valid_access_token().await?;

        // Drive's multipart upload wants multipart/related, which reqwest's
        // form-data builder cannot produce; assemble the body by hand. The
        // boundary is randomized per upload so file bytes can never collide
        // with it.
        let boundary = upload_boundary();
        let metadata = json!({ "name": name, "parents": [parent_id] });
        let body = multipart_related_body(&boundary, &metadata, mime_type, &bytes)?;

        let resp = self
            .http
            .post(DRIVE_UPLOAD_URL)
            .bearer_auth(&token)
            .query(&[("uploadType", "multipart"), ("fields", "id,webViewLink")])
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={boundary}"),
            )
            .body(body)
            .send()
            .await?;
        let resp = Self::check_status(resp, "upload file").await?;
        let meta: DriveFileMeta = resp.json().await?;
        Ok(UploadedFile {
            id: meta.id,
            view_url: meta.web_view_link,
        })
    }

    async fn list_files(&self, folder_id: &str) -> Result<Vec<RemoteFile>, SlateError> {
        let files = self.list_all(folder_id).await?;
        Ok(files
            .into_iter()
            .filter(|f| f.mime_type != FOLDER_MIME)
            .map(|f| RemoteFile {
                id: f.id,
                name: f.name,
                view_url: f.web_view_link,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_boundaries_are_unique_per_call() {
        assert_ne!(upload_boundary(), upload_boundary());
    }

    #[test]
    fn upload_body_frames_payload_with_its_own_boundary() {
        let boundary = upload_boundary();
        // Payload that contains another call's boundary must not break the
        // framing of this one.
        let payload = format!("pretend pdf mentioning --{}--", upload_boundary());
        let body =
            multipart_related_body(&boundary, &json!({"name": "f"}), "text/plain", payload.as_bytes())
                .unwrap();

        let text = String::from_utf8(body).unwrap();
        assert_eq!(text.matches(&format!("--{boundary}")).count(), 3);
        assert!(text.contains(&payload));
        assert!(text.ends_with(&format!("\r\n--{boundary}--\r\n")));
    }
}
