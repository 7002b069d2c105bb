use std::sync::Arc;
use std::time::Duration;

use axum::extract::{DefaultBodyLimit, FromRef};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use axum_extra::extract::cookie::Key;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::json;

use crate::config::Config;
use crate::db::SqlitePool;
use crate::db::connections::ConnectionStore;
use crate::db::projects::ProjectStore;
use crate::drive::{DriveClient, RemoteFolderClient, TokenLifecycle};
use crate::error::SlateError;
use crate::handlers::{connection, share, sync};
use crate::share::ShareTokenCodec;
use crate::sync::ProjectLocks;

/// Uploads run synchronously within the request; the reqwest client timeout
/// below is the fixed upper bound on their duration.
const HTTP_TIMEOUT: Duration = Duration::from_secs(60);
const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const UPLOAD_BODY_LIMIT: usize = 32 * 1024 * 1024;

#[derive(Clone)]
pub struct SlateState {
    pub connections: ConnectionStore,
    pub projects: ProjectStore,
    pub lifecycle: Arc<TokenLifecycle>,
    pub drive: Arc<dyn RemoteFolderClient>,
    pub share: ShareTokenCodec,
    pub locks: ProjectLocks,
    pub admin_key: Arc<str>,
    pub api_key: Arc<str>,
    cookie_key: Key,
}

impl FromRef<SlateState> for Key {
    fn from_ref(state: &SlateState) -> Self {
        state.cookie_key.clone()
    }
}

impl SlateState {
    pub fn new(cfg: &Config, pool: SqlitePool) -> Result<Self, SlateError> {
        let http = http_client(false)?;
        let oauth_http = http_client(true)?;

        let connections = ConnectionStore::new(pool.clone());
        let projects = ProjectStore::new(pool);
        let lifecycle = Arc::new(TokenLifecycle::new(connections.clone(), cfg, oauth_http));
        let drive: Arc<dyn RemoteFolderClient> = Arc::new(DriveClient::new(lifecycle.clone(), http));
        Self::assemble(cfg, connections, projects, lifecycle, drive)
    }

    /// Same wiring with the remote client substituted; route-level tests
    /// hand a recording double in here.
    pub fn with_remote(
        cfg: &Config,
        pool: SqlitePool,
        drive: Arc<dyn RemoteFolderClient>,
    ) -> Result<Self, SlateError> {
        let oauth_http = http_client(true)?;
        let connections = ConnectionStore::new(pool.clone());
        let projects = ProjectStore::new(pool);
        let lifecycle = Arc::new(TokenLifecycle::new(connections.clone(), cfg, oauth_http));
        Self::assemble(cfg, connections, projects, lifecycle, drive)
    }

    fn assemble(
        cfg: &Config,
        connections: ConnectionStore,
        projects: ProjectStore,
        lifecycle: Arc<TokenLifecycle>,
        drive: Arc<dyn RemoteFolderClient>,
    ) -> Result<Self, SlateError> {
        Ok(Self {
            connections,
            projects,
            lifecycle,
            drive,
            share: ShareTokenCodec::new(cfg.share_secret.as_deref()),
            locks: ProjectLocks::new(),
            admin_key: Arc::from(cfg.admin_key.as_str()),
            api_key: Arc::from(cfg.api_key.as_str()),
            cookie_key: cookie_key(cfg)?,
        })
    }
}

fn http_client(no_redirects: bool) -> Result<reqwest::Client, SlateError> {
    let mut builder = reqwest::Client::builder()
        .user_agent(concat!("slatedrive/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(HTTP_CONNECT_TIMEOUT)
        .timeout(HTTP_TIMEOUT);
    if no_redirects {
        // The oauth2 crate refuses clients that follow redirects.
        builder = builder.redirect(reqwest::redirect::Policy::none());
    }
    Ok(builder.build()?)
}

fn cookie_key(cfg: &Config) -> Result<Key, SlateError> {
    match cfg.cookie_key.as_deref() {
        Some(encoded) => {
            let bytes = STANDARD
                .decode(encoded)
                .map_err(|_| SlateError::Config("cookie_key is not valid base64".to_string()))?;
            if bytes.len() < 64 {
                return Err(SlateError::Config(
                    "cookie_key must decode to at least 64 bytes".to_string(),
                ));
            }
            Ok(Key::from(&bytes))
        }
        None => Ok(Key::generate()),
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub fn slatedrive_router(state: SlateState) -> Router {
    let uploads = Router::new()
        .route("/projects/{id}/drive/upload", post(sync::upload_file))
        .route("/share/{token}/upload", post(share::share_upload))
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT));

    Router::new()
        .route("/healthz", get(health))
        .route("/drive/connect", get(connection::drive_connect))
        .route("/drive/oauth/callback", get(connection::drive_oauth_callback))
        .route(
            "/drive/connection",
            get(connection::connection_status).delete(connection::disconnect),
        )
        .route("/drive/connection/root", put(connection::set_connection_root))
        .route("/projects/{id}/drive/sync", post(sync::sync_project))
        .route("/projects/{id}/drive/folder", get(sync::folder_contents))
        .route("/projects/{id}/drive/exists", post(sync::exists_batch))
        .route("/projects/{id}/share", post(share::issue_share_link))
        .route("/share/{token}/files", get(share::share_files))
        .merge(uploads)
        .with_state(state)
}
