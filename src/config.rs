use figment::{Figment, providers::Env};
use serde::Deserialize;

use crate::error::SlateError;

/// Runtime configuration, read once from `SLATE_*` environment variables and
/// threaded explicitly into the services that need it.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default = "default_loglevel")]
    pub loglevel: String,

    /// Key required on privileged (admin) routes.
    pub admin_key: String,
    /// Key required on authenticated non-privileged routes.
    pub api_key: String,

    /// Secret the capability-token codec signs with. Unset means share
    /// links cannot be issued or consumed.
    #[serde(default)]
    pub share_secret: Option<String>,

    /// 64+ byte base64 key for the private cookie jar; a fresh key is
    /// generated at startup when unset (OAuth round-trips then survive only
    /// within one process lifetime, which is all the flow needs).
    #[serde(default)]
    pub cookie_key: Option<String>,

    #[serde(default)]
    pub drive_client_id: Option<String>,
    #[serde(default)]
    pub drive_client_secret: Option<String>,
    #[serde(default = "default_redirect_url")]
    pub drive_redirect_url: String,
}

fn default_database_url() -> String {
    "sqlite:slatedrive.sqlite".to_string()
}

fn default_listen() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_loglevel() -> String {
    "info".to_string()
}

fn default_redirect_url() -> String {
    "http://localhost:8000/drive/oauth/callback".to_string()
}

impl Config {
    pub fn from_env() -> Result<Self, SlateError> {
        Figment::new()
            .merge(Env::prefixed("SLATE_"))
            .extract()
            .map_err(|e| SlateError::Config(e.to_string()))
    }
}
