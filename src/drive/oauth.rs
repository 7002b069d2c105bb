//! OAuth credential lifecycle for the storage account: consent URL, code
//! exchange, and lazy refresh ahead of each authenticated remote call.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use oauth2::{
    AuthUrl, AuthorizationCode, Client as OAuth2Client, ClientId, ClientSecret, CsrfToken,
    EndpointNotSet, EndpointSet, ExtraTokenFields, PkceCodeChallenge, PkceCodeVerifier,
    RedirectUrl, RefreshToken, Scope, StandardRevocableToken, StandardTokenResponse,
    TokenResponse, TokenUrl,
    basic::{
        BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
        BasicTokenType,
    },
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use url::Url;

use crate::config::Config;
use crate::db::connections::ConnectionStore;
use crate::error::SlateError;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

/// Access tokens within this many seconds of expiry are refreshed before use.
const REFRESH_SKEW_SECS: i64 = 60;

/// Assumed lifetime when the provider omits `expires_in`.
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub(super) struct IdTokenField {
    #[serde(rename = "id_token")]
    pub id_token: Option<String>,
}
impl ExtraTokenFields for IdTokenField {}

pub(super) type DriveTokenResponse = StandardTokenResponse<IdTokenField, BasicTokenType>;

pub(super) type DriveOauth2Client = OAuth2Client<
    BasicErrorResponse,
    DriveTokenResponse,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointSet,
>;

/// Outcome of a successful code exchange.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectedAccount {
    pub account_email: Option<String>,
}

pub struct TokenLifecycle {
    store: ConnectionStore,
    client_id: Option<String>,
    client_secret: Option<String>,
    redirect_url: String,
    http: reqwest::Client,
}

impl TokenLifecycle {
    pub fn new(store: ConnectionStore, cfg: &Config, http: reqwest::Client) -> Self {
        Self {
            store,
            client_id: cfg.drive_client_id.clone(),
            client_secret: cfg.drive_client_secret.clone(),
            redirect_url: cfg.drive_redirect_url.clone(),
            http,
        }
    }

    fn build_oauth2_client(&self) -> Result<DriveOauth2Client, SlateError> {
        let client_id = self
            .client_id
            .clone()
            .ok_or_else(|| SlateError::Config("drive client id is not configured".to_string()))?;
        let client_secret = self.client_secret.clone().ok_or_else(|| {
            SlateError::Config("drive client secret is not configured".to_string())
        })?;
        let client = OAuth2Client::new(ClientId::new(client_id))
            .set_client_secret(ClientSecret::new(client_secret))
            .set_auth_uri(AuthUrl::new(GOOGLE_AUTH_URL.to_string())?)
            .set_token_uri(TokenUrl::new(GOOGLE_TOKEN_URL.to_string())?)
            .set_redirect_uri(RedirectUrl::new(self.redirect_url.clone())?);
        Ok(client)
    }

    /// Build the provider consent URL. Deterministic given configuration,
    /// apart from the CSRF state and PKCE challenge handed back for the
    /// callback round-trip.
    pub fn authorization_url(
        &self,
    ) -> Result<(Url, CsrfToken, PkceCodeVerifier), SlateError> {
        let client = self.build_oauth2_client()?;
        let (challenge, verifier) = PkceCodeChallenge::new_random_sha256();
        let (auth_url, csrf_token) = client
            .authorize_url(CsrfToken::new_random)
            .add_scope(Scope::new(DRIVE_SCOPE.to_string()))
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent")
            .set_pkce_challenge(challenge)
            .url();
        Ok((auth_url, csrf_token, verifier))
    }

    /// Exchange an authorization code for a credential pair and persist it.
    /// A response without a refresh token is fatal: the flow must be
    /// restarted from the consent screen.
    pub async fn exchange_code(
        &self,
        code: String,
        pkce_verifier: String,
    ) -> Result<ConnectedAccount, SlateError> {
        let client = self.build_oauth2_client()?;
        let token_response = client
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier))
            .request_async(&self.http)
            .await?;

        let refresh_token = token_response
            .refresh_token()
            .map(|t| t.secret().to_string())
            .ok_or_else(|| {
                SlateError::RemoteAuth(
                    "OAuth response missing refresh_token; ensure access_type=offline and prompt=consent are allowed for this client/user".to_string(),
                )
            })?;
        let access_token = token_response.access_token().secret().to_string();
        let expires_at = expiry_from_now(token_response.expires_in());
        let account_email = token_response
            .extra_fields()
            .id_token
            .as_deref()
            .and_then(email_from_id_token);

        self.store
            .connect(
                &access_token,
                &refresh_token,
                expires_at,
                account_email.as_deref(),
            )
            .await?;

        info!(
            email = %account_email.as_deref().unwrap_or("<unknown>"),
            "drive account connected"
        );
        Ok(ConnectedAccount { account_email })
    }

    /// Return an access token valid for at least [`REFRESH_SKEW_SECS`]
    /// seconds, refreshing and overwriting the stored pair when necessary.
    /// A failed refresh leaves the stored (now expired) pair in place so the
    /// caller can prompt for reconnection.
    pub async fn valid_access_token(&self) -> Result<String, SlateError> {
        let conn = self.store.get().await?.ok_or(SlateError::NotConnected)?;

        if conn.expires_at - Utc::now() > Duration::seconds(REFRESH_SKEW_SECS) {
            return Ok(conn.access_token);
        }

        let client = self.build_oauth2_client()?;
        let token_response = match client
            .exchange_refresh_token(&RefreshToken::new(conn.refresh_token.clone()))
            .request_async(&self.http)
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                warn!(error = %e, "access token refresh failed");
                return Err(match SlateError::from(e) {
                    SlateError::Json(inner) => {
                        SlateError::RemoteAuth(format!("token response unreadable: {inner}"))
                    }
                    other => other,
                });
            }
        };

        let access_token = token_response.access_token().secret().to_string();
        // Google typically omits the refresh token on refresh; keep the old one.
        let refresh_token = token_response
            .refresh_token()
            .map(|t| t.secret().to_string())
            .unwrap_or(conn.refresh_token);
        let expires_at = expiry_from_now(token_response.expires_in());

        // Last writer wins; see ConnectionStore::update_tokens.
        self.store
            .update_tokens(&access_token, &refresh_token, expires_at)
            .await?;
        info!("access token refreshed");
        Ok(access_token)
    }
}

fn expiry_from_now(expires_in: Option<std::time::Duration>) -> DateTime<Utc> {
    let lifetime = expires_in
        .and_then(|d| Duration::from_std(d).ok())
        .unwrap_or_else(|| Duration::seconds(DEFAULT_TOKEN_LIFETIME_SECS));
    Utc::now() + lifetime
}

/// Pull the account email out of the OpenID id_token without verifying it:
/// the token arrived over TLS from the provider's token endpoint and is only
/// used as a display label.
fn email_from_id_token(id_token: &str) -> Option<String> {
    let payload_b64 = id_token.split('.').nth(1)?;
    let decoded = URL_SAFE_NO_PAD.decode(payload_b64).ok()?;
    let payload: Value = serde_json::from_slice(&decoded).ok()?;
    payload
        .get("email")
        .and_then(Value::as_str)
        .map(str::to_string)
}
