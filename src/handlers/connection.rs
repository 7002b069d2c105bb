//! Connection management: consent redirect, OAuth callback, status,
//! root override, disconnect.

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, PrivateCookieJar, SameSite};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use time::Duration;
use tracing::info;

use crate::error::SlateError;
use crate::middleware::auth::RequireAdminKey;
use crate::router::SlateState;

const CSRF_COOKIE: &str = "drive_csrf_token";
const PKCE_COOKIE: &str = "drive_pkce_verifier";

#[derive(Debug, Deserialize)]
pub struct AuthCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
}

/// GET /drive/connect -> redirects to the provider's consent page.
pub async fn drive_connect(
    _auth: RequireAdminKey,
    State(state): State<SlateState>,
    jar: PrivateCookieJar,
) -> Result<impl IntoResponse, SlateError> {
    let (auth_url, csrf_token, pkce_verifier) = state.lifecycle.authorization_url()?;

    let jar = jar
        .add(build_cookie(CSRF_COOKIE, csrf_token.secret().to_string()))
        .add(build_cookie(PKCE_COOKIE, pkce_verifier.secret().to_string()));

    info!("dispatching drive consent redirect");
    Ok((jar, Redirect::temporary(auth_url.as_ref())).into_response())
}

/// GET /drive/oauth/callback -> exchanges the auth code for tokens and
/// stores them. Unauthenticated by necessity (provider redirect), guarded
/// by the CSRF cookie round-trip.
pub async fn drive_oauth_callback(
    State(state): State<SlateState>,
    Query(query): Query<AuthCallbackQuery>,
    jar: PrivateCookieJar,
) -> impl IntoResponse {
    let (pkce_verifier, csrf_cookie, jar) = match load_oauth_session(jar) {
        Ok(data) => data,
        Err((jar, err)) => return respond_with_error(jar, err),
    };

    let state_param = match query.state.as_deref() {
        Some(s) => s,
        None => {
            return respond_with_error(
                jar,
                SlateError::Validation("missing `state` in callback".to_string()),
            );
        }
    };

    if state_param != csrf_cookie {
        return respond_with_error(jar, SlateError::Validation("CSRF token mismatch".to_string()));
    }

    let code = match query.code.as_deref() {
        Some(code) => code,
        None => {
            return respond_with_error(
                jar,
                SlateError::Validation("missing `code` in callback".to_string()),
            );
        }
    };

    match state
        .lifecycle
        .exchange_code(code.to_owned(), pkce_verifier)
        .await
    {
        Ok(account) => (jar, Json(account)).into_response(),
        Err(err) => respond_with_error(jar, err),
    }
}

#[derive(Debug, Serialize)]
pub struct ConnectionStatus {
    pub connected: bool,
    pub account_email: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub root_folder_id: Option<String>,
}

/// GET /drive/connection
pub async fn connection_status(
    _auth: RequireAdminKey,
    State(state): State<SlateState>,
) -> Result<Json<ConnectionStatus>, SlateError> {
    let status = match state.connections.get().await? {
        Some(conn) => ConnectionStatus {
            connected: true,
            account_email: conn.account_email,
            expires_at: Some(conn.expires_at),
            root_folder_id: conn.root_folder_id,
        },
        None => ConnectionStatus {
            connected: false,
            account_email: None,
            expires_at: None,
            root_folder_id: None,
        },
    };
    Ok(Json(status))
}

#[derive(Debug, Deserialize)]
pub struct SetRootBody {
    pub root_folder_id: Option<String>,
}

/// PUT /drive/connection/root
pub async fn set_connection_root(
    _auth: RequireAdminKey,
    State(state): State<SlateState>,
    Json(body): Json<SetRootBody>,
) -> Result<StatusCode, SlateError> {
    state
        .connections
        .set_root(body.root_folder_id.as_deref())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /drive/connection
pub async fn disconnect(
    _auth: RequireAdminKey,
    State(state): State<SlateState>,
) -> Result<StatusCode, SlateError> {
    state.connections.clear().await?;
    info!("drive connection cleared");
    Ok(StatusCode::NO_CONTENT)
}

fn build_cookie(name: &str, value: String) -> Cookie<'static> {
    Cookie::build(Cookie::new(name.to_string(), value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(Duration::minutes(15))
        .build()
}

fn clear_cookie(name: &str) -> Cookie<'static> {
    Cookie::build(Cookie::new(name.to_string(), ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

fn clear_oauth_cookies(jar: PrivateCookieJar) -> PrivateCookieJar {
    jar.remove(clear_cookie(CSRF_COOKIE))
        .remove(clear_cookie(PKCE_COOKIE))
}

fn load_oauth_session(
    jar: PrivateCookieJar,
) -> Result<(String, String, PrivateCookieJar), (PrivateCookieJar, SlateError)> {
    let Some(csrf_cookie) = jar.get(CSRF_COOKIE).map(|c| c.value().to_owned()) else {
        let jar = clear_oauth_cookies(jar);
        return Err((
            jar,
            SlateError::Validation("missing CSRF token in cookie".to_string()),
        ));
    };

    let Some(pkce_cookie) = jar.get(PKCE_COOKIE).map(|c| c.value().to_owned()) else {
        let jar = clear_oauth_cookies(jar);
        return Err((
            jar,
            SlateError::Validation("missing PKCE verifier in cookie".to_string()),
        ));
    };

    let jar = clear_oauth_cookies(jar);

    Ok((pkce_cookie, csrf_cookie, jar))
}

fn respond_with_error(jar: PrivateCookieJar, err: SlateError) -> Response {
    (jar, err.into_response()).into_response()
}
