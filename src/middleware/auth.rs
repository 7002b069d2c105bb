use axum::Json;
use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, StatusCode, request::Parts};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use subtle::ConstantTimeEq;

use crate::router::SlateState;

/// Pull the presented key out of `x-slate-key` or a bearer Authorization
/// header and compare in constant time.
fn key_matches(headers: &HeaderMap, expected: &str) -> bool {
    if let Some(hv) = headers.get("x-slate-key").and_then(|v| v.to_str().ok())
        && bool::from(hv.as_bytes().ct_eq(expected.as_bytes()))
    {
        return true;
    }

    if let Some(auth) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
        let auth = auth.trim();
        if let Some(token) = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            && bool::from(token.as_bytes().ct_eq(expected.as_bytes()))
        {
            return true;
        }
    }
    false
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"error": {"code": "UNAUTHORIZED", "message": "invalid or missing key"}})),
    )
        .into_response()
}

/// Privileged routes: connection management, synchronization, link issuing.
#[derive(Debug, Clone, Copy)]
pub struct RequireAdminKey;

impl FromRequestParts<SlateState> for RequireAdminKey {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SlateState,
    ) -> Result<Self, Self::Rejection> {
        if key_matches(&parts.headers, &state.admin_key) {
            Ok(Self)
        } else {
            Err(unauthorized())
        }
    }
}

/// Any authenticated caller. The admin key also passes.
#[derive(Debug, Clone, Copy)]
pub struct RequireApiKey;

impl FromRequestParts<SlateState> for RequireApiKey {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SlateState,
    ) -> Result<Self, Self::Rejection> {
        if key_matches(&parts.headers, &state.api_key)
            || key_matches(&parts.headers, &state.admin_key)
        {
            Ok(Self)
        } else {
            Err(unauthorized())
        }
    }
}
