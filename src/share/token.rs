//! Stateless capability tokens for department-scoped expense links.
//!
//! A token is `base64url(payload_json) + "." + base64url(hmac_sha256)`,
//! signed over the encoded payload with a server secret. Validity is fully
//! reconstructable from the token bytes and that secret; nothing is
//! persisted and nothing can be revoked short of rotating the secret.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::SlateError;

type HmacSha256 = Hmac<Sha256>;

const SEPARATOR: char = '.';

/// Fixed lifetime of an issued link. Not renewable.
pub const SHARE_TOKEN_TTL_DAYS: i64 = 90;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SharePayload {
    pub project_id: String,
    /// Department slug as produced by [`department_slug`] at issuance.
    pub department: String,
    pub exp: i64,
}

impl SharePayload {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

/// Reduce a human-readable department label to the slug carried in tokens.
/// Issuance and consumption must both go through this, so a label rename
/// silently invalidates outstanding links (accepted behavior).
pub fn department_slug(label: &str) -> String {
    let mut slug = String::with_capacity(label.len());
    let mut pending_dash = false;
    for c in label.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

#[derive(Clone)]
pub struct ShareTokenCodec {
    secret: Option<Vec<u8>>,
}

impl ShareTokenCodec {
    pub fn new(secret: Option<&str>) -> Self {
        Self {
            secret: secret
                .filter(|s| !s.is_empty())
                .map(|s| s.as_bytes().to_vec()),
        }
    }

    fn secret(&self) -> Result<&[u8], SlateError> {
        self.secret
            .as_deref()
            .ok_or_else(|| SlateError::Config("share secret is not configured".to_string()))
    }

    fn mac(&self, encoded_payload: &str) -> Result<Vec<u8>, SlateError> {
        let mut mac = HmacSha256::new_from_slice(self.secret()?)
            .map_err(|_| SlateError::Config("share secret unusable as HMAC key".to_string()))?;
        mac.update(encoded_payload.as_bytes());
        Ok(mac.finalize().into_bytes().to_vec())
    }

    /// Issue a token granting write access to one department of one project
    /// for the fixed validity window.
    pub fn sign(&self, project_id: &str, department: &str) -> Result<String, SlateError> {
        let payload = SharePayload {
            project_id: project_id.to_string(),
            department: department_slug(department),
            exp: (Utc::now() + Duration::days(SHARE_TOKEN_TTL_DAYS)).timestamp(),
        };
        self.sign_payload(&payload)
    }

    fn sign_payload(&self, payload: &SharePayload) -> Result<String, SlateError> {
        let encoded = URL_SAFE_NO_PAD.encode(serde_json::to_vec(payload)?);
        let sig = URL_SAFE_NO_PAD.encode(self.mac(&encoded)?);
        Ok(format!("{encoded}{SEPARATOR}{sig}"))
    }

    /// Verify signature, expiry, and payload shape. Every failure collapses
    /// to [`SlateError::TokenInvalid`]; callers learn nothing about which
    /// check rejected the token.
    pub fn verify(&self, token: &str) -> Result<SharePayload, SlateError> {
        let (encoded, sig_b64) = token.split_once(SEPARATOR).ok_or(SlateError::TokenInvalid)?;

        let expected_sig = self.mac(encoded)?;
        let given_sig = URL_SAFE_NO_PAD
            .decode(sig_b64)
            .map_err(|_| SlateError::TokenInvalid)?;
        if !bool::from(expected_sig.as_slice().ct_eq(given_sig.as_slice())) {
            return Err(SlateError::TokenInvalid);
        }

        let payload_bytes = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|_| SlateError::TokenInvalid)?;
        let payload: SharePayload =
            serde_json::from_slice(&payload_bytes).map_err(|_| SlateError::TokenInvalid)?;

        if payload.exp <= Utc::now().timestamp() {
            return Err(SlateError::TokenInvalid);
        }
        if payload.project_id.is_empty() || payload.department.is_empty() {
            return Err(SlateError::TokenInvalid);
        }
        Ok(payload)
    }
}
