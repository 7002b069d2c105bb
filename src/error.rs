use axum::{Json, http::StatusCode, response::IntoResponse};
use oauth2::basic::BasicErrorResponseType;
use oauth2::reqwest::Error as ReqwestClientError;
use oauth2::{HttpClientError, RequestTokenError, StandardErrorResponse};
use serde::Serialize;
use sqlx::Error as SqlxError;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum SlateError {
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("HTTP request error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] SqlxError),

    #[error("configuration incomplete: {0}")]
    Config(String),

    #[error("no drive connection stored")]
    NotConnected,

    #[error("drive authorization failed: {0}")]
    RemoteAuth(String),

    #[error("drive error: {0}")]
    Remote(String),

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("share token rejected")]
    TokenInvalid,
}

impl From<RequestTokenError<HttpClientError<ReqwestClientError>, StandardErrorResponse<BasicErrorResponseType>>>
    for SlateError
{
    fn from(
        e: RequestTokenError<
            HttpClientError<ReqwestClientError>,
            StandardErrorResponse<BasicErrorResponseType>,
        >,
    ) -> Self {
        match e {
            RequestTokenError::ServerResponse(err) => {
                SlateError::RemoteAuth(err.error().to_string())
            }
            RequestTokenError::Request(req_e) => {
                SlateError::RemoteAuth(format!("token request failed: {}", req_e))
            }
            RequestTokenError::Parse(parse_err, _body) => SlateError::Json(parse_err.into_inner()),
            RequestTokenError::Other(s) => SlateError::RemoteAuth(s),
        }
    }
}

impl IntoResponse for SlateError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_body) = match self {
            SlateError::Config(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiErrorBody {
                    code: "CONFIG_ERROR".to_string(),
                    message: "Server configuration is incomplete.".to_string(),
                },
            ),
            SlateError::Database(_) | SlateError::Json(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiErrorBody {
                    code: "INTERNAL_ERROR".to_string(),
                    message: "An internal server error occurred.".to_string(),
                },
            ),
            SlateError::NotConnected => (
                StatusCode::CONFLICT,
                ApiErrorBody {
                    code: "NOT_CONNECTED".to_string(),
                    message: "No storage account connected; authorize first.".to_string(),
                },
            ),
            SlateError::RemoteAuth(_) => (
                StatusCode::CONFLICT,
                ApiErrorBody {
                    code: "RECONNECT_REQUIRED".to_string(),
                    message: "Storage authorization failed; reconnect the account.".to_string(),
                },
            ),
            // Remote failures carry the provider's message through unchanged.
            SlateError::Remote(message) => (
                StatusCode::BAD_GATEWAY,
                ApiErrorBody {
                    code: "REMOTE_ERROR".to_string(),
                    message,
                },
            ),
            SlateError::Reqwest(_) | SlateError::UrlParse(_) => (
                StatusCode::BAD_GATEWAY,
                ApiErrorBody {
                    code: "BAD_GATEWAY".to_string(),
                    message: "Storage provider is unavailable.".to_string(),
                },
            ),
            SlateError::Validation(message) => (
                StatusCode::BAD_REQUEST,
                ApiErrorBody {
                    code: "VALIDATION".to_string(),
                    message,
                },
            ),
            SlateError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                ApiErrorBody {
                    code: "NOT_FOUND".to_string(),
                    message: format!("{what} not found"),
                },
            ),
            // One message for every token failure mode so callers cannot
            // learn which check rejected them.
            SlateError::TokenInvalid => (
                StatusCode::UNAUTHORIZED,
                ApiErrorBody {
                    code: "LINK_INVALID".to_string(),
                    message: "link invalid or expired".to_string(),
                },
            ),
        };
        (status, Json(ApiErrorResponse { error: error_body })).into_response()
    }
}

/// Standardized API error response body
#[derive(Serialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}
