/// Server error types
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use iplay_auth::AuthError;
use iplay_web_api::ApiError;
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Authentication failed: {0}")]
    Auth(AuthError),

    #[error("Upstream API error: {0}")]
    Api(ApiError),

    /// Required request field absent (`MISSING_<FIELD>`)
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<AuthError> for ServerError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::NotAuthenticated => ServerError::NotAuthenticated,
            other => ServerError::Auth(other),
        }
    }
}

impl From<ApiError> for ServerError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Auth(auth) => auth.into(),
            other => ServerError::Api(other),
        }
    }
}

/// Response extension marking an upstream 401/403 on the session's token
///
/// The session middleware reads it to repair or drop the credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpstreamAuthRejected {
    pub status: u16,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    ok: bool,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl ServerError {
    /// HTTP status, machine-readable code and optional details
    fn parts(&self) -> (StatusCode, String, Option<String>) {
        match self {
            ServerError::NotAuthenticated => {
                (StatusCode::UNAUTHORIZED, "NOT_AUTHENTICATED".into(), None)
            }
            ServerError::Auth(err) => match err {
                AuthError::RateLimited { .. } => {
                    (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED".into(), None)
                }
                AuthError::Unreachable(msg) => (
                    StatusCode::BAD_GATEWAY,
                    "UPSTREAM_UNREACHABLE".into(),
                    Some(msg.clone()),
                ),
                AuthError::Expired(msg) => (
                    StatusCode::UNAUTHORIZED,
                    "SPOTIFY_AUTH_ERROR".into(),
                    Some(msg.clone()),
                ),
                AuthError::ExchangeFailed { message, .. } => (
                    StatusCode::UNAUTHORIZED,
                    "SPOTIFY_AUTH_ERROR".into(),
                    Some(message.clone()),
                ),
                AuthError::NotAuthenticated => {
                    (StatusCode::UNAUTHORIZED, "NOT_AUTHENTICATED".into(), None)
                }
                AuthError::ParseError(_) | AuthError::Store(_) | AuthError::InvalidConfig(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR".into(), None)
                }
            },
            ServerError::Api(err) => match err {
                ApiError::Auth(auth) => ServerError::Auth(auth.clone()).parts(),
                ApiError::Unauthorized(msg) => (
                    StatusCode::UNAUTHORIZED,
                    "SPOTIFY_AUTH_ERROR".into(),
                    Some(msg.clone()),
                ),
                ApiError::Forbidden(msg) => (
                    StatusCode::FORBIDDEN,
                    "SPOTIFY_AUTH_ERROR".into(),
                    Some(msg.clone()),
                ),
                ApiError::NoActiveDevice => {
                    (StatusCode::NOT_FOUND, "NO_ACTIVE_DEVICE".into(), None)
                }
                ApiError::RateLimited { .. } => {
                    (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED".into(), None)
                }
                ApiError::NotFound(msg) => (
                    StatusCode::NOT_FOUND,
                    "SPOTIFY_API_ERROR".into(),
                    Some(msg.clone()),
                ),
                ApiError::Upstream { status, message } => (
                    StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY),
                    "SPOTIFY_API_ERROR".into(),
                    Some(message.clone()),
                ),
                ApiError::ParseError(msg) => (
                    StatusCode::BAD_GATEWAY,
                    "SPOTIFY_API_ERROR".into(),
                    Some(msg.clone()),
                ),
                ApiError::Unreachable(msg) => (
                    StatusCode::BAD_GATEWAY,
                    "UPSTREAM_UNREACHABLE".into(),
                    Some(msg.clone()),
                ),
                ApiError::InvalidRequest(msg) => (
                    StatusCode::BAD_REQUEST,
                    "INVALID_REQUEST".into(),
                    Some(msg.clone()),
                ),
                ApiError::InvalidUrl(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR".into(), None)
                }
            },
            ServerError::MissingField(field) => (
                StatusCode::BAD_REQUEST,
                format!("MISSING_{}", field.to_ascii_uppercase()),
                None,
            ),
            ServerError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                "INVALID_REQUEST".into(),
                Some(msg.clone()),
            ),
            ServerError::Config(_) | ServerError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR".into(), None)
            }
        }
    }

    pub fn status(&self) -> StatusCode {
        self.parts().0
    }

    pub fn code(&self) -> String {
        self.parts().1
    }

    /// Upstream refused the session's access token
    pub fn upstream_rejection(&self) -> Option<UpstreamAuthRejected> {
        match self {
            ServerError::Api(ApiError::Unauthorized(_)) => Some(UpstreamAuthRejected { status: 401 }),
            ServerError::Api(ApiError::Forbidden(_)) => Some(UpstreamAuthRejected { status: 403 }),
            _ => None,
        }
    }

    fn retry_after_secs(&self) -> Option<u64> {
        match self {
            ServerError::Auth(AuthError::RateLimited { retry_after_secs })
            | ServerError::Api(ApiError::RateLimited { retry_after_secs })
            | ServerError::Api(ApiError::Auth(AuthError::RateLimited { retry_after_secs })) => {
                Some(*retry_after_secs)
            }
            _ => None,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, error, details) = self.parts();

        if status.is_server_error() {
            tracing::error!(error = %self, code = %error, "Request failed");
        } else {
            tracing::debug!(error = %self, code = %error, "Request rejected");
        }

        let retry_after = self.retry_after_secs();
        let rejection = self.upstream_rejection();
        let body = Json(ErrorBody {
            ok: false,
            error,
            details,
        });

        let mut response = (status, body).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        if let Some(rejection) = rejection {
            response.extensions_mut().insert(rejection);
        }
        response
    }
}
