//! Error types for the upstream Web API client.

use iplay_auth::AuthError;
use iplay_playback::PlaybackError;
use thiserror::Error;

/// Errors that can occur when calling the upstream Web API.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// No usable access token
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// Upstream rejected the token (401)
    #[error("Token expired or invalid: {0}")]
    Unauthorized(String),

    /// Token lacks the required scopes or the account lacks entitlement (403)
    #[error("Access forbidden: {0}")]
    Forbidden(String),

    /// Player endpoint answered 404
    #[error("No active device")]
    NoActiveDevice,

    /// Resource endpoint answered 404
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limited after any retries were spent
    #[error("Rate limited, retry after {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: u64 },

    /// Any other non-success status
    #[error("Upstream error ({status}): {message}")]
    Upstream { status: u16, message: String },

    /// Connection failed or timed out
    #[error("Upstream unreachable: {0}")]
    Unreachable(String),

    /// Failed to parse upstream response
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Base URL is not usable
    #[error("Invalid API URL: {0}")]
    InvalidUrl(String),

    /// Request rejected before it was sent
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    /// HTTP status the upstream answered with, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized(_) => Some(401),
            ApiError::Forbidden(_) => Some(403),
            ApiError::NoActiveDevice | ApiError::NotFound(_) => Some(404),
            ApiError::RateLimited { .. } => Some(429),
            ApiError::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Token or permission problem rather than an upstream fault
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            ApiError::Auth(_) | ApiError::Unauthorized(_) | ApiError::Forbidden(_)
        )
    }
}

impl From<ApiError> for PlaybackError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Auth(auth) => auth.into(),
            ApiError::Unauthorized(_) | ApiError::Forbidden(_) => PlaybackError::AuthExpired,
            ApiError::NoActiveDevice => PlaybackError::NoActiveDevice,
            ApiError::RateLimited { retry_after_secs } => {
                PlaybackError::UpstreamRateLimited { retry_after_secs }
            }
            ApiError::NotFound(_) => PlaybackError::UpstreamUnavailable { status: Some(404) },
            ApiError::Upstream { status, .. } => PlaybackError::UpstreamUnavailable {
                status: Some(status),
            },
            ApiError::Unreachable(_)
            | ApiError::ParseError(_)
            | ApiError::InvalidUrl(_)
            | ApiError::InvalidRequest(_) => PlaybackError::UpstreamUnavailable { status: None },
        }
    }
}

/// Result type for Web API operations.
pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_into_playback_errors() {
        assert_eq!(
            PlaybackError::from(ApiError::NoActiveDevice),
            PlaybackError::NoActiveDevice
        );
        assert_eq!(
            PlaybackError::from(ApiError::Forbidden("scope".into())),
            PlaybackError::AuthExpired
        );
        assert_eq!(
            PlaybackError::from(ApiError::Auth(AuthError::NotAuthenticated)),
            PlaybackError::NotAuthenticated
        );
        assert_eq!(
            PlaybackError::from(ApiError::RateLimited { retry_after_secs: 4 }),
            PlaybackError::UpstreamRateLimited { retry_after_secs: 4 }
        );
        assert_eq!(
            PlaybackError::from(ApiError::Upstream {
                status: 503,
                message: "down".into()
            }),
            PlaybackError::UpstreamUnavailable { status: Some(503) }
        );
        assert_eq!(
            PlaybackError::from(ApiError::Unreachable("refused".into())),
            PlaybackError::UpstreamUnavailable { status: None }
        );
    }

    #[test]
    fn reports_upstream_status() {
        assert_eq!(ApiError::NoActiveDevice.status(), Some(404));
        assert_eq!(ApiError::RateLimited { retry_after_secs: 1 }.status(), Some(429));
        assert_eq!(ApiError::Unreachable("x".into()).status(), None);
        assert!(ApiError::Unauthorized("x".into()).is_auth());
        assert!(!ApiError::NoActiveDevice.is_auth());
    }
}
