//! Error types for playback orchestration

use iplay_auth::AuthError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Session-scoped playback errors
///
/// None of these are fatal: the orchestrator records the latest one in
/// [`SessionPlaybackState::last_error`](crate::SessionPlaybackState) and
/// clears it on the next successful intent.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "code", content = "detail", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlaybackError {
    /// No session credential
    #[error("Not signed in")]
    NotAuthenticated,

    /// Credential could not be refreshed
    #[error("Session expired, sign in again")]
    AuthExpired,

    /// Track has neither a usable remote URI nor a preview clip
    #[error("No playable source for this track")]
    NoPlayableSource,

    /// Remote player is still registering its device
    #[error("Starting player, tap again in a moment")]
    DeviceStarting,

    /// Local playback was refused by the autoplay policy
    #[error("Playback was blocked, tap play to start")]
    PlaybackBlocked,

    /// Upstream asked us to slow down
    #[error("Too many requests, try again in {retry_after_secs}s")]
    UpstreamRateLimited { retry_after_secs: u64 },

    /// Upstream failed or could not be reached
    #[error("Upstream unavailable{}", status_suffix(.status))]
    UpstreamUnavailable { status: Option<u16> },

    /// Remote control call targeted a device that is not active
    #[error("No active playback device")]
    NoActiveDevice,

    /// Local clip element reported an error
    #[error("Could not play this preview: {0}")]
    SourceFailed(String),

    /// Another load sequence is already running
    #[error("Player is busy loading a track")]
    Busy,

    /// The orchestrator task is gone
    #[error("Player is shut down")]
    Closed,
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({})", s)).unwrap_or_default()
}

impl PlaybackError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            PlaybackError::NotAuthenticated => "NOT_AUTHENTICATED",
            PlaybackError::AuthExpired => "AUTH_EXPIRED",
            PlaybackError::NoPlayableSource => "NO_PLAYABLE_SOURCE",
            PlaybackError::DeviceStarting => "DEVICE_STARTING",
            PlaybackError::PlaybackBlocked => "PLAYBACK_BLOCKED",
            PlaybackError::UpstreamRateLimited { .. } => "UPSTREAM_RATE_LIMITED",
            PlaybackError::UpstreamUnavailable { .. } => "UPSTREAM_UNAVAILABLE",
            PlaybackError::NoActiveDevice => "NO_ACTIVE_DEVICE",
            PlaybackError::SourceFailed(_) => "SOURCE_FAILED",
            PlaybackError::Busy => "BUSY",
            PlaybackError::Closed => "CLOSED",
        }
    }
}

impl From<AuthError> for PlaybackError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::NotAuthenticated => PlaybackError::NotAuthenticated,
            AuthError::RateLimited { retry_after_secs } => {
                PlaybackError::UpstreamRateLimited { retry_after_secs }
            }
            AuthError::Unreachable(_) => PlaybackError::UpstreamUnavailable { status: None },
            AuthError::ExchangeFailed { .. }
            | AuthError::Expired(_)
            | AuthError::ParseError(_)
            | AuthError::Store(_)
            | AuthError::InvalidConfig(_) => PlaybackError::AuthExpired,
        }
    }
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;
