//! Core types for playback orchestration

use crate::error::PlaybackError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// URI scheme for full tracks on the upstream service
pub const TRACK_URI_PREFIX: &str = "spotify:track:";

/// Track as the player sees it
///
/// Built once from upstream catalog data and never mutated by the player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    /// Upstream track identifier
    pub id: String,

    /// Track title
    pub title: String,

    /// Artist display string ("A, B")
    pub artist: String,

    /// Album artwork (optional)
    pub album_art_url: Option<String>,

    /// Track duration in milliseconds (0 when unknown)
    pub duration_ms: u64,

    /// Short preview clip (optional)
    pub preview_url: Option<String>,

    /// Full-track URI for the remote player (optional)
    pub uri: Option<String>,
}

impl Track {
    pub fn new(id: impl Into<String>, title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artist: artist.into(),
            album_art_url: None,
            duration_ms: 0,
            preview_url: None,
            uri: None,
        }
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn with_preview(mut self, url: impl Into<String>) -> Self {
        self.preview_url = Some(url.into());
        self
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    pub fn with_album_art(mut self, url: impl Into<String>) -> Self {
        self.album_art_url = Some(url.into());
        self
    }

    /// URI the remote player can start, derived from the id if needed.
    pub fn playable_uri(&self) -> Option<String> {
        self.uri.clone().or_else(|| {
            (!self.id.is_empty()).then(|| format!("{}{}", TRACK_URI_PREFIX, self.id))
        })
    }

    pub fn has_preview(&self) -> bool {
        self.preview_url.as_deref().is_some_and(|u| !u.is_empty())
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration_ms as f64 / 1000.0
    }
}

/// Which backend produced an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Full-track device player
    Remote,

    /// Preview clip element
    Local,
}

/// Backend currently driving playback
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ActiveBackend {
    /// Nothing loaded
    #[default]
    None,

    /// Remote device playing full tracks
    Remote { device_id: String },

    /// Local preview clip
    Local,
}

impl ActiveBackend {
    pub fn kind(&self) -> Option<BackendKind> {
        match self {
            ActiveBackend::None => None,
            ActiveBackend::Remote { .. } => Some(BackendKind::Remote),
            ActiveBackend::Local => Some(BackendKind::Local),
        }
    }
}

/// Lifecycle of the remote device player
///
/// ```text
/// Uninitialized -> Initializing -> Ready(device) -> Active(device)
///        \______________\______________\________________\-> Failed(reason)
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RemoteStatus {
    #[default]
    Uninitialized,
    Initializing,
    Ready { device_id: String },
    Active { device_id: String },
    Failed { reason: String },
}

impl RemoteStatus {
    /// Device the remote player is registered as (or targeting)
    pub fn device_id(&self) -> Option<&str> {
        match self {
            RemoteStatus::Ready { device_id } | RemoteStatus::Active { device_id } => {
                Some(device_id)
            }
            _ => None,
        }
    }

    /// Ready or active
    pub fn is_usable(&self) -> bool {
        self.device_id().is_some()
    }

    /// Still coming up
    pub fn is_starting(&self) -> bool {
        matches!(self, RemoteStatus::Uninitialized | RemoteStatus::Initializing)
    }
}

/// Upstream playback device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub id: Option<String>,
    pub name: String,
    pub is_active: bool,
}

/// Request body for starting remote playback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartRequest {
    /// Track URIs forming the remote queue
    pub uris: Vec<String>,

    /// Index into `uris` to start from
    pub offset: Option<usize>,

    /// Start position within the track
    pub position_ms: u64,
}

/// Normalized remote player state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSnapshot {
    /// Id of the track the remote player reports as current
    pub track_id: Option<String>,

    /// Remote-reported track metadata, used when the track is not queued
    pub track: Option<Track>,

    pub paused: bool,
    pub position_ms: u64,
    pub duration_ms: u64,
}

/// Observable session state
///
/// This is the single value the UI renders from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionPlaybackState {
    /// Queue track at the current index, or the remote player's track
    pub current_track: Option<Track>,

    /// Current queue index (`None` iff the queue is empty)
    pub queue_index: Option<usize>,

    pub queue_len: usize,

    pub is_playing: bool,

    /// Position in seconds
    pub position: f64,

    /// Duration in seconds
    pub duration: f64,

    /// Volume 0.0 - 1.0
    pub volume: f32,

    pub last_error: Option<PlaybackError>,

    pub active_backend: ActiveBackend,

    pub remote_status: RemoteStatus,

    /// Whether the account is entitled to full-track playback
    pub premium: bool,

    /// A load sequence is running
    pub is_loading: bool,
}

impl SessionPlaybackState {
    pub fn new(volume: f32) -> Self {
        Self {
            current_track: None,
            queue_index: None,
            queue_len: 0,
            is_playing: false,
            position: 0.0,
            duration: 0.0,
            volume,
            last_error: None,
            active_backend: ActiveBackend::None,
            remote_status: RemoteStatus::Uninitialized,
            premium: false,
            is_loading: false,
        }
    }
}

/// Configuration for the playback orchestrator
///
/// Every field has a default, so a partial config only overrides what it
/// names.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Initial volume (0.0 - 1.0, default: 0.85)
    pub initial_volume: f32,

    /// How long polled play/pause state is ignored after a user action (default: 1.2s)
    pub user_action_lock: Duration,

    /// Remote state poll period while active (default: 250ms)
    pub poll_interval: Duration,

    /// Refresh access tokens this long before they expire (default: 5 min)
    ///
    /// Hand it to `TokenManager::with_refresh_buffer` when building the
    /// session's token provider.
    pub refresh_buffer: Duration,

    /// Duration assumed for a track that reports none, until the backend
    /// reports the real one (default: 30s, the preview clip length)
    pub default_duration_ms: u64,

    /// Name the remote player registers under
    pub player_name: String,
}

impl PlaybackConfig {
    /// Duration of `track` in seconds, falling back to the configured default
    pub fn duration_secs_of(&self, track: &Track) -> f64 {
        if track.duration_ms > 0 {
            track.duration_secs()
        } else {
            self.default_duration_ms as f64 / 1000.0
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            initial_volume: 0.85,
            user_action_lock: Duration::from_millis(1200),
            poll_interval: Duration::from_millis(250),
            refresh_buffer: Duration::from_secs(300),
            default_duration_ms: 30_000,
            player_name: "iPlay Web Player".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = PlaybackConfig::default();
        assert!((config.initial_volume - 0.85).abs() < f32::EPSILON);
        assert_eq!(config.user_action_lock, Duration::from_millis(1200));
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.refresh_buffer, Duration::from_secs(300));
        assert_eq!(config.default_duration_ms, 30_000);
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let config: PlaybackConfig =
            serde_json::from_str(r#"{"initial_volume": 0.5, "player_name": "Kitchen"}"#).unwrap();
        assert!((config.initial_volume - 0.5).abs() < f32::EPSILON);
        assert_eq!(config.player_name, "Kitchen");
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.refresh_buffer, Duration::from_secs(300));
    }

    #[test]
    fn unknown_duration_uses_default() {
        let config = PlaybackConfig::default();
        assert_eq!(config.duration_secs_of(&Track::new("a", "t", "a")), 30.0);
        assert_eq!(
            config.duration_secs_of(&Track::new("a", "t", "a").with_duration_ms(180_000)),
            180.0
        );
    }

    #[test]
    fn session_state_reads_back_with_error() {
        let mut state = SessionPlaybackState::new(0.5);
        state.last_error = Some(PlaybackError::UpstreamRateLimited { retry_after_secs: 4 });
        state.active_backend = ActiveBackend::Local;

        let json = serde_json::to_string(&state).unwrap();
        let back: SessionPlaybackState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn playable_uri_falls_back_to_id() {
        let track = Track::new("abc", "Song", "Artist");
        assert_eq!(track.playable_uri().as_deref(), Some("spotify:track:abc"));

        let explicit = Track::new("abc", "Song", "Artist").with_uri("spotify:track:xyz");
        assert_eq!(explicit.playable_uri().as_deref(), Some("spotify:track:xyz"));

        assert_eq!(Track::new("", "Local", "Artist").playable_uri(), None);
    }

    #[test]
    fn empty_preview_is_not_a_preview() {
        assert!(!Track::new("a", "t", "a").with_preview("").has_preview());
        assert!(Track::new("a", "t", "a").with_preview("https://p/1.mp3").has_preview());
    }

    #[test]
    fn remote_status_helpers() {
        assert!(RemoteStatus::Uninitialized.is_starting());
        assert!(RemoteStatus::Initializing.is_starting());
        assert!(!RemoteStatus::Failed { reason: "x".into() }.is_starting());

        let ready = RemoteStatus::Ready { device_id: "d1".into() };
        assert!(ready.is_usable());
        assert_eq!(ready.device_id(), Some("d1"));
        assert!(!RemoteStatus::Failed { reason: "x".into() }.is_usable());
    }

    #[test]
    fn active_backend_serializes_as_tagged_union() {
        let json = serde_json::to_value(ActiveBackend::Remote {
            device_id: "d1".into(),
        })
        .unwrap();
        assert_eq!(json["kind"], "remote");
        assert_eq!(json["device_id"], "d1");
    }
}
