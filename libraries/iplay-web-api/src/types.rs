//! Types for upstream Web API requests and responses.

use iplay_playback::{DeviceInfo, StartRequest, Track};
use serde::{Deserialize, Serialize};

// =============================================================================
// Profile
// =============================================================================

/// Current user's profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    /// Subscription level ("premium", "free", ...)
    #[serde(default)]
    pub product: Option<String>,
}

impl UserProfile {
    /// Subscription level, "free" when not reported
    pub fn product(&self) -> &str {
        self.product.as_deref().unwrap_or("free")
    }

    /// Whether the account may use the full-track remote player
    pub fn is_premium(&self) -> bool {
        self.product().eq_ignore_ascii_case("premium")
    }
}

// =============================================================================
// Devices
// =============================================================================

/// Playback device as listed upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub is_restricted: bool,
    #[serde(default)]
    pub volume_percent: Option<u8>,
}

impl From<Device> for DeviceInfo {
    fn from(device: Device) -> Self {
        DeviceInfo {
            id: device.id,
            name: device.name,
            is_active: device.is_active,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct DevicesResponse {
    #[serde(default)]
    pub devices: Vec<Device>,
}

// =============================================================================
// Tracks
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiArtist {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiImage {
    pub url: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiAlbum {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub images: Vec<ApiImage>,
}

/// Track object from `/tracks/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiTrack {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<ApiArtist>,
    #[serde(default)]
    pub album: Option<ApiAlbum>,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub preview_url: Option<String>,
    #[serde(default)]
    pub uri: Option<String>,
}

impl ApiTrack {
    /// Artist names joined for display
    pub fn artist_names(&self) -> String {
        self.artists
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Preview URL, treating an empty string as absent
    pub fn preview(&self) -> Option<&str> {
        self.preview_url.as_deref().filter(|u| !u.is_empty())
    }
}

impl From<ApiTrack> for Track {
    fn from(api: ApiTrack) -> Self {
        let artist = api.artist_names();
        let art = api
            .album
            .as_ref()
            .and_then(|album| album.images.first())
            .map(|image| image.url.clone());

        let mut track = Track::new(api.id.unwrap_or_default(), api.name, artist)
            .with_duration_ms(api.duration_ms);
        if let Some(preview) = api.preview_url.filter(|u| !u.is_empty()) {
            track = track.with_preview(preview);
        }
        if let Some(uri) = api.uri {
            track = track.with_uri(uri);
        }
        if let Some(url) = art {
            track = track.with_album_art(url);
        }
        track
    }
}

// =============================================================================
// Playback Control
// =============================================================================

/// Where to start within the requested URIs or context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayOffset {
    Position(usize),
    Uri(String),
}

/// Body of `PUT /me/player/play`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayRequest {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub uris: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<PlayOffset>,
    #[serde(default)]
    pub position_ms: u64,
}

impl PlayRequest {
    pub fn uris(uris: Vec<String>) -> Self {
        Self {
            uris,
            ..Self::default()
        }
    }

    pub fn with_offset(mut self, offset: PlayOffset) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn at_position(mut self, position_ms: u64) -> Self {
        self.position_ms = position_ms;
        self
    }

    /// Whether there is anything to play
    pub fn has_target(&self) -> bool {
        !self.uris.is_empty() || self.context_uri.is_some()
    }
}

impl From<&StartRequest> for PlayRequest {
    fn from(request: &StartRequest) -> Self {
        PlayRequest {
            uris: request.uris.clone(),
            context_uri: None,
            offset: request.offset.map(PlayOffset::Position),
            position_ms: request.position_ms,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct TransferRequest<'a> {
    pub device_ids: [&'a str; 1],
    pub play: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn premium_flag_follows_product() {
        let profile: UserProfile =
            serde_json::from_value(json!({"id": "u1", "product": "premium"})).unwrap();
        assert!(profile.is_premium());

        let free: UserProfile = serde_json::from_value(json!({"id": "u2"})).unwrap();
        assert_eq!(free.product(), "free");
        assert!(!free.is_premium());
    }

    #[test]
    fn play_request_omits_empty_fields() {
        let body = serde_json::to_value(
            PlayRequest::uris(vec!["spotify:track:a".into()]).with_offset(PlayOffset::Position(2)),
        )
        .unwrap();
        assert_eq!(
            body,
            json!({"uris": ["spotify:track:a"], "offset": {"position": 2}, "position_ms": 0})
        );

        let empty = serde_json::to_value(PlayRequest::default()).unwrap();
        assert_eq!(empty, json!({"position_ms": 0}));
    }

    #[test]
    fn start_request_converts() {
        let start = StartRequest {
            uris: vec!["spotify:track:a".into(), "spotify:track:b".into()],
            offset: Some(1),
            position_ms: 500,
        };
        let play = PlayRequest::from(&start);
        assert_eq!(play.offset, Some(PlayOffset::Position(1)));
        assert_eq!(play.position_ms, 500);
        assert!(play.has_target());
    }

    #[test]
    fn api_track_becomes_queue_track() {
        let api: ApiTrack = serde_json::from_value(json!({
            "id": "t1",
            "name": "Song",
            "artists": [{"name": "A"}, {"name": "B"}],
            "album": {"name": "Album", "images": [{"url": "https://i.test/1.jpg"}]},
            "duration_ms": 200000,
            "preview_url": "",
            "uri": "spotify:track:t1"
        }))
        .unwrap();

        assert_eq!(api.preview(), None);
        let track = Track::from(api);
        assert_eq!(track.artist, "A, B");
        assert_eq!(track.preview_url, None);
        assert_eq!(track.album_art_url.as_deref(), Some("https://i.test/1.jpg"));
        assert_eq!(track.playable_uri().as_deref(), Some("spotify:track:t1"));
    }
}
