//! Backend selection for a newly loaded track

use crate::types::{RemoteStatus, Track};

/// Where a track should play
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendChoice {
    /// Full track on the remote device
    Remote { uri: String },

    /// Preview clip on the local element
    Local { preview_url: String },

    /// Remote would be used but its device is still registering
    DeviceStarting,

    /// No source on hand; ask the catalog for a preview before giving up
    LookupPreview { track_id: String },

    /// Nothing can play this track
    NoPlayableSource,
}

/// Pick a backend from track capability, entitlement and remote status
///
/// 1. Entitled, remote ready or active, track has a URI: remote
/// 2. Entitled, track has a URI, remote still starting: wait
/// 3. Track has a preview: local
/// 4. Otherwise look the preview up by id, or give up
pub fn select_backend(track: &Track, premium: bool, remote: &RemoteStatus) -> BackendChoice {
    if premium {
        if let Some(uri) = track.playable_uri() {
            if remote.is_usable() {
                return BackendChoice::Remote { uri };
            }
            if remote.is_starting() {
                return BackendChoice::DeviceStarting;
            }
        }
    }

    if let Some(preview_url) = track.preview_url.as_deref().filter(|u| !u.is_empty()) {
        return BackendChoice::Local {
            preview_url: preview_url.to_string(),
        };
    }

    if track.id.is_empty() {
        BackendChoice::NoPlayableSource
    } else {
        BackendChoice::LookupPreview {
            track_id: track.id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_track() -> Track {
        Track::new("t1", "Song", "Artist")
            .with_uri("spotify:track:t1")
            .with_preview("https://p.test/t1.mp3")
    }

    fn ready() -> RemoteStatus {
        RemoteStatus::Ready {
            device_id: "dev-1".into(),
        }
    }

    #[test]
    fn entitled_ready_remote_wins_over_preview() {
        assert_eq!(
            select_backend(&full_track(), true, &ready()),
            BackendChoice::Remote {
                uri: "spotify:track:t1".into()
            }
        );
        assert!(matches!(
            select_backend(
                &full_track(),
                true,
                &RemoteStatus::Active {
                    device_id: "dev-1".into()
                }
            ),
            BackendChoice::Remote { .. }
        ));
    }

    #[test]
    fn failed_remote_falls_to_local() {
        let failed = RemoteStatus::Failed {
            reason: "init".into(),
        };
        assert_eq!(
            select_backend(&full_track(), true, &failed),
            BackendChoice::Local {
                preview_url: "https://p.test/t1.mp3".into()
            }
        );
    }

    #[test]
    fn not_entitled_uses_preview() {
        assert!(matches!(
            select_backend(&full_track(), false, &ready()),
            BackendChoice::Local { .. }
        ));
    }

    #[test]
    fn starting_remote_reports_device_starting() {
        assert_eq!(
            select_backend(&full_track(), true, &RemoteStatus::Initializing),
            BackendChoice::DeviceStarting
        );
        assert_eq!(
            select_backend(&full_track(), true, &RemoteStatus::Uninitialized),
            BackendChoice::DeviceStarting
        );
    }

    #[test]
    fn missing_preview_triggers_lookup() {
        let track = Track::new("t2", "Song", "Artist");
        assert_eq!(
            select_backend(&track, false, &ready()),
            BackendChoice::LookupPreview {
                track_id: "t2".into()
            }
        );
    }

    #[test]
    fn anonymous_track_without_preview_is_unplayable() {
        let track = Track::new("", "Song", "Artist");
        assert_eq!(
            select_backend(&track, true, &ready()),
            BackendChoice::NoPlayableSource
        );
    }
}
