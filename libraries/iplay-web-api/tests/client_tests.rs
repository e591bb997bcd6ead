//! Web API client tests against a mock upstream.

use async_trait::async_trait;
use iplay_auth::AccessTokenProvider;
use iplay_playback::{PlaybackError, RemotePlaybackApi, StartRequest};
use iplay_web_api::{ApiError, PlayOffset, PlayRequest, RetryPolicy, WebApiClient};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct StaticToken;

#[async_trait]
impl AccessTokenProvider for StaticToken {
    async fn access_token(&self) -> iplay_auth::Result<String> {
        Ok("test-access-token".to_string())
    }
}

fn client(server: &MockServer) -> WebApiClient {
    WebApiClient::with_base_url(server.uri(), Arc::new(StaticToken))
        .expect("valid url")
        .with_retry(RetryPolicy::new(2, Duration::from_millis(5)))
}

fn uris(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|id| format!("spotify:track:{}", id)).collect()
}

// =============================================================================
// Reads
// =============================================================================

mod reads {
    use super::*;

    #[tokio::test]
    async fn test_current_user_sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/me"))
            .and(header("authorization", "Bearer test-access-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "user-1",
                "display_name": "Listener",
                "product": "premium"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let profile = client(&server).current_user().await.unwrap();

        assert_eq!(profile.id, "user-1");
        assert!(profile.is_premium());
    }

    #[tokio::test]
    async fn test_devices_are_listed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/me/player/devices"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "devices": [
                    {"id": "phone", "name": "Phone", "type": "Smartphone", "is_active": true},
                    {"id": null, "name": "Restricted", "type": "Speaker", "is_restricted": true}
                ]
            })))
            .mount(&server)
            .await;

        let devices = client(&server).available_devices().await.unwrap();

        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].id.as_deref(), Some("phone"));
        assert!(devices[0].is_active);
        assert_eq!(devices[1].id, None);
    }

    #[tokio::test]
    async fn test_track_lookup() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tracks/abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "abc",
                "name": "Song",
                "artists": [{"name": "Artist"}],
                "duration_ms": 215000,
                "preview_url": "https://p.test/abc.mp3",
                "uri": "spotify:track:abc"
            })))
            .mount(&server)
            .await;

        let track = client(&server).track("abc").await.unwrap();

        assert_eq!(track.name, "Song");
        assert_eq!(track.preview(), Some("https://p.test/abc.mp3"));
        assert_eq!(track.duration_ms, 215000);
    }

    #[tokio::test]
    async fn test_missing_track_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tracks/gone"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": {"status": 404, "message": "Non existing id"}
            })))
            .mount(&server)
            .await;

        let result = client(&server).track("gone").await;

        assert_eq!(result, Err(ApiError::NotFound("Non existing id".into())));
    }
}

// =============================================================================
// Status Mapping
// =============================================================================

mod status_mapping {
    use super::*;

    async fn pause_with_status(status: u16) -> Result<(), ApiError> {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/me/player/pause"))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({
                "error": {"status": status, "message": "upstream says no"}
            })))
            .mount(&server)
            .await;

        client(&server).pause_playback(None).await
    }

    #[tokio::test]
    async fn test_player_404_means_no_active_device() {
        assert_eq!(pause_with_status(404).await, Err(ApiError::NoActiveDevice));
    }

    #[tokio::test]
    async fn test_401_is_unauthorized() {
        assert_eq!(
            pause_with_status(401).await,
            Err(ApiError::Unauthorized("upstream says no".into()))
        );
    }

    #[tokio::test]
    async fn test_403_is_forbidden() {
        assert_eq!(
            pause_with_status(403).await,
            Err(ApiError::Forbidden("upstream says no".into()))
        );
    }

    #[tokio::test]
    async fn test_5xx_is_upstream_error() {
        assert_eq!(
            pause_with_status(502).await,
            Err(ApiError::Upstream {
                status: 502,
                message: "upstream says no".into()
            })
        );
    }

    #[tokio::test]
    async fn test_non_json_error_uses_reason_phrase() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/me/player/next"))
            .respond_with(ResponseTemplate::new(503).set_body_string("<html>down</html>"))
            .mount(&server)
            .await;

        let result = client(&server).skip_to_next(None).await;

        assert_eq!(
            result,
            Err(ApiError::Upstream {
                status: 503,
                message: "Service Unavailable".into()
            })
        );
    }

    #[tokio::test]
    async fn test_unreachable_upstream() {
        let client = WebApiClient::with_base_url("http://127.0.0.1:9", Arc::new(StaticToken))
            .expect("valid url");

        let result = client.pause_playback(None).await;

        assert!(matches!(result, Err(ApiError::Unreachable(_))));
    }
}

// =============================================================================
// Rate Limiting
// =============================================================================

mod rate_limiting {
    use super::*;

    #[tokio::test]
    async fn test_get_retries_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/me"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/me"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "user-1"})))
            .expect(1)
            .mount(&server)
            .await;

        let profile = client(&server).current_user().await.unwrap();

        assert_eq!(profile.id, "user-1");
    }

    #[tokio::test]
    async fn test_get_gives_up_after_max_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/me/player/devices"))
            .respond_with(ResponseTemplate::new(429))
            .expect(3)
            .mount(&server)
            .await;

        let result = client(&server).available_devices().await;

        assert_eq!(result, Err(ApiError::RateLimited { retry_after_secs: 1 }));
    }

    #[tokio::test]
    async fn test_retry_after_is_honoured() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/me"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "1"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/me"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "user-1"})))
            .mount(&server)
            .await;

        let started = Instant::now();
        client(&server).current_user().await.unwrap();

        assert!(started.elapsed() >= Duration::from_millis(950));
    }

    #[tokio::test]
    async fn test_control_calls_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/me/player/pause"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "7"))
            .expect(1)
            .mount(&server)
            .await;

        let result = client(&server).pause_playback(None).await;

        assert_eq!(result, Err(ApiError::RateLimited { retry_after_secs: 7 }));
    }
}

// =============================================================================
// Playback Control
// =============================================================================

mod playback_control {
    use super::*;

    #[tokio::test]
    async fn test_transfer_body() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/me/player"))
            .and(body_json(json!({"device_ids": ["web-player"], "play": false})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .transfer_playback("web-player", false)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_transfer_requires_device() {
        let server = MockServer::start().await;

        let result = client(&server).transfer_playback("", true).await;

        assert!(matches!(result, Err(ApiError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_start_sends_uris_offset_and_device() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/me/player/play"))
            .and(query_param("device_id", "web-player"))
            .and(body_json(json!({
                "uris": ["spotify:track:a", "spotify:track:b"],
                "offset": {"position": 1},
                "position_ms": 0
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let request = PlayRequest::uris(uris(&["a", "b"])).with_offset(PlayOffset::Position(1));
        client(&server)
            .start_playback(Some("web-player"), &request)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_start_without_target_is_rejected() {
        let server = MockServer::start().await;

        let result = client(&server)
            .start_playback(None, &PlayRequest::default())
            .await;

        assert!(matches!(result, Err(ApiError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_seek_and_volume_use_query() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/me/player/seek"))
            .and(query_param("position_ms", "42000"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/me/player/volume"))
            .and(query_param("volume_percent", "100"))
            .and(query_param("device_id", "web-player"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server);
        client.seek_to(42_000, None).await.unwrap();
        client.set_volume(150, Some("web-player")).await.unwrap();
    }

    #[tokio::test]
    async fn test_resume_and_skips() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/me/player/play"))
            .and(body_json(json!({})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/me/player/next"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/me/player/previous"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server);
        client.resume_playback(None).await.unwrap();
        client.skip_to_next(None).await.unwrap();
        client.skip_to_previous(None).await.unwrap();
    }
}

// =============================================================================
// Start Recovery
// =============================================================================

mod start_recovery {
    use super::*;

    #[tokio::test]
    async fn test_transfer_then_retry_on_requested_device() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/me/player/play"))
            .respond_with(ResponseTemplate::new(404))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/me/player"))
            .and(body_json(json!({"device_ids": ["web-player"], "play": false})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/me/player/play"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let device = client(&server)
            .start_playback_with_recovery(Some("web-player"), &PlayRequest::uris(uris(&["a"])))
            .await
            .unwrap();

        assert_eq!(device.as_deref(), Some("web-player"));
    }

    #[tokio::test]
    async fn test_falls_back_to_listed_device() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/me/player/play"))
            .and(query_param("device_id", "speaker"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/me/player/play"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/me/player"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/me/player/devices"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "devices": [
                    {"id": "phone", "name": "Phone", "is_active": false},
                    {"id": "speaker", "name": "Speaker", "is_active": true}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let device = client(&server)
            .start_playback_with_recovery(None, &PlayRequest::uris(uris(&["a"])))
            .await
            .unwrap();

        assert_eq!(device.as_deref(), Some("speaker"));
    }

    #[tokio::test]
    async fn test_no_devices_surfaces_no_active_device() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/me/player/play"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/me/player/devices"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"devices": []})))
            .mount(&server)
            .await;

        let result = client(&server)
            .start_playback_with_recovery(None, &PlayRequest::uris(uris(&["a"])))
            .await;

        assert_eq!(result, Err(ApiError::NoActiveDevice));
    }

    #[tokio::test]
    async fn test_auth_error_is_not_recovered() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/me/player/play"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let result = client(&server)
            .start_playback_with_recovery(Some("web-player"), &PlayRequest::uris(uris(&["a"])))
            .await;

        assert!(matches!(result, Err(ApiError::Unauthorized(_))));
    }
}

// =============================================================================
// Orchestrator Adapter
// =============================================================================

mod remote_adapter {
    use super::*;

    #[tokio::test]
    async fn test_start_maps_missing_device() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/me/player/play"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let request = StartRequest {
            uris: uris(&["a"]),
            offset: None,
            position_ms: 0,
        };
        let result = RemotePlaybackApi::start(&client(&server), "web-player", &request).await;

        assert_eq!(result, Err(PlaybackError::NoActiveDevice));
    }

    #[tokio::test]
    async fn test_preview_lookup() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tracks/with"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "with", "name": "A", "preview_url": "https://p.test/with.mp3"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/tracks/without"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "without", "name": "B", "preview_url": null
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/tracks/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = client(&server);
        assert_eq!(
            client.preview_url("with").await,
            Ok(Some("https://p.test/with.mp3".to_string()))
        );
        assert_eq!(client.preview_url("without").await, Ok(None));
        assert_eq!(client.preview_url("missing").await, Ok(None));
    }

    #[tokio::test]
    async fn test_entitlement_and_auth_mapping() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/me"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "u", "product": "free"
            })))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/me/player/pause"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = client(&server);
        assert_eq!(client.is_premium().await, Ok(false));
        assert_eq!(
            RemotePlaybackApi::pause(&client, "web-player").await,
            Err(PlaybackError::AuthExpired)
        );
    }
}
