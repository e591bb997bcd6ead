//! Orchestrator adapter over [`WebApiClient`]

use crate::client::WebApiClient;
use crate::error::ApiError;
use crate::types::PlayRequest;
use async_trait::async_trait;
use iplay_playback::{DeviceInfo, PlaybackError, RemotePlaybackApi, Result, StartRequest};
use tracing::debug;

#[async_trait]
impl RemotePlaybackApi for WebApiClient {
    async fn transfer(&self, device_id: &str, play: bool) -> Result<()> {
        Ok(self.transfer_playback(device_id, play).await?)
    }

    async fn start(&self, device_id: &str, request: &StartRequest) -> Result<()> {
        Ok(self
            .start_playback(Some(device_id), &PlayRequest::from(request))
            .await?)
    }

    async fn resume(&self, device_id: &str) -> Result<()> {
        Ok(self.resume_playback(Some(device_id)).await?)
    }

    async fn pause(&self, device_id: &str) -> Result<()> {
        Ok(self.pause_playback(Some(device_id)).await?)
    }

    async fn seek(&self, device_id: &str, position_ms: u64) -> Result<()> {
        Ok(self.seek_to(position_ms, Some(device_id)).await?)
    }

    async fn next(&self, device_id: &str) -> Result<()> {
        Ok(self.skip_to_next(Some(device_id)).await?)
    }

    async fn previous(&self, device_id: &str) -> Result<()> {
        Ok(self.skip_to_previous(Some(device_id)).await?)
    }

    async fn devices(&self) -> Result<Vec<DeviceInfo>> {
        let devices = self.available_devices().await?;
        Ok(devices.into_iter().map(DeviceInfo::from).collect())
    }

    async fn preview_url(&self, track_id: &str) -> Result<Option<String>> {
        match self.track(track_id).await {
            Ok(track) => Ok(track.preview().map(str::to_string)),
            Err(ApiError::NotFound(_) | ApiError::InvalidRequest(_)) => {
                debug!(track_id = %track_id, "Track not found for preview lookup");
                Ok(None)
            }
            Err(err) => Err(PlaybackError::from(err)),
        }
    }

    async fn is_premium(&self) -> Result<bool> {
        Ok(self.current_user().await?.is_premium())
    }
}
