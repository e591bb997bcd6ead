//! Playback backends and the platform seams they sit on
//!
//! The orchestrator never talks to a vendor SDK, an audio element or the
//! upstream HTTP API directly. Platform code provides these traits:
//! - [`RemotePlaybackApi`]: upstream playback-control endpoints
//! - [`PlayerSdk`]: the vendor full-track player embedded in the client
//! - [`AudioElement`]: a local element able to play a preview URL

mod local;
mod remote;

pub use local::LocalClipBackend;
pub use remote::{RemoteControl, RemoteDeviceBackend};

use crate::error::Result;
use crate::events::EventSink;
use crate::types::{DeviceInfo, RemoteSnapshot, StartRequest};
use async_trait::async_trait;
use iplay_auth::AccessTokenProvider;
use std::sync::Arc;

/// Upstream playback-control API
///
/// Implementations map a "no active device" response to
/// [`PlaybackError::NoActiveDevice`](crate::PlaybackError::NoActiveDevice).
#[async_trait]
pub trait RemotePlaybackApi: Send + Sync {
    /// Move playback to `device_id`, optionally starting it
    async fn transfer(&self, device_id: &str, play: bool) -> Result<()>;

    /// Start playing `request.uris` on `device_id`
    async fn start(&self, device_id: &str, request: &StartRequest) -> Result<()>;

    async fn resume(&self, device_id: &str) -> Result<()>;

    async fn pause(&self, device_id: &str) -> Result<()>;

    async fn seek(&self, device_id: &str, position_ms: u64) -> Result<()>;

    async fn next(&self, device_id: &str) -> Result<()>;

    async fn previous(&self, device_id: &str) -> Result<()>;

    async fn devices(&self) -> Result<Vec<DeviceInfo>>;

    /// Preview clip URL from track metadata, if the catalog has one
    async fn preview_url(&self, track_id: &str) -> Result<Option<String>>;

    /// Whether the account may use full-track playback
    async fn is_premium(&self) -> Result<bool>;
}

/// Vendor full-track player
///
/// `connect` starts registration; the outcome arrives later through the
/// sink as `Ready`, `InitializationFailed`, `AuthenticationFailed` or
/// `AccountError`. State changes are pushed as `RemoteState` events.
#[async_trait]
pub trait PlayerSdk: Send + Sync {
    async fn connect(
        &self,
        name: &str,
        volume: f32,
        tokens: Arc<dyn AccessTokenProvider>,
        sink: EventSink,
    ) -> Result<()>;

    async fn current_state(&self) -> Option<RemoteSnapshot>;

    async fn set_volume(&self, volume: f32);

    async fn disconnect(&self);
}

/// Local audio element for preview clips
///
/// Element events (time update, metadata, play/pause, ended, error) go to
/// the sink passed to [`attach`](AudioElement::attach).
#[async_trait]
pub trait AudioElement: Send + Sync {
    fn attach(&mut self, sink: EventSink);

    fn load(&mut self, url: &str);

    /// Start playback; fails with `PlaybackBlocked` under autoplay policy
    async fn play(&mut self) -> Result<()>;

    fn pause(&mut self);

    fn seek(&mut self, position_secs: f64);

    fn set_volume(&mut self, volume: f32);

    /// Drop the current source
    fn unload(&mut self);
}
