//! Remote full-track device backend

use super::{PlayerSdk, RemotePlaybackApi};
use crate::error::{PlaybackError, Result};
use crate::events::{BackendEventKind, EventSink};
use crate::types::{RemoteStatus, StartRequest};
use iplay_auth::AccessTokenProvider;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Transport call on the remote device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteControl {
    Resume,
    Pause,
    Seek { position_ms: u64 },
    Next,
    Previous,
}

/// Drives the vendor player and the upstream control API as one backend
///
/// Status moves `Uninitialized -> Initializing -> Ready -> Active`, with
/// `Failed` reachable from anywhere. Control calls need `Active`; a device
/// that is only `Ready` must be transferred to first.
pub struct RemoteDeviceBackend {
    sdk: Arc<dyn PlayerSdk>,
    api: Arc<dyn RemotePlaybackApi>,
    tokens: Arc<dyn AccessTokenProvider>,
    sink: EventSink,
    status: RemoteStatus,
    own_device: Option<String>,
    connected: bool,
    poller: Option<JoinHandle<()>>,
    poll_interval: Duration,
    player_name: String,
}

impl RemoteDeviceBackend {
    pub fn new(
        sdk: Arc<dyn PlayerSdk>,
        api: Arc<dyn RemotePlaybackApi>,
        tokens: Arc<dyn AccessTokenProvider>,
        sink: EventSink,
        poll_interval: Duration,
        player_name: impl Into<String>,
    ) -> Self {
        Self {
            sdk,
            api,
            tokens,
            sink,
            status: RemoteStatus::Uninitialized,
            own_device: None,
            connected: false,
            poller: None,
            poll_interval,
            player_name: player_name.into(),
        }
    }

    pub fn status(&self) -> &RemoteStatus {
        &self.status
    }

    /// Device id our own player registered with
    pub fn own_device_id(&self) -> Option<&str> {
        self.own_device.as_deref()
    }

    pub fn is_polling(&self) -> bool {
        self.poller.as_ref().is_some_and(|p| !p.is_finished())
    }

    /// Connect the vendor player. Readiness arrives later as an event.
    pub async fn initialize(&mut self, volume: f32) {
        if !matches!(
            self.status,
            RemoteStatus::Uninitialized | RemoteStatus::Failed { .. }
        ) {
            return;
        }

        info!(name = %self.player_name, "Initializing remote player");
        self.status = RemoteStatus::Initializing;

        match self
            .sdk
            .connect(
                &self.player_name,
                volume,
                Arc::clone(&self.tokens),
                self.sink.clone(),
            )
            .await
        {
            Ok(()) => self.connected = true,
            Err(e) => {
                warn!(error = %e, "Remote player failed to connect");
                self.status = RemoteStatus::Failed {
                    reason: e.to_string(),
                };
            }
        }
    }

    /// Re-initialize after a failure
    pub async fn retry(&mut self, volume: f32) {
        if !matches!(self.status, RemoteStatus::Failed { .. }) {
            return;
        }
        info!("Retrying remote player");
        self.stop_polling();
        if self.connected {
            self.sdk.disconnect().await;
            self.connected = false;
        }
        self.status = RemoteStatus::Uninitialized;
        self.initialize(volume).await;
    }

    pub(crate) fn on_ready(&mut self, device_id: String) {
        info!(device_id = %device_id, "Remote player ready");
        self.own_device = Some(device_id.clone());
        let already_active = matches!(
            &self.status,
            RemoteStatus::Active { device_id: active } if *active == device_id
        );
        if !already_active {
            self.status = RemoteStatus::Ready { device_id };
        }
    }

    pub(crate) fn on_not_ready(&mut self, device_id: &str) {
        warn!(device_id = %device_id, "Remote device went offline");
        if self.own_device.as_deref() == Some(device_id) {
            self.own_device = None;
        }
        self.status = RemoteStatus::Initializing;
    }

    pub(crate) fn on_failure(&mut self, reason: String) {
        warn!(reason = %reason, "Remote player failed");
        self.stop_polling();
        self.status = RemoteStatus::Failed { reason };
    }

    fn active_device(&self) -> Result<String> {
        match &self.status {
            RemoteStatus::Active { device_id } => Ok(device_id.clone()),
            _ => Err(PlaybackError::NoActiveDevice),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.status, RemoteStatus::Active { .. })
    }

    /// Transfer playback to our own player
    pub async fn transfer(&mut self, play: bool) -> Result<()> {
        let own = self
            .own_device
            .clone()
            .ok_or(PlaybackError::NoActiveDevice)?;
        self.transfer_to(&own, play).await
    }

    /// Transfer playback to any device; it becomes the control target
    pub async fn transfer_to(&mut self, device_id: &str, play: bool) -> Result<()> {
        debug!(device_id = %device_id, play, "Transferring playback");
        self.api.transfer(device_id, play).await?;
        self.status = RemoteStatus::Active {
            device_id: device_id.to_string(),
        };
        Ok(())
    }

    pub async fn start(&mut self, request: &StartRequest) -> Result<()> {
        let device = self.active_device()?;
        self.api.start(&device, request).await
    }

    /// Issue a transport call against the active device
    pub async fn control(&mut self, call: RemoteControl) -> Result<()> {
        let device = self.active_device()?;
        match call {
            RemoteControl::Resume => self.api.resume(&device).await,
            RemoteControl::Pause => self.api.pause(&device).await,
            RemoteControl::Seek { position_ms } => self.api.seek(&device, position_ms).await,
            RemoteControl::Next => self.api.next(&device).await,
            RemoteControl::Previous => self.api.previous(&device).await,
        }
    }

    /// Transfer back to our own player, or to the device we were driving
    pub async fn reclaim(&mut self) -> Result<()> {
        let target = self
            .own_device
            .clone()
            .or_else(|| self.status.device_id().map(str::to_string))
            .ok_or(PlaybackError::NoActiveDevice)?;
        self.transfer_to(&target, false).await
    }

    pub async fn set_volume(&self, volume: f32) {
        if self.connected {
            self.sdk.set_volume(volume).await;
        }
    }

    pub(crate) fn activate(&mut self, generation: u64) {
        self.sink.arm(generation);
        self.start_polling();
    }

    pub(crate) fn deactivate(&mut self) {
        self.sink.disarm();
        self.stop_polling();
    }

    /// Disconnect the vendor player entirely
    pub async fn teardown(&mut self) {
        self.deactivate();
        if self.connected {
            self.sdk.disconnect().await;
            self.connected = false;
        }
        self.own_device = None;
        self.status = RemoteStatus::Uninitialized;
    }

    fn start_polling(&mut self) {
        self.stop_polling();

        let sdk = Arc::clone(&self.sdk);
        let sink = self.sink.clone();
        let period = self.poll_interval;

        self.poller = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if let Some(snapshot) = sdk.current_state().await {
                    if !sink.emit(BackendEventKind::RemoteState(Some(snapshot))) {
                        break;
                    }
                }
            }
        }));
    }

    fn stop_polling(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.abort();
        }
    }
}

impl Drop for RemoteDeviceBackend {
    fn drop(&mut self) {
        self.stop_polling();
    }
}
