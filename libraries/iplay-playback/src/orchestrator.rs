//! Playback orchestrator
//!
//! Owns the queue and the observable session state, picks a backend per
//! track, runs the remote fallback chain and folds backend events back into
//! one [`SessionPlaybackState`].

use crate::backend::{
    AudioElement, LocalClipBackend, PlayerSdk, RemoteControl, RemoteDeviceBackend,
    RemotePlaybackApi,
};
use crate::error::{PlaybackError, Result};
use crate::events::{BackendEvent, BackendEventKind, EventSink, DISARMED};
use crate::fallback::{pick_best_device, FallbackStep};
use crate::queue::Queue;
use crate::selection::{select_backend, BackendChoice};
use crate::types::{
    ActiveBackend, BackendKind, PlaybackConfig, RemoteSnapshot, SessionPlaybackState,
    StartRequest, Track,
};
use iplay_auth::AccessTokenProvider;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

/// Session-level playback state machine
///
/// All mutation goes through `&mut self`, so intents and backend events
/// are applied one at a time. Use [`spawn`](crate::spawn) to run it as a
/// task behind a cloneable handle.
pub struct PlaybackOrchestrator {
    config: PlaybackConfig,
    api: Arc<dyn RemotePlaybackApi>,
    remote: RemoteDeviceBackend,
    local: LocalClipBackend,
    queue: Queue,
    state: SessionPlaybackState,
    generation: u64,
    user_action_until: Option<Instant>,
    events: Option<mpsc::UnboundedReceiver<BackendEvent>>,
    state_tx: watch::Sender<SessionPlaybackState>,
}

impl PlaybackOrchestrator {
    pub fn new(
        config: PlaybackConfig,
        api: Arc<dyn RemotePlaybackApi>,
        sdk: Arc<dyn PlayerSdk>,
        element: Box<dyn AudioElement>,
        tokens: Arc<dyn AccessTokenProvider>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let remote = RemoteDeviceBackend::new(
            sdk,
            Arc::clone(&api),
            tokens,
            EventSink::new(events_tx.clone(), BackendKind::Remote),
            config.poll_interval,
            config.player_name.clone(),
        );
        let mut local = LocalClipBackend::new(element, EventSink::new(events_tx, BackendKind::Local));

        let volume = clamp_volume(config.initial_volume).unwrap_or(0.85);
        local.set_volume(volume);
        let state = SessionPlaybackState::new(volume);
        let (state_tx, _) = watch::channel(state.clone());

        Self {
            config,
            api,
            remote,
            local,
            queue: Queue::new(),
            state,
            generation: DISARMED,
            user_action_until: None,
            events: Some(events_rx),
            state_tx,
        }
    }

    /// Current session state
    pub fn state(&self) -> &SessionPlaybackState {
        &self.state
    }

    /// Receive every published state
    pub fn subscribe(&self) -> watch::Receiver<SessionPlaybackState> {
        self.state_tx.subscribe()
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    /// Current activation generation
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Hand the backend event receiver to an external loop
    ///
    /// After this, [`drain_events`](Self::drain_events) is a no-op.
    pub fn take_event_receiver(&mut self) -> Option<mpsc::UnboundedReceiver<BackendEvent>> {
        self.events.take()
    }

    /// Apply every backend event queued so far. Returns how many were read.
    pub async fn drain_events(&mut self) -> usize {
        let mut pending = Vec::new();
        if let Some(events) = self.events.as_mut() {
            while let Ok(event) = events.try_recv() {
                pending.push(event);
            }
        }

        let count = pending.len();
        for event in pending {
            self.handle_event(event).await;
        }
        count
    }

    // ===== Lifecycle =====

    /// Look up entitlement and bring up the remote player if entitled
    pub async fn initialize(&mut self) {
        match self.api.is_premium().await {
            Ok(premium) => self.state.premium = premium,
            Err(err) => {
                warn!(error = %err, "Entitlement lookup failed, using previews only");
                self.state.premium = false;
                if matches!(
                    err,
                    PlaybackError::NotAuthenticated | PlaybackError::AuthExpired
                ) {
                    self.state.last_error = Some(err);
                }
            }
        }

        info!(premium = self.state.premium, "Playback session initialized");
        if self.state.premium {
            self.remote.initialize(self.state.volume).await;
        }
        self.publish();
    }

    /// Override entitlement (e.g. after a profile refresh)
    pub fn set_entitlement(&mut self, premium: bool) {
        self.state.premium = premium;
        self.publish();
    }

    /// Try the remote player again after it failed
    pub async fn retry_remote(&mut self) {
        self.remote.retry(self.state.volume).await;
        self.publish();
    }

    /// Stop everything and disconnect the remote player
    pub async fn teardown(&mut self) {
        self.stop_active().await;
        self.remote.teardown().await;
        self.generation += 1;
        self.publish();
        info!("Playback session torn down");
    }

    pub fn clear_error(&mut self) {
        self.state.last_error = None;
        self.publish();
    }

    // ===== Intents =====

    /// Play `track`, replacing the queue with `context` (or just the track)
    pub async fn play_track(&mut self, track: Track, context: Option<Vec<Track>>) -> Result<()> {
        let tracks = match context {
            Some(tracks) if !tracks.is_empty() => tracks,
            _ => vec![track.clone()],
        };
        let index = tracks
            .iter()
            .position(|t| !t.id.is_empty() && t.id == track.id)
            .unwrap_or(0);

        self.queue.replace(tracks, index);
        self.state.last_error = None;
        self.start_current(true).await
    }

    /// Replace the queue and start at `start_index` (clamped)
    pub async fn set_queue_and_play(&mut self, tracks: Vec<Track>, start_index: usize) -> Result<()> {
        self.state.last_error = None;
        if tracks.is_empty() {
            self.stop_active().await;
            self.queue.clear();
            self.refresh_current();
            self.publish();
            return Ok(());
        }

        self.queue.replace(tracks, start_index);
        self.start_current(true).await
    }

    pub async fn play(&mut self) -> Result<()> {
        if self.queue.current().is_none() {
            return Ok(());
        }

        let result = match self.state.active_backend {
            ActiveBackend::Remote { .. } => {
                self.lock_user_action();
                self.state.is_playing = true;
                self.publish();
                let result = self.remote_control(RemoteControl::Resume).await;
                if result.is_err() {
                    self.state.is_playing = false;
                }
                result
            }
            ActiveBackend::Local => {
                let result = self.local.play().await;
                self.state.is_playing = result.is_ok();
                result
            }
            ActiveBackend::None => return self.start_current(true).await,
        };

        self.finish(result)
    }

    pub async fn pause(&mut self) -> Result<()> {
        if self.queue.current().is_none() {
            return Ok(());
        }

        let result = match self.state.active_backend {
            ActiveBackend::Remote { .. } => {
                self.lock_user_action();
                let was_playing = self.state.is_playing;
                self.state.is_playing = false;
                self.publish();
                let result = self.remote_control(RemoteControl::Pause).await;
                if result.is_err() {
                    self.state.is_playing = was_playing;
                }
                result
            }
            ActiveBackend::Local => {
                self.local.pause();
                self.state.is_playing = false;
                Ok(())
            }
            ActiveBackend::None => Ok(()),
        };

        self.finish(result)
    }

    pub async fn toggle_play(&mut self) -> Result<()> {
        if self.state.is_playing {
            self.pause().await
        } else {
            self.play().await
        }
    }

    /// Seek to `position_secs`, clamped into the track
    pub async fn seek(&mut self, position_secs: f64) -> Result<()> {
        if self.queue.current().is_none() {
            return Ok(());
        }

        let target = clamp_position(position_secs, self.state.duration);
        let result = match self.state.active_backend {
            ActiveBackend::Remote { .. } => {
                let position_ms = (target * 1000.0).round() as u64;
                self.remote_control(RemoteControl::Seek { position_ms }).await
            }
            ActiveBackend::Local => {
                self.local.seek(target);
                Ok(())
            }
            ActiveBackend::None => Ok(()),
        };

        if result.is_ok() {
            self.state.position = target;
        }
        self.finish(result)
    }

    pub async fn next(&mut self) -> Result<()> {
        self.step(true).await
    }

    pub async fn previous(&mut self) -> Result<()> {
        self.step(false).await
    }

    /// Set volume (clamped to 0.0 - 1.0) on both backends
    pub async fn set_volume(&mut self, volume: f32) {
        let Some(volume) = clamp_volume(volume) else {
            return;
        };

        self.state.volume = volume;
        self.local.set_volume(volume);
        self.remote.set_volume(volume).await;
        self.publish();
    }

    // ===== Events =====

    /// Apply one backend event
    pub async fn handle_event(&mut self, event: BackendEvent) {
        if event.kind.is_lifecycle() {
            self.handle_lifecycle(event.kind).await;
            self.publish();
            return;
        }

        if !self.accepts(&event) {
            trace!(
                source = ?event.source,
                generation = event.generation,
                current = self.generation,
                "Discarding stale backend event"
            );
            return;
        }

        match event.kind {
            BackendEventKind::RemoteState(snapshot) => self.apply_remote_snapshot(snapshot),
            BackendEventKind::TimeUpdate { position_secs } => {
                if position_secs.is_finite() {
                    self.state.position = position_secs.max(0.0);
                }
            }
            BackendEventKind::MetadataLoaded { duration_secs } => {
                if duration_secs.is_finite() && duration_secs > 0.0 {
                    self.state.duration = duration_secs;
                }
            }
            BackendEventKind::PlayStateChanged { playing } => self.state.is_playing = playing,
            BackendEventKind::Ended => {
                debug!("Clip ended, advancing");
                self.state.is_playing = false;
                if self.queue.advance().is_some() {
                    // The error, if any, is recorded in the state.
                    let _ = self.start_current(true).await;
                    return;
                }
            }
            BackendEventKind::SourceError { message } => {
                warn!(error = %message, "Preview clip failed");
                self.state.is_playing = false;
                self.state.last_error = Some(PlaybackError::SourceFailed(message));
            }
            _ => {}
        }

        self.publish();
    }

    fn accepts(&self, event: &BackendEvent) -> bool {
        event.generation != DISARMED
            && event.generation == self.generation
            && self.state.active_backend.kind() == Some(event.source)
    }

    async fn handle_lifecycle(&mut self, kind: BackendEventKind) {
        match kind {
            BackendEventKind::Ready { device_id } => self.remote.on_ready(device_id),
            BackendEventKind::NotReady { device_id } => self.remote.on_not_ready(&device_id),
            BackendEventKind::InitializationFailed { message } => {
                self.remote_failed(message).await;
            }
            BackendEventKind::AuthenticationFailed { message } => {
                self.remote_failed(message).await;
                self.state.last_error = Some(PlaybackError::AuthExpired);
            }
            BackendEventKind::AccountError { message } => {
                self.remote_failed(message).await;
                self.state.premium = false;
            }
            BackendEventKind::PlaybackError { message } => {
                warn!(error = %message, "Remote player reported a playback error");
            }
            _ => {}
        }
    }

    async fn remote_failed(&mut self, reason: String) {
        if self.state.active_backend.kind() == Some(BackendKind::Remote) {
            self.stop_active().await;
        }
        self.remote.on_failure(reason);
    }

    fn apply_remote_snapshot(&mut self, snapshot: Option<RemoteSnapshot>) {
        let Some(snapshot) = snapshot else {
            return;
        };

        self.state.position = snapshot.position_ms as f64 / 1000.0;
        if snapshot.duration_ms > 0 {
            self.state.duration = snapshot.duration_ms as f64 / 1000.0;
        }
        if !self.user_action_locked() {
            self.state.is_playing = !snapshot.paused;
        }

        let Some(track_id) = snapshot.track_id else {
            return;
        };
        match self.queue.position_of(&track_id) {
            Some(index) => {
                if self.queue.current_index() != Some(index) {
                    debug!(index, track_id = %track_id, "Reconciling queue index from remote");
                    self.queue.set_index(index);
                }
                self.refresh_current();
            }
            None => {
                if let Some(track) = snapshot.track {
                    self.state.current_track = Some(track);
                }
            }
        }
    }

    // ===== Internals =====

    async fn step(&mut self, forward: bool) -> Result<()> {
        if self.queue.current().is_none() {
            return Ok(());
        }

        if let ActiveBackend::Remote { .. } = self.state.active_backend {
            let call = if forward {
                RemoteControl::Next
            } else {
                RemoteControl::Previous
            };
            let result = self.remote_control(call).await;

            if result.is_ok() {
                if forward {
                    self.queue.advance();
                } else {
                    self.queue.retreat();
                }
                self.refresh_current();
                self.state.position = 0.0;
                self.state.duration = self
                    .queue
                    .current()
                    .map(|t| self.config.duration_secs_of(t))
                    .unwrap_or_default();
            }
            return self.finish(result);
        }

        let was_playing = self.state.is_playing;
        if forward {
            self.queue.advance();
        } else {
            self.queue.retreat();
        }
        self.start_current(was_playing).await
    }

    /// Load the queue's current track, playing it if `autoplay`
    async fn start_current(&mut self, autoplay: bool) -> Result<()> {
        let Some(track) = self.queue.current().cloned() else {
            return Ok(());
        };

        self.refresh_current();
        self.state.is_loading = true;
        self.state.position = 0.0;
        self.state.duration = self.config.duration_secs_of(&track);
        self.publish();

        let result = self.start_track(&track, autoplay).await;

        self.state.is_loading = false;
        match &result {
            Ok(()) => {}
            Err(err) => {
                warn!(track_id = %track.id, error = %err, "Could not start track");
                self.state.last_error = Some(err.clone());
            }
        }
        self.publish();
        result
    }

    async fn start_track(&mut self, track: &Track, autoplay: bool) -> Result<()> {
        let choice = select_backend(track, self.state.premium, self.remote.status());
        debug!(track_id = %track.id, choice = ?choice, autoplay, "Selected backend");

        match choice {
            BackendChoice::Remote { .. } | BackendChoice::DeviceStarting if !autoplay => {
                self.stop_active().await;
                Ok(())
            }
            BackendChoice::Remote { uri } => self.start_remote(track, uri, autoplay).await,
            BackendChoice::DeviceStarting => {
                self.stop_active().await;
                Err(PlaybackError::DeviceStarting)
            }
            BackendChoice::Local { preview_url } => {
                self.start_local(track, &preview_url, autoplay).await
            }
            BackendChoice::LookupPreview { track_id } => match lookup_preview(&self.api, &track_id).await {
                Some(preview_url) => self.start_local(track, &preview_url, autoplay).await,
                None => {
                    self.stop_active().await;
                    Err(PlaybackError::NoPlayableSource)
                }
            },
            BackendChoice::NoPlayableSource => {
                self.stop_active().await;
                Err(PlaybackError::NoPlayableSource)
            }
        }
    }

    async fn start_remote(&mut self, track: &Track, uri: String, autoplay: bool) -> Result<()> {
        let request = self.start_request(uri);
        self.activate(BackendKind::Remote).await;

        let mut step = FallbackStep::TryingRemote;
        loop {
            let outcome = match step {
                FallbackStep::TryingRemote => self.try_remote_start(&request).await,
                FallbackStep::TransferRetry => self.transfer_and_start(&request).await,
                FallbackStep::DeviceListRetry => self.start_on_best_device(&request).await,
                FallbackStep::FallbackLocal => return self.fall_back_to_local(track, autoplay).await,
                FallbackStep::Done => {
                    self.remote_started(track);
                    return Ok(());
                }
                FallbackStep::Failed(err) => {
                    self.stop_active().await;
                    return Err(err);
                }
            };

            if let Err(err) = &outcome {
                debug!(step = ?step, error = %err, "Remote start step failed");
            }
            step = step.advance(outcome);
        }
    }

    fn start_request(&self, uri: String) -> StartRequest {
        let uris: Vec<String> = self
            .queue
            .tracks()
            .iter()
            .filter_map(Track::playable_uri)
            .collect();

        if uris.len() <= 1 {
            return StartRequest {
                uris: vec![uri],
                offset: None,
                position_ms: 0,
            };
        }

        let offset = self
            .queue
            .current_index()
            .map(|index| {
                self.queue.tracks()[..index]
                    .iter()
                    .filter(|t| t.playable_uri().is_some())
                    .count()
            })
            .unwrap_or(0);

        StartRequest {
            uris,
            offset: Some(offset),
            position_ms: 0,
        }
    }

    /// Run a transport call; on `NoActiveDevice` transfer and retry once
    async fn remote_control(&mut self, call: RemoteControl) -> Result<()> {
        match self.remote.control(call).await {
            Err(PlaybackError::NoActiveDevice) => {
                debug!(call = ?call, "Device not active, transferring before retry");
                self.remote.reclaim().await?;
                self.remote.control(call).await
            }
            result => result,
        }
    }

    async fn try_remote_start(&mut self, request: &StartRequest) -> Result<()> {
        if !self.remote.is_active() {
            self.remote.transfer(false).await?;
        }
        self.remote.start(request).await
    }

    async fn transfer_and_start(&mut self, request: &StartRequest) -> Result<()> {
        self.remote.transfer(false).await?;
        self.remote.start(request).await
    }

    async fn start_on_best_device(&mut self, request: &StartRequest) -> Result<()> {
        let devices = self.api.devices().await?;
        let best = pick_best_device(&devices, self.remote.own_device_id())
            .map(str::to_string)
            .ok_or(PlaybackError::NoActiveDevice)?;

        info!(device_id = %best, "Retrying on listed device");
        self.remote.transfer_to(&best, true).await?;
        self.remote.start(request).await
    }

    async fn fall_back_to_local(&mut self, track: &Track, autoplay: bool) -> Result<()> {
        let preview = match track.preview_url.clone().filter(|u| !u.is_empty()) {
            Some(url) => Some(url),
            None => lookup_preview(&self.api, &track.id).await,
        };

        let Some(preview_url) = preview else {
            self.stop_active().await;
            return Err(PlaybackError::NoPlayableSource);
        };

        info!(track_id = %track.id, "No remote device available, playing preview");
        self.start_local(track, &preview_url, autoplay).await?;
        self.state.last_error = Some(PlaybackError::NoActiveDevice);
        Ok(())
    }

    fn remote_started(&mut self, track: &Track) {
        if let Some(device_id) = self.remote.status().device_id() {
            self.state.active_backend = ActiveBackend::Remote {
                device_id: device_id.to_string(),
            };
        }
        self.lock_user_action();
        self.state.is_playing = true;
        self.state.position = 0.0;
        self.state.duration = self.config.duration_secs_of(track);
    }

    async fn start_local(&mut self, track: &Track, preview_url: &str, autoplay: bool) -> Result<()> {
        self.activate(BackendKind::Local).await;
        self.local.load(preview_url);
        self.local.set_volume(self.state.volume);
        self.state.position = 0.0;
        self.state.duration = self.config.duration_secs_of(track);

        if !autoplay {
            return Ok(());
        }

        match self.local.play().await {
            Ok(()) => {
                self.state.is_playing = true;
                Ok(())
            }
            Err(err) => {
                self.state.is_playing = false;
                Err(err)
            }
        }
    }

    /// Stop the current backend and make `target` the active one under a
    /// fresh generation
    async fn activate(&mut self, target: BackendKind) {
        self.stop_active().await;
        self.generation += 1;

        match target {
            BackendKind::Remote => {
                self.remote.activate(self.generation);
                self.state.active_backend = ActiveBackend::Remote {
                    device_id: self
                        .remote
                        .status()
                        .device_id()
                        .unwrap_or_default()
                        .to_string(),
                };
            }
            BackendKind::Local => {
                self.local.activate(self.generation);
                self.state.active_backend = ActiveBackend::Local;
            }
        }
    }

    async fn stop_active(&mut self) {
        match std::mem::take(&mut self.state.active_backend) {
            ActiveBackend::Remote { .. } => {
                if self.state.is_playing {
                    if let Err(err) = self.remote.control(RemoteControl::Pause).await {
                        debug!(error = %err, "Pausing remote on switch failed");
                    }
                }
                self.remote.deactivate();
            }
            ActiveBackend::Local => self.local.deactivate(),
            ActiveBackend::None => {}
        }
        self.state.is_playing = false;
    }

    fn lock_user_action(&mut self) {
        self.user_action_until = Some(Instant::now() + self.config.user_action_lock);
    }

    fn user_action_locked(&self) -> bool {
        self.user_action_until
            .is_some_and(|until| Instant::now() < until)
    }

    fn refresh_current(&mut self) {
        self.state.current_track = self.queue.current().cloned();
    }

    fn finish(&mut self, result: Result<()>) -> Result<()> {
        match &result {
            Ok(()) => self.state.last_error = None,
            Err(err) => self.state.last_error = Some(err.clone()),
        }
        self.publish();
        result
    }

    fn publish(&mut self) {
        self.state.queue_index = self.queue.current_index();
        self.state.queue_len = self.queue.len();
        self.state.remote_status = self.remote.status().clone();
        self.state_tx.send_replace(self.state.clone());
    }
}

/// Preview URL from track metadata; lookup failures count as no preview
async fn lookup_preview(api: &Arc<dyn RemotePlaybackApi>, track_id: &str) -> Option<String> {
    if track_id.is_empty() {
        return None;
    }
    match api.preview_url(track_id).await {
        Ok(url) => url.filter(|u| !u.is_empty()),
        Err(err) => {
            warn!(track_id = %track_id, error = %err, "Preview lookup failed");
            None
        }
    }
}

fn clamp_volume(volume: f32) -> Option<f32> {
    volume.is_finite().then(|| volume.clamp(0.0, 1.0))
}

fn clamp_position(position_secs: f64, duration_secs: f64) -> f64 {
    if !position_secs.is_finite() {
        return 0.0;
    }
    position_secs.clamp(0.0, duration_secs.max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volume_is_clamped() {
        assert_eq!(clamp_volume(1.5), Some(1.0));
        assert_eq!(clamp_volume(-0.2), Some(0.0));
        assert_eq!(clamp_volume(0.4), Some(0.4));
        assert_eq!(clamp_volume(f32::NAN), None);
    }

    #[test]
    fn position_is_clamped_into_track() {
        assert_eq!(clamp_position(45.0, 30.0), 30.0);
        assert_eq!(clamp_position(-3.0, 30.0), 0.0);
        assert_eq!(clamp_position(f64::INFINITY, 30.0), 0.0);
        assert_eq!(clamp_position(12.5, 30.0), 12.5);
        assert_eq!(clamp_position(5.0, 0.0), 0.0);
    }
}
