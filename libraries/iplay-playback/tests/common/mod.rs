//! Test doubles for the playback platform seams
#![allow(dead_code)]

use async_trait::async_trait;
use iplay_auth::AccessTokenProvider;
use iplay_playback::{
    AudioElement, BackendEventKind, DeviceInfo, EventSink, PlaybackConfig, PlaybackError,
    PlaybackOrchestrator, PlayerSdk, RemotePlaybackApi, RemoteSnapshot, Result, StartRequest,
    Track,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

pub const OWN_DEVICE: &str = "web-player";

// ===== Upstream API =====

#[derive(Default)]
pub struct FakeApi {
    calls: Mutex<Vec<String>>,
    start_results: Mutex<VecDeque<Result<()>>>,
    transfer_results: Mutex<VecDeque<Result<()>>>,
    control_results: Mutex<VecDeque<Result<()>>>,
    devices: Mutex<Vec<DeviceInfo>>,
    previews: Mutex<HashMap<String, String>>,
    premium: Mutex<Option<Result<bool>>>,
}

impl FakeApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn set_premium(&self, result: Result<bool>) {
        *self.premium.lock().unwrap() = Some(result);
    }

    pub fn push_start_result(&self, result: Result<()>) {
        self.start_results.lock().unwrap().push_back(result);
    }

    pub fn push_transfer_result(&self, result: Result<()>) {
        self.transfer_results.lock().unwrap().push_back(result);
    }

    pub fn push_control_result(&self, result: Result<()>) {
        self.control_results.lock().unwrap().push_back(result);
    }

    pub fn set_devices(&self, devices: Vec<DeviceInfo>) {
        *self.devices.lock().unwrap() = devices;
    }

    pub fn add_preview(&self, track_id: &str, url: &str) {
        self.previews
            .lock()
            .unwrap()
            .insert(track_id.to_string(), url.to_string());
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn next_result(queue: &Mutex<VecDeque<Result<()>>>) -> Result<()> {
        queue.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }
}

#[async_trait]
impl RemotePlaybackApi for FakeApi {
    async fn transfer(&self, device_id: &str, play: bool) -> Result<()> {
        self.record(format!("transfer:{}:{}", device_id, play));
        Self::next_result(&self.transfer_results)
    }

    async fn start(&self, device_id: &str, request: &StartRequest) -> Result<()> {
        self.record(format!(
            "start:{}:{}:{:?}",
            device_id,
            request.uris.join(","),
            request.offset
        ));
        Self::next_result(&self.start_results)
    }

    async fn resume(&self, device_id: &str) -> Result<()> {
        self.record(format!("resume:{}", device_id));
        Self::next_result(&self.control_results)
    }

    async fn pause(&self, device_id: &str) -> Result<()> {
        self.record(format!("pause:{}", device_id));
        Self::next_result(&self.control_results)
    }

    async fn seek(&self, device_id: &str, position_ms: u64) -> Result<()> {
        self.record(format!("seek:{}:{}", device_id, position_ms));
        Self::next_result(&self.control_results)
    }

    async fn next(&self, device_id: &str) -> Result<()> {
        self.record(format!("next:{}", device_id));
        Self::next_result(&self.control_results)
    }

    async fn previous(&self, device_id: &str) -> Result<()> {
        self.record(format!("previous:{}", device_id));
        Self::next_result(&self.control_results)
    }

    async fn devices(&self) -> Result<Vec<DeviceInfo>> {
        self.record("devices".to_string());
        Ok(self.devices.lock().unwrap().clone())
    }

    async fn preview_url(&self, track_id: &str) -> Result<Option<String>> {
        self.record(format!("preview:{}", track_id));
        Ok(self.previews.lock().unwrap().get(track_id).cloned())
    }

    async fn is_premium(&self) -> Result<bool> {
        self.premium.lock().unwrap().clone().unwrap_or(Ok(false))
    }
}

// ===== Vendor player =====

#[derive(Default)]
pub struct FakeSdk {
    sink: Mutex<Option<EventSink>>,
    connect_error: Mutex<Option<PlaybackError>>,
    auto_ready: Mutex<Option<String>>,
    state: Mutex<Option<RemoteSnapshot>>,
    volumes: Mutex<Vec<f32>>,
    connects: Mutex<usize>,
    disconnects: Mutex<usize>,
}

impl FakeSdk {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Emit `Ready` for `device_id` as soon as `connect` is called
    pub fn ready_on_connect(&self, device_id: &str) {
        *self.auto_ready.lock().unwrap() = Some(device_id.to_string());
    }

    pub fn fail_connect(&self, err: Option<PlaybackError>) {
        *self.connect_error.lock().unwrap() = err;
    }

    pub fn emit(&self, kind: BackendEventKind) -> bool {
        self.sink
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|sink| sink.emit(kind))
    }

    pub fn set_state(&self, snapshot: Option<RemoteSnapshot>) {
        *self.state.lock().unwrap() = snapshot;
    }

    pub fn volumes(&self) -> Vec<f32> {
        self.volumes.lock().unwrap().clone()
    }

    pub fn connects(&self) -> usize {
        *self.connects.lock().unwrap()
    }

    pub fn disconnects(&self) -> usize {
        *self.disconnects.lock().unwrap()
    }
}

#[async_trait]
impl PlayerSdk for FakeSdk {
    async fn connect(
        &self,
        _name: &str,
        _volume: f32,
        _tokens: Arc<dyn AccessTokenProvider>,
        sink: EventSink,
    ) -> Result<()> {
        *self.connects.lock().unwrap() += 1;
        if let Some(err) = self.connect_error.lock().unwrap().clone() {
            return Err(err);
        }
        if let Some(device_id) = self.auto_ready.lock().unwrap().clone() {
            sink.emit(BackendEventKind::Ready { device_id });
        }
        *self.sink.lock().unwrap() = Some(sink);
        Ok(())
    }

    async fn current_state(&self) -> Option<RemoteSnapshot> {
        self.state.lock().unwrap().clone()
    }

    async fn set_volume(&self, volume: f32) {
        self.volumes.lock().unwrap().push(volume);
    }

    async fn disconnect(&self) {
        *self.disconnects.lock().unwrap() += 1;
    }
}

// ===== Audio element =====

/// State shared between the boxed element and the test
#[derive(Default)]
pub struct ElementProbe {
    sink: Mutex<Option<EventSink>>,
    loaded: Mutex<Option<String>>,
    playing: Mutex<bool>,
    volume: Mutex<Option<f32>>,
    seeks: Mutex<Vec<f64>>,
    play_errors: Mutex<VecDeque<PlaybackError>>,
}

impl ElementProbe {
    pub fn loaded(&self) -> Option<String> {
        self.loaded.lock().unwrap().clone()
    }

    pub fn is_playing(&self) -> bool {
        *self.playing.lock().unwrap()
    }

    pub fn volume(&self) -> Option<f32> {
        *self.volume.lock().unwrap()
    }

    pub fn seeks(&self) -> Vec<f64> {
        self.seeks.lock().unwrap().clone()
    }

    pub fn fail_next_play(&self, err: PlaybackError) {
        self.play_errors.lock().unwrap().push_back(err);
    }

    /// Emit an element event through whatever sink the backend attached
    pub fn emit(&self, kind: BackendEventKind) -> bool {
        self.sink
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|sink| sink.emit(kind))
    }

    /// Clone of the attached sink, to emit after a backend switch
    pub fn sink(&self) -> Option<EventSink> {
        self.sink.lock().unwrap().clone()
    }
}

pub struct FakeElement {
    probe: Arc<ElementProbe>,
}

#[async_trait]
impl AudioElement for FakeElement {
    fn attach(&mut self, sink: EventSink) {
        *self.probe.sink.lock().unwrap() = Some(sink);
    }

    fn load(&mut self, url: &str) {
        *self.probe.loaded.lock().unwrap() = Some(url.to_string());
        *self.probe.playing.lock().unwrap() = false;
    }

    async fn play(&mut self) -> Result<()> {
        if let Some(err) = self.probe.play_errors.lock().unwrap().pop_front() {
            return Err(err);
        }
        *self.probe.playing.lock().unwrap() = true;
        Ok(())
    }

    fn pause(&mut self) {
        *self.probe.playing.lock().unwrap() = false;
    }

    fn seek(&mut self, position_secs: f64) {
        self.probe.seeks.lock().unwrap().push(position_secs);
    }

    fn set_volume(&mut self, volume: f32) {
        *self.probe.volume.lock().unwrap() = Some(volume);
    }

    fn unload(&mut self) {
        *self.probe.loaded.lock().unwrap() = None;
    }
}

// ===== Tokens =====

pub struct StaticTokens;

#[async_trait]
impl AccessTokenProvider for StaticTokens {
    async fn access_token(&self) -> iplay_auth::Result<String> {
        Ok("test-token".to_string())
    }
}

// ===== Fixtures =====

pub struct Harness {
    pub orchestrator: PlaybackOrchestrator,
    pub api: Arc<FakeApi>,
    pub sdk: Arc<FakeSdk>,
    pub element: Arc<ElementProbe>,
}

pub fn harness() -> Harness {
    let api = FakeApi::new();
    let sdk = FakeSdk::new();
    let element = Arc::new(ElementProbe::default());

    let orchestrator = PlaybackOrchestrator::new(
        PlaybackConfig::default(),
        api.clone(),
        sdk.clone(),
        Box::new(FakeElement {
            probe: Arc::clone(&element),
        }),
        Arc::new(StaticTokens),
    );

    Harness {
        orchestrator,
        api,
        sdk,
        element,
    }
}

/// Harness with an entitled account and a ready remote player
pub async fn premium_harness() -> Harness {
    let mut h = harness();
    h.api.set_premium(Ok(true));
    h.sdk.ready_on_connect(OWN_DEVICE);
    h.orchestrator.initialize().await;
    h.orchestrator.drain_events().await;
    h
}

pub fn track(id: &str) -> Track {
    Track::new(id, format!("Title {}", id), "Artist")
        .with_duration_ms(180_000)
        .with_preview(format!("https://p.test/{}.mp3", id))
}

pub fn tracks(ids: &[&str]) -> Vec<Track> {
    ids.iter().map(|id| track(id)).collect()
}

pub fn device(id: &str, active: bool) -> DeviceInfo {
    DeviceInfo {
        id: Some(id.to_string()),
        name: id.to_string(),
        is_active: active,
    }
}

pub fn snapshot(track_id: &str, paused: bool, position_ms: u64) -> RemoteSnapshot {
    RemoteSnapshot {
        track_id: Some(track_id.to_string()),
        track: None,
        paused,
        position_ms,
        duration_ms: 180_000,
    }
}
