//! iPlay - Playback Orchestration
//!
//! Session-level playback for a streaming client that can play a track in
//! two ways: full length on a remote device player, or as a short preview
//! clip on a local audio element.
//!
//! This crate provides:
//! - Queue with circular next/previous and a cursor that is never out of range
//! - Backend selection from entitlement, remote status and track capability
//! - Remote start fallback chain (transfer, device list, preview clip)
//! - One observable [`SessionPlaybackState`] fed by both backends
//! - Stale event suppression across backend switches
//! - A command/event task with a cloneable [`OrchestratorHandle`]
//!
//! # Architecture
//!
//! `iplay-playback` does no I/O of its own. Platform code supplies:
//! - [`RemotePlaybackApi`]: upstream playback-control HTTP calls
//! - [`PlayerSdk`]: the vendor full-track player
//! - [`AudioElement`]: something that can play a preview URL
//!
//! # Example
//!
//! ```rust,ignore
//! use iplay_playback::{spawn, PlaybackConfig, PlaybackOrchestrator, Track};
//!
//! let orchestrator = PlaybackOrchestrator::new(
//!     PlaybackConfig::default(),
//!     api,      // Arc<dyn RemotePlaybackApi>
//!     sdk,      // Arc<dyn PlayerSdk>
//!     element,  // Box<dyn AudioElement>
//!     tokens,   // Arc<dyn AccessTokenProvider>
//! );
//! let (player, _task) = spawn(orchestrator);
//!
//! player.initialize().await?;
//! player
//!     .play_track(Track::new("4uLU6hMCjMI75M1A2tKUQC", "Song", "Artist"), None)
//!     .await?;
//!
//! let mut updates = player.subscribe();
//! while updates.changed().await.is_ok() {
//!     let state = updates.borrow().clone();
//!     println!("{:?} playing={}", state.current_track, state.is_playing);
//! }
//! ```

pub mod backend;
mod error;
pub mod events;
pub mod fallback;
mod handle;
mod orchestrator;
mod queue;
pub mod selection;
pub mod types;

// Public exports
pub use backend::{
    AudioElement, LocalClipBackend, PlayerSdk, RemoteControl, RemoteDeviceBackend,
    RemotePlaybackApi,
};
pub use error::{PlaybackError, Result};
pub use events::{BackendEvent, BackendEventKind, EventSink};
pub use fallback::{pick_best_device, FallbackStep};
pub use handle::{spawn, OrchestratorHandle, PlayerCommand};
pub use orchestrator::PlaybackOrchestrator;
pub use queue::Queue;
pub use selection::{select_backend, BackendChoice};
pub use types::{
    ActiveBackend, BackendKind, DeviceInfo, PlaybackConfig, RemoteSnapshot, RemoteStatus,
    SessionPlaybackState, StartRequest, Track,
};
