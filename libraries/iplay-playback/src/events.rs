//! Backend events
//!
//! Both backends report asynchronously (SDK callbacks, audio element
//! events, the remote poll task). Everything arrives as a [`BackendEvent`]
//! on one channel drained by the orchestrator:
//! - Lifecycle events (remote device ready, lost, failed) always apply
//! - State events (position, play/pause, ended) apply only when they carry
//!   the generation of the currently active backend

use crate::types::{BackendKind, RemoteSnapshot};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

/// Generation value of a disarmed sink. Never matches an activation.
pub const DISARMED: u64 = 0;

/// What happened
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BackendEventKind {
    /// Remote player registered its device
    Ready { device_id: String },

    /// Remote device went offline
    NotReady { device_id: String },

    /// Remote player could not start
    InitializationFailed { message: String },

    /// Remote player rejected our token
    AuthenticationFailed { message: String },

    /// Account is not entitled to the remote player
    AccountError { message: String },

    /// Remote player reported a non-fatal playback problem
    PlaybackError { message: String },

    /// Remote player state (pushed or polled)
    RemoteState(Option<RemoteSnapshot>),

    /// Clip position changed
    TimeUpdate { position_secs: f64 },

    /// Clip duration became known
    MetadataLoaded { duration_secs: f64 },

    /// Clip started or stopped
    PlayStateChanged { playing: bool },

    /// Clip reached its end
    Ended,

    /// Clip element failed
    SourceError { message: String },
}

impl BackendEventKind {
    /// Lifecycle events are never discarded as stale
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            BackendEventKind::Ready { .. }
                | BackendEventKind::NotReady { .. }
                | BackendEventKind::InitializationFailed { .. }
                | BackendEventKind::AuthenticationFailed { .. }
                | BackendEventKind::AccountError { .. }
                | BackendEventKind::PlaybackError { .. }
        )
    }
}

/// Event tagged with its origin
#[derive(Debug, Clone, PartialEq)]
pub struct BackendEvent {
    pub source: BackendKind,

    /// Activation generation at emission time
    pub generation: u64,

    pub kind: BackendEventKind,
}

/// Handle a backend uses to report events
///
/// Each emitted event is stamped with the sink's generation at the moment
/// of emission. The orchestrator arms the sink when the backend becomes
/// active and disarms it when it stops, so anything emitted by a backend
/// that has since been replaced is recognizable as stale.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: UnboundedSender<BackendEvent>,
    source: BackendKind,
    generation: Arc<AtomicU64>,
}

impl EventSink {
    pub fn new(tx: UnboundedSender<BackendEvent>, source: BackendKind) -> Self {
        Self {
            tx,
            source,
            generation: Arc::new(AtomicU64::new(DISARMED)),
        }
    }

    pub fn source(&self) -> BackendKind {
        self.source
    }

    /// Send an event. Returns `false` once the orchestrator is gone.
    pub fn emit(&self, kind: BackendEventKind) -> bool {
        self.tx
            .send(BackendEvent {
                source: self.source,
                generation: self.generation(),
                kind,
            })
            .is_ok()
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub(crate) fn arm(&self, generation: u64) {
        self.generation.store(generation, Ordering::SeqCst);
    }

    pub(crate) fn disarm(&self) {
        self.generation.store(DISARMED, Ordering::SeqCst);
    }
}
