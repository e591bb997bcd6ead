//! Orchestrator task and its command handle
//!
//! The orchestrator runs on its own task. Callers talk to it through an
//! [`OrchestratorHandle`] that sends [`PlayerCommand`]s and awaits a reply;
//! backend events are drained by the same task between commands.

use crate::error::{PlaybackError, Result};
use crate::events::BackendEvent;
use crate::orchestrator::PlaybackOrchestrator;
use crate::types::{SessionPlaybackState, Track};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

type Reply = oneshot::Sender<Result<()>>;

/// Commands accepted by the orchestrator task
#[derive(Debug)]
pub enum PlayerCommand {
    /// Start or resume playback
    Play(Reply),

    /// Pause playback
    Pause(Reply),

    /// Toggle play/pause
    TogglePlay(Reply),

    /// Seek to position (in seconds)
    Seek(f64, Reply),

    /// Skip to next track
    Next(Reply),

    /// Go to previous track
    Previous(Reply),

    /// Set volume (0.0 - 1.0)
    SetVolume(f32),

    /// Play a track with optional queue context
    PlayTrack {
        track: Track,
        context: Option<Vec<Track>>,
        reply: Reply,
    },

    /// Replace queue and play from index
    SetQueueAndPlay {
        tracks: Vec<Track>,
        start_index: usize,
        reply: Reply,
    },

    /// Look up entitlement and start the remote player
    Initialize(oneshot::Sender<()>),

    /// Retry a failed remote player
    RetryRemote,

    /// Override premium entitlement
    SetEntitlement(bool),

    /// Clear last error
    ClearError,

    /// Tear down and stop the task
    Shutdown,
}

/// Cloneable handle to a running orchestrator
#[derive(Clone)]
pub struct OrchestratorHandle {
    commands: mpsc::Sender<PlayerCommand>,
    state: watch::Receiver<SessionPlaybackState>,
    loading: Arc<AtomicBool>,
}

/// Run `orchestrator` on a new task
pub fn spawn(mut orchestrator: PlaybackOrchestrator) -> (OrchestratorHandle, JoinHandle<()>) {
    let (commands_tx, commands_rx) = mpsc::channel(32);
    let state = orchestrator.subscribe();
    let loading = Arc::new(AtomicBool::new(false));
    let events = orchestrator.take_event_receiver();

    let task = tokio::spawn(run(
        orchestrator,
        commands_rx,
        events,
        Arc::clone(&loading),
    ));

    (
        OrchestratorHandle {
            commands: commands_tx,
            state,
            loading,
        },
        task,
    )
}

async fn run(
    mut orchestrator: PlaybackOrchestrator,
    mut commands: mpsc::Receiver<PlayerCommand>,
    events: Option<mpsc::UnboundedReceiver<BackendEvent>>,
    loading: Arc<AtomicBool>,
) {
    // Without a receiver (already taken) only commands are served.
    let (_placeholder_tx, placeholder_rx) = mpsc::unbounded_channel();
    let mut events = events.unwrap_or(placeholder_rx);

    info!("Playback task started");
    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(PlayerCommand::Shutdown) | None => break,
                Some(command) => dispatch(&mut orchestrator, command, &loading).await,
            },
            Some(event) = events.recv() => orchestrator.handle_event(event).await,
        }
    }

    orchestrator.teardown().await;
    info!("Playback task stopped");
}

async fn dispatch(orchestrator: &mut PlaybackOrchestrator, command: PlayerCommand, loading: &AtomicBool) {
    debug!(command = ?command, "Handling player command");

    match command {
        PlayerCommand::Play(reply) => {
            let _ = reply.send(orchestrator.play().await);
        }
        PlayerCommand::Pause(reply) => {
            let _ = reply.send(orchestrator.pause().await);
        }
        PlayerCommand::TogglePlay(reply) => {
            let _ = reply.send(orchestrator.toggle_play().await);
        }
        PlayerCommand::Seek(position, reply) => {
            let _ = reply.send(orchestrator.seek(position).await);
        }
        PlayerCommand::Next(reply) => {
            let _ = reply.send(orchestrator.next().await);
        }
        PlayerCommand::Previous(reply) => {
            let _ = reply.send(orchestrator.previous().await);
        }
        PlayerCommand::SetVolume(volume) => orchestrator.set_volume(volume).await,
        PlayerCommand::PlayTrack {
            track,
            context,
            reply,
        } => {
            let result = orchestrator.play_track(track, context).await;
            loading.store(false, Ordering::SeqCst);
            let _ = reply.send(result);
        }
        PlayerCommand::SetQueueAndPlay {
            tracks,
            start_index,
            reply,
        } => {
            let result = orchestrator.set_queue_and_play(tracks, start_index).await;
            loading.store(false, Ordering::SeqCst);
            let _ = reply.send(result);
        }
        PlayerCommand::Initialize(done) => {
            orchestrator.initialize().await;
            let _ = done.send(());
        }
        PlayerCommand::RetryRemote => orchestrator.retry_remote().await,
        PlayerCommand::SetEntitlement(premium) => orchestrator.set_entitlement(premium),
        PlayerCommand::ClearError => orchestrator.clear_error(),
        PlayerCommand::Shutdown => {}
    }
}

impl OrchestratorHandle {
    /// Latest published state
    pub fn state(&self) -> SessionPlaybackState {
        self.state.borrow().clone()
    }

    /// Watch state changes
    pub fn subscribe(&self) -> watch::Receiver<SessionPlaybackState> {
        self.state.clone()
    }

    /// Whether a play sequence is in flight
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    pub async fn initialize(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(PlayerCommand::Initialize(tx)).await?;
        rx.await.map_err(|_| PlaybackError::Closed)
    }

    pub async fn play(&self) -> Result<()> {
        self.request(PlayerCommand::Play).await
    }

    pub async fn pause(&self) -> Result<()> {
        self.request(PlayerCommand::Pause).await
    }

    pub async fn toggle_play(&self) -> Result<()> {
        self.request(PlayerCommand::TogglePlay).await
    }

    pub async fn seek(&self, position_secs: f64) -> Result<()> {
        self.request(|reply| PlayerCommand::Seek(position_secs, reply))
            .await
    }

    pub async fn next(&self) -> Result<()> {
        self.request(PlayerCommand::Next).await
    }

    pub async fn previous(&self) -> Result<()> {
        self.request(PlayerCommand::Previous).await
    }

    pub async fn set_volume(&self, volume: f32) -> Result<()> {
        self.send(PlayerCommand::SetVolume(volume)).await
    }

    /// Play a track; rejected with `Busy` while another load is running
    pub async fn play_track(&self, track: Track, context: Option<Vec<Track>>) -> Result<()> {
        self.begin_loading()?;
        self.request_loading(|reply| PlayerCommand::PlayTrack {
            track,
            context,
            reply,
        })
        .await
    }

    /// Replace the queue; rejected with `Busy` while another load is running
    pub async fn set_queue_and_play(&self, tracks: Vec<Track>, start_index: usize) -> Result<()> {
        self.begin_loading()?;
        self.request_loading(|reply| PlayerCommand::SetQueueAndPlay {
            tracks,
            start_index,
            reply,
        })
        .await
    }

    pub async fn retry_remote(&self) -> Result<()> {
        self.send(PlayerCommand::RetryRemote).await
    }

    pub async fn set_entitlement(&self, premium: bool) -> Result<()> {
        self.send(PlayerCommand::SetEntitlement(premium)).await
    }

    pub async fn clear_error(&self) -> Result<()> {
        self.send(PlayerCommand::ClearError).await
    }

    /// Stop the task after tearing the session down
    pub async fn shutdown(&self) -> Result<()> {
        self.send(PlayerCommand::Shutdown).await
    }

    fn begin_loading(&self) -> Result<()> {
        self.loading
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(|_| PlaybackError::Busy)
    }

    async fn request_loading<F>(&self, make: F) -> Result<()>
    where
        F: FnOnce(Reply) -> PlayerCommand,
    {
        let (tx, rx) = oneshot::channel();
        if let Err(err) = self.send(make(tx)).await {
            self.loading.store(false, Ordering::SeqCst);
            return Err(err);
        }
        rx.await.map_err(|_| PlaybackError::Closed)?
    }

    async fn request<F>(&self, make: F) -> Result<()>
    where
        F: FnOnce(Reply) -> PlayerCommand,
    {
        let (tx, rx) = oneshot::channel();
        self.send(make(tx)).await?;
        rx.await.map_err(|_| PlaybackError::Closed)?
    }

    async fn send(&self, command: PlayerCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| PlaybackError::Closed)
    }
}
