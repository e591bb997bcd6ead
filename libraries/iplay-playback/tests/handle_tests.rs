//! Orchestrator task driven through its handle

mod common;

use common::*;
use iplay_playback::{spawn, BackendEventKind, PlaybackError, RemoteStatus};
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(2);

fn assert_send<T: Send>(_: T) {}

#[test]
fn orchestrator_futures_can_cross_threads() {
    let mut h = harness();
    assert_send(h.orchestrator.play_track(track("a"), None));
    assert_send(h.orchestrator.set_queue_and_play(tracks(&["a", "b"]), 0));
    assert_send(h.orchestrator.next());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn runs_on_multi_threaded_runtime() {
    let h = harness();
    h.api.add_preview("x", "https://p.test/x.mp3");
    let (player, task) = spawn(h.orchestrator);

    player
        .play_track(iplay_playback::Track::new("x", "Song", "Artist"), None)
        .await
        .unwrap();
    assert_eq!(h.element.loaded().as_deref(), Some("https://p.test/x.mp3"));

    player.shutdown().await.unwrap();
    tokio::time::timeout(WAIT, task).await.unwrap().unwrap();
}

#[tokio::test]
async fn second_load_while_first_in_flight_is_busy() {
    let h = harness();
    let (player, _task) = spawn(h.orchestrator);

    let (first, second) = tokio::join!(
        player.play_track(track("a"), None),
        player.play_track(track("b"), None)
    );

    assert_eq!(first, Ok(()));
    assert_eq!(second, Err(PlaybackError::Busy));
    assert!(!player.is_loading());
    assert_eq!(
        player.state().current_track.map(|t| t.id),
        Some("a".to_string())
    );
}

#[tokio::test]
async fn loads_are_accepted_again_after_completion() {
    let h = harness();
    let (player, _task) = spawn(h.orchestrator);

    player.play_track(track("a"), None).await.unwrap();
    player
        .set_queue_and_play(tracks(&["b", "c"]), 1)
        .await
        .unwrap();

    let state = player.state();
    assert_eq!(state.queue_len, 2);
    assert_eq!(state.queue_index, Some(1));
}

#[tokio::test]
async fn commands_are_applied_in_order() {
    let h = harness();
    let element = h.element.clone();
    let (player, _task) = spawn(h.orchestrator);

    player
        .set_queue_and_play(tracks(&["a", "b", "c"]), 0)
        .await
        .unwrap();
    player.next().await.unwrap();
    player.set_volume(0.3).await.unwrap();
    player.toggle_play().await.unwrap();

    let state = player.state();
    assert_eq!(state.queue_index, Some(1));
    assert_eq!(state.volume, 0.3);
    assert!(!state.is_playing);
    assert_eq!(element.volume(), Some(0.3));
}

#[tokio::test]
async fn backend_events_are_drained_by_the_task() {
    let h = harness();
    let element = h.element.clone();
    let (player, _task) = spawn(h.orchestrator);
    player
        .set_queue_and_play(tracks(&["a", "b"]), 0)
        .await
        .unwrap();

    element.emit(BackendEventKind::Ended);

    let mut updates = player.subscribe();
    tokio::time::timeout(WAIT, updates.wait_for(|s| s.queue_index == Some(1)))
        .await
        .expect("timed out waiting for advance")
        .unwrap();
    assert_eq!(element.loaded().as_deref(), Some("https://p.test/b.mp3"));
}

#[tokio::test]
async fn initialize_brings_remote_up() {
    let h = harness();
    h.api.set_premium(Ok(true));
    h.sdk.ready_on_connect(OWN_DEVICE);
    let (player, _task) = spawn(h.orchestrator);

    player.initialize().await.unwrap();

    let mut updates = player.subscribe();
    tokio::time::timeout(WAIT, updates.wait_for(|s| s.remote_status.is_usable()))
        .await
        .expect("timed out waiting for remote")
        .unwrap();
    assert!(player.state().premium);
    assert_eq!(
        player.state().remote_status,
        RemoteStatus::Ready {
            device_id: OWN_DEVICE.into()
        }
    );
}

#[tokio::test]
async fn errors_are_returned_and_clearable() {
    let h = harness();
    let (player, _task) = spawn(h.orchestrator);

    let result = player
        .play_track(iplay_playback::Track::new("x", "Song", "Artist"), None)
        .await;
    assert_eq!(result, Err(PlaybackError::NoPlayableSource));
    assert!(!player.is_loading());

    player.clear_error().await.unwrap();
    player.pause().await.unwrap();
    assert_eq!(player.state().last_error, None);
}

#[tokio::test]
async fn shutdown_tears_down_and_closes() {
    let h = harness();
    h.api.set_premium(Ok(true));
    h.sdk.ready_on_connect(OWN_DEVICE);
    let sdk = h.sdk.clone();
    let (player, task) = spawn(h.orchestrator);
    player.initialize().await.unwrap();

    player.shutdown().await.unwrap();
    tokio::time::timeout(WAIT, task)
        .await
        .expect("task did not stop")
        .unwrap();

    assert_eq!(sdk.disconnects(), 1);
    assert_eq!(player.play().await, Err(PlaybackError::Closed));
    assert_eq!(
        player.play_track(track("a"), None).await,
        Err(PlaybackError::Closed)
    );
    assert!(!player.is_loading());
}
