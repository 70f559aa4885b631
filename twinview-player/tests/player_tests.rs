//! Paired player operation tests
//!
//! **Test Coverage:**
//! - Seek clamping against known and unknown durations
//! - Load failure leaves the player unloaded
//! - Failed commands leave observable state untouched
//! - Events published per operation

use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use twinview_common::PlaybackState;
use twinview_common::PlayerEvent;
use twinview_player::config::Config;
use twinview_player::playback::{
    HandleCall, LoadOptions, MediaSource, PairedPlayer, PlaybackHandle, SimulatedPair,
};
use twinview_player::Error;

fn manual_config() -> Config {
    let mut config = Config::default();
    config.player.auto_play_on_load = false;
    config
}

fn new_player(duration_ms: u64) -> (Arc<SimulatedPair>, PairedPlayer<SimulatedPair>) {
    let pair = Arc::new(SimulatedPair::new(duration_ms));
    let player = PairedPlayer::new(Arc::clone(&pair), manual_config()).unwrap();
    (pair, player)
}

#[tokio::test(start_paused = true)]
async fn test_set_position_clamps_to_media_bounds() {
    let (pair, player) = new_player(5000);
    player.load(MediaSource::new("clip.mp4"), LoadOptions::default()).await.unwrap();
    pair.clear_calls();

    player.set_position(-100).await.unwrap();
    assert_eq!(pair.calls(), vec![HandleCall::SetPosition(0)]);
    assert_eq!(player.current_position_ms().await, 0);
    assert_eq!(pair.peek().primary.position_ms, 0);

    pair.clear_calls();
    player.set_position(6000).await.unwrap();
    assert_eq!(pair.calls(), vec![HandleCall::SetPosition(5000)]);
    assert_eq!(player.current_position_ms().await, 5000);
    assert_eq!(pair.peek().secondary.position_ms, 5000);
}

#[tokio::test(start_paused = true)]
async fn test_set_position_refreshes_unknown_duration() {
    let (pair, player) = new_player(5000);
    pair.set_duration_known(false);
    player.load(MediaSource::new("clip.mp4"), LoadOptions::default()).await.unwrap();
    assert_eq!(player.duration_ms().await, 0);

    // Still unknown: only the lower bound applies
    pair.clear_calls();
    player.set_position(6000).await.unwrap();
    assert!(pair.calls().contains(&HandleCall::SetPosition(6000)));

    // Metadata arrived since load
    pair.set_duration_known(true);
    pair.clear_calls();
    player.set_position(6000).await.unwrap();
    assert_eq!(
        pair.calls(),
        vec![HandleCall::GetStatus, HandleCall::SetPosition(5000)]
    );
    assert_eq!(player.duration_ms().await, 5000);
}

#[tokio::test(start_paused = true)]
async fn test_failed_load_leaves_player_unloaded() {
    let pair = Arc::new(SimulatedPair::new(5000));
    let player = PairedPlayer::new(Arc::clone(&pair), Config::default()).unwrap();
    pair.fail_load(true);

    let result = player.load(MediaSource::new("broken.avi"), LoadOptions::default()).await;
    assert!(matches!(result, Err(Error::Load(_))));
    assert!(!player.is_loaded().await);
    assert!(!player.is_playing().await);
    assert!(!player.is_syncing().await);

    pair.clear_calls();
    sleep(Duration::from_secs(5)).await;
    assert!(pair.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_failed_seek_keeps_previous_position() {
    let (pair, player) = new_player(5000);
    player.load(MediaSource::new("clip.mp4"), LoadOptions::default()).await.unwrap();
    player.set_position(1000).await.unwrap();

    pair.fail_set_position(true);
    assert!(player.set_position(3000).await.is_err());
    assert_eq!(player.current_position_ms().await, 1000);
}

#[tokio::test(start_paused = true)]
async fn test_failed_play_does_not_start_loop() {
    let (pair, player) = new_player(5000);
    player.load(MediaSource::new("clip.mp4"), LoadOptions::default()).await.unwrap();

    // Engines lost their source behind the player's back
    pair.unload().await.unwrap();

    assert!(player.play().await.is_err());
    assert!(!player.is_playing().await);
    assert!(!player.is_syncing().await);
}

#[tokio::test(start_paused = true)]
async fn test_play_issues_one_paired_start() {
    let (pair, player) = new_player(5000);
    player.load(MediaSource::new("clip.mp4"), LoadOptions::default()).await.unwrap();
    pair.clear_calls();

    player.play().await.unwrap();
    assert_eq!(pair.calls(), vec![HandleCall::Play]);
    assert!(player.is_playing().await);
    assert!(player.is_syncing().await);
}

#[tokio::test(start_paused = true)]
async fn test_load_passes_per_engine_options() {
    let (pair, player) = new_player(5000);
    let options = LoadOptions::default().looping(true);
    player.load(MediaSource::new("clip.mp4"), options).await.unwrap();

    let seen = pair.load_options();
    assert!(!seen.primary.muted);
    assert!(seen.secondary.muted);
    assert!(seen.primary.looping && seen.secondary.looping);
}

#[tokio::test(start_paused = true)]
async fn test_pause_publishes_state_change() {
    let (_pair, player) = new_player(5000);
    let session = player.load(MediaSource::new("clip.mp4"), LoadOptions::default()).await.unwrap();
    player.play().await.unwrap();

    let mut events = player.subscribe();
    player.pause().await.unwrap();
    // Second pause is a no-op state-wise
    player.pause().await.unwrap();

    match events.try_recv().unwrap() {
        PlayerEvent::PlaybackStateChanged {
            session_id,
            old_state,
            new_state,
            ..
        } => {
            assert_eq!(session_id, session);
            assert_eq!(old_state, PlaybackState::Playing);
            assert_eq!(new_state, PlaybackState::Paused);
        }
        other => panic!("unexpected event: {:?}", other),
    }
    assert!(events.try_recv().is_err());
}
