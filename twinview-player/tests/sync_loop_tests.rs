//! Sync loop integration tests
//!
//! Drives a PairedPlayer over the simulated engine pair with tokio's paused
//! clock, so every tick lands at an exact virtual time.
//!
//! **Test Coverage:**
//! - Loop lifecycle across play/pause/unload
//! - Poll failure isolation
//! - Hard reposition on extreme drift
//! - Failed corrections counted without stopping the loop
//! - Late corrections discarded after pause
//! - Secondary resume policy
//! - Drift staying bounded under rate correction

use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use twinview_player::config::Config;
use twinview_player::playback::{
    Engine, HandleCall, LoadOptions, MediaSource, PairedPlayer, PlaybackHandle, SimulatedPair,
};

async fn playing(
    pair: SimulatedPair,
    config: Config,
) -> (Arc<SimulatedPair>, PairedPlayer<SimulatedPair>) {
    let pair = Arc::new(pair);
    let player = PairedPlayer::new(Arc::clone(&pair), config).expect("valid config");
    player
        .load(MediaSource::new("clip.mp4"), LoadOptions::default())
        .await
        .expect("load succeeds");
    (pair, player)
}

fn fast_config(resume_secondary: bool) -> Config {
    let mut config = Config::default();
    config.sync.poll_interval_ms = 100;
    config.sync.resume_secondary = resume_secondary;
    config
}

#[tokio::test(start_paused = true)]
async fn test_polling_runs_only_while_playing() {
    let (pair, player) = playing(SimulatedPair::new(60_000), Config::default()).await;
    pair.clear_calls();

    // First tick is one interval after play
    sleep(Duration::from_millis(3500)).await;
    assert_eq!(pair.count(&HandleCall::GetStatus), 3);
    assert_eq!(player.stats().ticks, 3);

    player.pause().await.unwrap();
    pair.clear_calls();
    sleep(Duration::from_secs(5)).await;
    assert_eq!(pair.count(&HandleCall::GetStatus), 0);
    assert!(!player.is_syncing().await);

    player.play().await.unwrap();
    sleep(Duration::from_millis(1500)).await;
    assert_eq!(pair.count(&HandleCall::GetStatus), 1);

    player.unload().await.unwrap();
    pair.clear_calls();
    sleep(Duration::from_secs(5)).await;
    assert!(pair.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_position_tracks_primary() {
    let (_pair, player) = playing(SimulatedPair::new(60_000), Config::default()).await;

    sleep(Duration::from_millis(2500)).await;
    // Last observation was the tick at 2s
    assert_eq!(player.current_position_ms().await, 2000);
}

#[tokio::test(start_paused = true)]
async fn test_failed_poll_does_not_stop_loop() {
    let (pair, player) = playing(SimulatedPair::new(60_000), Config::default()).await;
    let mut events = player.subscribe();
    pair.fail_next_status(1);

    sleep(Duration::from_millis(2500)).await;

    let stats = player.stats();
    assert_eq!(stats.ticks, 2);
    assert_eq!(stats.skipped_ticks, 1);
    assert_eq!(stats.in_sync_ticks, 1);
    assert!(player.is_syncing().await);

    let first = events.try_recv().unwrap();
    assert_eq!(first.event_type(), "SyncPollFailed");
}

#[tokio::test(start_paused = true)]
async fn test_extreme_drift_repositions_both_engines() {
    let (pair, player) = playing(SimulatedPair::new(60_000), Config::default()).await;
    pair.offset_secondary(-500);
    pair.clear_calls();

    sleep(Duration::from_millis(1500)).await;

    let calls = pair.calls();
    assert_eq!(calls[0], HandleCall::GetStatus);
    assert!(matches!(calls[1], HandleCall::SetPosition(p) if (999..=1001).contains(&p)));
    assert!(calls.contains(&HandleCall::SetSecondaryRate(1.1)));

    let stats = player.stats();
    assert_eq!(stats.repositions, 1);
    assert_eq!(stats.rate_changes, 1);
    assert_eq!(stats.last_drift_ms, Some(500));

    // Both engines realigned
    assert!(pair.peek().drift_ms().abs() <= 60);
}

#[tokio::test(start_paused = true)]
async fn test_failed_reposition_still_adjusts_rate() {
    let (pair, player) = playing(SimulatedPair::new(60_000), Config::default()).await;
    pair.offset_secondary(-500);
    pair.fail_set_position(true);
    pair.clear_calls();

    sleep(Duration::from_millis(3500)).await;

    // Every tick still sees extreme drift and retries the seek
    let stats = player.stats();
    assert_eq!(stats.ticks, 3);
    assert_eq!(stats.repositions, 0);
    assert_eq!(stats.failed_corrections, 3);
    assert_eq!(stats.rate_changes, 1);
    assert_eq!(pair.count(&HandleCall::SetSecondaryRate(1.1)), 1);
    assert!(player.is_syncing().await);
    assert!(player.is_playing().await);
}

#[tokio::test(start_paused = true)]
async fn test_failed_secondary_pause_keeps_loop_running() {
    let (pair, player) = playing(SimulatedPair::new(60_000), Config::default()).await;
    pair.offset_secondary(100);
    pair.fail_pause_secondary(true);

    sleep(Duration::from_millis(1500)).await;
    assert_eq!(pair.count(&HandleCall::PauseSecondary), 1);
    assert_eq!(player.stats().failed_corrections, 1);
    assert_eq!(player.stats().secondary_pauses, 0);
    assert!(pair.is_playing(Engine::Secondary));
    assert!(player.is_syncing().await);

    // Engine accepts the pause again on the next tick
    pair.fail_pause_secondary(false);
    sleep(Duration::from_secs(1)).await;
    assert_eq!(player.stats().secondary_pauses, 1);
    assert!(!pair.is_playing(Engine::Secondary));
}

#[tokio::test(start_paused = true)]
async fn test_late_corrections_discarded_after_pause() {
    let (pair, player) = playing(SimulatedPair::new(60_000), Config::default()).await;
    pair.offset_secondary(-500);
    pair.set_status_delay(Some(Duration::from_millis(500)));

    // Tick at 1s is still waiting on the engines at 1.2s
    sleep(Duration::from_millis(1200)).await;
    player.pause().await.unwrap();
    pair.clear_calls();

    sleep(Duration::from_secs(2)).await;

    assert!(pair.calls().is_empty());
    assert_eq!(player.stats().discarded_ticks, 1);
    assert_eq!(player.stats().repositions, 0);
}

#[tokio::test(start_paused = true)]
async fn test_late_corrections_discarded_after_seek() {
    let (pair, player) = playing(SimulatedPair::new(60_000), Config::default()).await;
    pair.offset_secondary(-500);
    pair.set_status_delay(Some(Duration::from_millis(500)));

    sleep(Duration::from_millis(1200)).await;
    player.set_position(10_000).await.unwrap();
    pair.clear_calls();

    // Only let the stale tick finish
    sleep(Duration::from_millis(400)).await;

    assert!(!pair
        .calls()
        .iter()
        .any(|c| matches!(c, HandleCall::SetPosition(_) | HandleCall::SetSecondaryRate(_))));
    assert_eq!(player.stats().discarded_ticks, 1);
    assert_eq!(player.current_position_ms().await, 10_000);
}

#[tokio::test(start_paused = true)]
async fn test_held_secondary_waits_for_explicit_play() {
    let (pair, player) = playing(SimulatedPair::new(60_000), Config::default()).await;
    pair.offset_secondary(100);

    sleep(Duration::from_millis(1500)).await;
    assert!(!pair.is_playing(Engine::Secondary));
    assert_eq!(player.stats().secondary_pauses, 1);

    sleep(Duration::from_secs(1)).await;
    assert_eq!(pair.count(&HandleCall::PlaySecondary), 0);
    assert!(!pair.is_playing(Engine::Secondary));

    player.play().await.unwrap();
    assert!(pair.is_playing(Engine::Secondary));
}

#[tokio::test(start_paused = true)]
async fn test_resume_policy_resumes_secondary() {
    let (pair, player) = playing(SimulatedPair::new(60_000), fast_config(true)).await;
    pair.offset_secondary(50);

    // Tick at 100ms pauses the secondary, tick at 200ms finds the primary ahead
    sleep(Duration::from_millis(250)).await;

    assert_eq!(player.stats().secondary_pauses, 1);
    assert_eq!(player.stats().secondary_resumes, 1);
    assert!(pair.is_playing(Engine::Secondary));
}

#[tokio::test(start_paused = true)]
async fn test_drift_stays_bounded_with_resume() {
    let (pair, player) = playing(SimulatedPair::new(600_000), fast_config(true)).await;
    pair.offset_secondary(-150);

    let mut worst = 0;
    for _ in 0..100 {
        sleep(Duration::from_millis(50)).await;
        if player.stats().ticks >= 5 {
            worst = worst.max(pair.peek().drift_ms().abs());
        }
    }

    let stats = player.stats();
    assert!(stats.in_sync_ticks > 0);
    assert_eq!(stats.repositions, 0);
    assert!(worst <= 100, "drift reached {}ms", worst);
}

#[tokio::test(start_paused = true)]
async fn test_hung_status_is_bounded_by_timeout() {
    let mut config = Config::default();
    config.sync.status_timeout_ms = Some(200);
    let (pair, player) = playing(SimulatedPair::new(60_000), config).await;
    pair.set_status_delay(Some(Duration::from_secs(30)));

    sleep(Duration::from_millis(3500)).await;

    let stats = player.stats();
    assert_eq!(stats.ticks, 3);
    assert_eq!(stats.skipped_ticks, 3);
    assert!(player.is_syncing().await);

    // Engines recover, loop picks up on its own
    pair.set_status_delay(None);
    sleep(Duration::from_secs(1)).await;
    assert_eq!(player.stats().in_sync_ticks, 1);
    assert!(pair.get_status().await.is_ok());
}
