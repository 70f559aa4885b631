//! Shared paired-player state
//!
//! State shared between the public player operations and the sync loop.
//! The player is the only writer of `is_loaded` / `is_playing`; the sync
//! loop reads them and records observed positions.

use serde::Serialize;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use tokio::sync::{broadcast, RwLock};
use twinview_common::events::{EventBus, PlaybackState, PlayerEvent};
use uuid::Uuid;

use crate::playback::evaluator::SyncDecision;
use crate::playback::types::PlaybackStatus;

/// Observable state of the paired player
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PairedPlayerState {
    /// A media source is bound to both engines
    pub is_loaded: bool,
    /// Playback is intended to be active
    pub is_playing: bool,
    /// Last observed or set position (milliseconds)
    pub current_position_ms: u64,
    /// Last known media duration (milliseconds, 0 if unknown)
    pub duration_ms: u64,
    /// Id of the current load session
    pub session_id: Option<Uuid>,
    /// Bumped by every explicit command; the sync loop drops a tick whose
    /// observation predates the latest command
    pub command_epoch: u64,
}

impl PairedPlayerState {
    /// The sync loop runs if and only if this holds
    pub fn should_sync(&self) -> bool {
        self.is_loaded && self.is_playing
    }

    pub fn playback_state(&self) -> PlaybackState {
        if self.is_playing {
            PlaybackState::Playing
        } else {
            PlaybackState::Paused
        }
    }
}

/// Point-in-time copy of the sync counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    pub ticks: u64,
    pub skipped_ticks: u64,
    pub discarded_ticks: u64,
    pub in_sync_ticks: u64,
    pub repositions: u64,
    pub rate_changes: u64,
    pub secondary_pauses: u64,
    pub secondary_resumes: u64,
    pub failed_corrections: u64,
    pub last_drift_ms: Option<i64>,
}

/// Lock-free sync counters
#[derive(Debug)]
pub struct SyncCounters {
    ticks: AtomicU64,
    skipped_ticks: AtomicU64,
    discarded_ticks: AtomicU64,
    in_sync_ticks: AtomicU64,
    repositions: AtomicU64,
    rate_changes: AtomicU64,
    secondary_pauses: AtomicU64,
    secondary_resumes: AtomicU64,
    failed_corrections: AtomicU64,
    last_drift_ms: AtomicI64,
}

/// Sentinel for "no drift observed yet"
const NO_DRIFT: i64 = i64::MIN;

impl SyncCounters {
    fn new() -> Self {
        Self {
            ticks: AtomicU64::new(0),
            skipped_ticks: AtomicU64::new(0),
            discarded_ticks: AtomicU64::new(0),
            in_sync_ticks: AtomicU64::new(0),
            repositions: AtomicU64::new(0),
            rate_changes: AtomicU64::new(0),
            secondary_pauses: AtomicU64::new(0),
            secondary_resumes: AtomicU64::new(0),
            failed_corrections: AtomicU64::new(0),
            last_drift_ms: AtomicI64::new(NO_DRIFT),
        }
    }

    pub fn record_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.skipped_ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_discarded(&self) {
        self.discarded_ticks.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the evaluation result of a tick whose corrections are issued
    pub fn record_decision(&self, decision: &SyncDecision) {
        self.last_drift_ms.store(decision.drift_ms, Ordering::Relaxed);
        if decision.in_sync {
            self.in_sync_ticks.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_reposition(&self) {
        self.repositions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rate_change(&self) {
        self.rate_changes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_secondary_pause(&self) {
        self.secondary_pauses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_secondary_resume(&self) {
        self.secondary_resumes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed_correction(&self) {
        self.failed_corrections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SyncStats {
        let last = self.last_drift_ms.load(Ordering::Relaxed);
        SyncStats {
            ticks: self.ticks.load(Ordering::Relaxed),
            skipped_ticks: self.skipped_ticks.load(Ordering::Relaxed),
            discarded_ticks: self.discarded_ticks.load(Ordering::Relaxed),
            in_sync_ticks: self.in_sync_ticks.load(Ordering::Relaxed),
            repositions: self.repositions.load(Ordering::Relaxed),
            rate_changes: self.rate_changes.load(Ordering::Relaxed),
            secondary_pauses: self.secondary_pauses.load(Ordering::Relaxed),
            secondary_resumes: self.secondary_resumes.load(Ordering::Relaxed),
            failed_corrections: self.failed_corrections.load(Ordering::Relaxed),
            last_drift_ms: (last != NO_DRIFT).then_some(last),
        }
    }
}

/// Shared state accessible by the player and its sync loop
///
/// Uses RwLock for concurrent read access with rare writes
pub struct SharedState {
    player: RwLock<PairedPlayerState>,
    events: EventBus,
    counters: SyncCounters,
}

impl SharedState {
    /// Create new shared state with an event bus of the given capacity
    pub fn new(event_capacity: usize) -> Self {
        Self {
            player: RwLock::new(PairedPlayerState::default()),
            events: EventBus::new(event_capacity),
            counters: SyncCounters::new(),
        }
    }

    /// Broadcast an event to all listeners (no listeners is OK)
    pub fn broadcast_event(&self, event: PlayerEvent) {
        self.events.emit_lossy(event);
    }

    /// Subscribe to the event stream
    pub fn subscribe_events(&self) -> broadcast::Receiver<PlayerEvent> {
        self.events.subscribe()
    }

    pub fn counters(&self) -> &SyncCounters {
        &self.counters
    }

    /// Copy of the full player state
    pub async fn snapshot(&self) -> PairedPlayerState {
        self.player.read().await.clone()
    }

    pub async fn is_loaded(&self) -> bool {
        self.player.read().await.is_loaded
    }

    pub async fn is_playing(&self) -> bool {
        self.player.read().await.is_playing
    }

    pub async fn current_position_ms(&self) -> u64 {
        self.player.read().await.current_position_ms
    }

    pub async fn duration_ms(&self) -> u64 {
        self.player.read().await.duration_ms
    }

    pub async fn session_id(&self) -> Option<Uuid> {
        self.player.read().await.session_id
    }

    pub async fn command_epoch(&self) -> u64 {
        self.player.read().await.command_epoch
    }

    /// Sync loop guard: still loaded and playing the same session, and no
    /// command has been issued since `epoch`
    pub async fn accepts_corrections(&self, session_id: Uuid, epoch: u64) -> bool {
        let state = self.player.read().await;
        state.should_sync() && state.session_id == Some(session_id) && state.command_epoch == epoch
    }

    // ------------------------------------------------------------------
    // Mutators (paired player only, except `record_observation`)
    // ------------------------------------------------------------------

    /// Bind a new session; resets position and stops playback intent
    pub(crate) async fn mark_loaded(&self, session_id: Uuid, duration_ms: u64) {
        let mut state = self.player.write().await;
        state.is_loaded = true;
        state.is_playing = false;
        state.current_position_ms = 0;
        state.duration_ms = duration_ms;
        state.session_id = Some(session_id);
        state.command_epoch += 1;
    }

    /// Set playback intent, returning the previous value
    pub(crate) async fn set_playing(&self, playing: bool) -> bool {
        let mut state = self.player.write().await;
        let was_playing = state.is_playing;
        state.is_playing = playing;
        state.command_epoch += 1;
        was_playing
    }

    /// Record an explicit seek
    pub(crate) async fn set_position(&self, position_ms: u64) {
        let mut state = self.player.write().await;
        state.current_position_ms = position_ms;
        state.command_epoch += 1;
    }

    pub(crate) async fn set_duration(&self, duration_ms: u64) {
        self.player.write().await.duration_ms = duration_ms;
    }

    /// Clear the session, returning the previous state
    pub(crate) async fn mark_unloaded(&self) -> PairedPlayerState {
        let mut state = self.player.write().await;
        let previous = state.clone();
        *state = PairedPlayerState {
            command_epoch: previous.command_epoch + 1,
            ..PairedPlayerState::default()
        };
        previous
    }

    /// Record the primary status observed by a sync poll
    ///
    /// Ignored if the session has changed since the poll was issued. A
    /// duration of 0 (metadata not loaded yet) keeps the previous duration.
    pub(crate) async fn record_observation(&self, session_id: Uuid, primary: &PlaybackStatus) {
        let mut state = self.player.write().await;
        if state.session_id != Some(session_id) || !state.is_loaded {
            return;
        }
        state.current_position_ms = primary.position_ms;
        if primary.duration_ms > 0 {
            state.duration_ms = primary.duration_ms;
        }
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_initial_state_is_unloaded() {
        let state = SharedState::default();
        let snapshot = state.snapshot().await;
        assert!(!snapshot.is_loaded);
        assert!(!snapshot.is_playing);
        assert!(!snapshot.should_sync());
        assert_eq!(snapshot.playback_state(), PlaybackState::Paused);
    }

    #[tokio::test]
    async fn test_should_sync_requires_loaded_and_playing() {
        let state = SharedState::default();
        let session = Uuid::new_v4();

        state.mark_loaded(session, 5000).await;
        assert!(!state.snapshot().await.should_sync());

        state.set_playing(true).await;
        assert!(state.snapshot().await.should_sync());

        let previous = state.mark_unloaded().await;
        assert!(previous.is_playing);
        assert!(!state.snapshot().await.should_sync());
        assert_eq!(state.session_id().await, None);
    }

    #[tokio::test]
    async fn test_commands_invalidate_pending_corrections() {
        let state = SharedState::default();
        let session = Uuid::new_v4();
        state.mark_loaded(session, 5000).await;
        state.set_playing(true).await;

        let epoch = state.command_epoch().await;
        assert!(state.accepts_corrections(session, epoch).await);

        state.set_position(1000).await;
        assert!(!state.accepts_corrections(session, epoch).await);
        assert!(!state.accepts_corrections(Uuid::new_v4(), state.command_epoch().await).await);
    }

    #[tokio::test]
    async fn test_observation_from_old_session_ignored() {
        let state = SharedState::default();
        let old = Uuid::new_v4();
        let new = Uuid::new_v4();
        state.mark_loaded(old, 5000).await;
        state.mark_loaded(new, 8000).await;

        state.record_observation(old, &PlaybackStatus::new(1234, 5000, 1.0)).await;
        assert_eq!(state.current_position_ms().await, 0);

        state.record_observation(new, &PlaybackStatus::new(1500, 0, 1.0)).await;
        assert_eq!(state.current_position_ms().await, 1500);
        // Unknown duration keeps the last known one
        assert_eq!(state.duration_ms().await, 8000);
    }

    #[test]
    fn test_counters_snapshot() {
        let counters = SyncCounters::new();
        assert_eq!(counters.snapshot().last_drift_ms, None);

        counters.record_tick();
        counters.record_skipped();
        counters.record_decision(&SyncDecision {
            drift_ms: -40,
            in_sync: false,
            reposition_to: None,
            secondary_rate: None,
            pause_secondary: true,
        });
        counters.record_secondary_pause();

        let stats = counters.snapshot();
        assert_eq!(stats.ticks, 1);
        assert_eq!(stats.skipped_ticks, 1);
        assert_eq!(stats.secondary_pauses, 1);
        assert_eq!(stats.in_sync_ticks, 0);
        assert_eq!(stats.last_drift_ms, Some(-40));
    }
}
