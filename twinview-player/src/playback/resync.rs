//! Resync controller (the sync loop)
//!
//! While playback is active, polls both engines on a fixed interval, feeds
//! each paired observation to the evaluator and issues the prescribed
//! corrections through the playback handle.
//!
//! Tick contract:
//! - the status poll fully resolves before corrections are computed
//! - ticks never overlap (see [`ScheduledTask`])
//! - a failed or timed-out poll skips the tick; the loop keeps running
//! - corrections from a tick whose observation is stale (loop cancelled,
//!   session changed, or a player command issued meanwhile) are discarded
//! - correction failures are logged and counted, never propagated

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use twinview_common::events::PlayerEvent;
use twinview_common::time::{format_drift, format_position};
use uuid::Uuid;

use super::evaluator::{evaluate, SyncDecision, SyncThresholds};
use super::handle::PlaybackHandle;
use super::task::ScheduledTask;
use super::types::SyncSnapshot;
use crate::config::SyncSettings;
use crate::error::{Error, Result};
use crate::state::SharedState;

/// Result of one tick, for logging and tests
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Status poll failed; nothing was issued
    Skipped(String),
    /// Observation went stale before corrections could be issued
    Discarded,
    /// Drift within tolerance
    InSync { drift_ms: i64 },
    /// Out of sync, but the secondary is already catching up; nothing issued
    Converging { drift_ms: i64 },
    /// Corrections were issued (some may have failed)
    Corrected(SyncDecision),
}

/// Drives periodic sync evaluation for one load session
pub struct ResyncController<H: PlaybackHandle + ?Sized> {
    handle: Arc<H>,
    state: Arc<SharedState>,
    /// Serializes engine commands between the loop and player operations
    command_lock: Arc<Mutex<()>>,
    settings: SyncSettings,
    thresholds: SyncThresholds,
    session_id: Uuid,
    /// The loop paused the secondary and has not resumed it yet
    secondary_held: AtomicBool,
}

impl<H: PlaybackHandle + ?Sized + 'static> ResyncController<H> {
    pub fn new(
        handle: Arc<H>,
        state: Arc<SharedState>,
        command_lock: Arc<Mutex<()>>,
        settings: SyncSettings,
        session_id: Uuid,
    ) -> Self {
        let thresholds = settings.thresholds();
        Self {
            handle,
            state,
            command_lock,
            settings,
            thresholds,
            session_id,
            secondary_held: AtomicBool::new(false),
        }
    }

    /// Start polling; the returned task stops the loop when cancelled or dropped
    pub fn start(self: Arc<Self>) -> ScheduledTask {
        info!(
            "Starting sync loop for session {} ({}ms interval)",
            self.session_id, self.settings.poll_interval_ms
        );
        let period = self.settings.poll_interval();
        ScheduledTask::repeating("sync-loop", period, move |token| {
            let controller = Arc::clone(&self);
            async move {
                controller.tick(&token).await;
            }
        })
    }

    /// Run one poll-evaluate-correct cycle
    pub async fn tick(&self, token: &CancellationToken) -> TickOutcome {
        let counters = self.state.counters();
        counters.record_tick();

        let epoch = self.state.command_epoch().await;

        let snapshot = match self.poll().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                counters.record_skipped();
                if e.is_transient() {
                    debug!("Sync tick skipped: {}", e);
                } else {
                    warn!("Sync tick skipped: {}", e);
                }
                self.state.broadcast_event(PlayerEvent::SyncPollFailed {
                    session_id: self.session_id,
                    reason: e.to_string(),
                    timestamp: twinview_common::time::now(),
                });
                return TickOutcome::Skipped(e.to_string());
            }
        };

        // Hold the command lock while correcting so player operations and
        // corrections never interleave on the engines
        let _guard = self.command_lock.lock().await;

        if token.is_cancelled() || !self.state.accepts_corrections(self.session_id, epoch).await {
            counters.record_discarded();
            debug!("Discarding stale sync observation");
            return TickOutcome::Discarded;
        }

        self.state
            .record_observation(self.session_id, &snapshot.primary)
            .await;
        self.state.broadcast_event(PlayerEvent::PositionChanged {
            session_id: self.session_id,
            position_ms: snapshot.primary.position_ms,
            duration_ms: self.state.duration_ms().await,
            timestamp: twinview_common::time::now(),
        });

        let decision = evaluate(&snapshot, &self.thresholds);
        counters.record_decision(&decision);

        trace!(
            "Sync tick: primary={} secondary={} drift={}",
            format_position(snapshot.primary.position_ms),
            format_position(snapshot.secondary.position_ms),
            format_drift(decision.drift_ms)
        );

        let resumed = self.maybe_resume_secondary(&decision).await;

        if decision.in_sync {
            if resumed {
                self.emit_correction(&decision, false, true);
            }
            return TickOutcome::InSync {
                drift_ms: decision.drift_ms,
            };
        }

        if !decision.needs_correction() && !resumed {
            trace!("Secondary already catching up (drift {})", format_drift(decision.drift_ms));
            return TickOutcome::Converging {
                drift_ms: decision.drift_ms,
            };
        }

        let paused = self.apply(&decision).await;
        self.emit_correction(&decision, paused, resumed);
        TickOutcome::Corrected(decision)
    }

    /// Query both engines, bounded by the configured timeout
    async fn poll(&self) -> Result<SyncSnapshot> {
        match self.settings.status_timeout() {
            Some(limit) => tokio::time::timeout(limit, self.handle.get_status())
                .await
                .map_err(|_| Error::StatusTimeout(limit))?,
            None => self.handle.get_status().await,
        }
    }

    /// Issue the corrections of one decision
    ///
    /// The reposition goes first; the rate change and secondary pause are
    /// independent and issued concurrently. Returns whether the secondary
    /// was paused.
    async fn apply(&self, decision: &SyncDecision) -> bool {
        let counters = self.state.counters();

        if let Some(target) = decision.reposition_to {
            warn!(
                "Engines far out of sync (drift {}), repositioning both to {}",
                format_drift(decision.drift_ms),
                format_position(target)
            );
            match self.handle.set_position(target).await {
                Ok(()) => counters.record_reposition(),
                Err(e) => {
                    counters.record_failed_correction();
                    warn!("Hard reposition failed: {}", e);
                }
            }
        }

        let rate_change = async {
            match decision.secondary_rate {
                Some(rate) => Some(self.handle.set_secondary_rate(rate).await),
                None => None,
            }
        };
        let pause = async {
            if decision.pause_secondary {
                Some(self.handle.pause_secondary().await)
            } else {
                None
            }
        };
        let (rate_result, pause_result) = tokio::join!(rate_change, pause);

        match rate_result {
            Some(Ok(())) => {
                counters.record_rate_change();
                debug!(
                    "Secondary rate set to {} (drift {})",
                    decision.secondary_rate.unwrap_or_default(),
                    format_drift(decision.drift_ms)
                );
            }
            Some(Err(e)) => {
                counters.record_failed_correction();
                warn!("Secondary rate change failed: {}", e);
            }
            None => {}
        }

        match pause_result {
            Some(Ok(())) => {
                counters.record_secondary_pause();
                self.secondary_held.store(true, Ordering::Relaxed);
                debug!(
                    "Secondary paused to let primary catch up (drift {})",
                    format_drift(decision.drift_ms)
                );
                true
            }
            Some(Err(e)) => {
                counters.record_failed_correction();
                warn!("Pausing secondary failed: {}", e);
                false
            }
            None => false,
        }
    }

    /// Resume a held secondary once the primary has caught up
    ///
    /// Only active with `resume_secondary` enabled. "Caught up" means this
    /// tick does not prescribe another pause.
    async fn maybe_resume_secondary(&self, decision: &SyncDecision) -> bool {
        if !self.settings.resume_secondary
            || decision.pause_secondary
            || !self.secondary_held.load(Ordering::Relaxed)
        {
            return false;
        }

        match self.handle.play_secondary().await {
            Ok(()) => {
                self.secondary_held.store(false, Ordering::Relaxed);
                self.state.counters().record_secondary_resume();
                debug!("Secondary resumed (drift {})", format_drift(decision.drift_ms));
                true
            }
            Err(e) => {
                self.state.counters().record_failed_correction();
                warn!("Resuming secondary failed: {}", e);
                false
            }
        }
    }

    fn emit_correction(&self, decision: &SyncDecision, paused: bool, resumed: bool) {
        self.state.broadcast_event(PlayerEvent::SyncCorrected {
            session_id: self.session_id,
            drift_ms: decision.drift_ms,
            repositioned_to: decision.reposition_to,
            secondary_rate: decision.secondary_rate,
            secondary_paused: paused,
            secondary_resumed: resumed,
            timestamp: twinview_common::time::now(),
        });
    }
}
