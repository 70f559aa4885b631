//! Paired player
//!
//! Owns the public playback operations and keeps the sync loop running if
//! and only if a source is loaded and playback is intended to be active.
//!
//! All operations (and the sync loop's corrections) are serialized through
//! one command lock, so a correction can never land between the engine
//! command of an operation and its state update.

use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};
use twinview_common::events::{PlaybackState, PlayerEvent};
use twinview_common::time::{format_position, now};
use uuid::Uuid;

use super::handle::PlaybackHandle;
use super::resync::ResyncController;
use super::task::ScheduledTask;
use super::types::{LoadOptions, MediaSource};
use crate::config::Config;
use crate::error::Result;
use crate::state::{PairedPlayerState, SharedState, SyncStats};

/// Two video engines driven as one player
pub struct PairedPlayer<H: PlaybackHandle + ?Sized + 'static> {
    handle: Arc<H>,
    state: Arc<SharedState>,
    config: Config,
    command_lock: Arc<Mutex<()>>,
    sync_task: Mutex<Option<ScheduledTask>>,
}

impl<H: PlaybackHandle + ?Sized + 'static> PairedPlayer<H> {
    /// Create a player over `handle`
    ///
    /// # Errors
    ///
    /// Returns error if the configuration fails validation.
    pub fn new(handle: Arc<H>, config: Config) -> Result<Self> {
        config.validate()?;
        let state = Arc::new(SharedState::new(config.player.event_capacity));
        Ok(Self {
            handle,
            state,
            config,
            command_lock: Arc::new(Mutex::new(())),
            sync_task: Mutex::new(None),
        })
    }

    // ------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------

    /// Bind `source` to both engines and return the new session id
    ///
    /// A previously loaded source is unloaded first. The player only becomes
    /// loaded once the engines confirm the load. With `auto_play_on_load`
    /// playback starts immediately; if that start fails the error is
    /// returned and the source stays loaded but paused.
    pub async fn load(&self, source: MediaSource, options: LoadOptions) -> Result<Uuid> {
        let _guard = self.command_lock.lock().await;

        if self.state.is_loaded().await {
            debug!("Replacing loaded source with {}", source);
            if let Err(e) = self.unload_locked().await {
                warn!("Failed to release previous source: {}", e);
            }
        }

        self.handle.load(&source, &options).await?;

        let session_id = Uuid::new_v4();
        let duration_ms = match self.handle.get_status().await {
            Ok(status) => status.primary.duration_ms,
            Err(e) => {
                debug!("Duration not available yet: {}", e);
                0
            }
        };
        self.state.mark_loaded(session_id, duration_ms).await;

        info!(
            "Loaded {} (session {}, duration {})",
            source,
            session_id,
            format_position(duration_ms)
        );
        self.state.broadcast_event(PlayerEvent::SourceLoaded {
            session_id,
            source: source.uri,
            duration_ms,
            timestamp: now(),
        });

        if self.config.player.auto_play_on_load {
            self.play_locked().await?;
        }

        Ok(session_id)
    }

    /// Start both engines and the sync loop; no-op unless loaded
    ///
    /// Also resumes a secondary held by the sync loop.
    pub async fn play(&self) -> Result<()> {
        let _guard = self.command_lock.lock().await;
        self.play_locked().await
    }

    /// Pause both engines and stop the sync loop; no-op unless loaded
    ///
    /// If the engines reject the pause, the sync loop keeps running and the
    /// error is returned.
    pub async fn pause(&self) -> Result<()> {
        let _guard = self.command_lock.lock().await;
        let Some(session_id) = self.loaded_session().await else {
            debug!("pause ignored: nothing loaded");
            return Ok(());
        };

        let was_syncing = self.stop_sync().await;

        if let Err(e) = self.handle.pause().await {
            warn!("Pause failed: {}", e);
            if was_syncing {
                self.start_sync(session_id).await;
            }
            return Err(e);
        }

        let was_playing = self.state.set_playing(false).await;
        if was_playing {
            info!("Playback paused at {}", format_position(self.state.current_position_ms().await));
            self.emit_state_change(session_id, PlaybackState::Playing, PlaybackState::Paused);
        }
        Ok(())
    }

    /// Seek both engines; no-op unless loaded
    ///
    /// `position_ms` is clamped to `[0, duration]`. When the duration is
    /// still unknown it is queried first; if it stays unknown only the
    /// lower bound applies. The recorded position only changes on success.
    pub async fn set_position(&self, position_ms: i64) -> Result<()> {
        let _guard = self.command_lock.lock().await;
        let Some(session_id) = self.loaded_session().await else {
            debug!("set_position ignored: nothing loaded");
            return Ok(());
        };

        let duration_ms = self.known_duration().await;
        let target = clamp_position(position_ms, duration_ms);
        if target as i64 != position_ms {
            debug!("Seek target {}ms clamped to {}ms", position_ms, target);
        }

        self.handle.set_position(target).await?;
        self.state.set_position(target).await;

        debug!("Seeked to {}", format_position(target));
        self.state.broadcast_event(PlayerEvent::PositionChanged {
            session_id,
            position_ms: target,
            duration_ms,
            timestamp: now(),
        });
        Ok(())
    }

    /// Release the source from both engines; no-op unless loaded
    ///
    /// The player is unloaded afterwards even if the engines report an
    /// error, which is still returned.
    pub async fn unload(&self) -> Result<()> {
        let _guard = self.command_lock.lock().await;
        self.unload_locked().await
    }

    // ------------------------------------------------------------------
    // Observable state
    // ------------------------------------------------------------------

    pub async fn is_playing(&self) -> bool {
        self.state.is_playing().await
    }

    pub async fn is_loaded(&self) -> bool {
        self.state.is_loaded().await
    }

    pub async fn current_position_ms(&self) -> u64 {
        self.state.current_position_ms().await
    }

    pub async fn duration_ms(&self) -> u64 {
        self.state.duration_ms().await
    }

    pub async fn session_id(&self) -> Option<Uuid> {
        self.state.session_id().await
    }

    /// Copy of the full player state
    pub async fn snapshot(&self) -> PairedPlayerState {
        self.state.snapshot().await
    }

    /// Sync loop is scheduled
    pub async fn is_syncing(&self) -> bool {
        self.sync_task
            .lock()
            .await
            .as_ref()
            .is_some_and(|task| !task.is_cancelled())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.state.subscribe_events()
    }

    pub fn stats(&self) -> SyncStats {
        self.state.counters().snapshot()
    }

    pub fn state(&self) -> &Arc<SharedState> {
        &self.state
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn handle(&self) -> &Arc<H> {
        &self.handle
    }

    // ------------------------------------------------------------------
    // Internals (command lock held)
    // ------------------------------------------------------------------

    async fn play_locked(&self) -> Result<()> {
        let Some(session_id) = self.loaded_session().await else {
            debug!("play ignored: nothing loaded");
            return Ok(());
        };

        self.handle.play().await?;

        let was_playing = self.state.set_playing(true).await;
        // Restart so the first tick is a full interval after the engines start
        self.stop_sync().await;
        self.start_sync(session_id).await;

        if !was_playing {
            info!("Playback started at {}", format_position(self.state.current_position_ms().await));
            self.emit_state_change(session_id, PlaybackState::Paused, PlaybackState::Playing);
        }
        Ok(())
    }

    async fn unload_locked(&self) -> Result<()> {
        if !self.state.is_loaded().await {
            debug!("unload ignored: nothing loaded");
            return Ok(());
        }

        self.stop_sync().await;
        let result = self.handle.unload().await;
        if let Err(e) = &result {
            warn!("Engines reported an error while unloading: {}", e);
        }

        let previous = self.state.mark_unloaded().await;
        if let Some(session_id) = previous.session_id {
            info!("Unloaded session {}", session_id);
            if previous.is_playing {
                self.emit_state_change(session_id, PlaybackState::Playing, PlaybackState::Paused);
            }
            self.state.broadcast_event(PlayerEvent::SourceUnloaded {
                session_id,
                timestamp: now(),
            });
        }
        result
    }

    async fn loaded_session(&self) -> Option<Uuid> {
        let state = self.state.snapshot().await;
        if state.is_loaded {
            state.session_id
        } else {
            None
        }
    }

    /// Last known duration, refreshed from the engines when still unknown
    async fn known_duration(&self) -> u64 {
        let duration_ms = self.state.duration_ms().await;
        if duration_ms > 0 {
            return duration_ms;
        }
        match self.handle.get_status().await {
            Ok(status) if status.primary.duration_ms > 0 => {
                self.state.set_duration(status.primary.duration_ms).await;
                status.primary.duration_ms
            }
            Ok(_) => 0,
            Err(e) => {
                debug!("Could not refresh duration: {}", e);
                0
            }
        }
    }

    async fn start_sync(&self, session_id: Uuid) {
        let controller = Arc::new(ResyncController::new(
            Arc::clone(&self.handle),
            Arc::clone(&self.state),
            Arc::clone(&self.command_lock),
            self.config.sync.clone(),
            session_id,
        ));
        *self.sync_task.lock().await = Some(controller.start());
    }

    /// Cancel the sync loop, returning whether one was running
    ///
    /// Does not wait for an in-flight tick: it needs the command lock to
    /// issue corrections and discards them once it sees the cancellation.
    async fn stop_sync(&self) -> bool {
        match self.sync_task.lock().await.take() {
            Some(task) => {
                task.cancel();
                debug!("{} cancelled", task.name());
                true
            }
            None => false,
        }
    }

    fn emit_state_change(&self, session_id: Uuid, old_state: PlaybackState, new_state: PlaybackState) {
        self.state.broadcast_event(PlayerEvent::PlaybackStateChanged {
            session_id,
            old_state,
            new_state,
            timestamp: now(),
        });
    }
}

/// Clamp a requested seek target to `[0, duration_ms]`
///
/// A duration of 0 means unknown and leaves the upper bound open.
pub fn clamp_position(position_ms: i64, duration_ms: u64) -> u64 {
    let lower = u64::try_from(position_ms).unwrap_or(0);
    if duration_ms == 0 {
        lower
    } else {
        lower.min(duration_ms)
    }
}
