//! Event types for the Twinview event system
//!
//! Provides the shared `PlayerEvent` definitions and the `EventBus` used by the
//! paired player to publish state changes and sync corrections to the UI layer.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Playback state enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Playing,
    Paused,
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackState::Playing => write!(f, "playing"),
            PlaybackState::Paused => write!(f, "paused"),
        }
    }
}

/// Twinview event types
///
/// Events are broadcast via EventBus and can be serialized for any outer
/// transport the UI layer chooses. Every event carries the id of the load
/// session it belongs to, so late events from a previous source can be told
/// apart from the current one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PlayerEvent {
    /// Playback state changed (Playing ↔ Paused)
    PlaybackStateChanged {
        /// Load session the change applies to
        session_id: Uuid,
        /// Playback state before change
        old_state: PlaybackState,
        /// Playback state after change
        new_state: PlaybackState,
        /// When state changed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A media source was bound to both engines
    SourceLoaded {
        /// Newly assigned load session id
        session_id: Uuid,
        /// Source locator as given by the caller
        source: String,
        /// Duration reported by the primary engine (0 if metadata not yet known)
        duration_ms: u64,
        /// When the source was loaded
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The bound source was released from both engines
    SourceUnloaded {
        session_id: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Position changed by an explicit seek or observed by a sync poll
    PositionChanged {
        session_id: Uuid,
        /// Current playback position (milliseconds)
        position_ms: u64,
        /// Total media duration (milliseconds)
        duration_ms: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The sync loop issued corrections for one tick
    SyncCorrected {
        session_id: Uuid,
        /// Primary position minus secondary position (milliseconds)
        drift_ms: i64,
        /// Hard reposition target, if both engines were repositioned
        repositioned_to: Option<u64>,
        /// New secondary playback rate, if changed
        secondary_rate: Option<f64>,
        /// Secondary engine was paused to let the primary catch up
        secondary_paused: bool,
        /// Secondary engine was resumed after an earlier pause
        secondary_resumed: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A sync poll failed and its tick was skipped
    ///
    /// Informational only. Poll failures never stop the sync loop.
    SyncPollFailed {
        session_id: Uuid,
        /// Human-readable failure reason
        reason: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl PlayerEvent {
    /// Load session this event belongs to
    pub fn session_id(&self) -> Uuid {
        match self {
            PlayerEvent::PlaybackStateChanged { session_id, .. }
            | PlayerEvent::SourceLoaded { session_id, .. }
            | PlayerEvent::SourceUnloaded { session_id, .. }
            | PlayerEvent::PositionChanged { session_id, .. }
            | PlayerEvent::SyncCorrected { session_id, .. }
            | PlayerEvent::SyncPollFailed { session_id, .. } => *session_id,
        }
    }

    /// Short event name, matching the serde `type` tag
    pub fn event_type(&self) -> &'static str {
        match self {
            PlayerEvent::PlaybackStateChanged { .. } => "PlaybackStateChanged",
            PlayerEvent::SourceLoaded { .. } => "SourceLoaded",
            PlayerEvent::SourceUnloaded { .. } => "SourceUnloaded",
            PlayerEvent::PositionChanged { .. } => "PositionChanged",
            PlayerEvent::SyncCorrected { .. } => "SyncCorrected",
            PlayerEvent::SyncPollFailed { .. } => "SyncPollFailed",
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus for player events
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
/// - Lagged message detection for slow subscribers
///
/// Dropping a receiver returned by [`EventBus::subscribe`] is the unsubscribe.
///
/// # Examples
///
/// ```
/// use twinview_common::events::{EventBus, PlayerEvent, PlaybackState};
/// use uuid::Uuid;
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit(PlayerEvent::PlaybackStateChanged {
///     session_id: Uuid::new_v4(),
///     old_state: PlaybackState::Paused,
///     new_state: PlaybackState::Playing,
///     timestamp: chrono::Utc::now(),
/// }).ok();
///
/// assert!(rx.try_recv().is_ok());
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PlayerEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events to buffer before dropping old events
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero (tokio broadcast requirement). Configuration
    /// validation rejects a zero capacity before it reaches this point.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: PlayerEvent,
    ) -> Result<usize, broadcast::error::SendError<PlayerEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: PlayerEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
