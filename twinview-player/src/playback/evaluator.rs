//! Sync evaluation
//!
//! Classifies one [`SyncSnapshot`] and prescribes corrections. Drift is
//! `primary - secondary`; corrections are tiered:
//!
//! - `abs(d) <= max_in_sync_ms`: nothing
//! - `d > 0` and secondary rate `<= 1`: raise secondary rate to the catch-up rate
//! - `d <= 0` and secondary rate `> 1`: reset secondary rate to 1
//! - `d <= 0`: pause the secondary
//! - `abs(d) > extreme_out_of_sync_ms`: also reposition both engines to the
//!   primary position
//!
//! The evaluator is a total function; it never fails.

use super::types::SyncSnapshot;
use serde::Serialize;

/// Drift at or below this is in sync (milliseconds)
pub const MAX_IN_SYNC_MS: u64 = 25;

/// Drift above this requires a hard reposition (milliseconds)
pub const EXTREME_OUT_OF_SYNC_MS: u64 = 200;

/// Secondary rate while it catches up with the primary
pub const CATCH_UP_RATE: f64 = 1.1;

/// Normal playback rate
pub const NORMAL_RATE: f64 = 1.0;

/// Evaluator thresholds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncThresholds {
    pub max_in_sync_ms: u64,
    pub extreme_out_of_sync_ms: u64,
    pub catch_up_rate: f64,
}

impl Default for SyncThresholds {
    fn default() -> Self {
        Self {
            max_in_sync_ms: MAX_IN_SYNC_MS,
            extreme_out_of_sync_ms: EXTREME_OUT_OF_SYNC_MS,
            catch_up_rate: CATCH_UP_RATE,
        }
    }
}

/// Corrections prescribed for one tick
///
/// A reposition, when present, is applied before the rate and pause actions,
/// which are independent of each other.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SyncDecision {
    /// Primary position minus secondary position (milliseconds)
    pub drift_ms: i64,
    /// Drift within tolerance; nothing else is prescribed
    pub in_sync: bool,
    /// Seek both engines to this position
    pub reposition_to: Option<u64>,
    /// New secondary playback rate
    pub secondary_rate: Option<f64>,
    /// Hold the secondary until the primary catches up
    pub pause_secondary: bool,
}

impl SyncDecision {
    /// At least one command must be issued
    pub fn needs_correction(&self) -> bool {
        self.reposition_to.is_some() || self.secondary_rate.is_some() || self.pause_secondary
    }

    /// Drift exceeded the extreme threshold
    pub fn is_extreme(&self) -> bool {
        self.reposition_to.is_some()
    }
}

/// Evaluate one paired observation
pub fn evaluate(snapshot: &SyncSnapshot, thresholds: &SyncThresholds) -> SyncDecision {
    let drift_ms = snapshot.drift_ms();
    let magnitude = drift_ms.unsigned_abs();

    if magnitude <= thresholds.max_in_sync_ms {
        return SyncDecision {
            drift_ms,
            in_sync: true,
            reposition_to: None,
            secondary_rate: None,
            pause_secondary: false,
        };
    }

    let reposition_to =
        (magnitude > thresholds.extreme_out_of_sync_ms).then_some(snapshot.primary.position_ms);

    let secondary_rate = snapshot.secondary.rate;
    let primary_ahead = drift_ms > 0;

    let secondary_rate = if primary_ahead && secondary_rate <= NORMAL_RATE {
        Some(thresholds.catch_up_rate)
    } else if !primary_ahead && secondary_rate > NORMAL_RATE {
        Some(NORMAL_RATE)
    } else {
        None
    };

    SyncDecision {
        drift_ms,
        in_sync: false,
        reposition_to,
        secondary_rate,
        pause_secondary: !primary_ahead,
    }
}
