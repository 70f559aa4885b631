//! Type definitions for the paired playback engines

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the two video engines in the pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    /// Authoritative engine; its position wins on hard reposition
    Primary,
    /// Follower engine; the only one whose rate is adjusted
    Secondary,
}

/// Status of a single engine, sampled on every poll
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaybackStatus {
    /// Current playback position (milliseconds)
    pub position_ms: u64,
    /// Total media duration (milliseconds, 0 until metadata loads)
    pub duration_ms: u64,
    /// Playback speed multiplier (1.0 = normal)
    pub rate: f64,
}

impl PlaybackStatus {
    pub fn new(position_ms: u64, duration_ms: u64, rate: f64) -> Self {
        Self {
            position_ms,
            duration_ms,
            rate,
        }
    }

    /// Status at normal speed with unknown duration
    pub fn at(position_ms: u64) -> Self {
        Self::new(position_ms, 0, 1.0)
    }
}

/// Paired status observation of both engines
///
/// Both statuses are requested concurrently and treated as a single atomic
/// observation for one decision cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SyncSnapshot {
    pub primary: PlaybackStatus,
    pub secondary: PlaybackStatus,
}

impl SyncSnapshot {
    pub fn new(primary: PlaybackStatus, secondary: PlaybackStatus) -> Self {
        Self { primary, secondary }
    }

    /// Primary position minus secondary position (milliseconds)
    ///
    /// Positive when the primary is ahead. Saturates instead of overflowing.
    pub fn drift_ms(&self) -> i64 {
        let primary = self.primary.position_ms;
        let secondary = self.secondary.position_ms;
        if primary >= secondary {
            i64::try_from(primary - secondary).unwrap_or(i64::MAX)
        } else {
            i64::try_from(secondary - primary).map_or(i64::MIN, |d| -d)
        }
    }
}

/// Media source bound to both engines
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSource {
    /// Platform locator (file path, content URI, ...)
    pub uri: String,
}

impl MediaSource {
    pub fn new(uri: impl Into<String>) -> Self {
        Self { uri: uri.into() }
    }
}

impl From<&str> for MediaSource {
    fn from(uri: &str) -> Self {
        Self::new(uri)
    }
}

impl fmt::Display for MediaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri)
    }
}

/// Per-engine load options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EngineOptions {
    pub muted: bool,
    pub looping: bool,
}

/// Load options for the pair
///
/// The default mutes the secondary so the soundtrack is only heard once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadOptions {
    pub primary: EngineOptions,
    pub secondary: EngineOptions,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            primary: EngineOptions::default(),
            secondary: EngineOptions {
                muted: true,
                looping: false,
            },
        }
    }
}

impl LoadOptions {
    /// Apply the same looping flag to both engines
    pub fn looping(mut self, looping: bool) -> Self {
        self.primary.looping = looping;
        self.secondary.looping = looping;
        self
    }
}
