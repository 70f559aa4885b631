//! Configuration management for the paired player
//!
//! A single TOML file carries every tunable. Each field has a built-in
//! default, so a missing file or a partial file is fine. Sources are applied
//! in this order:
//!
//! 1. Command-line overrides (`--poll-interval-ms`, `--log-level`)
//! 2. TOML configuration file (CLI path > `TWINVIEW_CONFIG` > platform dir)
//! 3. Built-in defaults (code constants)
//!
//! ```toml
//! [sync]
//! poll_interval_ms = 1000
//! max_in_sync_ms = 25
//! extreme_out_of_sync_ms = 200
//! catch_up_rate = 1.1
//! status_timeout_ms = 2000
//! resume_secondary = false
//!
//! [player]
//! auto_play_on_load = true
//! event_capacity = 100
//!
//! [logging]
//! level = "info"
//! ```

use crate::error::{Error, Result};
use crate::playback::evaluator::{
    SyncThresholds, CATCH_UP_RATE, EXTREME_OUT_OF_SYNC_MS, MAX_IN_SYNC_MS,
};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::info;
use twinview_common::config::{read_toml, ConfigResolver};
use twinview_common::time::millis_to_duration;

/// Sync loop tunables
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Interval between sync ticks (milliseconds)
    pub poll_interval_ms: u64,

    /// Drift at or below this is considered in sync (milliseconds)
    pub max_in_sync_ms: u64,

    /// Drift above this triggers a hard reposition (milliseconds)
    pub extreme_out_of_sync_ms: u64,

    /// Secondary playback rate while it catches up with the primary
    pub catch_up_rate: f64,

    /// Per-poll status timeout; a timed-out poll skips its tick
    ///
    /// `None` waits for the engines indefinitely.
    pub status_timeout_ms: Option<u64>,

    /// Resume the secondary automatically once the primary has caught up
    ///
    /// Off by default: a secondary paused by the sync loop stays paused until
    /// the next explicit play.
    pub resume_secondary: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            max_in_sync_ms: MAX_IN_SYNC_MS,
            extreme_out_of_sync_ms: EXTREME_OUT_OF_SYNC_MS,
            catch_up_rate: CATCH_UP_RATE,
            status_timeout_ms: None,
            resume_secondary: false,
        }
    }
}

impl SyncSettings {
    /// Get poll interval as Duration
    pub fn poll_interval(&self) -> Duration {
        millis_to_duration(self.poll_interval_ms)
    }

    /// Get status timeout as Duration
    pub fn status_timeout(&self) -> Option<Duration> {
        self.status_timeout_ms.map(millis_to_duration)
    }

    /// Evaluator thresholds built from these settings
    pub fn thresholds(&self) -> SyncThresholds {
        SyncThresholds {
            max_in_sync_ms: self.max_in_sync_ms,
            extreme_out_of_sync_ms: self.extreme_out_of_sync_ms,
            catch_up_rate: self.catch_up_rate,
        }
    }
}

/// Player behavior settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlayerSettings {
    /// Start playback as soon as a source is loaded
    pub auto_play_on_load: bool,

    /// Event bus buffer size
    pub event_capacity: usize,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            auto_play_on_load: true,
            event_capacity: 100,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sync: SyncSettings,
    pub player: PlayerSettings,
    pub logging: LoggingConfig,
}

/// Command-line configuration overrides
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub poll_interval_ms: Option<u64>,
    pub log_level: Option<String>,
}

impl Config {
    /// Load configuration from the resolved TOML file, or defaults
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed, or if
    /// the merged configuration fails validation.
    pub async fn load(cli_path: Option<&Path>, overrides: ConfigOverrides) -> Result<Self> {
        let resolved = ConfigResolver::new().resolve(cli_path);

        let mut config = match resolved {
            Some((path, source)) => {
                let config = Self::from_file(&path).await?;
                info!("Loaded configuration from {:?} ({:?})", path, source);
                config
            }
            None => {
                info!("No configuration file found, using built-in defaults");
                Self::default()
            }
        };

        config.apply_overrides(overrides);
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file without validating it
    pub async fn from_file(path: &Path) -> Result<Self> {
        Ok(read_toml(path).await?)
    }

    /// Parse configuration from a TOML string without validating it
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))
    }

    /// Apply command-line overrides on top of file values
    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(interval) = overrides.poll_interval_ms {
            self.sync.poll_interval_ms = interval;
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
    }

    /// Reject values the sync loop cannot run with
    pub fn validate(&self) -> Result<()> {
        let sync = &self.sync;
        if sync.poll_interval_ms == 0 {
            return Err(Error::Config("sync.poll_interval_ms must be greater than 0".into()));
        }
        if sync.max_in_sync_ms >= sync.extreme_out_of_sync_ms {
            return Err(Error::Config(format!(
                "sync.max_in_sync_ms ({}) must be below sync.extreme_out_of_sync_ms ({})",
                sync.max_in_sync_ms, sync.extreme_out_of_sync_ms
            )));
        }
        if !sync.catch_up_rate.is_finite() || sync.catch_up_rate <= 1.0 {
            return Err(Error::Config(format!(
                "sync.catch_up_rate must be greater than 1.0, got {}",
                sync.catch_up_rate
            )));
        }
        if sync.status_timeout_ms == Some(0) {
            return Err(Error::Config("sync.status_timeout_ms must be greater than 0".into()));
        }
        if self.player.event_capacity == 0 {
            return Err(Error::Config("player.event_capacity must be greater than 0".into()));
        }
        Ok(())
    }
}
