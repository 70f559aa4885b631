//! Error types for twinview-player
//!
//! Defines module-specific error types using thiserror for clear error propagation.

use std::time::Duration;
use thiserror::Error;

/// Main error type for the paired player
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file loading or validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// An engine rejected a playback command (play, pause, seek, rate change)
    #[error("Playback command failed: {0}")]
    Command(String),

    /// Binding a media source to the engines failed
    #[error("Load failed: {0}")]
    Load(String),

    /// Engine status could not be read (not ready, unloaded mid-poll)
    #[error("Status unavailable: {0}")]
    StatusUnavailable(String),

    /// Status query did not resolve in time
    #[error("Status query timed out after {0:?}")]
    StatusTimeout(Duration),

    /// Errors from the shared library (config resolution, I/O)
    #[error(transparent)]
    Common(#[from] twinview_common::Error),
}

impl Error {
    /// Poll-side failures that the sync loop absorbs by skipping a tick
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::StatusUnavailable(_) | Error::StatusTimeout(_))
    }
}

/// Convenience Result type using twinview-player Error
pub type Result<T> = std::result::Result<T, Error>;
