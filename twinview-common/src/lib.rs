//! # Twinview Common Library
//!
//! Shared code for the Twinview paired-player crates:
//! - Event types (PlayerEvent enum) and the EventBus
//! - Configuration file resolution
//! - Error types
//! - Time formatting helpers

pub mod config;
pub mod error;
pub mod events;
pub mod time;

pub use error::{Error, Result};
pub use events::{EventBus, PlaybackState, PlayerEvent};
