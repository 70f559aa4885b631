//! twinview-player library
//!
//! Keeps two video engines playing the same source in lockstep. The
//! [`PairedPlayer`] exposes play/pause/seek/load/unload; while playing, a
//! background sync loop polls both engines and nudges the secondary back
//! into alignment with the primary.

pub mod config;
pub mod error;
pub mod playback;
pub mod state;

pub use config::Config;
pub use error::{Error, Result};
pub use playback::PairedPlayer;
pub use state::SharedState;
