//! Paired playback
//!
//! - `handle`: capability interface over the two video engines
//! - `evaluator`: pure drift classification and correction rules
//! - `resync`: the sync loop driving corrections while playing
//! - `player`: public operations and sync loop supervision
//! - `sim`: simulated engine pair for the demo binary and tests

pub mod evaluator;
pub mod handle;
pub mod player;
pub mod resync;
pub mod sim;
pub mod task;
pub mod types;

pub use evaluator::{evaluate, SyncDecision, SyncThresholds};
pub use handle::PlaybackHandle;
pub use player::PairedPlayer;
pub use resync::{ResyncController, TickOutcome};
pub use sim::{HandleCall, SimulatedPair};
pub use types::{Engine, EngineOptions, LoadOptions, MediaSource, PlaybackStatus, SyncSnapshot};
