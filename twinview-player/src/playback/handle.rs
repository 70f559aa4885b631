//! Capability interface over the two underlying video engines
//!
//! The platform video primitives live outside this crate. The paired player
//! and the sync loop only ever address the engines through this trait, and
//! each engine pair is owned by exactly one handle.

use super::types::{LoadOptions, MediaSource, SyncSnapshot};
use crate::error::Result;
use async_trait::async_trait;

/// Playback primitives for a pair of video engines
///
/// Every call suspends the caller until the engines respond.
#[async_trait]
pub trait PlaybackHandle: Send + Sync {
    /// Start both engines, secondary first, then primary
    ///
    /// Starting the secondary first gives tighter initial alignment. Both
    /// starts must have completed when the future resolves.
    async fn play(&self) -> Result<()>;

    /// Pause both engines
    async fn pause(&self) -> Result<()>;

    /// Seek both engines to `position_ms` concurrently
    async fn set_position(&self, position_ms: u64) -> Result<()>;

    /// Change only the secondary engine's playback rate
    async fn set_secondary_rate(&self, rate: f64) -> Result<()>;

    /// Pause only the secondary engine
    async fn pause_secondary(&self) -> Result<()>;

    /// Resume only the secondary engine
    async fn play_secondary(&self) -> Result<()>;

    /// Bind a source to both engines with independent per-engine options
    async fn load(&self, source: &MediaSource, options: &LoadOptions) -> Result<()>;

    /// Release the bound source from both engines
    async fn unload(&self) -> Result<()>;

    /// Query both engines concurrently and return the paired observation
    async fn get_status(&self) -> Result<SyncSnapshot>;
}
