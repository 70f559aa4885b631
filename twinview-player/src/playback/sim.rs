//! Simulated engine pair
//!
//! A [`PlaybackHandle`] backed by two virtual clocks instead of platform
//! video engines. Used by the demo binary and the tests. Each engine
//! advances with `tokio::time`, so paused-clock tests are deterministic.
//!
//! The secondary clock can be given a skew factor to model an engine that
//! decodes slightly fast or slow; the reported rate stays the commanded one.
//! A looping engine wraps to the start at the end of the media instead of
//! stopping there.

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

use super::handle::PlaybackHandle;
use super::types::{Engine, LoadOptions, MediaSource, PlaybackStatus, SyncSnapshot};
use crate::error::{Error, Result};

/// Calls received by the simulated pair, in order
#[derive(Debug, Clone, PartialEq)]
pub enum HandleCall {
    Play,
    Pause,
    SetPosition(u64),
    SetSecondaryRate(f64),
    PauseSecondary,
    PlaySecondary,
    Load(String),
    Unload,
    GetStatus,
}

/// Virtual clock of one engine
#[derive(Debug, Clone)]
struct EngineClock {
    /// Position at `anchor` (milliseconds)
    base_ms: f64,
    /// Set while playing
    anchor: Option<Instant>,
    /// Commanded rate
    rate: f64,
    /// Multiplier on the commanded rate
    skew: f64,
    looping: bool,
}

impl EngineClock {
    fn new(skew: f64) -> Self {
        Self {
            base_ms: 0.0,
            anchor: None,
            rate: 1.0,
            skew,
            looping: false,
        }
    }

    fn position_ms(&self, now: Instant, duration_ms: u64) -> f64 {
        let position = match self.anchor {
            Some(anchor) => {
                let elapsed = now.saturating_duration_since(anchor).as_secs_f64() * 1000.0;
                self.base_ms + elapsed * self.rate * self.skew
            }
            None => self.base_ms,
        };
        let duration = duration_ms as f64;
        if self.looping && duration_ms > 0 && position >= duration {
            position.rem_euclid(duration)
        } else {
            position.clamp(0.0, duration)
        }
    }

    /// Fold elapsed time into the base so rate or state can change
    fn rebase(&mut self, now: Instant, duration_ms: u64) {
        self.base_ms = self.position_ms(now, duration_ms);
        if self.anchor.is_some() {
            self.anchor = Some(now);
        }
    }

    fn play(&mut self, now: Instant, duration_ms: u64) {
        self.rebase(now, duration_ms);
        self.anchor.get_or_insert(now);
    }

    fn pause(&mut self, now: Instant, duration_ms: u64) {
        self.rebase(now, duration_ms);
        self.anchor = None;
    }

    fn seek(&mut self, now: Instant, position_ms: u64) {
        self.base_ms = position_ms as f64;
        if self.anchor.is_some() {
            self.anchor = Some(now);
        }
    }

    fn set_rate(&mut self, now: Instant, duration_ms: u64, rate: f64) {
        self.rebase(now, duration_ms);
        self.rate = rate;
    }

    fn reset(&mut self) {
        *self = Self::new(self.skew);
    }

    fn is_playing(&self) -> bool {
        self.anchor.is_some()
    }
}

#[derive(Debug)]
struct SimState {
    source: Option<String>,
    options: LoadOptions,
    duration_ms: u64,
    duration_known: bool,
    primary: EngineClock,
    secondary: EngineClock,
    failing_status: u32,
    fail_set_position: bool,
    fail_secondary_rate: bool,
    fail_pause_secondary: bool,
    fail_load: bool,
    status_delay: Option<Duration>,
    calls: Vec<HandleCall>,
}

impl SimState {
    fn clock_mut(&mut self, engine: Engine) -> &mut EngineClock {
        match engine {
            Engine::Primary => &mut self.primary,
            Engine::Secondary => &mut self.secondary,
        }
    }

    fn require_loaded(&self) -> Result<()> {
        if self.source.is_none() {
            return Err(Error::Command("no source loaded".into()));
        }
        Ok(())
    }

    fn status(&self, now: Instant) -> SyncSnapshot {
        let duration = self.duration_ms;
        let reported = if self.duration_known { duration } else { 0 };
        let status = |clock: &EngineClock| {
            PlaybackStatus::new(clock.position_ms(now, duration).round() as u64, reported, clock.rate)
        };
        SyncSnapshot::new(status(&self.primary), status(&self.secondary))
    }
}

/// Two simulated engines behind one handle
pub struct SimulatedPair {
    state: Mutex<SimState>,
}

impl SimulatedPair {
    /// Pair whose media lasts `duration_ms`, both clocks running true
    pub fn new(duration_ms: u64) -> Self {
        Self::with_secondary_skew(duration_ms, 1.0)
    }

    /// Pair whose secondary clock runs at `skew` times the commanded rate
    pub fn with_secondary_skew(duration_ms: u64, skew: f64) -> Self {
        Self {
            state: Mutex::new(SimState {
                source: None,
                options: LoadOptions::default(),
                duration_ms,
                duration_known: true,
                primary: EngineClock::new(1.0),
                secondary: EngineClock::new(skew),
                failing_status: 0,
                fail_set_position: false,
                fail_secondary_rate: false,
                fail_pause_secondary: false,
                fail_load: false,
                status_delay: None,
                calls: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Calls received so far
    pub fn calls(&self) -> Vec<HandleCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Count of calls matching `call`
    pub fn count(&self, call: &HandleCall) -> usize {
        self.lock().calls.iter().filter(|c| *c == call).count()
    }

    /// Make the next `n` status queries fail
    pub fn fail_next_status(&self, n: u32) {
        self.lock().failing_status = n;
    }

    pub fn fail_set_position(&self, fail: bool) {
        self.lock().fail_set_position = fail;
    }

    pub fn fail_secondary_rate(&self, fail: bool) {
        self.lock().fail_secondary_rate = fail;
    }

    pub fn fail_pause_secondary(&self, fail: bool) {
        self.lock().fail_pause_secondary = fail;
    }

    pub fn fail_load(&self, fail: bool) {
        self.lock().fail_load = fail;
    }

    /// Delay every status query by `delay`
    pub fn set_status_delay(&self, delay: Option<Duration>) {
        self.lock().status_delay = delay;
    }

    /// Report a duration of 0 until metadata "loads"
    pub fn set_duration_known(&self, known: bool) {
        self.lock().duration_known = known;
    }

    /// Shift the secondary clock by `offset_ms` without logging a call
    ///
    /// A negative offset past the start reads as position 0 until the clock
    /// catches up.
    pub fn offset_secondary(&self, offset_ms: i64) {
        let mut state = self.lock();
        let now = Instant::now();
        let duration = state.duration_ms;
        state.secondary.rebase(now, duration);
        state.secondary.base_ms += offset_ms as f64;
    }

    /// Current positions without logging a call
    pub fn peek(&self) -> SyncSnapshot {
        self.lock().status(Instant::now())
    }

    pub fn is_playing(&self, engine: Engine) -> bool {
        self.lock().clock_mut(engine).is_playing()
    }

    /// Options given to the last successful load
    pub fn load_options(&self) -> LoadOptions {
        self.lock().options
    }

    pub fn source(&self) -> Option<String> {
        self.lock().source.clone()
    }
}

#[async_trait]
impl PlaybackHandle for SimulatedPair {
    async fn play(&self) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(HandleCall::Play);
        state.require_loaded()?;
        let (now, duration) = (Instant::now(), state.duration_ms);
        state.secondary.play(now, duration);
        state.primary.play(now, duration);
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(HandleCall::Pause);
        state.require_loaded()?;
        let (now, duration) = (Instant::now(), state.duration_ms);
        state.primary.pause(now, duration);
        state.secondary.pause(now, duration);
        Ok(())
    }

    async fn set_position(&self, position_ms: u64) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(HandleCall::SetPosition(position_ms));
        state.require_loaded()?;
        if state.fail_set_position {
            return Err(Error::Command(format!("seek to {}ms rejected", position_ms)));
        }
        let now = Instant::now();
        let target = position_ms.min(state.duration_ms);
        state.primary.seek(now, target);
        state.secondary.seek(now, target);
        Ok(())
    }

    async fn set_secondary_rate(&self, rate: f64) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(HandleCall::SetSecondaryRate(rate));
        state.require_loaded()?;
        if state.fail_secondary_rate {
            return Err(Error::Command(format!("secondary rate {} rejected", rate)));
        }
        let (now, duration) = (Instant::now(), state.duration_ms);
        state.secondary.set_rate(now, duration, rate);
        Ok(())
    }

    async fn pause_secondary(&self) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(HandleCall::PauseSecondary);
        state.require_loaded()?;
        if state.fail_pause_secondary {
            return Err(Error::Command("secondary pause rejected".into()));
        }
        let (now, duration) = (Instant::now(), state.duration_ms);
        state.secondary.pause(now, duration);
        Ok(())
    }

    async fn play_secondary(&self) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(HandleCall::PlaySecondary);
        state.require_loaded()?;
        let (now, duration) = (Instant::now(), state.duration_ms);
        state.secondary.play(now, duration);
        Ok(())
    }

    async fn load(&self, source: &MediaSource, options: &LoadOptions) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(HandleCall::Load(source.uri.clone()));
        if state.fail_load {
            return Err(Error::Load(format!("unsupported source: {}", source)));
        }
        state.primary.reset();
        state.secondary.reset();
        state.primary.looping = options.primary.looping;
        state.secondary.looping = options.secondary.looping;
        state.source = Some(source.uri.clone());
        state.options = *options;
        Ok(())
    }

    async fn unload(&self) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(HandleCall::Unload);
        state.primary.reset();
        state.secondary.reset();
        state.source = None;
        Ok(())
    }

    async fn get_status(&self) -> Result<SyncSnapshot> {
        let delay = {
            let mut state = self.lock();
            state.calls.push(HandleCall::GetStatus);
            state.status_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.lock();
        if state.failing_status > 0 {
            state.failing_status -= 1;
            return Err(Error::StatusUnavailable("engine not ready".into()));
        }
        if state.source.is_none() {
            return Err(Error::StatusUnavailable("no source loaded".into()));
        }
        Ok(state.status(Instant::now()))
    }
}
