//! Cancellable repeating background task
//!
//! Wraps a spawned tokio task together with its cancellation token. Dropping
//! the handle cancels the task, so every exit path of the owner stops it.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Handle to a repeating task spawned with [`ScheduledTask::repeating`]
pub struct ScheduledTask {
    name: &'static str,
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl ScheduledTask {
    /// Spawn `tick` every `period`, first run one period from now
    ///
    /// Each tick is awaited to completion before the next one can start, so
    /// ticks never overlap. A slow tick delays the following ones instead of
    /// causing a burst. The tick receives the task's token so it can notice a
    /// cancellation that arrived while it was suspended.
    ///
    /// Must be called from within a tokio runtime.
    pub fn repeating<F, Fut>(name: &'static str, period: Duration, mut tick: F) -> Self
    where
        F: FnMut(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let task_token = token.clone();

        let handle = tokio::spawn(async move {
            let mut timer = interval_at(Instant::now() + period, period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

            debug!("{} task started ({}ms interval)", name, period.as_millis());

            loop {
                tokio::select! {
                    biased;
                    _ = task_token.cancelled() => break,
                    _ = timer.tick() => tick(task_token.clone()).await,
                }
            }

            debug!("{} task stopped", name);
        });

        Self {
            name,
            token,
            handle: Some(handle),
        }
    }

    /// Task name used in log output
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Stop scheduling further ticks
    ///
    /// A tick already in progress runs to its next await point that checks
    /// the token; no new tick starts after this returns.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Task has exited (cancelled and drained, or panicked)
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Cancel and wait for the task to exit
    pub async fn shutdown(mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
