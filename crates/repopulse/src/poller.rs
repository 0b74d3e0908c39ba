//! Fixed-interval refresh timer for one repository.

use std::future::Future;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};

use crate::analytics::RepositoryId;

/// Default time between poll ticks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Owns at most one running poll task.
///
/// Starting a new target aborts the previous task first. Dropping the poller
/// aborts its task. Tasks are spawned on the runtime the poller is bound to,
/// so `start` may be called from threads outside that runtime.
#[derive(Debug)]
pub struct Poller {
    runtime: Option<Handle>,
    active: Option<ActivePoll>,
}

#[derive(Debug)]
struct ActivePoll {
    target: RepositoryId,
    interval: Duration,
    handle: JoinHandle<()>,
}

impl Default for Poller {
    fn default() -> Self {
        Self::new()
    }
}

impl Poller {
    /// A poller bound to the current runtime, if there is one.
    pub fn new() -> Self {
        Self {
            runtime: Handle::try_current().ok(),
            active: None,
        }
    }

    pub fn with_runtime(runtime: Handle) -> Self {
        Self {
            runtime: Some(runtime),
            active: None,
        }
    }

    /// Bind to the current runtime unless already bound.
    pub fn bind_current_runtime(&mut self) {
        if self.runtime.is_none() {
            self.runtime = Handle::try_current().ok();
        }
    }

    /// Run `tick(target)` every `interval`, first one `interval` from now.
    ///
    /// Ticks never overlap: a slow tick delays the next one. Returns `false`
    /// without starting anything when no runtime is available.
    pub fn start<F, Fut>(&mut self, target: RepositoryId, interval: Duration, tick: F) -> bool
    where
        F: Fn(RepositoryId) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.stop();
        self.bind_current_runtime();
        let Some(runtime) = self.runtime.as_ref() else {
            tracing::warn!(repo = %target, "No tokio runtime to poll on; poller not started");
            return false;
        };

        let period = interval.max(Duration::from_millis(1));
        let task_target = target.clone();
        let handle = runtime.spawn(async move {
            let mut timer = interval_at(Instant::now() + period, period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                timer.tick().await;
                tracing::debug!(repo = %task_target, "Poll tick");
                tick(task_target.clone()).await;
            }
        });

        tracing::debug!(repo = %target, interval_secs = period.as_secs(), "Poller started");
        self.active = Some(ActivePoll {
            target,
            interval: period,
            handle,
        });
        true
    }

    /// Abort the running task, if any.
    pub fn stop(&mut self) {
        if let Some(active) = self.active.take() {
            active.handle.abort();
            tracing::debug!(repo = %active.target, "Poller stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| !active.handle.is_finished())
    }

    /// Repository being polled.
    pub fn target(&self) -> Option<&RepositoryId> {
        self.active.as_ref().map(|active| &active.target)
    }

    pub fn interval(&self) -> Option<Duration> {
        self.active.as_ref().map(|active| active.interval)
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop();
    }
}
