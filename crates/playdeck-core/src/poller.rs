//! Clock poller
//!
//! While playing, elapsed time is sampled every 200 ms and pushed to the
//! widgets. At most one poll task runs per poller.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{trace, warn};

/// Sampling period while playing
pub const POLL_PERIOD: Duration = Duration::from_millis(200);

/// Work done on every poll tick
pub trait Tick: Send + Sync + 'static {
    fn tick(&self);
}

/// Periodic sampler with a single active task
pub struct ClockPoller {
    period: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ClockPoller {
    pub fn new() -> Self {
        Self::with_period(POLL_PERIOD)
    }

    pub fn with_period(period: Duration) -> Self {
        Self {
            period,
            task: Mutex::new(None),
        }
    }

    fn task(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        match self.task.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Start polling with an immediate first tick
    ///
    /// Returns `false` when a poll task is already running, or when there is
    /// no runtime to run one on.
    pub fn start(&self, target: Arc<dyn Tick>) -> bool {
        self.spawn(target, Duration::ZERO)
    }

    /// Start polling, skipping the tick that would fire right away
    pub fn start_deferred(&self, target: Arc<dyn Tick>) -> bool {
        self.spawn(target, self.period)
    }

    fn spawn(&self, target: Arc<dyn Tick>, first_delay: Duration) -> bool {
        let mut task = self.task();
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return false;
        }

        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                warn!(error = %e, "No runtime to poll the clock on");
                return false;
            }
        };

        let period = self.period;
        *task = Some(runtime.spawn(async move {
            let mut interval = interval_at(Instant::now() + first_delay, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                target.tick();
            }
        }));

        trace!(period_ms = period.as_millis() as u64, "Clock poller started");
        true
    }

    /// Stop polling; returns whether a task was running
    pub fn stop(&self) -> bool {
        match self.task().take() {
            Some(handle) => {
                let was_running = !handle.is_finished();
                handle.abort();
                trace!("Clock poller stopped");
                was_running
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.task().as_ref().is_some_and(|handle| !handle.is_finished())
    }
}

impl Default for ClockPoller {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ClockPoller {
    fn drop(&mut self) {
        self.stop();
    }
}
