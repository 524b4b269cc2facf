use chrono::{Local, NaiveDateTime, Timelike};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, MissedTickBehavior};

pub trait Clock: Send + Sync {
    /// Local wall-clock time
    fn now(&self) -> NaiveDateTime;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Lets at most one invocation run at a time.
#[derive(Clone, Default)]
struct SingleFlight(Arc<AtomicBool>);

impl SingleFlight {
    fn try_acquire(&self) -> Option<FlightGuard> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlightGuard(self.0.clone()))
    }
}

/// Releases the gate on drop, including when the task panics.
struct FlightGuard(Arc<AtomicBool>);

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Runs a task once right away, then at the start of every wall-clock minute.
///
/// A minute boundary is skipped when the previous invocation is still
/// running, and boundaries missed while the process was stalled are not
/// made up later.
pub struct MinuteScheduler {
    clock: Arc<dyn Clock>,
    gate: SingleFlight,
}

impl MinuteScheduler {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            gate: SingleFlight::default(),
        }
    }

    /// Never returns; stop it by dropping the future.
    pub async fn run<F, Fut>(&self, task: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let task = Arc::new(task);

        tracing::info!("Running initial check");
        task().await;

        let mut ticker = time::interval(Duration::from_secs(1));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_fired: Option<NaiveDateTime> = None;

        tracing::info!("Scheduler started, checking at the start of every minute");

        loop {
            ticker.tick().await;

            let now = self.clock.now();
            if now.second() != 0 {
                continue;
            }

            let minute = now.with_nanosecond(0).unwrap_or(now);
            if last_fired == Some(minute) {
                continue;
            }
            last_fired = Some(minute);

            let Some(guard) = self.gate.try_acquire() else {
                tracing::warn!(
                    "Previous check still running, skipping {}",
                    minute.format("%H:%M")
                );
                continue;
            };

            tracing::debug!("Minute boundary {}, starting check", minute.format("%H:%M"));
            let task = task.clone();
            tokio::spawn(async move {
                let _guard = guard;
                task().await;
            });
        }
    }
}

impl Default for MinuteScheduler {
    fn default() -> Self {
        Self::new()
    }
}
