use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

const TICK: Duration = Duration::from_secs(1);

/// One-second countdown that fires a callback once at zero.
///
/// Starting again cancels the running countdown first. Dropping the timer cancels it,
/// so callbacks never run against a disposed attempt.
#[derive(Debug, Default)]
pub struct SessionTimer {
    remaining: Arc<AtomicU32>,
    handle: Option<JoinHandle<()>>,
}

impl SessionTimer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start counting down from `duration_secs`.
    ///
    /// A zero duration invokes `on_timeout` immediately, on the caller's thread.
    /// Otherwise must be called inside a tokio runtime.
    pub fn start<F>(&mut self, duration_secs: u32, on_timeout: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.start_with_ticks(duration_secs, |_| {}, on_timeout);
    }

    /// Like [`SessionTimer::start`], also reporting the remaining seconds after every tick.
    pub fn start_with_ticks<T, F>(&mut self, duration_secs: u32, mut on_tick: T, on_timeout: F)
    where
        T: FnMut(u32) + Send + 'static,
        F: FnOnce() + Send + 'static,
    {
        self.stop();

        // Fresh counter per run so a cancelled task can never write into this one.
        let remaining = Arc::new(AtomicU32::new(duration_secs));
        self.remaining = Arc::clone(&remaining);

        if duration_secs == 0 {
            on_timeout();
            return;
        }

        self.handle = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + TICK, TICK);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let left = remaining.load(Ordering::Acquire).saturating_sub(1);
                remaining.store(left, Ordering::Release);
                on_tick(left);
                if left == 0 {
                    on_timeout();
                    break;
                }
            }
        }));
    }

    /// Cancel the countdown. No-op if nothing is running.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.remaining.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for SessionTimer {
    fn drop(&mut self) {
        self.stop();
    }
}
