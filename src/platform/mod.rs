//! Host services shared by every component
//!
//! - [`Clock`] for epoch-millisecond time
//! - [`Store`] for the persisted key-value state
//! - [`Scheduler`] for named one-shot alarms

mod alarms;
mod store;

pub use alarms::{Scheduler, TokioAlarms};
pub use store::{JsonFileStore, MemoryStore, Store, IS_LOGGED_IN, TOKEN, TOKEN_EXPIRY};

#[cfg(test)]
pub use alarms::RecordingScheduler;

/// Wall-clock time source in epoch milliseconds
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

/// The real system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// A clock that only moves when told to.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct ManualClock {
    now: std::sync::atomic::AtomicI64,
}

#[cfg(test)]
impl ManualClock {
    pub fn at(now_ms: i64) -> Self {
        Self { now: std::sync::atomic::AtomicI64::new(now_ms) }
    }

    pub fn advance(&self, ms: i64) {
        self.now.fetch_add(ms, std::sync::atomic::Ordering::SeqCst);
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.load(std::sync::atomic::Ordering::SeqCst)
    }
}
