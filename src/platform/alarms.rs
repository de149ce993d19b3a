//! Named one-shot alarms
//!
//! At most one alarm exists per name; creating an alarm under a name that is
//! already scheduled replaces it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::Clock;

/// Longest single sleep before the wall clock is checked again. Keeps alarms
/// honest across suspend, where the monotonic timer stops but wall time moves on.
const MAX_NAP: Duration = Duration::from_secs(30);

pub trait Scheduler: Send + Sync {
    /// Schedule `name` to fire at `when_ms` (epoch milliseconds), replacing any earlier alarm
    fn create(&self, name: &str, when_ms: i64);

    /// Cancel `name` if it is scheduled
    fn clear(&self, name: &str);
}

/// Alarms backed by tokio tasks; firing sends the alarm name down a channel
pub struct TokioAlarms {
    clock: Arc<dyn Clock>,
    fired: mpsc::UnboundedSender<String>,
    tasks: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl TokioAlarms {
    pub fn new(clock: Arc<dyn Clock>, fired: mpsc::UnboundedSender<String>) -> Self {
        Self {
            clock,
            fired,
            tasks: Mutex::new(HashMap::new()),
        }
    }

    #[cfg(test)]
    pub fn is_scheduled(&self, name: &str) -> bool {
        self.tasks
            .lock()
            .map(|tasks| tasks.get(name).is_some_and(|t| !t.is_finished()))
            .unwrap_or(false)
    }
}

impl Scheduler for TokioAlarms {
    fn create(&self, name: &str, when_ms: i64) {
        let clock = self.clock.clone();
        let fired = self.fired.clone();
        let alarm = name.to_string();

        let task = tokio::spawn(async move {
            loop {
                let remaining = when_ms - clock.now_ms();
                if remaining <= 0 {
                    break;
                }
                let nap = Duration::from_millis(remaining as u64).min(MAX_NAP);
                tokio::time::sleep(nap).await;
            }
            debug!("Alarm {} fired", alarm);
            if fired.send(alarm).is_err() {
                warn!("Alarm fired after its receiver went away");
            }
        });

        match self.tasks.lock() {
            Ok(mut tasks) => {
                if let Some(previous) = tasks.insert(name.to_string(), task) {
                    previous.abort();
                }
            }
            Err(_) => {
                warn!("Alarm table poisoned, alarm {} is not tracked", name);
            }
        }
    }

    fn clear(&self, name: &str) {
        if let Ok(mut tasks) = self.tasks.lock() {
            if let Some(task) = tasks.remove(name) {
                task.abort();
            }
        }
    }
}

impl Drop for TokioAlarms {
    fn drop(&mut self) {
        if let Ok(tasks) = self.tasks.get_mut() {
            for (_, task) in tasks.drain() {
                task.abort();
            }
        }
    }
}

/// Scheduler that only records what it was asked to do.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingScheduler {
    alarms: Mutex<HashMap<String, i64>>,
    created: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl RecordingScheduler {
    /// Fire time of the alarm currently scheduled under `name`
    pub fn scheduled(&self, name: &str) -> Option<i64> {
        self.alarms.lock().unwrap().get(name).copied()
    }

    /// How many times `create` was called
    pub fn created(&self) -> usize {
        self.created.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
impl Scheduler for RecordingScheduler {
    fn create(&self, name: &str, when_ms: i64) {
        self.created.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.alarms.lock().unwrap().insert(name.to_string(), when_ms);
    }

    fn clear(&self, name: &str) {
        self.alarms.lock().unwrap().remove(name);
    }
}
