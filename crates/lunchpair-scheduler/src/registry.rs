//! Timer registry: one live cron timer per registered rule.
//!
//! Each timer is a tokio task that sleeps until the next matching minute and
//! then spawns the rule's firing as its own task, so aborting a timer never
//! cancels a round already in progress.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use lunchpair_core::Result;
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::cron::CronSchedule;

/// Work run on every tick of a rule's timer.
pub type FireFn = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Opaque registration handle, for introspection and logging only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TimerHandle(u64);

impl fmt::Display for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer-{}", self.0)
    }
}

/// Snapshot of one registered timer.
#[derive(Debug, Clone, Serialize)]
pub struct TimerInfo {
    pub handle: TimerHandle,
    pub rule_id: u64,
    pub expression: String,
    pub next_fire: Option<DateTime<Utc>>,
}

struct TimerEntry {
    handle: TimerHandle,
    expression: String,
    schedule: CronSchedule,
    task: JoinHandle<()>,
}

/// Registered timers keyed by rule ID.
#[derive(Default)]
pub struct TimerRegistry {
    entries: HashMap<u64, TimerEntry>,
    next_handle: u64,
}

impl TimerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a timer for `rule_id`. A rule already registered keeps its
    /// timer and gets its existing handle back. Must run inside a tokio runtime.
    pub fn register(&mut self, rule_id: u64, expression: &str, fire: FireFn) -> Result<TimerHandle> {
        if let Some(entry) = self.entries.get(&rule_id) {
            tracing::debug!("Schedule {rule_id} already registered as {}", entry.handle);
            return Ok(entry.handle);
        }

        let schedule = CronSchedule::parse(expression)?;
        self.next_handle += 1;
        let handle = TimerHandle(self.next_handle);
        let task = tokio::spawn(run_timer(rule_id, schedule.clone(), fire));

        self.entries.insert(
            rule_id,
            TimerEntry {
                handle,
                expression: expression.to_string(),
                schedule,
                task,
            },
        );
        tracing::info!("📅 Schedule {rule_id} registered as {handle}: '{expression}'");
        Ok(handle)
    }

    pub fn contains(&self, rule_id: u64) -> bool {
        self.entries.contains_key(&rule_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All timers, ordered by rule ID.
    pub fn timers(&self) -> Vec<TimerInfo> {
        let now = Utc::now();
        let mut timers: Vec<TimerInfo> = self
            .entries
            .iter()
            .map(|(&rule_id, entry)| TimerInfo {
                handle: entry.handle,
                rule_id,
                expression: entry.expression.clone(),
                next_fire: entry.schedule.next_after(now),
            })
            .collect();
        timers.sort_by_key(|t| t.rule_id);
        timers
    }

    /// Stop every timer. Returns how many were stopped.
    pub fn shutdown(&mut self) -> usize {
        let count = self.entries.len();
        for (_, entry) in self.entries.drain() {
            entry.task.abort();
        }
        count
    }
}

impl Drop for TimerRegistry {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn run_timer(rule_id: u64, schedule: CronSchedule, fire: FireFn) {
    loop {
        let now = Utc::now();
        let Some(next) = schedule.next_after(now) else {
            tracing::warn!("⚠️ Schedule {rule_id} has no future fire time, timer stopped");
            return;
        };
        let wait = (next - now).to_std().unwrap_or_default();
        tracing::debug!("⏰ Schedule {rule_id} next fires at {next} (in {}s)", wait.as_secs());
        tokio::time::sleep(wait).await;

        tokio::spawn(fire());
    }
}
