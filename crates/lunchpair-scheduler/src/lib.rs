//! # Lunchpair Scheduler
//!
//! Recurring lunch-match rounds for organizations.
//!
//! ## Architecture
//! ```text
//! SchedulerEngine
//!   ├── TimerRegistry: one cron timer per schedule ("0 12 * * MON,WED")
//!   └── on tick → RoundRunner.fire(schedule)
//!                   ├── RecurrenceStore.list_participants
//!                   ├── matching::compute_round (random pairs + leftover)
//!                   ├── MatchStore.save_batch (all or nothing)
//!                   └── Notifier → Mailer (one email per recipient)
//! ```
//!
//! Production collaborators: `SqliteStore` (rules, rosters, matches, users)
//! and `SmtpMailer` / `LogMailer`.

pub mod cron;
pub mod dispatch;
pub mod engine;
pub mod matching;
pub mod notify;
pub mod persistence;
pub mod registry;
pub mod rules;

#[cfg(test)]
mod testing;

pub use dispatch::{LogMailer, SmtpMailer, mailer_from_config};
pub use engine::{Collaborators, RoundOutcome, RoundRunner, SchedulerEngine};
pub use matching::{Round, compute_round};
pub use notify::{Notifier, NotifyReport};
pub use persistence::SqliteStore;
pub use registry::{TimerHandle, TimerInfo, TimerRegistry};
