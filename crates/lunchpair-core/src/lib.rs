//! # Lunchpair Core
//!
//! Shared building blocks for the lunch matching service:
//! domain types, the error taxonomy, TOML configuration, and the narrow
//! collaborator traits the scheduler consumes (recurrence store, match
//! store, user directory, mail dispatch).

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::LunchConfig;
pub use error::{LunchError, Result};
pub use traits::{Mailer, MatchStore, RecurrenceStore, UserDirectory};
pub use types::{
    LeftoverNotice, MatchPair, PairNotice, Participant, RecurrenceRule, ScheduleRequest,
    UserContact, Weekday,
};
