//! Collaborator traits consumed by the scheduler.
//!
//! Each is a narrow in-process boundary: the SQLite store and the SMTP
//! mailer in `lunchpair-scheduler` implement them for production, tests
//! plug in recording doubles.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};

use crate::error::Result;
use crate::types::{LeftoverNotice, MatchPair, PairNotice, Participant, RecurrenceRule, UserContact};

/// Recurrence rules and rosters.
#[async_trait]
pub trait RecurrenceStore: Send + Sync {
    async fn list_rules(&self) -> Result<Vec<RecurrenceRule>>;

    /// Returns `LunchError::NotFound` for an unknown ID.
    async fn get_rule(&self, id: u64) -> Result<RecurrenceRule>;

    async fn list_org_rules(&self, org_id: u64) -> Result<Vec<RecurrenceRule>>;

    async fn create_rule(&self, org_id: u64, expression: &str) -> Result<RecurrenceRule>;

    async fn list_participants(&self, schedule_id: u64) -> Result<Vec<Participant>>;

    async fn add_participant(&self, schedule_id: u64, user_id: u64) -> Result<Participant>;
}

/// Durable record of computed pairs.
#[async_trait]
pub trait MatchStore: Send + Sync {
    /// Write the whole batch as one unit.
    /// Fewer committed rows than pairs is `LunchError::PartialWrite`.
    async fn save_batch(&self, pairs: &[MatchPair]) -> Result<()>;
}

/// User lookup keyed by user ID.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Unknown IDs are simply absent from the map.
    async fn resolve_many(&self, user_ids: &HashSet<u64>) -> Result<HashMap<u64, UserContact>>;

    /// Returns `LunchError::NotFound` for an unknown ID.
    async fn resolve_one(&self, user_id: u64) -> Result<UserContact>;
}

/// Outbound mail dispatch.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_pair_notice(&self, notice: &PairNotice) -> Result<()>;

    async fn send_leftover_notice(&self, notice: &LeftoverNotice) -> Result<()>;
}
