//! Domain types: the data model shared by the store, the matcher and the notifier.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::LunchError;

/// A stored recurrence: when an organization's matching round fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceRule {
    /// Unique rule (schedule) ID.
    pub id: u64,
    /// Owning organization.
    pub org_id: u64,
    /// Five-field cron expression: "MIN HOUR DOM MON DOW".
    pub expression: String,
    pub created_at: Option<DateTime<Utc>>,
}

/// One user's opt-in to one rule's rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Participant {
    pub user_id: u64,
    pub schedule_id: u64,
}

impl Participant {
    pub fn new(user_id: u64, schedule_id: u64) -> Self {
        Self {
            user_id,
            schedule_id,
        }
    }
}

/// Two users matched in one round of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchPair {
    pub user_id_1: u64,
    pub user_id_2: u64,
    pub schedule_id: u64,
}

impl MatchPair {
    /// Both user IDs, in pair order.
    pub fn members(&self) -> [u64; 2] {
        [self.user_id_1, self.user_id_2]
    }

    pub fn contains(&self, user_id: u64) -> bool {
        self.user_id_1 == user_id || self.user_id_2 == user_id
    }
}

/// Resolved display name and address for a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserContact {
    pub user_id: u64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

/// Mail sent to one member of a pair, naming their partner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairNotice {
    pub to_email: String,
    pub first_name: String,
    pub partner_first_name: String,
    pub partner_last_name: String,
}

/// Mail sent to the participant left without a partner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeftoverNotice {
    pub to_email: String,
    pub first_name: String,
}

/// Inbound request to schedule rounds for an organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleRequest {
    pub org_id: u64,
    /// Weekday tokens: SUN, MON, TUE, WED, THU, FRI, SAT.
    pub days: Vec<String>,
}

/// Day of week, in cron order (SUN = 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Weekday {
    Sun,
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
}

impl Weekday {
    pub const ALL: [Weekday; 7] = [
        Weekday::Sun,
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
    ];

    /// Cron token, e.g. "MON".
    pub fn token(&self) -> &'static str {
        match self {
            Weekday::Sun => "SUN",
            Weekday::Mon => "MON",
            Weekday::Tue => "TUE",
            Weekday::Wed => "WED",
            Weekday::Thu => "THU",
            Weekday::Fri => "FRI",
            Weekday::Sat => "SAT",
        }
    }

    /// Days since Sunday.
    pub fn number(&self) -> u32 {
        *self as u32
    }

    pub fn from_number(n: u32) -> Option<Self> {
        // Cron accepts both 0 and 7 for Sunday.
        match n {
            7 => Some(Weekday::Sun),
            n => Self::ALL.get(n as usize).copied(),
        }
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for Weekday {
    type Err = LunchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|d| d.token() == upper)
            .ok_or_else(|| LunchError::Validation(format!("unknown weekday '{s}'")))
    }
}

impl From<chrono::Weekday> for Weekday {
    fn from(day: chrono::Weekday) -> Self {
        Self::ALL[day.num_days_from_sunday() as usize]
    }
}
