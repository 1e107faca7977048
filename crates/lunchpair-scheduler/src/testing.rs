//! In-memory collaborator doubles for tests.
//! Store, match store and mailer can share one `CallLog` so tests can
//! assert the order of calls across collaborators.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use lunchpair_core::{
    LeftoverNotice, LunchError, Mailer, MatchPair, MatchStore, PairNotice, Participant,
    RecurrenceRule, RecurrenceStore, Result, UserContact, UserDirectory,
};
use tokio::sync::Notify;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListParticipants(u64),
    SaveBatch(Vec<MatchPair>),
    PairNotice { to: String, partner: String },
    LeftoverNotice { to: String },
}

#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<Call>>>);

impl CallLog {
    pub fn push(&self, call: Call) {
        self.0.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }

    pub fn notices(&self) -> usize {
        self.count(|c| matches!(c, Call::PairNotice { .. } | Call::LeftoverNotice { .. }))
    }
}

/// Rules and rosters held in memory.
#[derive(Default)]
pub struct MemoryStore {
    log: CallLog,
    rules: Mutex<Vec<RecurrenceRule>>,
    roster: Mutex<Vec<Participant>>,
    pub fail_rules: AtomicBool,
    pub fail_roster: AtomicBool,
    /// When set, `list_participants` signals `entered` and waits for `release`.
    pub gated: AtomicBool,
    pub entered: Notify,
    pub release: Notify,
}

impl MemoryStore {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            ..Self::default()
        }
    }

    pub fn with_rule(self, id: u64, org_id: u64, expression: &str) -> Self {
        self.rules.lock().unwrap().push(RecurrenceRule {
            id,
            org_id,
            expression: expression.to_string(),
            created_at: None,
        });
        self
    }

    pub fn with_participants(self, schedule_id: u64, users: &[u64]) -> Self {
        self.roster
            .lock()
            .unwrap()
            .extend(users.iter().map(|&u| Participant::new(u, schedule_id)));
        self
    }

    pub fn rule_count(&self) -> usize {
        self.rules.lock().unwrap().len()
    }
}

#[async_trait]
impl RecurrenceStore for MemoryStore {
    async fn list_rules(&self) -> Result<Vec<RecurrenceRule>> {
        if self.fail_rules.load(Ordering::SeqCst) {
            return Err(LunchError::Database("connection refused".into()));
        }
        Ok(self.rules.lock().unwrap().clone())
    }

    async fn get_rule(&self, id: u64) -> Result<RecurrenceRule> {
        if self.fail_rules.load(Ordering::SeqCst) {
            return Err(LunchError::Database("connection refused".into()));
        }
        self.rules
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| LunchError::NotFound(format!("schedule {id}")))
    }

    async fn list_org_rules(&self, org_id: u64) -> Result<Vec<RecurrenceRule>> {
        Ok(self
            .rules
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.org_id == org_id)
            .cloned()
            .collect())
    }

    async fn create_rule(&self, org_id: u64, expression: &str) -> Result<RecurrenceRule> {
        let mut rules = self.rules.lock().unwrap();
        let rule = RecurrenceRule {
            id: rules.iter().map(|r| r.id).max().unwrap_or(0) + 1,
            org_id,
            expression: expression.to_string(),
            created_at: None,
        };
        rules.push(rule.clone());
        Ok(rule)
    }

    async fn list_participants(&self, schedule_id: u64) -> Result<Vec<Participant>> {
        self.log.push(Call::ListParticipants(schedule_id));
        if self.gated.load(Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        if self.fail_roster.load(Ordering::SeqCst) {
            return Err(LunchError::Database("connection refused".into()));
        }
        Ok(self
            .roster
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.schedule_id == schedule_id)
            .copied()
            .collect())
    }

    async fn add_participant(&self, schedule_id: u64, user_id: u64) -> Result<Participant> {
        let participant = Participant::new(user_id, schedule_id);
        self.roster.lock().unwrap().push(participant);
        Ok(participant)
    }
}

/// Match store that records batches and can simulate a short write.
#[derive(Default)]
pub struct RecordingMatchStore {
    log: CallLog,
    saved: Mutex<Vec<MatchPair>>,
    /// Rows reported written, if fewer than submitted.
    pub short_write: Mutex<Option<usize>>,
}

impl RecordingMatchStore {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            ..Self::default()
        }
    }

    pub fn saved(&self) -> Vec<MatchPair> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl MatchStore for RecordingMatchStore {
    async fn save_batch(&self, pairs: &[MatchPair]) -> Result<()> {
        self.log.push(Call::SaveBatch(pairs.to_vec()));
        if let Some(written) = *self.short_write.lock().unwrap() {
            return Err(LunchError::PartialWrite {
                written,
                expected: pairs.len(),
            });
        }
        self.saved.lock().unwrap().extend_from_slice(pairs);
        Ok(())
    }
}

/// Directory of users named by first name; everyone's last name is Smith.
#[derive(Default)]
pub struct MemoryDirectory {
    users: HashMap<u64, UserContact>,
    pub fail: AtomicBool,
}

impl MemoryDirectory {
    pub fn with_users(users: &[(u64, &str)]) -> Self {
        Self {
            users: users
                .iter()
                .map(|&(id, first)| {
                    (
                        id,
                        UserContact {
                            user_id: id,
                            first_name: first.to_string(),
                            last_name: "Smith".to_string(),
                            email: format!("{}@example.com", first.to_lowercase()),
                        },
                    )
                })
                .collect(),
            fail: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl UserDirectory for MemoryDirectory {
    async fn resolve_many(&self, user_ids: &HashSet<u64>) -> Result<HashMap<u64, UserContact>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(LunchError::Database("users unavailable".into()));
        }
        Ok(user_ids
            .iter()
            .filter_map(|id| self.users.get(id).map(|u| (*id, u.clone())))
            .collect())
    }

    async fn resolve_one(&self, user_id: u64) -> Result<UserContact> {
        self.users
            .get(&user_id)
            .cloned()
            .ok_or_else(|| LunchError::NotFound(format!("user {user_id}")))
    }
}

/// Mailer that records every attempt; addresses in `failing` error out.
pub struct RecordingMailer {
    log: CallLog,
    failing: Mutex<HashSet<String>>,
}

impl RecordingMailer {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            failing: Mutex::new(HashSet::new()),
        }
    }

    pub fn fail_for(&self, email: &str) {
        self.failing.lock().unwrap().insert(email.to_string());
    }

    fn outcome(&self, to: &str) -> Result<()> {
        if self.failing.lock().unwrap().contains(to) {
            Err(LunchError::Mail(format!("SMTP send: mailbox {to} unavailable")))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_pair_notice(&self, notice: &PairNotice) -> Result<()> {
        self.log.push(Call::PairNotice {
            to: notice.to_email.clone(),
            partner: format!("{} {}", notice.partner_first_name, notice.partner_last_name),
        });
        self.outcome(&notice.to_email)
    }

    async fn send_leftover_notice(&self, notice: &LeftoverNotice) -> Result<()> {
        self.log.push(Call::LeftoverNotice {
            to: notice.to_email.clone(),
        });
        self.outcome(&notice.to_email)
    }
}
