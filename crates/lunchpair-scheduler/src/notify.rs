//! Notifier: tells each participant how the round went.
//! Every notice is independent: a failure is logged and counted, never
//! retried, and never stops the remaining notices.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use lunchpair_core::{
    LeftoverNotice, LunchError, Mailer, MatchPair, PairNotice, Participant, Result, UserContact,
    UserDirectory,
};
use serde::Serialize;

/// Per-recipient tally for one round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NotifyReport {
    pub sent: usize,
    pub failed: usize,
}

impl NotifyReport {
    fn record(&mut self, result: &Result<()>) {
        match result {
            Ok(()) => self.sent += 1,
            Err(_) => self.failed += 1,
        }
    }

    fn merge(&mut self, other: NotifyReport) {
        self.sent += other.sent;
        self.failed += other.failed;
    }
}

pub struct Notifier {
    users: Arc<dyn UserDirectory>,
    mailer: Arc<dyn Mailer>,
}

impl Notifier {
    pub fn new(users: Arc<dyn UserDirectory>, mailer: Arc<dyn Mailer>) -> Self {
        Self { users, mailer }
    }

    /// Notify both members of every pair, then the leftover if any.
    pub async fn notify_round(&self, pairs: &[MatchPair], leftover: Option<&Participant>) -> NotifyReport {
        let mut report = NotifyReport::default();

        if !pairs.is_empty() {
            let ids: HashSet<u64> = pairs.iter().flat_map(|p| p.members()).collect();
            match self.users.resolve_many(&ids).await {
                Ok(contacts) => {
                    for pair in pairs {
                        report.merge(self.send_pair_notices(pair, &contacts).await);
                    }
                }
                Err(e) => {
                    tracing::error!("❌ User lookup failed, no match emails sent: {e}");
                    report.failed += pairs.len() * 2;
                }
            }
        }

        if let Some(participant) = leftover {
            let result = self.notify_leftover(participant).await;
            report.record(&result);
        }

        report
    }

    /// Send each member of `pair` a notice naming the other.
    /// Both notices are attempted; any failure makes the result an error.
    pub async fn notify_pair(&self, pair: &MatchPair, contacts: &HashMap<u64, UserContact>) -> Result<()> {
        let report = self.send_pair_notices(pair, contacts).await;
        if report.failed == 0 {
            Ok(())
        } else {
            Err(LunchError::Mail(format!(
                "{} of 2 match emails failed for users {} and {}",
                report.failed, pair.user_id_1, pair.user_id_2
            )))
        }
    }

    /// Send the "no match this time" notice.
    pub async fn notify_leftover(&self, participant: &Participant) -> Result<()> {
        let result = async {
            let user = self.users.resolve_one(participant.user_id).await?;
            let notice = LeftoverNotice {
                to_email: user.email,
                first_name: user.first_name,
            };
            self.mailer.send_leftover_notice(&notice).await
        }
        .await;

        match &result {
            Ok(()) => tracing::info!(
                "📧 Odd-out email sent to user {} of schedule {}",
                participant.user_id,
                participant.schedule_id
            ),
            Err(e) => tracing::warn!(
                "⚠️ Odd-out email failed for user {} of schedule {}: {e}",
                participant.user_id,
                participant.schedule_id
            ),
        }
        result
    }

    async fn send_pair_notices(&self, pair: &MatchPair, contacts: &HashMap<u64, UserContact>) -> NotifyReport {
        let mut report = NotifyReport::default();
        for (recipient, partner) in [
            (pair.user_id_1, pair.user_id_2),
            (pair.user_id_2, pair.user_id_1),
        ] {
            let result = match pair_notice(recipient, partner, contacts) {
                Ok(notice) => self.mailer.send_pair_notice(&notice).await,
                Err(e) => Err(e),
            };
            match &result {
                Ok(()) => tracing::info!(
                    "📧 Match email sent to user {recipient} of schedule {}",
                    pair.schedule_id
                ),
                Err(e) => tracing::warn!(
                    "⚠️ Match email failed for user {recipient} of schedule {}: {e}",
                    pair.schedule_id
                ),
            }
            report.record(&result);
        }
        report
    }
}

fn pair_notice(recipient: u64, partner: u64, contacts: &HashMap<u64, UserContact>) -> Result<PairNotice> {
    let lookup = |id: u64| {
        contacts
            .get(&id)
            .ok_or_else(|| LunchError::NotFound(format!("user {id}")))
    };
    let to = lookup(recipient)?;
    let partner = lookup(partner)?;
    Ok(PairNotice {
        to_email: to.email.clone(),
        first_name: to.first_name.clone(),
        partner_first_name: partner.first_name.clone(),
        partner_last_name: partner.last_name.clone(),
    })
}
