//! Scheduler Engine: owns the timer registry and runs matching rounds.
//!
//! A round runs strictly in order: fetch roster → match → persist the batch
//! → notify. Any failure before notification ends that round only; the
//! rule's timer keeps running and fires again on its next tick.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use futures::FutureExt;
use lunchpair_core::config::ScheduleConfig;
use lunchpair_core::{
    Mailer, MatchPair, MatchStore, Participant, RecurrenceRule, RecurrenceStore, Result,
    ScheduleRequest, UserDirectory,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use tokio::sync::Mutex as AsyncMutex;

use crate::matching::compute_round;
use crate::notify::{Notifier, NotifyReport};
use crate::registry::{FireFn, TimerHandle, TimerInfo, TimerRegistry};
use crate::rules;

/// Everything a round talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub rules: Arc<dyn RecurrenceStore>,
    pub matches: Arc<dyn MatchStore>,
    pub users: Arc<dyn UserDirectory>,
    pub mailer: Arc<dyn Mailer>,
}

/// How a round ended when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RoundOutcome {
    /// Fewer than two participants; nothing written or sent.
    Skipped { participants: usize },
    /// The previous round of this rule was still running.
    AlreadyRunning,
    Completed {
        pairs: Vec<MatchPair>,
        leftover: Option<Participant>,
        notifications: NotifyReport,
    },
}

/// Runs rounds. Shared by every timer through an `Arc`.
pub struct RoundRunner {
    rules: Arc<dyn RecurrenceStore>,
    matches: Arc<dyn MatchStore>,
    notifier: Notifier,
    rng: Mutex<StdRng>,
    in_flight: Mutex<HashSet<u64>>,
}

impl RoundRunner {
    pub fn new(collaborators: Collaborators, rng: StdRng) -> Self {
        Self {
            rules: collaborators.rules,
            matches: collaborators.matches,
            notifier: Notifier::new(collaborators.users, collaborators.mailer),
            rng: Mutex::new(rng),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Run one round for `rule_id`.
    pub async fn fire(&self, rule_id: u64) -> Result<RoundOutcome> {
        let Some(_guard) = InFlight::acquire(&self.in_flight, rule_id) else {
            tracing::warn!("⏭️ Schedule {rule_id} is still running its previous round, skipping");
            return Ok(RoundOutcome::AlreadyRunning);
        };

        tracing::info!("🔔 Running matching round for schedule {rule_id}");
        let roster = self.rules.list_participants(rule_id).await?;
        if roster.len() < 2 {
            tracing::info!(
                "Less than 2 users have signed up ({}), skipping schedule {rule_id}",
                roster.len()
            );
            return Ok(RoundOutcome::Skipped {
                participants: roster.len(),
            });
        }

        let round = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            compute_round(roster, &mut *rng)
        };

        self.matches.save_batch(&round.pairs).await?;
        tracing::info!("💾 Saved {} matches for schedule {rule_id}", round.pairs.len());

        let notifications = self
            .notifier
            .notify_round(&round.pairs, round.leftover.as_ref())
            .await;
        tracing::info!(
            "✅ Finished round for schedule {rule_id}: {} emails sent, {} failed",
            notifications.sent,
            notifications.failed
        );

        Ok(RoundOutcome::Completed {
            pairs: round.pairs,
            leftover: round.leftover,
            notifications,
        })
    }
}

/// Marks a rule as mid-round until dropped.
struct InFlight<'a> {
    set: &'a Mutex<HashSet<u64>>,
    rule_id: u64,
}

impl<'a> InFlight<'a> {
    fn acquire(set: &'a Mutex<HashSet<u64>>, rule_id: u64) -> Option<Self> {
        let inserted = set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(rule_id);
        inserted.then_some(Self { set, rule_id })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.rule_id);
    }
}

/// The scheduler engine: registers rule timers and creates rules.
pub struct SchedulerEngine {
    rules: Arc<dyn RecurrenceStore>,
    runner: Arc<RoundRunner>,
    registry: AsyncMutex<TimerRegistry>,
    schedule: ScheduleConfig,
}

impl SchedulerEngine {
    /// Engine with an entropy-seeded generator and the default lunch time.
    pub fn new(collaborators: Collaborators) -> Self {
        Self::with_rng(collaborators, StdRng::from_entropy())
    }

    pub fn with_rng(collaborators: Collaborators, rng: StdRng) -> Self {
        Self {
            rules: collaborators.rules.clone(),
            runner: Arc::new(RoundRunner::new(collaborators, rng)),
            registry: AsyncMutex::new(TimerRegistry::new()),
            schedule: ScheduleConfig::default(),
        }
    }

    /// Time of day used for rules built from weekday tokens.
    pub fn with_schedule(mut self, schedule: ScheduleConfig) -> Self {
        self.schedule = schedule;
        self
    }

    /// Register a timer for every stored rule. A store failure is returned
    /// as-is; a rule with a malformed expression is logged and skipped.
    pub async fn register_all(&self) -> Result<usize> {
        let all = self.rules.list_rules().await?;
        let mut registered = 0;
        for rule in &all {
            match self.register_rule(rule).await {
                Ok(_) => registered += 1,
                Err(e) => tracing::warn!("⚠️ Skipping schedule {}: {e}", rule.id),
            }
        }
        tracing::info!("⏰ Scheduler started: {registered} of {} schedules registered", all.len());
        Ok(registered)
    }

    /// Register a rule created after startup, leaving other timers alone.
    pub async fn register_one(&self, rule_id: u64) -> Result<TimerHandle> {
        let rule = self.rules.get_rule(rule_id).await?;
        self.register_rule(&rule).await
    }

    /// Validate a request, persist the rule and register its timer.
    pub async fn create_rule(&self, request: &ScheduleRequest) -> Result<(RecurrenceRule, TimerHandle)> {
        let expression = rules::expression_for(request, self.schedule.hour, self.schedule.minute)?;
        let rule = self.rules.create_rule(request.org_id, &expression).await?;
        tracing::info!(
            "📅 Schedule {} created for organization {}: '{}'",
            rule.id,
            rule.org_id,
            rule.expression
        );
        let handle = self.register_one(rule.id).await?;
        Ok((rule, handle))
    }

    /// Fire a round now, outside the timer.
    pub async fn run_now(&self, rule_id: u64) -> Result<RoundOutcome> {
        self.rules.get_rule(rule_id).await?;
        self.runner.fire(rule_id).await
    }

    pub async fn is_registered(&self, rule_id: u64) -> bool {
        self.registry.lock().await.contains(rule_id)
    }

    pub async fn timers(&self) -> Vec<TimerInfo> {
        self.registry.lock().await.timers()
    }

    /// Stop future firings. Rounds already running finish on their own.
    pub async fn shutdown(&self) -> usize {
        let stopped = self.registry.lock().await.shutdown();
        tracing::info!("🛑 Scheduler stopped ({stopped} timers)");
        stopped
    }

    async fn register_rule(&self, rule: &RecurrenceRule) -> Result<TimerHandle> {
        let fire = firing(self.runner.clone(), rule.id);
        self.registry
            .lock()
            .await
            .register(rule.id, &rule.expression, fire)
    }
}

/// A timer's work for one rule: run the round and log how it went.
fn firing(runner: Arc<RoundRunner>, rule_id: u64) -> FireFn {
    Arc::new(move || {
        let runner = runner.clone();
        async move {
            match runner.fire(rule_id).await {
                Ok(outcome) => tracing::debug!("Schedule {rule_id} round outcome: {outcome:?}"),
                Err(e) => tracing::error!("❌ Matching round for schedule {rule_id} failed: {e}"),
            }
        }
        .boxed()
    })
}
