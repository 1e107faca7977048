//! SQLite-backed persistence for schedules, rosters, matches and users.
//! One connection behind a mutex; statements are short so the lock is
//! never held across an await.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lunchpair_core::{
    LunchError, MatchPair, MatchStore, Participant, RecurrenceRule, RecurrenceStore, Result,
    UserContact, UserDirectory,
};
use rusqlite::{Connection, OptionalExtension, params};

/// SQLite store implementing every persistence-side collaborator.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

fn db_err(context: &str) -> impl Fn(rusqlite::Error) -> LunchError + '_ {
    move |e| LunchError::Database(format!("{context}: {e}"))
}

impl SqliteStore {
    /// Open or create the database.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(db_err("DB open"))?;
        // WAL for concurrent readers
        conn.execute_batch("PRAGMA journal_mode=WAL;").ok();
        Self::init(conn)
    }

    /// Fresh in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory().map_err(db_err("DB open"))?)
    }

    fn init(conn: Connection) -> Result<Self> {
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<()> {
        self.lock()?
            .execute_batch(
                "
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                created_at TEXT NOT NULL
            );

            -- One row per recurrence rule
            CREATE TABLE IF NOT EXISTS schedules (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                org_id INTEGER NOT NULL,
                expression TEXT NOT NULL,        -- 'MIN HOUR DOM MON DOW'
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_schedules_org ON schedules(org_id);

            -- Opt-ins; a user joins a schedule at most once
            CREATE TABLE IF NOT EXISTS schedule_users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                schedule_id INTEGER NOT NULL REFERENCES schedules(id),
                created_at TEXT NOT NULL,
                UNIQUE (schedule_id, user_id)
            );

            -- Append-only; duplicate batches are stored twice
            CREATE TABLE IF NOT EXISTS lunch_matches (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id_1 INTEGER NOT NULL,
                user_id_2 INTEGER NOT NULL,
                schedule_id INTEGER NOT NULL,
                created_at TEXT NOT NULL
            );
         ",
            )
            .map_err(db_err("Migration"))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| LunchError::Database(format!("Lock: {e}")))
    }

    // ─── Users ────────────────────────────────────────────────

    /// Insert a user, returning the stored contact.
    pub fn add_user(&self, first_name: &str, last_name: &str, email: &str) -> Result<UserContact> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO users (first_name, last_name, email, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![first_name, last_name, email, Utc::now().to_rfc3339()],
        )
        .map_err(db_err("Add user"))?;
        Ok(UserContact {
            user_id: conn.last_insert_rowid() as u64,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email: email.to_string(),
        })
    }

    // ─── Matches ──────────────────────────────────────────────

    /// All stored pairs of a schedule, oldest first.
    pub fn list_matches(&self, schedule_id: u64) -> Result<Vec<MatchPair>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT user_id_1, user_id_2, schedule_id FROM lunch_matches
                 WHERE schedule_id = ?1 ORDER BY id",
            )
            .map_err(db_err("List matches"))?;
        let rows = stmt
            .query_map(params![schedule_id as i64], |row| {
                Ok(MatchPair {
                    user_id_1: row.get::<_, i64>(0)? as u64,
                    user_id_2: row.get::<_, i64>(1)? as u64,
                    schedule_id: row.get::<_, i64>(2)? as u64,
                })
            })
            .map_err(db_err("List matches"))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err("List matches"))
    }
}

fn rule_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RecurrenceRule> {
    let created_at: String = row.get(3)?;
    Ok(RecurrenceRule {
        id: row.get::<_, i64>(0)? as u64,
        org_id: row.get::<_, i64>(1)? as u64,
        expression: row.get(2)?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .ok()
            .map(|d| d.with_timezone(&Utc)),
    })
}

fn contact_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserContact> {
    Ok(UserContact {
        user_id: row.get::<_, i64>(0)? as u64,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        email: row.get(3)?,
    })
}

#[async_trait]
impl RecurrenceStore for SqliteStore {
    async fn list_rules(&self) -> Result<Vec<RecurrenceRule>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT id, org_id, expression, created_at FROM schedules ORDER BY id")
            .map_err(db_err("List schedules"))?;
        let rows = stmt
            .query_map([], rule_from_row)
            .map_err(db_err("List schedules"))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err("List schedules"))
    }

    async fn get_rule(&self, id: u64) -> Result<RecurrenceRule> {
        self.lock()?
            .query_row(
                "SELECT id, org_id, expression, created_at FROM schedules WHERE id = ?1",
                params![id as i64],
                rule_from_row,
            )
            .optional()
            .map_err(db_err("Get schedule"))?
            .ok_or_else(|| LunchError::NotFound(format!("schedule {id}")))
    }

    async fn list_org_rules(&self, org_id: u64) -> Result<Vec<RecurrenceRule>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT id, org_id, expression, created_at FROM schedules WHERE org_id = ?1 ORDER BY id")
            .map_err(db_err("List org schedules"))?;
        let rows = stmt
            .query_map(params![org_id as i64], rule_from_row)
            .map_err(db_err("List org schedules"))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err("List org schedules"))
    }

    async fn create_rule(&self, org_id: u64, expression: &str) -> Result<RecurrenceRule> {
        let conn = self.lock()?;
        let now = Utc::now();
        conn.execute(
            "INSERT INTO schedules (org_id, expression, created_at) VALUES (?1, ?2, ?3)",
            params![org_id as i64, expression, now.to_rfc3339()],
        )
        .map_err(db_err("Create schedule"))?;
        Ok(RecurrenceRule {
            id: conn.last_insert_rowid() as u64,
            org_id,
            expression: expression.to_string(),
            created_at: Some(now),
        })
    }

    async fn list_participants(&self, schedule_id: u64) -> Result<Vec<Participant>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT user_id, schedule_id FROM schedule_users WHERE schedule_id = ?1 ORDER BY id")
            .map_err(db_err("List schedule users"))?;
        let rows = stmt
            .query_map(params![schedule_id as i64], |row| {
                Ok(Participant::new(
                    row.get::<_, i64>(0)? as u64,
                    row.get::<_, i64>(1)? as u64,
                ))
            })
            .map_err(db_err("List schedule users"))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err("List schedule users"))
    }

    async fn add_participant(&self, schedule_id: u64, user_id: u64) -> Result<Participant> {
        let conn = self.lock()?;
        let exists: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM schedules WHERE id = ?1)",
                params![schedule_id as i64],
                |row| row.get(0),
            )
            .map_err(db_err("Join schedule"))?;
        if !exists {
            return Err(LunchError::NotFound(format!("schedule {schedule_id}")));
        }
        // Joining twice is a no-op.
        conn.execute(
            "INSERT OR IGNORE INTO schedule_users (user_id, schedule_id, created_at) VALUES (?1, ?2, ?3)",
            params![user_id as i64, schedule_id as i64, Utc::now().to_rfc3339()],
        )
        .map_err(db_err("Join schedule"))?;
        Ok(Participant::new(user_id, schedule_id))
    }
}

#[async_trait]
impl MatchStore for SqliteStore {
    async fn save_batch(&self, pairs: &[MatchPair]) -> Result<()> {
        if pairs.is_empty() {
            return Ok(());
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(db_err("Save matches"))?;
        let now = Utc::now().to_rfc3339();
        let mut written = 0;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO lunch_matches (user_id_1, user_id_2, schedule_id, created_at)
                     VALUES (?1, ?2, ?3, ?4)",
                )
                .map_err(db_err("Save matches"))?;
            for pair in pairs {
                written += stmt
                    .execute(params![
                        pair.user_id_1 as i64,
                        pair.user_id_2 as i64,
                        pair.schedule_id as i64,
                        now
                    ])
                    .map_err(db_err("Save matches"))?;
            }
        }

        if written != pairs.len() {
            // Dropping the transaction rolls it back.
            return Err(LunchError::PartialWrite {
                written,
                expected: pairs.len(),
            });
        }
        tx.commit().map_err(db_err("Save matches"))?;
        tracing::debug!("💾 Saved {} lunch matches", written);
        Ok(())
    }
}

#[async_trait]
impl UserDirectory for SqliteStore {
    async fn resolve_many(&self, user_ids: &HashSet<u64>) -> Result<HashMap<u64, UserContact>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT id, first_name, last_name, email FROM users WHERE id = ?1")
            .map_err(db_err("Resolve users"))?;
        let mut contacts = HashMap::with_capacity(user_ids.len());
        for &id in user_ids {
            if let Some(contact) = stmt
                .query_row(params![id as i64], contact_from_row)
                .optional()
                .map_err(db_err("Resolve users"))?
            {
                contacts.insert(id, contact);
            }
        }
        Ok(contacts)
    }

    async fn resolve_one(&self, user_id: u64) -> Result<UserContact> {
        self.lock()?
            .query_row(
                "SELECT id, first_name, last_name, email FROM users WHERE id = ?1",
                params![user_id as i64],
                contact_from_row,
            )
            .optional()
            .map_err(db_err("Resolve user"))?
            .ok_or_else(|| LunchError::NotFound(format!("user {user_id}")))
    }
}
