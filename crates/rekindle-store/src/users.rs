//! SQLite participant store.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use rusqlite::{Connection, OptionalExtension};

use rekindle_core::error::{RekindleError, Result};
use rekindle_core::types::{UserMeta, UserRecord, UserStats};

pub struct UserStore {
    conn: Mutex<Connection>,
}

fn store_err(e: impl std::fmt::Display) -> RekindleError {
    RekindleError::Store(e.to_string())
}

const RECORD_COLUMNS: &str = "telegram_id, username, first_name, last_name, registered_at, \
     has_completed, warmup_stage, last_warmup_at, is_blocked, source";

impl UserStore {
    /// Open or create the participant database.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(store_err)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                telegram_id INTEGER PRIMARY KEY,
                username TEXT,
                first_name TEXT,
                last_name TEXT,
                registered_at TEXT NOT NULL,
                has_completed INTEGER NOT NULL DEFAULT 0,
                warmup_stage INTEGER NOT NULL DEFAULT 0,
                last_warmup_at TEXT,
                is_blocked INTEGER NOT NULL DEFAULT 0,
                source TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_users_warmup
                ON users(warmup_stage, has_completed, is_blocked);",
        )
        .map_err(store_err)?;
        tracing::debug!("user store ready at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Insert a new participant or refresh profile metadata for a known
    /// one. Lifecycle fields are never touched here; `registered_at` and
    /// `source` stick to their first-contact values.
    pub fn upsert(&self, telegram_id: i64, meta: &UserMeta) -> Result<()> {
        let conn = self.conn.lock().map_err(store_err)?;
        conn.execute(
            "INSERT INTO users (telegram_id, username, first_name, last_name, registered_at, source)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(telegram_id) DO UPDATE SET
                username = excluded.username,
                first_name = excluded.first_name,
                last_name = excluded.last_name",
            rusqlite::params![
                telegram_id,
                meta.username,
                meta.first_name,
                meta.last_name,
                Utc::now().to_rfc3339(),
                meta.source,
            ],
        )
        .map_err(store_err)?;
        Ok(())
    }

    pub fn get(&self, telegram_id: i64) -> Result<Option<UserRecord>> {
        let conn = self.conn.lock().map_err(store_err)?;
        conn.query_row(
            &format!("SELECT {RECORD_COLUMNS} FROM users WHERE telegram_id = ?1"),
            [telegram_id],
            row_to_record,
        )
        .optional()
        .map_err(store_err)
    }

    /// Mark the entry action done. Idempotent; terminal for warmup.
    pub fn mark_completed(&self, telegram_id: i64) -> Result<()> {
        let conn = self.conn.lock().map_err(store_err)?;
        conn.execute(
            "UPDATE users SET has_completed = 1 WHERE telegram_id = ?1",
            [telegram_id],
        )
        .map_err(store_err)?;
        Ok(())
    }

    /// Mark the recipient unreachable. Idempotent; terminal.
    pub fn mark_blocked(&self, telegram_id: i64) -> Result<()> {
        let conn = self.conn.lock().map_err(store_err)?;
        conn.execute(
            "UPDATE users SET is_blocked = 1 WHERE telegram_id = ?1",
            [telegram_id],
        )
        .map_err(store_err)?;
        Ok(())
    }

    /// Advance a record to `new_stage`, stamping the reminder time in the
    /// same statement. The guard only matches a record that is still active
    /// and sits exactly one stage behind, so a completion or block that
    /// lands while the send is in flight wins, and a repeated call is a
    /// no-op. Returns whether a row changed.
    pub fn advance_stage(
        &self,
        telegram_id: i64,
        new_stage: u32,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let conn = self.conn.lock().map_err(store_err)?;
        let changed = conn
            .execute(
                "UPDATE users SET warmup_stage = ?2, last_warmup_at = ?3
                 WHERE telegram_id = ?1 AND warmup_stage = ?2 - 1
                   AND has_completed = 0 AND is_blocked = 0",
                rusqlite::params![telegram_id, new_stage, at.to_rfc3339()],
            )
            .map_err(store_err)?;
        Ok(changed > 0)
    }

    /// Everyone due the reminder for `target_stage`: active records one
    /// stage behind whose anchor (last reminder, else registration) is at
    /// least `min_elapsed_hours` old. An elapsed time exactly equal to the
    /// threshold qualifies.
    pub fn eligible_for_stage(
        &self,
        target_stage: u32,
        min_elapsed_hours: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<UserRecord>> {
        let cutoff = (now - Duration::hours(min_elapsed_hours as i64)).to_rfc3339();
        let conn = self.conn.lock().map_err(store_err)?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {RECORD_COLUMNS} FROM users
                 WHERE has_completed = 0 AND is_blocked = 0
                   AND warmup_stage = ?1
                   AND COALESCE(last_warmup_at, registered_at) <= ?2"
            ))
            .map_err(store_err)?;
        let rows = stmt
            .query_map(
                rusqlite::params![target_stage.saturating_sub(1), cutoff],
                row_to_record,
            )
            .map_err(store_err)?;
        // A bad row aborts the batch rather than shrinking the result.
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(store_err)
    }

    /// Aggregate counts; `pending` is whoever is neither done nor gone.
    pub fn stats(&self) -> Result<UserStats> {
        let conn = self.conn.lock().map_err(store_err)?;
        let (total, completed, blocked) = conn
            .query_row(
                "SELECT COUNT(*),
                        COALESCE(SUM(has_completed), 0),
                        COALESCE(SUM(is_blocked), 0)
                 FROM users",
                [],
                |row| {
                    Ok((
                        row.get::<_, u64>(0)?,
                        row.get::<_, u64>(1)?,
                        row.get::<_, u64>(2)?,
                    ))
                },
            )
            .map_err(store_err)?;
        Ok(UserStats {
            total,
            completed,
            pending: total.saturating_sub(completed + blocked),
            blocked,
        })
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRecord> {
    Ok(UserRecord {
        telegram_id: row.get(0)?,
        username: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        registered_at: parse_ts(4, &row.get::<_, String>(4)?)?,
        has_completed: row.get::<_, i64>(5)? != 0,
        warmup_stage: row.get(6)?,
        last_warmup_at: match row.get::<_, Option<String>>(7)? {
            Some(s) => Some(parse_ts(7, &s)?),
            None => None,
        },
        is_blocked: row.get::<_, i64>(8)? != 0,
        source: row.get(9)?,
    })
}

/// A timestamp that does not parse is a corrupt record, not the epoch;
/// defaulting here would make the row instantly eligible for stage 1.
fn parse_ts(column: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                column,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store(name: &str) -> (UserStore, std::path::PathBuf) {
        let dir = std::env::temp_dir().join(format!("rekindle-store-{name}"));
        std::fs::remove_dir_all(&dir).ok();
        let store = UserStore::open(&dir.join("users.db")).unwrap();
        (store, dir)
    }

    fn meta(source: Option<&str>) -> UserMeta {
        UserMeta {
            username: Some("alice".into()),
            first_name: Some("Alice".into()),
            last_name: None,
            source: source.map(String::from),
        }
    }

    #[test]
    fn test_upsert_creates_then_updates_metadata_only() {
        let (store, dir) = temp_store("upsert");
        store.upsert(1, &meta(Some("ad-campaign"))).unwrap();
        let first = store.get(1).unwrap().unwrap();
        assert_eq!(first.warmup_stage, 0);
        assert!(!first.has_completed);
        assert_eq!(first.source.as_deref(), Some("ad-campaign"));

        // Second contact: new username, a different source tag, and a
        // lifecycle change in between.
        store.mark_completed(1).unwrap();
        store
            .upsert(
                1,
                &UserMeta {
                    username: Some("alice2".into()),
                    source: Some("other".into()),
                    ..Default::default()
                },
            )
            .unwrap();

        let second = store.get(1).unwrap().unwrap();
        assert_eq!(second.username.as_deref(), Some("alice2"));
        // Write-once fields and lifecycle survive the upsert.
        assert_eq!(second.source.as_deref(), Some("ad-campaign"));
        assert_eq!(second.registered_at, first.registered_at);
        assert!(second.has_completed);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_eligibility_window_and_boundary() {
        let (store, dir) = temp_store("window");
        store.upsert(1, &meta(None)).unwrap();
        let registered = store.get(1).unwrap().unwrap().registered_at;

        // Too early: 59 minutes against a 1-hour gate.
        let now = registered + Duration::minutes(59);
        assert!(store.eligible_for_stage(1, 1, now).unwrap().is_empty());

        // Exactly on the boundary qualifies.
        let now = registered + Duration::hours(1);
        assert_eq!(store.eligible_for_stage(1, 1, now).unwrap().len(), 1);

        // Wrong target stage never matches.
        assert!(store.eligible_for_stage(2, 1, now).unwrap().is_empty());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_terminal_records_never_eligible() {
        let (store, dir) = temp_store("terminal");
        store.upsert(1, &meta(None)).unwrap();
        store.upsert(2, &meta(None)).unwrap();
        store.mark_completed(1).unwrap();
        store.mark_blocked(2).unwrap();

        let far_future = Utc::now() + Duration::days(365);
        for stage in 1..=3 {
            assert!(
                store.eligible_for_stage(stage, 0, far_future).unwrap().is_empty(),
                "terminal record returned for stage {stage}"
            );
        }
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_advance_stage_is_guarded_and_idempotent() {
        let (store, dir) = temp_store("advance");
        store.upsert(1, &meta(None)).unwrap();
        let t1 = Utc::now();

        // Cannot skip a stage.
        assert!(!store.advance_stage(1, 2, t1).unwrap());

        assert!(store.advance_stage(1, 1, t1).unwrap());
        let after = store.get(1).unwrap().unwrap();
        assert_eq!(after.warmup_stage, 1);
        assert_eq!(after.last_warmup_at.unwrap().to_rfc3339(), t1.to_rfc3339());

        // Same call again: no-op, state unchanged.
        assert!(!store.advance_stage(1, 1, t1).unwrap());
        let again = store.get(1).unwrap().unwrap();
        assert_eq!(again.warmup_stage, 1);
        assert_eq!(again.last_warmup_at, after.last_warmup_at);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_completion_wins_over_inflight_advance() {
        let (store, dir) = temp_store("race");
        store.upsert(1, &meta(None)).unwrap();
        assert!(store.advance_stage(1, 1, Utc::now()).unwrap());
        assert!(store.advance_stage(1, 2, Utc::now()).unwrap());

        // Completion event lands while a stage-3 send is in flight.
        store.mark_completed(1).unwrap();
        assert!(!store.advance_stage(1, 3, Utc::now()).unwrap());
        assert_eq!(store.get(1).unwrap().unwrap().warmup_stage, 2);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_anchor_moves_with_each_reminder() {
        let (store, dir) = temp_store("anchor");
        store.upsert(1, &meta(None)).unwrap();
        let registered = store.get(1).unwrap().unwrap().registered_at;

        let first_send = registered + Duration::hours(1);
        assert!(store.advance_stage(1, 1, first_send).unwrap());
        let anchored = store.get(1).unwrap().unwrap();
        assert_eq!(anchored.warmup_anchor(), first_send);

        // Stage 2 gates on the stage-1 send, not registration: 24 hours
        // after registration is still one hour short.
        let now = registered + Duration::hours(24);
        assert!(store.eligible_for_stage(2, 24, now).unwrap().is_empty());
        let now = first_send + Duration::hours(24);
        assert_eq!(store.eligible_for_stage(2, 24, now).unwrap().len(), 1);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_corrupt_timestamp_surfaces_store_error() {
        let (store, dir) = temp_store("corrupt");
        store.upsert(1, &meta(None)).unwrap();
        store.upsert(2, &meta(None)).unwrap();

        // Hand-edit one row behind the store's back. The value sorts
        // before any real timestamp, so the eligibility query still
        // selects the row, but it is not valid RFC 3339.
        let raw = Connection::open(dir.join("users.db")).unwrap();
        raw.execute(
            "UPDATE users SET registered_at = '2020-13-99T99:99:99+00:00' WHERE telegram_id = 1",
            [],
        )
        .unwrap();

        // The bad row errors out instead of defaulting to the epoch...
        assert!(matches!(store.get(1), Err(RekindleError::Store(_))));
        // ...and aborts the eligibility batch rather than shrinking it.
        let now = Utc::now() + Duration::days(1);
        assert!(matches!(
            store.eligible_for_stage(1, 1, now),
            Err(RekindleError::Store(_))
        ));

        // Intact rows are untouched.
        assert_eq!(store.get(2).unwrap().unwrap().telegram_id, 2);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_stats_partition() {
        let (store, dir) = temp_store("stats");
        for id in 1..=10 {
            store.upsert(id, &meta(None)).unwrap();
        }
        for id in 1..=3 {
            store.mark_completed(id).unwrap();
        }
        store.mark_blocked(10).unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.total, 10);
        assert_eq!(stats.completed, 3);
        assert_eq!(stats.blocked, 1);
        assert_eq!(stats.pending, 6);
        std::fs::remove_dir_all(&dir).ok();
    }
}
