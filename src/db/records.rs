//! Durable storage of activity records.
//!
//! One row per `(player, kind)` in `activity_records`. A missing row reads
//! as `None` and is treated by callers as an Idle record. Writes are
//! upserts; [`RecordStore::compare_and_swap`] additionally checks the stored
//! status inside a transaction so a writer holding a stale view cannot
//! overwrite a transition made by someone else.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use pennerbot::db::records::{RecordStore, SqliteRecordStore};
//! use pennerbot::libs::activity::{ActivityKind, ActivityRecord, ActivityStatus};
//!
//! let store = SqliteRecordStore::new("default")?;
//! let record = store.read(ActivityKind::Collection)?.unwrap_or_else(|| ActivityRecord::idle(ActivityKind::Collection));
//! assert_eq!(record.status, ActivityStatus::Idle);
//! # Ok::<(), anyhow::Error>(())
//! ```

use crate::db::db::Db;
use crate::libs::activity::{ActivityKind, ActivityParams, ActivityRecord, ActivityStatus, Origin};
use crate::libs::error::StoreError;
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::Arc;

const SELECT_COLUMNS: &str = "kind, status, origin, requested_at, started_at, expected_duration, expected_end_at, metadata,
    last_reconciled_at, cancel_requested, action_token, token_applied, status_changed_at, last_completed_at, next_eligible_at";

const UPSERT_RECORD: &str = "INSERT INTO activity_records (
    player, kind, status, origin, requested_at, started_at, expected_duration, expected_end_at, metadata,
    last_reconciled_at, cancel_requested, action_token, token_applied, status_changed_at, last_completed_at, next_eligible_at
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
ON CONFLICT(player, kind) DO UPDATE SET
    status = excluded.status,
    origin = excluded.origin,
    requested_at = excluded.requested_at,
    started_at = excluded.started_at,
    expected_duration = excluded.expected_duration,
    expected_end_at = excluded.expected_end_at,
    metadata = excluded.metadata,
    last_reconciled_at = excluded.last_reconciled_at,
    cancel_requested = excluded.cancel_requested,
    action_token = excluded.action_token,
    token_applied = excluded.token_applied,
    status_changed_at = excluded.status_changed_at,
    last_completed_at = excluded.last_completed_at,
    next_eligible_at = excluded.next_eligible_at";

const SELECT_STATUS: &str = "SELECT status FROM activity_records WHERE player = ?1 AND kind = ?2";

const INSERT_TOKEN: &str = "INSERT INTO action_tokens (player, kind) VALUES (?1, ?2)";

/// Key-value style access to activity records of one player.
pub trait RecordStore: Send + Sync {
    fn read(&self, kind: ActivityKind) -> Result<Option<ActivityRecord>, StoreError>;

    /// All stored records of the player, in kind order.
    fn read_all(&self) -> Result<Vec<ActivityRecord>, StoreError>;

    fn write(&self, record: &ActivityRecord) -> Result<(), StoreError>;

    /// Writes `record` only if the stored status (Idle when absent) equals
    /// `expected`. Returns whether the write happened.
    fn compare_and_swap(&self, expected: ActivityStatus, record: &ActivityRecord) -> Result<bool, StoreError>;

    /// Allocates the next monotonic action token.
    fn next_action_token(&self, kind: ActivityKind) -> Result<i64, StoreError>;
}

/// SQLite-backed [`RecordStore`].
#[derive(Clone)]
pub struct SqliteRecordStore {
    pub conn: Arc<Mutex<Connection>>,
    player: String,
}

impl SqliteRecordStore {
    /// Opens the store in the default database file.
    pub fn new(player: &str) -> anyhow::Result<Self> {
        Ok(Self::from_db(Db::new()?, player))
    }

    pub fn from_db(db: Db, player: &str) -> Self {
        Self {
            conn: Arc::new(Mutex::new(db.conn)),
            player: player.to_string(),
        }
    }

    pub fn player(&self) -> &str {
        &self.player
    }

    fn upsert(conn: &Connection, player: &str, record: &ActivityRecord) -> Result<(), StoreError> {
        let metadata = match &record.metadata {
            Some(params) => Some(serde_json::to_string(params)?),
            None => None,
        };
        conn.execute(
            UPSERT_RECORD,
            params![
                player,
                record.kind.as_str(),
                record.status.as_str(),
                record.origin.as_str(),
                record.requested_at,
                record.started_at,
                record.expected_duration.map(|d| d.num_seconds()),
                record.expected_end_at,
                metadata,
                record.last_reconciled_at,
                record.cancel_requested,
                record.action_token,
                record.token_applied,
                record.status_changed_at,
                record.last_completed_at,
                record.next_eligible_at,
            ],
        )?;
        Ok(())
    }
}

/// Raw column values, decoded into a record outside the rusqlite closure.
struct RecordRow {
    kind: String,
    status: String,
    origin: String,
    requested_at: Option<DateTime<Utc>>,
    started_at: Option<DateTime<Utc>>,
    expected_duration: Option<i64>,
    expected_end_at: Option<DateTime<Utc>>,
    metadata: Option<String>,
    last_reconciled_at: Option<DateTime<Utc>>,
    cancel_requested: bool,
    action_token: Option<i64>,
    token_applied: bool,
    status_changed_at: Option<DateTime<Utc>>,
    last_completed_at: Option<DateTime<Utc>>,
    next_eligible_at: Option<DateTime<Utc>>,
}

impl RecordRow {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            kind: row.get(0)?,
            status: row.get(1)?,
            origin: row.get(2)?,
            requested_at: row.get(3)?,
            started_at: row.get(4)?,
            expected_duration: row.get(5)?,
            expected_end_at: row.get(6)?,
            metadata: row.get(7)?,
            last_reconciled_at: row.get(8)?,
            cancel_requested: row.get(9)?,
            action_token: row.get(10)?,
            token_applied: row.get(11)?,
            status_changed_at: row.get(12)?,
            last_completed_at: row.get(13)?,
            next_eligible_at: row.get(14)?,
        })
    }

    fn into_record(self) -> Result<ActivityRecord, StoreError> {
        let corrupt = |reason: String| StoreError::Corrupt {
            kind: self.kind.clone(),
            reason,
        };
        let kind: ActivityKind = self.kind.parse().map_err(corrupt)?;
        let status: ActivityStatus = self.status.parse().map_err(corrupt)?;
        let origin: Origin = self.origin.parse().map_err(corrupt)?;
        let metadata: Option<ActivityParams> = match self.metadata.as_deref() {
            Some(json) => Some(serde_json::from_str(json)?),
            None => None,
        };

        Ok(ActivityRecord {
            kind,
            status,
            origin,
            requested_at: self.requested_at,
            started_at: self.started_at,
            expected_duration: self.expected_duration.map(TimeDelta::seconds),
            expected_end_at: self.expected_end_at,
            metadata,
            last_reconciled_at: self.last_reconciled_at,
            cancel_requested: self.cancel_requested,
            action_token: self.action_token,
            token_applied: self.token_applied,
            status_changed_at: self.status_changed_at,
            last_completed_at: self.last_completed_at,
            next_eligible_at: self.next_eligible_at,
        })
    }
}

impl RecordStore for SqliteRecordStore {
    fn read(&self, kind: ActivityKind) -> Result<Option<ActivityRecord>, StoreError> {
        let conn = self.conn.lock();
        let sql = format!("SELECT {} FROM activity_records WHERE player = ?1 AND kind = ?2", SELECT_COLUMNS);
        let row = conn
            .query_row(&sql, params![self.player, kind.as_str()], RecordRow::from_row)
            .optional()?;
        row.map(RecordRow::into_record).transpose()
    }

    fn read_all(&self) -> Result<Vec<ActivityRecord>, StoreError> {
        let conn = self.conn.lock();
        let sql = format!("SELECT {} FROM activity_records WHERE player = ?1", SELECT_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![self.player], RecordRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        let mut records = rows.into_iter().map(RecordRow::into_record).collect::<Result<Vec<_>, _>>()?;
        records.sort_by_key(|record| record.kind);
        Ok(records)
    }

    fn write(&self, record: &ActivityRecord) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        Self::upsert(&conn, &self.player, record)
    }

    fn compare_and_swap(&self, expected: ActivityStatus, record: &ActivityRecord) -> Result<bool, StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let stored: Option<String> = tx
            .query_row(SELECT_STATUS, params![self.player, record.kind.as_str()], |row| row.get(0))
            .optional()?;
        let current = match stored {
            Some(status) => status.parse::<ActivityStatus>().map_err(|reason| StoreError::Corrupt {
                kind: record.kind.to_string(),
                reason,
            })?,
            None => ActivityStatus::Idle,
        };
        if current != expected {
            return Ok(false);
        }

        Self::upsert(&tx, &self.player, record)?;
        tx.commit()?;
        Ok(true)
    }

    fn next_action_token(&self, kind: ActivityKind) -> Result<i64, StoreError> {
        let conn = self.conn.lock();
        conn.execute(INSERT_TOKEN, params![self.player, kind.as_str()])?;
        Ok(conn.last_insert_rowid())
    }
}
