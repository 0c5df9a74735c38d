//! Database schema migration management and versioning system.
//!
//! Every schema change is a numbered migration recorded in the `migrations`
//! table. Pending migrations run in one transaction when the database is
//! opened, so a failed upgrade leaves the previous schema intact.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use pennerbot::db::migrations::{init_with_migrations, get_db_version};
//! use rusqlite::Connection;
//!
//! let mut conn = Connection::open("pennerbot.db")?;
//! init_with_migrations(&mut conn)?;
//! let version = get_db_version(&conn)?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use crate::libs::messages::Message;
use crate::{msg_debug, msg_error};
use anyhow::Result;
use rusqlite::{params, Connection, Transaction};
use tracing::info;

/// SQL schema for the migrations tracking table.
const MIGRATIONS_TABLE: &str = "
CREATE TABLE IF NOT EXISTS migrations (
    id INTEGER PRIMARY KEY,
    version INTEGER NOT NULL UNIQUE,
    name TEXT NOT NULL,
    applied_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
)";

/// A single schema change.
#[derive(Debug, Clone)]
struct Migration {
    /// Unique version number for ordering and tracking
    version: u32,
    /// Human-readable name describing the migration's purpose
    name: &'static str,
    /// Function that applies the schema changes within a transaction
    up: fn(&Transaction) -> Result<()>,
}

/// Registry of all migrations, applied in version order.
pub struct MigrationManager {
    migrations: Vec<Migration>,
}

impl MigrationManager {
    pub fn new() -> Self {
        let mut manager = Self { migrations: Vec::new() };
        manager.register_migrations();
        manager
    }

    /// Registers all database migrations in chronological order.
    ///
    /// Migrations are forward-only; a released migration is never edited,
    /// new columns get a new version.
    fn register_migrations(&mut self) {
        // Version 1: one row per (player, kind)
        self.add_migration(1, "create_activity_records", |tx| {
            tx.execute(
                "CREATE TABLE IF NOT EXISTS activity_records (
                    player TEXT NOT NULL,
                    kind TEXT NOT NULL,
                    status TEXT NOT NULL DEFAULT 'idle',
                    origin TEXT NOT NULL DEFAULT 'self',
                    requested_at TIMESTAMP,
                    started_at TIMESTAMP,
                    expected_duration INTEGER,
                    expected_end_at TIMESTAMP,
                    metadata TEXT,
                    last_reconciled_at TIMESTAMP,
                    cancel_requested BOOLEAN NOT NULL DEFAULT FALSE,
                    status_changed_at TIMESTAMP,
                    PRIMARY KEY (player, kind)
                )",
                [],
            )?;
            tx.execute("CREATE INDEX IF NOT EXISTS idx_activity_records_status ON activity_records(status)", [])?;
            Ok(())
        });

        // Version 2: idempotent finishing side-effects and completion history
        self.add_migration(2, "add_action_tokens", |tx| {
            tx.execute(
                "CREATE TABLE IF NOT EXISTS action_tokens (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    player TEXT NOT NULL,
                    kind TEXT NOT NULL,
                    issued_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
                )",
                [],
            )?;
            tx.execute("ALTER TABLE activity_records ADD COLUMN action_token INTEGER", [])?;
            tx.execute("ALTER TABLE activity_records ADD COLUMN token_applied BOOLEAN NOT NULL DEFAULT FALSE", [])?;
            tx.execute("ALTER TABLE activity_records ADD COLUMN last_completed_at TIMESTAMP", [])?;
            tx.execute("ALTER TABLE activity_records ADD COLUMN next_eligible_at TIMESTAMP", [])?;
            Ok(())
        });
    }

    fn add_migration(&mut self, version: u32, name: &'static str, up: fn(&Transaction) -> Result<()>) {
        self.migrations.push(Migration { version, name, up });
    }

    pub fn run_migrations(&self, conn: &mut Connection) -> Result<()> {
        conn.execute(MIGRATIONS_TABLE, [])?;

        let current_version = self.get_current_version(conn)?;
        let pending: Vec<&Migration> = self.migrations.iter().filter(|m| m.version > current_version).collect();

        if pending.is_empty() {
            msg_debug!("Database is up to date");
            return Ok(());
        }

        info!(count = pending.len(), "applying database migrations");
        let tx = conn.transaction()?;

        for migration in pending {
            match (migration.up)(&tx) {
                Ok(()) => {
                    tx.execute(
                        "INSERT INTO migrations (version, name) VALUES (?1, ?2)",
                        params![migration.version, migration.name],
                    )?;
                    info!(version = migration.version, name = migration.name, "migration applied");
                }
                Err(e) => {
                    msg_error!(Message::MigrationFailed(migration.version, e.to_string()));
                    return Err(e);
                }
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn get_current_version(&self, conn: &Connection) -> Result<u32> {
        let version: Option<u32> = conn.query_row("SELECT MAX(version) FROM migrations", [], |row| row.get(0)).unwrap_or(Some(0));

        Ok(version.unwrap_or(0))
    }

    pub fn is_migration_applied(&self, conn: &Connection, version: u32) -> Result<bool> {
        let count: i32 = conn.query_row("SELECT COUNT(*) FROM migrations WHERE version = ?1", params![version], |row| row.get(0))?;

        Ok(count > 0)
    }

    pub fn latest_version(&self) -> u32 {
        self.migrations.last().map(|m| m.version).unwrap_or(0)
    }
}

impl Default for MigrationManager {
    fn default() -> Self {
        Self::new()
    }
}

pub fn init_with_migrations(conn: &mut Connection) -> Result<()> {
    let manager = MigrationManager::new();
    manager.run_migrations(conn)?;
    Ok(())
}

pub fn get_db_version(conn: &Connection) -> Result<u32> {
    let manager = MigrationManager::new();
    manager.get_current_version(conn)
}

pub fn needs_migration(conn: &Connection) -> Result<bool> {
    let manager = MigrationManager::new();
    let current = manager.get_current_version(conn)?;
    Ok(current < manager.latest_version())
}
