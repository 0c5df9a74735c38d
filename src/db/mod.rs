//! Database layer.
//!
//! SQLite persistence for activity records, with versioned schema
//! migrations applied on every connection.

/// Connection management and initialization.
pub mod db;

/// Versioned schema changes and their history.
pub mod migrations;

/// Activity records keyed by `(player, kind)` plus the action-token counter.
pub mod records;
