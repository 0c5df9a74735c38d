//! Activity data model shared by the tracker, the coordinator and the store.
//!
//! Each timed game activity is described by one [`ActivityRecord`] per
//! `(player, kind)`. The record moves through a small state machine:
//!
//! ```text
//! Idle ──start──▶ Pending ──ack──▶ Running ──end confirmed──▶ AwaitingCollection
//!  ▲                 │                │                              │
//!  └──── rejected ───┘                └──── cancel confirmed ────────┤
//!  └───────────────────────── finishing side-effect applied ◀───────┘
//! ```
//!
//! Consumers never read a record directly; they get a [`DerivedView`] which
//! carries the authoritative running flag, the remaining seconds and a
//! confidence marker telling whether the value was confirmed by a fresh
//! page snapshot or predicted locally.

use chrono::{DateTime, TimeDelta, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Timed activities the bot knows how to track.
#[derive(ValueEnum, Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    /// Bottle collection (`/activities/`).
    Collection,
    /// Skill training (`/skills/`).
    Training,
    /// Fights (`/fight/`), observed only.
    Combat,
    /// Holding the promille level in the training window.
    #[value(name = "intoxication")]
    IntoxicationManagement,
}

impl ActivityKind {
    pub const ALL: [ActivityKind; 4] = [
        ActivityKind::Collection,
        ActivityKind::Training,
        ActivityKind::Combat,
        ActivityKind::IntoxicationManagement,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::Collection => "collection",
            ActivityKind::Training => "training",
            ActivityKind::Combat => "combat",
            ActivityKind::IntoxicationManagement => "intoxication",
        }
    }

    /// Whether the game header exposes a countdown for this kind.
    ///
    /// Kinds without one are never confirmed by a snapshot, so their run
    /// window ends on the local clock.
    pub fn has_remote_timer(&self) -> bool {
        !matches!(self, ActivityKind::IntoxicationManagement)
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ActivityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "collection" => Ok(ActivityKind::Collection),
            "training" => Ok(ActivityKind::Training),
            "combat" => Ok(ActivityKind::Combat),
            "intoxication" | "intoxication_management" => Ok(ActivityKind::IntoxicationManagement),
            other => Err(format!("unknown activity kind '{}'", other)),
        }
    }
}

/// Lifecycle state of an [`ActivityRecord`].
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    #[default]
    Idle,
    Pending,
    Running,
    AwaitingCollection,
}

impl ActivityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityStatus::Idle => "idle",
            ActivityStatus::Pending => "pending",
            ActivityStatus::Running => "running",
            ActivityStatus::AwaitingCollection => "awaiting_collection",
        }
    }
}

impl fmt::Display for ActivityStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ActivityStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(ActivityStatus::Idle),
            "pending" => Ok(ActivityStatus::Pending),
            "running" => Ok(ActivityStatus::Running),
            "awaiting_collection" => Ok(ActivityStatus::AwaitingCollection),
            other => Err(format!("unknown activity status '{}'", other)),
        }
    }
}

/// Who started the run currently held by a record.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    #[default]
    SelfInitiated,
    /// Seen running on the page without a matching local start.
    ExternallyObserved,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::SelfInitiated => "self",
            Origin::ExternallyObserved => "external",
        }
    }
}

impl FromStr for Origin {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "self" => Ok(Origin::SelfInitiated),
            "external" => Ok(Origin::ExternallyObserved),
            other => Err(format!("unknown origin '{}'", other)),
        }
    }
}

/// Trainable skills; the value is the path segment of the upgrade URL.
#[derive(ValueEnum, Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Skill {
    Att,
    Def,
    Agi,
}

impl Skill {
    pub fn as_str(&self) -> &'static str {
        match self {
            Skill::Att => "att",
            Skill::Def => "def",
            Skill::Agi => "agi",
        }
    }
}

impl fmt::Display for Skill {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind-specific parameters chosen at start time.
///
/// Stored as the record's metadata. The tracker never looks inside; the
/// coordinator uses them to plan the finishing side-effect.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActivityParams {
    Collection {
        autosell: bool,
        min_price_cents: u32,
    },
    Training {
        skill: Skill,
    },
    Combat,
    Intoxication {
        target_promille: f64,
        sober_up_after: bool,
        /// Sober up by eating instead of pumping the stomach.
        #[serde(default)]
        sober_with_food: bool,
        /// Drinks consumed at start, for display.
        #[serde(default)]
        consumed: Vec<String>,
    },
}

impl ActivityParams {
    pub fn kind(&self) -> ActivityKind {
        match self {
            ActivityParams::Collection { .. } => ActivityKind::Collection,
            ActivityParams::Training { .. } => ActivityKind::Training,
            ActivityParams::Combat => ActivityKind::Combat,
            ActivityParams::Intoxication { .. } => ActivityKind::IntoxicationManagement,
        }
    }

    /// One-line summary for tables and events.
    pub fn summary(&self) -> String {
        match self {
            ActivityParams::Collection { autosell, min_price_cents } => {
                if *autosell {
                    format!("autosell >= {} ct", min_price_cents)
                } else {
                    "no autosell".to_string()
                }
            }
            ActivityParams::Training { skill } => format!("skill {}", skill),
            ActivityParams::Combat => "-".to_string(),
            ActivityParams::Intoxication { target_promille, consumed, .. } => {
                if consumed.is_empty() {
                    format!("target {:.2}‰", target_promille)
                } else {
                    format!("target {:.2}‰, {}", target_promille, consumed.join(", "))
                }
            }
        }
    }
}

/// Persistent state of one activity kind for one player.
#[derive(Clone, Debug, PartialEq)]
pub struct ActivityRecord {
    pub kind: ActivityKind,
    pub status: ActivityStatus,
    pub origin: Origin,
    /// When the Pending record was written; drives the stale-Pending watchdog.
    pub requested_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub expected_duration: Option<TimeDelta>,
    pub expected_end_at: Option<DateTime<Utc>>,
    pub metadata: Option<ActivityParams>,
    pub last_reconciled_at: Option<DateTime<Utc>>,
    pub cancel_requested: bool,
    /// Idempotency marker of the finishing side-effect.
    pub action_token: Option<i64>,
    pub token_applied: bool,
    /// Moment of the last local status transition. Snapshots captured
    /// before it describe an older state and are ignored.
    pub status_changed_at: Option<DateTime<Utc>>,
    pub last_completed_at: Option<DateTime<Utc>>,
    /// End of the randomized pause after the last completion.
    pub next_eligible_at: Option<DateTime<Utc>>,
}

impl ActivityRecord {
    /// A fresh Idle record; what a missing store row reads as.
    pub fn idle(kind: ActivityKind) -> Self {
        Self {
            kind,
            status: ActivityStatus::Idle,
            origin: Origin::SelfInitiated,
            requested_at: None,
            started_at: None,
            expected_duration: None,
            expected_end_at: None,
            metadata: None,
            last_reconciled_at: None,
            cancel_requested: false,
            action_token: None,
            token_applied: false,
            status_changed_at: None,
            last_completed_at: None,
            next_eligible_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status != ActivityStatus::Idle
    }

    /// Locally predicted seconds until `expected_end_at`, clamped at zero.
    pub fn local_remaining(&self, now: DateTime<Utc>) -> i64 {
        match self.expected_end_at {
            Some(end) => (end - now).num_seconds().max(0),
            None => 0,
        }
    }

    /// Moves the record to `status`, stamping the transition time.
    pub fn transition(&mut self, status: ActivityStatus, now: DateTime<Utc>) {
        self.status = status;
        self.status_changed_at = Some(now);
    }

    /// Fixes the run window of a Running record.
    pub fn mark_running(&mut self, now: DateTime<Utc>, remaining: TimeDelta) {
        self.transition(ActivityStatus::Running, now);
        self.started_at = Some(now);
        self.expected_duration = Some(remaining);
        self.expected_end_at = Some(now + remaining);
        self.requested_at = None;
        self.cancel_requested = false;
    }

    /// Returns the record to Idle, dropping the run and its metadata.
    ///
    /// Completion history (`last_completed_at`, `next_eligible_at`) is kept so
    /// the auto-repeat pause survives the reset.
    pub fn retire(&mut self, now: DateTime<Utc>) {
        let last_completed_at = self.last_completed_at;
        let next_eligible_at = self.next_eligible_at;
        *self = Self::idle(self.kind);
        self.status_changed_at = Some(now);
        self.last_completed_at = last_completed_at;
        self.next_eligible_at = next_eligible_at;
    }

    /// Checks the structural invariants every persisted record must satisfy.
    pub fn is_consistent(&self) -> bool {
        let window_ok = match (self.started_at, self.expected_end_at) {
            (Some(start), Some(end)) => end >= start,
            _ => true,
        };
        let cancel_ok = !self.cancel_requested || self.status == ActivityStatus::Running;
        let idle_ok = self.status != ActivityStatus::Idle || (self.metadata.is_none() && self.expected_end_at.is_none());
        window_ok && cancel_ok && idle_ok
    }
}

/// Whether a derived remaining time was confirmed by a fresh snapshot.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Confirmed,
    Unconfirmed,
}

/// Read model handed to the dashboard, the CLI and the coordinator.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DerivedView {
    pub kind: ActivityKind,
    pub status: ActivityStatus,
    pub running: bool,
    pub pending: bool,
    pub awaiting_collection: bool,
    pub seconds_remaining: i64,
    pub confidence: Confidence,
    pub expected_end_at: Option<DateTime<Utc>>,
    pub metadata: Option<ActivityParams>,
    pub origin: Origin,
    pub cancel_requested: bool,
}

impl DerivedView {
    /// View of a record using the local prediction only.
    pub fn local(record: &ActivityRecord, now: DateTime<Utc>) -> Self {
        Self::with_remaining(record, record.local_remaining(now), Confidence::Unconfirmed)
    }

    pub fn with_remaining(record: &ActivityRecord, seconds_remaining: i64, confidence: Confidence) -> Self {
        let running = record.status == ActivityStatus::Running;
        Self {
            kind: record.kind,
            status: record.status,
            running,
            pending: record.status == ActivityStatus::Pending,
            awaiting_collection: record.status == ActivityStatus::AwaitingCollection,
            seconds_remaining: if running { seconds_remaining.max(0) } else { 0 },
            confidence,
            expected_end_at: record.expected_end_at,
            metadata: record.metadata.clone(),
            origin: record.origin,
            cancel_requested: record.cancel_requested,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn kind_round_trips_through_str() {
        for kind in ActivityKind::ALL {
            assert_eq!(kind.as_str().parse::<ActivityKind>().unwrap(), kind);
        }
        assert!("bottles".parse::<ActivityKind>().is_err());
    }

    #[test]
    fn local_remaining_clamps_at_zero() {
        let mut record = ActivityRecord::idle(ActivityKind::Collection);
        record.mark_running(at(0), TimeDelta::seconds(60));
        assert_eq!(record.local_remaining(at(10)), 50);
        assert_eq!(record.local_remaining(at(600)), 0);
    }

    #[test]
    fn retire_keeps_completion_history() {
        let mut record = ActivityRecord::idle(ActivityKind::Training);
        record.mark_running(at(0), TimeDelta::seconds(60));
        record.metadata = Some(ActivityParams::Training { skill: Skill::Att });
        record.last_completed_at = Some(at(61));
        record.next_eligible_at = Some(at(361));
        record.retire(at(62));

        assert_eq!(record.status, ActivityStatus::Idle);
        assert!(record.metadata.is_none());
        assert_eq!(record.next_eligible_at, Some(at(361)));
        assert!(record.is_consistent());
    }

    #[test]
    fn cancel_flag_outside_running_is_inconsistent() {
        let mut record = ActivityRecord::idle(ActivityKind::Training);
        record.cancel_requested = true;
        assert!(!record.is_consistent());
    }
}
