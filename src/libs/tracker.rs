//! Reconciliation of stored activity records with page snapshots.
//!
//! [`reconcile`] is the single place where the local model and the scraped
//! game state meet. It is pure: it takes the current record and what the
//! page says, and returns the updated record, the derived view for
//! consumers, and an optional [`Signal`] describing the transition. Writing
//! the record back and publishing events is the coordinator's job.
//!
//! ## Tie-break rules
//!
//! - A fresh snapshot's `seconds_remaining` always wins over the local
//!   prediction for the reported value.
//! - A missing, malformed or stale entry never changes the status; the view
//!   falls back to the local prediction flagged as unconfirmed.
//! - "Not running" is only believed once the record is within the grace
//!   period of its expected end. Earlier reports are treated as transient
//!   scrape mismatches.
//! - A snapshot captured before the record's last local transition describes
//!   an older state and is ignored, so a cancelled or retired run is never
//!   resurrected by a late scrape.

use super::activity::{ActivityKind, ActivityRecord, ActivityStatus, Confidence, DerivedView, Origin};
use super::config::TrackerConfig;
use super::snapshot::{PageSnapshot, SnapshotEntry};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// What the page said about one kind, and when.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub entry: SnapshotEntry,
    pub captured_at: DateTime<Utc>,
}

impl Observation {
    pub fn new(entry: SnapshotEntry, captured_at: DateTime<Utc>) -> Self {
        Self { entry, captured_at }
    }

    /// Extracts the observation for `kind`, if the page had one.
    pub fn from_snapshot(snapshot: &PageSnapshot, kind: ActivityKind) -> Option<Self> {
        snapshot.entry(kind).map(|entry| Self::new(entry, snapshot.captured_at))
    }
}

/// Transition reported by a reconciliation pass.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    /// Pending was acknowledged by the page, or a run was observed externally.
    Started,
    /// The run finished remotely; finishing side-effects are due.
    Completed,
    /// A requested cancel was confirmed by the page.
    Cancelled,
    /// The expected end moved because the page disagreed beyond tolerance.
    ProgressChanged,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub record: ActivityRecord,
    pub view: DerivedView,
    pub signal: Option<Signal>,
}

impl Reconciliation {
    fn unchanged(record: &ActivityRecord, now: DateTime<Utc>) -> Self {
        Self {
            record: record.clone(),
            view: DerivedView::local(record, now),
            signal: None,
        }
    }
}

/// Normalized reading of a usable snapshot entry.
enum Reading {
    /// Running until the end the page implied when it was captured.
    Running(DateTime<Utc>),
    Stopped,
}

/// Returns the usable reading, or `None` when the entry must be treated as absent.
fn usable_reading(record: &ActivityRecord, observation: Option<Observation>, now: DateTime<Utc>, config: &TrackerConfig) -> Option<Reading> {
    if !record.kind.has_remote_timer() {
        return None;
    }
    let observation = observation?;

    let age = now - observation.captured_at;
    if age > config.freshness_window() {
        return None;
    }
    if let Some(changed_at) = record.status_changed_at {
        if observation.captured_at < changed_at {
            return None;
        }
    }

    match (observation.entry.is_running, observation.entry.seconds_remaining) {
        // The countdown is anchored on the capture time, so replaying a
        // snapshot later predicts the same end.
        (true, Some(secs)) if secs > 0 => {
            let end = observation.captured_at + TimeDelta::seconds(secs);
            if end > now {
                Some(Reading::Running(end))
            } else {
                Some(Reading::Stopped)
            }
        }
        // A running flag without a countdown cannot be placed in time.
        (true, None) => None,
        // The game shows expired counters as zero or negative.
        (true, Some(_)) | (false, _) => Some(Reading::Stopped),
    }
}

/// Reconciles `record` with what the page reported for its kind.
///
/// Never fails: bad or missing snapshot data degrades to the local
/// prediction. The caller persists `record` when it differs from the input.
pub fn reconcile(record: &ActivityRecord, observation: Option<Observation>, now: DateTime<Utc>, config: &TrackerConfig) -> Reconciliation {
    let Some(reading) = usable_reading(record, observation, now, config) else {
        return reconcile_without_snapshot(record, now);
    };

    match reading {
        Reading::Running(end) => reconcile_running(record, end, now, config),
        Reading::Stopped => reconcile_stopped(record, now, config),
    }
}

/// Only the local clock is available.
fn reconcile_without_snapshot(record: &ActivityRecord, now: DateTime<Utc>) -> Reconciliation {
    let expired = record.expected_end_at.map_or(true, |end| now >= end);
    if record.status == ActivityStatus::Running && !record.kind.has_remote_timer() && expired {
        let mut next = record.clone();
        next.transition(ActivityStatus::AwaitingCollection, now);
        next.cancel_requested = false;
        return Reconciliation {
            view: DerivedView::local(&next, now),
            record: next,
            signal: Some(Signal::Completed),
        };
    }
    Reconciliation::unchanged(record, now)
}

fn reconcile_running(record: &ActivityRecord, end: DateTime<Utc>, now: DateTime<Utc>, config: &TrackerConfig) -> Reconciliation {
    let mut next = record.clone();
    let signal = match record.status {
        ActivityStatus::Idle => {
            next.mark_running(now, end - now);
            next.origin = Origin::ExternallyObserved;
            Some(Signal::Started)
        }
        ActivityStatus::Pending => {
            next.mark_running(now, end - now);
            Some(Signal::Started)
        }
        ActivityStatus::Running => {
            let drift = record.expected_end_at.map_or(i64::MAX, |expected| (end - expected).num_seconds().abs());
            if drift > config.drift_tolerance_secs {
                next.expected_end_at = Some(end);
                if let Some(started_at) = next.started_at {
                    if end < started_at {
                        next.started_at = Some(now);
                    }
                }
                Some(Signal::ProgressChanged)
            } else {
                None
            }
        }
        ActivityStatus::AwaitingCollection => return Reconciliation::unchanged(record, now),
    };
    next.last_reconciled_at = Some(now);

    Reconciliation {
        view: DerivedView::with_remaining(&next, (end - now).num_seconds(), Confidence::Confirmed),
        record: next,
        signal,
    }
}

fn reconcile_stopped(record: &ActivityRecord, now: DateTime<Utc>, config: &TrackerConfig) -> Reconciliation {
    if record.status != ActivityStatus::Running {
        return Reconciliation::unchanged(record, now);
    }

    let mut next = record.clone();
    next.last_reconciled_at = Some(now);

    if record.cancel_requested {
        next.retire(now);
        return Reconciliation {
            view: DerivedView::with_remaining(&next, 0, Confidence::Confirmed),
            record: next,
            signal: Some(Signal::Cancelled),
        };
    }

    let within_window = match record.expected_end_at {
        Some(end) => now < end - config.grace_period(),
        None => false,
    };
    if within_window {
        return Reconciliation {
            view: DerivedView::local(&next, now),
            record: next,
            signal: None,
        };
    }

    next.transition(ActivityStatus::AwaitingCollection, now);
    Reconciliation {
        view: DerivedView::with_remaining(&next, 0, Confidence::Confirmed),
        record: next,
        signal: Some(Signal::Completed),
    }
}
