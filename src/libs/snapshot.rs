//! Structured view of one scrape of the game pages.
//!
//! A [`PageSnapshot`] is ephemeral: it is produced by the parser for every
//! fetch and consumed by one reconciliation pass. Every field is optional
//! because scraping is lossy; a missing entry means "no information", never
//! "activity stopped".

use super::activity::ActivityKind;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What the page header says about one activity kind.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq)]
pub struct SnapshotEntry {
    pub is_running: bool,
    pub seconds_remaining: Option<i64>,
}

impl SnapshotEntry {
    pub fn running(seconds_remaining: i64) -> Self {
        Self {
            is_running: true,
            seconds_remaining: Some(seconds_remaining),
        }
    }

    pub fn stopped() -> Self {
        Self {
            is_running: false,
            seconds_remaining: None,
        }
    }

    /// Builds an entry from a raw header counter; positive means running.
    pub fn from_counter(seconds: i64) -> Self {
        if seconds > 0 {
            Self::running(seconds)
        } else {
            Self::stopped()
        }
    }
}

/// One drink in the player's stock, as offered by the use form.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DrinkStock {
    pub name: String,
    pub item_id: String,
    /// Effect in hundredths of a promille, as the form submits it.
    pub promille_raw: String,
    pub count: u32,
}

impl DrinkStock {
    /// Effect of one unit in promille.
    pub fn effect(&self) -> f64 {
        self.promille_raw.trim().parse::<f64>().map(|v| v / 100.0).unwrap_or(0.0)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PageSnapshot {
    pub captured_at: DateTime<Utc>,
    pub entries: HashMap<ActivityKind, SnapshotEntry>,
    pub bottle_price_cents: Option<u32>,
    pub bottle_count: Option<u32>,
    pub promille: Option<f64>,
    pub drinks: Vec<DrinkStock>,
}

impl PageSnapshot {
    pub fn new(captured_at: DateTime<Utc>) -> Self {
        Self {
            captured_at,
            entries: HashMap::new(),
            bottle_price_cents: None,
            bottle_count: None,
            promille: None,
            drinks: Vec::new(),
        }
    }

    pub fn with_entry(mut self, kind: ActivityKind, entry: SnapshotEntry) -> Self {
        self.entries.insert(kind, entry);
        self
    }

    pub fn entry(&self, kind: ActivityKind) -> Option<SnapshotEntry> {
        self.entries.get(&kind).copied()
    }

    pub fn age(&self, now: DateTime<Utc>) -> TimeDelta {
        now - self.captured_at
    }

    /// Copies ancillary fields that `other` knows and `self` does not.
    ///
    /// Used when a secondary page (stock, drinks) is fetched alongside the
    /// overview and only fills part of the snapshot.
    pub fn merge(&mut self, other: PageSnapshot) {
        for (kind, entry) in other.entries {
            self.entries.entry(kind).or_insert(entry);
        }
        self.bottle_price_cents = self.bottle_price_cents.or(other.bottle_price_cents);
        self.bottle_count = self.bottle_count.or(other.bottle_count);
        self.promille = self.promille.or(other.promille);
        if self.drinks.is_empty() {
            self.drinks = other.drinks;
        }
    }
}
