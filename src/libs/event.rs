//! Activity events and their fan-out to subscribers.
//!
//! The coordinator publishes fire-and-forget: a failed publish is logged
//! and never retried. Subscribers must tolerate duplicates (at-least-once).

use super::activity::{ActivityKind, DerivedView};
use super::tracker::Signal;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use thiserror::Error;
use tokio::sync::broadcast;

/// Events kept for late subscribers (dashboards).
pub const HISTORY_LIMIT: usize = 100;
const CHANNEL_CAPACITY: usize = 256;

#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Started,
    Completed,
    Cancelled,
    ProgressChanged,
}

impl From<Signal> for EventType {
    fn from(signal: Signal) -> Self {
        match signal {
            Signal::Started => EventType::Started,
            Signal::Completed => EventType::Completed,
            Signal::Cancelled => EventType::Cancelled,
            Signal::ProgressChanged => EventType::ProgressChanged,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            EventType::Started => "started",
            EventType::Completed => "completed",
            EventType::Cancelled => "cancelled",
            EventType::ProgressChanged => "progress_changed",
        };
        write!(f, "{}", name)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ActivityEvent {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub kind: ActivityKind,
    pub at: DateTime<Utc>,
    /// View of the record right after the transition.
    pub payload: DerivedView,
    /// Human-readable extra, e.g. what a finishing step did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ActivityEvent {
    pub fn new(event_type: EventType, at: DateTime<Utc>, payload: DerivedView) -> Self {
        Self {
            event_type,
            kind: payload.kind,
            at,
            payload,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl fmt::Display for ActivityEvent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.event_type)?;
        if let Some(detail) = &self.detail {
            write!(f, ": {}", detail)?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("event sink closed")]
    Closed,
    #[error("event sink failed: {0}")]
    Sink(String),
}

/// Sink for state-change notifications.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: ActivityEvent) -> Result<(), PublishError>;
}

/// Publisher backed by a tokio broadcast channel plus a bounded history.
pub struct BroadcastPublisher {
    tx: broadcast::Sender<ActivityEvent>,
    history: Mutex<VecDeque<ActivityEvent>>,
}

impl BroadcastPublisher {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            tx,
            history: Mutex::new(VecDeque::with_capacity(HISTORY_LIMIT)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ActivityEvent> {
        self.tx.subscribe()
    }

    /// Most recent events, oldest first.
    pub fn history(&self) -> Vec<ActivityEvent> {
        self.history.lock().iter().cloned().collect()
    }
}

impl Default for BroadcastPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl EventPublisher for BroadcastPublisher {
    fn publish(&self, event: ActivityEvent) -> Result<(), PublishError> {
        {
            let mut history = self.history.lock();
            if history.len() == HISTORY_LIMIT {
                history.pop_front();
            }
            history.push_back(event.clone());
        }

        // No subscriber is not an error; the history still has the event.
        if self.tx.receiver_count() == 0 {
            return Ok(());
        }
        self.tx.send(event).map(|_| ()).map_err(|_| PublishError::Closed)
    }
}
