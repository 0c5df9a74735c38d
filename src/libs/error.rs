//! Error types for the activity core.
//!
//! The core uses a small hierarchy:
//! - `ActivityError` is what `start`, `cancel` and the tick entry points return
//! - `StoreError` describes persistence failures and folds into `ActivityError::Persistence`
//! - `RemoteError` describes failures talking to the game
//!
//! CLI commands and the daemon wrap these in `anyhow` like the rest of the
//! application does.

use super::activity::{ActivityKind, ActivityStatus};
use thiserror::Error;

/// Result alias for coordinator operations.
pub type Result<T> = std::result::Result<T, ActivityError>;

#[derive(Debug, Error)]
pub enum ActivityError {
    /// A record of this kind is already in progress.
    #[error("{kind} is already active ({status})")]
    AlreadyActive { kind: ActivityKind, status: ActivityStatus },

    /// Cancel was requested for a kind that is not running.
    #[error("{kind} is not running ({status})")]
    NotActive { kind: ActivityKind, status: ActivityStatus },

    /// Requested duration is outside the configured bounds or allowed steps.
    #[error("invalid duration for {kind}: {minutes} min (allowed {allowed})")]
    InvalidDuration { kind: ActivityKind, minutes: u32, allowed: String },

    /// Start preconditions failed (kind disabled, missing resources).
    #[error("cannot start {kind}: {reason}")]
    Precondition { kind: ActivityKind, reason: String },

    /// The game refused the request.
    #[error("game rejected {kind}: {reason}")]
    RemoteRejected { kind: ActivityKind, reason: String },

    /// The game did not answer in time.
    ///
    /// `manual_verification` is set when the local state could not be
    /// resolved and the player should look at the game page.
    #[error("game did not answer for {kind} in time{}", verify_hint(.manual_verification))]
    RemoteTimeout { kind: ActivityKind, manual_verification: bool },

    /// Local storage failed; the pass is aborted and retried on the next tick.
    #[error("persistence error: {0}")]
    Persistence(#[from] StoreError),
}

impl ActivityError {
    pub fn remote_rejected(kind: ActivityKind, reason: impl Into<String>) -> Self {
        Self::RemoteRejected { kind, reason: reason.into() }
    }

    pub fn precondition(kind: ActivityKind, reason: impl Into<String>) -> Self {
        Self::Precondition { kind, reason: reason.into() }
    }

    /// Converts a remote failure into the taxonomy used by callers.
    pub fn from_remote(kind: ActivityKind, err: RemoteError, manual_verification: bool) -> Self {
        match err {
            RemoteError::Timeout => Self::RemoteTimeout { kind, manual_verification },
            other => Self::RemoteRejected { kind, reason: other.to_string() },
        }
    }

    /// Transient failures the caller may retry as-is.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RemoteRejected { .. } | Self::Persistence(_) => true,
            Self::RemoteTimeout { manual_verification, .. } => !manual_verification,
            _ => false,
        }
    }

    /// Whether the player needs to check the game before retrying.
    pub fn needs_manual_verification(&self) -> bool {
        matches!(self, Self::RemoteTimeout { manual_verification: true, .. })
    }

    /// Stable machine-readable code for API layers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::AlreadyActive { .. } => "already_active",
            Self::NotActive { .. } => "not_active",
            Self::InvalidDuration { .. } => "invalid_duration",
            Self::Precondition { .. } => "precondition_failed",
            Self::RemoteRejected { .. } => "remote_rejected",
            Self::RemoteTimeout { .. } => "remote_timeout",
            Self::Persistence(_) => "persistence_error",
        }
    }
}

fn verify_hint(manual_verification: &bool) -> &'static str {
    if *manual_verification {
        ", verify manually"
    } else {
        ""
    }
}

/// Persistence failures of the record store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("metadata json: {0}")]
    Json(#[from] serde_json::Error),

    /// A stored row could not be mapped back to a record.
    #[error("corrupt record for {kind}: {reason}")]
    Corrupt { kind: String, reason: String },

    /// Storage is unavailable (used by tests and in-memory stores).
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Failures talking to the game server.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The game answered but refused the action.
    #[error("rejected: {0}")]
    Rejected(String),

    #[error("request timed out")]
    Timeout,

    #[error("http: {0}")]
    Http(#[from] reqwest::Error),

    /// The action has no remote counterpart (e.g. starting a fight).
    #[error("not supported by the game client")]
    Unsupported,
}
