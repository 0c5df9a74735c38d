//! Seam between the activity core and the game server.
//!
//! The coordinator only talks to the game through [`RemoteGame`], so tests
//! can drive it with a stub and the daemon with the reqwest-backed
//! [`GameClient`]. Every call may suspend; the coordinator wraps each one in
//! the configured timeout.

use crate::libs::activity::{ActivityKind, ActivityParams};
use crate::libs::error::RemoteError;
use crate::libs::finish::{FinishPlan, FinishReport};
use crate::libs::intoxication::DrinkOrder;
use crate::libs::snapshot::PageSnapshot;
use async_trait::async_trait;

pub mod game;

pub use game::GameClient;

/// Everything the game needs to start one run.
#[derive(Clone, Debug, PartialEq)]
pub struct StartRequest {
    pub minutes: u32,
    pub params: ActivityParams,
    /// Drinks to consume, in order (intoxication only).
    pub drinks: Vec<DrinkOrder>,
}

/// The game's answer to a start request.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StartAck {
    /// Countdown read from the response page, when it carried one.
    pub confirmed_remaining: Option<i64>,
}

#[async_trait]
pub trait RemoteGame: Send + Sync {
    async fn start(&self, kind: ActivityKind, request: &StartRequest) -> Result<StartAck, RemoteError>;

    async fn cancel(&self, kind: ActivityKind) -> Result<(), RemoteError>;

    /// Applies the finishing steps of a completed run.
    async fn finish(&self, plan: &FinishPlan) -> Result<FinishReport, RemoteError>;

    /// Scrapes the overview page.
    async fn snapshot(&self) -> Result<PageSnapshot, RemoteError>;

    /// Scrapes the stock page: promille, drinks and bottles.
    async fn inventory(&self) -> Result<PageSnapshot, RemoteError>;
}
