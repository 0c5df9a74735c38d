//! Activity coordinator: the only writer of activity records.
//!
//! Every mutating path (`start`, `cancel`, reconciliation write-back and the
//! finishing side-effects) runs under a per-kind async lock that is held
//! across the remote call, so two operations on the same kind are
//! linearized. Writes go through [`RecordStore::compare_and_swap`], which
//! also guards against a second process (CLI next to the daemon) sharing
//! the database. Reads through [`Coordinator::query`] take no lock.
//!
//! ## Finishing side-effects
//!
//! A completed run is finished in three persisted steps:
//!
//! 1. allocate an action token and store it on the AwaitingCollection record
//! 2. send the finishing plan, then mark the token applied
//! 3. retire the record to Idle
//!
//! A crash after step 1 leaves an unapplied token that [`Coordinator::recover`]
//! re-attempts exactly once on startup. A crash after step 2 only repeats
//! the retire. A plan that keeps failing is retired after
//! `max_finish_attempts` so the kind can run again.
//!
//! ## Selling on price
//!
//! Independently of any run, a fresh header price at or above the collection
//! threshold triggers one sale per observed price change, sent under its own
//! action token.

use super::activity::{ActivityKind, ActivityParams, ActivityRecord, ActivityStatus, DerivedView, Origin, Skill};
use super::clock::{Clock, SystemClock};
use super::config::Config;
use super::error::{ActivityError, RemoteError, Result};
use super::event::{ActivityEvent, EventPublisher, EventType};
use super::finish::{plan_finish, FinishPlan, FinishStep};
use super::intoxication::plan_drinks;
use super::snapshot::PageSnapshot;
use super::tracker::{reconcile, Observation};
use crate::api::{GameClient, RemoteGame, StartRequest};
use crate::db::records::{RecordStore, SqliteRecordStore};
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::RwLock;
use rand::seq::SliceRandom;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// What one maintenance pass did, per kind.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MaintenanceReport {
    /// Runs whose finishing side-effect was applied and retired to Idle.
    pub finished: Vec<ActivityKind>,
    /// Kinds restarted by auto-repeat.
    pub started: Vec<ActivityKind>,
    /// Pending records discarded by the watchdog.
    pub expired: Vec<ActivityKind>,
    /// Kinds whose processing failed; logged and retried next pass.
    pub failed: Vec<ActivityKind>,
    /// Completed runs retired after their finishing plan kept failing.
    pub abandoned: Vec<ActivityKind>,
    /// Whether bottles were sold because the price reached the threshold.
    pub sold: bool,
}

/// Result of one finishing attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FinishOutcome {
    Skipped,
    Collected,
    Abandoned,
}

/// Last bottle price read from a page header.
#[derive(Debug, Default, Clone, Copy)]
struct BottleMarket {
    price_cents: Option<u32>,
    seen_at: Option<DateTime<Utc>>,
    /// Price the last sale check already acted on.
    handled_price: Option<u32>,
}

pub struct Coordinator {
    store: Arc<dyn RecordStore>,
    remote: Arc<dyn RemoteGame>,
    publisher: Arc<dyn EventPublisher>,
    clock: Arc<dyn Clock>,
    config: Config,
    locks: [Mutex<()>; 4],
    views: RwLock<HashMap<ActivityKind, DerivedView>>,
    finish_failures: RwLock<HashMap<ActivityKind, u32>>,
    market: RwLock<BottleMarket>,
}

impl Coordinator {
    pub fn new(
        store: Arc<dyn RecordStore>,
        remote: Arc<dyn RemoteGame>,
        publisher: Arc<dyn EventPublisher>,
        clock: Arc<dyn Clock>,
        config: Config,
    ) -> Self {
        Self {
            store,
            remote,
            publisher,
            clock,
            config,
            locks: [Mutex::new(()), Mutex::new(()), Mutex::new(()), Mutex::new(())],
            views: RwLock::new(HashMap::new()),
            finish_failures: RwLock::new(HashMap::new()),
            market: RwLock::new(BottleMarket::default()),
        }
    }

    /// Wires the production collaborators: the local SQLite store, the HTTP
    /// game client and the system clock.
    pub fn open(config: Config, publisher: Arc<dyn EventPublisher>) -> anyhow::Result<Self> {
        let store = SqliteRecordStore::new(&config.server.player)?;
        let remote = GameClient::new(&config.server, config.scheduler.remote_timeout())?;
        Ok(Self::new(Arc::new(store), Arc::new(remote), publisher, Arc::new(SystemClock), config))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn lock(&self, kind: ActivityKind) -> &Mutex<()> {
        &self.locks[kind as usize]
    }

    fn load(&self, kind: ActivityKind) -> Result<ActivityRecord> {
        Ok(self.store.read(kind)?.unwrap_or_else(|| ActivityRecord::idle(kind)))
    }

    /// Persists `record` if the stored status is still `expected`.
    fn commit(&self, expected: ActivityStatus, record: &ActivityRecord) -> Result<bool> {
        debug_assert!(record.is_consistent(), "inconsistent record {:?}", record);
        let written = self.store.compare_and_swap(expected, record)?;
        if !written {
            warn!(kind = %record.kind, %expected, "record changed underneath, write skipped");
        }
        Ok(written)
    }

    fn cache(&self, view: DerivedView) {
        self.views.write().insert(view.kind, view);
    }

    fn publish(&self, event_type: EventType, view: &DerivedView, detail: Option<String>) {
        let mut event = ActivityEvent::new(event_type, self.clock.now(), view.clone());
        if let Some(detail) = detail {
            event = event.with_detail(detail);
        }
        if let Err(err) = self.publisher.publish(event) {
            warn!(kind = %view.kind, %event_type, %err, "event publish failed");
        }
    }

    async fn remote_call<T>(&self, call: impl Future<Output = std::result::Result<T, RemoteError>>) -> std::result::Result<T, RemoteError> {
        match tokio::time::timeout(self.config.scheduler.remote_timeout(), call).await {
            Ok(result) => result,
            Err(_) => Err(RemoteError::Timeout),
        }
    }

    /// Parameters used when the caller gives none (auto-repeat, plain CLI start).
    pub fn default_params(&self, kind: ActivityKind) -> ActivityParams {
        let activities = &self.config.activities;
        match kind {
            ActivityKind::Collection => ActivityParams::Collection {
                autosell: activities.collection.autosell_enabled,
                min_price_cents: activities.collection.min_price_cents(),
            },
            ActivityKind::Training => ActivityParams::Training {
                skill: activities
                    .training
                    .skills
                    .choose(&mut rand::thread_rng())
                    .copied()
                    .unwrap_or(Skill::Att),
            },
            ActivityKind::Combat => ActivityParams::Combat,
            ActivityKind::IntoxicationManagement => ActivityParams::Intoxication {
                target_promille: activities.intoxication.target_promille(),
                sober_up_after: activities.intoxication.sober_up_after,
                sober_with_food: activities.intoxication.sober_with_food,
                consumed: Vec::new(),
            },
        }
    }

    /// Starts `kind` and returns the expected end of the run.
    ///
    /// The record is Pending while the request is in flight. It becomes
    /// Running as soon as the game's answer carries a countdown (or at once
    /// for kinds the game does not time); otherwise the next snapshot
    /// confirms it.
    pub async fn start(&self, kind: ActivityKind, minutes: Option<u32>, params: Option<ActivityParams>) -> Result<DateTime<Utc>> {
        let activity = self.config.activities.for_kind(kind);
        if !activity.enabled {
            return Err(ActivityError::precondition(kind, "disabled in config"));
        }
        let minutes = minutes.unwrap_or(activity.default_duration_minutes);
        if !activity.accepts(minutes) {
            return Err(ActivityError::InvalidDuration {
                kind,
                minutes,
                allowed: activity.describe_allowed(),
            });
        }
        let mut params = params.unwrap_or_else(|| self.default_params(kind));
        if params.kind() != kind {
            return Err(ActivityError::precondition(kind, format!("parameters are for {}", params.kind())));
        }

        let _guard = self.lock(kind).lock().await;

        let current = self.load(kind)?;
        if current.is_active() {
            return Err(ActivityError::AlreadyActive {
                kind,
                status: current.status,
            });
        }

        let mut drinks = Vec::new();
        if let ActivityParams::Intoxication { target_promille, consumed, .. } = &mut params {
            let stock = self
                .remote_call(self.remote.inventory())
                .await
                .map_err(|err| ActivityError::from_remote(kind, err, false))?;
            let promille = stock.promille.ok_or_else(|| ActivityError::precondition(kind, "promille not readable"))?;
            let plan = plan_drinks(promille, *target_promille, &stock.drinks).map_err(|err| ActivityError::precondition(kind, err.to_string()))?;
            *consumed = plan.orders.iter().map(|order| order.describe()).collect();
            drinks = plan.orders;
        }

        let now = self.clock.now();
        let mut pending = current.clone();
        pending.retire(now);
        pending.transition(ActivityStatus::Pending, now);
        pending.origin = Origin::SelfInitiated;
        pending.requested_at = Some(now);
        pending.expected_duration = Some(TimeDelta::minutes(minutes as i64));
        pending.metadata = Some(params.clone());

        if !self.commit(ActivityStatus::Idle, &pending)? {
            let status = self.load(kind)?.status;
            return Err(ActivityError::AlreadyActive { kind, status });
        }
        self.cache(DerivedView::local(&pending, now));
        info!(%kind, minutes, "activity pending");

        let request = StartRequest { minutes, params, drinks };
        let ack = match self.remote_call(self.remote.start(kind, &request)).await {
            Ok(ack) => ack,
            Err(err) => {
                let now = self.clock.now();
                let mut rolled_back = pending.clone();
                rolled_back.retire(now);
                match self.commit(ActivityStatus::Pending, &rolled_back) {
                    Ok(_) => self.cache(DerivedView::local(&rolled_back, now)),
                    // The watchdog discards the Pending record later.
                    Err(store_err) => warn!(%kind, %store_err, "rollback of pending start failed"),
                }
                warn!(%kind, %err, "start rejected");
                return Err(ActivityError::from_remote(kind, err, false));
            }
        };

        let now = self.clock.now();
        let confirmed = match ack.confirmed_remaining {
            Some(secs) => Some(TimeDelta::seconds(secs)),
            None if !kind.has_remote_timer() => Some(TimeDelta::minutes(minutes as i64)),
            None => None,
        };
        let Some(remaining) = confirmed else {
            debug!(%kind, "start sent, waiting for a snapshot to confirm");
            return Ok(now + TimeDelta::minutes(minutes as i64));
        };

        let mut running = pending;
        running.mark_running(now, remaining);
        if self.commit(ActivityStatus::Pending, &running)? {
            let view = DerivedView::local(&running, now);
            self.cache(view.clone());
            self.publish(EventType::Started, &view, running.metadata.as_ref().map(ActivityParams::summary));
            info!(%kind, remaining = remaining.num_seconds(), "activity running");
        }
        Ok(running.expected_end_at.unwrap_or(now + remaining))
    }

    /// Cancels a running activity once the game confirms.
    ///
    /// A rejection keeps the run as it was. A timeout leaves
    /// `cancel_requested` set; the next snapshot showing the activity stopped
    /// completes the cancel.
    pub async fn cancel(&self, kind: ActivityKind) -> Result<DerivedView> {
        let _guard = self.lock(kind).lock().await;

        let current = self.load(kind)?;
        if current.status != ActivityStatus::Running {
            return Err(ActivityError::NotActive {
                kind,
                status: current.status,
            });
        }

        let mut requested = current.clone();
        requested.cancel_requested = true;
        if !self.commit(ActivityStatus::Running, &requested)? {
            let status = self.load(kind)?.status;
            return Err(ActivityError::NotActive { kind, status });
        }

        match self.remote_call(self.remote.cancel(kind)).await {
            Ok(()) => {
                let now = self.clock.now();
                let mut idle = requested;
                idle.retire(now);
                if !self.commit(ActivityStatus::Running, &idle)? {
                    let view = DerivedView::local(&self.load(kind)?, now);
                    self.cache(view.clone());
                    return Ok(view);
                }
                let view = DerivedView::local(&idle, now);
                self.cache(view.clone());
                self.publish(EventType::Cancelled, &view, None);
                info!(%kind, "activity cancelled");
                Ok(view)
            }
            Err(RemoteError::Timeout) => {
                let now = self.clock.now();
                self.cache(DerivedView::local(&requested, now));
                warn!(%kind, "cancel timed out, state unresolved");
                Err(ActivityError::from_remote(kind, RemoteError::Timeout, true))
            }
            Err(err) => {
                let now = self.clock.now();
                let mut restored = current;
                restored.cancel_requested = false;
                if self.commit(ActivityStatus::Running, &restored)? {
                    self.cache(DerivedView::local(&restored, now));
                } else {
                    self.cache(DerivedView::local(&self.load(kind)?, now));
                }
                warn!(%kind, %err, "cancel rejected");
                Err(ActivityError::from_remote(kind, err, false))
            }
        }
    }

    /// Scrapes the game overview within the remote timeout.
    pub async fn fetch_snapshot(&self) -> std::result::Result<PageSnapshot, RemoteError> {
        self.remote_call(self.remote.snapshot()).await
    }

    /// Last computed view of `kind`, falling back to the stored record.
    pub fn query(&self, kind: ActivityKind) -> Result<DerivedView> {
        if let Some(view) = self.views.read().get(&kind) {
            return Ok(view.clone());
        }
        let record = self.load(kind)?;
        let view = DerivedView::local(&record, self.clock.now());
        self.cache(view.clone());
        Ok(view)
    }

    pub fn query_all(&self) -> Result<Vec<DerivedView>> {
        ActivityKind::ALL.iter().map(|kind| self.query(*kind)).collect()
    }

    /// Reconciles every kind against `snapshot`.
    ///
    /// Stops at the first persistence failure; views of kinds not yet
    /// written stay as they were.
    pub async fn tick_reconcile(&self, snapshot: &PageSnapshot) -> Result<Vec<DerivedView>> {
        if let Some(price) = snapshot.bottle_price_cents {
            let mut market = self.market.write();
            market.price_cents = Some(price);
            market.seen_at = Some(snapshot.captured_at);
        }

        let mut views = Vec::with_capacity(ActivityKind::ALL.len());
        for kind in ActivityKind::ALL {
            views.push(self.reconcile_kind(kind, Some(snapshot)).await?);
        }
        Ok(views)
    }

    async fn reconcile_kind(&self, kind: ActivityKind, snapshot: Option<&PageSnapshot>) -> Result<DerivedView> {
        let _guard = self.lock(kind).lock().await;

        let record = self.load(kind)?;
        let now = self.clock.now();
        let observation = snapshot.and_then(|snapshot| Observation::from_snapshot(snapshot, kind));
        let outcome = reconcile(&record, observation, now, &self.config.tracker);

        let changed = outcome.record != record;
        if changed && !self.commit(record.status, &outcome.record)? {
            return Ok(DerivedView::local(&self.load(kind)?, now));
        }
        if changed || snapshot.is_some() {
            self.cache(outcome.view.clone());
        }

        if let Some(signal) = outcome.signal {
            info!(%kind, ?signal, status = %outcome.record.status, "reconciled");
            self.publish(EventType::from(signal), &outcome.view, None);
        }
        Ok(outcome.view)
    }

    /// Expires local-clock runs, discards stale Pending records and then
    /// runs [`Coordinator::run_due_maintenance`].
    pub async fn tick_maintenance(&self) -> MaintenanceReport {
        let mut report = MaintenanceReport::default();
        for kind in ActivityKind::ALL.into_iter().filter(|kind| !kind.has_remote_timer()) {
            if let Err(err) = self.reconcile_kind(kind, None).await {
                warn!(%kind, %err, "local expiry failed");
                report.failed.push(kind);
            }
        }
        self.watchdog(&mut report).await;

        let due = self.run_due_maintenance().await;
        report.finished.extend(due.finished);
        report.started.extend(due.started);
        report.failed.extend(due.failed);
        report.abandoned.extend(due.abandoned);
        report.sold = due.sold;
        report
    }

    /// Applies due finishing side-effects, sells on a good bottle price and
    /// auto-repeats idle kinds.
    ///
    /// Failures are logged per kind and never abort the pass.
    pub async fn run_due_maintenance(&self) -> MaintenanceReport {
        let mut report = MaintenanceReport::default();

        for kind in ActivityKind::ALL {
            let record = match self.load(kind) {
                Ok(record) => record,
                Err(err) => {
                    warn!(%kind, %err, "maintenance read failed");
                    report.failed.push(kind);
                    continue;
                }
            };

            match record.status {
                ActivityStatus::AwaitingCollection => match self.finish(kind).await {
                    Ok(FinishOutcome::Collected) => report.finished.push(kind),
                    Ok(FinishOutcome::Abandoned) => report.abandoned.push(kind),
                    Ok(FinishOutcome::Skipped) => {}
                    Err(err) => {
                        warn!(%kind, %err, "finishing failed");
                        report.failed.push(kind);
                    }
                },
                ActivityStatus::Idle if self.repeat_due(&record) => match self.start(kind, None, None).await {
                    Ok(end) => {
                        info!(%kind, %end, "auto-repeat started");
                        report.started.push(kind);
                    }
                    Err(ActivityError::AlreadyActive { .. }) => {}
                    Err(err) => {
                        warn!(%kind, %err, "auto-repeat failed");
                        report.failed.push(kind);
                    }
                },
                _ => {}
            }
        }

        match self.sell_on_price().await {
            Ok(sold) => report.sold = sold,
            Err(err) => {
                warn!(%err, "selling on price failed");
                report.failed.push(ActivityKind::Collection);
            }
        }
        report
    }

    /// Sells the stocked bottles once per observed price change when the
    /// fresh header price reaches the collection threshold.
    async fn sell_on_price(&self) -> Result<bool> {
        let kind = ActivityKind::Collection;
        let collection = &self.config.activities.collection;
        if !collection.activity.enabled || !collection.autosell_enabled {
            return Ok(false);
        }

        let market = *self.market.read();
        let (Some(price), Some(seen_at)) = (market.price_cents, market.seen_at) else {
            return Ok(false);
        };
        if market.handled_price == Some(price) || self.clock.now() - seen_at > self.config.tracker.freshness_window() {
            return Ok(false);
        }
        let min_price_cents = collection.min_price_cents();
        if price < min_price_cents {
            debug!(price, min_price_cents, "bottle price below threshold");
            self.market.write().handled_price = Some(price);
            return Ok(false);
        }

        let _guard = self.lock(kind).lock().await;
        let record = self.load(kind)?;
        // Finishing sells the cart itself; wait until the run is retired.
        if matches!(record.status, ActivityStatus::Pending | ActivityStatus::AwaitingCollection) {
            return Ok(false);
        }

        let token = self.store.next_action_token(kind)?;
        let plan = FinishPlan {
            kind,
            token,
            steps: vec![FinishStep::SellBottles { min_price_cents }],
        };
        let report = self
            .remote_call(self.remote.finish(&plan))
            .await
            .map_err(|err| ActivityError::from_remote(kind, err, false))?;
        self.market.write().handled_price = Some(price);

        info!(price, min_price_cents, token, "bottle price reached threshold");
        if let Some(detail) = report.summary() {
            let view = DerivedView::local(&record, self.clock.now());
            self.publish(EventType::ProgressChanged, &view, Some(detail));
        }
        Ok(true)
    }

    fn repeat_due(&self, record: &ActivityRecord) -> bool {
        let activity = self.config.activities.for_kind(record.kind);
        let eligible = record.next_eligible_at.map_or(true, |at| self.clock.now() >= at);
        activity.enabled && activity.auto_repeat && eligible
    }

    /// Applies the finishing plan of an AwaitingCollection record exactly once.
    async fn finish(&self, kind: ActivityKind) -> Result<FinishOutcome> {
        let _guard = self.lock(kind).lock().await;

        let mut record = self.load(kind)?;
        if record.status != ActivityStatus::AwaitingCollection {
            return Ok(FinishOutcome::Skipped);
        }

        let mut outcome = FinishOutcome::Collected;
        if !record.token_applied {
            let token = match record.action_token {
                Some(token) => {
                    info!(%kind, token, "re-attempting unapplied finishing step");
                    token
                }
                None => {
                    let token = self.store.next_action_token(kind)?;
                    record.action_token = Some(token);
                    if !self.commit(ActivityStatus::AwaitingCollection, &record)? {
                        return Ok(FinishOutcome::Skipped);
                    }
                    token
                }
            };

            let plan = plan_finish(&record, token);
            let detail = if plan.is_empty() {
                None
            } else {
                match self.remote_call(self.remote.finish(&plan)).await {
                    Ok(report) => {
                        self.finish_failures.write().remove(&kind);
                        report.summary()
                    }
                    Err(err) => {
                        let attempts = {
                            let mut failures = self.finish_failures.write();
                            let attempts = failures.entry(kind).or_insert(0);
                            *attempts += 1;
                            *attempts
                        };
                        if attempts < self.config.scheduler.max_finish_attempts {
                            return Err(ActivityError::from_remote(kind, err, false));
                        }
                        self.finish_failures.write().remove(&kind);
                        warn!(%kind, token, attempts, %err, "finishing keeps failing, retiring the run");
                        outcome = FinishOutcome::Abandoned;
                        Some(format!("finishing abandoned after {} attempts: {}", attempts, err))
                    }
                }
            };

            let now = self.clock.now();
            let pause = {
                let window = self.config.activities.for_kind(kind).pause_window();
                window.sample(&mut rand::thread_rng())
            };
            record.token_applied = true;
            record.last_completed_at = Some(now);
            record.next_eligible_at = Some(now + pause);
            if !self.commit(ActivityStatus::AwaitingCollection, &record)? {
                return Ok(FinishOutcome::Skipped);
            }

            let view = DerivedView::local(&record, now);
            if let Some(detail) = detail {
                self.publish(EventType::ProgressChanged, &view, Some(detail));
            }
            debug!(%kind, token, pause = pause.num_seconds(), "finishing applied");
        }

        let now = self.clock.now();
        let mut idle = record;
        idle.retire(now);
        if !self.commit(ActivityStatus::AwaitingCollection, &idle)? {
            return Ok(FinishOutcome::Skipped);
        }
        self.cache(DerivedView::local(&idle, now));
        info!(%kind, "activity collected");
        Ok(outcome)
    }

    /// Discards Pending records whose start was never confirmed.
    async fn watchdog(&self, report: &mut MaintenanceReport) {
        let timeout = self.config.scheduler.pending_timeout();
        for kind in ActivityKind::ALL {
            let _guard = self.lock(kind).lock().await;
            let record = match self.load(kind) {
                Ok(record) => record,
                Err(err) => {
                    warn!(%kind, %err, "watchdog read failed");
                    continue;
                }
            };
            let now = self.clock.now();
            let stale = record.status == ActivityStatus::Pending && record.requested_at.map_or(true, |at| now - at > timeout);
            if !stale {
                continue;
            }

            let mut idle = record;
            idle.retire(now);
            match self.commit(ActivityStatus::Pending, &idle) {
                Ok(true) => {
                    warn!(%kind, "pending start never confirmed, discarded");
                    self.cache(DerivedView::local(&idle, now));
                    report.expired.push(kind);
                }
                Ok(false) => {}
                Err(err) => {
                    warn!(%kind, %err, "watchdog write failed");
                    report.failed.push(kind);
                }
            }
        }
    }

    /// Startup recovery: finishes every run left with an unapplied action
    /// token, then discards stale Pending records.
    pub async fn recover(&self) -> Result<MaintenanceReport> {
        let mut report = MaintenanceReport::default();
        for record in self.store.read_all()? {
            let interrupted = record.status == ActivityStatus::AwaitingCollection && record.action_token.is_some() && !record.token_applied;
            if !interrupted {
                continue;
            }
            match self.finish(record.kind).await {
                Ok(FinishOutcome::Collected) => report.finished.push(record.kind),
                Ok(FinishOutcome::Abandoned) => report.abandoned.push(record.kind),
                Ok(FinishOutcome::Skipped) => {}
                Err(err) => {
                    warn!(kind = %record.kind, %err, "recovery failed");
                    report.failed.push(record.kind);
                }
            }
        }
        self.watchdog(&mut report).await;
        Ok(report)
    }
}
