#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::{DateTime, TimeDelta, TimeZone, Utc};
    use parking_lot::Mutex;
    use pennerbot::api::{RemoteGame, StartAck, StartRequest};
    use pennerbot::db::db::Db;
    use pennerbot::db::records::{RecordStore, SqliteRecordStore};
    use pennerbot::libs::activity::{ActivityKind, ActivityParams, ActivityRecord, ActivityStatus, Confidence};
    use pennerbot::libs::clock::ManualClock;
    use pennerbot::libs::config::Config;
    use pennerbot::libs::coordinator::Coordinator;
    use pennerbot::libs::error::{ActivityError, RemoteError};
    use pennerbot::libs::event::{BroadcastPublisher, EventType};
    use pennerbot::libs::finish::{FinishPlan, FinishReport, FinishStep};
    use pennerbot::libs::snapshot::{DrinkStock, PageSnapshot, SnapshotEntry};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default, Clone, Copy)]
    enum CancelOutcome {
        #[default]
        Confirmed,
        Timeout,
        Rejected,
    }

    /// Game stub counting every call it receives.
    #[derive(Default)]
    struct StubGame {
        starts: AtomicUsize,
        cancels: AtomicUsize,
        finishes: AtomicUsize,
        ack_seconds: Option<i64>,
        reject_start: bool,
        fail_finish: bool,
        cancel_outcome: CancelOutcome,
        /// Store touched by "another process" while a cancel is in flight.
        retire_during_cancel: Mutex<Option<SqliteRecordStore>>,
        inventory: Option<PageSnapshot>,
        last_start: Mutex<Option<StartRequest>>,
        last_finish: Mutex<Option<FinishPlan>>,
    }

    #[async_trait]
    impl RemoteGame for StubGame {
        async fn start(&self, _kind: ActivityKind, request: &StartRequest) -> Result<StartAck, RemoteError> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            *self.last_start.lock() = Some(request.clone());
            if self.reject_start {
                return Err(RemoteError::Rejected("not logged in".to_string()));
            }
            Ok(StartAck {
                confirmed_remaining: self.ack_seconds,
            })
        }

        async fn cancel(&self, kind: ActivityKind) -> Result<(), RemoteError> {
            self.cancels.fetch_add(1, Ordering::SeqCst);
            let other = self.retire_during_cancel.lock().clone();
            if let Some(store) = other {
                let mut record = store.read(kind).unwrap().unwrap();
                record.retire(at(1));
                store.write(&record).unwrap();
            }
            match self.cancel_outcome {
                CancelOutcome::Confirmed => Ok(()),
                CancelOutcome::Timeout => Err(RemoteError::Timeout),
                CancelOutcome::Rejected => Err(RemoteError::Rejected("nothing to cancel".to_string())),
            }
        }

        async fn finish(&self, plan: &FinishPlan) -> Result<FinishReport, RemoteError> {
            self.finishes.fetch_add(1, Ordering::SeqCst);
            *self.last_finish.lock() = Some(plan.clone());
            if self.fail_finish {
                return Err(RemoteError::Rejected("sell form not found".to_string()));
            }
            let mut report = FinishReport::default();
            report.note("cart emptied");
            Ok(report)
        }

        async fn snapshot(&self) -> Result<PageSnapshot, RemoteError> {
            Err(RemoteError::Unsupported)
        }

        async fn inventory(&self) -> Result<PageSnapshot, RemoteError> {
            self.inventory.clone().ok_or(RemoteError::Unsupported)
        }
    }

    struct Harness {
        coordinator: Coordinator,
        game: Arc<StubGame>,
        clock: ManualClock,
        events: Arc<BroadcastPublisher>,
        store: SqliteRecordStore,
    }

    impl Harness {
        fn new(game: StubGame, config: Config) -> Self {
            let store = SqliteRecordStore::from_db(Db::in_memory().unwrap(), "tester");
            let game = Arc::new(game);
            let clock = ManualClock::new(at(0));
            let events = Arc::new(BroadcastPublisher::new());
            let coordinator = Coordinator::new(
                Arc::new(store.clone()),
                game.clone(),
                events.clone(),
                Arc::new(clock.clone()),
                config,
            );
            Self {
                coordinator,
                game,
                clock,
                events,
                store,
            }
        }

        fn event_types(&self) -> Vec<EventType> {
            self.events.history().iter().map(|event| event.event_type).collect()
        }

        fn stored(&self, kind: ActivityKind) -> ActivityRecord {
            self.store.read(kind).unwrap().unwrap_or_else(|| ActivityRecord::idle(kind))
        }

        fn advance(&self, secs: i64) {
            self.clock.advance(TimeDelta::seconds(secs));
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn acking(seconds: i64) -> StubGame {
        StubGame {
            ack_seconds: Some(seconds),
            ..StubGame::default()
        }
    }

    fn awaiting_collection(autosell: bool) -> ActivityRecord {
        let mut record = ActivityRecord::idle(ActivityKind::Collection);
        record.mark_running(at(-600), TimeDelta::seconds(600));
        record.metadata = Some(ActivityParams::Collection {
            autosell,
            min_price_cents: 20,
        });
        record.transition(ActivityStatus::AwaitingCollection, at(0));
        record
    }

    #[tokio::test]
    async fn test_start_without_countdown_stays_pending() {
        let h = Harness::new(StubGame::default(), Config::default());

        let end = h.coordinator.start(ActivityKind::Training, Some(60), None).await.unwrap();

        assert_eq!(end, at(3600));
        let view = h.coordinator.query(ActivityKind::Training).unwrap();
        assert!(view.pending);
        assert!(!view.running);
        assert_eq!(h.stored(ActivityKind::Training).status, ActivityStatus::Pending);
        assert!(h.event_types().is_empty());
    }

    #[tokio::test]
    async fn test_pending_start_confirmed_by_snapshot() {
        let h = Harness::new(StubGame::default(), Config::default());
        h.coordinator.start(ActivityKind::Training, Some(60), None).await.unwrap();

        h.advance(5);
        let snapshot = PageSnapshot::new(at(5)).with_entry(ActivityKind::Training, SnapshotEntry::running(3595));
        h.coordinator.tick_reconcile(&snapshot).await.unwrap();

        let view = h.coordinator.query(ActivityKind::Training).unwrap();
        assert!(view.running);
        assert_eq!(view.seconds_remaining, 3595);
        assert_eq!(view.confidence, Confidence::Confirmed);
        assert_eq!(h.event_types(), vec![EventType::Started]);
    }

    #[tokio::test]
    async fn test_start_with_countdown_runs_at_once() {
        let h = Harness::new(acking(1800), Config::default());

        let end = h.coordinator.start(ActivityKind::Collection, Some(30), None).await.unwrap();

        assert_eq!(end, at(1800));
        let record = h.stored(ActivityKind::Collection);
        assert_eq!(record.status, ActivityStatus::Running);
        assert_eq!(record.expected_end_at, Some(at(1800)));
        assert_eq!(h.event_types(), vec![EventType::Started]);
        assert_eq!(h.events.history()[0].detail.as_deref(), Some("no autosell"));
    }

    #[tokio::test]
    async fn test_concurrent_starts_admit_one() {
        let h = Harness::new(acking(600), Config::default());

        let (first, second) = tokio::join!(
            h.coordinator.start(ActivityKind::Collection, Some(10), None),
            h.coordinator.start(ActivityKind::Collection, Some(10), None)
        );

        let results = [first, second];
        assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|result| matches!(result, Err(ActivityError::AlreadyActive { .. }))));
        assert_eq!(h.game.starts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_start_checks_preconditions() {
        let h = Harness::new(acking(600), Config::default());

        let err = h.coordinator.start(ActivityKind::Collection, Some(11), None).await.unwrap_err();
        assert!(matches!(err, ActivityError::InvalidDuration { minutes: 11, .. }));

        // Combat is observe-only and disabled by default.
        let err = h.coordinator.start(ActivityKind::Combat, None, None).await.unwrap_err();
        assert!(matches!(err, ActivityError::Precondition { .. }));

        let wrong = ActivityParams::Combat;
        let err = h.coordinator.start(ActivityKind::Training, None, Some(wrong)).await.unwrap_err();
        assert!(matches!(err, ActivityError::Precondition { .. }));

        assert_eq!(h.game.starts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_rejected_start_rolls_back_to_idle() {
        let game = StubGame {
            reject_start: true,
            ..StubGame::default()
        };
        let h = Harness::new(game, Config::default());

        let err = h.coordinator.start(ActivityKind::Training, Some(60), None).await.unwrap_err();

        assert!(matches!(err, ActivityError::RemoteRejected { .. }));
        assert!(err.is_retryable());
        assert_eq!(h.stored(ActivityKind::Training).status, ActivityStatus::Idle);
        assert_eq!(h.coordinator.query(ActivityKind::Training).unwrap().status, ActivityStatus::Idle);
        assert!(h.event_types().is_empty());
    }

    #[tokio::test]
    async fn test_collection_run_from_start_to_collected() {
        let h = Harness::new(acking(600), Config::default());
        h.coordinator.start(ActivityKind::Collection, Some(10), None).await.unwrap();

        // The page is 20 seconds behind the local prediction.
        h.advance(100);
        let snapshot = PageSnapshot::new(at(100)).with_entry(ActivityKind::Collection, SnapshotEntry::running(480));
        h.coordinator.tick_reconcile(&snapshot).await.unwrap();
        assert_eq!(h.stored(ActivityKind::Collection).expected_end_at, Some(at(580)));

        // Too early to believe "not running".
        h.advance(200);
        let snapshot = PageSnapshot::new(at(300)).with_entry(ActivityKind::Collection, SnapshotEntry::stopped());
        h.coordinator.tick_reconcile(&snapshot).await.unwrap();
        let view = h.coordinator.query(ActivityKind::Collection).unwrap();
        assert!(view.running);
        assert_eq!(view.confidence, Confidence::Unconfirmed);

        h.advance(278);
        let snapshot = PageSnapshot::new(at(578)).with_entry(ActivityKind::Collection, SnapshotEntry::stopped());
        h.coordinator.tick_reconcile(&snapshot).await.unwrap();
        assert!(h.coordinator.query(ActivityKind::Collection).unwrap().awaiting_collection);

        let report = h.coordinator.tick_maintenance().await;

        assert_eq!(report.finished, vec![ActivityKind::Collection]);
        assert!(report.failed.is_empty());
        assert_eq!(h.game.finishes.load(Ordering::SeqCst), 1);
        let plan = h.game.last_finish.lock().clone().unwrap();
        assert_eq!(plan.steps, vec![FinishStep::EmptyCart]);

        let record = h.stored(ActivityKind::Collection);
        assert_eq!(record.status, ActivityStatus::Idle);
        assert_eq!(record.last_completed_at, Some(at(578)));
        assert!(record.next_eligible_at.unwrap() > at(578));
        assert_eq!(
            h.event_types(),
            vec![
                EventType::Started,
                EventType::ProgressChanged,
                EventType::Completed,
                EventType::ProgressChanged
            ]
        );
        assert_eq!(h.events.history()[3].detail.as_deref(), Some("cart emptied"));
    }

    #[tokio::test]
    async fn test_tick_reconcile_is_idempotent() {
        let h = Harness::new(acking(3600), Config::default());
        h.coordinator.start(ActivityKind::Training, Some(60), None).await.unwrap();

        h.advance(100);
        let snapshot = PageSnapshot::new(at(100)).with_entry(ActivityKind::Training, SnapshotEntry::running(3500));
        let first = h.coordinator.tick_reconcile(&snapshot).await.unwrap();
        let record = h.stored(ActivityKind::Training);
        let second = h.coordinator.tick_reconcile(&snapshot).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(h.stored(ActivityKind::Training), record);
        assert_eq!(h.event_types(), vec![EventType::Started]);
    }

    #[tokio::test]
    async fn test_cancel_requires_running() {
        let h = Harness::new(StubGame::default(), Config::default());

        let err = h.coordinator.cancel(ActivityKind::Training).await.unwrap_err();

        assert!(matches!(
            err,
            ActivityError::NotActive {
                status: ActivityStatus::Idle,
                ..
            }
        ));
        assert_eq!(h.game.cancels.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancel_confirmed_retires_run() {
        let h = Harness::new(acking(3600), Config::default());
        h.coordinator.start(ActivityKind::Training, Some(60), None).await.unwrap();

        let view = h.coordinator.cancel(ActivityKind::Training).await.unwrap();

        assert_eq!(view.status, ActivityStatus::Idle);
        assert_eq!(h.stored(ActivityKind::Training).status, ActivityStatus::Idle);
        assert_eq!(h.event_types(), vec![EventType::Started, EventType::Cancelled]);
    }

    #[tokio::test]
    async fn test_cancel_timeout_needs_manual_verification() {
        let game = StubGame {
            ack_seconds: Some(3600),
            cancel_outcome: CancelOutcome::Timeout,
            ..StubGame::default()
        };
        let h = Harness::new(game, Config::default());
        h.coordinator.start(ActivityKind::Training, Some(60), None).await.unwrap();

        let err = h.coordinator.cancel(ActivityKind::Training).await.unwrap_err();

        assert!(err.needs_manual_verification());
        let record = h.stored(ActivityKind::Training);
        assert_eq!(record.status, ActivityStatus::Running);
        assert!(record.cancel_requested);

        // A later page showing training stopped completes the cancel.
        h.advance(60);
        let snapshot = PageSnapshot::new(at(60)).with_entry(ActivityKind::Training, SnapshotEntry::stopped());
        h.coordinator.tick_reconcile(&snapshot).await.unwrap();

        assert_eq!(h.stored(ActivityKind::Training).status, ActivityStatus::Idle);
        assert_eq!(h.event_types(), vec![EventType::Started, EventType::Cancelled]);
    }

    #[tokio::test]
    async fn test_rejected_cancel_keeps_run() {
        let game = StubGame {
            ack_seconds: Some(3600),
            cancel_outcome: CancelOutcome::Rejected,
            ..StubGame::default()
        };
        let h = Harness::new(game, Config::default());
        h.coordinator.start(ActivityKind::Training, Some(60), None).await.unwrap();

        let err = h.coordinator.cancel(ActivityKind::Training).await.unwrap_err();

        assert!(matches!(err, ActivityError::RemoteRejected { .. }));
        let record = h.stored(ActivityKind::Training);
        assert_eq!(record.status, ActivityStatus::Running);
        assert!(!record.cancel_requested);
    }

    #[tokio::test]
    async fn test_recover_applies_unapplied_token_exactly_once() {
        let h = Harness::new(StubGame::default(), Config::default());
        let mut record = awaiting_collection(true);
        let token = h.store.next_action_token(ActivityKind::Collection).unwrap();
        record.action_token = Some(token);
        h.store.write(&record).unwrap();

        let report = h.coordinator.recover().await.unwrap();

        assert_eq!(report.finished, vec![ActivityKind::Collection]);
        let plan = h.game.last_finish.lock().clone().unwrap();
        assert_eq!(plan.token, token);
        assert_eq!(
            plan.steps,
            vec![FinishStep::EmptyCart, FinishStep::SellBottles { min_price_cents: 20 }]
        );
        assert_eq!(h.stored(ActivityKind::Collection).status, ActivityStatus::Idle);

        let again = h.coordinator.recover().await.unwrap();
        assert!(again.finished.is_empty());
        assert_eq!(h.game.finishes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_applied_token_is_not_sent_again() {
        let h = Harness::new(StubGame::default(), Config::default());
        let mut record = awaiting_collection(false);
        record.action_token = Some(h.store.next_action_token(ActivityKind::Collection).unwrap());
        record.token_applied = true;
        h.store.write(&record).unwrap();

        let report = h.coordinator.run_due_maintenance().await;

        assert_eq!(report.finished, vec![ActivityKind::Collection]);
        assert_eq!(h.game.finishes.load(Ordering::SeqCst), 0);
        assert_eq!(h.stored(ActivityKind::Collection).status, ActivityStatus::Idle);
    }

    #[tokio::test]
    async fn test_watchdog_discards_unconfirmed_pending() {
        let h = Harness::new(StubGame::default(), Config::default());
        h.coordinator.start(ActivityKind::Training, Some(60), None).await.unwrap();

        h.advance(60);
        assert!(h.coordinator.tick_maintenance().await.expired.is_empty());

        h.advance(61);
        let report = h.coordinator.tick_maintenance().await;

        assert_eq!(report.expired, vec![ActivityKind::Training]);
        assert_eq!(h.stored(ActivityKind::Training).status, ActivityStatus::Idle);
        assert!(!h.coordinator.query(ActivityKind::Training).unwrap().pending);
    }

    #[tokio::test]
    async fn test_auto_repeat_starts_idle_kind() {
        let mut config = Config::default();
        config.activities.training.activity.auto_repeat = true;
        let h = Harness::new(StubGame::default(), config);

        let report = h.coordinator.tick_maintenance().await;
        assert_eq!(report.started, vec![ActivityKind::Training]);

        // Still pending: nothing to repeat.
        let report = h.coordinator.tick_maintenance().await;
        assert!(report.started.is_empty());
        assert_eq!(h.game.starts.load(Ordering::SeqCst), 1);

        let request = h.game.last_start.lock().clone().unwrap();
        assert!(matches!(request.params, ActivityParams::Training { .. }));
        assert_eq!(request.minutes, 60);
    }

    #[tokio::test]
    async fn test_auto_repeat_waits_for_pause() {
        let mut config = Config::default();
        config.activities.collection.activity.auto_repeat = true;
        let h = Harness::new(acking(3600), config);
        h.store.write(&awaiting_collection(false)).unwrap();

        let report = h.coordinator.tick_maintenance().await;
        assert_eq!(report.finished, vec![ActivityKind::Collection]);
        assert!(report.started.is_empty());

        // Default pause is 5 minutes +/- 20%.
        h.advance(60);
        assert!(h.coordinator.tick_maintenance().await.started.is_empty());

        h.advance(6 * 60);
        let report = h.coordinator.tick_maintenance().await;
        assert_eq!(report.started, vec![ActivityKind::Collection]);
        assert_eq!(h.stored(ActivityKind::Collection).status, ActivityStatus::Running);
    }

    #[tokio::test]
    async fn test_intoxication_window_ends_on_local_clock() {
        let mut stock = PageSnapshot::new(at(0));
        stock.promille = Some(0.5);
        stock.drinks = vec![
            DrinkStock {
                name: "Bier".to_string(),
                item_id: "1".to_string(),
                promille_raw: "35".to_string(),
                count: 10,
            },
            DrinkStock {
                name: "Wodka".to_string(),
                item_id: "2".to_string(),
                promille_raw: "200".to_string(),
                count: 3,
            },
        ];
        let game = StubGame {
            inventory: Some(stock),
            ..StubGame::default()
        };
        let h = Harness::new(game, Config::default());

        h.coordinator.start(ActivityKind::IntoxicationManagement, None, None).await.unwrap();

        let request = h.game.last_start.lock().clone().unwrap();
        assert_eq!(request.drinks.len(), 1);
        assert_eq!(request.drinks[0].name, "Wodka");
        let view = h.coordinator.query(ActivityKind::IntoxicationManagement).unwrap();
        assert!(view.running);
        match view.metadata {
            Some(ActivityParams::Intoxication { consumed, .. }) => assert_eq!(consumed, vec!["1x Wodka (+2.00‰)".to_string()]),
            other => panic!("unexpected metadata {:?}", other),
        }

        h.advance(30 * 60);
        let report = h.coordinator.tick_maintenance().await;

        assert_eq!(report.finished, vec![ActivityKind::IntoxicationManagement]);
        // Nothing to send without sober_up_after.
        assert_eq!(h.game.finishes.load(Ordering::SeqCst), 0);
        assert_eq!(h.stored(ActivityKind::IntoxicationManagement).status, ActivityStatus::Idle);
        assert_eq!(h.event_types(), vec![EventType::Started, EventType::Completed]);
    }

    #[tokio::test]
    async fn test_cancel_lost_to_concurrent_write_publishes_nothing() {
        let h = Harness::new(acking(3600), Config::default());
        h.coordinator.start(ActivityKind::Training, Some(60), None).await.unwrap();
        *h.game.retire_during_cancel.lock() = Some(h.store.clone());

        let view = h.coordinator.cancel(ActivityKind::Training).await.unwrap();

        assert_eq!(view.status, ActivityStatus::Idle);
        assert_eq!(h.stored(ActivityKind::Training).status_changed_at, Some(at(1)));
        assert_eq!(h.event_types(), vec![EventType::Started]);
    }

    #[tokio::test]
    async fn test_failing_finish_is_retired_after_bounded_attempts() {
        let game = StubGame {
            fail_finish: true,
            ..StubGame::default()
        };
        let h = Harness::new(game, Config::default());
        h.store.write(&awaiting_collection(true)).unwrap();

        for _ in 0..2 {
            let report = h.coordinator.tick_maintenance().await;
            assert_eq!(report.failed, vec![ActivityKind::Collection]);
            assert_eq!(h.stored(ActivityKind::Collection).status, ActivityStatus::AwaitingCollection);
        }

        let report = h.coordinator.tick_maintenance().await;

        assert_eq!(report.abandoned, vec![ActivityKind::Collection]);
        assert!(report.failed.is_empty());
        assert_eq!(h.game.finishes.load(Ordering::SeqCst), 3);
        assert_eq!(h.stored(ActivityKind::Collection).status, ActivityStatus::Idle);
        let detail = h.events.history().last().and_then(|event| event.detail.clone()).unwrap();
        assert!(detail.starts_with("finishing abandoned after 3 attempts"), "{}", detail);

        // The kind is free again.
        h.coordinator.start(ActivityKind::Collection, Some(10), None).await.unwrap();
        assert_eq!(h.stored(ActivityKind::Collection).status, ActivityStatus::Pending);
    }

    #[tokio::test]
    async fn test_good_price_sells_once_per_change() {
        let mut config = Config::default();
        config.activities.collection.autosell_enabled = true;
        config.activities.collection.min_price_cents = 20;
        let h = Harness::new(StubGame::default(), config);
        let priced = |secs: i64, cents: u32| {
            let mut snapshot = PageSnapshot::new(at(secs));
            snapshot.bottle_price_cents = Some(cents);
            snapshot
        };

        h.coordinator.tick_reconcile(&priced(0, 22)).await.unwrap();
        let report = h.coordinator.run_due_maintenance().await;

        assert!(report.sold);
        let plan = h.game.last_finish.lock().clone().unwrap();
        assert_eq!(plan.kind, ActivityKind::Collection);
        assert_eq!(plan.steps, vec![FinishStep::SellBottles { min_price_cents: 20 }]);

        // Same price again: already handled.
        h.advance(60);
        h.coordinator.tick_reconcile(&priced(60, 22)).await.unwrap();
        assert!(!h.coordinator.run_due_maintenance().await.sold);

        // Below the threshold.
        h.advance(60);
        h.coordinator.tick_reconcile(&priced(120, 18)).await.unwrap();
        assert!(!h.coordinator.run_due_maintenance().await.sold);

        // Back up: a new sale with a fresh token.
        h.advance(60);
        h.coordinator.tick_reconcile(&priced(180, 21)).await.unwrap();
        assert!(h.coordinator.run_due_maintenance().await.sold);
        let second = h.game.last_finish.lock().clone().unwrap();
        assert!(second.token > plan.token);
        assert_eq!(h.game.finishes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_price_sale_needs_autosell_and_a_fresh_price() {
        let h = Harness::new(StubGame::default(), Config::default());
        let mut snapshot = PageSnapshot::new(at(0));
        snapshot.bottle_price_cents = Some(25);
        h.coordinator.tick_reconcile(&snapshot).await.unwrap();

        assert!(!h.coordinator.run_due_maintenance().await.sold);

        let mut config = Config::default();
        config.activities.collection.autosell_enabled = true;
        let h = Harness::new(StubGame::default(), config);
        h.coordinator.tick_reconcile(&snapshot).await.unwrap();
        h.advance(600);

        assert!(!h.coordinator.run_due_maintenance().await.sold);
        assert_eq!(h.game.finishes.load(Ordering::SeqCst), 0);
    }
}
