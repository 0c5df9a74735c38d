#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeDelta, TimeZone, Utc};
    use pennerbot::db::db::Db;
    use pennerbot::db::records::{RecordStore, SqliteRecordStore};
    use pennerbot::libs::activity::{ActivityKind, ActivityParams, ActivityRecord, ActivityStatus, Origin, Skill};
    use tempfile::TempDir;
    use test_context::{test_context, TestContext};

    struct RecordsTestContext {
        _temp_dir: TempDir,
    }

    impl TestContext for RecordsTestContext {
        fn setup() -> Self {
            let temp_dir = tempfile::tempdir().unwrap();
            std::env::set_var("HOME", temp_dir.path());
            std::env::set_var("LOCALAPPDATA", temp_dir.path());
            RecordsTestContext { _temp_dir: temp_dir }
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn store(player: &str) -> SqliteRecordStore {
        SqliteRecordStore::from_db(Db::in_memory().unwrap(), player)
    }

    fn running_training() -> ActivityRecord {
        let mut record = ActivityRecord::idle(ActivityKind::Training);
        record.mark_running(at(0), TimeDelta::seconds(3600));
        record.metadata = Some(ActivityParams::Training { skill: Skill::Def });
        record
    }

    #[test]
    fn test_missing_row_reads_as_none() {
        let store = store("alice");
        assert!(store.read(ActivityKind::Collection).unwrap().is_none());
        assert!(store.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_write_and_read_back_full_record() {
        let store = store("alice");
        let mut record = running_training();
        record.origin = Origin::ExternallyObserved;
        record.last_reconciled_at = Some(at(30));
        record.next_eligible_at = Some(at(4000));

        store.write(&record).unwrap();

        assert_eq!(store.read(ActivityKind::Training).unwrap(), Some(record));
    }

    #[test]
    fn test_compare_and_swap_checks_stored_status() {
        let store = store("alice");
        let record = running_training();

        // Absent rows count as Idle.
        assert!(!store.compare_and_swap(ActivityStatus::Running, &record).unwrap());
        assert!(store.compare_and_swap(ActivityStatus::Idle, &record).unwrap());

        let mut idle = record.clone();
        idle.retire(at(10));
        assert!(!store.compare_and_swap(ActivityStatus::Pending, &idle).unwrap());
        assert_eq!(store.read(ActivityKind::Training).unwrap().unwrap().status, ActivityStatus::Running);

        assert!(store.compare_and_swap(ActivityStatus::Running, &idle).unwrap());
        assert_eq!(store.read(ActivityKind::Training).unwrap().unwrap().status, ActivityStatus::Idle);
    }

    #[test]
    fn test_action_tokens_are_monotonic() {
        let store = store("alice");
        let first = store.next_action_token(ActivityKind::Collection).unwrap();
        let second = store.next_action_token(ActivityKind::Training).unwrap();
        let third = store.next_action_token(ActivityKind::Collection).unwrap();
        assert!(first < second && second < third);
    }

    #[test]
    fn test_read_all_is_in_kind_order() {
        let store = store("alice");
        store.write(&ActivityRecord::idle(ActivityKind::IntoxicationManagement)).unwrap();
        store.write(&running_training()).unwrap();
        store.write(&ActivityRecord::idle(ActivityKind::Collection)).unwrap();

        let kinds: Vec<ActivityKind> = store.read_all().unwrap().iter().map(|record| record.kind).collect();
        assert_eq!(
            kinds,
            vec![ActivityKind::Collection, ActivityKind::Training, ActivityKind::IntoxicationManagement]
        );
    }

    #[test_context(RecordsTestContext)]
    #[test]
    fn test_records_survive_reopen(ctx: &mut RecordsTestContext) {
        let path = ctx._temp_dir.path().join("records.db");
        let record = running_training();
        {
            let store = SqliteRecordStore::from_db(Db::open(&path).unwrap(), "alice");
            store.write(&record).unwrap();
        }

        let reopened = SqliteRecordStore::from_db(Db::open(&path).unwrap(), "alice");
        assert_eq!(reopened.read(ActivityKind::Training).unwrap(), Some(record));

        let other = SqliteRecordStore::from_db(Db::open(&path).unwrap(), "bob");
        assert!(other.read(ActivityKind::Training).unwrap().is_none());
    }
}
