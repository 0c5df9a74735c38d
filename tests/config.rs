#[cfg(test)]
mod tests {
    use pennerbot::libs::activity::{ActivityKind, Skill};
    use pennerbot::libs::config::{Config, MAX_BOTTLE_PRICE_CENTS};
    use tempfile::TempDir;
    use test_context::{test_context, TestContext};

    /// Points the data directory at a fresh temporary directory.
    struct ConfigTestContext {
        _temp_dir: TempDir,
    }

    impl TestContext for ConfigTestContext {
        fn setup() -> Self {
            let temp_dir = tempfile::tempdir().unwrap();
            std::env::set_var("HOME", temp_dir.path());
            std::env::set_var("LOCALAPPDATA", temp_dir.path());
            std::env::set_var("PENNERBOT_DATA_DIR", temp_dir.path());
            ConfigTestContext { _temp_dir: temp_dir }
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.server.session_cookie.is_empty());
        assert_eq!(config.server.player, "default");
        assert!(!config.activities.for_kind(ActivityKind::Combat).enabled);
        assert!(config.activities.for_kind(ActivityKind::Collection).enabled);
        assert!(ActivityKind::ALL.iter().all(|kind| !config.activities.for_kind(*kind).auto_repeat));
        assert_eq!(config.activities.collection.min_price_cents(), MAX_BOTTLE_PRICE_CENTS);
        assert_eq!(config.tracker.grace_period_secs, 3);
    }

    #[test_context(ConfigTestContext)]
    #[test]
    fn test_save_read_delete(_ctx: &mut ConfigTestContext) {
        // Nothing saved yet.
        assert_eq!(Config::read().unwrap(), Config::default());

        let mut config = Config::default();
        config.server.session_cookie = "sid=abc".to_string();
        config.server.player = "penner42".to_string();
        config.activities.training.skills = vec![Skill::Agi];
        config.activities.collection.activity.auto_repeat = true;
        config.scheduler.tick_interval_secs = 90;
        config.save().unwrap();

        assert_eq!(Config::read().unwrap(), config);

        Config::delete().unwrap();
        assert_eq!(Config::read().unwrap(), Config::default());
    }

    #[test]
    fn test_config_json_shape() {
        let json = serde_json::to_value(Config::default()).unwrap();
        assert_eq!(json["server"]["base_url"], "https://www.pennergame.de");
        assert_eq!(json["activities"]["training"]["skills"][0], "att");
        assert!(json["server"].get("user_agent").is_none());
    }
}
