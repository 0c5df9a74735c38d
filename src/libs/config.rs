//! Application configuration management.
//!
//! Configuration lives in `config.json` inside the application data
//! directory. A missing file, or a missing section inside it, falls back to
//! defaults, so the bot runs with nothing but a session cookie.
//!
//! ## Sections
//!
//! - **server**: game URL, session cookie and player name
//! - **tracker**: grace period, drift tolerance and snapshot freshness window
//! - **scheduler**: tick cadence, jitter and remote/pending timeouts
//! - **activities**: per-kind duration bounds, auto-repeat and pause windows
//!
//! ## Usage
//!
//! ```rust,no_run
//! use pennerbot::libs::config::Config;
//!
//! let config = Config::read()?;
//! let collection = config.activities.for_kind(pennerbot::libs::activity::ActivityKind::Collection);
//! println!("default run: {} min", collection.default_duration_minutes);
//! # Ok::<(), anyhow::Error>(())
//! ```

use super::activity::{ActivityKind, Skill};
use super::data_storage::DataStorage;
use super::pause::PauseWindow;
use crate::libs::messages::Message;
use crate::msg_print;
use anyhow::Result;
use chrono::TimeDelta;
use dialoguer::{theme::ColorfulTheme, Confirm, Input, MultiSelect};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};

pub const CONFIG_FILE_NAME: &str = "config.json";

/// Bottle collection runs the game accepts, in minutes.
pub const VALID_COLLECTION_MINUTES: [u32; 7] = [10, 30, 60, 180, 360, 540, 720];
pub const MIN_BOTTLE_PRICE_CENTS: u32 = 15;
pub const MAX_BOTTLE_PRICE_CENTS: u32 = 25;

pub const PROMILLE_SAFE_MIN: f64 = 2.0;
pub const PROMILLE_SAFE_MAX: f64 = 3.0;
pub const PROMILLE_WARNING: f64 = 3.5;
pub const DEFAULT_TARGET_PROMILLE: f64 = 2.5;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub base_url: String,
    /// Value of the game's session cookie, copied from a logged-in browser.
    pub session_cookie: String,
    /// Key of the record rows; lets several accounts share one database.
    pub player: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.pennergame.de".to_string(),
            session_cookie: String::new(),
            player: "default".to_string(),
            user_agent: None,
        }
    }
}

/// Reconciliation tolerances.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct TrackerConfig {
    /// Window before the expected end in which "not running" is believed.
    pub grace_period_secs: i64,
    /// Remaining-time disagreement tolerated before `expected_end_at` moves.
    pub drift_tolerance_secs: i64,
    /// Snapshots older than this are treated as absent.
    pub freshness_window_secs: i64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            grace_period_secs: 3,
            drift_tolerance_secs: 5,
            freshness_window_secs: 180,
        }
    }
}

impl TrackerConfig {
    pub fn grace_period(&self) -> TimeDelta {
        TimeDelta::seconds(self.grace_period_secs)
    }

    pub fn freshness_window(&self) -> TimeDelta {
        TimeDelta::seconds(self.freshness_window_secs)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct SchedulerConfig {
    pub tick_interval_secs: u64,
    /// Relative jitter applied to every tick sleep.
    pub tick_jitter: f64,
    pub remote_timeout_secs: u64,
    /// Pending records older than this are discarded by the watchdog.
    pub pending_timeout_secs: i64,
    /// Failed finishing attempts before a completed run is retired anyway.
    pub max_finish_attempts: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: 60,
            tick_jitter: 0.2,
            remote_timeout_secs: 30,
            pending_timeout_secs: 120,
            max_finish_attempts: 3,
        }
    }
}

impl SchedulerConfig {
    pub fn remote_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.remote_timeout_secs)
    }

    pub fn pending_timeout(&self) -> TimeDelta {
        TimeDelta::seconds(self.pending_timeout_secs)
    }
}

/// Settings shared by every activity kind.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ActivityConfig {
    pub enabled: bool,
    pub auto_repeat: bool,
    pub min_duration_minutes: u32,
    pub max_duration_minutes: u32,
    pub default_duration_minutes: u32,
    /// Discrete durations the game accepts; empty means any value in bounds.
    pub allowed_minutes: Vec<u32>,
    pub pause_minutes: f64,
    pub pause_variation: f64,
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_repeat: false,
            min_duration_minutes: 1,
            max_duration_minutes: 720,
            default_duration_minutes: 60,
            allowed_minutes: Vec::new(),
            pause_minutes: 5.0,
            pause_variation: 0.2,
        }
    }
}

impl ActivityConfig {
    /// Returns true when `minutes` is inside the bounds and, if steps are
    /// configured, one of them.
    pub fn accepts(&self, minutes: u32) -> bool {
        let in_bounds = minutes >= self.min_duration_minutes && minutes <= self.max_duration_minutes;
        in_bounds && (self.allowed_minutes.is_empty() || self.allowed_minutes.contains(&minutes))
    }

    pub fn describe_allowed(&self) -> String {
        if self.allowed_minutes.is_empty() {
            format!("{}..={}", self.min_duration_minutes, self.max_duration_minutes)
        } else {
            self.allowed_minutes
                .iter()
                .filter(|m| **m >= self.min_duration_minutes && **m <= self.max_duration_minutes)
                .map(|m| m.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        }
    }

    pub fn pause_window(&self) -> PauseWindow {
        PauseWindow::from_minutes(self.pause_minutes, self.pause_variation)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct CollectionConfig {
    pub activity: ActivityConfig,
    pub autosell_enabled: bool,
    pub min_price_cents: u32,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            activity: ActivityConfig {
                allowed_minutes: VALID_COLLECTION_MINUTES.to_vec(),
                min_duration_minutes: 10,
                ..ActivityConfig::default()
            },
            autosell_enabled: false,
            min_price_cents: MAX_BOTTLE_PRICE_CENTS,
        }
    }
}

impl CollectionConfig {
    pub fn min_price_cents(&self) -> u32 {
        self.min_price_cents.clamp(MIN_BOTTLE_PRICE_CENTS, MAX_BOTTLE_PRICE_CENTS)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct TrainingConfig {
    pub activity: ActivityConfig,
    /// Skills picked from at random when training repeats.
    pub skills: Vec<Skill>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            activity: ActivityConfig::default(),
            skills: vec![Skill::Att, Skill::Def, Skill::Agi],
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct CombatConfig {
    pub activity: ActivityConfig,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            activity: ActivityConfig {
                enabled: false,
                ..ActivityConfig::default()
            },
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct IntoxicationConfig {
    pub activity: ActivityConfig,
    pub target_promille: f64,
    /// Sober up when the hold window ends.
    pub sober_up_after: bool,
    /// Eat from stock instead of pumping the stomach.
    pub sober_with_food: bool,
}

impl Default for IntoxicationConfig {
    fn default() -> Self {
        Self {
            activity: ActivityConfig {
                default_duration_minutes: 30,
                ..ActivityConfig::default()
            },
            target_promille: DEFAULT_TARGET_PROMILLE,
            sober_up_after: false,
            sober_with_food: false,
        }
    }
}

impl IntoxicationConfig {
    pub fn target_promille(&self) -> f64 {
        self.target_promille.clamp(PROMILLE_SAFE_MIN, PROMILLE_SAFE_MAX)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(default)]
pub struct ActivitiesConfig {
    pub collection: CollectionConfig,
    pub training: TrainingConfig,
    pub combat: CombatConfig,
    pub intoxication: IntoxicationConfig,
}

impl ActivitiesConfig {
    pub fn for_kind(&self, kind: ActivityKind) -> &ActivityConfig {
        match kind {
            ActivityKind::Collection => &self.collection.activity,
            ActivityKind::Training => &self.training.activity,
            ActivityKind::Combat => &self.combat.activity,
            ActivityKind::IntoxicationManagement => &self.intoxication.activity,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub tracker: TrackerConfig,
    pub scheduler: SchedulerConfig,
    pub activities: ActivitiesConfig,
}

impl Config {
    /// Reads the configuration, returning defaults when no file exists.
    pub fn read() -> Result<Config> {
        let config_file_path = DataStorage::new().get_path(CONFIG_FILE_NAME)?;

        if !config_file_path.exists() {
            return Ok(Config::default());
        }

        let config_str = fs::read_to_string(config_file_path)?;
        let config: Config = serde_json::from_str(&config_str)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_file_path = DataStorage::new().get_path(CONFIG_FILE_NAME)?;

        let config_file = File::create(config_file_path)?;
        serde_json::to_writer_pretty(&config_file, &self)?;
        Ok(())
    }

    pub fn delete() -> Result<()> {
        let config_file_path = DataStorage::new().get_path(CONFIG_FILE_NAME)?;
        if config_file_path.exists() {
            fs::remove_file(config_file_path)?;
        }
        Ok(())
    }

    /// Interactive setup wizard.
    ///
    /// Existing values are offered as defaults so re-running the wizard only
    /// changes what the player touches.
    pub fn init() -> Result<Self> {
        let mut config = Self::read().unwrap_or_default();
        let theme = ColorfulTheme::default();

        msg_print!(Message::ConfigModuleServer);
        config.server.base_url = Input::with_theme(&theme)
            .with_prompt(Message::PromptBaseUrl.to_string())
            .default(config.server.base_url.clone())
            .interact_text()?;
        config.server.session_cookie = Input::with_theme(&theme)
            .with_prompt(Message::PromptSessionCookie.to_string())
            .default(config.server.session_cookie.clone())
            .allow_empty(true)
            .interact_text()?;
        config.server.player = Input::with_theme(&theme)
            .with_prompt(Message::PromptPlayer.to_string())
            .default(config.server.player.clone())
            .interact_text()?;

        let kinds: Vec<ActivityKind> = ActivityKind::ALL.to_vec();
        let defaults: Vec<bool> = kinds.iter().map(|kind| config.activities.for_kind(*kind).auto_repeat).collect();
        let repeat = MultiSelect::with_theme(&theme)
            .with_prompt(Message::PromptAutoRepeat.to_string())
            .items(&kinds.iter().map(|kind| kind.as_str()).collect::<Vec<_>>())
            .defaults(&defaults)
            .interact()?;

        for kind in kinds.iter() {
            let enabled = repeat.iter().any(|&idx| kinds[idx] == *kind);
            Self::activity_mut(&mut config, *kind).auto_repeat = enabled;
        }

        for &idx in &repeat {
            let kind = kinds[idx];
            msg_print!(Message::ConfigModuleActivity(kind.to_string()));
            let current = config.activities.for_kind(kind).clone();
            let activity = Self::activity_mut(&mut config, kind);
            activity.default_duration_minutes = Input::with_theme(&theme)
                .with_prompt(Message::PromptDefaultDuration(current.describe_allowed()).to_string())
                .default(current.default_duration_minutes)
                .validate_with(|minutes: &u32| -> std::result::Result<(), String> {
                    if current.accepts(*minutes) {
                        Ok(())
                    } else {
                        Err(Message::InvalidDurationInput(current.describe_allowed()).to_string())
                    }
                })
                .interact_text()?;
            activity.pause_minutes = Input::with_theme(&theme)
                .with_prompt(Message::PromptPauseMinutes.to_string())
                .default(current.pause_minutes)
                .interact_text()?;
        }

        if repeat.iter().any(|&idx| kinds[idx] == ActivityKind::Collection) {
            config.activities.collection.autosell_enabled = Confirm::with_theme(&theme)
                .with_prompt(Message::PromptAutosell.to_string())
                .default(config.activities.collection.autosell_enabled)
                .interact()?;
            if config.activities.collection.autosell_enabled {
                let price: u32 = Input::with_theme(&theme)
                    .with_prompt(Message::PromptMinPrice(MIN_BOTTLE_PRICE_CENTS, MAX_BOTTLE_PRICE_CENTS).to_string())
                    .default(config.activities.collection.min_price_cents)
                    .interact_text()?;
                config.activities.collection.min_price_cents = price.clamp(MIN_BOTTLE_PRICE_CENTS, MAX_BOTTLE_PRICE_CENTS);
            }
        }

        Ok(config)
    }

    fn activity_mut(config: &mut Config, kind: ActivityKind) -> &mut ActivityConfig {
        match kind {
            ActivityKind::Collection => &mut config.activities.collection.activity,
            ActivityKind::Training => &mut config.activities.training.activity,
            ActivityKind::Combat => &mut config.activities.combat.activity,
            ActivityKind::IntoxicationManagement => &mut config.activities.intoxication.activity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_accepts_only_game_steps() {
        let collection = CollectionConfig::default();
        assert!(collection.activity.accepts(10));
        assert!(collection.activity.accepts(720));
        assert!(!collection.activity.accepts(15));
        assert!(!collection.activity.accepts(721));
    }

    #[test]
    fn free_form_bounds_without_steps() {
        let training = TrainingConfig::default();
        assert!(training.activity.accepts(1));
        assert!(training.activity.accepts(333));
        assert!(!training.activity.accepts(0));
    }

    #[test]
    fn thresholds_are_clamped() {
        let mut collection = CollectionConfig::default();
        collection.min_price_cents = 40;
        assert_eq!(collection.min_price_cents(), MAX_BOTTLE_PRICE_CENTS);

        let mut intoxication = IntoxicationConfig::default();
        intoxication.target_promille = 1.0;
        assert_eq!(intoxication.target_promille(), PROMILLE_SAFE_MIN);
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: Config = serde_json::from_str(r#"{"server": {"session_cookie": "abc"}}"#).unwrap();
        assert_eq!(config.server.session_cookie, "abc");
        assert_eq!(config.server.base_url, "https://www.pennergame.de");
        assert_eq!(config.tracker, TrackerConfig::default());
        assert_eq!(config.activities.collection.activity.allowed_minutes, VALID_COLLECTION_MINUTES.to_vec());
    }
}
