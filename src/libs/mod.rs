//! Core library modules.
//!
//! - **Activity core**: data model, tracker, coordinator, finishing plans
//! - **Game access**: page parsing and snapshots (the HTTP client lives in `api`)
//! - **Runtime**: scheduler, watcher daemon, events, clock
//! - **Infrastructure**: configuration, data storage, messages, console output
//!
//! ```rust,no_run
//! use pennerbot::libs::activity::ActivityKind;
//! use pennerbot::libs::config::Config;
//!
//! let config = Config::read()?;
//! let training = config.activities.for_kind(ActivityKind::Training);
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod activity;
pub mod clock;
pub mod config;
pub mod coordinator;
pub mod daemon;
pub mod data_storage;
pub mod error;
pub mod event;
pub mod finish;
pub mod formatter;
pub mod intoxication;
pub mod messages;
pub mod parse;
pub mod pause;
pub mod scheduler;
pub mod snapshot;
pub mod tracker;
pub mod view;
