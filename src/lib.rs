//! # Pennerbot
//!
//! A command-line bot that keeps timed Pennergame activities (bottle
//! collection, training, combat and intoxication management) running and
//! tracks their state across restarts.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use pennerbot::commands::Cli;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     Cli::menu().await
//! }
//! ```

pub mod api;
pub mod commands;
pub mod db;
pub mod libs;
