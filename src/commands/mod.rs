pub mod cancel;
pub mod init;
pub mod start;
pub mod status;
pub mod watch;

use crate::libs::activity::ActivityKind;
use crate::libs::config::Config;
use crate::libs::coordinator::Coordinator;
use crate::libs::daemon;
use crate::libs::error::ActivityError;
use crate::libs::event::BroadcastPublisher;
use crate::libs::messages::Message;
use crate::{msg_bail_anyhow, msg_error_anyhow, msg_info, msg_warning};
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Configuration initialization")]
    Init(init::InitArgs),
    #[command(about = "Start an activity", arg_required_else_help = true)]
    Start(start::StartArgs),
    #[command(about = "Cancel a running activity", arg_required_else_help = true)]
    Cancel(cancel::CancelArgs),
    #[command(about = "Show the state of every activity")]
    Status(status::StatusArgs),
    #[command(about = "Keep activities running in the background")]
    Watch(watch::WatchArgs),
}

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help(true))]
pub struct Cli {
    /// Internal: run the watcher loop in this process.
    #[arg(long, hide = true)]
    daemon_run: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl Cli {
    pub async fn menu() -> Result<()> {
        let cli = Self::parse();
        if cli.daemon_run {
            return daemon::run_with_signal_handling().await;
        }
        match cli.command {
            Some(Commands::Init(args)) => init::cmd(args),
            Some(Commands::Start(args)) => start::cmd(args).await,
            Some(Commands::Cancel(args)) => cancel::cmd(args).await,
            Some(Commands::Status(args)) => status::cmd(args).await,
            Some(Commands::Watch(args)) => watch::cmd(args).await,
            None => Ok(()),
        }
    }
}

/// Coordinator for a one-shot CLI command.
///
/// Events only land in the publisher's history; the watcher is the
/// process that reports them.
fn coordinator() -> Result<Coordinator> {
    let config = Config::read()?;
    if config.server.session_cookie.is_empty() {
        msg_bail_anyhow!(Message::SessionCookieMissing);
    }
    Coordinator::open(config, Arc::new(BroadcastPublisher::new()))
}

/// Prints the follow-up hint for `err` and turns it into the command's error.
fn activity_error(kind: ActivityKind, err: ActivityError) -> anyhow::Error {
    if err.needs_manual_verification() {
        msg_warning!(Message::ManualVerificationNeeded(kind.to_string()));
    } else if err.is_retryable() {
        msg_info!(Message::RetryLater);
    }
    msg_error_anyhow!(Message::ActivityFailed(err.to_string()))
}
