use crate::libs::daemon;
use crate::libs::messages::Message;
use crate::msg_info;
use anyhow::Result;
use clap::Args;

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Run the watcher as a detached background process
    #[arg(short, long, conflicts_with = "stop")]
    background: bool,

    /// Stop the background watcher
    #[arg(short, long)]
    stop: bool,
}

pub async fn cmd(watch_args: WatchArgs) -> Result<()> {
    if watch_args.stop {
        return daemon::stop();
    }
    if watch_args.background {
        return daemon::spawn();
    }

    msg_info!(Message::WatcherRunningForeground);
    daemon::run_with_signal_handling().await
}
