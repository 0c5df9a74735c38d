use super::coordinator;
use crate::libs::activity::Confidence;
use crate::libs::messages::Message;
use crate::libs::view::View;
use crate::{msg_print, msg_warning};
use anyhow::Result;
use clap::Args;

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Read the game page first and reconcile before printing
    #[arg(short, long)]
    refresh: bool,
}

pub async fn cmd(status_args: StatusArgs) -> Result<()> {
    let coordinator = coordinator()?;

    let views = if status_args.refresh {
        match coordinator.fetch_snapshot().await {
            Ok(snapshot) => coordinator.tick_reconcile(&snapshot).await?,
            Err(err) => {
                msg_warning!(Message::StatusRefreshFailed(err.to_string()));
                coordinator.query_all()?
            }
        }
    } else {
        coordinator.query_all()?
    };

    msg_print!(Message::StatusHeader, true);
    View::activities(&views)?;
    if views.iter().any(|view| view.running && view.confidence == Confidence::Unconfirmed) {
        msg_print!(Message::StatusUnconfirmedHint);
    }
    Ok(())
}
