use super::{activity_error, coordinator};
use crate::libs::activity::ActivityKind;
use crate::libs::messages::Message;
use crate::msg_success;
use anyhow::Result;
use clap::Args;

#[derive(Debug, Args)]
pub struct CancelArgs {
    /// Activity to cancel
    kind: ActivityKind,
}

pub async fn cmd(cancel_args: CancelArgs) -> Result<()> {
    let kind = cancel_args.kind;
    coordinator()?.cancel(kind).await.map_err(|err| activity_error(kind, err))?;

    msg_success!(Message::ActivityCancelled(kind.to_string()));
    Ok(())
}
