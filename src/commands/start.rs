use super::{activity_error, coordinator};
use crate::libs::activity::{ActivityKind, ActivityParams, Skill};
use crate::libs::formatter::format_time;
use crate::libs::messages::Message;
use crate::{msg_info, msg_success};
use anyhow::Result;
use clap::Args;

#[derive(Debug, Args)]
pub struct StartArgs {
    /// Activity to start
    kind: ActivityKind,

    /// Duration in minutes; defaults to the configured one
    #[arg(short, long)]
    minutes: Option<u32>,

    /// Skill to train (training only; random from the configured list otherwise)
    #[arg(long)]
    skill: Option<Skill>,

    /// Target promille (intoxication only)
    #[arg(long)]
    target_promille: Option<f64>,

    /// Pump the stomach once the window ends (intoxication only)
    #[arg(long)]
    sober_up: bool,

    /// Sober up by eating instead of pumping (intoxication only, implies --sober-up)
    #[arg(long)]
    sober_with_food: bool,

    /// Keep the bottles instead of selling them (collection only)
    #[arg(long)]
    no_autosell: bool,

    /// Minimum bottle price in cents for selling (collection only)
    #[arg(long)]
    min_price: Option<u32>,
}

impl StartArgs {
    /// Applies the command-line overrides on top of the configured defaults.
    fn params(&self, defaults: ActivityParams) -> ActivityParams {
        match defaults {
            ActivityParams::Collection { autosell, min_price_cents } => ActivityParams::Collection {
                autosell: autosell && !self.no_autosell,
                min_price_cents: self.min_price.unwrap_or(min_price_cents),
            },
            ActivityParams::Training { skill } => ActivityParams::Training {
                skill: self.skill.unwrap_or(skill),
            },
            ActivityParams::Intoxication {
                target_promille,
                sober_up_after,
                sober_with_food,
                consumed,
            } => ActivityParams::Intoxication {
                target_promille: self.target_promille.unwrap_or(target_promille),
                sober_up_after: sober_up_after || self.sober_up || self.sober_with_food,
                sober_with_food: sober_with_food || self.sober_with_food,
                consumed,
            },
            ActivityParams::Combat => ActivityParams::Combat,
        }
    }
}

pub async fn cmd(start_args: StartArgs) -> Result<()> {
    let kind = start_args.kind;
    let coordinator = coordinator()?;
    let params = start_args.params(coordinator.default_params(kind));

    let end = coordinator
        .start(kind, start_args.minutes, Some(params))
        .await
        .map_err(|err| activity_error(kind, err))?;

    let view = coordinator.query(kind).map_err(|err| activity_error(kind, err))?;
    if view.running {
        msg_success!(Message::ActivityRunning(kind.to_string(), format_time(Some(end))));
    } else {
        msg_info!(Message::ActivityPending(kind.to_string(), format_time(Some(end))));
    }
    Ok(())
}
