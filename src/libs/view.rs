use super::activity::{ActivityStatus, Confidence, DerivedView};
use super::formatter::{format_remaining, format_time};
use anyhow::Result;
use prettytable::{row, Table};

pub struct View {}

impl View {
    /// Prints one row per activity kind.
    ///
    /// Remaining times predicted locally are marked with `*`.
    pub fn activities(views: &[DerivedView]) -> Result<()> {
        let mut table = Table::new();

        table.add_row(row!["KIND", "STATUS", "REMAINING", "ENDS", "ORIGIN", "DETAILS"]);
        for view in views {
            let ends = if view.running { format_time(view.expected_end_at) } else { "-".to_string() };
            let origin = if view.status == ActivityStatus::Idle { "-" } else { view.origin.as_str() };
            let details = view.metadata.as_ref().map(|params| params.summary()).unwrap_or_else(|| "-".to_string());
            table.add_row(row![view.kind, Self::status(view), Self::remaining(view), ends, origin, details]);
        }
        table.printstd();

        Ok(())
    }

    fn status(view: &DerivedView) -> String {
        if view.cancel_requested {
            format!("{} (cancelling)", view.status)
        } else {
            view.status.to_string()
        }
    }

    fn remaining(view: &DerivedView) -> String {
        if !view.running {
            return "-".to_string();
        }
        let formatted = format_remaining(view.seconds_remaining);
        match view.confidence {
            Confidence::Confirmed => formatted,
            Confidence::Unconfirmed => format!("{}*", formatted),
        }
    }
}
