//! Finishing side-effects applied when a run ends.
//!
//! A plan is derived from the record alone, so re-planning after a crash
//! yields the same steps for the same token. Runs that were only observed
//! on the page carry no parameters and get the mandatory steps only.

use super::activity::{ActivityKind, ActivityParams, ActivityRecord, Origin};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum FinishStep {
    /// Empty the collection cart so the bottles land in stock.
    EmptyCart,
    /// Sell all bottles if the current price is at least `min_price_cents`.
    SellBottles { min_price_cents: u32 },
    /// Pump the stomach at the doctor.
    PumpStomach,
    /// Eat from stock until sober.
    EatFood,
}

impl FinishStep {
    pub fn label(&self) -> &'static str {
        match self {
            FinishStep::EmptyCart => "emptying the cart",
            FinishStep::SellBottles { .. } => "selling bottles",
            FinishStep::PumpStomach => "pumping the stomach",
            FinishStep::EatFood => "eating",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FinishPlan {
    pub kind: ActivityKind,
    /// Idempotency marker persisted before any step is sent.
    pub token: i64,
    pub steps: Vec<FinishStep>,
}

impl FinishPlan {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Outcome lines of an applied plan, one per step that did something.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FinishReport {
    pub notes: Vec<String>,
}

impl FinishReport {
    pub fn note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }

    pub fn summary(&self) -> Option<String> {
        if self.notes.is_empty() {
            None
        } else {
            Some(self.notes.join("; "))
        }
    }
}

pub fn plan_finish(record: &ActivityRecord, token: i64) -> FinishPlan {
    let self_initiated = record.origin == Origin::SelfInitiated;
    let mut steps = Vec::new();

    match record.kind {
        ActivityKind::Collection => {
            steps.push(FinishStep::EmptyCart);
            if let (true, Some(ActivityParams::Collection { autosell: true, min_price_cents })) = (self_initiated, &record.metadata) {
                steps.push(FinishStep::SellBottles {
                    min_price_cents: *min_price_cents,
                });
            }
        }
        ActivityKind::IntoxicationManagement => {
            if let (
                true,
                Some(ActivityParams::Intoxication {
                    sober_up_after: true,
                    sober_with_food,
                    ..
                }),
            ) = (self_initiated, &record.metadata)
            {
                steps.push(if *sober_with_food { FinishStep::EatFood } else { FinishStep::PumpStomach });
            }
        }
        ActivityKind::Training | ActivityKind::Combat => {}
    }

    FinishPlan {
        kind: record.kind,
        token,
        steps,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libs::activity::ActivityStatus;

    fn awaiting(kind: ActivityKind, metadata: Option<ActivityParams>, origin: Origin) -> ActivityRecord {
        let mut record = ActivityRecord::idle(kind);
        record.status = ActivityStatus::AwaitingCollection;
        record.metadata = metadata;
        record.origin = origin;
        record
    }

    #[test]
    fn collection_with_autosell_sells_after_emptying() {
        let params = ActivityParams::Collection {
            autosell: true,
            min_price_cents: 20,
        };
        let plan = plan_finish(&awaiting(ActivityKind::Collection, Some(params), Origin::SelfInitiated), 7);
        assert_eq!(plan.token, 7);
        assert_eq!(plan.steps, vec![FinishStep::EmptyCart, FinishStep::SellBottles { min_price_cents: 20 }]);
    }

    #[test]
    fn external_collection_only_empties() {
        let plan = plan_finish(&awaiting(ActivityKind::Collection, None, Origin::ExternallyObserved), 1);
        assert_eq!(plan.steps, vec![FinishStep::EmptyCart]);
    }

    #[test]
    fn training_has_no_remote_steps() {
        let plan = plan_finish(&awaiting(ActivityKind::Training, None, Origin::SelfInitiated), 1);
        assert!(plan.is_empty());
    }

    #[test]
    fn sober_up_only_when_requested() {
        let params = ActivityParams::Intoxication {
            target_promille: 2.5,
            sober_up_after: true,
            sober_with_food: false,
            consumed: vec![],
        };
        let plan = plan_finish(&awaiting(ActivityKind::IntoxicationManagement, Some(params), Origin::SelfInitiated), 3);
        assert_eq!(plan.steps, vec![FinishStep::PumpStomach]);
    }

    #[test]
    fn sober_up_with_food_eats_instead_of_pumping() {
        let params = ActivityParams::Intoxication {
            target_promille: 2.5,
            sober_up_after: true,
            sober_with_food: true,
            consumed: vec![],
        };
        let plan = plan_finish(&awaiting(ActivityKind::IntoxicationManagement, Some(params), Origin::SelfInitiated), 4);
        assert_eq!(plan.steps, vec![FinishStep::EatFood]);
    }
}
