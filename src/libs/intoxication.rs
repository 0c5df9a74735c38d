//! Drink planning for holding the promille level in the training window.
//!
//! Strong drinks (2.0‰ and up) do the bulk of the work, weak drinks (0.5‰
//! and below) fine-tune. The plan never takes the player above
//! [`PROMILLE_SAFE_MAX`]. [`plan_food`] goes the other way and sobers up
//! with the food in stock.

use super::config::{PROMILLE_SAFE_MAX, PROMILLE_SAFE_MIN, PROMILLE_WARNING};
use super::snapshot::DrinkStock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const STRONG_EFFECT: f64 = 2.0;
const WEAK_EFFECT: f64 = 0.5;
/// Headroom left after the strong drinks for the weak ones.
const STRONG_RESERVE: f64 = 0.3;
const FINE_TUNE_MIN: f64 = 0.1;

/// One use of the drink form.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DrinkOrder {
    pub name: String,
    pub item_id: String,
    pub promille_raw: String,
    pub amount: u32,
    pub effect: f64,
}

impl DrinkOrder {
    fn from_stock(stock: &DrinkStock, amount: u32) -> Self {
        Self {
            name: stock.name.clone(),
            item_id: stock.item_id.clone(),
            promille_raw: stock.promille_raw.clone(),
            amount,
            effect: stock.effect(),
        }
    }

    pub fn total_effect(&self) -> f64 {
        self.effect * self.amount as f64
    }

    pub fn describe(&self) -> String {
        format!("{}x {} ({:+.2}‰)", self.amount, self.name, self.total_effect())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DrinkPlan {
    pub orders: Vec<DrinkOrder>,
    /// Promille expected after all orders.
    pub expected_promille: f64,
}

#[derive(Debug, Error, PartialEq)]
pub enum PlanError {
    #[error("promille too high: {0:.2}‰")]
    TooDrunk(f64),
    #[error("no drinks in stock")]
    NoDrinks,
    #[error("no food in stock")]
    NoFood,
}

/// Plans the drinks needed to go from `current` to `target` promille.
///
/// An empty plan means the level is already high enough.
pub fn plan_drinks(current: f64, target: f64, stock: &[DrinkStock]) -> Result<DrinkPlan, PlanError> {
    let target = target.clamp(PROMILLE_SAFE_MIN, PROMILLE_SAFE_MAX);
    if current >= PROMILLE_WARNING {
        return Err(PlanError::TooDrunk(current));
    }

    let mut plan = DrinkPlan {
        orders: Vec::new(),
        expected_promille: current,
    };
    let mut safe_max = PROMILLE_SAFE_MAX - current;
    if current >= target || safe_max <= 0.0 {
        return Ok(plan);
    }
    if stock.is_empty() {
        return Err(PlanError::NoDrinks);
    }
    let mut needed = (target - current).min(safe_max);

    let usable = stock.iter().filter(|d| d.count > 0 && d.effect() > 0.0);
    let mut strong: Vec<&DrinkStock> = usable.clone().filter(|d| d.effect() >= STRONG_EFFECT).collect();
    let mut weak: Vec<&DrinkStock> = usable.filter(|d| d.effect() <= WEAK_EFFECT).collect();
    strong.sort_by(|a, b| b.effect().total_cmp(&a.effect()));
    weak.sort_by(|a, b| a.effect().total_cmp(&b.effect()));

    if let Some(drink) = strong.first().filter(|_| needed >= STRONG_EFFECT) {
        let effect = drink.effect();
        let wanted = ((needed - STRONG_RESERVE).min(safe_max - STRONG_RESERVE) / effect) as u32;
        let amount = wanted.max(1).min(drink.count);
        if effect * amount as f64 <= safe_max {
            let order = DrinkOrder::from_stock(drink, amount);
            plan.expected_promille += order.total_effect();
            plan.orders.push(order);
            needed = target - plan.expected_promille;
            safe_max = PROMILLE_SAFE_MAX - plan.expected_promille;
        }
    }

    if let Some(drink) = weak.first().filter(|_| needed > FINE_TUNE_MIN && safe_max > FINE_TUNE_MIN) {
        let effect = drink.effect();
        let amount = ((needed / effect) as u32 + 1).min(drink.count);
        if effect * amount as f64 <= safe_max {
            let order = DrinkOrder::from_stock(drink, amount);
            plan.expected_promille += order.total_effect();
            plan.orders.push(order);
        }
    }

    Ok(plan)
}

/// Plans the food needed to get from `current` down to `target` promille.
///
/// Strongest food first; each item is eaten until the target is reached or
/// the stock runs out.
pub fn plan_food(current: f64, target: f64, stock: &[DrinkStock]) -> Result<DrinkPlan, PlanError> {
    let mut plan = DrinkPlan {
        orders: Vec::new(),
        expected_promille: current,
    };
    if current <= target {
        return Ok(plan);
    }

    let mut food: Vec<&DrinkStock> = stock.iter().filter(|f| f.count > 0 && f.effect() < 0.0).collect();
    if food.is_empty() {
        return Err(PlanError::NoFood);
    }
    food.sort_by(|a, b| a.effect().total_cmp(&b.effect()));

    for item in food {
        let remaining = plan.expected_promille - target;
        if remaining <= 0.0 {
            break;
        }
        let amount = ((remaining / item.effect().abs()) as u32 + 1).min(item.count);
        let order = DrinkOrder::from_stock(item, amount);
        plan.expected_promille = (plan.expected_promille + order.total_effect()).max(0.0);
        plan.orders.push(order);
    }
    Ok(plan)
}
