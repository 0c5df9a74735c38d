//! HTTP client for the game server.
//!
//! Requests carry the session cookie copied from a logged-in browser. The
//! game answers every form post with a full page, so state is read straight
//! from the response where possible instead of fetching again.

use super::{RemoteGame, StartAck, StartRequest};
use crate::libs::activity::{ActivityKind, ActivityParams};
use crate::libs::config::ServerConfig;
use crate::libs::error::RemoteError;
use crate::libs::finish::{FinishPlan, FinishReport, FinishStep};
use crate::libs::intoxication::{plan_food, DrinkOrder};
use crate::libs::parse;
use crate::libs::snapshot::PageSnapshot;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, COOKIE, USER_AGENT};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, warn};

include!(concat!(env!("OUT_DIR"), "/app_metadata.rs"));

const OVERVIEW_URL: &str = "/overview/";
const STOCK_URL: &str = "/stock/";
const BOTTLE_STOCK_URL: &str = "/stock/bottle/";
const BOTTLE_SELL_URL: &str = "/stock/bottle/sell/";
const COLLECT_URL: &str = "/activities/bottle/";
const SKILL_CANCEL_URL: &str = "/skill/cancel/";
const DRINK_URL: &str = "/stock/foodstuffs/use/";
const FOOD_URL: &str = "/stock/foodstuffs/food/";
const PUMP_URL: &str = "/city/medicine/help/";

/// Only rendered for logged-in players.
const LOGGED_IN_MARKER: &str = "Profil ansehen";
const TRAINING_RUNNING_MARKER: &str = "Es läuft bereits eine Weiterbildung";
const PUMPED_MARKER: &str = "ausgepumpt";
const CART_PENDING_MARKER: &str = "bottlecollect_pending";

pub struct GameClient {
    client: Client,
    base_url: String,
}

impl GameClient {
    pub fn new(config: &ServerConfig, timeout: Duration) -> Result<Self, RemoteError> {
        let mut headers = HeaderMap::new();
        let user_agent = config.user_agent.as_deref().unwrap_or(APP_METADATA_USER_AGENT);
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(user_agent).map_err(|e| RemoteError::Rejected(e.to_string()))?,
        );
        if !config.session_cookie.is_empty() {
            headers.insert(
                COOKIE,
                HeaderValue::from_str(&config.session_cookie).map_err(|e| RemoteError::Rejected(e.to_string()))?,
            );
        }

        let client = Client::builder()
            .default_headers(headers)
            .cookie_store(true)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get(&self, path: &str) -> Result<String, RemoteError> {
        debug!("GET {}{}", self.base_url, path);
        let res = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .map_err(transport)?
            .error_for_status()?;
        res.text().await.map_err(transport)
    }

    async fn post(&self, path: &str, form: &[(&str, String)]) -> Result<String, RemoteError> {
        debug!("POST {}{}", self.base_url, path);
        let res = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .form(form)
            .send()
            .await
            .map_err(transport)?
            .error_for_status()?;
        res.text().await.map_err(transport)
    }

    /// Fetches `path` and fails when the session is no longer valid.
    async fn page(&self, path: &str) -> Result<String, RemoteError> {
        let html = self.get(path).await?;
        if !html.contains(LOGGED_IN_MARKER) {
            return Err(RemoteError::Rejected("not logged in, refresh the session cookie".to_string()));
        }
        Ok(html)
    }

    async fn empty_cart(&self) -> Result<String, RemoteError> {
        self.post(
            COLLECT_URL,
            &[
                ("type", "1".to_string()),
                ("time", "10".to_string()),
                ("bottlecollect_pending", "True".to_string()),
                ("Submit2", "Einkaufswagen ausleeren".to_string()),
            ],
        )
        .await
    }

    async fn start_collection(&self, minutes: u32) -> Result<StartAck, RemoteError> {
        let page = self.page(COLLECT_URL).await?;
        if page.contains(CART_PENDING_MARKER) {
            self.empty_cart().await?;
        }

        let html = self
            .post(COLLECT_URL, &[("sammeln", minutes.to_string()), ("konzentrieren", "1".to_string())])
            .await?;
        Ok(StartAck {
            confirmed_remaining: parse::header_counter(&html, "/activities/").filter(|s| *s > 0),
        })
    }

    async fn start_training(&self, request: &StartRequest) -> Result<StartAck, RemoteError> {
        let ActivityParams::Training { skill } = &request.params else {
            return Err(RemoteError::Rejected("training needs a skill".to_string()));
        };
        let html = self.post(&format!("/skill/upgrade/{}/", skill), &[]).await?;
        if !html.contains(TRAINING_RUNNING_MARKER) {
            return Err(RemoteError::Rejected(format!("training {} was not accepted", skill)));
        }
        Ok(StartAck {
            confirmed_remaining: parse::header_counter(&html, "/skills/").filter(|s| *s > 0),
        })
    }

    /// Posts one use of the foodstuffs form and returns the answer page.
    async fn consume(&self, order: &DrinkOrder) -> Result<String, RemoteError> {
        info!(item = %order.name, amount = order.amount, "consuming");
        self.post(
            DRINK_URL,
            &[
                ("item", order.name.clone()),
                ("promille", order.promille_raw.clone()),
                ("id", order.item_id.clone()),
                ("menge", order.amount.to_string()),
            ],
        )
        .await
    }

    async fn drink(&self, request: &StartRequest) -> Result<StartAck, RemoteError> {
        for order in &request.drinks {
            self.consume(order).await?;
        }
        Ok(StartAck::default())
    }

    async fn sell_bottles(&self, min_price_cents: u32, report: &mut FinishReport) -> Result<(), RemoteError> {
        let html = self.page(BOTTLE_STOCK_URL).await?;
        let price = parse::parse_bottle_price(&html);
        let count = parse::parse_bottle_count(&html).unwrap_or(0);

        match price {
            Some(price) if price >= min_price_cents => {}
            Some(price) => {
                report.note(format!("kept bottles, price {} ct below {} ct", price, min_price_cents));
                return Ok(());
            }
            None => {
                report.note("kept bottles, price unknown");
                return Ok(());
            }
        }
        if count == 0 {
            report.note("no bottles to sell");
            return Ok(());
        }
        let Some(chkval) = parse::parse_sell_token(&html) else {
            report.note("kept bottles, sell form not found");
            return Ok(());
        };

        self.post(
            BOTTLE_SELL_URL,
            &[("chkval", chkval), ("max", count.to_string()), ("sum", count.to_string())],
        )
        .await?;
        report.note(format!("sold {} bottles", count));
        Ok(())
    }

    async fn pump_stomach(&self, report: &mut FinishReport) -> Result<(), RemoteError> {
        let html = self
            .post(PUMP_URL, &[("id", "2".to_string()), ("submitForm", "Für €500.00 durchführen".to_string())])
            .await?;
        if !html.contains(PUMPED_MARKER) {
            return Err(RemoteError::Rejected("stomach pump refused".to_string()));
        }
        match parse::parse_promille(&html) {
            Some(promille) => report.note(format!("sobered up to {:.2}‰", promille)),
            None => report.note("sobered up"),
        }
        Ok(())
    }

    async fn eat_food(&self, report: &mut FinishReport) -> Result<(), RemoteError> {
        let html = self.page(FOOD_URL).await?;
        let Some(current) = parse::parse_promille(&html) else {
            report.note("kept eating, promille unknown");
            return Ok(());
        };
        let plan = match plan_food(current, 0.0, &parse::parse_drinks(&html)) {
            Ok(plan) => plan,
            Err(err) => {
                report.note(format!("not sobered up: {}", err));
                return Ok(());
            }
        };
        if plan.orders.is_empty() {
            return Ok(());
        }

        let mut last = None;
        for order in &plan.orders {
            last = Some(self.consume(order).await?);
        }
        let eaten = plan.orders.iter().map(DrinkOrder::describe).collect::<Vec<_>>().join(", ");
        match last.as_deref().and_then(parse::parse_promille) {
            Some(promille) => report.note(format!("ate {}, now {:.2}‰", eaten, promille)),
            None => report.note(format!("ate {}", eaten)),
        }
        Ok(())
    }

    /// Runs one optional step; a failure becomes a note so the mandatory
    /// steps of the plan still count as applied.
    async fn optional_step(&self, step: &FinishStep, report: &mut FinishReport) {
        let result = match step {
            FinishStep::SellBottles { min_price_cents } => self.sell_bottles(*min_price_cents, report).await,
            FinishStep::PumpStomach => self.pump_stomach(report).await,
            FinishStep::EatFood => self.eat_food(report).await,
            FinishStep::EmptyCart => Ok(()),
        };
        if let Err(err) = result {
            warn!(?step, %err, "optional finishing step failed");
            report.note(format!("skipped {}: {}", step.label(), err));
        }
    }
}

/// Keeps client timeouts distinguishable from other transport failures.
fn transport(err: reqwest::Error) -> RemoteError {
    if err.is_timeout() {
        RemoteError::Timeout
    } else {
        RemoteError::Http(err)
    }
}

#[async_trait]
impl RemoteGame for GameClient {
    async fn start(&self, kind: ActivityKind, request: &StartRequest) -> Result<StartAck, RemoteError> {
        info!(%kind, minutes = request.minutes, "starting activity");
        match kind {
            ActivityKind::Collection => self.start_collection(request.minutes).await,
            ActivityKind::Training => self.start_training(request).await,
            ActivityKind::IntoxicationManagement => self.drink(request).await,
            ActivityKind::Combat => Err(RemoteError::Unsupported),
        }
    }

    async fn cancel(&self, kind: ActivityKind) -> Result<(), RemoteError> {
        info!(%kind, "cancelling activity");
        match kind {
            ActivityKind::Collection => {
                self.post(COLLECT_URL, &[("cancel", "1".to_string()), ("Submit2", "Abbrechen".to_string())])
                    .await?;
            }
            ActivityKind::Training => {
                self.post(SKILL_CANCEL_URL, &[("skill_num", "1".to_string())]).await?;
            }
            // Nothing runs remotely; ending the hold window is local.
            ActivityKind::IntoxicationManagement => {}
            ActivityKind::Combat => return Err(RemoteError::Unsupported),
        }
        Ok(())
    }

    async fn finish(&self, plan: &FinishPlan) -> Result<FinishReport, RemoteError> {
        let mut report = FinishReport::default();
        for step in &plan.steps {
            match step {
                FinishStep::EmptyCart => {
                    self.empty_cart().await?;
                    report.note("emptied cart");
                }
                optional => self.optional_step(optional, &mut report).await,
            }
        }
        Ok(report)
    }

    async fn snapshot(&self) -> Result<PageSnapshot, RemoteError> {
        let html = self.page(OVERVIEW_URL).await?;
        Ok(parse::parse_page(&html, Utc::now()))
    }

    async fn inventory(&self) -> Result<PageSnapshot, RemoteError> {
        let html = self.page(STOCK_URL).await?;
        Ok(parse::parse_page(&html, Utc::now()))
    }
}
