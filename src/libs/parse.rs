//! Tolerant extraction of activity state from game pages.
//!
//! The game renders countdowns as inline script calls in the page header,
//! e.g. `counter(1742, "/skills/")`. A positive value means the activity is
//! running. Counters are read from the raw script text; everything else
//! goes through `scraper` selectors. Nothing here fails: a field that cannot
//! be found or parsed is simply `None` in the snapshot.

use super::activity::ActivityKind;
use super::snapshot::{DrinkStock, PageSnapshot, SnapshotEntry};
use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Selector};

/// Header counter target path for each kind that has one.
fn counter_path(kind: ActivityKind) -> Option<&'static str> {
    match kind {
        ActivityKind::Training => Some("/skills/"),
        ActivityKind::Combat => Some("/fight/"),
        ActivityKind::Collection => Some("/activities/"),
        ActivityKind::IntoxicationManagement => None,
    }
}

/// Builds a snapshot from any game page.
pub fn parse_page(html: &str, captured_at: DateTime<Utc>) -> PageSnapshot {
    let mut snapshot = PageSnapshot::new(captured_at);

    for kind in ActivityKind::ALL {
        if let Some(path) = counter_path(kind) {
            if let Some(seconds) = header_counter(html, path) {
                snapshot.entries.insert(kind, SnapshotEntry::from_counter(seconds));
            }
        }
    }

    let document = Html::parse_document(html);
    snapshot.promille = promille(&document);
    snapshot.bottle_price_cents = bottle_price(&document);
    snapshot.bottle_count = bottle_count(&document);
    snapshot.drinks = drinks(&document);
    snapshot
}

/// Seconds of the first `counter(<secs>, "<path>...")` call, if any.
pub fn header_counter(html: &str, path: &str) -> Option<i64> {
    let mut rest = html;
    while let Some(pos) = rest.find("counter(") {
        rest = &rest[pos + "counter(".len()..];
        let digits_len = rest
            .char_indices()
            .take_while(|(i, c)| c.is_ascii_digit() || (*i == 0 && *c == '-'))
            .count();
        if digits_len == 0 {
            continue;
        }
        let Ok(seconds) = rest[..digits_len].parse::<i64>() else {
            continue;
        };
        let tail = rest[digits_len..].trim_start_matches([',', '"', '\'', ' ']);
        if tail.starts_with(path) {
            return Some(seconds);
        }
    }
    None
}

/// Current promille from the header (`<li class="icon beer">2.50 ‰</li>`).
pub fn parse_promille(html: &str) -> Option<f64> {
    promille(&Html::parse_document(html))
}

/// Bottle price in cents from the header (`<li class="icon bottle">21 Cent</li>`).
pub fn parse_bottle_price(html: &str) -> Option<u32> {
    bottle_price(&Html::parse_document(html))
}

/// Sellable bottles from the stock page (`<input name="max" value="...">`).
pub fn parse_bottle_count(html: &str) -> Option<u32> {
    bottle_count(&Html::parse_document(html))
}

/// Hidden `chkval` token the sell form must echo back.
pub fn parse_sell_token(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    input_value(document.root_element(), "chkval")
}

/// Items offered by the `/stock/foodstuffs/use/` forms.
///
/// Drinks and food share the form; food carries a negative promille value.
pub fn parse_drinks(html: &str) -> Vec<DrinkStock> {
    drinks(&Html::parse_document(html))
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

fn promille(document: &Html) -> Option<f64> {
    let text = first_text(document, "li.icon.beer")?;
    let before = &text[..text.find('‰')?];
    last_number(before)?.replace(',', ".").parse().ok()
}

fn bottle_price(document: &Html) -> Option<u32> {
    let text = first_text(document, "li.icon.bottle")?;
    let before = &text[..text.find("Cent")?];
    last_number(before)?.parse().ok()
}

fn bottle_count(document: &Html) -> Option<u32> {
    input_value(document.root_element(), "max")?.trim().parse().ok()
}

fn drinks(document: &Html) -> Vec<DrinkStock> {
    let (Some(forms), Some(inputs)) = (selector(r#"form[action="/stock/foodstuffs/use/"]"#), selector("input")) else {
        return Vec::new();
    };

    document
        .select(&forms)
        .filter_map(|form| {
            let name = input_value(form, "item").filter(|name| !name.is_empty())?;
            let item_id = input_value(form, "id").filter(|id| !id.is_empty())?;
            let stock_id = format!("lager_{}", name);
            let count = form
                .select(&inputs)
                .find(|input| input.value().id() == Some(stock_id.as_str()))
                .and_then(|input| input.value().attr("value"))
                .and_then(|value| value.trim().parse().ok())
                .unwrap_or(0);

            Some(DrinkStock {
                promille_raw: input_value(form, "promille").unwrap_or_else(|| "0".to_string()),
                name,
                item_id,
                count,
            })
        })
        .collect()
}

/// Value of the first `<input name="...">` below `scope`.
fn input_value(scope: ElementRef<'_>, name: &str) -> Option<String> {
    let inputs = selector("input[name]")?;
    scope
        .select(&inputs)
        .find(|input| input.value().attr("name") == Some(name))
        .and_then(|input| input.value().attr("value"))
        .map(str::to_string)
}

/// Trimmed text of the first element matching `css`.
fn first_text(document: &Html, css: &str) -> Option<String> {
    let selector = selector(css)?;
    let element = document.select(&selector).next()?;
    Some(element.text().collect::<String>().trim().to_string())
}

/// Last run of digits (with `.`/`,` separators) in `text`.
fn last_number(text: &str) -> Option<String> {
    let trimmed = text.trim_end();
    let start = trimmed
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit() || *c == '.' || *c == ',')
        .last()
        .map(|(i, _)| i)?;
    let number = trimmed[start..].trim_matches(|c| c == '.' || c == ',');
    if number.is_empty() {
        None
    } else {
        Some(number.to_string())
    }
}
