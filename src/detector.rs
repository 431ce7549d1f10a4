use rust_decimal::Decimal;

use crate::config::AlertPolicy;
use crate::models::{ChangeKind, Observation, PriceChangeEvent};

/// Classify one freshly scraped observation against the last stored
/// observation for the same product.
///
/// Pure function of its inputs: no side effects, no hidden state, identical
/// inputs always yield identical output. Threshold filtering is deliberately
/// not applied here; the detector reports the true delta and the reconciler
/// decides what surfaces as an alert.
pub fn detect(
    new_observation: &Observation,
    last_observation: Option<&Observation>,
    policy: &AlertPolicy,
) -> PriceChangeEvent {
    // A fetch failure is a skip, not a zero-change; detection logic does not
    // run on it.
    if let Some(error) = &new_observation.fetch_error {
        return PriceChangeEvent::error(new_observation, error.to_string());
    }

    // Scrape succeeded but the price text was unparseable
    let Some(new_price) = new_observation.price else {
        let reason = match &new_observation.price_raw {
            Some(raw) => format!("unparseable price text: {}", raw),
            None => "no price extracted".to_string(),
        };
        return PriceChangeEvent::error(new_observation, reason);
    };

    let Some(last) = last_observation else {
        return PriceChangeEvent::new_product(new_observation);
    };

    let old_price = last.price;
    let percent_change = percent_change(old_price, new_price);

    let kind = classify(old_price, new_price, last, new_observation, policy);

    PriceChangeEvent {
        product_id: new_observation.product_id.clone(),
        competitor_name: new_observation.competitor_name.clone(),
        kind,
        old_price,
        new_price: Some(new_price),
        percent_change,
        old_stock: last.stock_status,
        new_stock: new_observation.stock_status,
        currency: new_observation.currency.clone(),
        error: None,
    }
}

/// Signed percent delta `(new - old) / old * 100`; none when the old price is
/// absent or zero (cannot divide by zero).
fn percent_change(old_price: Option<Decimal>, new_price: Decimal) -> Option<Decimal> {
    match old_price {
        Some(old) if !old.is_zero() => Some((new_price - old) / old * Decimal::ONE_HUNDRED),
        _ => None,
    }
}

fn classify(
    old_price: Option<Decimal>,
    new_price: Decimal,
    last: &Observation,
    new_observation: &Observation,
    policy: &AlertPolicy,
) -> ChangeKind {
    // Price classification only applies with a nonzero prior price; a zero or
    // absent old price is treated as unchanged for pricing purposes.
    if let Some(old) = old_price {
        if !old.is_zero() && new_price != old {
            return if new_price > old {
                ChangeKind::PriceIncrease
            } else {
                ChangeKind::PriceDecrease
            };
        }
    }

    if policy.notify_on_stock_change && stock_differs(last, new_observation) {
        return ChangeKind::StockChanged;
    }

    ChangeKind::PriceUnchanged
}

fn stock_differs(last: &Observation, new_observation: &Observation) -> bool {
    match (last.stock_status, new_observation.stock_status) {
        (Some(old), Some(new)) => old != new,
        _ => false,
    }
}
