use tracing::debug;

use crate::config::AlertPolicy;
use crate::detector::detect;
use crate::models::{AlertBatch, ChangeKind, Observation, PriceChangeEvent};

/// Run the change detector over a full cycle's observations and apply the
/// notification policy.
///
/// Observations are processed in the order received and the returned batch
/// preserves that order. `history` resolves the most recent prior observation
/// for a `(product_id, competitor_name)` pair, or none for a never-seen
/// product. Filtering here only decides what is surfaced as an alert; what
/// gets persisted is decided by the orchestrator, independently of this
/// policy.
pub fn reconcile<F>(
    observations: &[Observation],
    history: F,
    policy: &AlertPolicy,
) -> AlertBatch
where
    F: Fn(&str, &str) -> Option<Observation>,
{
    let mut batch = AlertBatch::new();

    for observation in observations {
        // Errors always surface; no history lookup, no threshold filtering
        if let Some(error) = &observation.fetch_error {
            batch.push(PriceChangeEvent::error(observation, error.to_string()));
            continue;
        }

        let last = history(&observation.product_id, &observation.competitor_name);
        let event = detect(observation, last.as_ref(), policy);

        if should_include(&event, policy) {
            batch.push(event);
        } else {
            debug!(
                product_id = %observation.product_id,
                kind = ?event.kind,
                "change event filtered by notification policy"
            );
        }
    }

    batch
}

fn should_include(event: &PriceChangeEvent, policy: &AlertPolicy) -> bool {
    match event.kind {
        ChangeKind::NewProduct => policy.notify_on_new_product,
        ChangeKind::PriceIncrease | ChangeKind::PriceDecrease => {
            // Strict comparison: a change of exactly the threshold is not
            // notified, and an unchanged price never alerts even at zero
            event
                .percent_change
                .map_or(false, |pc| pc.abs() > policy.price_change_threshold_percent)
        }
        ChangeKind::StockChanged => policy.notify_on_stock_change,
        ChangeKind::PriceUnchanged => false,
        ChangeKind::Error => true,
    }
}
