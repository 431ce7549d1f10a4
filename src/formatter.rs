use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::config::AlertPolicy;
use crate::models::{AlertBatch, ChangeKind, PriceChangeEvent, StockStatus};

/// Turn a reconciled alert batch into outbound Markdown messages.
///
/// One message per event, unless `batch_alerts` is set and there is more than
/// one event, in which case a single compact digest is produced. Pure
/// formatting; no network or I/O.
pub fn format(batch: &AlertBatch, policy: &AlertPolicy) -> Vec<String> {
    if batch.is_empty() {
        return Vec::new();
    }

    if policy.batch_alerts && batch.len() > 1 {
        vec![format_digest(batch)]
    } else {
        batch.iter().map(format_single).collect()
    }
}

fn format_single(event: &PriceChangeEvent) -> String {
    match event.kind {
        ChangeKind::NewProduct => format!(
            "*New Product Detected*\n\n\
             Product: `{}`\n\
             Competitor: {}\n\
             Price: {}",
            event.product_id,
            event.competitor_name,
            format_price(event.new_price, &event.currency),
        ),
        ChangeKind::PriceIncrease | ChangeKind::PriceDecrease => {
            let (emoji, direction) = direction_marker(event.kind);
            format!(
                "{} *Price Alert*\n\n\
                 Product: `{}`\n\
                 Competitor: {}\n\n\
                 Old price: {}\n\
                 New price: {}\n\
                 Change: {} ({})",
                emoji,
                event.product_id,
                event.competitor_name,
                format_price(event.old_price, &event.currency),
                format_price(event.new_price, &event.currency),
                format_percent(event.percent_change),
                direction,
            )
        }
        ChangeKind::StockChanged => format!(
            "*Stock Change*\n\n\
             Product: `{}`\n\
             Competitor: {}\n\
             Stock: {} → {}",
            event.product_id,
            event.competitor_name,
            stock_label(event.old_stock),
            stock_label(event.new_stock),
        ),
        ChangeKind::Error => format!(
            "⚠️ *Scrape Error*\n\n\
             Product: `{}`\n\
             Competitor: {}\n\
             Reason: {}",
            event.product_id,
            event.competitor_name,
            event.error.as_deref().unwrap_or("unknown"),
        ),
        ChangeKind::PriceUnchanged => format!(
            "Product `{}` ({}): price unchanged at {}",
            event.product_id,
            event.competitor_name,
            format_price(event.new_price, &event.currency),
        ),
    }
}

fn format_digest(batch: &AlertBatch) -> String {
    let mut lines = vec!["*Price Monitor Update*\n".to_string()];

    for event in batch {
        let line = match event.kind {
            ChangeKind::NewProduct => format!(
                "• NEW: `{}` @ {}",
                event.product_id,
                format_price(event.new_price, &event.currency),
            ),
            ChangeKind::PriceIncrease | ChangeKind::PriceDecrease => {
                let (emoji, _) = direction_marker(event.kind);
                format!(
                    "{} `{}`: {} → {} ({})",
                    emoji,
                    event.product_id,
                    format_price(event.old_price, &event.currency),
                    format_price(event.new_price, &event.currency),
                    format_percent(event.percent_change),
                )
            }
            ChangeKind::StockChanged => format!(
                "• `{}`: stock {} → {}",
                event.product_id,
                stock_label(event.old_stock),
                stock_label(event.new_stock),
            ),
            ChangeKind::Error => format!(
                "⚠️ `{}`: {}",
                event.product_id,
                event.error.as_deref().unwrap_or("unknown"),
            ),
            ChangeKind::PriceUnchanged => format!("• `{}`: unchanged", event.product_id),
        };
        lines.push(line);
    }

    lines.join("\n")
}

fn direction_marker(kind: ChangeKind) -> (&'static str, &'static str) {
    match kind {
        ChangeKind::PriceIncrease => ("📈", "increased"),
        ChangeKind::PriceDecrease => ("📉", "decreased"),
        _ => ("", ""),
    }
}

/// Render a price with the currency symbol from the observation's context,
/// two decimal places.
fn format_price(price: Option<Decimal>, currency: &str) -> String {
    match price {
        Some(p) => format!("{}{:.2}", currency_symbol(currency), p),
        None => "n/a".to_string(),
    }
}

/// Percentages to one decimal place with an explicit sign: `+8.3%`, `-10.0%`.
fn format_percent(percent: Option<Decimal>) -> String {
    match percent {
        Some(pc) => format!("{:+.1}%", pc.to_f64().unwrap_or(0.0)),
        None => "n/a".to_string(),
    }
}

fn currency_symbol(code: &str) -> &str {
    match code {
        "USD" | "AUD" | "CAD" | "NZD" => "$",
        "GBP" => "£",
        "EUR" => "€",
        "JPY" | "CNY" => "¥",
        "INR" => "₹",
        other => other,
    }
}

fn stock_label(status: Option<StockStatus>) -> &'static str {
    match status {
        Some(StockStatus::InStock) => "in stock",
        Some(StockStatus::OutOfStock) => "out of stock",
        Some(StockStatus::Unknown) | None => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn event(kind: ChangeKind, old: Option<&str>, new: Option<&str>) -> PriceChangeEvent {
        let old_price = old.map(dec);
        let new_price = new.map(dec);
        let percent_change = match (old_price, new_price) {
            (Some(o), Some(n)) if !o.is_zero() => Some((n - o) / o * Decimal::ONE_HUNDRED),
            _ => None,
        };
        PriceChangeEvent {
            product_id: "p1".to_string(),
            competitor_name: "Acme Store".to_string(),
            kind,
            old_price,
            new_price,
            percent_change,
            old_stock: None,
            new_stock: None,
            currency: "USD".to_string(),
            error: None,
        }
    }

    fn batch_of(events: Vec<PriceChangeEvent>) -> AlertBatch {
        let mut batch = AlertBatch::new();
        for e in events {
            batch.push(e);
        }
        batch
    }

    #[test]
    fn test_empty_batch_produces_no_messages() {
        assert!(format(&AlertBatch::new(), &AlertPolicy::default()).is_empty());
    }

    #[test]
    fn test_new_product_message() {
        let batch = batch_of(vec![event(ChangeKind::NewProduct, None, Some("999.99"))]);
        let messages = format(&batch, &AlertPolicy::default());

        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("New Product Detected"));
        assert!(messages[0].contains("`p1`"));
        assert!(messages[0].contains("$999.99"));
    }

    #[test]
    fn test_decrease_message_has_signed_percent() {
        let batch = batch_of(vec![event(
            ChangeKind::PriceDecrease,
            Some("999.99"),
            Some("899.99"),
        )]);
        let messages = format(&batch, &AlertPolicy::default());

        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("📉"));
        assert!(messages[0].contains("Old price: $999.99"));
        assert!(messages[0].contains("New price: $899.99"));
        assert!(messages[0].contains("-10.0%"));
        assert!(messages[0].contains("decreased"));
    }

    #[test]
    fn test_increase_percent_carries_plus_sign() {
        let batch = batch_of(vec![event(
            ChangeKind::PriceIncrease,
            Some("120"),
            Some("130"),
        )]);
        let messages = format(&batch, &AlertPolicy::default());

        assert!(messages[0].contains("+8.3%"));
        assert!(messages[0].contains("increased"));
    }

    #[test]
    fn test_error_message_always_formattable() {
        let mut e = event(ChangeKind::Error, None, None);
        e.error = Some("timeout".to_string());
        let messages = format(&batch_of(vec![e]), &AlertPolicy::default());

        assert!(messages[0].contains("Scrape Error"));
        assert!(messages[0].contains("`p1`"));
        assert!(messages[0].contains("timeout"));
    }

    #[test]
    fn test_stock_change_message() {
        let mut e = event(ChangeKind::StockChanged, Some("50"), Some("50"));
        e.old_stock = Some(StockStatus::InStock);
        e.new_stock = Some(StockStatus::OutOfStock);
        let messages = format(&batch_of(vec![e]), &AlertPolicy::default());

        assert!(messages[0].contains("in stock → out of stock"));
    }

    #[test]
    fn test_batching_collapses_to_one_message() {
        let batch = batch_of(vec![
            event(ChangeKind::NewProduct, None, Some("10.00")),
            event(ChangeKind::PriceDecrease, Some("100"), Some("90")),
        ]);

        let messages = format(&batch, &AlertPolicy::default());

        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with("*Price Monitor Update*"));
        assert!(messages[0].contains("• NEW: `p1` @ $10.00"));
        assert!(messages[0].contains("$100.00 → $90.00 (-10.0%)"));
    }

    #[test]
    fn test_single_event_not_batched() {
        // A one-event batch gets the full per-event format even with
        // batch_alerts enabled
        let batch = batch_of(vec![event(
            ChangeKind::PriceDecrease,
            Some("100"),
            Some("90"),
        )]);
        let messages = format(&batch, &AlertPolicy::default());

        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("*Price Alert*"));
    }

    #[test]
    fn test_unbatched_policy_produces_one_message_per_event() {
        let policy = AlertPolicy {
            batch_alerts: false,
            ..AlertPolicy::default()
        };
        let batch = batch_of(vec![
            event(ChangeKind::NewProduct, None, Some("10.00")),
            event(ChangeKind::PriceIncrease, Some("100"), Some("110")),
            event(ChangeKind::PriceDecrease, Some("50"), Some("40")),
        ]);

        let messages = format(&batch, &policy);

        assert_eq!(messages.len(), 3);
        assert!(messages[0].contains("New Product"));
        assert!(messages[1].contains("+10.0%"));
        assert!(messages[2].contains("-20.0%"));
    }

    #[test]
    fn test_digest_preserves_batch_order() {
        let mut first = event(ChangeKind::PriceDecrease, Some("100"), Some("90"));
        first.product_id = "zzz".to_string();
        let mut second = event(ChangeKind::NewProduct, None, Some("5.00"));
        second.product_id = "aaa".to_string();

        let messages = format(&batch_of(vec![first, second]), &AlertPolicy::default());

        let zzz = messages[0].find("`zzz`").unwrap();
        let aaa = messages[0].find("`aaa`").unwrap();
        assert!(zzz < aaa);
    }

    #[test]
    fn test_currency_symbols() {
        let mut e = event(ChangeKind::NewProduct, None, Some("49.99"));
        e.currency = "EUR".to_string();
        let messages = format(&batch_of(vec![e]), &AlertPolicy::default());
        assert!(messages[0].contains("€49.99"));

        let mut e = event(ChangeKind::NewProduct, None, Some("49.99"));
        e.currency = "GBP".to_string();
        let messages = format(&batch_of(vec![e]), &AlertPolicy::default());
        assert!(messages[0].contains("£49.99"));
    }
}
