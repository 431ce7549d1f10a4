use metrics::counter;
use std::collections::HashMap;
use tracing::{error, info, warn};

use crate::config::{AlertPolicy, CompetitorConfig};
use crate::formatter;
use crate::models::Observation;
use crate::notifier::Notifier;
use crate::reconciler;
use crate::scraper::ProductFetcher;
use crate::storage::HistoryStore;
use crate::utils::error::Result;

/// Outcome of one scrape cycle, for logging and the CLI summary line.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleSummary {
    pub total_products: usize,
    pub fetch_errors: usize,
    pub parse_failures: usize,
    pub observations_stored: usize,
    pub changes_detected: usize,
    pub alerts_sent: usize,
    pub transport_errors: usize,
}

/// Run one complete scrape → compare → persist → notify cycle.
///
/// Ordering is deliberate: every storable observation is persisted before the
/// first notification goes out, so a delivery failure never loses history.
/// Store failures abort the cycle; notifier failures are logged and counted
/// but never fatal.
pub async fn run_cycle(
    fetcher: &dyn ProductFetcher,
    store: &dyn HistoryStore,
    notifier: &dyn Notifier,
    competitors: &[CompetitorConfig],
    policy: &AlertPolicy,
) -> Result<CycleSummary> {
    let observations = fetcher.fetch_all(competitors).await;
    let mut summary = CycleSummary {
        total_products: observations.len(),
        ..Default::default()
    };
    counter!("pricewatch_products_scraped_total").increment(observations.len() as u64);

    // Load each product's prior observation up front so reconciliation stays
    // a pure pass over the batch.
    let mut last_seen: HashMap<(String, String), Observation> = HashMap::new();
    for obs in &observations {
        if obs.is_fetch_error() {
            summary.fetch_errors += 1;
            continue;
        }
        if obs.is_parse_failure() {
            summary.parse_failures += 1;
        }
        let key = (obs.product_id.clone(), obs.competitor_name.clone());
        if !last_seen.contains_key(&key) {
            if let Some(last) = store.get_last(&obs.product_id, &obs.competitor_name).await? {
                last_seen.insert(key, last);
            }
        }
    }

    let batch = reconciler::reconcile(
        &observations,
        |product_id, competitor_name| {
            last_seen
                .get(&(product_id.to_string(), competitor_name.to_string()))
                .cloned()
        },
        policy,
    );
    summary.changes_detected = batch.len();
    counter!("pricewatch_changes_detected_total").increment(batch.len() as u64);

    // Persist before notifying. Only observations with a parsed price enter
    // history; fetch errors and parse failures keep the previous good
    // observation as the comparison point for the next cycle.
    for obs in &observations {
        if obs.is_fetch_error() || obs.price.is_none() {
            continue;
        }
        store.append(obs).await?;
        summary.observations_stored += 1;
    }

    let messages = formatter::format(&batch, policy);
    for message in &messages {
        match notifier.send(message).await {
            Ok(()) => {
                summary.alerts_sent += 1;
                counter!("pricewatch_alerts_sent_total").increment(1);
            }
            Err(e) => {
                summary.transport_errors += 1;
                counter!("pricewatch_alert_failures_total").increment(1);
                error!(error = %e, "alert delivery failed");
            }
        }
    }

    if summary.fetch_errors > 0 || summary.parse_failures > 0 {
        warn!(
            fetch_errors = summary.fetch_errors,
            parse_failures = summary.parse_failures,
            "cycle completed with scrape problems"
        );
    }
    info!(
        products = summary.total_products,
        stored = summary.observations_stored,
        changes = summary.changes_detected,
        alerts = summary.alerts_sent,
        "cycle complete"
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ProductConfig, SelectorConfig};
    use crate::models::{FetchErrorKind, NewObservation};
    use crate::notifier::MockNotifier;
    use crate::storage::SqliteHistoryStore;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use sqlx::sqlite::SqlitePoolOptions;
    use std::str::FromStr;

    struct ScriptedFetcher {
        observations: Vec<Observation>,
    }

    #[async_trait]
    impl ProductFetcher for ScriptedFetcher {
        async fn fetch_all(&self, _competitors: &[CompetitorConfig]) -> Vec<Observation> {
            self.observations.clone()
        }
    }

    async fn memory_store() -> SqliteHistoryStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        SqliteHistoryStore::from_pool(pool).await.unwrap()
    }

    fn observation(product_id: &str, price: &str) -> Observation {
        Observation::new(NewObservation {
            product_id: product_id.to_string(),
            competitor_name: "Acme".to_string(),
            name: Some("Widget".to_string()),
            price: Some(Decimal::from_str(price).unwrap()),
            price_raw: Some(format!("${}", price)),
            currency: Some("USD".to_string()),
            stock_status: None,
            url: None,
        })
    }

    fn competitors() -> Vec<CompetitorConfig> {
        vec![CompetitorConfig {
            name: "Acme".to_string(),
            base_url: "https://acme.example".to_string(),
            enabled: true,
            products: vec![ProductConfig {
                id: "p1".to_string(),
                url: "/p1".to_string(),
                selectors: SelectorConfig {
                    price: ".price".to_string(),
                    name: None,
                    stock: None,
                },
            }],
        }]
    }

    #[tokio::test]
    async fn test_first_cycle_stores_and_alerts_new_products() {
        let fetcher = ScriptedFetcher {
            observations: vec![observation("p1", "100.00"), observation("p2", "200.00")],
        };
        let store = memory_store().await;
        let mut notifier = MockNotifier::new();
        // Both new products land in one batched digest
        notifier
            .expect_send()
            .times(1)
            .returning(|_| Ok(()));

        let summary = run_cycle(
            &fetcher,
            &store,
            &notifier,
            &competitors(),
            &AlertPolicy::default(),
        )
        .await
        .unwrap();

        assert_eq!(summary.total_products, 2);
        assert_eq!(summary.observations_stored, 2);
        assert_eq!(summary.changes_detected, 2);
        assert_eq!(summary.alerts_sent, 1);
        assert!(store.get_last("p1", "Acme").await.unwrap().is_some());
        assert!(store.get_last("p2", "Acme").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_unchanged_prices_store_without_alerting() {
        let store = memory_store().await;
        store.append(&observation("p1", "100.00")).await.unwrap();

        let fetcher = ScriptedFetcher {
            observations: vec![observation("p1", "100.00")],
        };
        let mut notifier = MockNotifier::new();
        notifier.expect_send().times(0);

        let summary = run_cycle(
            &fetcher,
            &store,
            &notifier,
            &competitors(),
            &AlertPolicy::default(),
        )
        .await
        .unwrap();

        assert_eq!(summary.changes_detected, 0);
        assert_eq!(summary.alerts_sent, 0);
        assert_eq!(summary.observations_stored, 1);
    }

    #[tokio::test]
    async fn test_fetch_error_skips_history_but_alerts() {
        let store = memory_store().await;
        store.append(&observation("p1", "100.00")).await.unwrap();

        let fetcher = ScriptedFetcher {
            observations: vec![Observation::fetch_failed(
                "p1",
                "Acme",
                FetchErrorKind::Timeout,
            )],
        };
        let mut notifier = MockNotifier::new();
        notifier.expect_send().times(1).returning(|_| Ok(()));

        let summary = run_cycle(
            &fetcher,
            &store,
            &notifier,
            &competitors(),
            &AlertPolicy::default(),
        )
        .await
        .unwrap();

        assert_eq!(summary.fetch_errors, 1);
        assert_eq!(summary.observations_stored, 0);
        // Last known good observation survives for the next comparison
        let last = store.get_last("p1", "Acme").await.unwrap().unwrap();
        assert_eq!(last.price, Some(Decimal::from_str("100.00").unwrap()));
    }

    #[tokio::test]
    async fn test_transport_failure_is_not_fatal() {
        let fetcher = ScriptedFetcher {
            observations: vec![observation("p1", "100.00")],
        };
        let store = memory_store().await;
        let mut notifier = MockNotifier::new();
        notifier
            .expect_send()
            .times(1)
            .returning(|_| Err(crate::utils::error::AppError::Notification("down".to_string())));

        let summary = run_cycle(
            &fetcher,
            &store,
            &notifier,
            &competitors(),
            &AlertPolicy::default(),
        )
        .await
        .unwrap();

        assert_eq!(summary.transport_errors, 1);
        assert_eq!(summary.alerts_sent, 0);
        // History was written before the delivery attempt
        assert!(store.get_last("p1", "Acme").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_parse_failure_counted_and_not_stored() {
        let mut obs = observation("p1", "100.00");
        obs.price = None;
        obs.price_raw = Some("Call for price".to_string());

        let fetcher = ScriptedFetcher {
            observations: vec![obs],
        };
        let store = memory_store().await;
        let mut notifier = MockNotifier::new();
        notifier.expect_send().times(1).returning(|_| Ok(()));

        let summary = run_cycle(
            &fetcher,
            &store,
            &notifier,
            &competitors(),
            &AlertPolicy::default(),
        )
        .await
        .unwrap();

        assert_eq!(summary.parse_failures, 1);
        assert_eq!(summary.observations_stored, 0);
        assert_eq!(summary.changes_detected, 1);
    }
}
