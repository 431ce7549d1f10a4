use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{generate_id, FetchErrorKind, StockStatus};

/// One scrape result for one product at one point in time.
///
/// `price` is none when the price text failed to parse; `price_raw` keeps the
/// original extracted text for diagnostics either way. An observation with
/// `fetch_error` set carries no price or stock values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Observation {
    pub id: String,
    pub product_id: String,
    pub competitor_name: String,
    pub name: Option<String>,
    pub price: Option<Decimal>,
    pub price_raw: Option<String>,
    pub currency: String,
    pub stock_status: Option<StockStatus>,
    pub url: Option<String>,
    pub scraped_at: DateTime<Utc>,
    pub fetch_error: Option<FetchErrorKind>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewObservation {
    pub product_id: String,
    pub competitor_name: String,
    pub name: Option<String>,
    pub price: Option<Decimal>,
    pub price_raw: Option<String>,
    pub currency: Option<String>,
    pub stock_status: Option<StockStatus>,
    pub url: Option<String>,
}

impl Observation {
    pub fn new(new_observation: NewObservation) -> Self {
        Self {
            id: generate_id(),
            product_id: new_observation.product_id,
            competitor_name: new_observation.competitor_name,
            name: new_observation.name,
            price: new_observation.price,
            price_raw: new_observation.price_raw,
            currency: new_observation.currency.unwrap_or_else(|| "USD".to_string()),
            stock_status: new_observation.stock_status,
            url: new_observation.url,
            scraped_at: Utc::now(),
            fetch_error: None,
        }
    }

    /// Build an observation for a scrape that failed outright. Invariant: no
    /// price or stock values are carried, only the error classification.
    pub fn fetch_failed(
        product_id: impl Into<String>,
        competitor_name: impl Into<String>,
        error: FetchErrorKind,
    ) -> Self {
        Self {
            id: generate_id(),
            product_id: product_id.into(),
            competitor_name: competitor_name.into(),
            name: None,
            price: None,
            price_raw: None,
            currency: "USD".to_string(),
            stock_status: None,
            url: None,
            scraped_at: Utc::now(),
            fetch_error: Some(error),
        }
    }

    pub fn is_fetch_error(&self) -> bool {
        self.fetch_error.is_some()
    }

    /// A parse failure: the scrape succeeded but the price text could not be
    /// turned into a number.
    pub fn is_parse_failure(&self) -> bool {
        self.fetch_error.is_none() && self.price.is_none()
    }
}
