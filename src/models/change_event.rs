use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{Observation, StockStatus};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    NewProduct,
    PriceIncrease,
    PriceDecrease,
    PriceUnchanged,
    StockChanged,
    Error,
}

/// The unit the change detector produces: one classified change for one
/// product in one cycle. Created fresh each cycle, never mutated, consumed by
/// the reconciler and formatter. Not persisted as its own record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceChangeEvent {
    pub product_id: String,
    pub competitor_name: String,
    pub kind: ChangeKind,
    pub old_price: Option<Decimal>,
    pub new_price: Option<Decimal>,
    /// Signed percent delta `(new - old) / old * 100`; none when `old_price`
    /// is absent or zero. Positive means the price rose.
    pub percent_change: Option<Decimal>,
    pub old_stock: Option<StockStatus>,
    pub new_stock: Option<StockStatus>,
    pub currency: String,
    /// Error classification for `kind == Error`, human-readable.
    pub error: Option<String>,
}

impl PriceChangeEvent {
    /// Event for a product that has never been seen before.
    pub fn new_product(observation: &Observation) -> Self {
        Self {
            product_id: observation.product_id.clone(),
            competitor_name: observation.competitor_name.clone(),
            kind: ChangeKind::NewProduct,
            old_price: None,
            new_price: observation.price,
            percent_change: None,
            old_stock: None,
            new_stock: observation.stock_status,
            currency: observation.currency.clone(),
            error: None,
        }
    }

    /// Error event for a failed scrape or unparseable price. Carries only the
    /// identity fields and the error classification.
    pub fn error(observation: &Observation, reason: impl Into<String>) -> Self {
        Self {
            product_id: observation.product_id.clone(),
            competitor_name: observation.competitor_name.clone(),
            kind: ChangeKind::Error,
            old_price: None,
            new_price: None,
            percent_change: None,
            old_stock: None,
            new_stock: None,
            currency: observation.currency.clone(),
            error: Some(reason.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.kind == ChangeKind::Error
    }
}

/// The ordered set of change events selected for notification in one cycle.
/// Insertion order equals scrape order; the batch is never re-sorted, so
/// output is reproducible for a given input batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertBatch {
    events: Vec<PriceChangeEvent>,
}

impl AlertBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: PriceChangeEvent) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[PriceChangeEvent] {
        &self.events
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PriceChangeEvent> {
        self.events.iter()
    }
}

impl IntoIterator for AlertBatch {
    type Item = PriceChangeEvent;
    type IntoIter = std::vec::IntoIter<PriceChangeEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.into_iter()
    }
}

impl<'a> IntoIterator for &'a AlertBatch {
    type Item = &'a PriceChangeEvent;
    type IntoIter = std::slice::Iter<'a, PriceChangeEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}
