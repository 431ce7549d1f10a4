use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod change_event;
pub mod observation;

// Re-exports for convenience
pub use change_event::*;
pub use observation::*;

// Common enums used across models

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "TEXT")]
pub enum StockStatus {
    #[sqlx(rename = "in_stock")]
    InStock,
    #[sqlx(rename = "out_of_stock")]
    OutOfStock,
    #[sqlx(rename = "unknown")]
    Unknown,
}

impl StockStatus {
    /// Map raw stock-status text extracted from a page onto the enum.
    pub fn from_text(text: &str) -> Self {
        let lower = text.trim().to_lowercase();
        if lower.is_empty() {
            return StockStatus::Unknown;
        }
        if lower.contains("out of stock")
            || lower.contains("sold out")
            || lower.contains("unavailable")
        {
            StockStatus::OutOfStock
        } else if lower.contains("in stock") || lower.contains("available") {
            StockStatus::InStock
        } else {
            StockStatus::Unknown
        }
    }
}

/// Classification of a scrape that failed outright, as reported by the fetch
/// collaborator. Distinct from a parse failure, which keeps `price_raw` and
/// sets `price` to none.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FetchErrorKind {
    Timeout,
    Unreachable,
    SelectorMissing,
    Other(String),
}

impl std::fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchErrorKind::Timeout => write!(f, "timeout"),
            FetchErrorKind::Unreachable => write!(f, "unreachable"),
            FetchErrorKind::SelectorMissing => write!(f, "selector missing"),
            FetchErrorKind::Other(reason) => write!(f, "{}", reason),
        }
    }
}

// Helper function to generate UUIDs in the format expected by the database
pub fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()
}
