use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, SqlitePool};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::models::{Observation, StockStatus};
use crate::utils::error::{AppError, Result};

/// Persistence boundary for observation history.
///
/// An explicit handle, passed into the orchestrator; never a process-wide
/// singleton. The store is the one shared mutable resource in the system and
/// assumes a single cycle writes at a time.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Most recent prior observation for a product at a competitor, or none
    /// if the product has never been seen.
    async fn get_last(
        &self,
        product_id: &str,
        competitor_name: &str,
    ) -> Result<Option<Observation>>;

    /// Append one observation to history. Rejects observations without a
    /// parsed price: fetch errors and parse failures are skips, preserving
    /// the last known good observation for the next cycle's comparison.
    async fn append(&self, observation: &Observation) -> Result<()>;

    /// Price history for a product, newest first.
    async fn history(&self, product_id: &str, limit: i64) -> Result<Vec<Observation>>;
}

#[derive(Debug, Clone, FromRow)]
struct ObservationRow {
    id: String,
    product_id: String,
    competitor_name: String,
    product_name: Option<String>,
    price: String,
    price_raw: Option<String>,
    currency: String,
    stock_status: Option<StockStatus>,
    url: Option<String>,
    scraped_at: DateTime<Utc>,
}

impl From<ObservationRow> for Observation {
    fn from(row: ObservationRow) -> Self {
        Observation {
            id: row.id,
            product_id: row.product_id,
            competitor_name: row.competitor_name,
            name: row.product_name,
            price: Decimal::from_str(&row.price).ok(),
            price_raw: row.price_raw,
            currency: row.currency,
            stock_status: row.stock_status,
            url: row.url,
            scraped_at: row.scraped_at,
            fetch_error: None,
        }
    }
}

#[derive(Clone)]
pub struct SqliteHistoryStore {
    pool: SqlitePool,
}

impl SqliteHistoryStore {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&config.url)
            .map_err(AppError::Database)?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout))
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.init().await?;
        Ok(store)
    }

    /// Store over an existing pool, used by tests with `sqlite::memory:`.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        let store = Self { pool };
        store.init().await?;
        Ok(store)
    }

    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS observations (
                id TEXT PRIMARY KEY,
                product_id TEXT NOT NULL,
                competitor_name TEXT NOT NULL,
                product_name TEXT,
                price TEXT NOT NULL,
                price_raw TEXT,
                currency TEXT NOT NULL DEFAULT 'USD',
                stock_status TEXT,
                url TEXT,
                scraped_at TIMESTAMP NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_observations_product
             ON observations(product_id, competitor_name)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_observations_scraped_at
             ON observations(scraped_at)",
        )
        .execute(&self.pool)
        .await?;

        info!("observation history schema ready");
        Ok(())
    }
}

#[async_trait]
impl HistoryStore for SqliteHistoryStore {
    async fn get_last(
        &self,
        product_id: &str,
        competitor_name: &str,
    ) -> Result<Option<Observation>> {
        let row = sqlx::query_as::<_, ObservationRow>(
            r#"
            SELECT id, product_id, competitor_name, product_name, price,
                   price_raw, currency, stock_status, url, scraped_at
            FROM observations
            WHERE product_id = ? AND competitor_name = ?
            ORDER BY scraped_at DESC, rowid DESC
            LIMIT 1
            "#,
        )
        .bind(product_id)
        .bind(competitor_name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Observation::from))
    }

    async fn append(&self, observation: &Observation) -> Result<()> {
        if observation.is_fetch_error() {
            return Err(AppError::Validation(format!(
                "refusing to persist fetch-error observation for '{}'",
                observation.product_id
            )));
        }
        let Some(price) = observation.price else {
            return Err(AppError::Validation(format!(
                "refusing to persist observation without a parsed price for '{}'",
                observation.product_id
            )));
        };

        sqlx::query(
            r#"
            INSERT INTO observations
                (id, product_id, competitor_name, product_name, price,
                 price_raw, currency, stock_status, url, scraped_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&observation.id)
        .bind(&observation.product_id)
        .bind(&observation.competitor_name)
        .bind(&observation.name)
        .bind(price.to_string())
        .bind(&observation.price_raw)
        .bind(&observation.currency)
        .bind(observation.stock_status)
        .bind(&observation.url)
        .bind(observation.scraped_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn history(&self, product_id: &str, limit: i64) -> Result<Vec<Observation>> {
        let rows = sqlx::query_as::<_, ObservationRow>(
            r#"
            SELECT id, product_id, competitor_name, product_name, price,
                   price_raw, currency, stock_status, url, scraped_at
            FROM observations
            WHERE product_id = ?
            ORDER BY scraped_at DESC, rowid DESC
            LIMIT ?
            "#,
        )
        .bind(product_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Observation::from).collect())
    }
}
