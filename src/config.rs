use config::{Config, ConfigError, Environment, File, FileFormat};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub scraper: ScraperConfig,
    pub schedule: ScheduleConfig,
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub alerts: AlertPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    pub max_concurrent_checks: usize,
    pub request_timeout: u64,
    pub request_delay_ms: u64,
    pub user_agent: String,
    pub chrome_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Hours between scrape cycles in daemon mode.
    pub interval_hours: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
}

/// Notification policy applied by the reconciler and formatter. Thresholds
/// gate what is surfaced as an alert, never what is recorded to history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertPolicy {
    /// Minimum percent magnitude (strictly greater than) for a price change
    /// to be notified. Zero means any nonzero change alerts.
    #[serde(default = "AlertPolicy::default_threshold")]
    pub price_change_threshold_percent: Decimal,
    #[serde(default = "AlertPolicy::default_true")]
    pub notify_on_new_product: bool,
    #[serde(default = "AlertPolicy::default_true")]
    pub notify_on_stock_change: bool,
    #[serde(default = "AlertPolicy::default_true")]
    pub batch_alerts: bool,
}

impl AlertPolicy {
    fn default_threshold() -> Decimal {
        Decimal::ZERO
    }

    fn default_true() -> bool {
        true
    }
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self {
            price_change_threshold_percent: Decimal::ZERO,
            notify_on_new_product: true,
            notify_on_stock_change: true,
            batch_alerts: true,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start with default configuration
            .add_source(File::with_name("config/default"))
            // Add environment-specific config
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add local config (ignored by git)
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables with prefix "PRICEWATCH_"
            .add_source(Environment::with_prefix("PRICEWATCH").separator("__"))
            .build()?;

        let mut config: AppConfig = s.try_deserialize()?;

        // Add Chrome path from environment if not set
        if config.scraper.chrome_path.is_none() {
            config.scraper.chrome_path = env::var("CHROME_PATH").ok();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.is_empty() {
            return Err(ConfigError::Message("Database URL must not be empty".into()));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Message(
                "Database max_connections must be greater than 0".into(),
            ));
        }

        if self.scraper.max_concurrent_checks == 0 {
            return Err(ConfigError::Message(
                "Scraper max_concurrent_checks must be greater than 0".into(),
            ));
        }

        if self.scraper.request_timeout == 0 {
            return Err(ConfigError::Message(
                "Scraper request_timeout must be greater than 0".into(),
            ));
        }

        if self.schedule.interval_hours <= 0.0 {
            return Err(ConfigError::Message(
                "Schedule interval_hours must be greater than 0".into(),
            ));
        }

        if self.alerts.price_change_threshold_percent < Decimal::ZERO {
            return Err(ConfigError::Message(
                "Alert price_change_threshold_percent must not be negative".into(),
            ));
        }

        Ok(())
    }
}

/// Competitor and product definitions loaded from `config/competitors.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompetitorsConfig {
    #[serde(default)]
    pub competitors: Vec<CompetitorConfig>,
    /// Optional per-file override of the alert policy.
    pub alerts: Option<AlertPolicy>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompetitorConfig {
    pub name: String,
    pub base_url: String,
    #[serde(default = "CompetitorConfig::default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub products: Vec<ProductConfig>,
}

impl CompetitorConfig {
    fn default_enabled() -> bool {
        true
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductConfig {
    pub id: String,
    /// Path appended to the competitor's base_url.
    pub url: String,
    pub selectors: SelectorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorConfig {
    pub price: String,
    pub name: Option<String>,
    pub stock: Option<String>,
}

impl CompetitorsConfig {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::new(path, FileFormat::Yaml))
            .build()?;

        let config: CompetitorsConfig = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for competitor in &self.competitors {
            if competitor.name.is_empty() {
                return Err(ConfigError::Message(
                    "Competitor name must not be empty".into(),
                ));
            }

            if Url::parse(&competitor.base_url).is_err() {
                return Err(ConfigError::Message(format!(
                    "Invalid base_url for competitor '{}': {}",
                    competitor.name, competitor.base_url
                )));
            }

            // product_id must be unique within a competitor; it is the join
            // key for history lookups across cycles
            let mut seen = HashSet::new();
            for product in &competitor.products {
                if product.id.is_empty() {
                    return Err(ConfigError::Message(format!(
                        "Empty product id under competitor '{}'",
                        competitor.name
                    )));
                }
                if !seen.insert(product.id.as_str()) {
                    return Err(ConfigError::Message(format!(
                        "Duplicate product id '{}' under competitor '{}'",
                        product.id, competitor.name
                    )));
                }
                if product.selectors.price.is_empty() {
                    return Err(ConfigError::Message(format!(
                        "Missing price selector for product '{}'",
                        product.id
                    )));
                }
            }
        }

        if let Some(alerts) = &self.alerts {
            if alerts.price_change_threshold_percent < Decimal::ZERO {
                return Err(ConfigError::Message(
                    "Alert price_change_threshold_percent must not be negative".into(),
                ));
            }
        }

        Ok(())
    }

    /// Enabled competitors only, in file order.
    pub fn enabled_competitors(&self) -> impl Iterator<Item = &CompetitorConfig> {
        self.competitors.iter().filter(|c| c.enabled)
    }

    /// The policy for this run: the YAML `alerts` block when present,
    /// otherwise the application-level policy.
    pub fn effective_policy(&self, app_policy: &AlertPolicy) -> AlertPolicy {
        self.alerts.clone().unwrap_or_else(|| app_policy.clone())
    }
}
