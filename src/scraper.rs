use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use scraper::{Html, Selector};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::{CompetitorConfig, ProductConfig, ScraperConfig};
use crate::models::{FetchErrorKind, NewObservation, Observation, StockStatus};
use crate::price_parser::PriceParser;
use crate::utils::error::{AppError, Result};

/// Produces observations for configured products. The orchestrator depends
/// on this trait so cycles can run against scripted observations in tests.
#[async_trait]
pub trait ProductFetcher: Send + Sync {
    /// Scrape every enabled competitor's products, in configuration order.
    /// Individual failures become fetch-error observations; the vector
    /// always has one entry per configured product.
    async fn fetch_all(&self, competitors: &[CompetitorConfig]) -> Vec<Observation>;
}

pub struct BrowserPool {
    browsers: Vec<Arc<Browser>>,
    current_index: std::sync::atomic::AtomicUsize,
}

impl BrowserPool {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let mut browsers = Vec::new();

        // Limit to max 3 for resource management
        for _ in 0..config.max_concurrent_checks.min(3) {
            let mut launch_options = LaunchOptions::default_builder()
                .headless(true)
                .sandbox(false) // Often needed in containerized environments
                .args(vec![
                    std::ffi::OsStr::new("--no-sandbox"),
                    std::ffi::OsStr::new("--disable-dev-shm-usage"),
                    std::ffi::OsStr::new("--disable-gpu"),
                    std::ffi::OsStr::new("--disable-extensions"),
                    std::ffi::OsStr::new("--disable-background-timer-throttling"),
                ])
                .build()
                .map_err(|e| AppError::Scraping(format!("failed to build launch options: {}", e)))?;

            if let Some(chrome_path) = &config.chrome_path {
                launch_options.path = Some(std::path::PathBuf::from(chrome_path));
            }

            let browser = Browser::new(launch_options)
                .map_err(|e| AppError::Scraping(format!("failed to launch browser: {}", e)))?;

            browsers.push(Arc::new(browser));
        }

        Ok(Self {
            browsers,
            current_index: std::sync::atomic::AtomicUsize::new(0),
        })
    }

    pub fn get_browser(&self) -> Arc<Browser> {
        let index = self
            .current_index
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed)
            % self.browsers.len();
        self.browsers[index].clone()
    }
}

/// Headless-Chrome scraper that extracts price, name, and stock text from
/// competitor product pages.
pub struct WebScraper {
    browser_pool: Arc<BrowserPool>,
    parser: PriceParser,
    config: ScraperConfig,
}

struct ExtractedFields {
    price_raw: Option<String>,
    name: Option<String>,
    stock_raw: Option<String>,
}

impl WebScraper {
    pub fn new(config: ScraperConfig) -> Result<Self> {
        let browser_pool = Arc::new(BrowserPool::new(&config)?);
        Ok(Self {
            browser_pool,
            parser: PriceParser::new(),
            config,
        })
    }

    /// Scrape one product page and build the observation. Fetch failures
    /// (navigation, timeout, missing price selector) come back as Ok with a
    /// fetch-error observation so the pipeline can surface them as alerts.
    pub fn scrape_product(
        &self,
        competitor: &CompetitorConfig,
        product: &ProductConfig,
    ) -> Observation {
        let url = match resolve_url(&competitor.base_url, &product.url) {
            Ok(url) => url,
            Err(e) => {
                warn!(
                    product_id = %product.id,
                    competitor = %competitor.name,
                    error = %e,
                    "invalid product url"
                );
                return Observation::fetch_failed(
                    &product.id,
                    &competitor.name,
                    FetchErrorKind::Other(format!("invalid url: {}", e)),
                );
            }
        };

        match self.fetch_page(&url, product) {
            Ok(fields) => self.build_observation(competitor, product, &url, fields),
            Err(kind) => {
                warn!(
                    product_id = %product.id,
                    competitor = %competitor.name,
                    url = %url,
                    error = %kind,
                    "scrape failed"
                );
                Observation::fetch_failed(&product.id, &competitor.name, kind)
            }
        }
    }

    fn fetch_page(
        &self,
        url: &str,
        product: &ProductConfig,
    ) -> std::result::Result<ExtractedFields, FetchErrorKind> {
        let browser = self.browser_pool.get_browser();
        let tab = browser
            .new_tab()
            .map_err(|e| FetchErrorKind::Other(format!("failed to create tab: {}", e)))?;

        let result = self.fetch_page_with_tab(&tab, url, product);
        let _ = tab.close(true);
        result
    }

    fn fetch_page_with_tab(
        &self,
        tab: &Tab,
        url: &str,
        product: &ProductConfig,
    ) -> std::result::Result<ExtractedFields, FetchErrorKind> {
        tab.set_user_agent(&self.config.user_agent, None, None)
            .map_err(|e| FetchErrorKind::Other(format!("failed to set user agent: {}", e)))?;
        tab.set_default_timeout(Duration::from_secs(self.config.request_timeout));

        tab.navigate_to(url)
            .map_err(|_| FetchErrorKind::Unreachable)?;
        tab.wait_until_navigated()
            .map_err(|_| FetchErrorKind::Timeout)?;

        // Make sure the price element rendered before grabbing the DOM
        if tab
            .wait_for_element_with_custom_timeout(
                &product.selectors.price,
                Duration::from_secs(self.config.request_timeout),
            )
            .is_err()
        {
            return Err(FetchErrorKind::SelectorMissing);
        }

        let html = tab
            .get_content()
            .map_err(|e| FetchErrorKind::Other(format!("failed to get page content: {}", e)))?;

        Ok(extract_fields(&html, product))
    }

    fn build_observation(
        &self,
        competitor: &CompetitorConfig,
        product: &ProductConfig,
        url: &str,
        fields: ExtractedFields,
    ) -> Observation {
        let price = fields
            .price_raw
            .as_deref()
            .and_then(|raw| self.parser.parse(raw));
        let currency = fields
            .price_raw
            .as_deref()
            .map(|raw| self.parser.currency(raw, "USD"));
        let stock_status = fields
            .stock_raw
            .as_deref()
            .map(StockStatus::from_text);

        debug!(
            product_id = %product.id,
            competitor = %competitor.name,
            price = ?price,
            stock = ?stock_status,
            "product scraped"
        );

        Observation::new(NewObservation {
            product_id: product.id.clone(),
            competitor_name: competitor.name.clone(),
            name: fields.name,
            price,
            price_raw: fields.price_raw,
            currency,
            stock_status,
            url: Some(url.to_string()),
        })
    }
}

#[async_trait]
impl ProductFetcher for WebScraper {
    async fn fetch_all(&self, competitors: &[CompetitorConfig]) -> Vec<Observation> {
        let delay = Duration::from_millis(self.config.request_delay_ms);
        let mut observations = Vec::new();

        for competitor in competitors.iter().filter(|c| c.enabled) {
            info!(
                competitor = %competitor.name,
                products = competitor.products.len(),
                "scraping competitor"
            );
            for product in &competitor.products {
                if !observations.is_empty() && !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                observations.push(self.scrape_product(competitor, product));
            }
        }

        observations
    }
}

fn resolve_url(base_url: &str, product_url: &str) -> Result<String> {
    if product_url.starts_with("http://") || product_url.starts_with("https://") {
        return Ok(Url::parse(product_url)
            .map_err(|e| AppError::Validation(format!("invalid url '{}': {}", product_url, e)))?
            .to_string());
    }
    let base = Url::parse(base_url)
        .map_err(|e| AppError::Validation(format!("invalid base url '{}': {}", base_url, e)))?;
    let joined = base
        .join(product_url)
        .map_err(|e| AppError::Validation(format!("invalid product path '{}': {}", product_url, e)))?;
    Ok(joined.to_string())
}

fn extract_fields(html: &str, product: &ProductConfig) -> ExtractedFields {
    let document = Html::parse_document(html);

    ExtractedFields {
        price_raw: select_text(&document, &product.selectors.price),
        name: product
            .selectors
            .name
            .as_deref()
            .and_then(|s| select_text(&document, s)),
        stock_raw: product
            .selectors
            .stock
            .as_deref()
            .and_then(|s| select_text(&document, s)),
    }
}

fn select_text(document: &Html, selector: &str) -> Option<String> {
    let css_selector = Selector::parse(selector).ok()?;
    let element = document.select(&css_selector).next()?;
    let text = element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}
