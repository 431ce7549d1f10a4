use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use pricewatch::config::{AppConfig, CompetitorsConfig};
use pricewatch::cycle;
use pricewatch::notifier::{Notifier, TelegramNotifier};
use pricewatch::scheduler;
use pricewatch::scraper::WebScraper;
use pricewatch::storage::{HistoryStore, SqliteHistoryStore};

#[derive(Parser)]
#[command(name = "pricewatch", version, about = "Competitor price monitoring and alerting")]
struct Cli {
    /// Path to the competitors configuration file
    #[arg(long, default_value = "config/competitors.yaml")]
    competitors: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape all competitors, detect changes, and send alerts
    Run {
        /// Run a single cycle and exit instead of looping
        #[arg(long)]
        once: bool,
        /// Override the configured interval between cycles, in hours
        #[arg(long)]
        interval: Option<f64>,
    },
    /// Show stored price history for a product
    History {
        #[arg(long)]
        product: String,
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
    /// Create the database schema and exit
    InitDb,
    /// Send a test message through the configured notifier
    TestNotify {
        /// Message text, defaults to a connectivity check
        message: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("pricewatch=debug".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env().context("failed to load configuration")?;

    match cli.command {
        Commands::Run { once, interval } => {
            run(&config, &cli.competitors, once, interval).await
        }
        Commands::History { product, limit } => history(&config, &product, limit).await,
        Commands::InitDb => init_db(&config).await,
        Commands::TestNotify { message } => test_notify(&config, message.as_deref()).await,
    }
}

async fn run(
    config: &AppConfig,
    competitors_path: &str,
    once: bool,
    interval: Option<f64>,
) -> Result<()> {
    let competitors = CompetitorsConfig::load(competitors_path)
        .with_context(|| format!("failed to load competitors from {}", competitors_path))?;
    let policy = competitors.effective_policy(&config.alerts);

    let store = SqliteHistoryStore::connect(&config.database).await?;
    let scraper = WebScraper::new(config.scraper.clone())?;
    let notifier = TelegramNotifier::new(&config.telegram)?;

    if once {
        let summary = cycle::run_cycle(
            &scraper,
            &store,
            &notifier,
            &competitors.competitors,
            &policy,
        )
        .await?;
        println!(
            "checked {} products: {} stored, {} changes, {} alerts sent, {} fetch errors",
            summary.total_products,
            summary.observations_stored,
            summary.changes_detected,
            summary.alerts_sent,
            summary.fetch_errors
        );
        Ok(())
    } else {
        let mut schedule = config.schedule.clone();
        if let Some(hours) = interval {
            anyhow::ensure!(hours > 0.0, "interval must be greater than zero");
            schedule.interval_hours = hours;
        }
        scheduler::run_daemon(
            &scraper,
            &store,
            &notifier,
            &competitors.competitors,
            &policy,
            &schedule,
        )
        .await?;
        Ok(())
    }
}

async fn history(config: &AppConfig, product: &str, limit: i64) -> Result<()> {
    let store = SqliteHistoryStore::connect(&config.database).await?;
    let observations = store.history(product, limit).await?;

    if observations.is_empty() {
        println!("no history for product '{}'", product);
        return Ok(());
    }

    for obs in observations {
        let price = obs
            .price
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string());
        let stock = obs
            .stock_status
            .map(|s| format!("{:?}", s))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{}  {:<20} {:>12} {}  {}",
            obs.scraped_at.format("%Y-%m-%d %H:%M:%S"),
            obs.competitor_name,
            price,
            obs.currency,
            stock
        );
    }
    Ok(())
}

async fn init_db(config: &AppConfig) -> Result<()> {
    SqliteHistoryStore::connect(&config.database).await?;
    info!(url = %config.database.url, "database initialized");
    println!("database schema ready at {}", config.database.url);
    Ok(())
}

async fn test_notify(config: &AppConfig, message: Option<&str>) -> Result<()> {
    let notifier = TelegramNotifier::new(&config.telegram)?;

    match message {
        Some(text) => {
            notifier.send(text).await?;
            println!("message delivered");
        }
        None => {
            let status = notifier.test_connection().await?;
            println!("{}", status);
        }
    }
    Ok(())
}
