pub mod config;
pub mod cycle;
pub mod detector;
pub mod formatter;
pub mod models;
pub mod notifier;
pub mod price_parser;
pub mod reconciler;
pub mod scheduler;
pub mod scraper;
pub mod storage;
pub mod utils;

// Re-export commonly used types
pub use config::AppConfig;
pub use utils::error::AppError;

pub type Result<T> = std::result::Result<T, AppError>;
