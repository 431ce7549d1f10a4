use async_trait::async_trait;

use crate::utils::error::Result;

pub mod telegram;

pub use telegram::TelegramNotifier;

/// Delivery channel for alert messages. The orchestrator holds this as a
/// trait object so cycles can run against a mock channel in tests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one already-formatted message.
    async fn send(&self, message: &str) -> Result<()>;
}
