use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info};

use crate::config::{AlertPolicy, CompetitorConfig, ScheduleConfig};
use crate::cycle::{self, CycleSummary};
use crate::notifier::Notifier;
use crate::scraper::ProductFetcher;
use crate::storage::HistoryStore;
use crate::utils::error::Result;

pub fn cycle_interval(config: &ScheduleConfig) -> Duration {
    Duration::from_secs_f64(config.interval_hours * 3600.0)
}

/// Run cycles forever at the configured interval, starting with one
/// immediately. Cycles never overlap: a slow cycle delays the next tick
/// rather than running concurrently. A failed cycle is logged and the
/// daemon keeps going; ctrl-c shuts it down between cycles.
pub async fn run_daemon(
    fetcher: &dyn ProductFetcher,
    store: &dyn HistoryStore,
    notifier: &dyn Notifier,
    competitors: &[CompetitorConfig],
    policy: &AlertPolicy,
    schedule: &ScheduleConfig,
) -> Result<()> {
    let period = cycle_interval(schedule);
    info!(
        interval_hours = schedule.interval_hours,
        "starting daemon"
    );

    let mut ticker = interval_at(Instant::now(), period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match cycle::run_cycle(fetcher, store, notifier, competitors, policy).await {
                    Ok(CycleSummary { transport_errors, .. }) if transport_errors > 0 => {
                        error!(transport_errors, "cycle finished with undelivered alerts");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!(error = %e, "cycle failed");
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received, stopping daemon");
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_interval_from_hours() {
        let config = ScheduleConfig { interval_hours: 6.0 };
        assert_eq!(cycle_interval(&config), Duration::from_secs(6 * 3600));
    }

    #[test]
    fn test_cycle_interval_fractional_hours() {
        let config = ScheduleConfig {
            interval_hours: 0.5,
        };
        assert_eq!(cycle_interval(&config), Duration::from_secs(1800));
    }
}
