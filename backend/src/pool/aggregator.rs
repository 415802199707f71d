use clap::ValueEnum;
use tokio::sync::mpsc::Receiver;
use tracing::{error, info, instrument, warn};

use super::report::FullnessReport;
use super::state::PoolStateStore;
use crate::error::AppError;

/// What the aggregator does with a keeper's error report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ErrorPolicy {
    /// Stop the whole process on the first keeper error.
    Halt,
    /// Record the error under its symbol and keep the other keepers running.
    Isolate,
}

/// Single consumer of the report channel and sole writer of pool state.
pub struct Aggregator {
    store: PoolStateStore,
    policy: ErrorPolicy,
}

impl Aggregator {
    pub fn new(store: PoolStateStore, policy: ErrorPolicy) -> Self {
        Self { store, policy }
    }

    /// Consume reports until every keeper has dropped its sender, or until an
    /// error report arrives under `ErrorPolicy::Halt`.
    #[instrument(name = "aggregator", skip_all, fields(policy = ?self.policy))]
    pub async fn run(mut self, mut reports: Receiver<FullnessReport>) -> Result<(), AppError> {
        info!("aggregator started");

        while let Some(report) = reports.recv().await {
            if let Some(err) = &report.error {
                match self.policy {
                    ErrorPolicy::Halt => {
                        error!(symbol = %report.symbol, error = %err, "keeper failed, halting");
                        return Err(AppError::KeeperFailed {
                            symbol: report.symbol,
                            reason: err.to_string(),
                        });
                    }
                    ErrorPolicy::Isolate => {
                        warn!(symbol = %report.symbol, error = %err, "keeper failed, symbol isolated");
                    }
                }
            }

            self.store.set(report).await;
        }

        info!("all window keepers stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::REPORT_CHANNEL_CAPACITY;
    use crate::pool::report::KeeperError;
    use exchange::ExchangeError;
    use tokio::sync::mpsc;
    use tracing_test::traced_test;

    fn ok_report(symbol: &str, fullness: i64) -> FullnessReport {
        FullnessReport {
            symbol: symbol.to_string(),
            fullness_percent: fullness,
            last_trade_time_ms: 2_000,
            captured_period_ms: 1_000,
            ready: fullness > 99,
            pool: None,
            error: None,
        }
    }

    fn rate_limited(symbol: &str) -> FullnessReport {
        FullnessReport::failed(
            symbol,
            KeeperError::ForwardFill(ExchangeError::RateLimited {
                status: 429,
                retry_after_secs: None,
            }),
        )
    }

    #[tokio::test]
    async fn halt_policy_stops_on_first_error() {
        let store = PoolStateStore::new();
        let view = store.view();
        let (tx, rx) = mpsc::channel(REPORT_CHANNEL_CAPACITY);
        let task = tokio::spawn(Aggregator::new(store, ErrorPolicy::Halt).run(rx));

        tx.send(ok_report("ETHUSDT", 40)).await.unwrap();
        tx.send(rate_limited("ADAUSDT")).await.unwrap();

        let res = task.await.unwrap();
        match res {
            Err(AppError::KeeperFailed { symbol, reason }) => {
                assert_eq!(symbol, "ADAUSDT");
                assert!(reason.contains("rate limited"));
            }
            other => panic!("expected KeeperFailed, got {other:?}"),
        }

        assert!(view.get("ETHUSDT").await.is_some());
        assert!(view.get("ADAUSDT").await.is_none());
    }

    #[tokio::test]
    #[traced_test]
    async fn isolate_policy_records_error_and_continues() {
        let store = PoolStateStore::new();
        let view = store.view();
        let (tx, rx) = mpsc::channel(REPORT_CHANNEL_CAPACITY);
        let task = tokio::spawn(Aggregator::new(store, ErrorPolicy::Isolate).run(rx));

        tx.send(rate_limited("ADAUSDT")).await.unwrap();
        tx.send(ok_report("ETHUSDT", 100)).await.unwrap();
        drop(tx);

        task.await.unwrap().unwrap();

        assert!(view.get("ADAUSDT").await.unwrap().is_error());
        assert!(view.get("ETHUSDT").await.unwrap().ready);
        assert!(logs_contain("symbol isolated"));
    }
}
