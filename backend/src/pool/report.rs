use std::fmt;
use std::sync::Arc;

use exchange::ExchangeError;
use thiserror::Error;

use super::trade_pool::PoolSnapshot;

#[derive(Error, Debug)]
pub enum KeeperError {
    #[error("bootstrap fetch failed: {0}")]
    Bootstrap(#[source] ExchangeError),

    #[error("exchange returned no trades to bootstrap from")]
    EmptyBootstrap,

    #[error("back-fill fetch failed: {0}")]
    Backfill(#[source] ExchangeError),

    #[error("forward-fill fetch failed: {0}")]
    ForwardFill(#[source] ExchangeError),
}

impl KeeperError {
    pub fn exchange_error(&self) -> Option<&ExchangeError> {
        match self {
            KeeperError::Bootstrap(e) | KeeperError::Backfill(e) | KeeperError::ForwardFill(e) => {
                Some(e)
            }
            KeeperError::EmptyBootstrap => None,
        }
    }

    pub fn is_rate_limit(&self) -> bool {
        self.exchange_error().is_some_and(ExchangeError::is_rate_limit)
    }
}

/// Lifecycle of one keeper.
///
/// `Starting → Bootstrapped → Filling → Ready → Terminated`
///
/// Readiness of the data itself is `FullnessReport::ready`, which may flap;
/// the phase only moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeeperPhase {
    Starting,
    Bootstrapped,
    /// Back-fill still allowed.
    Filling,
    /// Back-fill off for good (first eviction or history exhausted).
    Ready,
    Terminated,
}

impl fmt::Display for KeeperPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            KeeperPhase::Starting => "starting",
            KeeperPhase::Bootstrapped => "bootstrapped",
            KeeperPhase::Filling => "filling",
            KeeperPhase::Ready => "ready",
            KeeperPhase::Terminated => "terminated",
        };
        f.write_str(s)
    }
}

/// Published by a keeper once per cycle.
#[derive(Debug, Clone)]
pub struct FullnessReport {
    pub symbol: String,

    /// round(100 · captured_period_ms / window_ms)
    pub fullness_percent: i64,

    pub last_trade_time_ms: i64,

    /// last.time_ms − first.time_ms
    pub captured_period_ms: i64,

    /// fullness_percent > 99
    pub ready: bool,

    /// Pool as it stood when the report was built. `None` on error reports.
    pub pool: Option<PoolSnapshot>,

    pub error: Option<Arc<KeeperError>>,
}

impl FullnessReport {
    pub fn failed(symbol: impl Into<String>, error: KeeperError) -> Self {
        Self {
            symbol: symbol.into(),
            fullness_percent: 0,
            last_trade_time_ms: 0,
            captured_period_ms: 0,
            ready: false,
            pool: None,
            error: Some(Arc::new(error)),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Time of the oldest trade the report covers.
    pub fn oldest_trade_time_ms(&self) -> i64 {
        self.last_trade_time_ms - self.captured_period_ms
    }
}

pub(crate) fn fullness_percent(captured_period_ms: i64, window_ms: i64) -> i64 {
    (100.0 * captured_period_ms as f64 / window_ms as f64).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fullness_rounds_half_away_from_zero() {
        assert_eq!(fullness_percent(5_000, 60_000), 8);
        assert_eq!(fullness_percent(60_000, 60_000), 100);
        assert_eq!(fullness_percent(59_700, 60_000), 100);
        assert_eq!(fullness_percent(59_300, 60_000), 99);
        assert_eq!(fullness_percent(300, 60_000), 1); // 0.5 → 1
    }

    #[test]
    fn rate_limit_is_detected_through_keeper_error() {
        let err = KeeperError::ForwardFill(ExchangeError::RateLimited {
            status: 429,
            retry_after_secs: Some(10),
        });
        assert!(err.is_rate_limit());
        assert!(!KeeperError::EmptyBootstrap.is_rate_limit());
    }

    #[test]
    fn failed_report_carries_no_pool() {
        let r = FullnessReport::failed("ETHUSDT", KeeperError::EmptyBootstrap);
        assert!(r.is_error());
        assert!(r.pool.is_none());
        assert!(!r.ready);
    }
}
