pub mod client;
pub mod errors;
pub mod types;

use async_trait::async_trait;
use corelib::AggTrade;

pub use client::BinanceClient;
pub use errors::ExchangeError;
pub use types::*;

/// Bulk read of aggregated trades for one symbol.
///
/// Implementations must report an exchange rate-limit response as
/// `ExchangeError::RateLimited` rather than as an empty result.
#[async_trait]
pub trait AggTradesApi: Send + Sync + 'static {
    async fn agg_trades(
        &self,
        symbol: &str,
        query: AggTradesQuery,
    ) -> Result<Vec<AggTrade>, ExchangeError>;
}
