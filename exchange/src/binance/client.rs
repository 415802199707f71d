use std::time::Duration;

use async_trait::async_trait;
use corelib::AggTrade;
use reqwest::header::HeaderMap;
use reqwest::{Client, StatusCode};
use tracing::{debug, instrument, warn};
use url::Url;

use crate::binance::AggTradesApi;
use crate::binance::errors::ExchangeError;
use crate::binance::types::{AGG_TRADES_WEIGHT, AggTradesQuery};
use crate::weight::WeightController;

pub const DEFAULT_BASE_URL: &str = "https://api.binance.com";

const AGG_TRADES_PATH: &str = "/api/v3/aggTrades";
const API_KEY_HEADER: &str = "X-MBX-APIKEY";
const USED_WEIGHT_HEADER: &str = "x-mbx-used-weight-1m";

/// Public-market REST client. Every call is paced through the shared
/// `WeightController`.
#[derive(Clone)]
pub struct BinanceClient {
    http: Client,
    base_url: Url,
    api_key: Option<String>,
    weights: WeightController,
}

impl BinanceClient {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        weights: WeightController,
    ) -> Result<Self, ExchangeError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            base_url: Url::parse(base_url)?,
            api_key: api_key.filter(|k| !k.is_empty()),
            weights,
        })
    }
}

#[async_trait]
impl AggTradesApi for BinanceClient {
    #[instrument(
        skip(self),
        fields(symbol = %symbol, from_id = ?query.from_id),
        level = "debug"
    )]
    async fn agg_trades(
        &self,
        symbol: &str,
        query: AggTradesQuery,
    ) -> Result<Vec<AggTrade>, ExchangeError> {
        self.weights.acquire(AGG_TRADES_WEIGHT).await;

        let url = self.base_url.join(AGG_TRADES_PATH)?;
        let mut req = self
            .http
            .get(url)
            .query(&[("symbol", symbol)])
            .query(&query.params());

        if let Some(key) = &self.api_key {
            req = req.header(API_KEY_HEADER, key);
        }

        let resp = req.send().await?;

        if let Some(used) = used_weight(resp.headers()) {
            self.weights.observe_used(used);
        }

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::IM_A_TEAPOT {
            let retry_after_secs = retry_after(resp.headers());
            warn!(status = status.as_u16(), ?retry_after_secs, "exchange rate limit hit");
            return Err(ExchangeError::RateLimited {
                status: status.as_u16(),
                retry_after_secs,
            });
        }

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ExchangeError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = resp.bytes().await?;
        let trades: Vec<AggTrade> = serde_json::from_slice(&bytes)?;

        debug!(count = trades.len(), "agg trades fetched");

        Ok(trades)
    }
}

fn used_weight(headers: &HeaderMap) -> Option<u32> {
    headers
        .get(USED_WEIGHT_HEADER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

fn retry_after(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}
