//! Per-symbol window keeper.
//!
//! One long-running task per symbol: bootstrap, then cycle through
//! back-fill, eviction and forward-fill, publishing a `FullnessReport`
//! after every cycle. The task ends on the first exchange error (after
//! publishing it) or when the aggregator goes away.

use std::sync::Arc;
use std::time::Duration;

use common::logger::{keeper_span, warn_if_slow};
use corelib::AggTrade;
use exchange::{AggTradesApi, AggTradesQuery, ExchangeError};
use tokio::sync::mpsc::Sender;
use tracing::{Instrument, Span, debug, error, field, info};

use super::report::{FullnessReport, KeeperError, KeeperPhase};
use super::window::PoolWindow;
use super::BATCH;
use crate::time::Clock;

const SLOW_FETCH: Duration = Duration::from_secs(2);

pub struct WindowKeeper<A, C> {
    symbol: String,
    window_ms: i64,
    api: Arc<A>,
    clock: Arc<C>,
    reports: Sender<FullnessReport>,
}

impl<A: AggTradesApi, C: Clock> WindowKeeper<A, C> {
    pub fn new(
        symbol: impl Into<String>,
        window_ms: i64,
        api: Arc<A>,
        clock: Arc<C>,
        reports: Sender<FullnessReport>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            window_ms,
            api,
            clock,
            reports,
        }
    }

    /// Run until the first error or until the report channel closes.
    pub async fn run(self) {
        let span = keeper_span(&self.symbol, self.window_ms);

        async move {
            match self.keep_window().await {
                Ok(()) => info!("report channel closed, window keeper stopped"),
                Err(err) => {
                    record_phase(KeeperPhase::Terminated);
                    error!(
                        error = %err,
                        rate_limited = err.is_rate_limit(),
                        "window keeper terminated"
                    );
                    // nobody left to tell if this fails
                    let _ = self
                        .reports
                        .send(FullnessReport::failed(&self.symbol, err))
                        .await;
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn keep_window(&self) -> Result<(), KeeperError> {
        record_phase(KeeperPhase::Starting);

        let recent = self
            .fetch(AggTradesQuery::latest(BATCH as u16))
            .await
            .map_err(KeeperError::Bootstrap)?;
        let mut window = PoolWindow::new(self.window_ms, recent)?;

        let mut phase = KeeperPhase::Bootstrapped;
        record_phase(phase);
        info!(trades = window.pool().len(), "pool bootstrapped");

        loop {
            let now = self.clock.now_ms();
            let mut fetched_any = false;

            // P1: older trades, only while the window is still filling
            if let Some(from_id) = window.backfill_from_id(now) {
                let batch = self
                    .fetch(AggTradesQuery::from_id(from_id, BATCH as u16))
                    .await
                    .map_err(KeeperError::Backfill)?;
                fetched_any = true;

                let added = window.apply_backfill(batch);
                debug!(from_id, added, pool = window.pool().len(), "back-fill applied");
                if !window.backfill_enabled() {
                    info!("exchange history exhausted, back-fill disabled");
                }
            }

            // P2: drop the expired head
            let backfill_was_enabled = window.backfill_enabled();
            if let Some(evicted) = window.evict(now) {
                debug!(evicted, pool = window.pool().len(), "expired trades evicted");
                if backfill_was_enabled {
                    info!("first eviction, back-fill disabled permanently");
                }
            }

            // P3: newer trades, gated by the dynamic poll delay
            if let Some(from_id) = window.forward_from_id(now) {
                let batch = self
                    .fetch(AggTradesQuery::from_id(from_id, BATCH as u16))
                    .await
                    .map_err(KeeperError::ForwardFill)?;
                fetched_any = true;

                let fetched = batch.len();
                let added = window.apply_forward_fill(batch, now);
                debug!(from_id, fetched, added, "forward-fill applied");

                if window.next_poll_at_ms() > now {
                    debug!(
                        delay_ms = window.next_poll_at_ms() - now,
                        "short page, next poll deferred"
                    );
                }
            }

            let report = window.report(&self.symbol);
            let full = report.fullness_percent >= 100;

            let next_phase = window.phase();
            if next_phase != phase {
                info!(
                    from = %phase,
                    to = %next_phase,
                    fullness = report.fullness_percent,
                    captured_ms = report.captured_period_ms,
                    "keeper phase changed"
                );
                phase = next_phase;
                record_phase(phase);
            }

            if self.reports.send(report).await.is_err() {
                return Ok(());
            }

            if full {
                let delay = window.dynamic_delay_ms();
                if delay > 0 {
                    tokio::time::sleep(Duration::from_millis(delay as u64)).await;
                }
            } else if !fetched_any {
                // nothing to fetch until the poll gate opens
                let wait = (window.next_poll_at_ms() - now).max(1);
                tokio::time::sleep(Duration::from_millis(wait as u64)).await;
            }
        }
    }

    async fn fetch(&self, query: AggTradesQuery) -> Result<Vec<AggTrade>, ExchangeError> {
        warn_if_slow(
            "agg_trades",
            SLOW_FETCH,
            self.api.agg_trades(&self.symbol, query),
        )
        .await
    }
}

fn record_phase(phase: KeeperPhase) {
    Span::current().record("phase", field::display(phase));
}
