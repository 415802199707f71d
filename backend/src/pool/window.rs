//! Synchronous core of a window keeper: what to fetch next, how to merge it,
//! and what to publish. All I/O lives in `keeper.rs`.

use corelib::AggTrade;

use super::report::{FullnessReport, KeeperError, KeeperPhase, fullness_percent};
use super::trade_pool::TradePool;
use super::{BACKFILL_THRESHOLD_MS, BATCH};

#[derive(Debug)]
pub struct PoolWindow {
    window_ms: i64,
    pool: TradePool,

    /// Cleared forever by the first eviction or when history runs out.
    backfill_enabled: bool,

    /// Forward-fill is skipped until this time.
    next_poll_at_ms: i64,

    /// Id and time of the newest trade ever seen; survives an eviction that
    /// empties the pool.
    tail_id: u64,
    tail_time_ms: i64,
}

impl PoolWindow {
    pub fn new(window_ms: i64, bootstrap: Vec<AggTrade>) -> Result<Self, KeeperError> {
        let pool = TradePool::from_batch(bootstrap);
        let last = pool.last().ok_or(KeeperError::EmptyBootstrap)?;
        let (tail_id, tail_time_ms) = (last.id, last.time_ms);

        Ok(Self {
            window_ms,
            pool,
            backfill_enabled: true,
            next_poll_at_ms: 0,
            tail_id,
            tail_time_ms,
        })
    }

    pub fn pool(&self) -> &TradePool {
        &self.pool
    }

    pub fn backfill_enabled(&self) -> bool {
        self.backfill_enabled
    }

    pub fn next_poll_at_ms(&self) -> i64 {
        self.next_poll_at_ms
    }

    /// Id to back-fill from, if the oldest trade is still more than
    /// `BACKFILL_THRESHOLD_MS` newer than the desired window start.
    pub fn backfill_from_id(&self, now_ms: i64) -> Option<u64> {
        if !self.backfill_enabled {
            return None;
        }
        let first = self.pool.first()?;
        let window_start = now_ms - self.window_ms;

        (first.time_ms - window_start > BACKFILL_THRESHOLD_MS)
            .then(|| first.id.saturating_sub(BATCH as u64))
    }

    /// Prepend a back-fill batch. A batch with nothing older than the pool
    /// means the exchange history is exhausted; back-fill is then disabled.
    pub fn apply_backfill(&mut self, batch: Vec<AggTrade>) -> usize {
        let added = self.pool.prepend(batch);
        if added == 0 {
            self.backfill_enabled = false;
        }
        added
    }

    /// Drop trades older than `now − window`. Returns the number dropped, or
    /// `None` when the head was not expired. Any eviction disables back-fill.
    pub fn evict(&mut self, now_ms: i64) -> Option<usize> {
        let cutoff = now_ms - self.window_ms;
        let first = self.pool.first()?;
        if first.time_ms >= cutoff {
            return None;
        }

        self.backfill_enabled = false;
        Some(self.pool.evict_older_than(cutoff))
    }

    /// Id to forward-fill from, once the poll gate has opened.
    pub fn forward_from_id(&self, now_ms: i64) -> Option<u64> {
        (now_ms >= self.next_poll_at_ms).then_some(self.tail_id + 1)
    }

    /// Append a forward-fill batch. A short batch on an established pool
    /// defers the next poll by the dynamic delay.
    pub fn apply_forward_fill(&mut self, batch: Vec<AggTrade>, now_ms: i64) -> usize {
        let fetched = batch.len();
        let added = self.pool.append(batch);

        if let Some(last) = self.pool.last() {
            if last.id > self.tail_id {
                self.tail_id = last.id;
                self.tail_time_ms = last.time_ms;
            }
        }

        if fetched < BATCH && self.pool.len() > BATCH {
            self.next_poll_at_ms = now_ms + self.dynamic_delay_ms();
        }

        added
    }

    /// Wall-clock span of the most recent `BATCH` trades, or 0 while the pool
    /// holds no more than `BATCH` trades.
    pub fn dynamic_delay_ms(&self) -> i64 {
        let len = self.pool.len();
        if len <= BATCH {
            return 0;
        }

        match (self.pool.last(), self.pool.get(len - BATCH - 1)) {
            (Some(last), Some(anchor)) => (last.time_ms - anchor.time_ms).max(0),
            _ => 0,
        }
    }

    /// `Filling` until back-fill is switched off for good, `Ready` after.
    pub fn phase(&self) -> KeeperPhase {
        if self.backfill_enabled {
            KeeperPhase::Filling
        } else {
            KeeperPhase::Ready
        }
    }

    /// Build the report for the pool as it stands right now.
    pub fn report(&self, symbol: &str) -> FullnessReport {
        let (last_trade_time_ms, captured_period_ms) = match (self.pool.first(), self.pool.last()) {
            (Some(first), Some(last)) => (last.time_ms, last.time_ms - first.time_ms),
            _ => (self.tail_time_ms, 0),
        };
        let fullness = fullness_percent(captured_period_ms, self.window_ms);

        FullnessReport {
            symbol: symbol.to_string(),
            fullness_percent: fullness,
            last_trade_time_ms,
            captured_period_ms,
            ready: fullness > 99,
            pool: Some(self.pool.snapshot()),
            error: None,
        }
    }
}
