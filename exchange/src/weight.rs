//! Process-wide request-weight governor.
//!
//! The exchange budgets request weight per wall-clock minute. Every keeper
//! shares one controller; a call reserves its weight up front and waits for
//! the next minute when the budget is spent.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

pub const DEFAULT_WEIGHT_LIMIT_PER_MINUTE: u32 = 6000;

const MINUTE_MS: i64 = 60_000;

#[derive(Debug, Default)]
struct WeightWindow {
    minute: i64,
    used: u32,
}

#[derive(Clone, Debug)]
pub struct WeightController {
    inner: Arc<Mutex<WeightWindow>>,
    limit: u32,
}

impl Default for WeightController {
    fn default() -> Self {
        Self::new(DEFAULT_WEIGHT_LIMIT_PER_MINUTE)
    }
}

impl WeightController {
    pub fn new(limit_per_minute: u32) -> Self {
        Self {
            inner: Arc::new(Mutex::new(WeightWindow::default())),
            limit: limit_per_minute.max(1),
        }
    }

    /// Reserve `weight`, sleeping until a later minute if the budget is spent.
    pub async fn acquire(&self, weight: u32) {
        loop {
            match self.try_reserve_at(weight, now_ms()) {
                None => return,
                Some(wait) => {
                    debug!(
                        weight,
                        wait_ms = wait.as_millis() as u64,
                        "request weight exhausted, waiting for next minute"
                    );
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    /// Raise the local count to what the exchange reports. Never lowers it.
    pub fn observe_used(&self, used: u32) {
        self.observe_used_at(used, now_ms());
    }

    pub(crate) fn observe_used_at(&self, used: u32, now_ms: i64) {
        let mut w = self.inner.lock();
        roll(&mut w, now_ms);
        w.used = w.used.max(used);
    }

    /// Returns `None` when the weight was reserved, otherwise how long to
    /// wait before retrying.
    pub(crate) fn try_reserve_at(&self, weight: u32, now_ms: i64) -> Option<Duration> {
        let mut w = self.inner.lock();
        roll(&mut w, now_ms);

        // A single request heavier than the whole budget still goes through
        // on a fresh minute.
        if w.used == 0 || w.used.saturating_add(weight) <= self.limit {
            w.used = w.used.saturating_add(weight);
            return None;
        }

        let into_minute = now_ms.rem_euclid(MINUTE_MS);
        Some(Duration::from_millis((MINUTE_MS - into_minute) as u64 + 1))
    }
}

fn roll(w: &mut WeightWindow, now_ms: i64) {
    let minute = now_ms.div_euclid(MINUTE_MS);
    if minute != w.minute {
        w.minute = minute;
        w.used = 0;
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
