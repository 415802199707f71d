use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::RwLock;

use super::report::FullnessReport;

type Reports = Arc<RwLock<HashMap<String, FullnessReport>>>;

/// Latest report per symbol. Owned by the aggregator, which is its only
/// writer; everyone else reads through a `PoolStateView`.
#[derive(Default)]
pub struct PoolStateStore {
    inner: Reports,
}

impl PoolStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read-only handle for HTTP handlers.
    pub fn view(&self) -> PoolStateView {
        PoolStateView {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Replace the entry for `report.symbol`. Last write wins.
    pub async fn set(&mut self, report: FullnessReport) {
        let mut g = self.inner.write().await;
        g.insert(report.symbol.clone(), report);
    }
}

#[derive(Clone)]
pub struct PoolStateView {
    inner: Reports,
}

impl PoolStateView {
    pub async fn get(&self, symbol: &str) -> Option<FullnessReport> {
        let g = self.inner.read().await;
        g.get(symbol).cloned()
    }

    /// Consistent copy of every entry, ordered by symbol.
    pub async fn all(&self) -> BTreeMap<String, FullnessReport> {
        let g = self.inner.read().await;
        g.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}
