//! Per-symbol rolling trade windows.
//!
//! Data flow:
//! Exchange → WindowKeeper (one per symbol) → report channel → Aggregator → PoolStateStore

pub mod aggregator;
pub mod keeper;
pub mod report;
pub mod state;
pub mod trade_pool;
pub mod window;

pub use aggregator::{Aggregator, ErrorPolicy};
pub use keeper::WindowKeeper;
pub use report::{FullnessReport, KeeperError, KeeperPhase};
pub use state::{PoolStateStore, PoolStateView};
pub use trade_pool::{PoolSnapshot, TradePool};
pub use window::PoolWindow;

/// Trades per exchange request; also the unit the dynamic delay is measured in.
pub const BATCH: usize = exchange::binance::AGG_TRADES_PAGE_LIMIT as usize;

/// Back-fill only when the oldest trade is more than this much newer than
/// the desired window start.
pub const BACKFILL_THRESHOLD_MS: i64 = 1000;

/// Keepers and the aggregator rendezvous on this channel.
pub const REPORT_CHANNEL_CAPACITY: usize = 1;
