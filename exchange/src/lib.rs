pub mod binance;
pub mod weight;

pub use binance::{AggTradesApi, AggTradesQuery, BinanceClient, ExchangeError};
pub use weight::WeightController;
