mod agg_trade;

pub use agg_trade::AggTrade;
