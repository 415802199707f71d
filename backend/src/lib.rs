pub mod config;
pub mod error;
pub mod http;
pub mod pool;
pub mod stats;
pub mod time;
