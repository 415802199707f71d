use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("window keeper for {symbol} failed: {reason}")]
    KeeperFailed { symbol: String, reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
