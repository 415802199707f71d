use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("rate limited by exchange (status {status}, retry after {retry_after_secs:?}s)")]
    RateLimited {
        status: u16,
        retry_after_secs: Option<u64>,
    },

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response from exchange: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid exchange url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl ExchangeError {
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, ExchangeError::RateLimited { .. })
    }
}
