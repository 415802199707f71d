use std::collections::HashSet;
use std::io::{BufRead, BufReader, ErrorKind};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use clap::Parser;
use exchange::binance::client::DEFAULT_BASE_URL;
use exchange::weight::DEFAULT_WEIGHT_LIMIT_PER_MINUTE;
use tracing::warn;

use crate::error::AppError;
use crate::pool::ErrorPolicy;

const ONE_MINUTE_MS: i64 = 60 * 1000;
const ONE_HOUR_MS: i64 = 60 * ONE_MINUTE_MS;
const ONE_DAY_MS: i64 = 24 * ONE_HOUR_MS;

/// Default rolling window: fifteen days.
pub const DEFAULT_WINDOW_MS: i64 = 15 * ONE_DAY_MS;

#[derive(Debug, Parser)]
#[clap(name = "tradepool", version, about = "Rolling aggregated-trade windows with on-demand statistics")]
pub struct Cli {
    /// File whose first line is the exchange API key
    #[clap(long, default_value = "apikey.txt")]
    pub api_key_file: PathBuf,

    /// Symbols to keep a window for (comma-separated, repeatable)
    #[clap(long, value_delimiter = ',', required = true)]
    pub symbols: Vec<String>,

    /// Target length of every rolling window (ms)
    #[clap(long, default_value_t = DEFAULT_WINDOW_MS)]
    pub window_ms: i64,

    /// HTTP listen address
    #[clap(long, default_value = "0.0.0.0:8088")]
    pub listen: String,

    /// Exchange REST base url
    #[clap(long, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Request-weight budget per minute shared by all keepers
    #[clap(long, default_value_t = DEFAULT_WEIGHT_LIMIT_PER_MINUTE)]
    pub weight_limit: u32,

    /// What the aggregator does when a keeper fails
    #[clap(long, value_enum, default_value_t = ErrorPolicy::Halt)]
    pub on_keeper_error: ErrorPolicy,

    /// Emit logs as JSON
    #[clap(long)]
    pub log_json: bool,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Exchange API key. Empty when no key file was found; public market
    /// data does not require one.
    pub api_key: String,

    /// Upper-cased, de-duplicated, in the order given.
    pub symbols: Vec<String>,

    /// Target length of every rolling window (ms).
    pub window_ms: i64,

    pub http_listen_addr: SocketAddr,

    pub base_url: String,

    pub weight_limit: u32,

    pub error_policy: ErrorPolicy,

    pub log_json: bool,
}

impl AppConfig {
    pub fn from_cli(cli: Cli) -> Result<Self, AppError> {
        let symbols = normalize_symbols(&cli.symbols);
        if symbols.is_empty() {
            return Err(AppError::Config("at least one symbol is required".into()));
        }

        if cli.window_ms <= 0 {
            return Err(AppError::Config(format!(
                "window_ms must be positive, got {}",
                cli.window_ms
            )));
        }

        if cli.weight_limit == 0 {
            return Err(AppError::Config("weight_limit must be positive".into()));
        }

        let http_listen_addr = cli
            .listen
            .parse()
            .map_err(|e| AppError::Config(format!("invalid listen address {}: {e}", cli.listen)))?;

        let api_key = read_api_key(&cli.api_key_file)?;

        Ok(Self {
            api_key,
            symbols,
            window_ms: cli.window_ms,
            http_listen_addr,
            base_url: cli.base_url,
            weight_limit: cli.weight_limit,
            error_policy: cli.on_keeper_error,
            log_json: cli.log_json,
        })
    }
}

fn normalize_symbols(raw: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.iter()
        .map(|s| s.trim().to_ascii_uppercase())
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(s.clone()))
        .collect()
}

fn read_api_key(path: &Path) -> Result<String, AppError> {
    let file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!(path = %path.display(), "api key file not found, continuing without a key");
            return Ok(String::new());
        }
        Err(e) => return Err(e.into()),
    };

    let mut line = String::new();
    BufReader::new(file).read_line(&mut line)?;
    Ok(line.trim().to_string())
}
