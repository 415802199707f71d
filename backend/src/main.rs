use std::future::IntoFuture;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use common::logger::init_logger;
use exchange::{BinanceClient, WeightController};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tradepool::{
    config::{AppConfig, Cli},
    http::{AppState, create_router},
    pool::{Aggregator, FullnessReport, PoolStateStore, REPORT_CHANNEL_CAPACITY, WindowKeeper},
    time::SystemClock,
};

/// One keeper task per symbol, all sharing the client (and so its weight budget).
fn spawn_keepers(
    cfg: &AppConfig,
    client: Arc<BinanceClient>,
    clock: Arc<SystemClock>,
    tx: mpsc::Sender<FullnessReport>,
) {
    for symbol in &cfg.symbols {
        let keeper = WindowKeeper::new(
            symbol.clone(),
            cfg.window_ms,
            Arc::clone(&client),
            Arc::clone(&clock),
            tx.clone(),
        );
        tokio::spawn(keeper.run());
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logger("tradepool", cli.log_json);

    let cfg = AppConfig::from_cli(cli).context("invalid configuration")?;

    tracing::info!(
        symbols = ?cfg.symbols,
        window_ms = cfg.window_ms,
        listen = %cfg.http_listen_addr,
        policy = ?cfg.error_policy,
        "Starting tradepool..."
    );

    let weights = WeightController::new(cfg.weight_limit);
    let client = Arc::new(
        BinanceClient::new(&cfg.base_url, Some(cfg.api_key.clone()), weights)
            .context("failed to build exchange client")?,
    );
    let clock = Arc::new(SystemClock);

    let store = PoolStateStore::new();
    let view = store.view();

    let (tx, rx) = mpsc::channel::<FullnessReport>(REPORT_CHANNEL_CAPACITY);
    spawn_keepers(&cfg, client, Arc::clone(&clock), tx);

    let aggregator = Aggregator::new(store, cfg.error_policy);
    let aggregate = async move {
        aggregator.run(rx).await?;
        // every keeper is gone; keep serving what we have
        tracing::warn!("all window keepers stopped, serving last known state");
        std::future::pending::<()>().await;
        Ok::<(), tradepool::error::AppError>(())
    };

    let state = Arc::new(AppState::new(view, clock));
    let app = create_router(state);

    let listener = TcpListener::bind(cfg.http_listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", cfg.http_listen_addr))?;
    tracing::info!(addr = %cfg.http_listen_addr, "HTTP server listening");

    let server = axum::serve(listener, app).into_future();

    tokio::select! {
        res = server => {
            res.context("HTTP server failed")?;
        }
        res = aggregate => {
            res.context("aggregator stopped")?;
        }
        res = tokio::signal::ctrl_c() => {
            res.context("failed to listen for shutdown signal")?;
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}
