use std::sync::Arc;

use axum::{Router, routing::get};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::pool::PoolStateView;
use crate::time::Clock;

/// Shared by every handler: a read handle on pool state and the clock used
/// to anchor requested periods.
pub struct AppState {
    pub pools: PoolStateView,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(pools: PoolStateView, clock: Arc<dyn Clock>) -> Self {
        AppState { pools, clock }
    }
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/pool-status", get(handlers::pool_status))
        .route("/processed-data", get(handlers::processed_data))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
