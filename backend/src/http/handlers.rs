use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    Json,
    extract::{RawQuery, State},
    http::StatusCode,
};
use common::logger::{TraceId, request_span};
use tracing::{Instrument, debug, field, info, warn};

use super::AppState;
use super::dto::{AnalyticsQuery, PoolStatusView, ProcessedData};
use super::error::ApiError;
use crate::pool::PoolSnapshot;
use crate::stats::statistic_data;

/// GET /pool-status
pub async fn pool_status(
    State(state): State<Arc<AppState>>,
) -> Json<BTreeMap<String, PoolStatusView>> {
    let all = state.pools.all().await;
    Json(
        all.iter()
            .map(|(symbol, report)| (symbol.clone(), PoolStatusView::from(report)))
            .collect(),
    )
}

/// GET /processed-data?symbols[]=ETHUSDT&symbols[]=ADAUSDT&timeslotDurMs=30000&numberOfTimeslots=14
///
/// 400 for unknown symbols or periods older than a pool, 422 when a pool has
/// no trades inside the requested period.
pub async fn processed_data(
    State(state): State<Arc<AppState>>,
    RawQuery(raw): RawQuery,
) -> Result<(StatusCode, Json<ProcessedData>), ApiError> {
    let trace_id = TraceId::default();
    let span = request_span("processed_data", &trace_id);

    async move {
        let query = AnalyticsQuery::parse(raw.as_deref().unwrap_or_default())?;
        tracing::Span::current().record("symbols", field::debug(&query.symbols));

        let now = state.clock.now_ms();
        let period_start = query.period_start_ms(now);

        let mut body = ProcessedData::default();
        let mut pools: Vec<(String, PoolSnapshot)> = Vec::with_capacity(query.symbols.len());

        for symbol in &query.symbols {
            // a failed keeper counts as unknown
            let Some(report) = state.pools.get(symbol).await.filter(|r| !r.is_error()) else {
                body.absent_symbols.push(symbol.clone());
                continue;
            };

            let oldest = report.oldest_trade_time_ms();
            match report.pool {
                Some(pool) if period_start >= oldest => pools.push((symbol.clone(), pool)),
                Some(_) => body.symbols_with_not_enough_data.push(symbol.clone()),
                None => body.absent_symbols.push(symbol.clone()),
            }
        }

        if !body.absent_symbols.is_empty() {
            body.is_error = true;
            body.error_descriptions.push(format!(
                "Unknown pair(s): {}",
                body.absent_symbols.join(", ")
            ));
        }

        if !body.symbols_with_not_enough_data.is_empty() {
            body.is_error = true;
            body.error_descriptions.push(format!(
                "Not enough data for pair(s): {}",
                body.symbols_with_not_enough_data.join(", ")
            ));
        }

        if body.is_error {
            warn!(errors = ?body.error_descriptions, "processed-data request rejected");
            return Ok((StatusCode::BAD_REQUEST, Json(body)));
        }

        let (dur, slots) = (query.timeslot_dur_ms, query.number_of_timeslots);
        let results = tokio::task::spawn_blocking(move || {
            pools
                .into_iter()
                .map(|(symbol, pool)| {
                    let trades = pool.to_vec();
                    (symbol, statistic_data(&trades, dur, slots, now))
                })
                .collect::<Vec<_>>()
        })
        .await
        .map_err(|e| ApiError::internal(format!("statistics task failed: {e}")))?;

        for (symbol, res) in results {
            match res {
                Ok(stats) => {
                    debug!(symbol = %symbol, slots = stats.len(), "statistics computed");
                    body.processed_data_by_symbol.insert(symbol, stats);
                }
                Err(e) => {
                    body.is_error = true;
                    body.error_descriptions
                        .push(format!("Statistics failed for {symbol}: {e}"));
                }
            }
        }

        if body.is_error {
            warn!(errors = ?body.error_descriptions, "processed-data request failed");
            body.processed_data_by_symbol.clear();
            return Ok((StatusCode::UNPROCESSABLE_ENTITY, Json(body)));
        }

        info!(
            symbols = body.processed_data_by_symbol.len(),
            timeslot_dur_ms = dur,
            number_of_timeslots = slots,
            "processed-data served"
        );
        Ok((StatusCode::OK, Json(body)))
    }
    .instrument(span)
    .await
}
