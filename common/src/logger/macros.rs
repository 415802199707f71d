use std::future::Future;
use std::time::{Duration, Instant};

use tracing::{Span, field};

use super::TraceId;

/// Long-lived span for one symbol's window keeper.
pub fn keeper_span(symbol: &str, window_ms: i64) -> Span {
    tracing::info_span!(
        "window_keeper",
        symbol = %symbol,
        window_ms,
        phase = field::Empty
    )
}

/// Root span for one inbound request.
pub fn request_span(name: &'static str, trace_id: &TraceId) -> Span {
    tracing::info_span!(
        "request",
        name = %name,
        trace_id = %trace_id.as_str(),
        symbols = field::Empty
    )
}

pub async fn warn_if_slow<F, T>(label: &'static str, max: Duration, fut: F) -> T
where
    F: Future<Output = T>,
{
    let start = Instant::now();
    let out = fut.await;
    let elapsed = start.elapsed();
    if elapsed > max {
        tracing::warn!(
            target: "performance",
            label = label,
            elapsed_ms = elapsed.as_millis() as u64,
            "slow operation detected"
        );
    }
    out
}
