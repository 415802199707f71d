use std::collections::{BTreeMap, HashSet};

use serde::Serialize;
use url::form_urlencoded;

use super::error::ApiError;
use crate::pool::FullnessReport;
use crate::stats::SlotStats;

/// Upper bound on `numberOfTimeslots` per request.
pub const MAX_TIMESLOTS: usize = 10_000;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// One entry of `GET /pool-status`. The pool itself is never serialized.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolStatusView {
    pub symbol: String,
    pub fullness_percent: i64,
    pub last_trade_time_ms: i64,
    pub captured_period_ms: i64,
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&FullnessReport> for PoolStatusView {
    fn from(r: &FullnessReport) -> Self {
        Self {
            symbol: r.symbol.clone(),
            fullness_percent: r.fullness_percent,
            last_trade_time_ms: r.last_trade_time_ms,
            captured_period_ms: r.captured_period_ms,
            ready: r.ready,
            error: r.error.as_ref().map(|e| e.to_string()),
        }
    }
}

/// Body of `GET /processed-data`, on success and on validation failure.
///
/// `processedDataBySymbol[s][k]` is the k-th slot counted from the first
/// trade inside the requested period; slot width is recomputed from the
/// observed trade range and is not aligned to `timeslotDurMs`.
///
/// A symbol with a healthy pool can still fail with 422 when none of its
/// trades fall inside the requested period (a quiet pair asked about a short
/// period); the reason is listed in `errorDescriptions`.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedData {
    pub is_error: bool,
    pub error_descriptions: Vec<String>,
    pub absent_symbols: Vec<String>,
    pub symbols_with_not_enough_data: Vec<String>,
    pub processed_data_by_symbol: BTreeMap<String, Vec<SlotStats>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyticsQuery {
    pub symbols: Vec<String>,
    pub timeslot_dur_ms: i64,
    pub number_of_timeslots: usize,
}

impl AnalyticsQuery {
    /// Parse a raw query string. `symbols` may repeat and may also be spelled
    /// `symbols[]`; `timeslotDurMS` is accepted as an alias.
    pub fn parse(raw: &str) -> Result<Self, ApiError> {
        let mut symbols = Vec::new();
        let mut timeslot_dur_ms = None;
        let mut number_of_timeslots = None;

        for (key, value) in form_urlencoded::parse(raw.as_bytes()) {
            match key.as_ref() {
                "symbols" | "symbols[]" => symbols.extend(
                    value
                        .split(',')
                        .map(|s| s.trim().to_ascii_uppercase())
                        .filter(|s| !s.is_empty()),
                ),
                "timeslotDurMs" | "timeslotDurMS" => {
                    let v: i64 = value
                        .trim()
                        .parse()
                        .map_err(|_| ApiError::invalid_parameter("timeslotDurMs", "not an integer"))?;
                    if v < 1 {
                        return Err(ApiError::invalid_parameter("timeslotDurMs", "must be >= 1"));
                    }
                    timeslot_dur_ms = Some(v);
                }
                "numberOfTimeslots" => {
                    let v: usize = value.trim().parse().map_err(|_| {
                        ApiError::invalid_parameter("numberOfTimeslots", "not a positive integer")
                    })?;
                    if !(1..=MAX_TIMESLOTS).contains(&v) {
                        return Err(ApiError::invalid_parameter(
                            "numberOfTimeslots",
                            &format!("must be between 1 and {MAX_TIMESLOTS}"),
                        ));
                    }
                    number_of_timeslots = Some(v);
                }
                _ => {}
            }
        }

        let mut seen = HashSet::new();
        symbols.retain(|s| seen.insert(s.clone()));
        if symbols.is_empty() {
            return Err(ApiError::missing_parameter("symbols"));
        }

        Ok(Self {
            symbols,
            timeslot_dur_ms: timeslot_dur_ms
                .ok_or_else(|| ApiError::missing_parameter("timeslotDurMs"))?,
            number_of_timeslots: number_of_timeslots
                .ok_or_else(|| ApiError::missing_parameter("numberOfTimeslots"))?,
        })
    }

    /// Start of the requested period.
    pub fn period_start_ms(&self, now_ms: i64) -> i64 {
        now_ms.saturating_sub(
            self.timeslot_dur_ms
                .saturating_mul(self.number_of_timeslots as i64),
        )
    }
}
