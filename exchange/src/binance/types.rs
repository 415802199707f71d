/// Maximum number of aggregated trades the exchange returns per request.
pub const AGG_TRADES_PAGE_LIMIT: u16 = 1000;

/// Request weight charged by the exchange for one aggTrades call.
pub const AGG_TRADES_WEIGHT: u32 = 4;

/// Parameters of one aggTrades request. Unset fields are omitted from the
/// query string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggTradesQuery {
    pub from_id: Option<u64>,
    pub start_ms: Option<i64>,
    pub end_ms: Option<i64>,
    pub limit: u16,
}

impl AggTradesQuery {
    /// The most recent `limit` trades.
    pub fn latest(limit: u16) -> Self {
        Self {
            from_id: None,
            start_ms: None,
            end_ms: None,
            limit: limit.min(AGG_TRADES_PAGE_LIMIT),
        }
    }

    /// Up to `limit` trades with id >= `from_id`, ascending.
    pub fn from_id(from_id: u64, limit: u16) -> Self {
        Self {
            from_id: Some(from_id),
            ..Self::latest(limit)
        }
    }

    pub(crate) fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("limit", self.limit.to_string())];
        if let Some(id) = self.from_id {
            params.push(("fromId", id.to_string()));
        }
        if let Some(start) = self.start_ms {
            params.push(("startTime", start.to_string()));
        }
        if let Some(end) = self.end_ms {
            params.push(("endTime", end.to_string()));
        }
        params
    }
}
