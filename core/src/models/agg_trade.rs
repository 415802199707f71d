use serde::{Deserialize, Deserializer, Serialize};

/// One aggregated trade as published by the exchange.
///
/// Several raw fills matching on price, side and tick are coalesced into a
/// single record with cumulative quantity. Ids are monotonic within a symbol.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AggTrade {
    #[serde(rename = "a")]
    pub id: u64,

    #[serde(rename = "p", deserialize_with = "decimal_str")]
    pub price: f64,

    #[serde(rename = "q", deserialize_with = "decimal_str")]
    pub qty: f64,

    #[serde(rename = "f", default)]
    pub first_trade_id: u64,

    #[serde(rename = "l", default)]
    pub last_trade_id: u64,

    /// Trade time (ms since epoch)
    #[serde(rename = "T")]
    pub time_ms: i64,

    /// true => aggressor was the seller (sell-side volume)
    #[serde(rename = "m")]
    pub is_buyer_maker: bool,
}

impl AggTrade {
    pub fn notional(&self) -> f64 {
        self.qty * self.price
    }
}

/// The exchange sends prices and quantities as decimal strings; plain numbers
/// are accepted as well.
fn decimal_str<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Num(f64),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Str(s) => s.parse().map_err(serde::de::Error::custom),
        Raw::Num(n) => Ok(n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_exchange_wire_form() {
        let raw = r#"{"a":26129,"p":"0.01633102","q":"4.70443515","f":27781,"l":27781,"T":1498793709153,"m":true,"M":true}"#;

        let trade: AggTrade = serde_json::from_str(raw).unwrap();

        assert_eq!(trade.id, 26129);
        assert_eq!(trade.time_ms, 1_498_793_709_153);
        assert!(trade.is_buyer_maker);
        assert!((trade.price - 0.01633102).abs() < 1e-12);
        assert!((trade.qty - 4.70443515).abs() < 1e-12);
    }

    #[test]
    fn rejects_non_numeric_price() {
        let raw = r#"{"a":1,"p":"abc","q":"1","f":1,"l":1,"T":0,"m":false}"#;
        assert!(serde_json::from_str::<AggTrade>(raw).is_err());
    }

    #[test]
    fn notional_is_qty_times_price() {
        let trade = AggTrade {
            id: 1,
            price: 2.5,
            qty: 4.0,
            first_trade_id: 1,
            last_trade_id: 1,
            time_ms: 0,
            is_buyer_maker: false,
        };
        assert_eq!(trade.notional(), 10.0);
    }
}
