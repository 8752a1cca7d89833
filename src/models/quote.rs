use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Market session state attached to each quote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketState {
    Regular,
    Closed,
}

/// Which kind of source produced a quote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuoteSource {
    Live,
    Simulated,
}

/// Canonical normalized quote — the unit of broadcast and persistence
///
/// Produced by the dedup/normalization stage from a raw tick and the cached
/// previous quote for the same symbol. `change`/`change_percent` are relative
/// to the previously broadcast price; `high`/`low` roll across the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub symbol: String,
    /// Last traded/observed price (always positive)
    #[schema(value_type = String, example = "175.20")]
    pub price: Decimal,
    /// Absolute change vs the previously broadcast price
    #[schema(value_type = String, example = "0.20")]
    pub change: Decimal,
    /// Percentage change vs the previously broadcast price
    #[schema(value_type = String, example = "0.11")]
    pub change_percent: Decimal,
    /// Session high seen so far
    #[schema(value_type = String, example = "176.00")]
    pub high: Decimal,
    /// Session low seen so far
    #[schema(value_type = String, example = "174.10")]
    pub low: Decimal,
    #[schema(value_type = String, example = "1200")]
    pub volume: Decimal,
    pub market_state: MarketState,
    pub currency: String,
    pub timestamp: DateTime<Utc>,
    pub source: QuoteSource,
}

/// One raw price observation for one symbol, before normalization
///
/// All tick sources (live adapter, GBM generator, replay cursor) emit this
/// shape onto the pipeline's inbound channel.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTick {
    pub ticker: String,
    pub price: Decimal,
    pub volume: Option<Decimal>,
    pub timestamp: DateTime<Utc>,
    pub source: QuoteSource,
    pub market_state: Option<MarketState>,
    pub currency: Option<String>,
}

impl RawTick {
    /// Minimal simulated tick — the shape the generators emit
    pub fn simulated(ticker: impl Into<String>, price: Decimal, timestamp: DateTime<Utc>) -> Self {
        Self {
            ticker: ticker.into(),
            price,
            volume: None,
            timestamp,
            source: QuoteSource::Simulated,
            market_state: None,
            currency: None,
        }
    }
}

/// Wire message carried on the upstream `stock_updates` channel
///
/// One JSON document per tick: `{ "ticker": ..., "price": ..., "timestamp": ... }`.
/// Extra fields published by the feed (name, sector) are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamTick {
    pub ticker: String,
    pub price: f64,
    pub timestamp: String,
    #[serde(default)]
    pub currency: Option<String>,
}

impl UpstreamTick {
    /// Convert the wire message into a raw tick, or `None` when the payload
    /// carries a non-finite/non-positive price or an unparseable timestamp.
    pub fn into_raw_tick(self) -> Option<RawTick> {
        if !self.price.is_finite() || self.price <= 0.0 {
            return None;
        }
        let price = Decimal::from_f64_retain(self.price)?.round_dp(4);
        let timestamp = parse_feed_timestamp(&self.timestamp)?;

        Some(RawTick {
            ticker: self.ticker,
            price,
            volume: None,
            timestamp,
            source: QuoteSource::Live,
            market_state: None,
            currency: self.currency,
        })
    }
}

/// Parse the feed's timestamp, accepting RFC 3339 or the legacy
/// `YYYY-MM-DD HH:MM:SS` form (interpreted as UTC).
fn parse_feed_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_upstream_tick_rfc3339() {
        let wire = UpstreamTick {
            ticker: "RELIANCE.NS".to_string(),
            price: 2850.55,
            timestamp: "2024-06-03T09:15:00Z".to_string(),
            currency: None,
        };

        let tick = wire.into_raw_tick().unwrap();
        assert_eq!(tick.ticker, "RELIANCE.NS");
        assert_eq!(tick.price, dec!(2850.55));
        assert_eq!(tick.source, QuoteSource::Live);
    }

    #[test]
    fn test_upstream_tick_legacy_timestamp() {
        let wire = UpstreamTick {
            ticker: "TCS.NS".to_string(),
            price: 3801.0,
            timestamp: "2024-06-03 09:15:00".to_string(),
            currency: None,
        };

        let tick = wire.into_raw_tick().unwrap();
        assert_eq!(tick.timestamp.to_rfc3339(), "2024-06-03T09:15:00+00:00");
    }

    #[test]
    fn test_upstream_tick_rejects_bad_price() {
        for price in [0.0, -1.5, f64::NAN, f64::INFINITY] {
            let wire = UpstreamTick {
                ticker: "X".to_string(),
                price,
                timestamp: "2024-06-03 09:15:00".to_string(),
                currency: None,
            };
            assert!(wire.into_raw_tick().is_none());
        }
    }

    #[test]
    fn test_upstream_tick_rejects_bad_timestamp() {
        let wire = UpstreamTick {
            ticker: "X".to_string(),
            price: 10.0,
            timestamp: "yesterday".to_string(),
            currency: None,
        };
        assert!(wire.into_raw_tick().is_none());
    }

    #[test]
    fn test_quote_serializes_camel_case() {
        let quote = Quote {
            symbol: "AAPL".to_string(),
            price: dec!(175.20),
            change: dec!(0.20),
            change_percent: dec!(0.11),
            high: dec!(176.00),
            low: dec!(174.10),
            volume: dec!(0),
            market_state: MarketState::Regular,
            currency: "USD".to_string(),
            timestamp: Utc::now(),
            source: QuoteSource::Simulated,
        };

        let json = serde_json::to_value(&quote).unwrap();
        assert_eq!(json["changePercent"], serde_json::json!("0.11"));
        assert_eq!(json["marketState"], serde_json::json!("REGULAR"));
        assert_eq!(json["source"], serde_json::json!("SIMULATED"));
    }
}
