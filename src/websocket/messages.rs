use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Quote;

/// WebSocket event types
///
/// The tag is the event name consumers switch on; a quote batch arrives as
/// `{"type":"priceUpdate","quotes":[...]}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WsMessage {
    /// Batch of accepted quotes, one event per broadcast round
    PriceUpdate { quotes: Vec<Quote> },
    /// Subscription confirmation
    Subscribed {
        channel: String,
        symbol: Option<String>,
    },
    /// Unsubscription confirmation
    Unsubscribed {
        channel: String,
        symbol: Option<String>,
    },
    /// Error message
    Error { message: String },
    /// Heartbeat/Ping
    Ping { timestamp: DateTime<Utc> },
    /// Pong response
    Pong { timestamp: DateTime<Utc> },
}

/// Client subscription request
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientMessage {
    Subscribe {
        channel: String,
        symbol: Option<String>,
    },
    Unsubscribe {
        channel: String,
        symbol: Option<String>,
    },
    Ping,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MarketState, QuoteSource};
    use rust_decimal_macros::dec;

    #[test]
    fn test_price_update_event_name() {
        let msg = WsMessage::PriceUpdate {
            quotes: vec![Quote {
                symbol: "AAPL".to_string(),
                price: dec!(175.20),
                change: dec!(0.20),
                change_percent: dec!(0.11),
                high: dec!(175.20),
                low: dec!(175.00),
                volume: dec!(0),
                market_state: MarketState::Regular,
                currency: "USD".to_string(),
                timestamp: Utc::now(),
                source: QuoteSource::Simulated,
            }],
        };

        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], serde_json::json!("priceUpdate"));
        assert_eq!(json["quotes"].as_array().unwrap().len(), 1);
        assert_eq!(json["quotes"][0]["symbol"], serde_json::json!("AAPL"));
    }

    #[test]
    fn test_client_subscribe_parses() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"action":"subscribe","channel":"ticker","symbol":"TCS.NS"}"#,
        )
        .unwrap();
        assert!(matches!(
            msg,
            ClientMessage::Subscribe { channel, symbol }
                if channel == "ticker" && symbol.as_deref() == Some("TCS.NS")
        ));
    }
}
