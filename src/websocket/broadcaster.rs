use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::models::Quote;

use super::messages::WsMessage;

// WebSocket broadcaster for pub/sub pattern
#[derive(Clone)]
pub struct Broadcaster {
    /// Channel subscriptions per topic (e.g., "prices", "ticker:TCS.NS")
    channels: Arc<DashMap<String, broadcast::Sender<WsMessage>>>,
    /// Default channel capacity
    capacity: usize,
}

impl Broadcaster {
    /// Create a new broadcaster with default capacity
    pub fn new() -> Self {
        Self {
            channels: Arc::new(DashMap::new()),
            capacity: 1000,
        }
    }

    /// Create a new broadcaster with custom capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: Arc::new(DashMap::new()),
            capacity,
        }
    }

    /// Get or create a channel for a topic
    fn get_or_create_channel(&self, topic: &str) -> broadcast::Sender<WsMessage> {
        self.channels
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    /// Subscribe to a topic
    pub fn subscribe(&self, topic: &str) -> broadcast::Receiver<WsMessage> {
        let sender = self.get_or_create_channel(topic);
        sender.subscribe()
    }

    /// Broadcast a message to a topic
    ///
    /// Fire-and-forget: a send error only means nobody is subscribed, and a
    /// lagging receiver drops its own backlog without slowing the sender.
    pub fn broadcast(&self, topic: &str, message: WsMessage) {
        if let Some(sender) = self.channels.get(topic) {
            let _ = sender.send(message);
        }
    }

    /// Publish an accepted batch: one `priceUpdate` event on the firehose
    /// topic plus one per-symbol event on each symbol's ticker topic
    pub fn publish_quotes(&self, quotes: Vec<Quote>) {
        if quotes.is_empty() {
            return;
        }

        let mut by_symbol: HashMap<String, Vec<Quote>> = HashMap::new();
        for quote in &quotes {
            by_symbol
                .entry(quote.symbol.clone())
                .or_default()
                .push(quote.clone());
        }

        self.broadcast(topics::prices(), WsMessage::PriceUpdate { quotes });

        for (symbol, quotes) in by_symbol {
            self.broadcast(
                &topics::ticker(&symbol),
                WsMessage::PriceUpdate { quotes },
            );
        }
    }

    /// Get subscriber count for a topic
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.channels
            .get(topic)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }

    /// Remove a channel if it has no subscribers
    pub fn cleanup_empty_channels(&self) {
        self.channels.retain(|_, sender| sender.receiver_count() > 0);
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}

/// Helper functions for topic naming
pub mod topics {
    /// Firehose topic every client is attached to on connect
    pub fn prices() -> &'static str {
        "prices"
    }

    pub fn ticker(symbol: &str) -> String {
        format!("ticker:{}", symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MarketState, QuoteSource};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn quote(symbol: &str) -> Quote {
        Quote {
            symbol: symbol.to_string(),
            price: dec!(100),
            change: dec!(0),
            change_percent: dec!(0),
            high: dec!(100),
            low: dec!(100),
            volume: dec!(0),
            market_state: MarketState::Regular,
            currency: "INR".to_string(),
            timestamp: Utc::now(),
            source: QuoteSource::Simulated,
        }
    }

    #[tokio::test]
    async fn test_firehose_receives_whole_batch() {
        let broadcaster = Broadcaster::new();
        let mut rx = broadcaster.subscribe(topics::prices());

        broadcaster.publish_quotes(vec![quote("TCS.NS"), quote("RELIANCE.NS")]);

        let WsMessage::PriceUpdate { quotes } = rx.recv().await.unwrap() else {
            panic!("expected priceUpdate");
        };
        assert_eq!(quotes.len(), 2);
    }

    #[tokio::test]
    async fn test_ticker_topic_receives_only_its_symbol() {
        let broadcaster = Broadcaster::new();
        let mut rx = broadcaster.subscribe(&topics::ticker("TCS.NS"));

        broadcaster.publish_quotes(vec![quote("TCS.NS"), quote("RELIANCE.NS")]);

        let WsMessage::PriceUpdate { quotes } = rx.recv().await.unwrap() else {
            panic!("expected priceUpdate");
        };
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].symbol, "TCS.NS");
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_a_noop() {
        let broadcaster = Broadcaster::new();
        // No panic, nothing to assert - slow or absent consumers never block
        broadcaster.publish_quotes(vec![quote("TCS.NS")]);
        broadcaster.publish_quotes(vec![]);
    }

    #[tokio::test]
    async fn test_cleanup_empty_channels() {
        let broadcaster = Broadcaster::new();
        {
            let _rx = broadcaster.subscribe(topics::prices());
            assert_eq!(broadcaster.subscriber_count(topics::prices()), 1);
        }
        broadcaster.cleanup_empty_channels();
        assert_eq!(broadcaster.subscriber_count(topics::prices()), 0);
    }
}
