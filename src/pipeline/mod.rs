use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use utoipa::ToSchema;

use crate::cache::QuoteCache;
use crate::models::{MarketState, Quote, RawTick};
use crate::websocket::Broadcaster;

/// Statistics for the quote pipeline
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PipelineStats {
    /// Quotes that passed dedup and were fanned out (lifetime)
    pub accepted: u64,
    /// Ticks dropped as no-op or invalid (lifetime)
    pub dropped: u64,
}

/// The dedup/normalization stage and fan-out coordinator
///
/// All tick sources feed one inbound channel; the pipeline task is the single
/// writer of the quote cache. Each candidate tick is compared against the
/// cached quote for its symbol - a numerically unchanged price is dropped so
/// consumers are never flooded with redundant updates. Accepted quotes go to
/// the broadcast bus and the persistence sink in parallel, both with the
/// exact value that passed dedup.
pub struct QuotePipeline {
    cache: QuoteCache,
    broadcaster: Broadcaster,
    persistence_tx: Option<mpsc::UnboundedSender<Vec<Quote>>>,
    default_currency: String,

    accepted: Arc<AtomicU64>,
    dropped: Arc<AtomicU64>,

    /// Receiver for incoming tick batches (taken when start() is called)
    tick_rx: Arc<Mutex<Option<mpsc::UnboundedReceiver<Vec<RawTick>>>>>,
    task_handle: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl QuotePipeline {
    /// Create a new pipeline
    ///
    /// Returns (pipeline, sender); every tick source sends its rounds to the
    /// sender. `persistence_tx` is `None` when the engine runs without a
    /// database.
    pub fn new(
        cache: QuoteCache,
        broadcaster: Broadcaster,
        persistence_tx: Option<mpsc::UnboundedSender<Vec<Quote>>>,
        default_currency: String,
    ) -> (Self, mpsc::UnboundedSender<Vec<RawTick>>) {
        let (tick_tx, tick_rx) = mpsc::unbounded_channel();

        let pipeline = Self {
            cache,
            broadcaster,
            persistence_tx,
            default_currency,
            accepted: Arc::new(AtomicU64::new(0)),
            dropped: Arc::new(AtomicU64::new(0)),
            tick_rx: Arc::new(Mutex::new(Some(tick_rx))),
            task_handle: Arc::new(Mutex::new(None)),
        };

        (pipeline, tick_tx)
    }

    /// Start the pipeline loop
    ///
    /// Can only be called once; subsequent calls panic.
    pub fn start(&self) {
        let mut tick_rx = self
            .tick_rx
            .lock()
            .take()
            .expect("QuotePipeline already started or receiver already taken");

        let cache = self.cache.clone();
        let broadcaster = self.broadcaster.clone();
        let persistence_tx = self.persistence_tx.clone();
        let default_currency = self.default_currency.clone();
        let accepted = Arc::clone(&self.accepted);
        let dropped = Arc::clone(&self.dropped);

        let handle = tokio::spawn(async move {
            tracing::info!("Quote pipeline started");

            while let Some(batch) = tick_rx.recv().await {
                let mut quotes = Vec::with_capacity(batch.len());

                for raw in batch {
                    let previous = cache.get(&raw.ticker);
                    match normalize(&raw, previous.as_ref(), &default_currency) {
                        Some(quote) => {
                            cache.insert(quote.clone());
                            quotes.push(quote);
                        }
                        None => {
                            dropped.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }

                if quotes.is_empty() {
                    continue;
                }

                accepted.fetch_add(quotes.len() as u64, Ordering::Relaxed);

                if let Some(ref tx) = persistence_tx {
                    if tx.send(quotes.clone()).is_err() {
                        tracing::error!("Persistence sink channel closed");
                    }
                }
                broadcaster.publish_quotes(quotes);
            }

            tracing::warn!("Quote pipeline loop ended (all senders dropped)");
        });

        *self.task_handle.lock() = Some(handle);
    }

    pub fn get_stats(&self) -> PipelineStats {
        PipelineStats {
            accepted: self.accepted.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }

    pub fn is_running(&self) -> bool {
        self.task_handle
            .lock()
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }
}

/// Normalize a raw tick against the cached previous quote
///
/// Returns `None` when the tick is a no-op (price unchanged) or invalid
/// (non-positive price). Change and high/low roll against the previous quote;
/// a source change (mode switch) starts a fresh session, resetting the
/// high/low range and accepting the new timeline's timestamp.
pub fn normalize(raw: &RawTick, previous: Option<&Quote>, default_currency: &str) -> Option<Quote> {
    if raw.price <= Decimal::ZERO {
        return None;
    }

    let same_session = previous.map(|p| p.source == raw.source).unwrap_or(false);

    if let Some(prev) = previous {
        if prev.price == raw.price {
            return None;
        }
    }

    let (change, change_percent) = match previous {
        Some(prev) if same_session => {
            let change = raw.price - prev.price;
            let percent = (change / prev.price * Decimal::from(100)).round_dp(4);
            (change, percent)
        }
        _ => (Decimal::ZERO, Decimal::ZERO),
    };

    let (high, low) = match previous {
        Some(prev) if same_session => (prev.high.max(raw.price), prev.low.min(raw.price)),
        _ => (raw.price, raw.price),
    };

    // Timestamps are monotone within one source session; a switch may reset
    let timestamp = match previous {
        Some(prev) if same_session => raw.timestamp.max(prev.timestamp),
        _ => raw.timestamp,
    };

    let currency = raw
        .currency
        .clone()
        .or_else(|| previous.map(|p| p.currency.clone()))
        .unwrap_or_else(|| default_currency.to_string());

    Some(Quote {
        symbol: raw.ticker.clone(),
        price: raw.price,
        change,
        change_percent,
        high,
        low,
        volume: raw.volume.unwrap_or(Decimal::ZERO),
        market_state: raw.market_state.unwrap_or(MarketState::Regular),
        currency,
        timestamp,
        source: raw.source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QuoteSource;
    use crate::websocket::{topics, WsMessage};
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;

    fn tick(symbol: &str, price: Decimal) -> RawTick {
        RawTick::simulated(symbol, price, Utc::now())
    }

    #[test]
    fn test_normalize_first_tick() {
        let raw = tick("AAPL", dec!(175.00));
        let quote = normalize(&raw, None, "USD").unwrap();

        assert_eq!(quote.price, dec!(175.00));
        assert_eq!(quote.change, dec!(0));
        assert_eq!(quote.high, dec!(175.00));
        assert_eq!(quote.low, dec!(175.00));
        assert_eq!(quote.currency, "USD");
    }

    #[test]
    fn test_normalize_drops_unchanged_price() {
        let raw = tick("AAPL", dec!(175.00));
        let prev = normalize(&raw, None, "USD").unwrap();

        assert!(normalize(&tick("AAPL", dec!(175.00)), Some(&prev), "USD").is_none());
    }

    #[test]
    fn test_normalize_computes_change_and_range() {
        let prev = normalize(&tick("AAPL", dec!(175.00)), None, "USD").unwrap();
        let quote = normalize(&tick("AAPL", dec!(175.20)), Some(&prev), "USD").unwrap();

        assert_eq!(quote.change, dec!(0.20));
        assert_eq!(quote.change_percent, dec!(0.1143));
        assert_eq!(quote.high, dec!(175.20));
        assert_eq!(quote.low, dec!(175.00));

        let quote = normalize(&tick("AAPL", dec!(174.50)), Some(&quote), "USD").unwrap();
        assert_eq!(quote.high, dec!(175.20));
        assert_eq!(quote.low, dec!(174.50));
    }

    #[test]
    fn test_normalize_rejects_non_positive_price() {
        assert!(normalize(&tick("AAPL", dec!(0)), None, "USD").is_none());
        assert!(normalize(&tick("AAPL", dec!(-1)), None, "USD").is_none());
    }

    #[test]
    fn test_timestamp_is_monotone_within_a_session() {
        let now = Utc::now();
        let mut first = tick("AAPL", dec!(175.00));
        first.timestamp = now;
        let prev = normalize(&first, None, "USD").unwrap();

        let mut stale = tick("AAPL", dec!(175.10));
        stale.timestamp = now - Duration::seconds(5);
        let quote = normalize(&stale, Some(&prev), "USD").unwrap();
        assert_eq!(quote.timestamp, now);
    }

    #[test]
    fn test_source_switch_resets_session_range() {
        let mut live = tick("AAPL", dec!(175.00));
        live.source = QuoteSource::Live;
        let prev = normalize(&live, None, "USD").unwrap();

        // A simulated tick after a live session starts a fresh range
        let old = Utc::now() - Duration::days(365);
        let mut sim = tick("AAPL", dec!(120.00));
        sim.timestamp = old;
        let quote = normalize(&sim, Some(&prev), "USD").unwrap();

        assert_eq!(quote.change, dec!(0));
        assert_eq!(quote.high, dec!(120.00));
        assert_eq!(quote.low, dec!(120.00));
        assert_eq!(quote.timestamp, old);
    }

    #[tokio::test]
    async fn test_pipeline_end_to_end() {
        let cache = QuoteCache::new();
        let broadcaster = Broadcaster::new();
        let (persist_tx, mut persist_rx) = mpsc::unbounded_channel();

        let (pipeline, tick_tx) = QuotePipeline::new(
            cache.clone(),
            broadcaster.clone(),
            Some(persist_tx),
            "USD".to_string(),
        );
        let mut ws_rx = broadcaster.subscribe(topics::prices());
        pipeline.start();

        // Prime the cache at 175.00, then tick 175.20
        tick_tx.send(vec![tick("AAPL", dec!(175.00))]).unwrap();
        tick_tx.send(vec![tick("AAPL", dec!(175.20))]).unwrap();

        // First broadcast: the priming quote
        let _ = ws_rx.recv().await.unwrap();
        let WsMessage::PriceUpdate { quotes } = ws_rx.recv().await.unwrap() else {
            panic!("expected priceUpdate");
        };
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].symbol, "AAPL");
        assert_eq!(quotes[0].price, dec!(175.20));
        assert_eq!(quotes[0].source, QuoteSource::Simulated);

        // Cache advanced to the accepted value
        assert_eq!(cache.last_price("AAPL"), Some(dec!(175.20)));

        // Persistence saw the same two batches, once each
        let first = persist_rx.recv().await.unwrap();
        assert_eq!(first[0].price, dec!(175.00));
        let second = persist_rx.recv().await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].price, dec!(175.20));
    }

    #[tokio::test]
    async fn test_pipeline_dedup_suppresses_second_broadcast() {
        let cache = QuoteCache::new();
        let broadcaster = Broadcaster::new();
        let (pipeline, tick_tx) =
            QuotePipeline::new(cache, broadcaster.clone(), None, "USD".to_string());
        let mut ws_rx = broadcaster.subscribe(topics::prices());
        pipeline.start();

        tick_tx.send(vec![tick("TCS.NS", dec!(3800))]).unwrap();
        tick_tx.send(vec![tick("TCS.NS", dec!(3800))]).unwrap();
        tick_tx.send(vec![tick("TCS.NS", dec!(3801))]).unwrap();

        let WsMessage::PriceUpdate { quotes } = ws_rx.recv().await.unwrap() else {
            panic!("expected priceUpdate");
        };
        assert_eq!(quotes[0].price, dec!(3800));

        // The duplicate round produced no event; the next one is 3801
        let WsMessage::PriceUpdate { quotes } = ws_rx.recv().await.unwrap() else {
            panic!("expected priceUpdate");
        };
        assert_eq!(quotes[0].price, dec!(3801));

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let stats = pipeline.get_stats();
        assert_eq!(stats.accepted, 2);
        assert_eq!(stats.dropped, 1);
    }

    #[tokio::test]
    async fn test_pipeline_is_running() {
        let (pipeline, _tick_tx) = QuotePipeline::new(
            QuoteCache::new(),
            Broadcaster::new(),
            None,
            "USD".to_string(),
        );
        assert!(!pipeline.is_running());
        pipeline.start();
        assert!(pipeline.is_running());
    }
}
