use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::Arc;

use crate::models::Quote;

/// In-memory latest-known-quote store, keyed by symbol
///
/// Entries persist for the process lifetime and are reused across mode
/// switches (a new GBM session seeds from the last broadcast price). Writes
/// go through the dedup stage only; everything else reads. DashMap's
/// per-entry locking gives the per-symbol write serialization the pipeline
/// relies on.
#[derive(Clone, Default)]
pub struct QuoteCache {
    quotes: Arc<DashMap<String, Quote>>,
}

impl QuoteCache {
    pub fn new() -> Self {
        Self {
            quotes: Arc::new(DashMap::new()),
        }
    }

    /// Latest broadcast quote for a symbol, if any
    pub fn get(&self, symbol: &str) -> Option<Quote> {
        self.quotes.get(symbol).map(|entry| entry.clone())
    }

    /// Last broadcast price for a symbol — used to seed a fresh generator
    pub fn last_price(&self, symbol: &str) -> Option<Decimal> {
        self.quotes.get(symbol).map(|entry| entry.price)
    }

    /// Replace the entry for `quote.symbol`
    pub fn insert(&self, quote: Quote) {
        self.quotes.insert(quote.symbol.clone(), quote);
    }

    /// Snapshot of all cached quotes, sorted by symbol for stable output
    pub fn snapshot(&self) -> Vec<Quote> {
        let mut quotes: Vec<Quote> = self.quotes.iter().map(|entry| entry.clone()).collect();
        quotes.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        quotes
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MarketState, QuoteSource};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn quote(symbol: &str, price: Decimal) -> Quote {
        Quote {
            symbol: symbol.to_string(),
            price,
            change: dec!(0),
            change_percent: dec!(0),
            high: price,
            low: price,
            volume: dec!(0),
            market_state: MarketState::Regular,
            currency: "INR".to_string(),
            timestamp: Utc::now(),
            source: QuoteSource::Simulated,
        }
    }

    #[test]
    fn test_insert_and_get() {
        let cache = QuoteCache::new();
        assert!(cache.get("TCS.NS").is_none());

        cache.insert(quote("TCS.NS", dec!(3800.50)));
        assert_eq!(cache.last_price("TCS.NS"), Some(dec!(3800.50)));

        cache.insert(quote("TCS.NS", dec!(3801.00)));
        assert_eq!(cache.last_price("TCS.NS"), Some(dec!(3801.00)));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_snapshot_is_sorted() {
        let cache = QuoteCache::new();
        cache.insert(quote("TCS.NS", dec!(3800)));
        cache.insert(quote("HDFCBANK.NS", dec!(1650)));
        cache.insert(quote("RELIANCE.NS", dec!(2850)));

        let symbols: Vec<String> = cache.snapshot().into_iter().map(|q| q.symbol).collect();
        assert_eq!(symbols, vec!["HDFCBANK.NS", "RELIANCE.NS", "TCS.NS"]);
    }
}
