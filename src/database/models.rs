use chrono::{DateTime, Utc};
use diesel::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{MarketState, Quote, QuoteSource};

/// Current-state row for a symbol, upserted on every accepted quote
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = crate::database::schema::stocks)]
pub struct StockRecord {
    pub symbol: String,
    pub name: Option<String>,
    pub sector: Option<String>,
    pub price: Decimal,
    pub change: Decimal,
    pub change_percent: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub volume: Decimal,
    pub market_state: String,
    pub currency: String,
    pub source: String,
    pub last_updated: DateTime<Utc>,
}

impl StockRecord {
    /// Rehydrate the canonical quote this row captured
    pub fn into_quote(self) -> Quote {
        Quote {
            symbol: self.symbol,
            price: self.price,
            change: self.change,
            change_percent: self.change_percent,
            high: self.high,
            low: self.low,
            volume: self.volume,
            market_state: match self.market_state.as_str() {
                "CLOSED" => MarketState::Closed,
                _ => MarketState::Regular,
            },
            currency: self.currency,
            timestamp: self.last_updated,
            source: match self.source.as_str() {
                "LIVE" => QuoteSource::Live,
                _ => QuoteSource::Simulated,
            },
        }
    }
}

/// Quote-derived columns written by the upsert
///
/// `name`/`sector` are administrative metadata and never touched here; the
/// symbol is the conflict target, excluded from the changeset by derive.
#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = crate::database::schema::stocks)]
pub struct StockUpsert {
    pub symbol: String,
    pub price: Decimal,
    pub change: Decimal,
    pub change_percent: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub volume: Decimal,
    pub market_state: String,
    pub currency: String,
    pub source: String,
    pub last_updated: DateTime<Utc>,
}

impl From<&Quote> for StockUpsert {
    fn from(quote: &Quote) -> Self {
        Self {
            symbol: quote.symbol.clone(),
            price: quote.price,
            change: quote.change,
            change_percent: quote.change_percent,
            high: quote.high,
            low: quote.low,
            volume: quote.volume,
            market_state: market_state_str(quote.market_state).to_string(),
            currency: quote.currency.clone(),
            source: source_str(quote.source).to_string(),
            last_updated: quote.timestamp,
        }
    }
}

/// Append-only history row
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::database::schema::stock_price_history)]
pub struct NewHistoryRow {
    pub symbol: String,
    pub price: Decimal,
    pub volume: Decimal,
    pub source: String,
    pub recorded_at: DateTime<Utc>,
}

impl From<&Quote> for NewHistoryRow {
    fn from(quote: &Quote) -> Self {
        Self {
            symbol: quote.symbol.clone(),
            price: quote.price,
            volume: quote.volume,
            source: source_str(quote.source).to_string(),
            recorded_at: quote.timestamp,
        }
    }
}

fn market_state_str(state: MarketState) -> &'static str {
    match state {
        MarketState::Regular => "REGULAR",
        MarketState::Closed => "CLOSED",
    }
}

fn source_str(source: QuoteSource) -> &'static str {
    match source {
        QuoteSource::Live => "LIVE",
        QuoteSource::Simulated => "SIMULATED",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_rows_from_quote() {
        let quote = Quote {
            symbol: "RELIANCE.NS".to_string(),
            price: dec!(2850.55),
            change: dec!(12.30),
            change_percent: dec!(0.43),
            high: dec!(2861.00),
            low: dec!(2830.00),
            volume: dec!(1000),
            market_state: MarketState::Regular,
            currency: "INR".to_string(),
            timestamp: Utc::now(),
            source: QuoteSource::Live,
        };

        let upsert = StockUpsert::from(&quote);
        assert_eq!(upsert.symbol, "RELIANCE.NS");
        assert_eq!(upsert.market_state, "REGULAR");
        assert_eq!(upsert.source, "LIVE");

        let row = NewHistoryRow::from(&quote);
        assert_eq!(row.price, dec!(2850.55));
        assert_eq!(row.recorded_at, quote.timestamp);
    }
}
