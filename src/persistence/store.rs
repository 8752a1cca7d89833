use chrono::{DateTime, Utc};
use diesel::prelude::*;
use std::sync::Arc;

use crate::database::schema::{stock_price_history, stocks};
use crate::database::{DatabaseError, NewHistoryRow, PgPooledConnection, StockRecord, StockUpsert};
use crate::models::Quote;

/// Quote store trait - the persistence contract of the pipeline
///
/// One upsert of the symbol's current-state record plus one appended history
/// row per accepted quote. History is best-effort durability; the broadcast
/// path never waits on it.
#[async_trait::async_trait]
pub trait QuoteStore: Send + Sync {
    /// Upsert the current-state record for `quote.symbol`
    fn upsert_current(&self, quote: &Quote) -> Result<(), DatabaseError>;

    /// Append one history row
    fn append_history(&self, quote: &Quote) -> Result<(), DatabaseError>;

    /// Load every persisted current-state record (used to warm the cache)
    fn load_current(&self) -> Result<Vec<Quote>, DatabaseError>;

    /// Delete history rows older than `cutoff`, returning the count removed
    fn prune_history_before(&self, cutoff: DateTime<Utc>) -> Result<usize, DatabaseError>;
}

/// Symbol registry trait - the engine obtains its tracked universe here once
/// at startup and never decides membership itself
#[async_trait::async_trait]
pub trait SymbolStore: Send + Sync {
    fn list_all(&self) -> Result<Vec<String>, DatabaseError>;
}

/// Diesel-backed implementation over the `stocks` / `stock_price_history` tables
pub struct DieselQuoteStore {
    get_conn: Arc<dyn Fn() -> Result<PgPooledConnection, DatabaseError> + Send + Sync>,
}

impl DieselQuoteStore {
    /// Create a new store with a connection provider
    pub fn new<F>(get_conn: F) -> Self
    where
        F: Fn() -> Result<PgPooledConnection, DatabaseError> + Send + Sync + 'static,
    {
        Self {
            get_conn: Arc::new(get_conn),
        }
    }
}

#[async_trait::async_trait]
impl QuoteStore for DieselQuoteStore {
    fn upsert_current(&self, quote: &Quote) -> Result<(), DatabaseError> {
        let mut conn = (self.get_conn)()?;
        let row = StockUpsert::from(quote);

        diesel::insert_into(stocks::table)
            .values(&row)
            .on_conflict(stocks::symbol)
            .do_update()
            .set(&row)
            .execute(&mut conn)?;

        Ok(())
    }

    fn append_history(&self, quote: &Quote) -> Result<(), DatabaseError> {
        let mut conn = (self.get_conn)()?;

        diesel::insert_into(stock_price_history::table)
            .values(NewHistoryRow::from(quote))
            .execute(&mut conn)?;

        Ok(())
    }

    fn load_current(&self) -> Result<Vec<Quote>, DatabaseError> {
        let mut conn = (self.get_conn)()?;

        let rows = stocks::table
            .select(StockRecord::as_select())
            .order(stocks::symbol.asc())
            .load::<StockRecord>(&mut conn)?;

        Ok(rows.into_iter().map(StockRecord::into_quote).collect())
    }

    fn prune_history_before(&self, cutoff: DateTime<Utc>) -> Result<usize, DatabaseError> {
        let mut conn = (self.get_conn)()?;

        let deleted = diesel::delete(stock_price_history::table)
            .filter(stock_price_history::recorded_at.lt(cutoff))
            .execute(&mut conn)?;

        tracing::info!("Pruned {} history rows before {}", deleted, cutoff);

        Ok(deleted)
    }
}

#[async_trait::async_trait]
impl SymbolStore for DieselQuoteStore {
    fn list_all(&self) -> Result<Vec<String>, DatabaseError> {
        let mut conn = (self.get_conn)()?;

        stocks::table
            .select(stocks::symbol)
            .order(stocks::symbol.asc())
            .load::<String>(&mut conn)
            .map_err(DatabaseError::from)
    }
}

#[cfg(test)]
mod tests {
    #[test]
    #[ignore]
    fn test_diesel_quote_store() {
        // Tests require actual database connection - skip in CI
    }
}
