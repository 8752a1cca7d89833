use std::sync::Arc;
use tokio::sync::mpsc;

use crate::models::Quote;

use super::store::QuoteStore;

/// Best-effort write-behind sink for accepted quotes
///
/// Consumes batches from the pipeline and writes each quote through the
/// store: upsert the current-state record, then append one history row. A
/// failed write is logged and skipped - live dissemination is the primary
/// contract, so persistence never blocks the broadcast path or stops the
/// scheduler.
pub struct PersistenceSink {
    store: Arc<dyn QuoteStore>,
}

impl PersistenceSink {
    pub fn new(store: Arc<dyn QuoteStore>) -> Self {
        Self { store }
    }

    /// Start the persistence background task
    ///
    /// Returns a channel sender for submitting accepted quote batches
    pub fn start(self) -> mpsc::UnboundedSender<Vec<Quote>> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Vec<Quote>>();

        tokio::spawn(async move {
            while let Some(batch) = rx.recv().await {
                for quote in &batch {
                    if let Err(e) = self.store.upsert_current(quote) {
                        tracing::error!("Failed to upsert {}: {}", quote.symbol, e);
                        continue;
                    }
                    if let Err(e) = self.store.append_history(quote) {
                        tracing::error!("Failed to append history for {}: {}", quote.symbol, e);
                    }
                }
            }

            tracing::warn!("Persistence sink channel closed");
        });

        tx
    }
}
