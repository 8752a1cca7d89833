use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::persistence::QuoteStore;

/// Create the history retention job
///
/// Runs hourly and deletes `stock_price_history` rows older than the
/// configured retention window. History is best-effort durability, so a
/// failed prune is logged and retried on the next run.
pub async fn create_history_retention_job(
    store: Arc<dyn QuoteStore>,
    scheduler: &JobScheduler,
    retention_days: i64,
) -> Result<(), Box<dyn std::error::Error>> {
    let job = Job::new_async("0 0 * * * *", move |_uuid, _lock| {
        let store = Arc::clone(&store);

        Box::pin(async move {
            let cutoff = retention_cutoff(Utc::now(), retention_days);
            tracing::debug!("History retention job triggered (cutoff {})", cutoff);

            match store.prune_history_before(cutoff) {
                Ok(deleted) if deleted > 0 => {
                    tracing::info!("Retention prune removed {} history rows", deleted);
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!("Retention prune failed: {}", e);
                }
            }
        })
    })?;

    scheduler.add(job).await?;

    tracing::info!(
        "History retention job registered ({}d window, hourly)",
        retention_days
    );

    Ok(())
}

/// Everything recorded before this instant is eligible for pruning
fn retention_cutoff(now: DateTime<Utc>, retention_days: i64) -> DateTime<Utc> {
    now - Duration::days(retention_days.max(1))
}
