use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;

use crate::models::RawTick;
use crate::sources::live::LiveAdapter;

use super::backoff::{BackoffPolicy, ConnectionState, RetrySchedule};

/// Lifecycle notifications emitted by the supervisor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedEvent {
    /// A session reached CONNECTED (attempt counter reset)
    Connected,
    /// The reconnect budget is spent; the feed is down for good
    Exhausted { attempts: u32 },
}

/// Supervises the singleton live-feed connection
///
/// Owns connect/subscribe/reconnect for the live adapter: on session failure
/// it transitions to BACKOFF and retries after `min(base * 2^attempt, cap)`,
/// resetting the attempt counter on every successful connect. Once the
/// attempt budget is exhausted it stops retrying and emits
/// `FeedEvent::Exhausted` so the controller can degrade gracefully.
pub struct ConnectionSupervisor {
    adapter: Arc<LiveAdapter>,
    policy: BackoffPolicy,
    tick_tx: mpsc::UnboundedSender<Vec<RawTick>>,
    state: Arc<parking_lot::RwLock<ConnectionState>>,
    attempts: Arc<AtomicU32>,
    shutdown: Arc<AtomicBool>,
    task_handle: RwLock<Option<JoinHandle<()>>>,
    events_tx: mpsc::UnboundedSender<FeedEvent>,
}

impl ConnectionSupervisor {
    /// Create a supervisor; lifecycle events go to `events_tx`
    pub fn new(
        adapter: LiveAdapter,
        policy: BackoffPolicy,
        tick_tx: mpsc::UnboundedSender<Vec<RawTick>>,
        events_tx: mpsc::UnboundedSender<FeedEvent>,
    ) -> Self {
        Self {
            adapter: Arc::new(adapter),
            policy,
            tick_tx,
            state: Arc::new(parking_lot::RwLock::new(ConnectionState::Disconnected)),
            attempts: Arc::new(AtomicU32::new(0)),
            shutdown: Arc::new(AtomicBool::new(false)),
            task_handle: RwLock::new(None),
            events_tx,
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Consecutive failures so far in the current reconnect cycle
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::Relaxed)
    }

    /// Spawn the connect/consume/reconnect loop
    pub async fn start(&self) {
        let adapter = Arc::clone(&self.adapter);
        let tick_tx = self.tick_tx.clone();
        let state = Arc::clone(&self.state);
        let attempts = Arc::clone(&self.attempts);
        let shutdown = Arc::clone(&self.shutdown);
        let events_tx = self.events_tx.clone();
        let policy = self.policy;

        let handle = tokio::spawn(async move {
            let mut schedule = RetrySchedule::new(policy);

            loop {
                if shutdown.load(Ordering::Acquire) {
                    break;
                }

                *state.write() = ConnectionState::Connecting;

                match adapter.connect().await {
                    Ok(session) => {
                        *state.write() = ConnectionState::Connected;
                        schedule.record_success();
                        attempts.store(0, Ordering::Relaxed);
                        let _ = events_tx.send(FeedEvent::Connected);
                        tracing::info!("Live feed connected");

                        if let Err(e) = session.consume(&tick_tx).await {
                            tracing::warn!("Live feed session error: {}", e);
                        } else {
                            tracing::warn!("Live feed disconnected by server");
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Live feed connect failed: {}", e);
                    }
                }

                if shutdown.load(Ordering::Acquire) {
                    break;
                }

                match schedule.record_failure() {
                    Some(delay) => {
                        *state.write() = ConnectionState::Backoff;
                        attempts.store(schedule.attempt(), Ordering::Relaxed);
                        tracing::info!(
                            "Reconnecting in {:?} (attempt {})",
                            delay,
                            schedule.attempt()
                        );
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        *state.write() = ConnectionState::Disconnected;
                        let attempts_made = schedule.attempt();
                        tracing::error!(
                            "Live feed unavailable after {} reconnect attempts; giving up",
                            attempts_made
                        );
                        let _ = events_tx.send(FeedEvent::Exhausted {
                            attempts: attempts_made,
                        });
                        break;
                    }
                }
            }

            *state.write() = ConnectionState::Disconnected;
        });

        *self.task_handle.write().await = Some(handle);
    }

    /// Tear down the connection and any pending reconnect
    ///
    /// Idempotent and safe from any state, including mid-backoff: the run
    /// loop task is aborted (which also cancels a pending reconnect sleep)
    /// and awaited before the state is settled.
    pub async fn teardown(&self) {
        self.shutdown.store(true, Ordering::Release);

        if let Some(handle) = self.task_handle.write().await.take() {
            handle.abort();
            let _ = handle.await;
        }

        *self.state.write() = ConnectionState::Disconnected;
        tracing::info!("Live feed supervisor torn down");
    }
}
