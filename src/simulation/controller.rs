use chrono::{DateTime, Utc};
use rust_decimal::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::interval;

use crate::cache::QuoteCache;
use crate::config::EngineConfig;
use crate::connection::{BackoffPolicy, ConnectionSupervisor, FeedEvent};
use crate::errors::EngineError;
use crate::models::{ActiveSourceKind, RawTick, SimulationMode, SimulationStatus};
use crate::sources::{GbmGenerator, HistoricalDataset, LiveAdapter, ReplayEngine, SimEngine};

/// One running simulation session: the engine plus its scheduler task
///
/// The engine mutex is shared with the scheduler; locking it sequences
/// control operations (jump) with tick rounds, so neither ever observes a
/// half-advanced round.
struct SimSession {
    mode: SimulationMode,
    engine: Arc<parking_lot::Mutex<SimEngine>>,
    task: JoinHandle<()>,
}

/// The tick source currently wired into the pipeline
enum ActiveSource {
    Idle,
    Live(Arc<ConnectionSupervisor>),
    Sim(SimSession),
}

struct ControllerInner {
    active: ActiveSource,
    /// Historical dataset, loaded lazily on first HISTORICAL entry
    dataset: Option<Arc<HistoricalDataset>>,
}

/// Arbitrates which tick source feeds the pipeline
///
/// Exactly one source is active at any instant: the live supervisor or one
/// simulation engine. Control calls (`set_mode`, `jump_to`) serialize through
/// a fair async mutex, so they apply strictly in submission order; each
/// switch disposes the previous source synchronously - the scheduler task is
/// aborted and awaited before the new engine is built, so no stale tick can
/// be emitted after the switch is observed.
pub struct SimulationController {
    config: EngineConfig,
    symbols: Vec<String>,
    cache: QuoteCache,
    tick_tx: mpsc::UnboundedSender<Vec<RawTick>>,
    inner: Mutex<ControllerInner>,
    feed_events_tx: mpsc::UnboundedSender<FeedEvent>,
    feed_exhausted: AtomicBool,
}

impl SimulationController {
    /// Create the controller and spawn its feed-event listener
    pub fn new(
        config: EngineConfig,
        symbols: Vec<String>,
        cache: QuoteCache,
        tick_tx: mpsc::UnboundedSender<Vec<RawTick>>,
    ) -> Arc<Self> {
        let (feed_events_tx, mut feed_events_rx) = mpsc::unbounded_channel();

        let controller = Arc::new(Self {
            config,
            symbols,
            cache,
            tick_tx,
            inner: Mutex::new(ControllerInner {
                active: ActiveSource::Idle,
                dataset: None,
            }),
            feed_events_tx,
            feed_exhausted: AtomicBool::new(false),
        });

        // Long-lived listener: degrades gracefully when the feed gives up
        let listener = Arc::clone(&controller);
        tokio::spawn(async move {
            while let Some(event) = feed_events_rx.recv().await {
                listener.on_feed_event(event).await;
            }
        });

        controller
    }

    /// Switch the active tick source to the requested simulation mode
    ///
    /// A request for the already-active mode is a no-op. Otherwise the
    /// current generator/cursor is stopped and fully dropped before the new
    /// source starts emitting.
    pub async fn set_mode(&self, mode: SimulationMode) -> Result<SimulationMode, EngineError> {
        let mut inner = self.inner.lock().await;
        self.switch_to(&mut inner, mode, None).await?;
        Ok(mode)
    }

    /// Reposition the replay to `target`, entering HISTORICAL mode if needed
    pub async fn jump_to(&self, target: DateTime<Utc>) -> Result<SimulationMode, EngineError> {
        let mut inner = self.inner.lock().await;

        let already_historical = matches!(
            &inner.active,
            ActiveSource::Sim(session) if session.mode == SimulationMode::Historical
        );

        if already_historical {
            if let ActiveSource::Sim(session) = &inner.active {
                // Locking the engine waits out any in-flight tick round
                let mut engine = session.engine.lock();
                if let SimEngine::Replay(replay) = &mut *engine {
                    replay.jump_to(target);
                }
            }
        } else {
            // Fresh session positioned at the target before its first tick
            self.switch_to(&mut inner, SimulationMode::Historical, Some(target))
                .await?;
        }

        Ok(SimulationMode::Historical)
    }

    /// Hand the pipeline to the live feed supervisor
    pub async fn start_live(&self) -> Result<(), EngineError> {
        if self.config.feed.amqp_uri.is_none() {
            return Err(EngineError::Upstream(
                "AMQP_URI is not configured".to_string(),
            ));
        }

        let mut inner = self.inner.lock().await;
        dispose_active(&mut inner.active).await;
        self.feed_exhausted.store(false, Ordering::Relaxed);

        let adapter = LiveAdapter::new(self.config.feed.clone(), self.symbols.clone());
        let policy = BackoffPolicy::new(
            std::time::Duration::from_millis(self.config.feed.reconnect_base_ms),
            std::time::Duration::from_millis(self.config.feed.reconnect_cap_ms),
            self.config.feed.max_reconnect_attempts,
        );
        let supervisor = Arc::new(ConnectionSupervisor::new(
            adapter,
            policy,
            self.tick_tx.clone(),
            self.feed_events_tx.clone(),
        ));
        supervisor.start().await;

        inner.active = ActiveSource::Live(supervisor);
        tracing::info!("Live feed is now the active tick source");
        Ok(())
    }

    /// Current arbitration snapshot
    pub async fn status(&self) -> SimulationStatus {
        let inner = self.inner.lock().await;

        let (active_source, mode, connection) = match &inner.active {
            ActiveSource::Idle => (ActiveSourceKind::Idle, None, None),
            ActiveSource::Live(supervisor) => (
                ActiveSourceKind::Live,
                None,
                Some(supervisor.state()),
            ),
            ActiveSource::Sim(session) => {
                (ActiveSourceKind::Simulated, Some(session.mode), None)
            }
        };

        SimulationStatus {
            active_source,
            mode,
            connection,
            feed_exhausted: self.feed_exhausted.load(Ordering::Relaxed),
            tick_interval_ms: self.config.tick_interval_ms,
            tracked_symbols: self.symbols.len(),
        }
    }

    /// React to a supervisor lifecycle event
    pub(crate) async fn on_feed_event(&self, event: FeedEvent) {
        match event {
            FeedEvent::Connected => {
                self.feed_exhausted.store(false, Ordering::Relaxed);
            }
            FeedEvent::Exhausted { attempts } => {
                self.feed_exhausted.store(true, Ordering::Relaxed);
                tracing::error!(
                    "Live feed declared down after {} attempts{}",
                    attempts,
                    if self.config.feed.fallback_to_simulation {
                        "; falling back to GBM simulation"
                    } else {
                        ""
                    }
                );

                if self.config.feed.fallback_to_simulation {
                    if let Err(e) = self.set_mode(SimulationMode::Gbm).await {
                        tracing::error!("GBM fallback failed: {}", e);
                    }
                }
            }
        }
    }

    /// Dispose the active source and start the requested simulation engine
    ///
    /// Caller holds the control mutex. No-op when the mode is already active.
    async fn switch_to(
        &self,
        inner: &mut ControllerInner,
        mode: SimulationMode,
        jump_target: Option<DateTime<Utc>>,
    ) -> Result<(), EngineError> {
        if let ActiveSource::Sim(session) = &inner.active {
            if session.mode == mode {
                tracing::debug!("Simulation mode {} already active", mode);
                return Ok(());
            }
        }

        // The only fallible step happens first, so a failure leaves the
        // active source untouched
        let dataset = match mode {
            SimulationMode::Historical => {
                if inner.dataset.is_none() {
                    inner.dataset = Some(Arc::new(HistoricalDataset::load(
                        &self.config.replay.dataset_path,
                    )?));
                }
                inner.dataset.clone()
            }
            SimulationMode::Gbm => None,
        };

        dispose_active(&mut inner.active).await;

        // Fresh state per session, built only after the old source is gone
        // so GBM seeds see the final cached prices
        let engine = match mode {
            SimulationMode::Gbm => {
                let seeds = self
                    .symbols
                    .iter()
                    .map(|symbol| {
                        let price = self
                            .cache
                            .last_price(symbol)
                            .and_then(|p| p.to_f64())
                            .unwrap_or(self.config.gbm.initial_price);
                        (symbol.clone(), price)
                    })
                    .collect();
                SimEngine::Gbm(GbmGenerator::new(
                    seeds,
                    &self.config.gbm,
                    self.config.dt_years(),
                ))
            }
            SimulationMode::Historical => {
                let mut replay = ReplayEngine::new(
                    dataset.expect("dataset fetched above"),
                    self.config.replay.replay_loop,
                );
                if let Some(target) = jump_target {
                    replay.jump_to(target);
                }
                SimEngine::Replay(replay)
            }
        };

        let engine = Arc::new(parking_lot::Mutex::new(engine));
        let task = spawn_scheduler(
            Arc::clone(&engine),
            self.tick_tx.clone(),
            self.config.tick_interval(),
        );

        inner.active = ActiveSource::Sim(SimSession { mode, engine, task });
        tracing::info!("Simulation mode switched to {}", mode);
        Ok(())
    }
}

/// Stop and fully release the active source before a new one starts
///
/// Synchronous from the caller's point of view: the scheduler task is
/// aborted and awaited (a live supervisor torn down), and the engine state
/// drops with the session, so the old source cannot emit again.
async fn dispose_active(active: &mut ActiveSource) {
    match std::mem::replace(active, ActiveSource::Idle) {
        ActiveSource::Idle => {}
        ActiveSource::Live(supervisor) => {
            supervisor.teardown().await;
        }
        ActiveSource::Sim(session) => {
            session.task.abort();
            let _ = session.task.await;
            tracing::debug!("Disposed {} simulation session", session.mode);
        }
    }
}

/// Periodic scheduler driving the active simulation engine
fn spawn_scheduler(
    engine: Arc<parking_lot::Mutex<SimEngine>>,
    tick_tx: mpsc::UnboundedSender<Vec<RawTick>>,
    period: std::time::Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        loop {
            ticker.tick().await;

            let batch = engine.lock().next_round();
            if batch.is_empty() {
                continue;
            }
            if tick_tx.send(batch).is_err() {
                tracing::warn!("Pipeline channel closed; stopping scheduler");
                break;
            }
        }
    })
}
