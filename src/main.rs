use quote_feed_engine::persistence::{DieselQuoteStore, PersistenceSink, QuoteStore, SymbolStore};
use quote_feed_engine::websocket::WsState;
use quote_feed_engine::{
    create_router, Broadcaster, EngineConfig, EngineState, QuoteCache, QuotePipeline,
    SimulationController, SimulationMode,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Load environment variables from .env file (if present)
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quote_feed_engine=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = EngineConfig::from_env();

    // Shared quote cache and WebSocket broadcaster
    let cache = QuoteCache::new();
    let broadcaster = Broadcaster::new();

    // Initialize database (optional - only if DATABASE_URL is set)
    let store = initialize_database().await;

    // Registered symbol set: from the store when available, else configuration
    let symbols = resolve_symbols(store.as_deref(), &config);
    tracing::info!("📈 Tracking {} symbols", symbols.len());

    // Warm the cache with the persisted current-state records
    if let Some(store) = &store {
        match store.load_current() {
            Ok(quotes) => {
                let count = quotes.len();
                for quote in quotes {
                    cache.insert(quote);
                }
                if count > 0 {
                    tracing::info!("Warmed quote cache with {} persisted quotes", count);
                }
            }
            Err(e) => {
                tracing::warn!("Could not warm quote cache: {}", e);
            }
        }
    }

    // Best-effort persistence sink
    let persistence_tx = store.clone().map(|store| {
        let store: Arc<dyn QuoteStore> = store;
        PersistenceSink::new(store).start()
    });

    // Dedup/normalization pipeline: every tick source feeds tick_tx
    let (pipeline, tick_tx) = QuotePipeline::new(
        cache.clone(),
        broadcaster.clone(),
        persistence_tx,
        config.default_currency.clone(),
    );
    pipeline.start();
    let pipeline = Arc::new(pipeline);

    tracing::info!("📡 Quote pipeline started");

    // Simulation controller owns the active tick source
    let controller =
        SimulationController::new(config.clone(), symbols, cache.clone(), tick_tx);

    // Initial source: the live feed when configured, otherwise GBM simulation
    if config.feed.amqp_uri.is_some() {
        if let Err(e) = controller.start_live().await {
            tracing::error!("Failed to start live feed: {}; falling back to GBM", e);
            start_gbm(&controller).await;
        }
    } else {
        tracing::info!("No AMQP_URI configured; starting in GBM simulation mode");
        start_gbm(&controller).await;
    }

    // Cron jobs (only if database is enabled)
    if let Some(store) = &store {
        initialize_cron_scheduler(store.clone(), config.history_retention_days).await;
    }

    // Router with control plane and WebSocket support
    let ws_state = Arc::new(WsState {
        broadcaster: broadcaster.clone(),
        cache: cache.clone(),
    });
    let state = EngineState {
        controller,
        cache,
        pipeline,
    };
    let app = create_router(state, ws_state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await.unwrap();

    tracing::info!("🚀 Quote feed engine running on http://{}", config.bind_addr);
    tracing::info!("📊 Health check: http://{}/api/health", config.bind_addr);
    tracing::info!("📚 Swagger UI: http://{}/swagger-ui", config.bind_addr);
    tracing::info!("🔌 WebSocket: ws://{}/ws", config.bind_addr);
    tracing::info!("🔧 Simulation control: http://{}/api/simulation/*", config.bind_addr);

    axum::serve(listener, app).await.unwrap();
}

async fn start_gbm(controller: &SimulationController) {
    if let Err(e) = controller.set_mode(SimulationMode::Gbm).await {
        tracing::error!("Failed to start GBM simulation: {}", e);
    }
}

/// Initialize the database connection pool and quote store
async fn initialize_database() -> Option<Arc<DieselQuoteStore>> {
    use quote_feed_engine::database::establish_connection_pool;

    let database_url = std::env::var("DATABASE_URL").ok()?;

    let pool_size = std::env::var("DB_POOL_MAX_SIZE")
        .ok()
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or(10);

    tracing::info!("🗄️  Initializing PostgreSQL connection pool...");

    match establish_connection_pool(&database_url, pool_size) {
        Ok(handle) => {
            tracing::info!("✅ Database connection established");
            Some(Arc::new(DieselQuoteStore::new(move || handle.get_conn())))
        }
        Err(e) => {
            tracing::error!("❌ Failed to establish database connection: {}", e);
            tracing::warn!("⚠️  Engine will run without persistence");
            None
        }
    }
}

/// Resolve the tracked symbol universe
fn resolve_symbols(store: Option<&DieselQuoteStore>, config: &EngineConfig) -> Vec<String> {
    if let Some(store) = store {
        match store.list_all() {
            Ok(symbols) if !symbols.is_empty() => return symbols,
            Ok(_) => {
                tracing::warn!("Symbol registry is empty; using configured fallback list");
            }
            Err(e) => {
                tracing::error!("Failed to list symbols: {}; using configured fallback list", e);
            }
        }
    }
    config.fallback_symbols.clone()
}

/// Initialize cron scheduler for periodic jobs
async fn initialize_cron_scheduler(store: Arc<DieselQuoteStore>, retention_days: i64) {
    use quote_feed_engine::jobs::create_history_retention_job;
    use tokio_cron_scheduler::JobScheduler;

    tracing::info!("⏰ Initializing cron scheduler...");

    let scheduler = match JobScheduler::new().await {
        Ok(scheduler) => scheduler,
        Err(e) => {
            tracing::error!("❌ Failed to create cron scheduler: {}", e);
            return;
        }
    };

    let store: Arc<dyn QuoteStore> = store;
    if let Err(e) = create_history_retention_job(store, &scheduler, retention_days).await {
        tracing::error!("❌ Failed to register history retention job: {}", e);
        return;
    }

    if let Err(e) = scheduler.start().await {
        tracing::error!("❌ Failed to start cron scheduler: {}", e);
        return;
    }

    tracing::info!("✅ Cron scheduler started");
    tracing::info!("   • History retention: hourly");

    // Keep scheduler alive (it will run in the background)
    std::mem::forget(scheduler);
}
