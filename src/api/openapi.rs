use utoipa::OpenApi;

use crate::api::handlers;
use crate::api::responses::{ErrorResponse, HealthResponse, HealthState};
use crate::connection::ConnectionState;
use crate::models::{
    ActiveSourceKind, JumpRequest, JumpResponse, MarketState, Quote, QuoteSource, SetModeRequest,
    SetModeResponse, SimulationMode, SimulationStatus,
};
use crate::pipeline::PipelineStats;

/// OpenAPI specification for the control plane
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Quote Feed Engine",
        version = "1.0.0",
        description = "Market data distribution and simulation control engine",
        license(
            name = "MIT"
        )
    ),
    paths(
        handlers::health_check,
        handlers::set_simulation_mode,
        handlers::jump_simulation,
        handlers::get_simulation_status,
        handlers::get_quotes,
    ),
    components(
        schemas(
            Quote,
            QuoteSource,
            MarketState,
            SimulationMode,
            SimulationStatus,
            ActiveSourceKind,
            ConnectionState,
            SetModeRequest,
            SetModeResponse,
            JumpRequest,
            JumpResponse,
            HealthResponse,
            HealthState,
            PipelineStats,
            ErrorResponse,
        )
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Simulation", description = "Simulation control endpoints"),
        (name = "Quotes", description = "Cached quote endpoints"),
    )
)]
pub struct ApiDoc;
