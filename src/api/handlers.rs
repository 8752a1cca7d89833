use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::cache::QuoteCache;
use crate::errors::EngineError;
use crate::models::{
    JumpRequest, JumpResponse, Quote, SetModeRequest, SetModeResponse, SimulationMode,
    SimulationStatus,
};
use crate::pipeline::QuotePipeline;
use crate::simulation::SimulationController;

use super::responses::*;

/// Shared application state for the control plane
#[derive(Clone)]
pub struct EngineState {
    pub controller: Arc<SimulationController>,
    pub cache: QuoteCache,
    pub pipeline: Arc<QuotePipeline>,
}

/// Convert EngineError to HTTP response
impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            EngineError::InvalidInput(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            EngineError::FeedUnavailable { .. } => {
                (StatusCode::SERVICE_UNAVAILABLE, self.to_string())
            }
            EngineError::Dataset(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
            EngineError::Persistence(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
            EngineError::Upstream(_) => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
        };

        let body = Json(ErrorResponse {
            error: status.to_string(),
            message: error_message,
        });

        (status, body).into_response()
    }
}

/// Switch the simulation mode
#[utoipa::path(
    post,
    path = "/api/simulation/mode",
    tag = "Simulation",
    request_body = SetModeRequest,
    responses(
        (status = 200, description = "Mode switched", body = SetModeResponse),
        (status = 400, description = "Unrecognized mode value", body = ErrorResponse)
    )
)]
pub async fn set_simulation_mode(
    State(state): State<EngineState>,
    Json(request): Json<SetModeRequest>,
) -> Result<Json<SetModeResponse>, EngineError> {
    let mode: SimulationMode = request
        .mode
        .parse()
        .map_err(|_| EngineError::InvalidInput(format!("Unrecognized mode: {}", request.mode)))?;

    let mode = state.controller.set_mode(mode).await?;

    Ok(Json(SetModeResponse {
        status: "ok".to_string(),
        mode,
    }))
}

/// Jump the historical replay to a timestamp
///
/// Implicitly enters HISTORICAL mode when another source is active.
#[utoipa::path(
    post,
    path = "/api/simulation/jump",
    tag = "Simulation",
    request_body = JumpRequest,
    responses(
        (status = 200, description = "Replay repositioned", body = JumpResponse),
        (status = 400, description = "Unparseable timestamp", body = ErrorResponse)
    )
)]
pub async fn jump_simulation(
    State(state): State<EngineState>,
    Json(request): Json<JumpRequest>,
) -> Result<Json<JumpResponse>, EngineError> {
    let target: DateTime<Utc> = DateTime::parse_from_rfc3339(&request.date)
        .map_err(|_| EngineError::InvalidInput(format!("Unparseable date: {}", request.date)))?
        .with_timezone(&Utc);

    let mode = state.controller.jump_to(target).await?;

    Ok(Json(JumpResponse {
        status: "ok".to_string(),
        mode,
        date: target.to_rfc3339(),
    }))
}

/// Get the current source arbitration status
#[utoipa::path(
    get,
    path = "/api/simulation/status",
    tag = "Simulation",
    responses(
        (status = 200, description = "Current simulation status", body = SimulationStatus)
    )
)]
pub async fn get_simulation_status(State(state): State<EngineState>) -> Json<SimulationStatus> {
    Json(state.controller.status().await)
}

/// Get all cached quotes
#[utoipa::path(
    get,
    path = "/api/quotes",
    tag = "Quotes",
    responses(
        (status = 200, description = "Latest known quote per tracked symbol", body = [Quote])
    )
)]
pub async fn get_quotes(State(state): State<EngineState>) -> Json<Vec<Quote>> {
    Json(state.cache.snapshot())
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service health", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<EngineState>) -> Json<HealthResponse> {
    let status = state.controller.status().await;

    let health = if status.feed_exhausted {
        HealthState::Degraded
    } else {
        HealthState::Healthy
    };

    Json(HealthResponse {
        status: health,
        active_source: status.active_source,
        mode: status.mode,
        connection: status.connection,
        feed_exhausted: status.feed_exhausted,
        pipeline: state.pipeline.get_stats(),
        cached_quotes: state.cache.len(),
        timestamp: Utc::now().to_rfc3339(),
    })
}
