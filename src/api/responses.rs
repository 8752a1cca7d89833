use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::connection::ConnectionState;
use crate::models::{ActiveSourceKind, SimulationMode};
use crate::pipeline::PipelineStats;

/// Error response body
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Overall service health
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Degraded,
}

/// Health check response
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: HealthState,
    pub active_source: ActiveSourceKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<SimulationMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection: Option<ConnectionState>,
    /// Set while the live feed is down past its reconnect budget
    pub feed_exhausted: bool,
    pub pipeline: PipelineStats,
    pub cached_quotes: usize,
    pub timestamp: String,
}
