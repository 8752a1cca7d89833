use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

use crate::connection::ConnectionState;

/// Simulation engine variant selected through the control API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SimulationMode {
    /// Geometric Brownian Motion random walk
    Gbm,
    /// Historical dataset replay
    Historical,
}

impl fmt::Display for SimulationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimulationMode::Gbm => write!(f, "GBM"),
            SimulationMode::Historical => write!(f, "HISTORICAL"),
        }
    }
}

impl FromStr for SimulationMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GBM" => Ok(SimulationMode::Gbm),
            "HISTORICAL" => Ok(SimulationMode::Historical),
            _ => Err(()),
        }
    }
}

/// Which tick source currently drives the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActiveSourceKind {
    Live,
    Simulated,
    Idle,
}

/// Request body for `POST /api/simulation/mode`
///
/// The mode arrives as a plain string so an unrecognized value can be
/// rejected with a 400 instead of a body-rejection error.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SetModeRequest {
    /// `"GBM"` or `"HISTORICAL"`
    pub mode: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SetModeResponse {
    pub status: String,
    pub mode: SimulationMode,
}

/// Request body for `POST /api/simulation/jump`
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct JumpRequest {
    /// ISO-8601 timestamp to reposition the replay cursors to
    pub date: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct JumpResponse {
    pub status: String,
    pub mode: SimulationMode,
    /// The parsed jump target, echoed back in RFC 3339
    pub date: String,
}

/// Snapshot of the engine's source arbitration state
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SimulationStatus {
    pub active_source: ActiveSourceKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<SimulationMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection: Option<ConnectionState>,
    /// Set when the live feed exhausted its reconnect budget
    pub feed_exhausted: bool,
    pub tick_interval_ms: u64,
    pub tracked_symbols: usize,
}
