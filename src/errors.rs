//! Error types for the quote feed engine
//!
//! Control-plane errors (bad mode string, unparseable jump date) are rejected
//! synchronously at the API boundary; pipeline errors stay contained within
//! the tick or symbol that raised them.

use thiserror::Error;

use crate::database::DatabaseError;

/// Errors surfaced by the simulation controller and control API
#[derive(Debug, Error)]
pub enum EngineError {
    /// Client supplied an invalid mode or timestamp; no state was mutated
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The live feed exhausted its reconnect budget
    #[error("Live feed unavailable after {attempts} reconnect attempts")]
    FeedUnavailable { attempts: u32 },

    /// The historical dataset could not be loaded
    #[error("Historical dataset error: {0}")]
    Dataset(String),

    /// A persistence operation failed (logged, never fatal to the pipeline)
    #[error("Persistence error: {0}")]
    Persistence(#[from] DatabaseError),

    /// The upstream transport reported a fatal error
    #[error("Upstream feed error: {0}")]
    Upstream(String),
}

impl EngineError {
    /// Returns true if this error should map to a client-facing 400
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, EngineError::InvalidInput(_))
    }
}
