// Library Crate Root
// lib.rs

pub mod api;
pub mod cache;
pub mod config;
pub mod connection;
pub mod database;
pub mod errors;
pub mod jobs;
pub mod models;
pub mod persistence;
pub mod pipeline;
pub mod simulation;
pub mod sources;
pub mod websocket;

// pub use = re-export at crate root
pub use api::{create_router, EngineState};
pub use cache::QuoteCache;
pub use config::EngineConfig;
pub use errors::EngineError;
pub use models::{Quote, QuoteSource, RawTick, SimulationMode};
pub use pipeline::QuotePipeline;
pub use simulation::SimulationController;
pub use websocket::Broadcaster;
