pub mod quote;
pub mod simulation;

pub use quote::{MarketState, Quote, QuoteSource, RawTick, UpstreamTick};
pub use simulation::{
    ActiveSourceKind, JumpRequest, JumpResponse, SetModeRequest, SetModeResponse, SimulationMode,
    SimulationStatus,
};
