pub mod gbm;
pub mod live;
pub mod replay;

pub use gbm::GbmGenerator;
pub use live::{FeedError, LiveAdapter, LiveSession};
pub use replay::{HistoricalDataset, HistoricalRecord, ReplayEngine, SymbolSeries};

use crate::models::{RawTick, SimulationMode};

/// The active simulation engine, tagged by variant
///
/// The controller swaps these uniformly through `next_round`, and can reach
/// the replay cursor for `jump_to` without downcasting.
pub enum SimEngine {
    Gbm(GbmGenerator),
    Replay(ReplayEngine),
}

impl SimEngine {
    pub fn mode(&self) -> SimulationMode {
        match self {
            SimEngine::Gbm(_) => SimulationMode::Gbm,
            SimEngine::Replay(_) => SimulationMode::Historical,
        }
    }

    /// Produce one candidate tick per symbol for this scheduler round
    pub fn next_round(&mut self) -> Vec<RawTick> {
        match self {
            SimEngine::Gbm(generator) => generator.next_round(),
            SimEngine::Replay(engine) => engine.next_round(),
        }
    }
}
