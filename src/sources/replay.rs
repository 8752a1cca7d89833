use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

use crate::errors::EngineError;
use crate::models::RawTick;

/// One stored observation in a symbol's historical sequence
#[derive(Debug, Clone, Deserialize)]
pub struct HistoricalRecord {
    pub timestamp: DateTime<Utc>,
    pub price: Decimal,
    #[serde(default)]
    pub volume: Decimal,
}

/// A symbol's ordered price sequence
#[derive(Debug, Clone, Deserialize)]
pub struct SymbolSeries {
    pub symbol: String,
    pub records: Vec<HistoricalRecord>,
}

/// Immutable historical dataset shared across replay sessions
///
/// Loaded once from a JSON file (`[{symbol, records: [{timestamp, price,
/// volume}]}]`); each HISTORICAL session builds fresh cursors over it.
#[derive(Debug)]
pub struct HistoricalDataset {
    series: Vec<SymbolSeries>,
}

impl HistoricalDataset {
    pub fn from_series(mut series: Vec<SymbolSeries>) -> Result<Self, EngineError> {
        series.retain(|s| !s.records.is_empty());
        if series.is_empty() {
            return Err(EngineError::Dataset(
                "dataset contains no symbol with records".to_string(),
            ));
        }
        for s in &mut series {
            s.records.sort_by_key(|r| r.timestamp);
        }
        Ok(Self { series })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Dataset(format!("{}: {}", path.display(), e)))?;
        let series: Vec<SymbolSeries> = serde_json::from_str(&raw)
            .map_err(|e| EngineError::Dataset(format!("{}: {}", path.display(), e)))?;
        Self::from_series(series)
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.series.iter().map(|s| s.symbol.as_str())
    }

    pub fn series_count(&self) -> usize {
        self.series.len()
    }
}

/// Replays the historical dataset one record per scheduler tick
///
/// Every symbol keeps its own cursor index; `jump_to` repositions all of
/// them to the same wall-clock point so cross-symbol timing stays coherent.
/// At the end of a sequence the cursor wraps around when looping is enabled
/// (the default), otherwise the symbol simply stops emitting.
pub struct ReplayEngine {
    dataset: Arc<HistoricalDataset>,
    /// Cursor per series; `None` marks a non-looping sequence that finished
    cursors: Vec<Option<usize>>,
    replay_loop: bool,
    /// Shared logical clock: the point the cursors were last positioned to
    clock: Option<DateTime<Utc>>,
}

impl ReplayEngine {
    /// Create cursors positioned at each sequence's default start
    pub fn new(dataset: Arc<HistoricalDataset>, replay_loop: bool) -> Self {
        let cursors = vec![Some(0); dataset.series.len()];
        Self {
            dataset,
            cursors,
            replay_loop,
            clock: None,
        }
    }

    /// Emit the record under each cursor, then advance
    pub fn next_round(&mut self) -> Vec<RawTick> {
        let mut ticks = Vec::with_capacity(self.dataset.series.len());

        for (series, cursor) in self.dataset.series.iter().zip(self.cursors.iter_mut()) {
            let Some(index) = *cursor else { continue };
            let record = &series.records[index];

            let mut tick =
                RawTick::simulated(series.symbol.clone(), record.price, record.timestamp);
            tick.volume = Some(record.volume);
            ticks.push(tick);

            *cursor = if index + 1 < series.records.len() {
                Some(index + 1)
            } else if self.replay_loop {
                Some(0)
            } else {
                None
            };
        }

        if let Some(last) = ticks.last() {
            self.clock = Some(last.timestamp);
        }

        ticks
    }

    /// Reposition every cursor to the first record at or after `target`
    ///
    /// Clamps at the boundaries: a target before all data resumes at the
    /// first record, a target past the end resumes at the last one.
    pub fn jump_to(&mut self, target: DateTime<Utc>) {
        for (series, cursor) in self.dataset.series.iter().zip(self.cursors.iter_mut()) {
            let index = series
                .records
                .partition_point(|r| r.timestamp < target)
                .min(series.records.len() - 1);
            *cursor = Some(index);
        }
        self.clock = Some(target);
        tracing::info!("Replay cursors repositioned to {}", target.to_rfc3339());
    }

    /// The point the replay was last positioned to or has advanced past
    pub fn clock(&self) -> Option<DateTime<Utc>> {
        self.clock
    }
}
