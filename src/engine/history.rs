//! Per-generator rolling aggregate of output intensities

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use ahash::AHashMap;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::core::types::GeneratorId;

/// How the aggregate is derived from output regions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HistoryMode {
    /// Mean of region intensities through the saturation curve
    Saturating,
    /// Uniform [0, 1) draws instead of real values
    Monitor,
}

/// `1 - (1 - mean)^3`: fixes 0 and 1, lifts partial activation
pub fn saturate(mean: f64) -> f64 {
    1.0 - (1.0 - mean).powi(3)
}

#[derive(Debug, Clone, Copy)]
pub struct HistoryAggregator {
    pub mode: HistoryMode,
}

impl HistoryAggregator {
    pub fn new(mode: HistoryMode) -> Self {
        Self { mode }
    }

    /// Collapse output intensities into one scalar
    ///
    /// No regions yields 0.0 in saturating mode.
    pub fn aggregate<R: Rng>(&self, intensities: &[f64], rng: &mut R) -> f64 {
        match self.mode {
            HistoryMode::Monitor => rng.gen::<f64>(),
            HistoryMode::Saturating if intensities.is_empty() => 0.0,
            HistoryMode::Saturating => {
                let mean = intensities.iter().sum::<f64>() / intensities.len() as f64;
                saturate(mean)
            }
        }
    }
}

impl Default for HistoryAggregator {
    fn default() -> Self {
        Self::new(HistoryMode::Saturating)
    }
}

/// Latest aggregate plus a flag that flips every tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub latest: f64,
    pub fresh: bool,
}

impl HistoryRecord {
    /// Store this tick's aggregate and flip the freshness flag
    pub fn update(&mut self, latest: f64) {
        self.latest = latest;
        self.fresh = !self.fresh;
    }
}

/// Read-only view of every generator's record, shared with observers
#[derive(Debug, Clone, Default)]
pub struct HistoryBoard {
    records: Arc<RwLock<AHashMap<GeneratorId, HistoryRecord>>>,
}

impl HistoryBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: GeneratorId) -> Option<HistoryRecord> {
        self.read().get(&id).copied()
    }

    pub fn snapshot(&self) -> AHashMap<GeneratorId, HistoryRecord> {
        self.read().clone()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Update the record for `id` and return its new value
    pub(crate) fn record(&self, id: GeneratorId, latest: f64) -> HistoryRecord {
        let mut records = self.write();
        let entry = records.entry(id).or_default();
        entry.update(latest);
        *entry
    }

    pub(crate) fn remove(&self, id: GeneratorId) {
        self.write().remove(&id);
    }

    fn read(&self) -> RwLockReadGuard<'_, AHashMap<GeneratorId, HistoryRecord>> {
        self.records.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, AHashMap<GeneratorId, HistoryRecord>> {
        self.records.write().unwrap_or_else(|e| e.into_inner())
    }
}
