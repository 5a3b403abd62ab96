//! Observer stream published by the engine

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::types::GeneratorId;

/// Name of an observable generator property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyKey {
    HistoryLatest,
    HistoryRefresher,
    /// Intensity of the input region at this 0-based index
    InputIntensity(usize),
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyKey::HistoryLatest => write!(f, "historyLatest"),
            PropertyKey::HistoryRefresher => write!(f, "historyRefresher"),
            PropertyKey::InputIntensity(i) => write!(f, "input[{}].intensity", i),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    Float(f64),
    Bool(bool),
}

/// `(generator, key, value)` tuple for a changed property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyChange {
    pub generator: GeneratorId,
    pub key: PropertyKey,
    pub value: PropertyValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EngineEvent {
    Property(PropertyChange),
    /// Latched input was written to a generator's input regions
    InputApplied {
        generator: GeneratorId,
        valid: usize,
        total: usize,
    },
    /// A generator's compute step failed; its outputs were held
    ComputeFault {
        generator: GeneratorId,
        reason: String,
    },
}

impl EngineEvent {
    pub fn property(generator: GeneratorId, key: PropertyKey, value: PropertyValue) -> Self {
        EngineEvent::Property(PropertyChange {
            generator,
            key,
            value,
        })
    }

    pub fn generator(&self) -> GeneratorId {
        match self {
            EngineEvent::Property(change) => change.generator,
            EngineEvent::InputApplied { generator, .. } => *generator,
            EngineEvent::ComputeFault { generator, .. } => *generator,
        }
    }
}
