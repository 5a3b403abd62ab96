//! Core type definitions used throughout the codebase

use derive_more::{Display, From};
use serde::{Deserialize, Serialize};

/// Stable identifier of a generator
///
/// Assigned by whoever creates the generator and never reused while it
/// lives. Renaming a generator does not change its id.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, From, Serialize, Deserialize,
)]
#[display(fmt = "{}", _0)]
pub struct GeneratorId(pub u32);

impl GeneratorId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn raw(self) -> u32 {
        self.0
    }
}

/// Engine tick counter
pub type Tick = u64;
