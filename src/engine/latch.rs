//! Input latch between the receive path and the tick pipeline
//!
//! The receive task offers value lists at arbitrary times; the scheduler
//! drains them once per tick. One lock serializes offers against drains,
//! so a value offered before a drain is seen by it and a value offered
//! after is seen by the next one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use ahash::AHashMap;

use crate::core::types::GeneratorId;

/// Raw input values for one generator; `None` marks a non-numeric argument
pub type InputValues = Vec<Option<f64>>;

#[derive(Debug, Default)]
pub struct InputLatch {
    pending: Mutex<AHashMap<GeneratorId, InputValues>>,
    dirty: AtomicBool,
}

impl InputLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the pending values for `id`
    ///
    /// Offers before a drain overwrite each other; nothing accumulates.
    pub fn offer(&self, id: GeneratorId, values: InputValues) {
        let mut pending = self.lock();
        pending.insert(id, values);
        // Set while holding the lock so a concurrent `take_dirty` cannot
        // clear it after the insert became visible to a drain.
        self.dirty.store(true, Ordering::Release);
    }

    /// Remove and return the pending values for `id`, exactly once
    pub fn drain_if_present(&self, id: GeneratorId) -> Option<InputValues> {
        self.lock().remove(&id)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Clear the dirty flag, returning its previous value
    ///
    /// Call before draining: an offer that lands mid-drain sets the flag
    /// again and is picked up on the next tick.
    pub fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::AcqRel)
    }

    /// Discard pending input for a removed generator
    pub fn forget(&self, id: GeneratorId) {
        self.lock().remove(&id);
    }

    /// Drop pending input whose generator fails `keep`, returning how many went
    pub fn retain(&self, keep: impl Fn(GeneratorId) -> bool) -> usize {
        let mut pending = self.lock();
        let before = pending.len();
        pending.retain(|id, _| keep(*id));
        before - pending.len()
    }

    pub fn pending_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, AHashMap<GeneratorId, InputValues>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }
}
