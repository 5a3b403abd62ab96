//! One pass of the per-tick pipeline
//!
//! apply input -> compute -> apply output -> aggregate history -> emit.
//! Each stage walks the whole registry in order before the next starts.
//! Every generator call runs under a panic guard. A generator whose input
//! write, `apply_input_region`, compute step or `apply_output_region` fails
//! or panics sits out the remaining mutating stages for that tick; its
//! previous outputs are still aggregated and emitted.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use ahash::AHashSet;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tokio::sync::broadcast;

use crate::core::config::EngineConfig;
use crate::core::diagnostics::Diagnostics;
use crate::core::error::TickwireError;
use crate::core::types::{GeneratorId, Tick};
use crate::engine::emitter::OutputEmitter;
use crate::engine::events::{EngineEvent, PropertyKey, PropertyValue};
use crate::engine::history::{HistoryAggregator, HistoryBoard, HistoryMode};
use crate::engine::latch::{InputLatch, InputValues};
use crate::generator::{Generator, GeneratorRegistry};
use crate::transport::FrameSink;
use crate::wire::Codec;

/// What happened during one tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub tick: Tick,
    pub generators: usize,
    /// Generators that received latched input
    pub inputs_applied: usize,
    pub faults: usize,
    pub frames_sent: usize,
}

/// Counts of usable and supplied input arguments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputCount {
    pub valid: usize,
    pub total: usize,
}

pub struct TickPipeline {
    dt: f64,
    aggregator: HistoryAggregator,
    emitter: OutputEmitter,
    rng: ChaCha8Rng,
    latch: Arc<InputLatch>,
    history: HistoryBoard,
    diagnostics: Arc<Diagnostics>,
    events: broadcast::Sender<EngineEvent>,
}

impl TickPipeline {
    pub fn new(
        config: &EngineConfig,
        latch: Arc<InputLatch>,
        history: HistoryBoard,
        diagnostics: Arc<Diagnostics>,
        events: broadcast::Sender<EngineEvent>,
    ) -> Self {
        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        let mut pipeline = Self {
            dt: config.dt(),
            aggregator: HistoryAggregator::default(),
            emitter: OutputEmitter::new(
                Codec::new(config.max_frame_size),
                config.narrow_to_f32,
                false,
            ),
            rng,
            latch,
            history,
            diagnostics,
            events,
        };
        pipeline.set_monitor(config.monitor_output);
        pipeline
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn set_frequency(&mut self, frequency: f64) {
        self.dt = 1.0 / frequency;
    }

    pub fn set_monitor(&mut self, monitor: bool) {
        self.aggregator.mode = if monitor {
            HistoryMode::Monitor
        } else {
            HistoryMode::Saturating
        };
        self.emitter.monitor = monitor;
    }

    pub fn set_narrow_floats(&mut self, narrow: bool) {
        self.emitter.narrow = narrow;
    }

    /// Run steps 3 to 7 over every registered generator
    pub fn run(
        &mut self,
        tick: Tick,
        registry: &mut GeneratorRegistry,
        sink: &dyn FrameSink,
    ) -> TickReport {
        let mut report = TickReport {
            tick,
            generators: registry.len(),
            ..Default::default()
        };

        let mut faulted = AHashSet::new();

        // Cleared before draining so offers landing mid-drain wait for the next tick
        if self.latch.take_dirty() {
            let stale = self.latch.retain(|id| registry.contains(id));
            if stale > 0 {
                tracing::debug!(stale, "Dropped input for removed generators");
            }

            for generator in registry.iter_mut() {
                let id = generator.id();
                let Some(values) = self.latch.drain_if_present(id) else {
                    continue;
                };
                match guarded("input region write", || {
                    Ok(self.write_inputs(&mut **generator, &values))
                }) {
                    Ok(count) => {
                        self.diagnostics.record_input_applied(count.valid, count.total);
                        self.publish(EngineEvent::InputApplied {
                            generator: id,
                            valid: count.valid,
                            total: count.total,
                        });
                        report.inputs_applied += 1;
                    }
                    Err(reason) => self.record_fault(&**generator, reason, &mut faulted),
                }
            }
            for generator in registry.iter_mut() {
                if faulted.contains(&generator.id()) {
                    continue;
                }
                if let Err(reason) = guarded("apply_input_region", || {
                    generator.apply_input_region();
                    Ok(())
                }) {
                    self.record_fault(&**generator, reason, &mut faulted);
                }
            }
        }

        let dt = self.dt;
        for generator in registry.iter_mut() {
            if faulted.contains(&generator.id()) {
                continue;
            }
            if let Err(reason) = guarded("compute_iteration", || {
                generator.compute_iteration(dt).map_err(|fault| fault.to_string())
            }) {
                self.record_fault(&**generator, reason, &mut faulted);
            }
        }

        for generator in registry.iter_mut() {
            if faulted.contains(&generator.id()) {
                continue;
            }
            if let Err(reason) = guarded("apply_output_region", || {
                generator.apply_output_region();
                Ok(())
            }) {
                self.record_fault(&**generator, reason, &mut faulted);
            }
        }

        // Outputs that cannot be read are left out of history and emission
        let mut outputs = Vec::with_capacity(registry.len());
        for generator in registry.iter() {
            match guarded("output region read", || {
                Ok(generator.output_regions().intensities())
            }) {
                Ok(intensities) => outputs.push((generator.id(), generator.name(), intensities)),
                Err(reason) => self.record_fault(generator, reason, &mut faulted),
            }
        }
        report.faults = faulted.len();

        for (id, _, intensities) in &outputs {
            let latest = self.aggregator.aggregate(intensities, &mut self.rng);
            let record = self.history.record(*id, latest);
            self.publish(EngineEvent::property(
                *id,
                PropertyKey::HistoryLatest,
                PropertyValue::Float(record.latest),
            ));
            self.publish(EngineEvent::property(
                *id,
                PropertyKey::HistoryRefresher,
                PropertyValue::Bool(record.fresh),
            ));
        }

        for (_, name, intensities) in &outputs {
            report.frames_sent += self.emitter.emit(
                name,
                intensities,
                &mut self.rng,
                sink,
                &self.diagnostics,
            );
        }

        self.diagnostics.record_tick();
        report
    }

    /// Write latched values into input regions in order
    ///
    /// Extra values are ignored, missing ones and non-numeric ones become 0.
    fn write_inputs(&self, generator: &mut dyn Generator, values: &InputValues) -> InputCount {
        let id = generator.id();
        let regions = generator.input_regions_mut();
        let mut valid = 0;
        let mut changed = Vec::new();

        for (i, region) in regions.iter_mut().enumerate() {
            let value = values.get(i).copied().flatten();
            if value.is_some() {
                valid += 1;
            }
            let intensity = value.unwrap_or(0.0);
            if region.write_intensity(intensity) {
                changed.push((i, intensity));
            }
        }

        for (i, intensity) in changed {
            self.publish(EngineEvent::property(
                id,
                PropertyKey::InputIntensity(i),
                PropertyValue::Float(intensity),
            ));
        }

        InputCount {
            valid,
            total: values.len(),
        }
    }

    /// Log, count and publish a generator fault; the generator sits out
    /// the rest of this tick's mutating stages
    fn record_fault(
        &self,
        generator: &dyn Generator,
        reason: String,
        faulted: &mut AHashSet<GeneratorId>,
    ) {
        let id = generator.id();
        let fault = TickwireError::GeneratorComputeFault {
            generator: id,
            reason: reason.clone(),
        };
        tracing::warn!(
            name = generator.name(),
            error = %fault,
            "Holding previous output"
        );
        self.diagnostics.record_compute_fault();
        self.publish(EngineEvent::ComputeFault {
            generator: id,
            reason,
        });
        faulted.insert(id);
    }

    fn publish(&self, event: EngineEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Drop per-generator state kept outside the registry
    pub fn forget(&self, id: GeneratorId) {
        self.latch.forget(id);
        self.history.remove(id);
    }
}

/// Run one generator call, turning a panic into a fault reason
fn guarded<T>(stage: &str, call: impl FnOnce() -> Result<T, String>) -> Result<T, String> {
    match catch_unwind(AssertUnwindSafe(call)) {
        Ok(result) => result,
        Err(payload) => Err(format!(
            "{} panicked: {}",
            stage,
            panic_message(payload.as_ref())
        )),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
