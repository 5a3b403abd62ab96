//! Sine oscillator with input-modulated rate

use std::f64::consts::TAU;

use crate::core::types::GeneratorId;
use crate::generator::region::RegionSet;
use crate::generator::traits::{Generator, GeneratorFault};

/// One sine per output region, phase-shifted evenly across regions.
/// Mean input intensity scales the base rate by `1 + depth * input`.
#[derive(Debug, Clone)]
pub struct Oscillator {
    id: GeneratorId,
    name: String,
    inputs: RegionSet,
    outputs: RegionSet,
    base_hz: f64,
    depth: f64,
    modulation: f64,
    phase: f64,
}

impl Oscillator {
    pub fn new(id: GeneratorId, name: &str, inputs: usize, outputs: usize, base_hz: f64) -> Self {
        Self {
            id,
            name: name.to_string(),
            inputs: RegionSet::with_count(inputs),
            outputs: RegionSet::with_count(outputs),
            base_hz,
            depth: 4.0,
            modulation: 0.0,
            phase: 0.0,
        }
    }

    /// Current phase in cycles, within [0, 1)
    pub fn phase(&self) -> f64 {
        self.phase
    }

    fn rate(&self) -> f64 {
        self.base_hz * (1.0 + self.depth * self.modulation)
    }
}

impl Generator for Oscillator {
    fn id(&self) -> GeneratorId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }

    fn input_regions(&self) -> &RegionSet {
        &self.inputs
    }

    fn input_regions_mut(&mut self) -> &mut RegionSet {
        &mut self.inputs
    }

    fn output_regions(&self) -> &RegionSet {
        &self.outputs
    }

    fn apply_input_region(&mut self) {
        self.modulation = self.inputs.mean_intensity().max(0.0);
    }

    fn compute_iteration(&mut self, dt: f64) -> Result<(), GeneratorFault> {
        let rate = self.rate();
        if !rate.is_finite() {
            return Err(GeneratorFault::new(format!("non-finite rate {}", rate)));
        }
        self.phase = (self.phase + rate * dt).rem_euclid(1.0);
        Ok(())
    }

    fn apply_output_region(&mut self) {
        let count = self.outputs.len().max(1) as f64;
        let phase = self.phase;
        for (i, region) in self.outputs.iter_mut().enumerate() {
            let shifted = phase + i as f64 / count;
            region.write_intensity(0.5 + 0.5 * (TAU * shifted).sin());
        }
    }
}
