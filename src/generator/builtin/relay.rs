//! First-order relay: output follows the mean input

use crate::core::types::GeneratorId;
use crate::generator::region::RegionSet;
use crate::generator::traits::{Generator, GeneratorFault};

/// Default response rate (1/s)
const DEFAULT_RESPONSE: f64 = 8.0;

/// Moves its level toward the mean input intensity at `response` per second
/// and writes that level to every output region.
#[derive(Debug, Clone)]
pub struct Relay {
    id: GeneratorId,
    name: String,
    inputs: RegionSet,
    outputs: RegionSet,
    target: f64,
    level: f64,
    response: f64,
}

impl Relay {
    pub fn new(id: GeneratorId, name: &str, inputs: usize, outputs: usize) -> Self {
        Self {
            id,
            name: name.to_string(),
            inputs: RegionSet::with_count(inputs),
            outputs: RegionSet::with_count(outputs),
            target: 0.0,
            level: 0.0,
            response: DEFAULT_RESPONSE,
        }
    }

    pub fn with_response(mut self, response: f64) -> Self {
        self.response = response;
        self
    }

    pub fn level(&self) -> f64 {
        self.level
    }
}

impl Generator for Relay {
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
        self.target = self.inputs.mean_intensity();
    }

    fn compute_iteration(&mut self, dt: f64) -> Result<(), GeneratorFault> {
        if !self.target.is_finite() {
            return Err(GeneratorFault::new(format!(
                "non-finite input target {}",
                self.target
            )));
        }
        let step = (self.response * dt).clamp(0.0, 1.0);
        self.level += (self.target - self.level) * step;
        Ok(())
    }

    fn apply_output_region(&mut self) {
        let level = self.level;
        for region in self.outputs.iter_mut() {
            region.write_intensity(level);
        }
    }
}
