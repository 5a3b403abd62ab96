//! The contract every generator variant satisfies

use thiserror::Error;

use crate::core::types::GeneratorId;
use crate::generator::region::RegionSet;

/// Failure raised by a generator's computation
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{0}")]
pub struct GeneratorFault(pub String);

impl GeneratorFault {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// An independently evolving simulation unit
///
/// The engine writes input region intensities, then drives
/// `apply_input_region` -> `compute_iteration` -> `apply_output_region`
/// once per tick and reads output region intensities afterwards. All
/// calls happen on the scheduler's task.
pub trait Generator: Send {
    /// Stable id, unchanged by renames
    fn id(&self) -> GeneratorId;

    /// Human-readable name used to build wire addresses
    fn name(&self) -> &str;

    fn set_name(&mut self, name: String);

    fn input_regions(&self) -> &RegionSet;

    fn input_regions_mut(&mut self) -> &mut RegionSet;

    fn output_regions(&self) -> &RegionSet;

    /// Pull input region intensities into the generator's state
    fn apply_input_region(&mut self);

    /// Advance the state by `dt` seconds
    fn compute_iteration(&mut self, dt: f64) -> Result<(), GeneratorFault>;

    /// Push the generator's state into its output region intensities
    fn apply_output_region(&mut self);
}
