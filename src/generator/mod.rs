//! Generators: the pluggable units the engine drives each tick

pub mod builtin;
pub mod region;
pub mod registry;
pub mod traits;

pub use region::{Region, RegionRect, RegionSet};
pub use registry::{GeneratorRegistry, RegistryDirectory};
pub use traits::{Generator, GeneratorFault};
