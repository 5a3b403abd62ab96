//! Built-in generator variants

pub mod oscillator;
pub mod relay;

pub use oscillator::Oscillator;
pub use relay::Relay;
