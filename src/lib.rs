//! Tickwire - fixed-rate generator engine with OSC-style UDP telemetry
//!
//! Generators advance on a self-correcting tick. Inputs arrive as UDP
//! datagrams at any time and are latched until the next tick; outputs
//! are emitted as addressed, typed frames after every tick.

pub mod core;
pub mod engine;
pub mod generator;
pub mod transport;
pub mod wire;
