//! Engine configuration with documented defaults
//!
//! Values can be loaded from a TOML file; any key left out keeps its
//! default. Command-line flags are applied on top by the binaries.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::error::{Result, TickwireError};

/// Configuration for the tick engine and its UDP endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    // === SCHEDULING ===
    /// Target tick rate (ticks per second)
    ///
    /// Also fixes the compute step: every generator advances by
    /// `1 / frequency` seconds per tick regardless of measured wall time.
    pub frequency: f64,

    /// When false, ticks keep firing at the nominal period but skip the
    /// whole pipeline. Used for pausing and for tests.
    pub processing_enabled: bool,

    // === OUTPUT ===
    /// Host receiving outbound telemetry
    pub destination_host: String,

    /// Port receiving outbound telemetry
    pub destination_port: u16,

    /// Replace aggregates and region values with uniform [0, 1) draws
    ///
    /// Exercises the emission path without meaningful computation.
    pub monitor_output: bool,

    /// Narrow outbound intensities to 32-bit floats
    pub narrow_to_f32: bool,

    /// Largest frame the codec will produce (bytes)
    ///
    /// Frames above 512 bytes risk IP fragmentation; the encoder logs
    /// them but only refuses frames above this limit.
    pub max_frame_size: usize,

    // === INPUT ===
    /// Local interface for inbound control messages
    pub listen_host: String,

    /// Local UDP port for inbound control messages (0 picks a free port)
    pub listen_port: u16,

    /// Address pattern of inbound messages
    ///
    /// Exactly one segment is `{id}` or `{name}`, the rest match
    /// literally. `"/{id}"` routes `/1` to generator 1.
    pub inbound_address: String,

    // === MISC ===
    /// Seed for the monitor-mode RNG (entropy when absent)
    pub seed: Option<u64>,

    /// Buffered events per observer before the slowest one lags
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            frequency: 30.0,
            processing_enabled: true,

            destination_host: "127.0.0.1".into(),
            destination_port: 8000,
            monitor_output: false,
            narrow_to_f32: true,
            max_frame_size: 1024,

            listen_host: "0.0.0.0".into(),
            listen_port: 9000,
            inbound_address: "/{id}".into(),

            seed: None,
            event_capacity: 1024,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML document and validate it
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate().map_err(TickwireError::Config)?;
        Ok(config)
    }

    /// Load and validate a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Nominal tick period
    ///
    /// Falls back to the default rate's period when `frequency` fails
    /// [`validate`](Self::validate).
    pub fn period(&self) -> Duration {
        tick_period(self.frequency)
            .or_else(|_| tick_period(Self::default().frequency))
            .unwrap_or(Duration::from_millis(33))
    }

    /// Fixed compute step in seconds
    pub fn dt(&self) -> f64 {
        1.0 / self.frequency
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> std::result::Result<(), String> {
        tick_period(self.frequency)?;

        // Address, type tags and one argument need at least this much
        if self.max_frame_size < 16 {
            return Err(format!(
                "max_frame_size ({}) must be at least 16 bytes",
                self.max_frame_size
            ));
        }

        if self.destination_host.trim().is_empty() {
            return Err("destination_host must not be empty".into());
        }

        if self.event_capacity == 0 {
            return Err("event_capacity must be at least 1".into());
        }

        crate::wire::address::InboundPattern::parse(&self.inbound_address)
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}

/// Period of one tick at `frequency` ticks per second
///
/// Rejects rates whose period is zero or does not fit a `Duration`.
pub fn tick_period(frequency: f64) -> std::result::Result<Duration, String> {
    if !frequency.is_finite() || frequency <= 0.0 {
        return Err(format!("frequency ({}) must be a positive number", frequency));
    }
    match Duration::try_from_secs_f64(1.0 / frequency) {
        Ok(period) if !period.is_zero() => Ok(period),
        _ => Err(format!("frequency ({}) is out of range", frequency)),
    }
}
