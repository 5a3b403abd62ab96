//! Shared diagnostic counters
//!
//! Faults inside the engine are isolated and only show up here and in
//! the log. Counters are plain atomics so the receive path and the
//! scheduler can bump them without coordination.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

#[derive(Debug, Default)]
pub struct Diagnostics {
    ticks: AtomicU64,
    frames_received: AtomicU64,
    frames_sent: AtomicU64,
    malformed_frames: AtomicU64,
    unroutable_frames: AtomicU64,
    unknown_generator: AtomicU64,
    transport_errors: AtomicU64,
    compute_faults: AtomicU64,
    dropped_arguments: AtomicU64,
    inputs_latched: AtomicU64,
    input_args_valid: AtomicU64,
    input_args_total: AtomicU64,
}

/// Point-in-time copy of all counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticsSnapshot {
    pub ticks: u64,
    pub frames_received: u64,
    pub frames_sent: u64,
    pub malformed_frames: u64,
    pub unroutable_frames: u64,
    pub unknown_generator: u64,
    pub transport_errors: u64,
    pub compute_faults: u64,
    pub dropped_arguments: u64,
    pub inputs_latched: u64,
    pub input_args_valid: u64,
    pub input_args_total: u64,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frame_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frame_sent(&self) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed(&self) {
        self.malformed_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unroutable(&self) {
        self.unroutable_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unknown_generator(&self) {
        self.unknown_generator.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_transport_error(&self) {
        self.transport_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_compute_fault(&self) {
        self.compute_faults.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped_arguments(&self, count: usize) {
        if count > 0 {
            self.dropped_arguments
                .fetch_add(count as u64, Ordering::Relaxed);
        }
    }

    pub fn record_input_latched(&self) {
        self.inputs_latched.fetch_add(1, Ordering::Relaxed);
    }

    /// Record how many of an applied input's arguments were usable
    pub fn record_input_applied(&self, valid: usize, total: usize) {
        self.input_args_valid
            .fetch_add(valid as u64, Ordering::Relaxed);
        self.input_args_total
            .fetch_add(total as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            malformed_frames: self.malformed_frames.load(Ordering::Relaxed),
            unroutable_frames: self.unroutable_frames.load(Ordering::Relaxed),
            unknown_generator: self.unknown_generator.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
            compute_faults: self.compute_faults.load(Ordering::Relaxed),
            dropped_arguments: self.dropped_arguments.load(Ordering::Relaxed),
            inputs_latched: self.inputs_latched.load(Ordering::Relaxed),
            input_args_valid: self.input_args_valid.load(Ordering::Relaxed),
            input_args_total: self.input_args_total.load(Ordering::Relaxed),
        }
    }
}

impl DiagnosticsSnapshot {
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(&self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn summary(&self) -> String {
        format!(
            "{} ticks, {} frames sent, {} received ({} malformed, {} unroutable, {} unknown generator)\n{} compute faults, {} transport errors, {} dropped arguments",
            self.ticks,
            self.frames_sent,
            self.frames_received,
            self.malformed_frames,
            self.unroutable_frames,
            self.unknown_generator,
            self.compute_faults,
            self.transport_errors,
            self.dropped_arguments,
        )
    }
}
