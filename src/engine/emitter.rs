//! Builds and sends per-generator telemetry

use rand::Rng;

use crate::core::diagnostics::Diagnostics;
use crate::core::error::Result;
use crate::transport::FrameSink;
use crate::wire::{output_list_address, output_region_address, Argument, Codec, WireMessage};

/// Turns output intensities into wire messages
///
/// For a generator named `wave` with two regions the order is
/// `/wave/output/1/float`, `/wave/output/2/float`, `/wave/output`.
#[derive(Debug, Clone, Copy)]
pub struct OutputEmitter {
    pub codec: Codec,
    /// Narrow values to float32 instead of sending float64
    pub narrow: bool,
    /// Replace every value with a uniform [0, 1) draw
    pub monitor: bool,
}

impl OutputEmitter {
    pub fn new(codec: Codec, narrow: bool, monitor: bool) -> Self {
        Self {
            codec,
            narrow,
            monitor,
        }
    }

    pub fn build_messages<R: Rng>(
        &self,
        name: &str,
        intensities: &[f64],
        rng: &mut R,
    ) -> Result<Vec<WireMessage>> {
        let values: Vec<Argument> = intensities
            .iter()
            .map(|v| {
                let v = if self.monitor { rng.gen::<f64>() } else { *v };
                self.argument(v)
            })
            .collect();

        let mut messages = Vec::with_capacity(values.len() + 1);
        for (i, value) in values.iter().enumerate() {
            messages.push(WireMessage::with_args(
                output_region_address(name, i + 1),
                vec![value.clone()],
            )?);
        }
        messages.push(WireMessage::with_args(output_list_address(name), values)?);
        Ok(messages)
    }

    /// Encode and send every message for one generator
    ///
    /// Failures are counted and logged; the remaining messages are still
    /// sent. Returns the number of frames that went out.
    pub fn emit<R: Rng>(
        &self,
        name: &str,
        intensities: &[f64],
        rng: &mut R,
        sink: &dyn FrameSink,
        diagnostics: &Diagnostics,
    ) -> usize {
        let messages = match self.build_messages(name, intensities, rng) {
            Ok(messages) => messages,
            Err(e) => {
                tracing::warn!(generator = name, error = %e, "Cannot build output messages");
                diagnostics.record_transport_error();
                return 0;
            }
        };

        let mut sent = 0;
        for message in &messages {
            let encoded = match self.codec.encode(message) {
                Ok(encoded) => encoded,
                Err(e) => {
                    tracing::warn!(address = message.address(), error = %e, "Encode failed");
                    diagnostics.record_transport_error();
                    continue;
                }
            };
            diagnostics.record_dropped_arguments(encoded.dropped);

            match sink.send_frame(&encoded.frame) {
                Ok(()) => {
                    diagnostics.record_frame_sent();
                    sent += 1;
                }
                Err(e) => {
                    tracing::warn!(address = message.address(), error = %e, "Send failed");
                    diagnostics.record_transport_error();
                }
            }
        }
        sent
    }

    fn argument(&self, value: f64) -> Argument {
        if self.narrow {
            Argument::Float(value as f32)
        } else {
            Argument::Double(value)
        }
    }
}
