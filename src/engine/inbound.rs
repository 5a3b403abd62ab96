//! Receive path: datagram -> decode -> route -> latch

use std::sync::Arc;

use tokio::sync::watch;

use crate::core::diagnostics::Diagnostics;
use crate::core::error::{Result, TickwireError};
use crate::core::types::GeneratorId;
use crate::engine::latch::InputLatch;
use crate::generator::RegistryDirectory;
use crate::transport::UdpReceiver;
use crate::wire::{Codec, InboundPattern, InboundTarget};

/// Resolves inbound frames to generators and offers their values
#[derive(Debug, Clone)]
pub struct InboundRouter {
    codec: Codec,
    pattern: InboundPattern,
    directory: RegistryDirectory,
    latch: Arc<InputLatch>,
    diagnostics: Arc<Diagnostics>,
}

impl InboundRouter {
    pub fn new(
        codec: Codec,
        pattern: InboundPattern,
        directory: RegistryDirectory,
        latch: Arc<InputLatch>,
        diagnostics: Arc<Diagnostics>,
    ) -> Self {
        Self {
            codec,
            pattern,
            directory,
            latch,
            diagnostics,
        }
    }

    /// Handle one frame
    ///
    /// Every failure is counted before it is returned; none of them
    /// affects later frames.
    pub fn route(&self, frame: &[u8]) -> Result<GeneratorId> {
        self.diagnostics.record_frame_received();

        let message = self.codec.decode(frame).map_err(|e| {
            self.diagnostics.record_malformed();
            e
        })?;

        let target = match self.pattern.match_address(message.address()) {
            Some(target) => target,
            None => {
                self.diagnostics.record_unroutable();
                return Err(TickwireError::InvalidMessage(format!(
                    "no inbound route for {}",
                    message.address()
                )));
            }
        };

        let id = match &target {
            InboundTarget::Id(id) if self.directory.contains(*id) => Some(*id),
            InboundTarget::Id(_) => None,
            InboundTarget::Name(name) => self.directory.id_for_name(name),
        };
        let Some(id) = id else {
            self.diagnostics.record_unknown_generator();
            return Err(TickwireError::UnknownGenerator(target.to_string()));
        };

        let values = message.args.iter().map(|arg| arg.as_f64()).collect();
        self.latch.offer(id, values);
        self.diagnostics.record_input_latched();
        Ok(id)
    }
}

/// Receive frames until `shutdown` turns true
pub async fn run_receiver(
    receiver: UdpReceiver,
    router: InboundRouter,
    mut shutdown: watch::Receiver<bool>,
) {
    while !*shutdown.borrow() {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            received = receiver.recv() => match received {
                Ok((frame, from)) => {
                    if let Err(e) = router.route(&frame) {
                        tracing::debug!(%from, error = %e, "Inbound frame discarded");
                    }
                }
                Err(e) => {
                    router.diagnostics.record_transport_error();
                    tracing::warn!(error = %e, "Receive failed");
                }
            },
        }
    }
    tracing::info!("Receiver stopped");
}
