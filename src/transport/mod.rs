//! Datagram transport
//!
//! Outbound frames go to one configured peer through a [`FrameSink`];
//! inbound frames are read from a bound local port by [`UdpReceiver`].

pub mod udp;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::core::error::{Result, TickwireError};

pub use udp::{resolve, UdpReceiver, UdpSender};

/// Best-effort sink for encoded frames
///
/// `send_frame` must not block: the tick pipeline calls it inline and a
/// failed send is reported, never retried.
pub trait FrameSink: Send + Sync {
    fn send_frame(&self, frame: &[u8]) -> Result<()>;
}

/// In-memory sink that keeps every frame it is given
#[derive(Debug, Default)]
pub struct MemorySink {
    frames: Mutex<Vec<Vec<u8>>>,
    failing: AtomicBool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent sends fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Remove and return all captured frames
    pub fn take_frames(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut *self.frames.lock().unwrap_or_else(|e| e.into_inner()))
    }

    pub fn len(&self) -> usize {
        self.frames.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FrameSink for MemorySink {
    fn send_frame(&self, frame: &[u8]) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(TickwireError::Transport("memory sink set to fail".into()));
        }
        self.frames
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(frame.to_vec());
        Ok(())
    }
}
