//! # CAN transport abstraction
//!
//! The boards talk to the bus through the [`CanBus`] trait, leaving the
//! hardware transport (bitrate, filters, pin mapping) to the board support
//! layer. A [`LoopbackBus`] implementation is provided for desktop runs and
//! tests.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;
use std::collections::VecDeque;
use thiserror::Error;

// Internal
use crate::frame::CanFrame;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Maximum number of sent frames retained by the loopback bus.
const LOOPBACK_TX_DEPTH: usize = 64;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A duplex CAN transport.
pub trait CanBus {
    /// Queue a frame for transmission.
    fn send(&mut self, frame: &CanFrame) -> Result<(), BusError>;

    /// Take the next pending received frame, or `None` if the receive queue
    /// is empty. Must never block.
    fn try_recv(&mut self) -> Result<Option<CanFrame>, BusError>;
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors raised by a transport implementation.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("Could not send frame {id:#X}: {reason}")]
    SendFailed { id: u16, reason: String },

    #[error("Could not read from the bus: {0}")]
    RecvFailed(String),
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// An in-memory bus for desktop runs and tests.
///
/// Frames sent by the board are retained (up to a bounded depth) for
/// inspection, and stimulus frames can be injected into the receive queue.
#[derive(Default)]
pub struct LoopbackBus {
    rx: VecDeque<CanFrame>,
    tx: VecDeque<CanFrame>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl LoopbackBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inject a frame into the receive queue.
    pub fn inject(&mut self, frame: CanFrame) {
        self.rx.push_back(frame);
    }

    /// Drain all frames sent by the board since the last call.
    pub fn take_sent(&mut self) -> Vec<CanFrame> {
        self.tx.drain(..).collect()
    }
}

impl CanBus for LoopbackBus {
    fn send(&mut self, frame: &CanFrame) -> Result<(), BusError> {
        trace!("loopback tx: id {:#X}, {:?}", frame.id(), frame.payload());

        // Drop the oldest retained frame rather than growing without bound
        if self.tx.len() == LOOPBACK_TX_DEPTH {
            self.tx.pop_front();
        }
        self.tx.push_back(*frame);

        Ok(())
    }

    fn try_recv(&mut self) -> Result<Option<CanFrame>, BusError> {
        Ok(self.rx.pop_front())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_loopback_order() {
        let mut bus = LoopbackBus::new();

        bus.inject(CanFrame::from_byte(0x101, 1).unwrap());
        bus.inject(CanFrame::from_byte(0x102, 2).unwrap());

        // Frames come back out in arrival order
        assert_eq!(bus.try_recv().unwrap().unwrap().id(), 0x101);
        assert_eq!(bus.try_recv().unwrap().unwrap().id(), 0x102);
        assert!(bus.try_recv().unwrap().is_none());
    }

    #[test]
    fn test_loopback_tx_bounded() {
        let mut bus = LoopbackBus::new();

        for i in 0..(LOOPBACK_TX_DEPTH + 8) {
            bus.send(&CanFrame::from_byte(0x300, i as u8).unwrap())
                .unwrap();
        }

        let sent = bus.take_sent();
        assert_eq!(sent.len(), LOOPBACK_TX_DEPTH);

        // Oldest frames were dropped first
        assert_eq!(sent[0].payload_byte().unwrap(), 8);
    }
}
