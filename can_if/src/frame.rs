//! # CAN frame model and typed payload encoding
//!
//! Frames carry an 11-bit standard identifier and up to 8 payload bytes. All
//! multi-byte payload values are little-endian, matching the encoding used by
//! the boards on the other end of the bus.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use byteorder::{ByteOrder, LittleEndian};
use serde::Serialize;
use thiserror::Error;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Highest valid standard (11-bit) CAN identifier.
pub const STD_ID_MAX: u16 = 0x7FF;

/// Maximum number of payload bytes in a classic CAN frame.
pub const MAX_PAYLOAD_LEN: usize = 8;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A classic CAN data frame with a standard identifier.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct CanFrame {
    /// The 11-bit identifier.
    id: u16,

    /// Number of valid payload bytes.
    dlc: u8,

    /// Payload storage. Only the first `dlc` bytes are meaningful.
    data: [u8; MAX_PAYLOAD_LEN],
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors raised when building or reading a frame.
#[derive(Debug, Error, PartialEq)]
pub enum FrameError {
    #[error("Identifier {0:#X} does not fit in 11 bits")]
    IdOutOfRange(u16),

    #[error("Payload of {0} bytes exceeds the 8 byte CAN limit")]
    PayloadTooLong(usize),

    #[error("Expected a payload of at least {expected} bytes, found {found}")]
    ShortPayload { expected: usize, found: usize },

    #[error("Unrecognised enumerant byte {0} in payload")]
    InvalidEnumerant(u8),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl CanFrame {
    /// Build a frame from an identifier and a raw payload slice.
    pub fn new(id: u16, payload: &[u8]) -> Result<Self, FrameError> {
        if id > STD_ID_MAX {
            return Err(FrameError::IdOutOfRange(id));
        }
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(FrameError::PayloadTooLong(payload.len()));
        }

        let mut data = [0u8; MAX_PAYLOAD_LEN];
        data[..payload.len()].copy_from_slice(payload);

        Ok(Self {
            id,
            dlc: payload.len() as u8,
            data,
        })
    }

    /// Build a frame carrying a single little-endian `f32`.
    pub fn from_f32(id: u16, value: f32) -> Result<Self, FrameError> {
        let mut buf = [0u8; 4];
        LittleEndian::write_f32(&mut buf, value);
        Self::new(id, &buf)
    }

    /// Build a frame carrying a single byte.
    pub fn from_byte(id: u16, value: u8) -> Result<Self, FrameError> {
        Self::new(id, &[value])
    }

    /// The frame's identifier.
    pub fn id(&self) -> u16 {
        self.id
    }

    /// The valid payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.dlc as usize]
    }

    /// Read the payload as a little-endian `f32`.
    pub fn payload_f32(&self) -> Result<f32, FrameError> {
        if (self.dlc as usize) < 4 {
            return Err(FrameError::ShortPayload {
                expected: 4,
                found: self.dlc as usize,
            });
        }

        Ok(LittleEndian::read_f32(&self.data[..4]))
    }

    /// Read the payload as a single byte.
    pub fn payload_byte(&self) -> Result<u8, FrameError> {
        if self.dlc < 1 {
            return Err(FrameError::ShortPayload {
                expected: 1,
                found: 0,
            });
        }

        Ok(self.data[0])
    }
}
