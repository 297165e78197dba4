//! # Telemetry identifier blocks
//!
//! Telemetry flows upstream in a block separate from the command block, with
//! one identifier per measured quantity per target:
//!
//! ```text
//! base_id + 0: angle, target 0      (f32, degrees)
//! base_id + 1: velocity, target 0   (f32, degrees/second)
//! base_id + 2: control mode, target 0 (enumerant byte)
//! base_id + 3: angle, target 1
//! ...
//! ```
//!
//! Frames are emitted on a fixed interval by each board's main loop.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};

// Internal
use crate::cmd::ControlMode;
use crate::frame::{CanFrame, FrameError};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of telemetry identifiers consumed by each target in a block.
pub const IDS_PER_TARGET: u16 = 3;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A board's telemetry identifier block.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct TmBlock {
    /// First identifier of the block.
    pub base_id: u16,

    /// Number of reporting targets in the block.
    pub num_targets: u16,
}

/// One decoded telemetry sample.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TmSample {
    /// Index of the reporting target within the board's block.
    pub target: usize,

    /// The measured or derived quantity.
    pub quantity: TmQuantity,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Quantities reported for each target.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TmQuantity {
    /// Measured angle in degrees (linear targets report millimetres).
    AngleDeg(f64),

    /// Measured angular velocity in degrees/second.
    VelocityDps(f64),

    /// The target's active control mode.
    Mode(ControlMode),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl TmBlock {
    /// True if the identifier falls inside this block.
    pub fn contains(&self, id: u16) -> bool {
        id >= self.base_id && id < self.base_id + self.num_targets * IDS_PER_TARGET
    }

    /// Encode one telemetry sample into a frame.
    pub fn encode(&self, sample: &TmSample) -> Result<CanFrame, FrameError> {
        let base = self.base_id + sample.target as u16 * IDS_PER_TARGET;

        match sample.quantity {
            TmQuantity::AngleDeg(v) => CanFrame::from_f32(base, v as f32),
            TmQuantity::VelocityDps(v) => CanFrame::from_f32(base + 1, v as f32),
            TmQuantity::Mode(m) => CanFrame::from_byte(base + 2, m.to_wire()),
        }
    }

    /// Decode a telemetry frame against this block.
    ///
    /// Returns `Ok(None)` for frames outside the block. This is the
    /// ground-side counterpart of [`encode`].
    pub fn decode(&self, frame: &CanFrame) -> Result<Option<TmSample>, FrameError> {
        if !self.contains(frame.id()) {
            return Ok(None);
        }

        let offset = frame.id() - self.base_id;
        let target = (offset / IDS_PER_TARGET) as usize;

        let quantity = match offset % IDS_PER_TARGET {
            0 => TmQuantity::AngleDeg(frame.payload_f32()? as f64),
            1 => TmQuantity::VelocityDps(frame.payload_f32()? as f64),
            _ => {
                let byte = frame.payload_byte()?;

                // An unknown enumerant here means a protocol mismatch
                // between the two ends of the bus
                match ControlMode::from_wire(byte) {
                    Some(m) => TmQuantity::Mode(m),
                    None => return Err(FrameError::InvalidEnumerant(byte)),
                }
            }
        };

        Ok(Some(TmSample { target, quantity }))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn block() -> TmBlock {
        TmBlock {
            base_id: 0x400,
            num_targets: 2,
        }
    }

    #[test]
    fn test_quantities_get_consecutive_ids() {
        let angle = block()
            .encode(&TmSample {
                target: 1,
                quantity: TmQuantity::AngleDeg(90.0),
            })
            .unwrap();
        let vel = block()
            .encode(&TmSample {
                target: 1,
                quantity: TmQuantity::VelocityDps(5.0),
            })
            .unwrap();
        let mode = block()
            .encode(&TmSample {
                target: 1,
                quantity: TmQuantity::Mode(ControlMode::PositionPid),
            })
            .unwrap();

        assert_eq!(angle.id(), 0x403);
        assert_eq!(vel.id(), 0x404);
        assert_eq!(mode.id(), 0x405);
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let sample = TmSample {
            target: 0,
            quantity: TmQuantity::VelocityDps(-12.5),
        };

        let frame = block().encode(&sample).unwrap();
        let decoded = block().decode(&frame).unwrap().unwrap();

        assert_eq!(decoded.target, 0);
        match decoded.quantity {
            TmQuantity::VelocityDps(v) => assert!((v - -12.5).abs() < 1e-6),
            q => panic!("Expected a velocity sample, got {:?}", q),
        }
    }
}
