//! # Actuator command identifier blocks
//!
//! Each actuator board owns a contiguous block of command identifiers.
//! Within a block, consecutive identifiers alternate between the two command
//! kinds for each target:
//!
//! ```text
//! base_id + 0: SetControlMode target 0
//! base_id + 1: SetMotion      target 0
//! base_id + 2: SetControlMode target 1
//! base_id + 3: SetMotion      target 1
//! ...
//! ```
//!
//! A SetControlMode payload is a single [`ControlMode`] enumerant byte. A
//! SetMotion payload is a little-endian `f32` whose meaning (duty fraction,
//! deg/s, degrees, mm) is fixed by the *current* control mode of the target
//! at the moment the command is dispatched, not by the frame itself.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};
use thiserror::Error;

// Internal
use crate::frame::{CanFrame, FrameError};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of command identifiers consumed by each target in a block.
pub const IDS_PER_TARGET: u16 = 2;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A board's command identifier block.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct CmdBlock {
    /// First identifier of the block.
    pub base_id: u16,

    /// Number of addressable targets in the block.
    pub num_targets: u16,
}

/// A decoded actuator command.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ActCmd {
    /// Index of the target actuator within the board's block.
    pub target: usize,

    /// What the command asks the target to do.
    pub kind: ActCmdKind,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Control modes an actuator can be commanded into.
///
/// The wire encoding of each variant is its enumerant byte, shared by both
/// ends of the bus.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlMode {
    /// Open-loop duty cycle drive.
    DutyCycle,

    /// Closed-loop angular velocity control.
    VelocityPid,

    /// Closed-loop angular position control.
    PositionPid,
}

/// The two kinds of actuator command.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ActCmdKind {
    /// Switch the target into the given control mode.
    SetControlMode(ControlMode),

    /// Demand a motion value, interpreted under the target's current mode.
    SetMotion(f64),
}

/// Errors raised while decoding a command frame.
#[derive(Debug, Error, PartialEq)]
pub enum CmdParseError {
    #[error("Unrecognised control mode enumerant: {0}")]
    UnknownControlMode(u8),

    #[error("Malformed command payload: {0}")]
    PayloadError(FrameError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ControlMode {
    /// Decode a wire enumerant byte.
    pub fn from_wire(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(ControlMode::DutyCycle),
            1 => Some(ControlMode::VelocityPid),
            2 => Some(ControlMode::PositionPid),
            _ => None,
        }
    }

    /// Encode as a wire enumerant byte.
    pub fn to_wire(self) -> u8 {
        match self {
            ControlMode::DutyCycle => 0,
            ControlMode::VelocityPid => 1,
            ControlMode::PositionPid => 2,
        }
    }
}

impl CmdBlock {
    /// True if the identifier falls inside this block.
    pub fn contains(&self, id: u16) -> bool {
        id >= self.base_id && id < self.base_id + self.num_targets * IDS_PER_TARGET
    }

    /// The SetControlMode identifier for the given target.
    pub fn set_control_mode_id(&self, target: usize) -> u16 {
        self.base_id + target as u16 * IDS_PER_TARGET
    }

    /// The SetMotion identifier for the given target.
    pub fn set_motion_id(&self, target: usize) -> u16 {
        self.base_id + target as u16 * IDS_PER_TARGET + 1
    }

    /// Decode a frame against this block.
    ///
    /// Returns `Ok(None)` for frames outside the block, which the caller
    /// should ignore, since other subsystems share the bus.
    pub fn decode(&self, frame: &CanFrame) -> Result<Option<ActCmd>, CmdParseError> {
        if !self.contains(frame.id()) {
            return Ok(None);
        }

        let offset = frame.id() - self.base_id;
        let target = (offset / IDS_PER_TARGET) as usize;

        let kind = if offset % IDS_PER_TARGET == 0 {
            let byte = frame
                .payload_byte()
                .map_err(CmdParseError::PayloadError)?;

            match ControlMode::from_wire(byte) {
                Some(m) => ActCmdKind::SetControlMode(m),
                None => return Err(CmdParseError::UnknownControlMode(byte)),
            }
        }
        else {
            let value = frame
                .payload_f32()
                .map_err(CmdParseError::PayloadError)?;

            ActCmdKind::SetMotion(value as f64)
        };

        Ok(Some(ActCmd { target, kind }))
    }

    /// Encode a command into a frame addressed at this block.
    ///
    /// This is the ground-side counterpart of [`decode`] and is also used by
    /// the board tests to build stimulus frames.
    pub fn encode(&self, cmd: &ActCmd) -> Result<CanFrame, FrameError> {
        match cmd.kind {
            ActCmdKind::SetControlMode(mode) => {
                CanFrame::from_byte(self.set_control_mode_id(cmd.target), mode.to_wire())
            }
            ActCmdKind::SetMotion(value) => {
                CanFrame::from_f32(self.set_motion_id(cmd.target), value as f32)
            }
        }
    }
}
