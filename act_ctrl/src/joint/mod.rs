//! # Joint controller module
//!
//! One [`Joint`] owns one actuator: a motor port, an angle sensor, optional
//! travel limit switches, and the velocity/position PID engines. A
//! control-mode state machine guards which setters are legal and what the
//! periodic update drives the motor with.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use thiserror::Error;

// Internal
pub use params::*;
pub use state::*;

use can_if::ControlMode;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during joint operation.
#[derive(Debug, Error, PartialEq)]
pub enum JointError {
    #[error("Setter requires {required:?} mode but the joint is in {actual:?} mode")]
    InvalidOperation {
        required: ControlMode,
        actual: ControlMode,
    },

    #[error("Control mode {0:?} is not supported by this actuator")]
    UnsupportedMode(ControlMode),
}
