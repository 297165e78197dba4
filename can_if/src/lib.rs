//! # CAN Interface Library
//!
//! This library provides the CAN-bus command and telemetry protocol shared by
//! all actuator boards and the ground side. It defines the frame model, the
//! typed little-endian payload encoding, the command identifier blocks, the
//! telemetry identifier blocks, and the transport abstraction.
//!
//! Transport setup (bitrate, filters, pin mapping) is the responsibility of
//! the board support layer; this crate only deals in [`frame::CanFrame`]s.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod bus;
pub mod cmd;
pub mod frame;
pub mod tm;

// ---------------------------------------------------------------------------
// REEXPORTS
// ---------------------------------------------------------------------------

pub use cmd::ControlMode;
pub use frame::CanFrame;
