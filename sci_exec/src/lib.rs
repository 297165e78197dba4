//! # Science Board Library
//!
//! Control modules for the science payload actuators: the auger drill, the
//! sample centrifuge, the elevator lead screw, and the claw gripper, plus
//! the board dispatcher tying them to the CAN command/telemetry blocks.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

/// Open-loop auger drill actuator.
pub mod auger;

/// Board dispatcher, wiring and telemetry.
pub mod board;

/// Elevator lead-screw actuator with linear wire units.
pub mod elevator;

/// Parameters for the science executable.
pub mod params;
