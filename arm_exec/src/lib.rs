//! # Arm Board Library
//!
//! Control modules for the arm board: the 3-DOF arm aggregate (base,
//! shoulder, elbow), the differential wrist composite, and the board
//! dispatcher tying the CAN command/telemetry blocks to the controllers.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

/// 3-DOF arm aggregate.
pub mod arm;

/// Board dispatcher, wiring and telemetry.
pub mod board;

/// Parameters for the arm executable.
pub mod params;

/// Differential wrist composite.
pub mod wrist;
