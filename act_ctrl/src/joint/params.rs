//! Parameters structure for a joint controller

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::calib::HomingParams;
use can_if::ControlMode;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Gains for one PID engine.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize)]
pub struct PidGains {
    pub p: f64,
    pub i: f64,
    pub d: f64,
}

/// Parameters for one joint. Loaded once at startup and never mutated.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct JointParams {
    // ---- MOTOR ----

    /// True if a positive port duty cycle drives the measured angle down.
    ///
    /// With this set correctly a positive joint-frame duty always increases
    /// the measured angle, which the travel limit logic relies on.
    pub motor_inverted: bool,

    /// Lowest duty cycle the motor may be driven at.
    pub min_duty: f64,

    /// Highest duty cycle the motor may be driven at.
    pub max_duty: f64,

    // ---- ENCODER ----

    /// Which position sensor family the joint carries, and its calibration.
    pub encoder: EncoderParams,

    // ---- TRAVEL ----

    /// Lowest reachable angle.
    ///
    /// Units: degrees
    pub min_angle_deg: f64,

    /// Highest reachable angle.
    ///
    /// Units: degrees
    pub max_angle_deg: f64,

    /// Lowest velocity demand.
    ///
    /// Units: degrees/second
    pub min_velocity_dps: f64,

    /// Highest velocity demand.
    ///
    /// Units: degrees/second
    pub max_velocity_dps: f64,

    // ---- CONTROL ----

    /// Gains for the velocity loop.
    pub velocity_pid: PidGains,

    /// Gains for the position loop.
    pub position_pid: PidGains,

    /// Control mode entered at construction.
    pub initial_mode: ControlMode,

    /// Homing configuration, present for joints whose position reference
    /// must be established against a limit switch at boot.
    pub homing: Option<HomingParams>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Encoder calibration, one variant per sensor family.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EncoderParams {
    /// Duty-encoded absolute sensor.
    Absolute {
        /// Duty cycle reading at the zero-degree position.
        zero_duty: f64,

        /// True if the sensed duty decreases as the angle increases.
        inverted: bool,
    },

    /// Pulse-counting incremental sensor.
    Incremental {
        /// Pulses per output revolution, after gearing.
        pulses_per_rev: f64,

        /// True if the count decreases as the angle increases.
        inverted: bool,
    },
}
