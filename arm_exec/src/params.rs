//! # Arm Executable Parameters

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;

use act_ctrl::joint::JointParams;
use can_if::cmd::CmdBlock;
use can_if::tm::TmBlock;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters for the arm board executable.
#[derive(Deserialize)]
pub struct ArmExecParams {
    /// Target period of one main loop cycle.
    ///
    /// Units: seconds
    pub cycle_period_s: f64,

    /// Period of telemetry emission.
    ///
    /// Units: seconds
    pub telem_period_s: f64,

    /// The board's command identifier block.
    pub cmd_block: CmdBlock,

    /// The board's telemetry identifier block.
    pub tm_block: TmBlock,

    /// Base rotation joint.
    pub base: JointParams,

    /// Shoulder joint.
    pub shoulder: JointParams,

    /// Elbow joint.
    pub elbow: JointParams,

    /// Differential wrist pair.
    pub wrist: WristParams,

    /// Simulated plant configuration for desktop runs.
    pub sim: SimParams,
}

/// Parameters for the differential wrist composite.
#[derive(Deserialize)]
pub struct WristParams {
    /// Left differential member.
    pub left: JointParams,

    /// Right differential member.
    pub right: JointParams,

    /// Additive trim applied to both member targets by the mixing law.
    pub mix_bias: f64,
}

/// Parameters for the simulated plants standing in for the real actuators.
#[derive(Clone, Copy, Deserialize)]
pub struct SimParams {
    /// Plant angular rate at full duty.
    ///
    /// Units: degrees/second
    pub max_rate_dps: f64,

    /// True starting angle of the wrist members, which the boot homing pass
    /// has to find its way back from.
    ///
    /// Units: degrees
    pub wrist_start_deg: f64,

    /// Plant angle at which the wrist home switches assert.
    ///
    /// Units: degrees
    pub wrist_switch_deg: f64,
}
