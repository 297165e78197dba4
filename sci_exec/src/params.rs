//! # Science Executable Parameters

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;

use crate::auger::AugerParams;
use crate::elevator::ElevatorParams;
use act_ctrl::joint::JointParams;
use can_if::cmd::CmdBlock;
use can_if::tm::TmBlock;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters for the science board executable.
#[derive(Deserialize)]
pub struct SciExecParams {
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

    /// Auger drill.
    pub auger: AugerParams,

    /// Sample centrifuge joint.
    pub centrifuge: JointParams,

    /// Elevator lead screw.
    pub elevator: ElevatorParams,

    /// Claw gripper joint.
    pub claw: JointParams,

    /// Simulated plant configuration for desktop runs.
    pub sim: SciSimParams,
}

/// Parameters for the simulated science plants.
#[derive(Clone, Copy, Deserialize)]
pub struct SciSimParams {
    /// Plant angular rate at full duty.
    ///
    /// Units: degrees/second
    pub max_rate_dps: f64,

    /// True starting angle of the centrifuge plant.
    ///
    /// Units: degrees
    pub centrifuge_start_deg: f64,

    /// True starting angle of the elevator screw plant.
    ///
    /// Units: degrees
    pub elevator_start_deg: f64,

    /// True starting angle of the claw plant.
    ///
    /// Units: degrees
    pub claw_start_deg: f64,

    /// Plant angle at which the low-end home switches assert.
    ///
    /// Units: degrees
    pub home_switch_deg: f64,

    /// Plant angle at which the claw's closed switch asserts.
    ///
    /// Units: degrees
    pub claw_closed_deg: f64,
}
