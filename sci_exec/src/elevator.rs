//! # Elevator lead-screw actuator
//!
//! The elevator raises and lowers the sample platform on a lead screw. The
//! underlying joint controller works in angular units like every other
//! actuator; this wrapper converts the linear wire units (millimetres and
//! millimetres/second) at the boundary so clients never see screw angles.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use serde::Deserialize;

// Internal
use act_ctrl::encoder::AngleSensor;
use act_ctrl::joint::{Joint, JointError, JointParams};
use act_ctrl::ports::{MotorPort, TimerPort};
use can_if::ControlMode;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters for the elevator.
#[derive(Clone, Debug, Deserialize)]
pub struct ElevatorParams {
    /// The underlying screw joint.
    pub joint: JointParams,

    /// Screw angle travelled per millimetre of platform travel.
    ///
    /// Units: degrees/millimetre
    pub deg_per_mm: f64,
}

/// The elevator: a joint plus the linear unit conversion.
pub struct Elevator<M, S, T>
where
    M: MotorPort,
    S: AngleSensor,
    T: TimerPort,
{
    joint: Joint<M, S, T>,
    deg_per_mm: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<M, S, T> Elevator<M, S, T>
where
    M: MotorPort,
    S: AngleSensor,
    T: TimerPort,
{
    pub fn new(joint: Joint<M, S, T>, deg_per_mm: f64) -> Self {
        Self { joint, deg_per_mm }
    }

    pub fn control_mode(&self) -> ControlMode {
        self.joint.control_mode()
    }

    pub fn set_control_mode(&mut self, mode: ControlMode) -> Result<(), JointError> {
        self.joint.set_control_mode(mode)
    }

    /// Route a motion demand, converting from the linear wire units.
    ///
    /// Duty demands pass straight through; velocity demands are mm/s and
    /// position demands are mm above the homed zero.
    pub fn apply_motion(&mut self, value: f64) -> Result<(), JointError> {
        match self.joint.control_mode() {
            ControlMode::DutyCycle => self.joint.set_duty_cycle(value),
            ControlMode::VelocityPid => self.joint.set_velocity_dps(value * self.deg_per_mm),
            ControlMode::PositionPid => self.joint.set_angle_deg(value * self.deg_per_mm),
        }
    }

    /// Platform height above the homed zero.
    ///
    /// Units: millimetres
    pub fn height_mm(&self) -> f64 {
        self.joint.angle_deg() / self.deg_per_mm
    }

    /// Platform rate of travel.
    ///
    /// Units: millimetres/second
    pub fn rate_mms(&self) -> f64 {
        self.joint.velocity_dps() / self.deg_per_mm
    }

    /// The underlying joint, used for boot homing.
    pub fn joint_mut(&mut self) -> &mut Joint<M, S, T> {
        &mut self.joint
    }

    /// Read access to the underlying joint.
    pub fn joint(&self) -> &Joint<M, S, T> {
        &self.joint
    }

    /// Tick the underlying joint once.
    pub fn update(&mut self) {
        self.joint.update();
    }
}
