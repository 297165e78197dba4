//! # Differential wrist composite
//!
//! Two joints drive the wrist through a differential: rotating both the same
//! way pitches the head, rotating them against each other rolls it. The
//! composite maps roll/pitch demands onto the members with a fixed linear
//! mixing law and derives roll/pitch readback from the member angles:
//!
//! ```text
//! left  = -roll + pitch + bias        roll  = (right - left) / 2
//! right =  roll + pitch + bias        pitch = (left + right) / 2 - bias
//! ```
//!
//! The same law applies whatever the active mode, so a demand is a duty,
//! velocity or angle according to the members' current control mode.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
use act_ctrl::encoder::AngleSensor;
use act_ctrl::joint::{Joint, JointError};
use act_ctrl::ports::{MotorPort, TimerPort};
use can_if::ControlMode;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The differential wrist: two member joints plus the mixing trim.
pub struct DiffWrist<M, S, T>
where
    M: MotorPort,
    S: AngleSensor,
    T: TimerPort,
{
    left: Joint<M, S, T>,
    right: Joint<M, S, T>,

    /// Additive trim applied to both member targets, capturing static
    /// misalignment of the differential gearing.
    mix_bias: f64,

    /// Cached roll demand in the unit of the active mode.
    roll_dem: f64,

    /// Cached pitch demand in the unit of the active mode.
    pitch_dem: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<M, S, T> DiffWrist<M, S, T>
where
    M: MotorPort,
    S: AngleSensor,
    T: TimerPort,
{
    pub fn new(left: Joint<M, S, T>, right: Joint<M, S, T>, mix_bias: f64) -> Self {
        Self {
            left,
            right,
            mix_bias,
            roll_dem: 0.0,
            pitch_dem: 0.0,
        }
    }

    /// The composite control mode. The members are kept in lockstep; the
    /// left member is authoritative.
    pub fn control_mode(&self) -> ControlMode {
        self.left.control_mode()
    }

    /// Propagate a mode change to both members.
    ///
    /// Not transactional: if the second member rejects the transition the
    /// first is not rolled back, the members are left in inconsistent modes
    /// and the failure surfaces to the caller.
    pub fn set_control_mode(&mut self, mode: ControlMode) -> Result<(), JointError> {
        self.left.set_control_mode(mode)?;
        self.right.set_control_mode(mode)?;

        // Re-seed the cached demands so the first setter after a transition
        // does not mix values from the previous mode. In position mode the
        // members seeded themselves from measurement, mirror that here.
        match mode {
            ControlMode::PositionPid => {
                self.roll_dem = self.roll_deg();
                self.pitch_dem = self.pitch_deg();
            }
            _ => {
                self.roll_dem = 0.0;
                self.pitch_dem = 0.0;
            }
        }

        Ok(())
    }

    /// Demand a roll value in the unit of the active mode.
    pub fn set_roll(&mut self, roll: f64) -> Result<(), JointError> {
        self.roll_dem = roll;
        self.apply_mix()
    }

    /// Demand a pitch value in the unit of the active mode.
    pub fn set_pitch(&mut self, pitch: f64) -> Result<(), JointError> {
        self.pitch_dem = pitch;
        self.apply_mix()
    }

    /// Derived roll angle in degrees.
    pub fn roll_deg(&self) -> f64 {
        (self.right.angle_deg() - self.left.angle_deg()) / 2.0
    }

    /// Derived pitch angle in degrees.
    pub fn pitch_deg(&self) -> f64 {
        (self.left.angle_deg() + self.right.angle_deg()) / 2.0 - self.mix_bias
    }

    /// Derived roll rate in degrees/second.
    pub fn roll_dps(&self) -> f64 {
        (self.right.velocity_dps() - self.left.velocity_dps()) / 2.0
    }

    /// Derived pitch rate in degrees/second.
    pub fn pitch_dps(&self) -> f64 {
        (self.left.velocity_dps() + self.right.velocity_dps()) / 2.0
    }

    /// Read access to the members.
    pub fn members(&self) -> (&Joint<M, S, T>, &Joint<M, S, T>) {
        (&self.left, &self.right)
    }

    /// Mutable access to the members, used for boot homing.
    pub fn members_mut(&mut self) -> (&mut Joint<M, S, T>, &mut Joint<M, S, T>) {
        (&mut self.left, &mut self.right)
    }

    /// Tick both members once.
    pub fn update(&mut self) {
        self.left.update();
        self.right.update();
    }

    /// Push the cached demands through the mixing law into the members.
    fn apply_mix(&mut self) -> Result<(), JointError> {
        let left_target = -self.roll_dem + self.pitch_dem + self.mix_bias;
        let right_target = self.roll_dem + self.pitch_dem + self.mix_bias;

        self.left.apply_motion(left_target)?;
        self.right.apply_motion(right_target)
    }
}
