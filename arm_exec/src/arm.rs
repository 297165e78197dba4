//! # 3-DOF arm aggregate
//!
//! Base, shoulder and elbow are independent joints; unlike the wrist there
//! is no mixing law between them. The aggregate only provides indexed access
//! and collective cyclic processing.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
use act_ctrl::encoder::AngleSensor;
use act_ctrl::joint::Joint;
use act_ctrl::ports::{MotorPort, TimerPort};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// The number of joints in the arm aggregate.
pub const NUM_ARM_JOINTS: usize = 3;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Index newtype for the arm's joints.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArmJoint {
    Base,
    Shoulder,
    Elbow,
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The three arm joints, owned by value and addressed by [`ArmJoint`].
pub struct Arm<M, S, T>
where
    M: MotorPort,
    S: AngleSensor,
    T: TimerPort,
{
    joints: [Joint<M, S, T>; NUM_ARM_JOINTS],
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ArmJoint {
    /// All joints in dispatch order.
    pub const ALL: [ArmJoint; NUM_ARM_JOINTS] =
        [ArmJoint::Base, ArmJoint::Shoulder, ArmJoint::Elbow];

    /// Map a dispatch target index onto a joint.
    pub fn from_index(index: usize) -> Option<Self> {
        ArmJoint::ALL.get(index).copied()
    }

    /// Name used in logs and the boot report.
    pub fn name(self) -> &'static str {
        match self {
            ArmJoint::Base => "base",
            ArmJoint::Shoulder => "shoulder",
            ArmJoint::Elbow => "elbow",
        }
    }

    fn index(self) -> usize {
        match self {
            ArmJoint::Base => 0,
            ArmJoint::Shoulder => 1,
            ArmJoint::Elbow => 2,
        }
    }
}

impl<M, S, T> Arm<M, S, T>
where
    M: MotorPort,
    S: AngleSensor,
    T: TimerPort,
{
    pub fn new(
        base: Joint<M, S, T>,
        shoulder: Joint<M, S, T>,
        elbow: Joint<M, S, T>,
    ) -> Self {
        Self {
            joints: [base, shoulder, elbow],
        }
    }

    pub fn joint(&self, joint: ArmJoint) -> &Joint<M, S, T> {
        &self.joints[joint.index()]
    }

    pub fn joint_mut(&mut self, joint: ArmJoint) -> &mut Joint<M, S, T> {
        &mut self.joints[joint.index()]
    }

    /// Tick every joint once.
    pub fn update(&mut self) {
        for joint in self.joints.iter_mut() {
            joint.update();
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use act_ctrl::encoder::AbsoluteEncoder;
    use act_ctrl::joint::{EncoderParams, JointParams, PidGains};
    use act_ctrl::sim::{SimAbsEncoder, SimMotor, SimTime, SimTimer};
    use can_if::ControlMode;

    fn joint_params() -> JointParams {
        JointParams {
            motor_inverted: false,
            min_duty: -1.0,
            max_duty: 1.0,
            encoder: EncoderParams::Absolute {
                zero_duty: 0.5,
                inverted: false,
            },
            min_angle_deg: -90.0,
            max_angle_deg: 90.0,
            min_velocity_dps: -30.0,
            max_velocity_dps: 30.0,
            velocity_pid: PidGains {
                p: 0.01,
                i: 0.0,
                d: 0.0,
            },
            position_pid: PidGains {
                p: 0.05,
                i: 0.0,
                d: 0.0,
            },
            initial_mode: ControlMode::DutyCycle,
            homing: None,
        }
    }

    fn sim_joint(
        time: &SimTime,
    ) -> Joint<SimMotor, AbsoluteEncoder<SimAbsEncoder>, SimTimer> {
        let motor = SimMotor::new();
        let enc = SimAbsEncoder::new();
        let sensor = AbsoluteEncoder::new(enc, 0.5, false);
        Joint::new(joint_params(), motor, sensor, SimTimer::new(time.clone()))
    }

    #[test]
    fn test_joints_are_independent() {
        let time = SimTime::new();
        let mut arm = Arm::new(sim_joint(&time), sim_joint(&time), sim_joint(&time));

        // Mode changes address exactly one member
        arm.joint_mut(ArmJoint::Shoulder)
            .set_control_mode(ControlMode::VelocityPid)
            .unwrap();

        assert_eq!(
            arm.joint(ArmJoint::Base).control_mode(),
            ControlMode::DutyCycle
        );
        assert_eq!(
            arm.joint(ArmJoint::Shoulder).control_mode(),
            ControlMode::VelocityPid
        );
        assert_eq!(
            arm.joint(ArmJoint::Elbow).control_mode(),
            ControlMode::DutyCycle
        );
    }

    #[test]
    fn test_target_index_mapping() {
        assert_eq!(ArmJoint::from_index(0), Some(ArmJoint::Base));
        assert_eq!(ArmJoint::from_index(2), Some(ArmJoint::Elbow));
        assert_eq!(ArmJoint::from_index(3), None);
    }
}
