//! # Arm board dispatcher
//!
//! Ties the board's CAN identifier blocks to the controllers: inbound frames
//! are decoded and routed to the addressed target, telemetry is collected
//! from every target, and the boot homing pass is sequenced from here.
//!
//! Dispatch target order on the wire:
//!
//! ```text
//! 0: base    1: shoulder    2: elbow    3: wrist roll    4: wrist pitch
//! ```
//!
//! Bad frames are logged and dropped; nothing a client sends can halt the
//! control loop.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use log::{info, trace, warn};
use serde::Serialize;
use thiserror::Error;

// Internal
use crate::arm::{Arm, ArmJoint};
use crate::params::ArmExecParams;
use crate::wrist::DiffWrist;
use act_ctrl::calib;
use act_ctrl::encoder::{AbsoluteEncoder, AngleSensor, IncrementalEncoder};
use act_ctrl::joint::{EncoderParams, Joint, JointError, JointParams};
use act_ctrl::ports::{MotorPort, TimerPort};
use act_ctrl::sim::{
    AngleSwitch, SimAbsEncoder, SimIncEncoder, SimJointPlant, SimMotor, SimWorld,
};
use can_if::cmd::{ActCmd, ActCmdKind, CmdBlock};
use can_if::frame::CanFrame;
use can_if::tm::{TmBlock, TmQuantity, TmSample};
use can_if::ControlMode;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Number of dispatch targets behind this board.
pub const NUM_TARGETS: usize = 5;

// ------------------------------------------------------------------------------------------------
// TYPES
// ------------------------------------------------------------------------------------------------

type AbsJoint<T> = Joint<SimMotor, AbsoluteEncoder<SimAbsEncoder>, T>;
type IncJoint<T> = Joint<SimMotor, IncrementalEncoder<SimIncEncoder>, T>;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The arm board: three arm joints, the wrist pair, and the wire blocks.
pub struct ArmBoard<T: TimerPort> {
    cmd_block: CmdBlock,
    tm_block: TmBlock,

    arm: Arm<SimMotor, AbsoluteEncoder<SimAbsEncoder>, T>,
    wrist: DiffWrist<SimMotor, IncrementalEncoder<SimIncEncoder>, T>,
}

/// Record of the boot calibration pass, saved into the session.
#[derive(Debug, Serialize)]
pub struct BootReport {
    pub entries: Vec<BootEntry>,
}

/// Outcome of one joint's homing pass.
#[derive(Debug, Serialize)]
pub struct BootEntry {
    pub target: String,
    pub homed: bool,
    pub detail: String,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Errors which can occur while building the board.
#[derive(Debug, Error)]
pub enum BoardInitError {
    #[error("Joint \"{0}\" requires an {1} encoder in its parameter file")]
    EncoderMismatch(&'static str, &'static str),
}

/// The actuator behind a dispatch target index.
#[derive(Clone, Copy, Debug)]
enum ArmTarget {
    Joint(ArmJoint),
    WristRoll,
    WristPitch,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ArmTarget {
    fn from_index(index: usize) -> Option<Self> {
        match index {
            0..=2 => ArmJoint::from_index(index).map(ArmTarget::Joint),
            3 => Some(ArmTarget::WristRoll),
            4 => Some(ArmTarget::WristPitch),
            _ => None,
        }
    }
}

impl<T: TimerPort> ArmBoard<T> {
    /// Build the board and the simulated world standing in for its hardware.
    pub fn new(
        params: &ArmExecParams,
        mut make_timer: impl FnMut() -> T,
    ) -> Result<(Self, SimWorld), BoardInitError> {
        let mut world = SimWorld::new();

        let base = abs_joint("base", &params.base, &params.sim, &mut world, make_timer())?;
        let shoulder = abs_joint(
            "shoulder",
            &params.shoulder,
            &params.sim,
            &mut world,
            make_timer(),
        )?;
        let elbow = abs_joint("elbow", &params.elbow, &params.sim, &mut world, make_timer())?;

        let left = inc_joint(
            "wrist_left",
            &params.wrist.left,
            &params.sim,
            &mut world,
            make_timer(),
        )?;
        let right = inc_joint(
            "wrist_right",
            &params.wrist.right,
            &params.sim,
            &mut world,
            make_timer(),
        )?;

        Ok((
            Self {
                cmd_block: params.cmd_block,
                tm_block: params.tm_block,
                arm: Arm::new(base, shoulder, elbow),
                wrist: DiffWrist::new(left, right, params.wrist.mix_bias),
            },
            world,
        ))
    }

    /// The arm aggregate.
    pub fn arm(&self) -> &Arm<SimMotor, AbsoluteEncoder<SimAbsEncoder>, T> {
        &self.arm
    }

    /// The wrist composite.
    pub fn wrist(&self) -> &DiffWrist<SimMotor, IncrementalEncoder<SimIncEncoder>, T> {
        &self.wrist
    }

    /// Decode and dispatch one inbound frame.
    ///
    /// Frames outside the board's block are ignored; malformed or rejected
    /// commands are logged and dropped.
    pub fn handle_frame(&mut self, frame: &CanFrame) {
        let cmd = match self.cmd_block.decode(frame) {
            Ok(Some(cmd)) => cmd,
            Ok(None) => return,
            Err(e) => {
                warn!("Dropping malformed command frame {:#X}: {}", frame.id(), e);
                return;
            }
        };

        if let Err(e) = self.dispatch(&cmd) {
            warn!("Dropping command for target {}: {}", cmd.target, e);
        }
    }

    /// Tick every controller once.
    pub fn update(&mut self) {
        self.arm.update();
        self.wrist.update();
    }

    /// Encode one telemetry frame per quantity per target.
    pub fn collect_telemetry(&self) -> Vec<CanFrame> {
        let mut frames = Vec::with_capacity(NUM_TARGETS * 3);

        for joint_id in ArmJoint::ALL.iter() {
            let joint = self.arm.joint(*joint_id);
            self.push_target_tm(
                &mut frames,
                *joint_id as usize,
                joint.angle_deg(),
                joint.velocity_dps(),
                joint.control_mode(),
            );
        }

        self.push_target_tm(
            &mut frames,
            3,
            self.wrist.roll_deg(),
            self.wrist.roll_dps(),
            self.wrist.control_mode(),
        );
        self.push_target_tm(
            &mut frames,
            4,
            self.wrist.pitch_deg(),
            self.wrist.pitch_dps(),
            self.wrist.control_mode(),
        );

        frames
    }

    /// Home every joint which carries a homing configuration.
    ///
    /// A joint that misses its switch is left in DutyCycle: position control
    /// of an unreferenced joint is a precondition violation, so the degraded
    /// joint stays drivable open-loop only.
    pub fn home_all(&mut self, timer: &mut impl TimerPort) -> BootReport {
        let mut entries = Vec::new();

        for joint_id in ArmJoint::ALL.iter() {
            entries.push(home_one(
                joint_id.name(),
                self.arm.joint_mut(*joint_id),
                timer,
            ));
        }

        let (left, right) = self.wrist.members_mut();
        entries.push(home_one("wrist_left", left, timer));
        entries.push(home_one("wrist_right", right, timer));

        BootReport { entries }
    }

    fn dispatch(&mut self, cmd: &ActCmd) -> Result<(), JointError> {
        let target = match ArmTarget::from_index(cmd.target) {
            Some(t) => t,
            None => {
                // Identifier block wider than the target table
                warn!("No actuator behind command target {}", cmd.target);
                return Ok(());
            }
        };

        trace!("Command for {:?}: {:?}", target, cmd.kind);

        match (target, cmd.kind) {
            (ArmTarget::Joint(j), ActCmdKind::SetControlMode(mode)) => {
                self.arm.joint_mut(j).set_control_mode(mode)
            }
            (ArmTarget::Joint(j), ActCmdKind::SetMotion(value)) => {
                self.arm.joint_mut(j).apply_motion(value)
            }
            (ArmTarget::WristRoll, ActCmdKind::SetControlMode(mode))
            | (ArmTarget::WristPitch, ActCmdKind::SetControlMode(mode)) => {
                self.wrist.set_control_mode(mode)
            }
            (ArmTarget::WristRoll, ActCmdKind::SetMotion(value)) => self.wrist.set_roll(value),
            (ArmTarget::WristPitch, ActCmdKind::SetMotion(value)) => self.wrist.set_pitch(value),
        }
    }

    fn push_target_tm(
        &self,
        frames: &mut Vec<CanFrame>,
        target: usize,
        angle_deg: f64,
        velocity_dps: f64,
        mode: ControlMode,
    ) {
        let samples = [
            TmQuantity::AngleDeg(angle_deg),
            TmQuantity::VelocityDps(velocity_dps),
            TmQuantity::Mode(mode),
        ];

        for quantity in samples.iter().copied() {
            match self.tm_block.encode(&TmSample { target, quantity }) {
                Ok(frame) => frames.push(frame),
                Err(e) => warn!("Could not encode telemetry for target {}: {}", target, e),
            }
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Wire up one absolute-encoder joint and its simulated plant.
fn abs_joint<T: TimerPort>(
    name: &'static str,
    params: &JointParams,
    sim: &crate::params::SimParams,
    world: &mut SimWorld,
    timer: T,
) -> Result<AbsJoint<T>, BoardInitError> {
    let (zero_duty, inverted) = match params.encoder {
        EncoderParams::Absolute {
            zero_duty,
            inverted,
        } => (zero_duty, inverted),
        _ => return Err(BoardInitError::EncoderMismatch(name, "absolute")),
    };

    let motor = SimMotor::new();
    let encoder = SimAbsEncoder::new();
    world.add(SimJointPlant::absolute(
        &motor,
        &encoder,
        zero_duty,
        sim.max_rate_dps,
        0.0,
    ));

    Ok(Joint::new(
        params.clone(),
        motor,
        AbsoluteEncoder::new(encoder, zero_duty, inverted),
        timer,
    ))
}

/// Wire up one incremental-encoder joint, its plant, and its home switch.
fn inc_joint<T: TimerPort>(
    name: &'static str,
    params: &JointParams,
    sim: &crate::params::SimParams,
    world: &mut SimWorld,
    timer: T,
) -> Result<IncJoint<T>, BoardInitError> {
    let (pulses_per_rev, inverted) = match params.encoder {
        EncoderParams::Incremental {
            pulses_per_rev,
            inverted,
        } => (pulses_per_rev, inverted),
        _ => return Err(BoardInitError::EncoderMismatch(name, "incremental")),
    };

    let motor = SimMotor::new();
    let encoder = SimIncEncoder::new();

    // Start positions and switch thresholds are given in the measured
    // frame; an inverted encoder mirrors both onto the plant frame
    let (plant_start_deg, switch_plant_deg) = if inverted {
        (-sim.wrist_start_deg, -sim.wrist_switch_deg)
    }
    else {
        (sim.wrist_start_deg, sim.wrist_switch_deg)
    };

    let plant = SimJointPlant::incremental(
        &motor,
        &encoder,
        pulses_per_rev,
        sim.max_rate_dps,
        plant_start_deg,
    );
    let switch = if inverted {
        AngleSwitch::above(plant.angle_handle(), switch_plant_deg)
    }
    else {
        AngleSwitch::below(plant.angle_handle(), switch_plant_deg)
    };
    world.add(plant);

    Ok(Joint::new(
        params.clone(),
        motor,
        IncrementalEncoder::new(encoder, pulses_per_rev, inverted),
        timer,
    )
    .with_min_switch(switch))
}

/// Run one joint's homing pass and record the outcome.
fn home_one<M, S, T, HT>(
    name: &str,
    joint: &mut Joint<M, S, T>,
    timer: &mut HT,
) -> BootEntry
where
    M: MotorPort,
    S: AngleSensor,
    T: TimerPort,
    HT: TimerPort,
{
    match joint.homing_params() {
        None => BootEntry {
            target: String::from(name),
            homed: joint.referenced(),
            detail: String::from("no homing required"),
        },
        Some(homing) => match calib::home(joint, timer, &homing) {
            Ok(()) => {
                info!("{} homed", name);
                BootEntry {
                    target: String::from(name),
                    homed: true,
                    detail: String::from("zeroed at limit switch"),
                }
            }
            Err(e) => {
                if joint.set_control_mode(ControlMode::DutyCycle).is_err() {
                    warn!("Could not force {} into DutyCycle after failed homing", name);
                }
                BootEntry {
                    target: String::from(name),
                    homed: false,
                    detail: e.to_string(),
                }
            }
        },
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use act_ctrl::calib::{HomingParams, TravelEnd};
    use act_ctrl::joint::PidGains;
    use act_ctrl::sim::{CoSimTimer, SimTime, SimTimer};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn abs_params() -> JointParams {
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

    fn inc_params() -> JointParams {
        JointParams {
            encoder: EncoderParams::Incremental {
                pulses_per_rev: 1440.0,
                inverted: false,
            },
            min_angle_deg: 0.0,
            max_angle_deg: 180.0,
            homing: Some(HomingParams {
                duty: -0.4,
                timeout_s: 2.0,
                end: TravelEnd::Min,
            }),
            ..abs_params()
        }
    }

    fn exec_params() -> ArmExecParams {
        ArmExecParams {
            cycle_period_s: 0.01,
            telem_period_s: 0.1,
            cmd_block: CmdBlock {
                base_id: 0x100,
                num_targets: NUM_TARGETS as u16,
            },
            tm_block: TmBlock {
                base_id: 0x400,
                num_targets: NUM_TARGETS as u16,
            },
            base: abs_params(),
            shoulder: abs_params(),
            elbow: abs_params(),
            wrist: crate::params::WristParams {
                left: inc_params(),
                right: inc_params(),
                mix_bias: 0.0,
            },
            sim: crate::params::SimParams {
                max_rate_dps: 90.0,
                wrist_start_deg: 20.0,
                wrist_switch_deg: 0.0,
            },
        }
    }

    fn board(
        time: &SimTime,
    ) -> (ArmBoard<SimTimer>, SimWorld) {
        let time = time.clone();
        ArmBoard::new(&exec_params(), move || SimTimer::new(time.clone())).unwrap()
    }

    #[test]
    fn test_set_motion_meaning_follows_mode() {
        let time = SimTime::new();
        let (mut board, _world) = board(&time);

        // In DutyCycle the motion value is a duty fraction
        board.handle_frame(&CanFrame::from_f32(0x101, 0.5).unwrap());
        assert!((board.arm().joint(ArmJoint::Base).motor_duty() - 0.5).abs() < 1e-9);

        // Switch base into VelocityPid: the transition stops the motor
        board.handle_frame(
            &CanFrame::from_byte(0x100, ControlMode::VelocityPid.to_wire()).unwrap(),
        );
        assert_eq!(
            board.arm().joint(ArmJoint::Base).control_mode(),
            ControlMode::VelocityPid
        );
        assert_eq!(board.arm().joint(ArmJoint::Base).motor_duty(), 0.0);

        // The identical motion payload now means degrees/second: one update
        // later the motor carries the velocity loop's output (P = 0.01 on a
        // 15 dps error), not the raw value
        board.handle_frame(&CanFrame::from_f32(0x101, 15.0).unwrap());
        time.advance(0.01);
        board.update();
        assert!((board.arm().joint(ArmJoint::Base).motor_duty() - 0.15).abs() < 1e-6);
    }

    #[test]
    fn test_malformed_frames_are_dropped() {
        let time = SimTime::new();
        let (mut board, _world) = board(&time);

        // Unknown mode enumerant
        board.handle_frame(&CanFrame::from_byte(0x100, 9).unwrap());
        // Short SetMotion payload
        board.handle_frame(&CanFrame::new(0x101, &[0x00, 0x01]).unwrap());
        // Frame outside the block
        board.handle_frame(&CanFrame::from_byte(0x700, 1).unwrap());

        // Nothing changed and nothing panicked
        assert_eq!(
            board.arm().joint(ArmJoint::Base).control_mode(),
            ControlMode::DutyCycle
        );
        assert_eq!(board.arm().joint(ArmJoint::Base).motor_duty(), 0.0);
    }

    #[test]
    fn test_wrist_targets_mix_demands() {
        let time = SimTime::new();
        let (mut board, _world) = board(&time);

        // Roll duty demand on target 3 reaches both members sign-split
        board.handle_frame(&CanFrame::from_f32(0x107, 0.2).unwrap());

        let (left, right) = board.wrist().members();
        assert!((left.motor_duty() - -0.2).abs() < 1e-9);
        assert!((right.motor_duty() - 0.2).abs() < 1e-9);

        // Mode change on the pitch target reaches both members
        board.handle_frame(
            &CanFrame::from_byte(0x108, ControlMode::VelocityPid.to_wire()).unwrap(),
        );
        assert_eq!(board.wrist().control_mode(), ControlMode::VelocityPid);
    }

    #[test]
    fn test_telemetry_covers_every_target() {
        let time = SimTime::new();
        let (mut board, _world) = board(&time);

        time.advance(0.01);
        board.update();

        let frames = board.collect_telemetry();
        assert_eq!(frames.len(), NUM_TARGETS * 3);

        // One identifier per quantity, consecutively from the block base
        for (i, frame) in frames.iter().enumerate() {
            assert_eq!(frame.id(), 0x400 + i as u16);
        }
    }

    #[test]
    fn test_boot_homing_references_the_wrist() {
        let time = SimTime::new();
        let (mut board, world) = board(&time);
        let world = Rc::new(RefCell::new(world));

        let mut timer = CoSimTimer::new(SimTimer::auto_tick(time.clone(), 0.01), world);
        let report = board.home_all(&mut timer);

        assert_eq!(report.entries.len(), 5);

        // The absolute joints need no pass, the wrist members found their
        // switches and now read zero at them
        assert!(report.entries[0].homed);
        assert!(report.entries[3].homed);
        assert!(report.entries[4].homed);

        let wrist = board.wrist();
        assert!(wrist.pitch_deg().abs() < 1.0);
        assert!(wrist.roll_deg().abs() < 1.0);
    }

    #[test]
    fn test_failed_homing_leaves_joint_in_duty_cycle() {
        let time = SimTime::new();
        let (mut board, _world) = board(&time);

        // Without co-simulation the plants never move, so the switches never
        // assert and both passes run out their budget
        let mut timer = SimTimer::auto_tick(time.clone(), 0.01);
        let report = board.home_all(&mut timer);

        assert!(!report.entries[3].homed);
        assert!(!report.entries[4].homed);
        assert_eq!(board.wrist().control_mode(), ControlMode::DutyCycle);
    }
}
