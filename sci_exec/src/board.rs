//! # Science board dispatcher
//!
//! Routes the board's CAN command block onto the science actuators and
//! collects their telemetry. Dispatch target order on the wire:
//!
//! ```text
//! 0: auger    1: centrifuge    2: elevator    3: claw
//! ```
//!
//! The elevator's motion and telemetry units are millimetres; the auger is
//! open loop and reports only its mode. Bad frames are logged and dropped.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use log::{info, trace, warn};
use serde::Serialize;
use thiserror::Error;

// Internal
use crate::auger::Auger;
use crate::elevator::Elevator;
use crate::params::{SciExecParams, SciSimParams};
use act_ctrl::calib;
use act_ctrl::encoder::{AngleSensor, IncrementalEncoder};
use act_ctrl::joint::{EncoderParams, Joint, JointError, JointParams};
use act_ctrl::ports::{MotorPort, TimerPort};
use act_ctrl::sim::{AngleSwitch, SimIncEncoder, SimJointPlant, SimMotor, SimWorld};
use can_if::cmd::{ActCmd, ActCmdKind, CmdBlock};
use can_if::frame::CanFrame;
use can_if::tm::{TmBlock, TmQuantity, TmSample};
use can_if::ControlMode;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Number of dispatch targets behind this board.
pub const NUM_TARGETS: usize = 4;

// ------------------------------------------------------------------------------------------------
// TYPES
// ------------------------------------------------------------------------------------------------

type IncJoint<T> = Joint<SimMotor, IncrementalEncoder<SimIncEncoder>, T>;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The science board: four payload actuators and the wire blocks.
pub struct SciBoard<T: TimerPort> {
    cmd_block: CmdBlock,
    tm_block: TmBlock,

    auger: Auger<SimMotor>,
    centrifuge: IncJoint<T>,
    elevator: Elevator<SimMotor, IncrementalEncoder<SimIncEncoder>, T>,
    claw: IncJoint<T>,
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
    #[error("Joint \"{0}\" requires an incremental encoder in its parameter file")]
    EncoderMismatch(&'static str),
}

/// The actuator behind a dispatch target index.
#[derive(Clone, Copy, Debug)]
enum SciTarget {
    Auger,
    Centrifuge,
    Elevator,
    Claw,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SciTarget {
    fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(SciTarget::Auger),
            1 => Some(SciTarget::Centrifuge),
            2 => Some(SciTarget::Elevator),
            3 => Some(SciTarget::Claw),
            _ => None,
        }
    }
}

impl<T: TimerPort> SciBoard<T> {
    /// Build the board and the simulated world standing in for its hardware.
    pub fn new(
        params: &SciExecParams,
        mut make_timer: impl FnMut() -> T,
    ) -> Result<(Self, SimWorld), BoardInitError> {
        let mut world = SimWorld::new();

        let auger = Auger::new(params.auger, SimMotor::new());

        let centrifuge = inc_joint(
            "centrifuge",
            &params.centrifuge,
            &params.sim,
            params.sim.centrifuge_start_deg,
            None,
            &mut world,
            make_timer(),
        )?;

        let elevator_joint = inc_joint(
            "elevator",
            &params.elevator.joint,
            &params.sim,
            params.sim.elevator_start_deg,
            None,
            &mut world,
            make_timer(),
        )?;
        let elevator = Elevator::new(elevator_joint, params.elevator.deg_per_mm);

        // The claw also carries a switch at the closed end of travel
        let claw = inc_joint(
            "claw",
            &params.claw,
            &params.sim,
            params.sim.claw_start_deg,
            Some(params.sim.claw_closed_deg),
            &mut world,
            make_timer(),
        )?;

        Ok((
            Self {
                cmd_block: params.cmd_block,
                tm_block: params.tm_block,
                auger,
                centrifuge,
                elevator,
                claw,
            },
            world,
        ))
    }

    pub fn auger(&self) -> &Auger<SimMotor> {
        &self.auger
    }

    pub fn centrifuge(&self) -> &IncJoint<T> {
        &self.centrifuge
    }

    pub fn elevator(&self) -> &Elevator<SimMotor, IncrementalEncoder<SimIncEncoder>, T> {
        &self.elevator
    }

    pub fn claw(&self) -> &IncJoint<T> {
        &self.claw
    }

    /// Decode and dispatch one inbound frame.
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
        self.centrifuge.update();
        self.elevator.update();
        self.claw.update();
    }

    /// Encode telemetry for every target.
    ///
    /// The auger has nothing to measure, so it reports only its mode; the
    /// elevator reports millimetres in the angle/velocity slots.
    pub fn collect_telemetry(&self) -> Vec<CanFrame> {
        let mut frames = Vec::with_capacity(NUM_TARGETS * 3);

        self.push_sample(
            &mut frames,
            TmSample {
                target: 0,
                quantity: TmQuantity::Mode(self.auger.control_mode()),
            },
        );

        self.push_target_tm(
            &mut frames,
            1,
            self.centrifuge.angle_deg(),
            self.centrifuge.velocity_dps(),
            self.centrifuge.control_mode(),
        );
        self.push_target_tm(
            &mut frames,
            2,
            self.elevator.height_mm(),
            self.elevator.rate_mms(),
            self.elevator.control_mode(),
        );
        self.push_target_tm(
            &mut frames,
            3,
            self.claw.angle_deg(),
            self.claw.velocity_dps(),
            self.claw.control_mode(),
        );

        frames
    }

    /// Home every joint which carries a homing configuration.
    pub fn home_all(&mut self, timer: &mut impl TimerPort) -> BootReport {
        let mut entries = Vec::new();

        entries.push(home_one("centrifuge", &mut self.centrifuge, timer));
        entries.push(home_one("elevator", self.elevator.joint_mut(), timer));
        entries.push(home_one("claw", &mut self.claw, timer));

        BootReport { entries }
    }

    fn dispatch(&mut self, cmd: &ActCmd) -> Result<(), JointError> {
        let target = match SciTarget::from_index(cmd.target) {
            Some(t) => t,
            None => {
                warn!("No actuator behind command target {}", cmd.target);
                return Ok(());
            }
        };

        trace!("Command for {:?}: {:?}", target, cmd.kind);

        match (target, cmd.kind) {
            (SciTarget::Auger, ActCmdKind::SetControlMode(mode)) => {
                self.auger.set_control_mode(mode)
            }
            (SciTarget::Auger, ActCmdKind::SetMotion(value)) => self.auger.apply_motion(value),
            (SciTarget::Centrifuge, ActCmdKind::SetControlMode(mode)) => {
                self.centrifuge.set_control_mode(mode)
            }
            (SciTarget::Centrifuge, ActCmdKind::SetMotion(value)) => {
                self.centrifuge.apply_motion(value)
            }
            (SciTarget::Elevator, ActCmdKind::SetControlMode(mode)) => {
                self.elevator.set_control_mode(mode)
            }
            (SciTarget::Elevator, ActCmdKind::SetMotion(value)) => {
                self.elevator.apply_motion(value)
            }
            (SciTarget::Claw, ActCmdKind::SetControlMode(mode)) => {
                self.claw.set_control_mode(mode)
            }
            (SciTarget::Claw, ActCmdKind::SetMotion(value)) => self.claw.apply_motion(value),
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
            self.push_sample(frames, TmSample { target, quantity });
        }
    }

    fn push_sample(&self, frames: &mut Vec<CanFrame>, sample: TmSample) {
        match self.tm_block.encode(&sample) {
            Ok(frame) => frames.push(frame),
            Err(e) => warn!(
                "Could not encode telemetry for target {}: {}",
                sample.target, e
            ),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Wire up one incremental-encoder joint, its plant, its home switch, and
/// optionally a switch at the far end of travel.
fn inc_joint<T: TimerPort>(
    name: &'static str,
    params: &JointParams,
    sim: &SciSimParams,
    start_deg: f64,
    max_switch_deg: Option<f64>,
    world: &mut SimWorld,
    timer: T,
) -> Result<IncJoint<T>, BoardInitError> {
    let (pulses_per_rev, inverted) = match params.encoder {
        EncoderParams::Incremental {
            pulses_per_rev,
            inverted,
        } => (pulses_per_rev, inverted),
        _ => return Err(BoardInitError::EncoderMismatch(name)),
    };

    let motor = SimMotor::new();
    let encoder = SimIncEncoder::new();

    // Start positions and switch thresholds are given in the measured
    // frame; an inverted encoder mirrors both onto the plant frame
    let plant_start_deg = if inverted { -start_deg } else { start_deg };
    let plant = SimJointPlant::incremental(
        &motor,
        &encoder,
        pulses_per_rev,
        sim.max_rate_dps,
        plant_start_deg,
    );

    let min_switch = if inverted {
        AngleSwitch::above(plant.angle_handle(), -sim.home_switch_deg)
    }
    else {
        AngleSwitch::below(plant.angle_handle(), sim.home_switch_deg)
    };
    let max_switch = max_switch_deg.map(|deg| {
        if inverted {
            AngleSwitch::below(plant.angle_handle(), -deg)
        }
        else {
            AngleSwitch::above(plant.angle_handle(), deg)
        }
    });
    world.add(plant);

    let mut joint = Joint::new(
        params.clone(),
        motor,
        IncrementalEncoder::new(encoder, pulses_per_rev, inverted),
        timer,
    )
    .with_min_switch(min_switch);
    if let Some(switch) = max_switch {
        joint = joint.with_max_switch(switch);
    }

    Ok(joint)
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
    use crate::auger::AugerParams;
    use crate::elevator::ElevatorParams;
    use act_ctrl::calib::{HomingParams, TravelEnd};
    use act_ctrl::joint::PidGains;
    use act_ctrl::sim::{CoSimTimer, SimTime, SimTimer};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn inc_params(max_angle_deg: f64) -> JointParams {
        JointParams {
            motor_inverted: false,
            min_duty: -1.0,
            max_duty: 1.0,
            encoder: EncoderParams::Incremental {
                pulses_per_rev: 1440.0,
                inverted: false,
            },
            min_angle_deg: 0.0,
            max_angle_deg,
            min_velocity_dps: -180.0,
            max_velocity_dps: 180.0,
            velocity_pid: PidGains {
                p: 0.01,
                i: 0.0,
                d: 0.0,
            },
            position_pid: PidGains {
                p: 0.01,
                i: 0.0,
                d: 0.0,
            },
            initial_mode: ControlMode::DutyCycle,
            homing: Some(HomingParams {
                duty: -0.4,
                timeout_s: 2.0,
                end: TravelEnd::Min,
            }),
        }
    }

    fn exec_params() -> SciExecParams {
        SciExecParams {
            cycle_period_s: 0.01,
            telem_period_s: 0.1,
            cmd_block: CmdBlock {
                base_id: 0x200,
                num_targets: NUM_TARGETS as u16,
            },
            tm_block: TmBlock {
                base_id: 0x500,
                num_targets: NUM_TARGETS as u16,
            },
            auger: AugerParams {
                min_duty: -0.8,
                max_duty: 0.8,
            },
            centrifuge: inc_params(720.0),
            elevator: ElevatorParams {
                joint: inc_params(3600.0),
                deg_per_mm: 10.0,
            },
            claw: inc_params(90.0),
            sim: SciSimParams {
                max_rate_dps: 90.0,
                centrifuge_start_deg: 15.0,
                elevator_start_deg: 30.0,
                claw_start_deg: 10.0,
                home_switch_deg: 0.0,
                claw_closed_deg: 90.0,
            },
        }
    }

    fn board(time: &SimTime) -> (SciBoard<SimTimer>, SimWorld) {
        let time = time.clone();
        SciBoard::new(&exec_params(), move || SimTimer::new(time.clone())).unwrap()
    }

    #[test]
    fn test_auger_rejects_closed_loop_over_the_wire() {
        let time = SimTime::new();
        let (mut board, _world) = board(&time);

        // SetControlMode VelocityPid on target 0 is rejected and dropped
        board.handle_frame(
            &CanFrame::from_byte(0x200, ControlMode::VelocityPid.to_wire()).unwrap(),
        );
        assert_eq!(board.auger().control_mode(), ControlMode::DutyCycle);

        // Motion still works open loop, clamped to the auger's duty range
        board.handle_frame(&CanFrame::from_f32(0x201, 1.0).unwrap());
        assert_eq!(board.auger().motor_duty(), 0.8);
    }

    #[test]
    fn test_elevator_motion_is_millimetres() {
        let time = SimTime::new();
        let (mut board, mut world) = board(&time);
        let world_step = 0.01;

        board.handle_frame(
            &CanFrame::from_byte(0x204, ControlMode::PositionPid.to_wire()).unwrap(),
        );
        board.handle_frame(&CanFrame::from_f32(0x205, 20.0).unwrap());

        for _ in 0..2000 {
            time.advance(world_step);
            board.update();
            world.step(world_step);
        }

        // A 20 mm demand is 200 degrees of screw angle, so the platform
        // settles at 20 mm in the encoder's reference frame
        assert!((board.elevator().height_mm() - 20.0).abs() < 1.5);
        assert!((world.plants[1].angle_deg() - 200.0).abs() < 15.0);
    }

    #[test]
    fn test_boot_homing_references_every_science_joint() {
        let time = SimTime::new();
        let (mut board, world) = board(&time);
        let world = Rc::new(RefCell::new(world));

        let mut timer = CoSimTimer::new(SimTimer::auto_tick(time.clone(), 0.01), world);
        let report = board.home_all(&mut timer);

        assert_eq!(report.entries.len(), 3);
        for entry in &report.entries {
            assert!(entry.homed, "{} failed to home", entry.target);
        }

        assert!(board.centrifuge().referenced());
        assert!(board.claw().referenced());
        assert!(board.elevator().height_mm().abs() < 0.5);
    }

    #[test]
    fn test_telemetry_skips_unmeasured_auger_quantities() {
        let time = SimTime::new();
        let (board, _world) = board(&time);

        let frames = board.collect_telemetry();

        // Mode-only for the auger, three quantities for the other targets
        assert_eq!(frames.len(), 1 + 3 * 3);
        assert_eq!(frames[0].id(), 0x500 + 2);
    }
}
