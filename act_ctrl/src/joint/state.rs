//! Implementations for the joint controller state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Serialize;

// Internal
use super::{JointError, JointParams};
use crate::calib::{HomingParams, TravelEnd};
use crate::encoder::AngleSensor;
use crate::pid::{Pid, PidMode};
use crate::ports::{DigitalInput, MotorPort, TimerPort};
use can_if::ControlMode;
use util::maths::clamp;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Nominal control interval used to seed the PID engines.
///
/// The true interval is measured from the joint's timer on every update.
const NOMINAL_INTERVAL_S: f64 = 0.1;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A single controlled joint.
///
/// Owns the actuator ports and the PID engines exclusively; all state is
/// mutated from the single-threaded control loop only.
pub struct Joint<M, S, T>
where
    M: MotorPort,
    S: AngleSensor,
    T: TimerPort,
{
    params: JointParams,

    motor: M,
    sensor: S,
    timer: T,

    min_switch: Option<Box<dyn DigitalInput>>,
    max_switch: Option<Box<dyn DigitalInput>>,

    mode: ControlMode,
    vel_pid: Pid,
    pos_pid: Pid,

    /// Duty demand held while in DutyCycle mode.
    held_duty: f64,

    /// True once the position reference is meaningful. Joints without a
    /// homing requirement are referenced from construction; homed joints
    /// only after a successful homing pass.
    referenced: bool,

    report: StatusReport,
}

/// Status report for one joint update.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct StatusReport {
    /// A travel limit forced the demand to zero this tick.
    pub travel_limited: bool,

    /// The interval measured for the last update.
    ///
    /// Units: seconds
    pub last_interval_s: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<M, S, T> Joint<M, S, T>
where
    M: MotorPort,
    S: AngleSensor,
    T: TimerPort,
{
    /// Create a new joint over the given ports and enter its initial mode.
    pub fn new(params: JointParams, motor: M, sensor: S, timer: T) -> Self {
        let mut vel_pid = Pid::new(
            params.velocity_pid.p,
            params.velocity_pid.i,
            params.velocity_pid.d,
            NOMINAL_INTERVAL_S,
        );
        vel_pid.set_input_limits(params.min_velocity_dps, params.max_velocity_dps);
        vel_pid.set_output_limits(params.min_duty, params.max_duty);

        let mut pos_pid = Pid::new(
            params.position_pid.p,
            params.position_pid.i,
            params.position_pid.d,
            NOMINAL_INTERVAL_S,
        );
        pos_pid.set_input_limits(params.min_angle_deg, params.max_angle_deg);
        pos_pid.set_output_limits(params.min_duty, params.max_duty);

        let initial_mode = params.initial_mode;
        let referenced = params.homing.is_none();

        let mut joint = Self {
            params,
            motor,
            sensor,
            timer,
            min_switch: None,
            max_switch: None,
            mode: ControlMode::DutyCycle,
            vel_pid,
            pos_pid,
            held_duty: 0.0,
            referenced,
            report: StatusReport::default(),
        };

        joint.enter_mode(initial_mode);
        joint
    }

    /// Attach the limit switch at the low end of travel.
    pub fn with_min_switch(mut self, switch: impl DigitalInput + 'static) -> Self {
        self.min_switch = Some(Box::new(switch));
        self
    }

    /// Attach the limit switch at the high end of travel.
    pub fn with_max_switch(mut self, switch: impl DigitalInput + 'static) -> Self {
        self.max_switch = Some(Box::new(switch));
        self
    }

    // ---- MODE MACHINE ----

    /// The active control mode.
    pub fn control_mode(&self) -> ControlMode {
        self.mode
    }

    /// Transition into a new control mode.
    ///
    /// The motor is stopped across every transition and the engines owned by
    /// the entered mode are reset, so no stale integral or setpoint survives
    /// a mode change.
    pub fn set_control_mode(&mut self, mode: ControlMode) -> Result<(), JointError> {
        self.enter_mode(mode);
        Ok(())
    }

    fn enter_mode(&mut self, mode: ControlMode) {
        // Stop the motor across the transition
        self.held_duty = 0.0;
        self.write_duty(0.0);

        // Engines not owned by the entered mode idle in manual so their
        // integrals stay frozen while something else drives the actuator
        self.vel_pid.set_mode(PidMode::Manual);
        self.pos_pid.set_mode(PidMode::Manual);

        match mode {
            ControlMode::DutyCycle => (),
            ControlMode::VelocityPid => {
                self.vel_pid.reset();
                self.vel_pid.set_setpoint(0.0);
                self.vel_pid.set_mode(PidMode::Auto);
            }
            ControlMode::PositionPid => {
                self.pos_pid.reset();
                // Seed with the measured angle so entering the mode does not
                // command a jump to a stale setpoint
                let angle = self.angle_deg();
                self.pos_pid.set_setpoint(angle);
                self.pos_pid.set_mode(PidMode::Auto);
            }
        }

        self.mode = mode;
    }

    // ---- SETTERS ----

    /// Demand an open-loop duty cycle. Legal in DutyCycle mode only.
    pub fn set_duty_cycle(&mut self, duty: f64) -> Result<(), JointError> {
        self.check_mode(ControlMode::DutyCycle)?;

        self.held_duty = clamp(&duty, &self.params.min_duty, &self.params.max_duty);
        self.drive_held_duty();

        Ok(())
    }

    /// Demand an angular velocity. Legal in VelocityPid mode only.
    pub fn set_velocity_dps(&mut self, vel_dps: f64) -> Result<(), JointError> {
        self.check_mode(ControlMode::VelocityPid)?;

        let mut vel = clamp(
            &vel_dps,
            &self.params.min_velocity_dps,
            &self.params.max_velocity_dps,
        );
        if self.travel_limited(vel) {
            self.report.travel_limited = true;
            vel = 0.0;
        }
        self.vel_pid.set_setpoint(vel);

        Ok(())
    }

    /// Demand an angular position. Legal in PositionPid mode only.
    pub fn set_angle_deg(&mut self, angle_deg: f64) -> Result<(), JointError> {
        self.check_mode(ControlMode::PositionPid)?;

        let angle = clamp(
            &angle_deg,
            &self.params.min_angle_deg,
            &self.params.max_angle_deg,
        );
        self.pos_pid.set_setpoint(angle);

        Ok(())
    }

    /// Route a motion demand to whichever setter the active mode owns.
    ///
    /// This is the dispatch path for the mode-agnostic SetMotion wire
    /// command: the value's meaning is fixed by the current mode.
    pub fn apply_motion(&mut self, value: f64) -> Result<(), JointError> {
        match self.mode {
            ControlMode::DutyCycle => self.set_duty_cycle(value),
            ControlMode::VelocityPid => self.set_velocity_dps(value),
            ControlMode::PositionPid => self.set_angle_deg(value),
        }
    }

    // ---- MEASUREMENT ----

    /// Measured angle in degrees.
    pub fn angle_deg(&self) -> f64 {
        self.sensor.angle_deg()
    }

    /// Measured angular velocity in degrees/second.
    pub fn velocity_dps(&self) -> f64 {
        self.sensor.velocity_dps()
    }

    /// The duty cycle currently commanded at the motor port.
    pub fn motor_duty(&self) -> f64 {
        self.motor.duty_cycle()
    }

    /// The report produced by the last update.
    pub fn status_report(&self) -> StatusReport {
        self.report
    }

    /// True once the position reference is meaningful.
    pub fn referenced(&self) -> bool {
        self.referenced
    }

    /// The joint's homing configuration, if it has one.
    pub fn homing_params(&self) -> Option<HomingParams> {
        self.params.homing
    }

    /// Read the limit switch at the given end, if one is fitted.
    pub fn limit_switch(&self, end: TravelEnd) -> Option<bool> {
        match end {
            TravelEnd::Min => self.min_switch.as_ref().map(|s| s.read()),
            TravelEnd::Max => self.max_switch.as_ref().map(|s| s.read()),
        }
    }

    /// Re-reference the position sensor so the current position reads zero.
    pub fn rezero(&mut self) {
        self.sensor.rezero();
        self.referenced = true;
    }

    // ---- CYCLIC PROCESSING ----

    /// One control tick.
    ///
    /// Measures the elapsed interval from the joint's own timer and drives
    /// the motor according to the active mode.
    pub fn update(&mut self) {
        let dt_s = self.timer.read();
        self.timer.reset();

        self.report = StatusReport {
            travel_limited: false,
            last_interval_s: dt_s,
        };

        match self.mode {
            ControlMode::DutyCycle => {
                // Re-enforce the limit clamp on the held demand: a limit may
                // have become active since the demand was set
                self.drive_held_duty();
            }
            ControlMode::VelocityPid => {
                if self.travel_limited(self.vel_pid.setpoint()) {
                    self.report.travel_limited = true;
                    self.vel_pid.set_setpoint(0.0);
                }

                let vel = self.velocity_dps();
                self.vel_pid.set_interval(dt_s);
                self.vel_pid.set_process_value(vel);

                let duty = self.vel_pid.compute();
                self.write_duty(duty);
            }
            ControlMode::PositionPid => {
                let angle = self.angle_deg();
                self.pos_pid.set_interval(dt_s);
                self.pos_pid.set_process_value(angle);

                let duty = self.pos_pid.compute();
                self.write_duty(duty);
            }
        }
    }

    // ---- PRIVATE ----

    /// The shared wrong-mode guard used by every setter.
    fn check_mode(&self, required: ControlMode) -> Result<(), JointError> {
        if self.mode == required {
            Ok(())
        }
        else {
            Err(JointError::InvalidOperation {
                required,
                actual: self.mode,
            })
        }
    }

    /// True if driving with the given signed demand would push the joint
    /// further past an active travel limit.
    ///
    /// Soft angle limits only apply once the position reference is
    /// established; an unhomed incremental count is not a position.
    fn travel_limited(&self, demand: f64) -> bool {
        if demand > 0.0 {
            if let Some(sw) = &self.max_switch {
                if sw.read() {
                    return true;
                }
            }
            if self.referenced && self.angle_deg() >= self.params.max_angle_deg {
                return true;
            }
        }
        else if demand < 0.0 {
            if let Some(sw) = &self.min_switch {
                if sw.read() {
                    return true;
                }
            }
            if self.referenced && self.angle_deg() <= self.params.min_angle_deg {
                return true;
            }
        }

        false
    }

    /// Drive the motor with the held duty, forced to zero past a limit.
    fn drive_held_duty(&mut self) {
        let duty = if self.travel_limited(self.held_duty) {
            self.report.travel_limited = true;
            0.0
        }
        else {
            self.held_duty
        };

        self.write_duty(duty);
    }

    /// Write a joint-frame duty to the motor port, applying inversion.
    fn write_duty(&mut self, duty: f64) {
        let port_duty = if self.params.motor_inverted {
            -duty
        }
        else {
            duty
        };
        self.motor.set_duty_cycle(port_duty);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::encoder::AbsoluteEncoder;
    use crate::joint::{EncoderParams, PidGains};
    use crate::sim::{SimAbsEncoder, SimMotor, SimSwitch, SimTime, SimTimer};

    fn params() -> JointParams {
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
                i: 0.001,
                d: 0.0,
            },
            position_pid: PidGains {
                p: 0.05,
                i: 0.0,
                d: 0.001,
            },
            initial_mode: ControlMode::DutyCycle,
            homing: None,
        }
    }

    /// A joint over simulated ports, returning the handles needed to drive
    /// the sensed state from the test.
    fn joint(
        params: JointParams,
        time: &SimTime,
    ) -> (
        Joint<SimMotor, AbsoluteEncoder<SimAbsEncoder>, SimTimer>,
        std::rc::Rc<std::cell::Cell<f64>>,
        crate::sim::AbsEncoderHandle,
    ) {
        let motor = SimMotor::new();
        let motor_handle = motor.handle();
        let enc = SimAbsEncoder::new();
        let enc_handle = enc.handle();
        let sensor = AbsoluteEncoder::new(enc, 0.5, false);
        let timer = SimTimer::new(time.clone());

        (
            Joint::new(params, motor, sensor, timer),
            motor_handle,
            enc_handle,
        )
    }

    #[test]
    fn test_wrong_mode_setters_rejected_without_side_effect() {
        let time = SimTime::new();
        let (mut joint, motor, _enc) = joint(params(), &time);

        // DutyCycle active: both closed-loop setters must be rejected
        assert_eq!(
            joint.set_velocity_dps(10.0),
            Err(JointError::InvalidOperation {
                required: ControlMode::VelocityPid,
                actual: ControlMode::DutyCycle,
            })
        );
        assert_eq!(
            joint.set_angle_deg(45.0),
            Err(JointError::InvalidOperation {
                required: ControlMode::PositionPid,
                actual: ControlMode::DutyCycle,
            })
        );
        assert_eq!(motor.get(), 0.0);

        joint.set_control_mode(ControlMode::VelocityPid).unwrap();
        assert!(joint.set_duty_cycle(0.5).is_err());
        assert!(joint.set_angle_deg(45.0).is_err());
        assert_eq!(motor.get(), 0.0);

        joint.set_control_mode(ControlMode::PositionPid).unwrap();
        assert!(joint.set_duty_cycle(0.5).is_err());
        assert!(joint.set_velocity_dps(10.0).is_err());
        assert_eq!(motor.get(), 0.0);
    }

    #[test]
    fn test_mode_transition_stops_motor() {
        let time = SimTime::new();
        let (mut joint, motor, _enc) = joint(params(), &time);

        joint.set_duty_cycle(0.5).unwrap();
        assert_eq!(motor.get(), 0.5);

        joint.set_control_mode(ControlMode::VelocityPid).unwrap();
        assert_eq!(motor.get(), 0.0);
    }

    #[test]
    fn test_position_entry_seeds_setpoint_from_measurement() {
        let time = SimTime::new();
        let (mut joint, motor, enc) = joint(params(), &time);

        // Park the measured angle at 36 degrees
        enc.duty.set(0.6);
        assert!((joint.angle_deg() - 36.0).abs() < 1e-9);

        joint.set_control_mode(ControlMode::PositionPid).unwrap();

        // With the setpoint seeded at the measurement the error is zero, so
        // updating must not kick the motor
        time.advance(0.01);
        joint.update();
        assert!(joint.motor_duty().abs() < 1e-9);
        assert_eq!(motor.get(), joint.motor_duty());
    }

    #[test]
    fn test_duty_forced_to_zero_past_soft_limit() {
        let time = SimTime::new();
        let (mut joint, motor, enc) = joint(params(), &time);

        // Park the joint past the high travel limit
        enc.duty.set(0.76);
        assert!(joint.angle_deg() > 90.0);

        // Positive demand is forced to zero, negative backs away freely
        joint.set_duty_cycle(0.5).unwrap();
        assert_eq!(motor.get(), 0.0);
        assert!(joint.status_report().travel_limited);

        joint.set_duty_cycle(-0.5).unwrap();
        assert_eq!(motor.get(), -0.5);
    }

    #[test]
    fn test_limit_becoming_active_zeroes_held_duty_on_update() {
        let time = SimTime::new();
        let (mut joint, motor, enc) = joint(params(), &time);

        joint.set_duty_cycle(0.5).unwrap();
        assert_eq!(motor.get(), 0.5);

        // The joint drifts past the limit after the demand was accepted
        enc.duty.set(0.76);
        time.advance(0.01);
        joint.update();
        assert_eq!(motor.get(), 0.0);
    }

    #[test]
    fn test_limit_switch_forces_duty_to_zero() {
        let time = SimTime::new();
        let switch = SimSwitch::new();
        let switch_handle = switch.handle();

        let motor = SimMotor::new();
        let motor_handle = motor.handle();
        let enc = SimAbsEncoder::new();
        let sensor = AbsoluteEncoder::new(enc, 0.5, false);
        let timer = SimTimer::new(time.clone());
        let mut joint =
            Joint::new(params(), motor, sensor, timer).with_max_switch(switch);

        switch_handle.set(true);
        joint.set_duty_cycle(0.5).unwrap();
        assert_eq!(motor_handle.get(), 0.0);

        // Backing off the switch is always allowed
        joint.set_duty_cycle(-0.25).unwrap();
        assert_eq!(motor_handle.get(), -0.25);
    }

    #[test]
    fn test_velocity_mode_drives_towards_setpoint() {
        let time = SimTime::new();
        let (mut joint, motor, _enc) = joint(params(), &time);

        joint.set_control_mode(ControlMode::VelocityPid).unwrap();
        joint.set_velocity_dps(20.0).unwrap();

        time.advance(0.01);
        joint.update();
        assert!(motor.get() > 0.0);
    }

    #[test]
    fn test_velocity_setpoint_clamped_to_range() {
        let time = SimTime::new();
        let (mut joint, motor, _enc) = joint(params(), &time);

        joint.set_control_mode(ControlMode::VelocityPid).unwrap();

        // 1000 dps is beyond the 30 dps clamp: the joint must behave as if
        // 30 dps was demanded, not run the engine against a wild setpoint
        joint.set_velocity_dps(1000.0).unwrap();
        time.advance(0.01);
        joint.update();
        let clamped_duty = motor.get();

        joint.set_control_mode(ControlMode::VelocityPid).unwrap();
        joint.set_velocity_dps(30.0).unwrap();
        time.advance(0.01);
        joint.update();
        assert!((motor.get() - clamped_duty).abs() < 1e-9);
    }

    #[test]
    fn test_motor_inversion_applied_at_port() {
        let time = SimTime::new();
        let mut p = params();
        p.motor_inverted = true;
        let (mut joint, motor, _enc) = joint(p, &time);

        // A positive joint-frame demand reaches the port sign-flipped
        joint.set_duty_cycle(0.5).unwrap();
        assert_eq!(motor.get(), -0.5);
    }
}
