//! # Endpoint calibration (homing) sequencer
//!
//! Establishes a known zero for joints with incremental encoders, or
//! verifies zero alignment for absolute ones, by driving the joint at a
//! fixed duty toward a limit switch and re-referencing the sensor when the
//! switch asserts.
//!
//! The pass is a bounded busy-poll: it runs at boot (and on demand), never
//! from the steady-state control loop, and always terminates within the
//! configured timeout. A timeout is non-fatal; the joint remains usable in
//! DutyCycle mode and the caller decides whether to retry or continue
//! degraded.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// Internal
use crate::encoder::AngleSensor;
use crate::joint::{Joint, JointError};
use crate::ports::{MotorPort, TimerPort};
use can_if::ControlMode;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Homing configuration for one joint.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct HomingParams {
    /// Duty cycle driven during the pass, signed toward the home switch.
    pub duty: f64,

    /// Time budget for reaching the switch.
    ///
    /// Units: seconds
    pub timeout_s: f64,

    /// Which end of travel carries the home switch.
    pub end: TravelEnd,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The two ends of a joint's travel.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub enum TravelEnd {
    Min,
    Max,
}

/// Possible errors that can occur during a homing pass.
#[derive(Debug, Error, PartialEq)]
pub enum HomingError {
    #[error("Limit switch not reached within {0} s")]
    TimedOut(f64),

    #[error("Joint has no {0:?} limit switch to home against")]
    NoSwitch(TravelEnd),

    #[error("Joint rejected a homing demand: {0}")]
    JointRejected(JointError),
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Run one homing pass on the given joint.
///
/// The joint's mode is saved, forced to DutyCycle for the drive, and
/// restored whatever the outcome. On success the position sensor is
/// re-referenced to zero at the switch. The sequencer holds no state
/// between invocations.
pub fn home<M, S, T, HT>(
    joint: &mut Joint<M, S, T>,
    timer: &mut HT,
    params: &HomingParams,
) -> Result<(), HomingError>
where
    M: MotorPort,
    S: AngleSensor,
    T: TimerPort,
    HT: TimerPort,
{
    if joint.limit_switch(params.end).is_none() {
        return Err(HomingError::NoSwitch(params.end));
    }

    let saved_mode = joint.control_mode();

    timer.reset();

    joint
        .set_control_mode(ControlMode::DutyCycle)
        .map_err(HomingError::JointRejected)?;
    joint
        .set_duty_cycle(params.duty)
        .map_err(HomingError::JointRejected)?;

    // Poll the switch each tick. update() keeps re-enforcing the travel
    // clamp, so the motor stops on its own the instant the switch asserts.
    let result = loop {
        joint.update();

        if joint.limit_switch(params.end) == Some(true) {
            break Ok(());
        }
        if timer.read() >= params.timeout_s {
            break Err(HomingError::TimedOut(params.timeout_s));
        }
    };

    // Stop the motor whatever happened
    joint
        .set_duty_cycle(0.0)
        .map_err(HomingError::JointRejected)?;

    match &result {
        Ok(_) => {
            joint.rezero();
            info!("Homing complete, position reference zeroed at the switch");
        }
        Err(e) => {
            warn!("Homing failed: {}", e);
        }
    }

    // Restore the mode the caller had selected. Re-entering PositionPid
    // reseeds its setpoint from the newly referenced angle.
    joint
        .set_control_mode(saved_mode)
        .map_err(HomingError::JointRejected)?;

    result
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::encoder::IncrementalEncoder;
    use crate::joint::{EncoderParams, JointParams, PidGains};
    use crate::sim::{
        SimIncEncoder, SimJointPlant, SimMotor, SimTime, SimTimer, TimedSwitch,
    };

    const TICK_S: f64 = 0.01;

    fn params(homing: HomingParams) -> JointParams {
        JointParams {
            motor_inverted: false,
            min_duty: -1.0,
            max_duty: 1.0,
            encoder: EncoderParams::Incremental {
                pulses_per_rev: 1440.0,
                inverted: false,
            },
            min_angle_deg: 0.0,
            max_angle_deg: 180.0,
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
            homing: Some(homing),
        }
    }

    /// Build a homable joint whose switch asserts at the given sim time.
    fn homable_joint(
        time: &SimTime,
        homing: HomingParams,
        switch_asserts_at_s: f64,
    ) -> (
        Joint<SimMotor, IncrementalEncoder<SimIncEncoder>, SimTimer>,
        SimJointPlant,
        std::rc::Rc<std::cell::Cell<f64>>,
    ) {
        let motor = SimMotor::new();
        let motor_handle = motor.handle();
        let enc = SimIncEncoder::new();

        // The plant starts away from home so the count is initially nonzero
        let plant = SimJointPlant::incremental(&motor, &enc, 1440.0, 90.0, 45.0);

        let sensor = IncrementalEncoder::new(enc, 1440.0, false);

        // The joint's own timer auto-ticks so the self-contained homing loop
        // makes progress through simulated time
        let timer = SimTimer::auto_tick(time.clone(), TICK_S);

        let joint = Joint::new(params(homing), motor, sensor, timer)
            .with_min_switch(TimedSwitch::new(time.clone(), switch_asserts_at_s));

        (joint, plant, motor_handle)
    }

    #[test]
    fn test_homing_success_zeroes_reference() {
        let time = SimTime::new();
        let homing = HomingParams {
            duty: -0.3,
            timeout_s: 5.0,
            end: TravelEnd::Min,
        };
        let (mut joint, _plant, motor) = homable_joint(&time, homing, 2.0);

        assert!(!joint.referenced());

        let mut timer = SimTimer::new(time.clone());
        home(&mut joint, &mut timer, &homing).unwrap();

        assert!(joint.referenced());
        assert!((time.now() - 2.0).abs() <= 2.0 * TICK_S);
        assert_eq!(joint.angle_deg(), 0.0);
        assert_eq!(motor.get(), 0.0);
    }

    #[test]
    fn test_homing_timeout_stops_motor() {
        let time = SimTime::new();
        let homing = HomingParams {
            duty: -0.3,
            timeout_s: 1.0,
            end: TravelEnd::Min,
        };
        let (mut joint, _plant, motor) = homable_joint(&time, homing, std::f64::INFINITY);

        let mut timer = SimTimer::new(time.clone());
        let result = home(&mut joint, &mut timer, &homing);

        assert_eq!(result, Err(HomingError::TimedOut(1.0)));
        assert_eq!(motor.get(), 0.0);
        assert!(!joint.referenced());

        // The pass gave up within about one tick of the budget
        assert!((time.now() - 1.0).abs() <= 2.0 * TICK_S);
    }

    #[test]
    fn test_homing_restores_saved_mode() {
        let time = SimTime::new();
        let homing = HomingParams {
            duty: -0.3,
            timeout_s: 5.0,
            end: TravelEnd::Min,
        };
        let (mut joint, _plant, _motor) = homable_joint(&time, homing, 0.5);

        joint.set_control_mode(ControlMode::VelocityPid).unwrap();

        let mut timer = SimTimer::new(time.clone());
        home(&mut joint, &mut timer, &homing).unwrap();

        assert_eq!(joint.control_mode(), ControlMode::VelocityPid);
    }

    #[test]
    fn test_homing_without_switch_is_rejected() {
        let time = SimTime::new();
        let homing = HomingParams {
            duty: -0.3,
            timeout_s: 5.0,
            end: TravelEnd::Max,
        };

        // The joint only carries a Min switch
        let (mut joint, _plant, _motor) = homable_joint(&time, homing, 0.5);

        let mut timer = SimTimer::new(time.clone());
        assert_eq!(
            home(&mut joint, &mut timer, &homing),
            Err(HomingError::NoSwitch(TravelEnd::Max))
        );
    }
}
