//! # Auger drill actuator
//!
//! The auger carries no position sensor, so it only ever runs open loop. It
//! still sits behind the same dispatch targets as the closed-loop actuators:
//! SetControlMode accepts DutyCycle (a no-op) and rejects the PID modes,
//! and SetMotion is always a duty fraction.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use serde::Deserialize;

// Internal
use act_ctrl::joint::JointError;
use act_ctrl::ports::MotorPort;
use can_if::ControlMode;
use util::maths::clamp;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters for the auger.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct AugerParams {
    /// Lowest duty cycle the drill may be driven at.
    pub min_duty: f64,

    /// Highest duty cycle the drill may be driven at.
    pub max_duty: f64,
}

/// The open-loop auger drill.
pub struct Auger<M: MotorPort> {
    params: AugerParams,
    motor: M,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<M: MotorPort> Auger<M> {
    pub fn new(params: AugerParams, motor: M) -> Self {
        Self { params, motor }
    }

    /// The auger is permanently open loop.
    pub fn control_mode(&self) -> ControlMode {
        ControlMode::DutyCycle
    }

    /// Accept DutyCycle, reject the closed-loop modes.
    pub fn set_control_mode(&mut self, mode: ControlMode) -> Result<(), JointError> {
        match mode {
            ControlMode::DutyCycle => Ok(()),
            other => Err(JointError::UnsupportedMode(other)),
        }
    }

    /// Demand a drill duty cycle.
    pub fn set_duty_cycle(&mut self, duty: f64) -> Result<(), JointError> {
        let duty = clamp(&duty, &self.params.min_duty, &self.params.max_duty);
        self.motor.set_duty_cycle(duty);
        Ok(())
    }

    /// Motion demands are always duty fractions here.
    pub fn apply_motion(&mut self, value: f64) -> Result<(), JointError> {
        self.set_duty_cycle(value)
    }

    /// The duty cycle currently commanded at the motor port.
    pub fn motor_duty(&self) -> f64 {
        self.motor.duty_cycle()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use act_ctrl::sim::SimMotor;

    fn auger() -> Auger<SimMotor> {
        Auger::new(
            AugerParams {
                min_duty: -0.8,
                max_duty: 0.8,
            },
            SimMotor::new(),
        )
    }

    #[test]
    fn test_closed_loop_modes_rejected() {
        let mut auger = auger();

        assert_eq!(
            auger.set_control_mode(ControlMode::VelocityPid),
            Err(JointError::UnsupportedMode(ControlMode::VelocityPid))
        );
        assert_eq!(
            auger.set_control_mode(ControlMode::PositionPid),
            Err(JointError::UnsupportedMode(ControlMode::PositionPid))
        );
        assert_eq!(auger.set_control_mode(ControlMode::DutyCycle), Ok(()));
    }

    #[test]
    fn test_duty_clamped_to_params() {
        let mut auger = auger();

        auger.apply_motion(1.0).unwrap();
        assert_eq!(auger.motor_duty(), 0.8);

        auger.apply_motion(-1.0).unwrap();
        assert_eq!(auger.motor_duty(), -0.8);
    }
}
