//! # Actuator port traits
//!
//! The seam between control logic and board support. Everything the control
//! core touches on the hardware side (motor drivers, encoders, limit
//! switches, free-running timers) is consumed through these traits, so the
//! same joint controller runs against real drivers on the boards and against
//! [`crate::sim`] on a desktop.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::time::Instant;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A motor drive output.
pub trait MotorPort {
    /// Set the drive duty cycle in `[-1.0, 1.0]`; sign encodes direction.
    ///
    /// Callers are responsible for clamping: the joint controller never
    /// passes a value outside its configured duty range.
    fn set_duty_cycle(&mut self, duty: f64);

    /// The most recently commanded duty cycle.
    fn duty_cycle(&self) -> f64;
}

/// An absolute position sensor reporting a PWM duty cycle proportional to
/// shaft angle within one revolution.
pub trait AbsEncoderPort {
    /// Averaged position duty cycle, in `[0.0, 1.0]`.
    fn avg_duty_cycle(&self) -> f64;

    /// Averaged rate of change of the position duty cycle, in 1/second.
    fn avg_duty_cycle_velocity(&self) -> f64;
}

/// An incremental position sensor reporting a signed pulse count relative to
/// an arbitrary reference.
pub trait IncEncoderPort {
    /// Pulses accumulated since the last reset.
    fn pulse_count(&self) -> i64;

    /// Estimated pulse rate, in pulses/second.
    fn pulse_velocity(&self) -> f64;

    /// Zero the pulse count at the current position.
    fn reset(&mut self);
}

/// A digital input such as a limit switch. Asserted is `true`.
pub trait DigitalInput {
    fn read(&self) -> bool;
}

/// A free-running timer used to measure control intervals.
pub trait TimerPort {
    /// Seconds elapsed since the last reset.
    fn read(&self) -> f64;

    /// Restart the timer from zero.
    fn reset(&mut self);
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A [`TimerPort`] backed by the host monotonic clock.
pub struct WallClockTimer {
    start: Instant,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl WallClockTimer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for WallClockTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerPort for WallClockTimer {
    fn read(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    fn reset(&mut self) {
        self.start = Instant::now();
    }
}
