//! # Encoder angle scaling
//!
//! Adapts the raw encoder ports into degree-valued angle sensors. The two
//! sensor families on the rover are:
//!
//! - Absolute encoders, whose PWM duty cycle is proportional to shaft angle
//!   within one revolution. Angle is referenced to a configured zero duty.
//! - Incremental encoders, whose pulse count is relative to wherever the
//!   count was last zeroed, which is why those joints are homed at boot.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use crate::ports::{AbsEncoderPort, IncEncoderPort};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Degrees per revolution.
const DEG_PER_REV: f64 = 360.0;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A position sensor reporting calibrated joint angle in degrees.
pub trait AngleSensor {
    /// Current angle in degrees relative to the sensor's zero reference.
    fn angle_deg(&self) -> f64;

    /// Current angular velocity in degrees/second.
    fn velocity_dps(&self) -> f64;

    /// Re-reference the sensor so the current position reads zero.
    fn rezero(&mut self);
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// An [`AngleSensor`] over an absolute, duty-encoded position sensor.
pub struct AbsoluteEncoder<P: AbsEncoderPort> {
    port: P,

    /// Duty cycle reading at the zero-degree position.
    zero_duty: f64,

    /// `-360` or `360` degrees per unit duty, capturing mounting inversion.
    scale: f64,
}

/// An [`AngleSensor`] over an incremental, pulse-counting position sensor.
pub struct IncrementalEncoder<P: IncEncoderPort> {
    port: P,

    /// Degrees per pulse, signed to capture mounting inversion.
    deg_per_pulse: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<P: AbsEncoderPort> AbsoluteEncoder<P> {
    pub fn new(port: P, zero_duty: f64, inverted: bool) -> Self {
        Self {
            port,
            zero_duty,
            scale: if inverted { -DEG_PER_REV } else { DEG_PER_REV },
        }
    }
}

impl<P: AbsEncoderPort> AngleSensor for AbsoluteEncoder<P> {
    fn angle_deg(&self) -> f64 {
        self.scale * (self.port.avg_duty_cycle() - self.zero_duty)
    }

    fn velocity_dps(&self) -> f64 {
        self.scale * self.port.avg_duty_cycle_velocity()
    }

    fn rezero(&mut self) {
        // An absolute sensor keeps its count; re-referencing just moves the
        // zero point to the current reading.
        self.zero_duty = self.port.avg_duty_cycle();
    }
}

impl<P: IncEncoderPort> IncrementalEncoder<P> {
    pub fn new(port: P, pulses_per_rev: f64, inverted: bool) -> Self {
        let sign = if inverted { -1.0 } else { 1.0 };
        Self {
            port,
            deg_per_pulse: sign * DEG_PER_REV / pulses_per_rev,
        }
    }
}

impl<P: IncEncoderPort> AngleSensor for IncrementalEncoder<P> {
    fn angle_deg(&self) -> f64 {
        self.deg_per_pulse * self.port.pulse_count() as f64
    }

    fn velocity_dps(&self) -> f64 {
        self.deg_per_pulse * self.port.pulse_velocity()
    }

    fn rezero(&mut self) {
        self.port.reset();
    }
}
