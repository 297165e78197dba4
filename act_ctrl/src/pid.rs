//! # PID engine
//!
//! A generic clamped PID computation with bias and anti-windup. One instance
//! drives one control quantity; the joint controller owns one engine per
//! closed-loop mode.
//!
//! The sample interval is a runtime input set from a free-running timer each
//! tick, never a compile-time constant, so the loop tolerates cycle jitter.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Serialize;

// Internal
use util::maths::clamp;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Whether the engine is actively integrating.
///
/// An engine owned by an inactive control mode is kept in `Manual` so that
/// its integral stays frozen while another mode drives the actuator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum PidMode {
    Manual,
    Auto,
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A PID controller with input/output clamping, bias, and anti-windup.
#[derive(Clone, Debug, Serialize)]
pub struct Pid {
    /// Proportional gain
    k_p: f64,

    /// Integral gain
    k_i: f64,

    /// Derivative gain
    k_d: f64,

    /// Output offset added to the three terms
    bias: f64,

    /// Target value for the process
    setpoint: f64,

    /// Last measured process value
    process_value: f64,

    /// Sample interval for the next compute, in seconds
    interval_s: f64,

    /// Lower input (setpoint and process value) bound
    in_min: f64,

    /// Upper input bound
    in_max: f64,

    /// Lower output bound
    out_min: f64,

    /// Upper output bound
    out_max: f64,

    /// The integral accumulation
    integral: f64,

    /// Previous error, `None` until the first full compute
    prev_error: Option<f64>,

    /// Output of the previous compute
    last_output: f64,

    /// Integration mode
    mode: PidMode,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Pid {
    /// Create a new engine with the given gains and nominal sample interval.
    ///
    /// Input and output limits default to unbounded and should be set before
    /// the first compute.
    pub fn new(k_p: f64, k_i: f64, k_d: f64, interval_s: f64) -> Self {
        Self {
            k_p,
            k_i,
            k_d,
            bias: 0.0,
            setpoint: 0.0,
            process_value: 0.0,
            interval_s,
            in_min: std::f64::NEG_INFINITY,
            in_max: std::f64::INFINITY,
            out_min: std::f64::NEG_INFINITY,
            out_max: std::f64::INFINITY,
            integral: 0.0,
            prev_error: None,
            last_output: 0.0,
            mode: PidMode::Manual,
        }
    }

    /// Set the range the setpoint and process value are clamped into.
    pub fn set_input_limits(&mut self, min: f64, max: f64) {
        self.in_min = min;
        self.in_max = max;
    }

    /// Set the range the output is clamped into.
    pub fn set_output_limits(&mut self, min: f64, max: f64) {
        self.out_min = min;
        self.out_max = max;
    }

    /// Set the output offset.
    pub fn set_bias(&mut self, bias: f64) {
        self.bias = bias;
    }

    /// Set the integration mode.
    pub fn set_mode(&mut self, mode: PidMode) {
        self.mode = mode;
    }

    /// Set the target value.
    pub fn set_setpoint(&mut self, setpoint: f64) {
        self.setpoint = setpoint;
    }

    /// The current target value.
    pub fn setpoint(&self) -> f64 {
        self.setpoint
    }

    /// Set the sample interval for the next compute.
    pub fn set_interval(&mut self, interval_s: f64) {
        self.interval_s = interval_s;
    }

    /// Set the measured process value for the next compute.
    pub fn set_process_value(&mut self, value: f64) {
        self.process_value = value;
    }

    /// Run one compute step, returning the clamped output.
    ///
    /// A non-positive interval carries no new information: the derivative and
    /// integral are left untouched and the prior output is returned, so a
    /// stalled timer can never divide by zero.
    pub fn compute(&mut self) -> f64 {
        if self.interval_s <= 0.0 {
            return self.last_output;
        }

        let error = clamp(&self.setpoint, &self.in_min, &self.in_max)
            - clamp(&self.process_value, &self.in_min, &self.in_max);

        // The integral only accumulates in auto mode, so a frozen engine
        // cannot wind up while another mode drives the actuator.
        let next_integral = match self.mode {
            PidMode::Auto => self.integral + error * self.interval_s,
            PidMode::Manual => self.integral,
        };

        let deriv = match self.prev_error {
            Some(e) => (error - e) / self.interval_s,
            None => 0.0,
        };

        let raw = self.bias
            + self.k_p * error
            + self.k_i * next_integral
            + self.k_d * deriv;

        let output = clamp(&raw, &self.out_min, &self.out_max);

        // Anti-windup: while the raw output saturates in the direction of the
        // current error, the integral is not advanced any further that way.
        let saturating = (raw > self.out_max && error > 0.0)
            || (raw < self.out_min && error < 0.0);
        if !saturating {
            self.integral = next_integral;
        }

        self.prev_error = Some(error);
        self.last_output = output;

        output
    }

    /// Clear the integral accumulation and previous error.
    ///
    /// Gains, limits, bias and mode persist across a reset.
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.prev_error = None;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn engine() -> Pid {
        let mut pid = Pid::new(1.0, 0.5, 0.1, 0.1);
        pid.set_output_limits(-1.0, 1.0);
        pid.set_mode(PidMode::Auto);
        pid
    }

    #[test]
    fn test_zero_error_converges_to_bias() {
        let mut pid = engine();
        pid.set_bias(0.25);
        pid.set_setpoint(10.0);
        pid.set_process_value(10.0);

        for _ in 0..50 {
            assert_eq!(pid.compute(), 0.25);
        }
    }

    #[test]
    fn test_integral_accumulates_only_in_auto() {
        let mut pid = Pid::new(1.0, 0.5, 0.0, 0.1);
        pid.set_output_limits(-10.0, 10.0);
        pid.set_setpoint(0.5);
        pid.set_process_value(0.0);

        // Two manual ticks: P term only, nothing accumulates
        pid.set_mode(PidMode::Manual);
        assert!((pid.compute() - 0.5).abs() < 1e-9);
        assert!((pid.compute() - 0.5).abs() < 1e-9);

        // One auto tick picks up 0.5 * 0.1 of integral
        pid.set_mode(PidMode::Auto);
        assert!((pid.compute() - (0.5 + 0.5 * 0.05)).abs() < 1e-9);

        // With the error removed only the held integral term remains
        pid.set_setpoint(0.0);
        assert!((pid.compute() - 0.5 * 0.05).abs() < 1e-9);
    }

    #[test]
    fn test_anti_windup_bounds_output() {
        let mut pid = engine();

        // Saturate hard positive for many ticks
        pid.set_setpoint(100.0);
        pid.set_process_value(0.0);
        for _ in 0..100 {
            let out = pid.compute();
            assert!(out <= 1.0);
        }

        // Reverse the error: the output must react without an integral tail
        // pushing it past the bounds at any later tick
        pid.set_setpoint(-100.0);
        for _ in 0..100 {
            let out = pid.compute();
            assert!(out >= -1.0 && out <= 1.0);
        }
    }

    #[test]
    fn test_zero_interval_returns_prior_output() {
        let mut pid = engine();
        pid.set_setpoint(1.0);
        pid.set_process_value(0.0);

        let out = pid.compute();

        pid.set_interval(0.0);
        pid.set_process_value(0.5);
        assert_eq!(pid.compute(), out);

        // A negative interval must also never divide
        pid.set_interval(-1.0);
        assert_eq!(pid.compute(), out);
    }

    #[test]
    fn test_reset_clears_accumulation_only() {
        let mut pid = engine();
        pid.set_bias(0.1);
        pid.set_setpoint(1.0);
        pid.set_process_value(0.0);

        for _ in 0..10 {
            pid.compute();
        }

        pid.reset();
        pid.set_setpoint(0.0);

        // With zero error after reset only the bias remains
        assert!((pid.compute() - 0.1).abs() < 1e-9);
    }
}
