//! # Simulated actuator ports
//!
//! Implementations of the [`crate::ports`] traits backed by shared in-memory
//! state and a simple first-order plant model. The boards run against these
//! on a desktop host and every control test drives them instead of hardware.
//!
//! All sharing is `Rc<Cell<_>>`: the control loop is single-threaded by
//! design, so no locking is carried here.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::ports::{
    AbsEncoderPort, DigitalInput, IncEncoderPort, MotorPort, TimerPort,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Degrees per revolution.
const DEG_PER_REV: f64 = 360.0;

// ---------------------------------------------------------------------------
// SIMULATED TIME
// ---------------------------------------------------------------------------

/// A shared simulated clock, advanced explicitly by the test or main loop.
#[derive(Clone, Default)]
pub struct SimTime {
    now_s: Rc<Cell<f64>>,
}

impl SimTime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current simulated time in seconds.
    pub fn now(&self) -> f64 {
        self.now_s.get()
    }

    /// Move the clock forward.
    pub fn advance(&self, dt_s: f64) {
        self.now_s.set(self.now_s.get() + dt_s);
    }
}

/// A [`TimerPort`] over a [`SimTime`].
///
/// A timer built with [`SimTimer::auto_tick`] advances the shared clock by a
/// fixed step on every read, which lets self-contained polling loops (the
/// homing sequencer) make progress without an interleaved caller.
pub struct SimTimer {
    time: SimTime,
    ref_s: f64,
    auto_tick_s: Option<f64>,
}

impl SimTimer {
    pub fn new(time: SimTime) -> Self {
        let ref_s = time.now();
        Self {
            time,
            ref_s,
            auto_tick_s: None,
        }
    }

    pub fn auto_tick(time: SimTime, tick_s: f64) -> Self {
        let ref_s = time.now();
        Self {
            time,
            ref_s,
            auto_tick_s: Some(tick_s),
        }
    }
}

impl TimerPort for SimTimer {
    fn read(&self) -> f64 {
        if let Some(tick) = self.auto_tick_s {
            self.time.advance(tick);
        }
        self.time.now() - self.ref_s
    }

    fn reset(&mut self) {
        self.ref_s = self.time.now();
    }
}

// ---------------------------------------------------------------------------
// SIMULATED PORTS
// ---------------------------------------------------------------------------

/// A [`MotorPort`] writing into a shared duty cell.
#[derive(Default)]
pub struct SimMotor {
    duty: Rc<Cell<f64>>,
}

impl SimMotor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle onto the commanded duty, read by plants and tests.
    pub fn handle(&self) -> Rc<Cell<f64>> {
        self.duty.clone()
    }
}

impl MotorPort for SimMotor {
    fn set_duty_cycle(&mut self, duty: f64) {
        self.duty.set(duty);
    }

    fn duty_cycle(&self) -> f64 {
        self.duty.get()
    }
}

/// Shared state behind a [`SimAbsEncoder`].
#[derive(Clone)]
pub struct AbsEncoderHandle {
    /// Position duty cycle in `[0.0, 1.0]`.
    pub duty: Rc<Cell<f64>>,

    /// Duty cycle rate of change in 1/second.
    pub velocity: Rc<Cell<f64>>,
}

/// An [`AbsEncoderPort`] reading from shared cells.
pub struct SimAbsEncoder {
    state: AbsEncoderHandle,
}

impl SimAbsEncoder {
    pub fn new() -> Self {
        let state = AbsEncoderHandle {
            duty: Rc::new(Cell::new(0.5)),
            velocity: Rc::new(Cell::new(0.0)),
        };
        Self { state }
    }

    pub fn handle(&self) -> AbsEncoderHandle {
        self.state.clone()
    }
}

impl Default for SimAbsEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl AbsEncoderPort for SimAbsEncoder {
    fn avg_duty_cycle(&self) -> f64 {
        self.state.duty.get()
    }

    fn avg_duty_cycle_velocity(&self) -> f64 {
        self.state.velocity.get()
    }
}

/// Shared state behind a [`SimIncEncoder`].
///
/// `raw_pulses` is the free-running hardware count; the port applies its own
/// reset offset on top, exactly as a counter peripheral would.
#[derive(Clone)]
pub struct IncEncoderHandle {
    /// Free-running pulse count, unaffected by port resets.
    pub raw_pulses: Rc<Cell<i64>>,

    /// Pulse rate in pulses/second.
    pub velocity: Rc<Cell<f64>>,
}

/// An [`IncEncoderPort`] reading from shared cells.
pub struct SimIncEncoder {
    state: IncEncoderHandle,
    offset: i64,
}

impl SimIncEncoder {
    pub fn new() -> Self {
        let state = IncEncoderHandle {
            raw_pulses: Rc::new(Cell::new(0)),
            velocity: Rc::new(Cell::new(0.0)),
        };
        Self { state, offset: 0 }
    }

    pub fn handle(&self) -> IncEncoderHandle {
        self.state.clone()
    }
}

impl Default for SimIncEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl IncEncoderPort for SimIncEncoder {
    fn pulse_count(&self) -> i64 {
        self.state.raw_pulses.get() - self.offset
    }

    fn pulse_velocity(&self) -> f64 {
        self.state.velocity.get()
    }

    fn reset(&mut self) {
        self.offset = self.state.raw_pulses.get();
    }
}

/// A [`DigitalInput`] driven from a shared cell.
#[derive(Default)]
pub struct SimSwitch {
    state: Rc<Cell<bool>>,
}

impl SimSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> Rc<Cell<bool>> {
        self.state.clone()
    }
}

impl DigitalInput for SimSwitch {
    fn read(&self) -> bool {
        self.state.get()
    }
}

/// A [`DigitalInput`] which asserts once the simulated clock passes a
/// threshold. Used to script limit-switch behaviour in homing tests.
pub struct TimedSwitch {
    time: SimTime,
    assert_at_s: f64,
}

impl TimedSwitch {
    /// A switch asserting from `assert_at_s` onwards. Infinity never asserts.
    pub fn new(time: SimTime, assert_at_s: f64) -> Self {
        Self { time, assert_at_s }
    }
}

impl DigitalInput for TimedSwitch {
    fn read(&self) -> bool {
        self.time.now() >= self.assert_at_s
    }
}

// ---------------------------------------------------------------------------
// PLANT MODEL
// ---------------------------------------------------------------------------

/// Feedback wiring of a [`SimJointPlant`].
enum PlantFeedback {
    Absolute {
        handle: AbsEncoderHandle,
        zero_duty: f64,
    },
    Incremental {
        handle: IncEncoderHandle,
        pulses_per_rev: f64,
    },
}

/// A first-order plant: duty commands an angular rate, integrated into the
/// encoder cells each step. Deliberately simple, just enough dynamics for
/// the control loops to converge against.
pub struct SimJointPlant {
    motor_duty: Rc<Cell<f64>>,
    feedback: PlantFeedback,

    /// Angular rate at full duty, in degrees/second.
    max_rate_dps: f64,

    /// True plant angle in degrees, shared so switches can trip on it.
    angle_deg: Rc<Cell<f64>>,
}

impl SimJointPlant {
    pub fn absolute(
        motor: &SimMotor,
        encoder: &SimAbsEncoder,
        zero_duty: f64,
        max_rate_dps: f64,
        initial_angle_deg: f64,
    ) -> Self {
        let mut plant = Self {
            motor_duty: motor.handle(),
            feedback: PlantFeedback::Absolute {
                handle: encoder.handle(),
                zero_duty,
            },
            max_rate_dps,
            angle_deg: Rc::new(Cell::new(initial_angle_deg)),
        };

        // Publish the initial position before the first step
        plant.write_feedback(0.0);
        plant
    }

    pub fn incremental(
        motor: &SimMotor,
        encoder: &SimIncEncoder,
        pulses_per_rev: f64,
        max_rate_dps: f64,
        initial_angle_deg: f64,
    ) -> Self {
        let mut plant = Self {
            motor_duty: motor.handle(),
            feedback: PlantFeedback::Incremental {
                handle: encoder.handle(),
                pulses_per_rev,
            },
            max_rate_dps,
            angle_deg: Rc::new(Cell::new(initial_angle_deg)),
        };

        plant.write_feedback(0.0);
        plant
    }

    /// Advance the plant by `dt_s` seconds.
    pub fn step(&mut self, dt_s: f64) {
        let vel_dps = self.motor_duty.get() * self.max_rate_dps;
        self.angle_deg.set(self.angle_deg.get() + vel_dps * dt_s);
        self.write_feedback(vel_dps);
    }

    /// The true plant angle, for assertions against the sensed value.
    pub fn angle_deg(&self) -> f64 {
        self.angle_deg.get()
    }

    /// Shared handle onto the true plant angle.
    pub fn angle_handle(&self) -> Rc<Cell<f64>> {
        self.angle_deg.clone()
    }

    fn write_feedback(&mut self, vel_dps: f64) {
        let angle_deg = self.angle_deg.get();
        match &self.feedback {
            PlantFeedback::Absolute { handle, zero_duty } => {
                handle.duty.set(zero_duty + angle_deg / DEG_PER_REV);
                handle.velocity.set(vel_dps / DEG_PER_REV);
            }
            PlantFeedback::Incremental {
                handle,
                pulses_per_rev,
            } => {
                handle
                    .raw_pulses
                    .set((angle_deg / DEG_PER_REV * pulses_per_rev).round() as i64);
                handle
                    .velocity
                    .set(vel_dps / DEG_PER_REV * pulses_per_rev);
            }
        }
    }
}

/// A [`DigitalInput`] tripped by the true angle of a simulated plant, the
/// sim stand-in for a physical endstop switch.
pub struct AngleSwitch {
    angle_deg: Rc<Cell<f64>>,
    threshold_deg: f64,
    trips_below: bool,
}

impl AngleSwitch {
    /// A switch asserting while the plant angle is at or below the threshold.
    pub fn below(angle_deg: Rc<Cell<f64>>, threshold_deg: f64) -> Self {
        Self {
            angle_deg,
            threshold_deg,
            trips_below: true,
        }
    }

    /// A switch asserting while the plant angle is at or above the threshold.
    pub fn above(angle_deg: Rc<Cell<f64>>, threshold_deg: f64) -> Self {
        Self {
            angle_deg,
            threshold_deg,
            trips_below: false,
        }
    }
}

impl DigitalInput for AngleSwitch {
    fn read(&self) -> bool {
        if self.trips_below {
            self.angle_deg.get() <= self.threshold_deg
        }
        else {
            self.angle_deg.get() >= self.threshold_deg
        }
    }
}

/// All plants behind one board, stepped together.
#[derive(Default)]
pub struct SimWorld {
    pub plants: Vec<SimJointPlant>,
}

impl SimWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, plant: SimJointPlant) {
        self.plants.push(plant);
    }

    /// Advance every plant by `dt_s` seconds.
    pub fn step(&mut self, dt_s: f64) {
        for plant in self.plants.iter_mut() {
            plant.step(dt_s);
        }
    }
}

/// A timer which co-steps a simulated world by the interval elapsed between
/// reads.
///
/// Self-contained polling loops (the homing sequencer) read their timer once
/// per iteration; wrapping that timer keeps the plants moving while the loop
/// blocks, exactly as a physical mechanism would.
pub struct CoSimTimer<T: TimerPort> {
    inner: T,
    world: Rc<RefCell<SimWorld>>,
    last_s: Cell<f64>,
}

impl<T: TimerPort> CoSimTimer<T> {
    pub fn new(inner: T, world: Rc<RefCell<SimWorld>>) -> Self {
        let last_s = Cell::new(inner.read());
        Self {
            inner,
            world,
            last_s,
        }
    }
}

impl<T: TimerPort> TimerPort for CoSimTimer<T> {
    fn read(&self) -> f64 {
        let now_s = self.inner.read();
        let dt_s = now_s - self.last_s.get();
        if dt_s > 0.0 {
            self.world.borrow_mut().step(dt_s);
            self.last_s.set(now_s);
        }
        now_s
    }

    fn reset(&mut self) {
        self.inner.reset();
        self.last_s.set(0.0);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_plant_integrates_duty() {
        let mut motor = SimMotor::new();
        let encoder = SimAbsEncoder::new();
        let mut plant = SimJointPlant::absolute(&motor, &encoder, 0.5, 90.0, 0.0);

        motor.set_duty_cycle(0.5);
        for _ in 0..100 {
            plant.step(0.01);
        }

        // 45 deg/s for one second
        assert!((plant.angle_deg() - 45.0).abs() < 1e-6);
        assert!((encoder.avg_duty_cycle() - (0.5 + 45.0 / 360.0)).abs() < 1e-6);
    }

    #[test]
    fn test_incremental_reset_offsets_count() {
        let motor = SimMotor::new();
        let mut encoder = SimIncEncoder::new();
        let mut plant = SimJointPlant::incremental(&motor, &encoder, 1440.0, 90.0, 90.0);

        plant.step(0.0);
        assert_eq!(encoder.pulse_count(), 360);

        encoder.reset();
        assert_eq!(encoder.pulse_count(), 0);

        // The raw count keeps running; only the reference moved
        assert_eq!(encoder.handle().raw_pulses.get(), 360);
    }

    #[test]
    fn test_cosim_timer_steps_world() {
        let time = SimTime::new();
        let mut motor = SimMotor::new();
        let encoder = SimAbsEncoder::new();
        let plant = SimJointPlant::absolute(&motor, &encoder, 0.5, 90.0, 0.0);
        let angle = plant.angle_handle();
        motor.set_duty_cycle(1.0);

        let mut world = SimWorld::new();
        world.add(plant);
        let world = Rc::new(RefCell::new(world));

        let timer = CoSimTimer::new(SimTimer::auto_tick(time.clone(), 0.1), world);

        // Each read advances the clock and moves the plant with it
        timer.read();
        assert!((angle.get() - 9.0).abs() < 1e-9);
        timer.read();
        assert!((angle.get() - 18.0).abs() < 1e-9);
    }

    #[test]
    fn test_angle_switch_trips_on_plant_angle() {
        let motor = SimMotor::new();
        let encoder = SimAbsEncoder::new();
        let plant = SimJointPlant::absolute(&motor, &encoder, 0.5, 90.0, 10.0);
        let switch = AngleSwitch::below(plant.angle_handle(), 0.0);

        assert!(!switch.read());
        plant.angle_handle().set(-1.0);
        assert!(switch.read());
    }

    #[test]
    fn test_auto_tick_timer() {
        let time = SimTime::new();
        let mut timer = SimTimer::auto_tick(time.clone(), 0.01);

        assert!((timer.read() - 0.01).abs() < 1e-12);
        assert!((timer.read() - 0.02).abs() < 1e-12);

        timer.reset();
        assert!((timer.read() - 0.01).abs() < 1e-12);
    }
}
