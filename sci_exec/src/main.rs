//! # Science Board Executable
//!
//! This executable is responsible for the science payload actuators:
//! - Auger drill (open loop)
//! - Sample centrifuge
//! - Elevator lead screw
//! - Claw gripper
//!
//! The execution methodology matches the arm board: initialise, home the
//! joints which need a reference, then run the cooperative loop draining
//! commands, ticking controllers, and emitting telemetry on a fixed period.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use log::{info, warn};
use std::cell::RefCell;
use std::env;
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

// Internal
use act_ctrl::ports::WallClockTimer;
use act_ctrl::sim::CoSimTimer;
use can_if::bus::{CanBus, LoopbackBus};
use sci_lib::board::SciBoard;
use sci_lib::params::SciExecParams;
use util::logger::{logger_init, LevelFilter};
use util::session::Session;

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<()> {
    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("sci_exec", "sessions")
        .wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Trace, &session)
        .wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Science Board Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // An optional single argument limits the number of cycles, used for
    // scripted desktop runs. With no argument the loop runs until killed.
    let args: Vec<String> = env::args().collect();
    let max_cycles: Option<u64> = match args.len() {
        1 => None,
        2 => Some(
            args[1]
                .parse()
                .wrap_err("Expected the cycle limit to be an integer")?,
        ),
        _ => return Err(eyre!("Expected zero or one argument, found {}", args.len() - 1)),
    };

    // ---- LOAD PARAMETERS ----

    let params: SciExecParams =
        util::params::load("sci_exec.toml").wrap_err("Could not load sci_exec params")?;

    info!("Parameters loaded");

    // ---- BOARD INITIALISATION ----

    let (mut board, world) = SciBoard::new(&params, WallClockTimer::new)
        .wrap_err("Failed to initialise the science board")?;
    let world = Rc::new(RefCell::new(world));

    let mut bus = LoopbackBus::new();

    info!("Board initialised");

    // ---- BOOT CALIBRATION ----

    info!("Homing joints...");

    let mut homing_timer = CoSimTimer::new(WallClockTimer::new(), world.clone());
    let boot_report = board.home_all(&mut homing_timer);

    for entry in &boot_report.entries {
        info!("    {}: {}", entry.target, entry.detail);
    }
    session.save_json("boot_report.json", &boot_report);

    // ---- MAIN LOOP ----

    info!("Initialisation complete, entering main loop\n");

    let mut cycles: u64 = 0;
    let mut last_cycle_start = Instant::now();
    let mut telem_elapsed_s = 0.0;

    loop {
        // Get cycle start time and the interval actually elapsed
        let cycle_start = Instant::now();
        let cycle_dt_s = cycle_start
            .duration_since(last_cycle_start)
            .as_secs_f64();
        last_cycle_start = cycle_start;

        // ---- COMMAND PROCESSING ----

        // Drain pending frames and dispatch them strictly in arrival order
        loop {
            match bus.try_recv() {
                Ok(Some(frame)) => board.handle_frame(&frame),
                Ok(None) => break,
                Err(e) => {
                    warn!("Receive error, abandoning this cycle's drain: {}", e);
                    break;
                }
            }
        }

        // ---- CONTROL PROCESSING ----

        board.update();
        world.borrow_mut().step(cycle_dt_s);

        // ---- TELEMETRY ----

        telem_elapsed_s += cycle_dt_s;
        if telem_elapsed_s >= params.telem_period_s {
            telem_elapsed_s = 0.0;

            for frame in board.collect_telemetry() {
                if let Err(e) = bus.send(&frame) {
                    warn!("Dropping telemetry frame {:#X}: {}", frame.id(), e);
                }
            }

            bus.take_sent();
        }

        // ---- CYCLE PACING ----

        cycles += 1;
        if let Some(max) = max_cycles {
            if cycles >= max {
                info!("Cycle limit of {} reached, exiting", max);
                break;
            }
        }

        let elapsed_s = cycle_start.elapsed().as_secs_f64();
        if elapsed_s < params.cycle_period_s {
            thread::sleep(Duration::from_secs_f64(params.cycle_period_s - elapsed_s));
        }
    }

    Ok(())
}
