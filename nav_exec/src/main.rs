//! Navigator executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise all modules
//!     - Main loop:
//!         - Drain the input topics into events
//!         - Navigation state machine processing
//!         - Autopilot command emission
//!         - Telemetry publication
//!
//! All events execute serially on this thread: subscriber messages and the
//! periodic tick share one cycle, so handlers can mutate the navigation
//! context without locks.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{Report, eyre::WrapErr};
use log::{info, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

// Internal
use nav_lib::{
    ap_client::{ApClient, ApClientParams},
    input_bus::InputBus,
    nav_sm::{NavSm, NavSmInput},
    params::NavExecParams,
    tm_server::TmServer
};
use util::{
    module::State,
    logger::{logger_init, LevelFilter},
    session::Session
};

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new(
        "nav_exec",
        "sessions"
    ).wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Trace, &session)
        .wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Magellan Rover Navigation Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let exec_params: NavExecParams = util::params::load(
        "params/nav_exec.toml"
    ).wrap_err("Could not load exec params")?;

    let ap_client_params: ApClientParams = util::params::load(
        "params/ap_client.toml"
    ).wrap_err("Could not load autopilot client params")?;

    info!("Exec parameters loaded");

    // ---- SHUTDOWN HANDLING ----

    // The loop exits at the top of the next cycle after a shutdown signal.
    // No command is sent on shutdown, the autopilot retains its last state.
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = shutdown.clone();

    ctrlc::set_handler(move || {
        shutdown_flag.store(true, Ordering::Relaxed);
    }).wrap_err("Failed to set the shutdown handler")?;

    // ---- INITIALISE MODULES ----

    info!("Initialising modules...");

    let mut nav_sm = NavSm::default();
    nav_sm.init("params/nav_sm.toml", &session)
        .wrap_err("Failed to initialise NavSm")?;
    info!("NavSm init complete");

    info!("Module initialisation complete\n");

    // ---- INITIALISE NETWORK ----

    info!("Initialising network");

    let zmq_ctx = comms_if::net::zmq::Context::new();

    let mut input_bus = InputBus::new(&zmq_ctx, &exec_params)
        .wrap_err("Failed to initialise the InputBus")?;
    info!("InputBus initialised");

    let mut ap_client = ApClient::new(&zmq_ctx, &exec_params, ap_client_params)
        .wrap_err("Failed to initialise the ApClient")?;
    info!("ApClient initialised");

    let mut tm_server = TmServer::new(&zmq_ctx, &exec_params)
        .wrap_err("Failed to initialise the TmServer")?;
    info!("TmServer initialised");

    info!("Network initialisation complete");

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    let cycle_period_s = 1.0 / exec_params.rate;
    let mut num_consec_cycle_overruns: u64 = 0;

    loop {

        // Get cycle start time
        let cycle_start_instant = Instant::now();

        // Exit on the cycle after a shutdown signal
        if shutdown.load(Ordering::Relaxed) {
            info!("Shutdown signalled, stopping");
            break;
        }

        // ---- DATA INPUT ----

        let events = input_bus.poll();

        // ---- STATE MACHINE PROCESSING ----

        match nav_sm.proc(&NavSmInput {
            now: cycle_start_instant,
            events
        }) {
            Ok((output, report)) => {

                // ---- COMMAND EMISSION ----

                for cmd in output.commands.iter() {
                    // Command faults are not retried here, the next event or
                    // tick will issue a fresh command.
                    match ap_client.exec(cmd) {
                        Ok(_) => (),
                        Err(e) => warn!("Autopilot command failed: {}", e)
                    }
                }

                // ---- TELEMETRY ----

                if let Some(ref adjusted) = output.adjusted_waypoints {
                    match tm_server.send_adjusted_waypoints(adjusted) {
                        Ok(_) => (),
                        Err(e) => warn!("Could not publish adjusted waypoints: {}", e)
                    }
                }

                match tm_server.send_state(report.state) {
                    Ok(_) => (),
                    Err(e) => warn!("TmServer error: {}", e)
                }
            },
            Err(e) => {
                // NavSm errors indicate an internal inconsistency, issue the
                // warning and continue with the next cycle.
                warn!("Error during NavSm processing: {}", e)
            }
        }

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur = Instant::now() - cycle_start_instant;

        // Get sleep duration
        match Duration::from_secs_f64(cycle_period_s)
            .checked_sub(cycle_dur)
        {
            Some(d) => {
                num_consec_cycle_overruns = 0;
                thread::sleep(d);
            },
            None => {
                warn!(
                    "Cycle overran by {:.06} s",
                    cycle_dur.as_secs_f64() - cycle_period_s
                );
                num_consec_cycle_overruns += 1;

                if num_consec_cycle_overruns > 1 && num_consec_cycle_overruns % 100 == 0 {
                    warn!("{} consecutive cycle overruns", num_consec_cycle_overruns);
                }
            }
        }
    }

    // ---- SHUTDOWN ----

    info!("End of execution");

    Ok(())
}
