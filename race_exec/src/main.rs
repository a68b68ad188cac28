//! # Race Executable
//!
//! Replays a recorded drive log through trajectory control, archiving every tick into the session
//! directory and saving a summary of the run.
//!
//! The parameter file is loaded from `$RACE_SW_ROOT/params` and sessions are created in
//! `$RACE_SW_ROOT/sessions`.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::path::PathBuf;

use color_eyre::{eyre::WrapErr, Result};
use log::{debug, info, warn};
use structopt::StructOpt;

use race_lib::{
    centerline::{Centerline, ReferencePath},
    replay::{self, DriveLog, Pacing},
    traj_ctrl::{InitData, TrajCtrl},
};
use util::{
    logger::{logger_init, logger_stop, LevelFilter},
    module::State,
    session::Session,
};

// ------------------------------------------------------------------------------------------------
// DATA STRUCTURES
// ------------------------------------------------------------------------------------------------

/// Replay a recorded drive through the race controller.
#[derive(Debug, StructOpt)]
#[structopt(name = "race_exec")]
struct Opt {
    /// Track centerline CSV file, with `x` and `y` columns
    #[structopt(parse(from_os_str))]
    track: PathBuf,

    /// Drive log CSV file, with `time_s,x,y,yaw_deg,vx,vy` columns
    #[structopt(parse(from_os_str))]
    drive_log: PathBuf,

    /// Trajectory control parameter file, relative to the parameters directory
    #[structopt(long, default_value = "traj_ctrl.toml")]
    params: String,

    /// Replay at the recorded timestamps rather than as fast as possible
    #[structopt(long)]
    realtime: bool,

    /// Log every tick
    #[structopt(short, long)]
    verbose: bool,
}

// ------------------------------------------------------------------------------------------------
// MAIN
// ------------------------------------------------------------------------------------------------

fn main() -> Result<()> {
    color_eyre::install()?;

    let result = run(Opt::from_args());

    // Write out any queued log records, including those from a failed run
    logger_stop();

    result
}

fn run(opt: Opt) -> Result<()> {
    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("race_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    let level = if opt.verbose {
        LevelFilter::Trace
    } else {
        LevelFilter::Info
    };
    logger_init(level, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Race Executable\n");
    info!("Session directory: {:?}\n", session.session_root);
    debug!("CLI arguments: {:?}", opt);

    // ---- LOAD DRIVE LOG ----

    let log = DriveLog::from_csv(&opt.drive_log).wrap_err("Failed to load the drive log")?;
    info!(
        "Loaded drive log from {:?}: {} records over {:.02} s",
        opt.drive_log,
        log.len(),
        log.duration_s()
    );

    // ---- MODULE INIT ----

    let mut traj_ctrl = TrajCtrl::<Centerline>::init(
        InitData {
            params_file: opt.params.clone(),
            track_path: opt.track.clone(),
        },
        Some(&session),
    )
    .wrap_err("Failed to initialise TrajCtrl")?;
    info!(
        "TrajCtrl init complete, following a {:.02} m centerline",
        traj_ctrl.path().length()
    );

    // ---- MAIN LOOP ----

    let pacing = if opt.realtime {
        Pacing::RealTime
    } else {
        Pacing::AsFastAsPossible
    };

    info!("Begining replay ({:?})\n", pacing);

    let summary = replay::replay(&mut traj_ctrl, &log, pacing);

    if summary.num_faults > 0 {
        warn!(
            "{} of {} ticks faulted and held the previous command",
            summary.num_faults, summary.num_cycles
        );
    }
    info!("Run summary: {:#?}", summary);

    session.save("run_summary.json", summary);

    // Drop the controller so the tick archive is flushed before the session ends
    drop(traj_ctrl);

    session.exit();

    Ok(())
}
