//! # Drive log replay
//!
//! Replays a recorded drive through trajectory control. Each record of the
//! log is fed to the controller as one tick, either as fast as possible or
//! paced at the recorded timestamps. The vehicle is not simulated, so the
//! commands produced don't affect the poses that follow.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{info, warn};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

// Internal
use crate::centerline::ReferencePath;
use crate::traj_ctrl::{AuxData, StatusReport, TrajCtrl};
use race_if::drive_log::DriveLogRecord;
use util::archive::Archived;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A recorded drive.
#[derive(Debug, Clone, Default)]
pub struct DriveLog {
    records: Vec<DriveLogRecord>
}

/// Statistics gathered over a replay.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReplaySummary {
    /// Number of records fed to the controller
    pub num_cycles: u64,

    /// Number of ticks which faulted
    pub num_faults: u64,

    pub num_steer_saturations: u64,
    pub num_brake_caps: u64,
    pub num_progress_jumps: u64,

    /// Mean absolute lateral error over the ticks which didn't fault
    pub mean_abs_lat_error_m: f64,

    pub max_abs_lat_error_m: f64,

    pub mean_throttle: f64,

    /// Progress at the last successful tick
    pub final_progress_m: Option<f64>,

    /// Wall clock time taken by the replay
    pub wall_time_s: f64,

    #[serde(skip)]
    sum_abs_lat_error_m: f64,

    #[serde(skip)]
    sum_throttle: f64
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// How to pace the replay.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Pacing {
    /// Run each tick straight after the last
    AsFastAsPossible,

    /// Run each tick at its recorded time
    RealTime
}

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("Cannot read the drive log {0:?}: {1}")]
    ReadError(PathBuf, csv::Error),

    #[error("The drive log {0:?} contains no records")]
    EmptyLog(PathBuf),

    #[error("Record {0} of the drive log goes back in time")]
    NonMonotonicTime(usize),

    #[error("Record {0} of the drive log has a non-finite time")]
    NonFiniteTime(usize)
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl DriveLog {
    /// Load a drive log from a CSV file.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self, ReplayError> {
        let path = path.as_ref();

        let mut reader = csv::Reader::from_path(path)
            .map_err(|e| ReplayError::ReadError(path.to_path_buf(), e))?;

        let records = reader
            .deserialize::<DriveLogRecord>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ReplayError::ReadError(path.to_path_buf(), e))?;

        if records.is_empty() {
            return Err(ReplayError::EmptyLog(path.to_path_buf()))
        }

        Self::from_records(records)
    }

    /// Create a drive log from records, which must have finite times in
    /// time order.
    pub fn from_records(records: Vec<DriveLogRecord>) -> Result<Self, ReplayError> {
        if let Some(i) = records.iter().position(|r| !r.time_s.is_finite()) {
            return Err(ReplayError::NonFiniteTime(i))
        }

        if let Some(i) = records
            .windows(2)
            .position(|w| w[1].time_s < w[0].time_s)
        {
            return Err(ReplayError::NonMonotonicTime(i + 1))
        }

        Ok(Self { records })
    }

    pub fn records(&self) -> &[DriveLogRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Time between the first and last records.
    pub fn duration_s(&self) -> f64 {
        match (self.records.first(), self.records.last()) {
            (Some(f), Some(l)) => l.time_s - f.time_s,
            _ => 0.0
        }
    }
}

impl ReplaySummary {
    /// Add the result of a tick to the summary.
    pub fn update(&mut self, report: &StatusReport, throttle: f64) {
        self.num_cycles += 1;

        if report.fault.is_some() {
            self.num_faults += 1;
            return
        }

        let ticks = (self.num_cycles - self.num_faults) as f64;

        self.sum_abs_lat_error_m += report.lat_error_m.abs();
        self.mean_abs_lat_error_m = self.sum_abs_lat_error_m / ticks;
        self.max_abs_lat_error_m = self.max_abs_lat_error_m.max(report.lat_error_m.abs());

        self.sum_throttle += throttle;
        self.mean_throttle = self.sum_throttle / ticks;

        if report.steer_saturated {
            self.num_steer_saturations += 1;
        }
        if report.brake_cap_applied {
            self.num_brake_caps += 1;
        }
        if report.progress_jump {
            self.num_progress_jumps += 1;
        }

        self.final_progress_m = Some(report.progress_m);
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Replay a drive log through trajectory control.
///
/// Each tick is archived by the controller. Archive failures are logged but
/// don't stop the replay.
pub fn replay<P: ReferencePath>(
    traj_ctrl: &mut TrajCtrl<P>,
    log: &DriveLog,
    pacing: Pacing
) -> ReplaySummary {
    let mut summary = ReplaySummary::default();
    let aux = AuxData::default();

    let start = Instant::now();
    let t0_s = log.records.first().map(|r| r.time_s).unwrap_or(0.0);
    let mut archive_ok = true;

    for record in log.records.iter() {
        if pacing == Pacing::RealTime {
            // Times too large for a duration are run straight away
            let wait = Duration::try_from_secs_f64((record.time_s - t0_s).max(0.0))
                .ok()
                .and_then(|due| due.checked_sub(start.elapsed()));

            if let Some(d) = wait {
                thread::sleep(d);
            }
        }

        let cmd = traj_ctrl.tick(&record.transform(), &record.velocity(), &aux);

        summary.update(traj_ctrl.report(), cmd.throttle);

        if let Err(e) = traj_ctrl.write() {
            if archive_ok {
                warn!("Could not archive tick: {}", e);
                archive_ok = false;
            }
        }
    }

    summary.wall_time_s = start.elapsed().as_secs_f64();

    info!(
        "Replayed {} records in {:.03} s: {} faults, mean |lat error| {:.04} m",
        summary.num_cycles,
        summary.wall_time_s,
        summary.num_faults,
        summary.mean_abs_lat_error_m
    );

    summary
}
