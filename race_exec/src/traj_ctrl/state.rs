//! Trajectory control module state

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, trace, warn};
use serde::Serialize;
use std::convert::Infallible;
use std::mem::discriminant;
use std::path::PathBuf;
use std::time::Instant;

// Internal
use super::*;
use crate::centerline::{
    Centerline, CenterlineError, Projection, ProjectionError, ReferencePath
};
use race_if::{
    ctrl::ControlCommand,
    sim::{Obstacle, TrackBoundary, Vector3D, VehicleTransform}
};
use util::{
    archive::{ArchiveError, Archived, Archiver},
    maths::wrapped_delta,
    module::State,
    params,
    session::Session
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Tolerance used when checking whether a projection landed on the edge of
/// the search window.
const WINDOW_EDGE_TOL_M: f64 = 1e-6;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Trajectory control module
///
/// Each vehicle owns its own instance, there is no shared state between
/// instances.
pub struct TrajCtrl<P: ReferencePath> {
    params: Params,

    /// The reference path being followed
    path: P,

    /// Controller objects used to calculate commands
    controllers: TrajControllers,

    /// State carried between ticks
    state: ControlState,

    /// Report from the most recent tick
    report: StatusReport,

    /// The fault raised on the last tick, if it faulted
    last_fault: Option<TickFault>,

    input_transform: VehicleTransform,
    input_velocity: Vector3D,
    output: ControlCommand,

    /// Number of calls to `tick`, whether they succeeded or not
    cycle_count: u64,

    arch_ticks: Archiver<TickRecord>
}

/// State carried from one tick to the next.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize)]
pub struct ControlState {
    /// Progress along the path at the last successful tick, or `None` if
    /// there hasn't been one yet.
    pub progress: Option<f64>,

    /// Signed lateral error at the last successful tick
    pub last_error: f64,

    /// Sum of all lateral errors
    pub cumulative_error: f64,

    pub last_steer_command: f64,
    pub last_throttle_command: f64,

    /// Number of successful ticks
    pub tick_count: u64,

    /// Number of ticks which faulted and held the previous command
    pub fault_count: u64
}

/// Environment data supplied by the simulator.
///
/// The waypoints are used by the lookahead steering strategy. The other
/// members are accepted so that the interface stays stable but aren't used
/// by the current control laws.
#[derive(Debug, Clone, Default)]
pub struct AuxData {
    pub obstacles: Vec<Obstacle>,

    /// Upcoming waypoints in the world frame, nearest first
    pub waypoints: Vec<Vector3D>,

    pub boundary: TrackBoundary
}

/// Input data to trajectory control.
#[derive(Debug, Clone, Default)]
pub struct InputData {
    /// World frame pose of the vehicle, yaw in degrees
    pub transform: VehicleTransform,

    /// World frame velocity of the vehicle
    pub velocity: Vector3D,

    pub aux: AuxData
}

/// Init data for trajectory control.
#[derive(Debug, Clone)]
pub struct InitData {
    /// Parameter file, relative to the parameters directory
    pub params_file: String,

    /// Track centerline CSV file
    pub track_path: PathBuf
}

/// The status report containing monitoring quantities for a single tick.
#[derive(Debug, Default, Copy, Clone, Serialize)]
pub struct StatusReport {
    /// Progress along the path
    pub progress_m: f64,

    /// Signed lateral error, positive to the left of the path
    pub lat_error_m: f64,

    /// Vehicle speed
    pub speed_ms: f64,

    /// Forward velocity
    pub vx_body_ms: f64,

    /// Leftwards velocity
    pub vy_body_ms: f64,

    pub p_term: f64,
    pub d_term: f64,

    /// Steer demand before saturation
    pub steer_raw: f64,

    /// True if the steer demand was saturated
    pub steer_saturated: bool,

    pub curvature_param: f64,

    /// Throttle before the braking cap
    pub target_throttle: f64,

    /// True if the braking cap lowered the throttle
    pub brake_cap_applied: bool,

    /// Half width of the search window around the previous progress
    pub window_m: f64,

    /// Half width of the window the projection was finally found in, wider
    /// than `window_m` after a progress jump
    pub search_window_m: f64,

    /// True if the progress moved further than the search window allows
    pub progress_jump: bool,

    /// Angle to the lookahead aim point if the lookahead strategy steered
    pub lookahead_alpha_rad: Option<f64>,

    /// The fault raised by this tick, if any
    pub fault: Option<TickFault>
}

/// One row of the tick archive.
#[derive(Debug, Clone, Serialize)]
pub struct TickRecord {
    pub cycle: u64,
    pub tick_count: u64,
    pub fault_count: u64,
    pub x_m: f64,
    pub y_m: f64,
    pub yaw_deg: f64,
    pub vx_world_ms: f64,
    pub vy_world_ms: f64,
    pub progress_m: f64,
    pub lat_error_m: f64,
    pub cumulative_error_m: f64,
    pub steer_raw: f64,
    pub steer: f64,
    pub throttle: f64,
    pub curvature_param: f64,
    pub progress_jump: bool,
    pub fault: String
}

/// The result of a tick which didn't fault, before it is committed to the
/// control state.
struct TickUpdate {
    projection: Projection,
    error: f64,
    command: ControlCommand,
    report: StatusReport
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Potential errors that can occur when creating the module.
#[derive(Debug, thiserror::Error)]
pub enum TrajCtrlError {
    #[error("Could not load parameters: {0}")]
    ParamLoadError(params::LoadError),

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Could not load the centerline: {0}")]
    CenterlineError(CenterlineError),

    #[error("Could not create the tick archive: {0}")]
    ArchiveError(ArchiveError)
}

/// Faults that can occur during a tick.
///
/// A fault causes the previous command to be held, it never stops the
/// control loop.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, thiserror::Error)]
pub enum TickFault {
    #[error("Projection onto the path failed: {0}")]
    ProjectionFailure(ProjectionError),

    #[error("The pose or velocity contains non-finite values")]
    InvalidPoseInput,

    #[error("The tick took {0:.06} s, exceeding its budget")]
    TickOverrun(f64),

    #[error("The computed command ({0}, {1}) is not finite")]
    NonFiniteCommand(f64, f64)
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl State for TrajCtrl<Centerline> {
    type InitData = InitData;
    type InitError = TrajCtrlError;

    type InputData = InputData;
    type OutputData = ControlCommand;
    type StatusReport = StatusReport;
    type ProcError = Infallible;

    /// Initialise the TrajCtrl module.
    ///
    /// Loads the parameters and the centerline, and if a session is given
    /// opens the tick archive in it.
    fn init(
        init_data: Self::InitData,
        session: Option<&Session>
    ) -> Result<Self, Self::InitError> {
        // Load the parameters
        let params: Params = params::load(&init_data.params_file)
            .map_err(TrajCtrlError::ParamLoadError)?;

        // Load the track
        let path = Centerline::from_csv(&init_data.track_path)
            .map_err(TrajCtrlError::CenterlineError)?;

        info!(
            "Loaded centerline from {:?}: {} points, {:.02} m long",
            init_data.track_path,
            path.num_points(),
            path.length()
        );

        let mut traj_ctrl = Self::new(params, path)?;

        if let Some(s) = session {
            traj_ctrl.arch_ticks = Archiver::from_path(s, "traj_ctrl/ticks.csv")
                .map_err(TrajCtrlError::ArchiveError)?;
        }

        Ok(traj_ctrl)
    }

    /// Perform a single control tick.
    ///
    /// Ticks never fail, faults are reported in the status report.
    fn proc(
        &mut self,
        input_data: &Self::InputData
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        let cmd = self.tick(
            &input_data.transform,
            &input_data.velocity,
            &input_data.aux
        );

        Ok((cmd, self.report))
    }
}

impl<P: ReferencePath> TrajCtrl<P> {
    /// Create a new instance following the given path.
    ///
    /// The control state starts at its defaults, with no progress estimate,
    /// so the first tick searches the whole path.
    pub fn new(params: Params, path: P) -> Result<Self, TrajCtrlError> {
        params.validate().map_err(TrajCtrlError::InvalidParams)?;

        if !(path.length() > 2.0 * params.progress_window_m) {
            warn!(
                "The progress window ({} m) covers the whole path ({} m), \
                every tick will search the whole path",
                params.progress_window_m,
                path.length()
            );
        }

        // Initialise the controllers
        let controllers = TrajControllers::new(&params);

        Ok(Self {
            params,
            path,
            controllers,
            state: ControlState::default(),
            report: StatusReport::default(),
            last_fault: None,
            input_transform: VehicleTransform::default(),
            input_velocity: Vector3D::default(),
            output: ControlCommand::default(),
            cycle_count: 0,
            arch_ticks: Archiver::default()
        })
    }

    /// Run one control tick and return the command to apply.
    ///
    /// If the tick faults the previous command is returned and the fault
    /// counter is incremented. The control state is otherwise left
    /// untouched.
    pub fn tick(
        &mut self,
        transform: &VehicleTransform,
        velocity: &Vector3D,
        aux: &AuxData
    ) -> ControlCommand {
        let start = Instant::now();

        self.cycle_count += 1;
        self.input_transform = *transform;
        self.input_velocity = *velocity;

        let result = self.compute(transform, velocity, aux)
            .and_then(|update| {
                let elapsed_s = start.elapsed().as_secs_f64();
                if elapsed_s > self.params.tick_budget_s {
                    Err(TickFault::TickOverrun(elapsed_s))
                }
                else {
                    Ok(update)
                }
            });

        self.output = match result {
            Ok(update) => self.commit(update),
            Err(fault) => self.hold(fault)
        };

        trace!(
            "TrajCtrl output: steer {:.04}, throttle {:.04}",
            self.output.steer,
            self.output.throttle
        );

        self.output
    }

    /// Get the state carried between ticks.
    pub fn control_state(&self) -> &ControlState {
        &self.state
    }

    /// Get the status report from the last tick.
    pub fn report(&self) -> &StatusReport {
        &self.report
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn path(&self) -> &P {
        &self.path
    }

    /// Run the control laws without modifying any state.
    fn compute(
        &self,
        transform: &VehicleTransform,
        velocity: &Vector3D,
        aux: &AuxData
    ) -> Result<TickUpdate, TickFault> {
        if !transform.is_finite() || !velocity.is_planar_finite() {
            return Err(TickFault::InvalidPoseInput)
        }

        let mut report = StatusReport::default();

        let x = transform.location.x;
        let y = transform.location.y;
        let yaw_rad = transform.rotation.yaw.to_radians();

        // ---- VELOCITY ----

        let (vx_body, vy_body) = frames::world_to_vehicle(velocity.x, velocity.y, yaw_rad);
        report.vx_body_ms = vx_body;
        report.vy_body_ms = vy_body;
        report.speed_ms = (vx_body * vx_body + vy_body * vy_body).sqrt();

        // ---- PROJECTION ----

        let window_m = self.window_m(report.speed_ms);
        report.window_m = window_m;

        let (projection, search_m) = self.project(x, y, window_m)?;
        report.progress_m = projection.progress;
        report.search_window_m = search_m;
        report.progress_jump = search_m > window_m;

        let error = projection.distance * self.path.error_sign(x, y, projection.progress);
        report.lat_error_m = error;

        // ---- STEERING ----

        let pd = self.controllers.lat_ctrl.get(error, self.state.last_error);
        report.p_term = pd.p_term;
        report.d_term = pd.d_term;

        let mut steer = match self.params.lateral_strategy {
            LateralStrategy::Pd => pd.output,
            LateralStrategy::Lookahead => {
                match self.controllers.lookahead.get(transform, &aux.waypoints) {
                    Some(la) => {
                        report.lookahead_alpha_rad = Some(la.alpha_rad);
                        la.steer
                    },
                    None => {
                        trace!("Not enough waypoints ahead, using PD steering");
                        pd.output
                    }
                }
            }
        };
        report.steer_raw = steer;

        if self.params.clamp_steer && steer.abs() > self.params.steer_limit {
            steer = steer.clamp(-self.params.steer_limit, self.params.steer_limit);
            report.steer_saturated = true;
        }

        // ---- THROTTLE ----

        let speed = self.controllers.speed_map.get(&self.path, projection.progress);
        report.curvature_param = speed.curvature_param;
        report.target_throttle = speed.target_throttle;
        report.brake_cap_applied = speed.brake_cap_applied;

        let command = ControlCommand::new(steer, speed.throttle);

        if !command.steer.is_finite() || !command.throttle.is_finite() {
            return Err(TickFault::NonFiniteCommand(command.steer, command.throttle))
        }

        Ok(TickUpdate {
            projection,
            error,
            command,
            report
        })
    }

    /// Apply the result of a successful tick to the control state.
    fn commit(&mut self, update: TickUpdate) -> ControlCommand {
        if let Some(f) = self.last_fault.take() {
            info!("TrajCtrl recovered from fault: {}", f);
        }

        if update.report.progress_jump {
            warn!(
                "Progress jumped beyond the {:.02} m search window to {:.03} m, \
                search widened to {:.02} m",
                update.report.window_m,
                update.projection.progress,
                update.report.search_window_m
            );
        }

        if update.report.steer_saturated {
            debug!(
                "Steer demand {:.04} saturated to {:.04}",
                update.report.steer_raw,
                update.command.steer
            );
        }

        self.state.progress = Some(update.projection.progress);
        self.state.last_error = update.error;
        self.state.cumulative_error += update.error;
        self.state.last_steer_command = update.command.steer;
        self.state.last_throttle_command = update.command.throttle;
        self.state.tick_count += 1;

        self.report = update.report;

        debug!(
            "TrajCtrl tick {}: progress {:.03} m, lat error {:.04} m, speed {:.03} m/s",
            self.state.tick_count,
            update.projection.progress,
            update.error,
            self.report.speed_ms
        );

        update.command
    }

    /// Hold the previous command after a fault.
    fn hold(&mut self, fault: TickFault) -> ControlCommand {
        self.state.fault_count += 1;

        // Only log the first of a run of faults of the same kind
        let repeat = self.last_fault
            .map(|f| discriminant(&f) == discriminant(&fault))
            .unwrap_or(false);

        if repeat {
            trace!("TrajCtrl fault repeated: {}", fault);
        }
        else {
            warn!(
                "TrajCtrl fault, holding previous command: {} ({} faults so far)",
                fault,
                self.state.fault_count
            );
        }

        self.last_fault = Some(fault);

        self.report = StatusReport {
            progress_m: self.state.progress.unwrap_or(std::f64::NAN),
            lat_error_m: self.state.last_error,
            fault: Some(fault),
            ..Default::default()
        };

        ControlCommand::new(
            self.state.last_steer_command,
            self.state.last_throttle_command
        )
    }

    /// Get the half width of the search window for the current speed.
    fn window_m(&self, speed_ms: f64) -> f64 {
        if self.params.adaptive_window {
            let travel_m = speed_ms
                * self.params.tick_period_s
                * self.params.adaptive_window_margin;

            self.params.progress_window_m.max(travel_m)
        }
        else {
            self.params.progress_window_m
        }
    }

    /// Project the vehicle onto the path, searching around the previous
    /// progress.
    ///
    /// A projection on the edge of a bounded search means the nearest point
    /// may lie outside it, so the window is doubled until the projection
    /// lands inside it or the whole path is searched. Returns the projection
    /// and the half width of the window it was found in.
    fn project(
        &self,
        x: f64,
        y: f64,
        window_m: f64
    ) -> Result<(Projection, f64), TickFault> {
        let length_m = self.path.length();
        let mut search_m = window_m;

        loop {
            let bound = bound::progress_bound(self.state.progress, search_m, length_m);

            let projection = self.path
                .project(x, y, bound.as_ref())
                .map_err(TickFault::ProjectionFailure)?;

            let on_edge = match (bound, self.state.progress) {
                (Some(_), Some(prev)) => {
                    wrapped_delta(prev, projection.progress, length_m).abs()
                        >= search_m - WINDOW_EDGE_TOL_M
                },
                _ => false
            };

            if !on_edge {
                return Ok((projection, search_m))
            }

            search_m *= 2.0;
        }
    }
}

impl<P: ReferencePath> Archived for TrajCtrl<P> {
    fn write(&mut self) -> Result<(), ArchiveError> {
        let fault = match self.report.fault {
            Some(TickFault::ProjectionFailure(_)) => "ProjectionFailure",
            Some(TickFault::InvalidPoseInput) => "InvalidPoseInput",
            Some(TickFault::TickOverrun(_)) => "TickOverrun",
            Some(TickFault::NonFiniteCommand(..)) => "NonFiniteCommand",
            None => ""
        };

        self.arch_ticks.serialise(TickRecord {
            cycle: self.cycle_count,
            tick_count: self.state.tick_count,
            fault_count: self.state.fault_count,
            x_m: self.input_transform.location.x,
            y_m: self.input_transform.location.y,
            yaw_deg: self.input_transform.rotation.yaw,
            vx_world_ms: self.input_velocity.x,
            vy_world_ms: self.input_velocity.y,
            progress_m: self.report.progress_m,
            lat_error_m: self.report.lat_error_m,
            cumulative_error_m: self.state.cumulative_error,
            steer_raw: self.report.steer_raw,
            steer: self.output.steer,
            throttle: self.output.throttle,
            curvature_param: self.report.curvature_param,
            progress_jump: self.report.progress_jump,
            fault: fault.to_string()
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::centerline::ProgressBound;
    use std::cell::Cell;

    /// A straight path along the world X axis, with a settable curvature and
    /// a switch to make projection fail.
    struct StraightPath {
        curvature: f64,
        fail: Cell<bool>
    }

    impl StraightPath {
        fn new(curvature: f64) -> Self {
            Self { curvature, fail: Cell::new(false) }
        }
    }

    impl ReferencePath for StraightPath {
        fn length(&self) -> f64 {
            1000.0
        }

        fn project(
            &self,
            x: f64,
            y: f64,
            bound: Option<&ProgressBound>
        ) -> Result<Projection, ProjectionError> {
            if self.fail.get() {
                return Err(ProjectionError::NothingInBound(bound.copied()))
            }

            Ok(Projection {
                progress: util::maths::rem_euclid(x, 1000.0),
                distance: y.abs()
            })
        }

        fn error_sign(&self, _x: f64, y: f64, _progress: f64) -> f64 {
            if y >= 0.0 { 1.0 } else { -1.0 }
        }

        fn curvature(&self, _progress: f64) -> f64 {
            self.curvature
        }
    }

    fn traj_ctrl(params: Params, curvature: f64) -> TrajCtrl<StraightPath> {
        TrajCtrl::new(params, StraightPath::new(curvature)).unwrap()
    }

    fn pose(x: f64, y: f64) -> VehicleTransform {
        VehicleTransform::planar(x, y, 0.0)
    }

    #[test]
    fn test_on_path() {
        let mut tc = traj_ctrl(Params::default(), 0.0);
        let v = Vector3D::new(10.0, 0.0, 0.0);

        tc.tick(&pose(10.0, 0.0), &v, &AuxData::default());
        let cmd = tc.tick(&pose(10.5, 0.0), &v, &AuxData::default());

        assert_eq!(cmd, ControlCommand::new(0.0, 0.76));
        assert_eq!(tc.control_state().tick_count, 2);
        assert_eq!(tc.control_state().progress, Some(10.5));
        assert_eq!(tc.report().speed_ms, 10.0);
    }

    #[test]
    fn test_offset_right() {
        let mut params = Params::default();
        params.clamp_steer = false;
        let mut tc = traj_ctrl(params, 0.0);

        let cmd = tc.tick(&pose(10.0, -1.0), &Vector3D::default(), &AuxData::default());

        assert_eq!(tc.report().lat_error_m, -1.0);
        assert_eq!(cmd.steer, -15.5);
        assert_eq!(tc.control_state().last_error, -1.0);
        assert_eq!(tc.control_state().cumulative_error, -1.0);
    }

    #[test]
    fn test_offset_right_clamped() {
        let mut tc = traj_ctrl(Params::default(), 0.0);

        let cmd = tc.tick(&pose(10.0, -1.0), &Vector3D::default(), &AuxData::default());

        assert_eq!(cmd.steer, -1.0);
        assert_eq!(tc.report().steer_raw, -15.5);
        assert!(tc.report().steer_saturated);
        assert_eq!(tc.control_state().last_steer_command, -1.0);
    }

    #[test]
    fn test_derivative_uses_last_error() {
        let mut params = Params::default();
        params.clamp_steer = false;
        let mut tc = traj_ctrl(params, 0.0);

        tc.tick(&pose(10.0, -1.0), &Vector3D::default(), &AuxData::default());
        let cmd = tc.tick(&pose(10.0, -1.0), &Vector3D::default(), &AuxData::default());

        // Error unchanged so only the proportional term remains
        assert_eq!(cmd.steer, -0.5);
        assert_eq!(tc.control_state().cumulative_error, -2.0);
    }

    #[test]
    fn test_sharp_curvature() {
        let mut tc = traj_ctrl(Params::default(), 0.5);

        let cmd = tc.tick(&pose(10.0, 0.0), &Vector3D::default(), &AuxData::default());

        assert_eq!(tc.report().curvature_param, 1.0);
        assert_eq!(cmd.throttle, 0.39);
        assert!(tc.report().brake_cap_applied);
    }

    #[test]
    fn test_projection_failure_holds() {
        let mut tc = traj_ctrl(Params::default(), 0.0);

        let good = tc.tick(&pose(10.0, 0.2), &Vector3D::default(), &AuxData::default());
        let state = *tc.control_state();

        tc.path.fail.set(true);
        let held = tc.tick(&pose(11.0, 0.0), &Vector3D::default(), &AuxData::default());

        assert_eq!(held, good);
        assert_eq!(tc.control_state().fault_count, 1);
        assert_eq!(tc.control_state().tick_count, state.tick_count);
        assert_eq!(tc.control_state().last_error, state.last_error);
        assert_eq!(tc.control_state().progress, state.progress);
        assert!(matches!(
            tc.report().fault,
            Some(TickFault::ProjectionFailure(_))
        ));

        // A second fault in a row counts again
        tc.tick(&pose(12.0, 0.0), &Vector3D::default(), &AuxData::default());
        assert_eq!(tc.control_state().fault_count, 2);

        // And recovery clears the fault
        tc.path.fail.set(false);
        tc.tick(&pose(11.0, 0.0), &Vector3D::default(), &AuxData::default());
        assert_eq!(tc.report().fault, None);
        assert_eq!(tc.control_state().tick_count, state.tick_count + 1);
    }

    #[test]
    fn test_invalid_input_holds() {
        let mut tc = traj_ctrl(Params::default(), 0.0);

        let cmd = tc.tick(
            &pose(std::f64::NAN, 0.0),
            &Vector3D::default(),
            &AuxData::default()
        );
        assert_eq!(cmd, ControlCommand::default());
        assert_eq!(tc.control_state().fault_count, 1);
        assert_eq!(tc.report().fault, Some(TickFault::InvalidPoseInput));

        tc.tick(
            &pose(1.0, 0.0),
            &Vector3D::new(std::f64::INFINITY, 0.0, 0.0),
            &AuxData::default()
        );
        assert_eq!(tc.control_state().fault_count, 2);
        assert_eq!(tc.control_state().tick_count, 0);
        assert_eq!(tc.control_state().progress, None);
    }

    #[test]
    fn test_non_finite_curvature_holds() {
        let mut tc = traj_ctrl(Params::default(), std::f64::NAN);

        tc.tick(&pose(10.0, 0.0), &Vector3D::default(), &AuxData::default());

        assert!(matches!(
            tc.report().fault,
            Some(TickFault::NonFiniteCommand(..))
        ));
        assert_eq!(tc.control_state().fault_count, 1);
    }

    #[test]
    fn test_progress_jump_flagged() {
        let mut tc = traj_ctrl(Params::default(), 0.0);

        tc.tick(&pose(10.0, 0.0), &Vector3D::default(), &AuxData::default());
        assert!(!tc.report().progress_jump);

        tc.tick(&pose(11.0, 0.0), &Vector3D::default(), &AuxData::default());
        assert!(!tc.report().progress_jump);

        // The mock projection ignores the bound, so the window keeps doubling
        // until the jump fits inside it
        tc.tick(&pose(20.0, 0.0), &Vector3D::default(), &AuxData::default());
        assert!(tc.report().progress_jump);
        assert_eq!(tc.report().window_m, 2.0);
        assert_eq!(tc.report().search_window_m, 16.0);
        assert_eq!(tc.control_state().progress, Some(20.0));

        tc.tick(&pose(21.0, 0.0), &Vector3D::default(), &AuxData::default());
        assert!(!tc.report().progress_jump);
        assert_eq!(tc.report().search_window_m, 2.0);
    }

    #[test]
    fn test_tick_overrun_holds() {
        let mut tc = traj_ctrl(Params::default(), 0.0);

        let good = tc.tick(&pose(10.0, 0.5), &Vector3D::default(), &AuxData::default());
        let state = *tc.control_state();

        tc.params.tick_budget_s = 1e-15;
        let held = tc.tick(&pose(11.0, -1.0), &Vector3D::default(), &AuxData::default());

        assert_eq!(held, good);
        assert!(matches!(tc.report().fault, Some(TickFault::TickOverrun(t)) if t > 1e-15));
        assert_eq!(tc.control_state().fault_count, 1);
        assert_eq!(tc.control_state().tick_count, state.tick_count);
        assert_eq!(tc.control_state().progress, state.progress);
        assert_eq!(tc.control_state().last_error, state.last_error);
        assert_eq!(tc.control_state().cumulative_error, state.cumulative_error);
    }

    #[test]
    fn test_vertical_velocity_ignored() {
        let mut tc = traj_ctrl(Params::default(), 0.0);

        tc.tick(
            &pose(10.0, 0.0),
            &Vector3D::new(10.0, 0.0, std::f64::NAN),
            &AuxData::default()
        );

        assert_eq!(tc.report().fault, None);
        assert_eq!(tc.report().speed_ms, 10.0);
        assert_eq!(tc.control_state().tick_count, 1);
    }

    #[test]
    fn test_tick_archive() {
        let path = std::env::temp_dir()
            .join("race_exec_tick_archive_test")
            .join("ticks.csv");

        {
            let mut tc = traj_ctrl(Params::default(), 0.0);
            tc.arch_ticks = Archiver::create(&path).unwrap();

            tc.tick(&pose(10.0, 0.5), &Vector3D::new(4.0, 0.0, 0.0), &AuxData::default());
            tc.write().unwrap();

            tc.path.fail.set(true);
            tc.tick(&pose(11.0, 0.0), &Vector3D::new(4.0, 0.0, 0.0), &AuxData::default());
            tc.write().unwrap();

            tc.path.fail.set(false);
            tc.tick(&pose(11.0, 0.0), &Vector3D::new(4.0, 0.0, 0.0), &AuxData::default());
            tc.write().unwrap();
        }

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(
            headers.iter().collect::<Vec<_>>(),
            vec![
                "cycle", "tick_count", "fault_count", "x_m", "y_m", "yaw_deg",
                "vx_world_ms", "vy_world_ms", "progress_m", "lat_error_m",
                "cumulative_error_m", "steer_raw", "steer", "throttle",
                "curvature_param", "progress_jump", "fault"
            ]
        );

        let rows = reader
            .records()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(rows.len(), 3);

        let col = |name: &str| headers.iter().position(|h| h == name).unwrap();
        let num = |row: usize, name: &str| rows[row][col(name)].parse::<f64>().unwrap();

        // One record per call, faulted or not
        assert_eq!(num(0, "cycle"), 1.0);
        assert_eq!(num(1, "cycle"), 2.0);
        assert_eq!(num(2, "cycle"), 3.0);
        assert_eq!(&rows[0][col("fault")], "");
        assert_eq!(&rows[2][col("fault")], "");

        // The faulted cycle records the held command and doesn't count as a tick
        assert_eq!(&rows[1][col("fault")], "ProjectionFailure");
        assert_eq!(num(1, "tick_count"), 1.0);
        assert_eq!(num(1, "fault_count"), 1.0);
        assert_eq!(num(1, "x_m"), 11.0);
        assert_eq!(num(1, "steer"), num(0, "steer"));
        assert_eq!(num(1, "throttle"), num(0, "throttle"));

        assert_eq!(num(0, "lat_error_m"), 0.5);
        assert_eq!(num(0, "vx_world_ms"), 4.0);
        assert_eq!(num(2, "tick_count"), 2.0);
        assert_eq!(&rows[2][col("progress_jump")], "false");
    }

    #[test]
    fn test_adaptive_window() {
        let mut params = Params::default();
        params.adaptive_window = true;
        params.tick_period_s = 0.1;
        params.adaptive_window_margin = 2.0;
        let mut tc = traj_ctrl(params, 0.0);

        tc.tick(&pose(10.0, 0.0), &Vector3D::new(1.0, 0.0, 0.0), &AuxData::default());
        assert_eq!(tc.report().window_m, 2.0);

        tc.tick(&pose(10.0, 0.0), &Vector3D::new(50.0, 0.0, 0.0), &AuxData::default());
        assert!((tc.report().window_m - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_lookahead_strategy() {
        let mut params = Params::default();
        params.lateral_strategy = LateralStrategy::Lookahead;
        let mut tc = traj_ctrl(params, 0.0);

        // No waypoints falls back to PD
        tc.tick(&pose(10.0, 0.0), &Vector3D::default(), &AuxData::default());
        assert_eq!(tc.report().lookahead_alpha_rad, None);

        let aux = AuxData {
            waypoints: (1..10)
                .map(|i| Vector3D::new(10.0 + 2.0 * i as f64, 1.0, 0.0))
                .collect(),
            ..Default::default()
        };
        let cmd = tc.tick(&pose(10.0, 0.0), &Vector3D::default(), &aux);

        assert!(tc.report().lookahead_alpha_rad.unwrap() > 0.0);
        assert!(cmd.steer < 0.0);
    }

    #[test]
    fn test_invalid_params() {
        let mut params = Params::default();
        params.max_throttle = 2.0;

        assert!(matches!(
            TrajCtrl::new(params, StraightPath::new(0.0)),
            Err(TrajCtrlError::InvalidParams(_))
        ));
    }

    #[test]
    fn test_independent_instances() {
        let mut a = traj_ctrl(Params::default(), 0.0);
        let b = traj_ctrl(Params::default(), 0.0);

        a.tick(&pose(10.0, -1.0), &Vector3D::default(), &AuxData::default());

        assert_eq!(a.control_state().tick_count, 1);
        assert_eq!(*b.control_state(), ControlState::default());
    }
}
