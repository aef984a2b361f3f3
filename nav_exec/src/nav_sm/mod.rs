//! # Navigation state machine module
//!
//! This module implements the navigator's state machine, which fuses the
//! mission waypoint plan, live pose estimates, cone sightings, and touch
//! events into commands for the autopilot bridge.
//!
//! The machine is event driven: each cycle the executable drains its input
//! topics and passes the events to [`NavSm::proc`] along with the cycle
//! timestamp. Handlers mutate the machine's context and queue
//! [`ApCommand`]s; the event loop is the only owner of the context and the
//! bridge is the only consumer of the queued commands.
//!
//! Mechanical transients (braking after a cone touch, settling between
//! direction changes) are modelled as the [`NavState::Limbo`] state: a timed
//! sequence of command phases during which all input events are discarded.
//! Commands emitted during limbo are exactly those queued by the handler
//! which entered it.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod approach;
mod escape;
mod params;
mod search;

pub use params::{EscapeStrategy, NavSmParams};

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::collections::VecDeque;
use std::time::{Duration, Instant};

// External
use log::{debug, info, warn};
use serde::Serialize;
use thiserror::Error;

// Internal
use comms_if::{
    ap::{ApCommand, ApMode, ParamValue},
    exec::ExecCmd,
    msg::cone::ConeSightings,
    msg::mission::WaypointList
};
use util::{module::State, session::Session};

use crate::loc::Pose;
use crate::mission::{self, WaypointMeta};
use crate::vision::ConeVision;

// ------------------------------------------------------------------------------------------------
// DATA STRUCTURES
// ------------------------------------------------------------------------------------------------

/// Navigation state machine.
pub struct NavSm {
    params: NavSmParams,

    /// Cone estimator built from the configured camera intrinsics.
    vision: ConeVision,

    state: NavState,

    ctx: NavCtx,

    /// Commands queued for the autopilot bridge during this cycle.
    commands: Vec<ApCommand>,

    /// Adjusted waypoint list to publish this cycle, if any.
    adjusted: Option<WaypointList>
}

/// Mutable context of the state machine.
///
/// The context is owned by the machine and borrowed mutably by each handler
/// in sequence; no other thread of control touches it.
#[derive(Default)]
pub(crate) struct NavCtx {
    /// The latest mission waypoint list.
    pub waypoints: Option<WaypointList>,

    /// The latest map-frame waypoint list, used to compute escape bearings.
    pub map_waypoints: Option<WaypointList>,

    /// The latest robot pose.
    pub robot_pose: Option<Pose>,

    /// Index of the currently targeted cone waypoint.
    ///
    /// Defined exactly while driving to, searching for, or escaping a cone.
    pub cone_wp_index: Option<usize>,

    /// Latched once the cone comes within the close distance. Cleared when a
    /// new waypoint becomes current.
    pub cone_is_close: bool,

    /// Heading target used by the circling sweeps and the aligned backup,
    /// radians.
    pub target_heading_rad: f64,

    /// Cruise speed last written to the autopilot, for change detection.
    pub last_cruise_speed_ms: Option<f64>,

    /// Consecutive cone-less frames seen while driving to a cone.
    pub cone_lost_count: u32,

    /// When the current drive-to-cone episode began.
    pub driving_since: Option<Instant>,

    /// The timed phase sequence being executed while in limbo.
    pub limbo: Option<LimboSeq>
}

/// Input to one processing cycle.
pub struct NavSmInput {
    /// Timestamp of this cycle.
    pub now: Instant,

    /// Events drained from the input topics, in per-topic arrival order.
    pub events: Vec<NavEvent>
}

/// Output of one processing cycle.
#[derive(Default)]
pub struct NavSmOutput {
    /// Commands for the autopilot bridge, in emission order.
    pub commands: Vec<ApCommand>,

    /// Adjusted map-frame waypoint list to publish.
    pub adjusted_waypoints: Option<WaypointList>
}

/// Status report for navigation state machine processing.
#[derive(Clone, Copy, Serialize, Debug)]
pub struct NavSmReport {
    /// Wire name of the current state.
    pub state: &'static str,

    pub cone_wp_index: Option<usize>,

    pub cone_is_close: bool,

    pub cone_lost_count: u32
}

/// A timed sequence of command phases executed while in limbo.
pub(crate) struct LimboSeq {
    /// Remaining phases after the current one.
    phases: VecDeque<LimboPhase>,

    /// When the current phase ends.
    phase_end: Instant,

    /// What to do once all phases have elapsed.
    after: AfterLimbo
}

/// One phase of a limbo sequence: commands to queue when the phase begins,
/// and how long to hold before the next phase.
pub(crate) struct LimboPhase {
    pub commands: Vec<ApCommand>,

    pub duration_s: f64
}

// ------------------------------------------------------------------------------------------------
// ENUMERATIONS
// ------------------------------------------------------------------------------------------------

/// The states of the navigator.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum NavState {
    /// Waiting for the start command from the executive.
    WaitingForStart,

    /// The autopilot is flying the mission in auto mode.
    FollowingWaypoints,

    /// Sweeping the back half circle looking for a missed cone.
    CirclingBack,

    /// Sweeping the forward half circle looking for a missed cone.
    CirclingForward,

    /// Driving toward a sighted cone under the approach controller.
    DrivingToCone,

    /// Backing away from a touched cone toward the next waypoint bearing.
    EscapingCone,

    /// Mission complete.
    Finished,

    /// Mission failed, a cone could not be found.
    Failed,

    /// Executing a timed transient; all input events are discarded.
    Limbo
}

/// Events consumed by the state machine.
#[derive(Debug, Clone)]
pub enum NavEvent {
    /// A command from the ground executive.
    ExecCmd(ExecCmd),

    /// The autopilot reported its mode.
    ApState(ApMode),

    /// The mission waypoint list (or its current sequence index) changed.
    WaypointsChanged(WaypointList),

    /// A fresh map-frame waypoint list arrived.
    MapWaypoints(WaypointList),

    /// A fresh pose estimate arrived.
    RobotPose(Pose),

    /// A camera frame's cone sightings arrived (possibly empty).
    ConeSightings(ConeSightings),

    /// The touch sensor changed state.
    Touch(bool)
}

/// What to do when a limbo sequence completes.
pub(crate) enum AfterLimbo {
    /// Resume the mission from the given waypoint index.
    FollowWaypoints(usize),

    /// Dispatch the configured escape strategy.
    DispatchEscape
}

/// Errors that can occur during state machine processing.
///
/// Input-shaped faults (bad requests, missing preconditions) are logged and
/// absorbed by the handlers; these errors indicate a genuine internal
/// inconsistency.
#[derive(Debug, Error)]
pub enum NavSmError {
    #[error("No waypoint list is available")]
    NoWaypointList,

    #[error("Waypoint index {0} is beyond the end of the mission ({1} waypoints)")]
    WaypointIndexOutOfRange(usize, usize),

    #[error("No cone waypoint is targeted")]
    ConeWaypointUnset
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for NavSm {
    fn default() -> Self {
        Self::new(NavSmParams::default())
    }
}

impl NavSm {
    /// Create a state machine with the given parameters.
    pub fn new(params: NavSmParams) -> Self {
        Self {
            vision: ConeVision::new(params.horz_fov.to_radians(), params.horz_pixels),
            params,
            state: NavState::WaitingForStart,
            ctx: NavCtx::default(),
            commands: Vec::new(),
            adjusted: None
        }
    }
}

impl State for NavSm {
    type InitData = &'static str;
    type InitError = util::params::LoadError;

    type InputData = NavSmInput;
    type OutputData = NavSmOutput;
    type StatusReport = NavSmReport;
    type ProcError = NavSmError;

    /// Initialise the state machine.
    ///
    /// Expected init data is the path to the parameter file.
    fn init(&mut self, init_data: Self::InitData, _session: &Session)
        -> Result<(), Self::InitError>
    {
        self.params = util::params::load(init_data)?;
        self.vision = ConeVision::new(
            self.params.horz_fov.to_radians(),
            self.params.horz_pixels
        );

        Ok(())
    }

    /// Process one cycle of the state machine.
    ///
    /// Advances any limbo sequence first, then dispatches the cycle's events
    /// in order. Events delivered while in limbo are discarded.
    fn proc(&mut self, input_data: &Self::InputData)
        -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError>
    {
        self.advance_limbo(input_data.now)?;
        self.check_cone_timeout(input_data.now);

        for event in &input_data.events {
            if self.state == NavState::Limbo {
                debug!("In limbo, discarding {:?}", event);
                continue;
            }

            self.handle_event(event, input_data.now)?;
        }

        let output = NavSmOutput {
            commands: std::mem::take(&mut self.commands),
            adjusted_waypoints: self.adjusted.take()
        };

        Ok((output, self.report()))
    }
}

impl NavSm {

    /// The current state of the machine.
    pub fn state(&self) -> NavState {
        self.state
    }

    /// Queue a command for the autopilot bridge.
    fn emit(&mut self, cmd: ApCommand) {
        self.commands.push(cmd);
    }

    fn report(&self) -> NavSmReport {
        NavSmReport {
            state: self.state.as_wire(),
            cone_wp_index: self.ctx.cone_wp_index,
            cone_is_close: self.ctx.cone_is_close,
            cone_lost_count: self.ctx.cone_lost_count
        }
    }

    fn set_state(&mut self, new: NavState) {
        if self.state != new {
            info!("NavSm state change to: {}", new);
            self.state = new;
        }
    }

    // ---- EVENT DISPATCH ----

    fn handle_event(&mut self, event: &NavEvent, now: Instant)
        -> Result<(), NavSmError>
    {
        match event {
            NavEvent::ExecCmd(cmd) => self.handle_exec_cmd(*cmd, now),
            NavEvent::ApState(mode) => self.handle_ap_state(*mode, now),
            NavEvent::WaypointsChanged(list) => self.handle_waypoints_changed(list, now),
            NavEvent::MapWaypoints(list) => {
                self.ctx.map_waypoints = Some(list.clone());
                Ok(())
            },
            NavEvent::RobotPose(pose) => self.handle_robot_pose(*pose, now),
            NavEvent::ConeSightings(sightings) => self.handle_cone_sightings(sightings, now),
            NavEvent::Touch(touched) => self.handle_touch(*touched, now)
        }
    }

    fn handle_exec_cmd(&mut self, cmd: ExecCmd, now: Instant)
        -> Result<(), NavSmError>
    {
        match cmd {
            ExecCmd::Start => self.handle_start(now),
            ExecCmd::Reset => self.handle_reset(),
            ExecCmd::AdjustWaypoints => self.handle_adjust_waypoints()
        }

        Ok(())
    }

    /// Handle the executive's start command.
    ///
    /// Arms the autopilot, holds for a second to let arming settle, then
    /// begins following the mission from waypoint 1 (waypoint 0 being the
    /// home position).
    fn handle_start(&mut self, now: Instant) {
        if self.state != NavState::WaitingForStart {
            warn!("START received while {}, ignored", self.state);
            return;
        }

        let num_wps = self.ctx.waypoints.as_ref()
            .map(|l| l.waypoints.len())
            .unwrap_or(0);
        if num_wps < 2 {
            warn!("START requires a mission of at least 2 waypoints, have {}", num_wps);
            return;
        }

        info!("Starting mission with {} waypoints", num_wps);

        if let Some(gcs_id) = self.params.gcs_id {
            self.emit(ApCommand::set_param("SYSID_MYGCS", ParamValue::Int(gcs_id)));
        }
        self.emit(ApCommand::arm(true));

        // Let arming settle before the mission is started
        self.enter_limbo(
            now,
            vec![LimboPhase { commands: vec![], duration_s: 1.0 }],
            AfterLimbo::FollowWaypoints(1)
        );
    }

    /// Handle the executive's reset command: stop and return to waiting.
    fn handle_reset(&mut self) {
        info!("Reset requested, stopping");

        self.emit(ApCommand::manual_speed(0.0, 0.0));
        self.emit(ApCommand::set_mode(ApMode::Hold));
        self.emit(ApCommand::arm(false));

        self.ctx.cone_wp_index = None;
        self.ctx.cone_is_close = false;
        self.ctx.cone_lost_count = 0;
        self.ctx.last_cruise_speed_ms = None;
        self.ctx.driving_since = None;
        self.ctx.limbo = None;

        self.set_state(NavState::WaitingForStart);
    }

    /// Handle the executive's adjust-waypoints command.
    ///
    /// Rewrites the map-frame waypoint list with all points relative to
    /// waypoint 0, uploads the rewritten mission to the autopilot, and
    /// republishes it for ground display.
    fn handle_adjust_waypoints(&mut self) {
        match self.ctx.map_waypoints.as_ref().and_then(mission::adjust_to_origin) {
            Some(adjusted) => {
                info!(
                    "Pushing {} waypoints adjusted relative to waypoint 0",
                    adjusted.waypoints.len()
                );
                self.emit(ApCommand::push_waypoints(adjusted.waypoints.clone()));
                self.adjusted = Some(adjusted);
            },
            None => {
                warn!("No map waypoints available, ADJUST_WAYPOINTS ignored");
            }
        }
    }

    /// Handle a mode report from the autopilot.
    ///
    /// The autopilot holds when it reaches the cone waypoint it was
    /// navigating toward, which is the cue to start looking for the cone.
    fn handle_ap_state(&mut self, mode: ApMode, now: Instant)
        -> Result<(), NavSmError>
    {
        if self.state == NavState::FollowingWaypoints && mode == ApMode::Hold {
            if self.ctx.cone_wp_index.is_some() {
                info!("Autopilot holding at the cone waypoint, searching");
                self.begin_circling_back(now);
            }
            else {
                debug!("Autopilot holding with no cone waypoint targeted");
            }
        }

        Ok(())
    }

    /// Handle a change of the mission waypoint list.
    fn handle_waypoints_changed(&mut self, list: &WaypointList, now: Instant)
        -> Result<(), NavSmError>
    {
        match self.state {
            // The mission must be known before it can be started
            NavState::WaitingForStart => {
                self.ctx.waypoints = Some(list.clone());
                Ok(())
            },

            NavState::FollowingWaypoints => {
                // If the autopilot has advanced past the targeted cone the
                // cone was missed
                if let Some(cone_ix) = self.ctx.cone_wp_index {
                    if list.current_seq > cone_ix {
                        warn!(
                            "Passed cone waypoint {} without touching it, searching",
                            cone_ix
                        );
                        self.ctx.waypoints = Some(list.clone());
                        self.begin_circling_back(now);
                        return Ok(());
                    }
                }

                let seq_changed = self.ctx.waypoints.as_ref()
                    .map(|l| l.current_seq)
                    != Some(list.current_seq);

                self.ctx.waypoints = Some(list.clone());

                if seq_changed {
                    self.on_current_waypoint_changed(list.current_seq);
                }

                Ok(())
            },

            // In all other states the mission is not being followed and the
            // update is ignored
            _ => Ok(())
        }
    }

    /// Actions taken when a new waypoint becomes current while following the
    /// mission.
    fn on_current_waypoint_changed(&mut self, seq: usize) {
        info!("Current waypoint is now {}", seq);

        let meta = self.ctx.waypoints.as_ref()
            .and_then(|l| mission::meta_at(l, seq));

        if let Some(meta) = meta {
            self.update_cruise_speed(&meta);

            self.ctx.cone_wp_index = if meta.is_cone { Some(seq) } else { None };
        }
        else {
            warn!("Current waypoint {} is beyond the end of the mission", seq);
            self.ctx.cone_wp_index = None;
        }

        self.ctx.cone_is_close = false;
    }

    /// Write the cruise speed for the given waypoint to the autopilot if it
    /// differs from the last one written.
    ///
    /// The autopilot only accepts cruise changes mid-mission while holding,
    /// so the write is bracketed by a hold and a return to auto.
    fn update_cruise_speed(&mut self, meta: &WaypointMeta) {
        let cruise_ms = meta.cruise_speed_ms(self.params.normal_speed);

        let changed = match self.ctx.last_cruise_speed_ms {
            Some(last) => (last - cruise_ms).abs() > 1e-6,
            None => true
        };

        if changed {
            info!("Setting cruise speed to {} m/s", cruise_ms);

            self.emit(ApCommand::set_mode(ApMode::Hold));
            self.emit(ApCommand::set_param("CRUISE_SPEED", ParamValue::Real(cruise_ms)));
            self.emit(ApCommand::set_mode(ApMode::Auto));

            self.ctx.last_cruise_speed_ms = Some(cruise_ms);
        }
    }

    /// Handle a fresh pose estimate.
    fn handle_robot_pose(&mut self, pose: Pose, now: Instant)
        -> Result<(), NavSmError>
    {
        self.ctx.robot_pose = Some(pose);

        if self.state == NavState::EscapingCone {
            self.escape_align_tick(&pose, now)?;
        }

        Ok(())
    }

    /// Handle a frame of cone sightings.
    fn handle_cone_sightings(&mut self, sightings: &ConeSightings, now: Instant)
        -> Result<(), NavSmError>
    {
        match self.state {
            NavState::FollowingWaypoints
            | NavState::CirclingBack
            | NavState::CirclingForward => {
                // A strong sighting while a cone waypoint is targeted begins
                // (or recovers) the approach
                if self.ctx.cone_wp_index.is_some() {
                    if let Some(target) =
                        self.vision.select(sightings, self.params.cone_recovery_min_area)
                    {
                        let target = *target;
                        self.begin_driving_to_cone(now);
                        self.drive_to_sighting(&target);
                        return Ok(());
                    }
                }

                // While circling, a frame without a sighting advances the
                // sweep
                if self.state != NavState::FollowingWaypoints {
                    self.circling_tick()?;
                }

                Ok(())
            },

            NavState::DrivingToCone => {
                match self.vision.select(sightings, self.params.cone_normal_min_area) {
                    Some(target) => {
                        let target = *target;
                        self.ctx.cone_lost_count = 0;
                        self.drive_to_sighting(&target);
                    },
                    None => {
                        self.ctx.cone_lost_count += 1;

                        if self.ctx.cone_lost_count > self.params.cone_lost_limit {
                            warn!(
                                "No cone sighted for {} frames, searching",
                                self.ctx.cone_lost_count
                            );
                            self.begin_circling_back(now);
                        }
                    }
                }

                Ok(())
            },

            _ => Ok(())
        }
    }

    /// Handle a touch sensor report.
    fn handle_touch(&mut self, touched: bool, now: Instant)
        -> Result<(), NavSmError>
    {
        if !touched || self.state != NavState::DrivingToCone {
            return Ok(());
        }

        let cone_ix = self.ctx.cone_wp_index.ok_or(NavSmError::ConeWaypointUnset)?;
        let last_ix = self.ctx.waypoints.as_ref()
            .and_then(mission::last_index)
            .ok_or(NavSmError::NoWaypointList)?;

        if cone_ix == last_ix {
            info!("Touched the final cone, mission complete");

            self.emit(ApCommand::manual_speed(0.0, 0.0));
            self.emit(ApCommand::set_mode(ApMode::Hold));

            self.ctx.cone_wp_index = None;
            self.ctx.driving_since = None;

            self.set_state(NavState::Finished);
        }
        else {
            info!("Touched cone {}, backing away", cone_ix);
            self.begin_touch_sequence(now);
        }

        Ok(())
    }

    // ---- MISSION RESUMPTION ----

    /// Resume following the mission from the given waypoint index.
    fn follow_waypoints(&mut self, index: usize) -> Result<(), NavSmError> {
        let meta = {
            let list = self.ctx.waypoints.as_ref().ok_or(NavSmError::NoWaypointList)?;

            mission::meta_at(list, index).ok_or(
                NavSmError::WaypointIndexOutOfRange(index, list.waypoints.len())
            )?
        };

        info!("Following waypoints from waypoint {}", index);

        self.emit(ApCommand::set_current_waypoint(index));

        let cruise_ms = meta.cruise_speed_ms(self.params.normal_speed);
        let changed = match self.ctx.last_cruise_speed_ms {
            Some(last) => (last - cruise_ms).abs() > 1e-6,
            None => true
        };

        if changed {
            info!("Setting cruise speed to {} m/s", cruise_ms);
            self.emit(ApCommand::set_mode(ApMode::Hold));
            self.emit(ApCommand::set_param("CRUISE_SPEED", ParamValue::Real(cruise_ms)));
            self.ctx.last_cruise_speed_ms = Some(cruise_ms);
        }

        self.emit(ApCommand::set_mode(ApMode::Auto));

        self.ctx.cone_wp_index = if meta.is_cone { Some(index) } else { None };
        self.ctx.cone_is_close = false;
        self.ctx.cone_lost_count = 0;
        self.ctx.driving_since = None;

        self.set_state(NavState::FollowingWaypoints);

        Ok(())
    }

    // ---- CONE TIMEOUT ----

    /// Treat an over-long drive toward a cone as a lost cone.
    fn check_cone_timeout(&mut self, now: Instant) {
        if self.state != NavState::DrivingToCone {
            return;
        }

        if let Some(since) = self.ctx.driving_since {
            if (now - since).as_secs_f64() > self.params.cone_timeout_seconds {
                warn!(
                    "Drove toward the cone for more than {} s, searching",
                    self.params.cone_timeout_seconds
                );
                self.begin_circling_back(now);
            }
        }
    }

    // ---- LIMBO ----

    /// Enter limbo with the given phase sequence.
    ///
    /// The first phase's commands are queued immediately; later phases queue
    /// theirs as their start times pass. Once all phases have elapsed the
    /// `after` action runs.
    fn enter_limbo(
        &mut self,
        now: Instant,
        phases: Vec<LimboPhase>,
        after: AfterLimbo
    ) {
        let mut phases = VecDeque::from(phases);

        match phases.pop_front() {
            Some(first) => {
                let phase_end = now + Duration::from_secs_f64(first.duration_s);

                self.commands.extend(first.commands);
                self.ctx.limbo = Some(LimboSeq { phases, phase_end, after });
                self.set_state(NavState::Limbo);
            },
            None => {
                // An empty sequence resolves immediately
                if let Err(e) = self.exit_limbo(after, now) {
                    warn!("Error leaving limbo: {}", e);
                }
            }
        }
    }

    /// Advance the limbo sequence against the cycle timestamp.
    fn advance_limbo(&mut self, now: Instant) -> Result<(), NavSmError> {
        while self.state == NavState::Limbo {
            let phase_over = match self.ctx.limbo {
                Some(ref limbo) => now >= limbo.phase_end,
                None => {
                    // Limbo with no sequence is unreachable, recover to safe
                    warn!("In limbo without a phase sequence, resetting");
                    self.handle_reset();
                    return Ok(());
                }
            };

            if !phase_over {
                return Ok(());
            }

            let mut limbo = self.ctx.limbo.take().unwrap();

            match limbo.phases.pop_front() {
                Some(phase) => {
                    self.commands.extend(phase.commands);
                    limbo.phase_end += Duration::from_secs_f64(phase.duration_s);
                    self.ctx.limbo = Some(limbo);
                },
                None => {
                    return self.exit_limbo(limbo.after, now);
                }
            }
        }

        Ok(())
    }

    /// Perform a limbo sequence's completion action.
    fn exit_limbo(&mut self, after: AfterLimbo, now: Instant)
        -> Result<(), NavSmError>
    {
        match after {
            AfterLimbo::FollowWaypoints(index) => self.follow_waypoints(index),
            AfterLimbo::DispatchEscape => self.dispatch_escape(now)
        }
    }
}

impl NavState {
    /// The state name published on the navigator state topic.
    pub fn as_wire(&self) -> &'static str {
        match self {
            NavState::WaitingForStart => "WAITING_FOR_START",
            NavState::FollowingWaypoints => "FOLLOWING_WAYPOINTS",
            NavState::CirclingBack => "CIRCLING_BACK",
            NavState::CirclingForward => "CIRCLING_FORWARD",
            NavState::DrivingToCone => "DRIVING_TO_CONE",
            NavState::EscapingCone => "ESCAPING_CONE",
            NavState::Finished => "FINISHED",
            NavState::Failed => "FAILED",
            NavState::Limbo => "LIMBO"
        }
    }
}

impl std::fmt::Display for NavState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_wire())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use nalgebra::{UnitQuaternion, Vector3};
    use util::maths::normalise_angle;

    use comms_if::ap::ApRequest;
    use comms_if::msg::cone::ConeSighting;
    use comms_if::msg::mission::Waypoint;

    // ---- FIXTURES ----

    fn waypoint(x: f64, y: f64, z: f64) -> Waypoint {
        Waypoint { x_lat: x, y_long: y, z_alt: z }
    }

    /// Mission of a home point, a plain waypoint, a cone at 100% cruise and
    /// 30% minimum approach speed, and a final cone.
    fn mission() -> WaypointList {
        WaypointList {
            waypoints: vec![
                waypoint(0.0, 0.0, 0.0),
                waypoint(10.0, 0.0, 0.0),
                waypoint(20.0, 0.0, 1030.0),
                waypoint(30.0, 0.0, 2000.0),
            ],
            current_seq: 0
        }
    }

    fn mission_at(seq: usize) -> WaypointList {
        let mut m = mission();
        m.current_seq = seq;
        m
    }

    fn pose_with_yaw(yaw_rad: f64) -> Pose {
        Pose {
            position_m: Vector3::default(),
            attitude_q: UnitQuaternion::from_euler_angles(0.0, 0.0, yaw_rad)
        }
    }

    fn frame(x: f64, area: f64) -> ConeSightings {
        ConeSightings {
            sightings: vec![ConeSighting {
                x,
                y: 0.0,
                z: 0.0,
                w: 0.0,
                h: 0.0,
                d: 0.0,
                area
            }]
        }
    }

    fn empty_frame() -> ConeSightings {
        ConeSightings::default()
    }

    // ---- HELPERS ----

    fn step(sm: &mut NavSm, now: Instant, events: Vec<NavEvent>) -> NavSmOutput {
        let (output, report) = sm.proc(&NavSmInput { now, events }).unwrap();
        assert_eq!(report.state, sm.state().as_wire());
        output
    }

    fn modes_set(cmds: &[ApCommand]) -> Vec<ApMode> {
        cmds.iter()
            .filter_map(|c| match c {
                ApCommand::Request(ApRequest::SetMode(m)) => Some(*m),
                _ => None
            })
            .collect()
    }

    fn manual_speeds(cmds: &[ApCommand]) -> Vec<(f64, f64)> {
        cmds.iter()
            .filter_map(|c| match c {
                ApCommand::ManualSpeed { speed, turning } => Some((*speed, *turning)),
                _ => None
            })
            .collect()
    }

    fn cruise_params_set(cmds: &[ApCommand]) -> Vec<f64> {
        cmds.iter()
            .filter_map(|c| match c {
                ApCommand::Request(ApRequest::SetParam { name, value: ParamValue::Real(v) })
                    if name == "CRUISE_SPEED" => Some(*v),
                _ => None
            })
            .collect()
    }

    /// Every cruise parameter write must be immediately preceded by a hold
    /// and followed by a return to auto.
    fn assert_cruise_dance(cmds: &[ApCommand]) {
        for (i, cmd) in cmds.iter().enumerate() {
            if let ApCommand::Request(ApRequest::SetParam { name, .. }) = cmd {
                if name != "CRUISE_SPEED" {
                    continue;
                }

                assert!(
                    matches!(
                        cmds.get(i.wrapping_sub(1)),
                        Some(ApCommand::Request(ApRequest::SetMode(ApMode::Hold)))
                    ),
                    "CRUISE_SPEED write not preceded by HOLD"
                );
                assert!(
                    cmds[i..].iter().any(|c| matches!(
                        c,
                        ApCommand::Request(ApRequest::SetMode(ApMode::Auto))
                    )),
                    "CRUISE_SPEED write not followed by AUTO"
                );
            }
        }
    }

    /// Drive a default machine into FollowingWaypoints with the fixture
    /// mission at the given sequence index.
    fn following_at(seq: usize) -> (NavSm, Instant) {
        let mut sm = NavSm::default();
        let t0 = Instant::now();

        step(&mut sm, t0, vec![NavEvent::WaypointsChanged(mission_at(0))]);
        step(&mut sm, t0, vec![NavEvent::ExecCmd(ExecCmd::Start)]);
        assert_eq!(sm.state(), NavState::Limbo);

        let t1 = t0 + Duration::from_millis(1100);
        step(&mut sm, t1, vec![]);
        assert_eq!(sm.state(), NavState::FollowingWaypoints);

        if seq > 1 {
            step(&mut sm, t1, vec![NavEvent::WaypointsChanged(mission_at(seq))]);
        }

        (sm, t1)
    }

    // ---- TESTS ----

    #[test]
    fn test_start_requires_two_waypoints() {
        let mut sm = NavSm::default();
        let t0 = Instant::now();

        // No mission at all
        let out = step(&mut sm, t0, vec![NavEvent::ExecCmd(ExecCmd::Start)]);
        assert!(out.commands.is_empty());
        assert_eq!(sm.state(), NavState::WaitingForStart);

        // A single waypoint is not enough either
        let short = WaypointList {
            waypoints: vec![waypoint(0.0, 0.0, 0.0)],
            current_seq: 0
        };
        let out = step(&mut sm, t0, vec![
            NavEvent::WaypointsChanged(short),
            NavEvent::ExecCmd(ExecCmd::Start)
        ]);
        assert!(out.commands.is_empty());
        assert_eq!(sm.state(), NavState::WaitingForStart);
    }

    #[test]
    fn test_start_arms_and_follows() {
        let mut sm = NavSm::default();
        let t0 = Instant::now();

        step(&mut sm, t0, vec![NavEvent::WaypointsChanged(mission_at(0))]);

        let out = step(&mut sm, t0, vec![NavEvent::ExecCmd(ExecCmd::Start)]);
        assert!(out.commands.iter().any(|c| matches!(
            c,
            ApCommand::Request(ApRequest::Arm(true))
        )));
        assert_eq!(sm.state(), NavState::Limbo);

        // The arming settle has not elapsed yet
        let out = step(&mut sm, t0 + Duration::from_millis(500), vec![]);
        assert!(out.commands.is_empty());
        assert_eq!(sm.state(), NavState::Limbo);

        // Once it has, the mission starts from waypoint 1 with the cruise
        // speed dance
        let out = step(&mut sm, t0 + Duration::from_millis(1100), vec![]);
        assert_eq!(sm.state(), NavState::FollowingWaypoints);
        assert!(out.commands.iter().any(|c| matches!(
            c,
            ApCommand::Request(ApRequest::SetCurrentWaypoint(1))
        )));
        assert_eq!(cruise_params_set(&out.commands), vec![2.0]);
        assert_cruise_dance(&out.commands);
        assert_eq!(modes_set(&out.commands).last(), Some(&ApMode::Auto));
    }

    #[test]
    fn test_full_mission_scenario() {
        let (mut sm, t) = following_at(0);

        // The autopilot reaches the cone waypoint
        let out = step(&mut sm, t, vec![NavEvent::WaypointsChanged(mission_at(2))]);
        // Same cruise factor as waypoint 1, so no second dance
        assert!(cruise_params_set(&out.commands).is_empty());

        // A strong sighting begins the approach in guided mode
        let out = step(&mut sm, t, vec![NavEvent::ConeSightings(frame(0.0, 500.0))]);
        assert_eq!(sm.state(), NavState::DrivingToCone);
        assert_eq!(modes_set(&out.commands), vec![ApMode::Guided]);
        assert!(out.commands.iter().any(|c| matches!(c, ApCommand::Velocity(_))));

        // Touching the (non-final) cone starts the reverse sequence
        let out = step(&mut sm, t, vec![NavEvent::Touch(true)]);
        assert_eq!(sm.state(), NavState::Limbo);
        assert_eq!(manual_speeds(&out.commands), vec![(-1.0, 0.0)]);
        assert!(modes_set(&out.commands).contains(&ApMode::Manual));

        // Reverse phase over: idle
        let t = t + Duration::from_millis(1600);
        let out = step(&mut sm, t, vec![]);
        assert_eq!(manual_speeds(&out.commands), vec![(0.0, 0.0)]);
        assert_eq!(sm.state(), NavState::Limbo);

        // Idle over: the simple backup begins
        let t = t + Duration::from_millis(1100);
        let out = step(&mut sm, t, vec![]);
        assert_eq!(manual_speeds(&out.commands), vec![(-0.7, 0.0)]);
        assert_eq!(sm.state(), NavState::Limbo);

        // Backup over: hold still
        let t = t + Duration::from_millis(1100);
        let out = step(&mut sm, t, vec![]);
        assert_eq!(manual_speeds(&out.commands), vec![(0.0, 0.0)]);

        // Hold over: resume the mission at the final cone waypoint
        let t = t + Duration::from_millis(2100);
        let out = step(&mut sm, t, vec![]);
        assert_eq!(sm.state(), NavState::FollowingWaypoints);
        assert!(out.commands.iter().any(|c| matches!(
            c,
            ApCommand::Request(ApRequest::SetCurrentWaypoint(3))
        )));

        // Sight and touch the final cone
        step(&mut sm, t, vec![NavEvent::ConeSightings(frame(0.0, 500.0))]);
        assert_eq!(sm.state(), NavState::DrivingToCone);

        let out = step(&mut sm, t, vec![NavEvent::Touch(true)]);
        assert_eq!(sm.state(), NavState::Finished);
        assert_eq!(manual_speeds(&out.commands), vec![(0.0, 0.0)]);
        assert_eq!(modes_set(&out.commands), vec![ApMode::Hold]);
    }

    #[test]
    fn test_guided_approach_setpoints() {
        let (mut sm, t) = following_at(2);

        // 64 px right of centre, 400 px^2: ~9.37 m away, 0.139 rad right.
        // Speed saturates at the waypoint's cruise factor.
        let out = step(&mut sm, t, vec![NavEvent::ConeSightings(frame(64.0, 400.0))]);

        let setpoint = out.commands.iter()
            .find_map(|c| match c {
                ApCommand::Velocity(v) => Some(*v),
                _ => None
            })
            .unwrap();

        assert!((setpoint.linear_x_ms - 2.0).abs() < 1e-6);

        // turning = min(0.5 * 0.139, 5.0), angular = turning * 5.0
        let turning = 0.5 * 64f64.atan2(320.0 / 35f64.to_radians().tan());
        assert!((setpoint.angular_z_rads - turning * 5.0).abs() < 1e-6);

        // A huge sighting is close: the latch caps speed to the waypoint's
        // 30% minimum
        let out = step(&mut sm, t, vec![NavEvent::ConeSightings(frame(0.0, 39000.0))]);
        let setpoint = out.commands.iter()
            .find_map(|c| match c {
                ApCommand::Velocity(v) => Some(*v),
                _ => None
            })
            .unwrap();
        assert!((setpoint.linear_x_ms - 0.6).abs() < 1e-6);

        // The latch holds even if the cone looks far again
        let out = step(&mut sm, t, vec![NavEvent::ConeSightings(frame(0.0, 400.0))]);
        let setpoint = out.commands.iter()
            .find_map(|c| match c {
                ApCommand::Velocity(v) => Some(*v),
                _ => None
            })
            .unwrap();
        assert!((setpoint.linear_x_ms - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_throttle_approach_commands() {
        let params = NavSmParams {
            cone_approach_use_throttle: true,
            ..Default::default()
        };
        let mut sm = NavSm::new(params);
        let t0 = Instant::now();

        step(&mut sm, t0, vec![NavEvent::WaypointsChanged(mission_at(0))]);
        step(&mut sm, t0, vec![NavEvent::ExecCmd(ExecCmd::Start)]);
        let t1 = t0 + Duration::from_millis(1100);
        step(&mut sm, t1, vec![]);
        step(&mut sm, t1, vec![NavEvent::WaypointsChanged(mission_at(2))]);

        let out = step(&mut sm, t1, vec![NavEvent::ConeSightings(frame(64.0, 400.0))]);
        assert_eq!(sm.state(), NavState::DrivingToCone);
        assert_eq!(modes_set(&out.commands), vec![ApMode::Manual]);

        let speeds = manual_speeds(&out.commands);
        assert_eq!(speeds.len(), 1);
        let (speed, turning) = speeds[0];
        assert!((speed - 1.0).abs() < 1e-6);
        assert!(turning > 0.0);
    }

    #[test]
    fn test_missed_cone_triggers_search() {
        let (mut sm, t) = following_at(2);

        step(&mut sm, t, vec![NavEvent::RobotPose(pose_with_yaw(0.5))]);

        // The autopilot advances past the cone without a touch
        let out = step(&mut sm, t, vec![NavEvent::WaypointsChanged(mission_at(3))]);
        assert_eq!(sm.state(), NavState::CirclingBack);
        assert!(modes_set(&out.commands).contains(&ApMode::Manual));

        // The sweep target is ahead of the heading, so the turn is positive
        let speeds = manual_speeds(&out.commands);
        assert_eq!(speeds.len(), 1);
        let (speed, turning) = speeds[0];
        assert!((speed - 0.15).abs() < 1e-6);
        assert!(turning > 0.0);
    }

    #[test]
    fn test_hold_at_cone_starts_search() {
        let (mut sm, t) = following_at(2);
        step(&mut sm, t, vec![NavEvent::RobotPose(pose_with_yaw(0.0))]);

        step(&mut sm, t, vec![NavEvent::ApState(ApMode::Hold)]);
        assert_eq!(sm.state(), NavState::CirclingBack);
    }

    #[test]
    fn test_hold_without_cone_ignored() {
        let (mut sm, t) = following_at(1);
        step(&mut sm, t, vec![NavEvent::RobotPose(pose_with_yaw(0.0))]);

        step(&mut sm, t, vec![NavEvent::ApState(ApMode::Hold)]);
        assert_eq!(sm.state(), NavState::FollowingWaypoints);
    }

    #[test]
    fn test_cone_lost_limit() {
        let (mut sm, t) = following_at(2);
        step(&mut sm, t, vec![NavEvent::RobotPose(pose_with_yaw(0.0))]);
        step(&mut sm, t, vec![NavEvent::ConeSightings(frame(0.0, 500.0))]);
        assert_eq!(sm.state(), NavState::DrivingToCone);

        // 15 cone-less frames are tolerated
        for _ in 0..15 {
            step(&mut sm, t, vec![NavEvent::ConeSightings(empty_frame())]);
            assert_eq!(sm.state(), NavState::DrivingToCone);
        }

        // The 16th exceeds the limit and starts a search
        step(&mut sm, t, vec![NavEvent::ConeSightings(empty_frame())]);
        assert_eq!(sm.state(), NavState::CirclingBack);
    }

    #[test]
    fn test_weak_sighting_resets_lost_count() {
        let (mut sm, t) = following_at(2);
        step(&mut sm, t, vec![NavEvent::RobotPose(pose_with_yaw(0.0))]);
        step(&mut sm, t, vec![NavEvent::ConeSightings(frame(0.0, 500.0))]);

        // While driving, the tracking threshold is the lower one: a sighting
        // exactly on it qualifies and resets the lost count
        for _ in 0..10 {
            step(&mut sm, t, vec![NavEvent::ConeSightings(empty_frame())]);
        }
        step(&mut sm, t, vec![NavEvent::ConeSightings(frame(0.0, 100.0))]);

        for _ in 0..15 {
            step(&mut sm, t, vec![NavEvent::ConeSightings(empty_frame())]);
            assert_eq!(sm.state(), NavState::DrivingToCone);
        }
    }

    #[test]
    fn test_search_recovers_cone() {
        let (mut sm, t) = following_at(2);
        step(&mut sm, t, vec![NavEvent::RobotPose(pose_with_yaw(0.0))]);
        step(&mut sm, t, vec![NavEvent::ApState(ApMode::Hold)]);
        assert_eq!(sm.state(), NavState::CirclingBack);

        // A weak sighting does not recover the cone while searching
        step(&mut sm, t, vec![NavEvent::ConeSightings(frame(0.0, 200.0))]);
        assert_eq!(sm.state(), NavState::CirclingBack);

        // A sighting at the recovery threshold does
        let out = step(&mut sm, t, vec![NavEvent::ConeSightings(frame(0.0, 400.0))]);
        assert_eq!(sm.state(), NavState::DrivingToCone);
        assert!(modes_set(&out.commands).contains(&ApMode::Guided));
    }

    #[test]
    fn test_search_sweeps_then_skips_cone() {
        let (mut sm, t) = following_at(2);
        step(&mut sm, t, vec![NavEvent::RobotPose(pose_with_yaw(0.0))]);
        step(&mut sm, t, vec![NavEvent::ApState(ApMode::Hold)]);
        assert_eq!(sm.state(), NavState::CirclingBack);

        // Still short of the back sweep target: keep turning
        step(&mut sm, t, vec![NavEvent::RobotPose(pose_with_yaw(1.0))]);
        step(&mut sm, t, vec![NavEvent::ConeSightings(empty_frame())]);
        assert_eq!(sm.state(), NavState::CirclingBack);

        // Reach the back sweep target (175 deg)
        let sweep = 175f64.to_radians();
        step(&mut sm, t, vec![NavEvent::RobotPose(pose_with_yaw(sweep))]);
        step(&mut sm, t, vec![NavEvent::ConeSightings(empty_frame())]);
        assert_eq!(sm.state(), NavState::CirclingForward);

        // Reach the forward sweep target (350 deg, wrapped)
        step(&mut sm, t, vec![
            NavEvent::RobotPose(pose_with_yaw(normalise_angle(2.0 * sweep)))
        ]);
        let out = step(&mut sm, t, vec![NavEvent::ConeSightings(empty_frame())]);

        // Waypoints remain, so the cone is skipped
        assert_eq!(sm.state(), NavState::FollowingWaypoints);
        assert!(out.commands.iter().any(|c| matches!(
            c,
            ApCommand::Request(ApRequest::SetCurrentWaypoint(3))
        )));
    }

    #[test]
    fn test_search_exhausted_fails() {
        let (mut sm, t) = following_at(3);
        step(&mut sm, t, vec![NavEvent::RobotPose(pose_with_yaw(0.0))]);
        step(&mut sm, t, vec![NavEvent::ApState(ApMode::Hold)]);
        assert_eq!(sm.state(), NavState::CirclingBack);

        let sweep = 175f64.to_radians();
        step(&mut sm, t, vec![NavEvent::RobotPose(pose_with_yaw(sweep))]);
        step(&mut sm, t, vec![NavEvent::ConeSightings(empty_frame())]);
        assert_eq!(sm.state(), NavState::CirclingForward);

        step(&mut sm, t, vec![
            NavEvent::RobotPose(pose_with_yaw(normalise_angle(2.0 * sweep)))
        ]);
        let out = step(&mut sm, t, vec![NavEvent::ConeSightings(empty_frame())]);

        // The cone was the last waypoint: the mission has failed
        assert_eq!(sm.state(), NavState::Failed);
        assert!(manual_speeds(&out.commands).contains(&(0.0, 0.0)));
        assert!(modes_set(&out.commands).contains(&ApMode::Hold));
    }

    #[test]
    fn test_cone_timeout_starts_search() {
        let (mut sm, t) = following_at(2);
        step(&mut sm, t, vec![NavEvent::RobotPose(pose_with_yaw(0.0))]);
        step(&mut sm, t, vec![NavEvent::ConeSightings(frame(0.0, 500.0))]);
        assert_eq!(sm.state(), NavState::DrivingToCone);

        // The cone is never reached within the timeout
        let late = t + Duration::from_secs(61);
        step(&mut sm, late, vec![]);
        assert_eq!(sm.state(), NavState::CirclingBack);
    }

    #[test]
    fn test_reset_stops_from_any_state() {
        let (mut sm, t) = following_at(2);
        step(&mut sm, t, vec![NavEvent::RobotPose(pose_with_yaw(0.0))]);
        step(&mut sm, t, vec![NavEvent::ConeSightings(frame(0.0, 500.0))]);
        assert_eq!(sm.state(), NavState::DrivingToCone);

        let out = step(&mut sm, t, vec![NavEvent::ExecCmd(ExecCmd::Reset)]);
        assert_eq!(sm.state(), NavState::WaitingForStart);
        assert!(manual_speeds(&out.commands).contains(&(0.0, 0.0)));

        // The machine can be restarted afterwards
        let out = step(&mut sm, t, vec![NavEvent::ExecCmd(ExecCmd::Start)]);
        assert!(out.commands.iter().any(|c| matches!(
            c,
            ApCommand::Request(ApRequest::Arm(true))
        )));
    }

    #[test]
    fn test_limbo_discards_events() {
        let (mut sm, t) = following_at(2);
        step(&mut sm, t, vec![NavEvent::ConeSightings(frame(0.0, 500.0))]);
        step(&mut sm, t, vec![NavEvent::Touch(true)]);
        assert_eq!(sm.state(), NavState::Limbo);

        // The rover is in a mechanical transient: nothing may react
        let out = step(&mut sm, t + Duration::from_millis(100), vec![
            NavEvent::ConeSightings(frame(0.0, 5000.0)),
            NavEvent::Touch(true),
            NavEvent::ExecCmd(ExecCmd::Reset),
            NavEvent::ApState(ApMode::Hold)
        ]);
        assert!(out.commands.is_empty());
        assert_eq!(sm.state(), NavState::Limbo);
    }

    #[test]
    fn test_aligned_backup_escape() {
        let params = NavSmParams {
            escape_strategy: EscapeStrategy::AlignedBackup,
            ..Default::default()
        };
        let mut sm = NavSm::new(params);
        let t0 = Instant::now();

        step(&mut sm, t0, vec![NavEvent::WaypointsChanged(mission_at(0))]);
        step(&mut sm, t0, vec![NavEvent::ExecCmd(ExecCmd::Start)]);
        let t = t0 + Duration::from_millis(1100);
        step(&mut sm, t, vec![]);

        // Map-frame waypoints: the bearing from the cone (wp2) to wp3 is
        // 45 degrees
        let map = WaypointList {
            waypoints: vec![
                waypoint(0.0, 0.0, 0.0),
                waypoint(10.0, 0.0, 0.0),
                waypoint(20.0, 0.0, 1030.0),
                waypoint(30.0, 10.0, 2000.0),
            ],
            current_seq: 0
        };
        step(&mut sm, t, vec![NavEvent::MapWaypoints(map)]);

        step(&mut sm, t, vec![NavEvent::WaypointsChanged(mission_at(2))]);
        step(&mut sm, t, vec![NavEvent::ConeSightings(frame(0.0, 500.0))]);
        step(&mut sm, t, vec![NavEvent::Touch(true)]);
        assert_eq!(sm.state(), NavState::Limbo);

        // Run out the reverse and idle phases
        let t = t + Duration::from_millis(1600);
        step(&mut sm, t, vec![]);
        let t = t + Duration::from_millis(1100);
        step(&mut sm, t, vec![]);
        assert_eq!(sm.state(), NavState::EscapingCone);

        // Misaligned: reverse with turning toward the target bearing
        let out = step(&mut sm, t, vec![NavEvent::RobotPose(pose_with_yaw(std::f64::consts::PI))]);
        let speeds = manual_speeds(&out.commands);
        assert_eq!(speeds.len(), 1);
        let (speed, turning) = speeds[0];
        assert!(speed < 0.0);
        assert!(turning < 0.0);

        // Aligned with the bearing to the next waypoint: stop and settle
        let out = step(&mut sm, t, vec![
            NavEvent::RobotPose(pose_with_yaw(45f64.to_radians()))
        ]);
        assert!(manual_speeds(&out.commands).contains(&(0.0, 0.0)));
        assert_eq!(sm.state(), NavState::Limbo);

        // After the settle the mission resumes at waypoint 3
        let t = t + Duration::from_millis(1100);
        let out = step(&mut sm, t, vec![]);
        assert_eq!(sm.state(), NavState::FollowingWaypoints);
        assert!(out.commands.iter().any(|c| matches!(
            c,
            ApCommand::Request(ApRequest::SetCurrentWaypoint(3))
        )));
    }

    #[test]
    fn test_cruise_speed_dance_on_change() {
        // Mission whose cone waypoint runs at 30% cruise
        let mut slow_mission = mission();
        slow_mission.waypoints[2].z_alt = 1330.0;

        let mut sm = NavSm::default();
        let t0 = Instant::now();

        let at = |seq: usize| {
            let mut m = slow_mission.clone();
            m.current_seq = seq;
            m
        };

        step(&mut sm, t0, vec![NavEvent::WaypointsChanged(at(0))]);
        step(&mut sm, t0, vec![NavEvent::ExecCmd(ExecCmd::Start)]);
        let t = t0 + Duration::from_millis(1100);
        let out = step(&mut sm, t, vec![]);
        assert_eq!(cruise_params_set(&out.commands), vec![2.0]);

        // Moving to the slow cone waypoint rewrites the cruise speed,
        // bracketed by the hold dance
        let out = step(&mut sm, t, vec![NavEvent::WaypointsChanged(at(2))]);
        let cruises = cruise_params_set(&out.commands);
        assert_eq!(cruises.len(), 1);
        assert!((cruises[0] - 0.6).abs() < 1e-9);
        assert_cruise_dance(&out.commands);

        // Republishing the same list does not repeat the dance
        let out = step(&mut sm, t, vec![NavEvent::WaypointsChanged(at(2))]);
        assert!(cruise_params_set(&out.commands).is_empty());
    }

    #[test]
    fn test_adjust_waypoints() {
        let mut sm = NavSm::default();
        let t0 = Instant::now();

        // Without map waypoints the request is ignored outright
        let out = step(&mut sm, t0, vec![NavEvent::ExecCmd(ExecCmd::AdjustWaypoints)]);
        assert!(out.adjusted_waypoints.is_none());
        assert!(out.commands.is_empty());

        let map = WaypointList {
            waypoints: vec![
                waypoint(5.0, 5.0, 0.0),
                waypoint(15.0, 5.0, 1030.0),
            ],
            current_seq: 0
        };
        step(&mut sm, t0, vec![NavEvent::MapWaypoints(map)]);

        let out = step(&mut sm, t0, vec![NavEvent::ExecCmd(ExecCmd::AdjustWaypoints)]);
        let adjusted = out.adjusted_waypoints.unwrap();
        assert_eq!(adjusted.waypoints[0].x_lat, 0.0);
        assert_eq!(adjusted.waypoints[0].y_long, 0.0);
        assert_eq!(adjusted.waypoints[1].x_lat, 10.0);
        assert_eq!(adjusted.waypoints[1].y_long, 0.0);
        assert_eq!(adjusted.waypoints[1].z_alt, 1030.0);

        // The rewritten mission is also uploaded to the autopilot
        let pushed = out.commands.iter()
            .find_map(|c| match c {
                ApCommand::Request(ApRequest::PushWaypoints(wps)) => Some(wps.clone()),
                _ => None
            })
            .unwrap();
        assert_eq!(pushed.len(), 2);
        assert_eq!(pushed[0].x_lat, 0.0);
        assert_eq!(pushed[1].x_lat, 10.0);
    }

    #[test]
    fn test_touch_ignored_outside_approach() {
        let (mut sm, t) = following_at(2);

        let out = step(&mut sm, t, vec![NavEvent::Touch(true)]);
        assert!(out.commands.is_empty());
        assert_eq!(sm.state(), NavState::FollowingWaypoints);

        // A release event is never acted on
        step(&mut sm, t, vec![NavEvent::ConeSightings(frame(0.0, 500.0))]);
        let out = step(&mut sm, t, vec![NavEvent::Touch(false)]);
        assert!(out.commands.is_empty());
        assert_eq!(sm.state(), NavState::DrivingToCone);
    }

    #[test]
    fn test_gcs_id_written_at_start() {
        let params = NavSmParams {
            gcs_id: Some(255),
            ..Default::default()
        };
        let mut sm = NavSm::new(params);
        let t0 = Instant::now();

        step(&mut sm, t0, vec![NavEvent::WaypointsChanged(mission_at(0))]);
        let out = step(&mut sm, t0, vec![NavEvent::ExecCmd(ExecCmd::Start)]);

        assert!(out.commands.iter().any(|c| matches!(
            c,
            ApCommand::Request(ApRequest::SetParam {
                name,
                value: ParamValue::Int(255)
            }) if name == "SYSID_MYGCS"
        )));
    }
}
