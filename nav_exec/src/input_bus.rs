//! # Input Bus
//!
//! Drains the navigator's input topics into state machine events. Each topic
//! rides its own SUB socket; within a topic messages are delivered in
//! arrival order, no ordering is guaranteed across topics.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, warn};
use serde::de::DeserializeOwned;

use comms_if::{
    ap::{ApMode, ApStateMsg},
    exec::ExecCmd,
    msg::cone::ConeSightings,
    msg::mission::WaypointList,
    msg::pose::PoseMsg,
    net::{zmq, MonitoredSocket, MonitoredSocketError, SocketOptions}
};

use crate::loc::Pose;
use crate::nav_sm::NavEvent;
use crate::params::NavExecParams;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct InputBus {
    exec_cmd_socket: MonitoredSocket,

    ap_state_socket: MonitoredSocket,

    waypoints_socket: MonitoredSocket,

    map_waypoints_socket: MonitoredSocket,

    pose_socket: MonitoredSocket,

    cones_socket: MonitoredSocket,

    touch_socket: MonitoredSocket
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum InputBusError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError)
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl InputBus {
    /// Create a new instance of the input bus, connecting all topic
    /// subscriptions.
    pub fn new(
        ctx: &zmq::Context,
        params: &NavExecParams
    ) -> Result<Self, InputBusError> {

        let subscribe = |endpoint: &str| -> Result<MonitoredSocket, InputBusError> {
            let socket_options = SocketOptions {
                block_on_first_connect: false,
                subscribe: Some(String::new()),
                linger: 1,
                ..Default::default()
            };

            MonitoredSocket::new(ctx, zmq::SUB, socket_options, endpoint)
                .map_err(InputBusError::SocketError)
        };

        Ok(Self {
            exec_cmd_socket: subscribe(&params.exec_cmd_endpoint)?,
            ap_state_socket: subscribe(&params.ap_state_endpoint)?,
            waypoints_socket: subscribe(&params.waypoints_endpoint)?,
            map_waypoints_socket: subscribe(&params.map_waypoints_endpoint)?,
            pose_socket: subscribe(&params.pose_endpoint)?,
            cones_socket: subscribe(&params.cones_endpoint)?,
            touch_socket: subscribe(&params.touch_endpoint)?
        })
    }

    /// Drain all pending input messages into events.
    ///
    /// Events from one topic preserve their arrival order; topics are
    /// drained in a fixed order each cycle.
    pub fn poll(&mut self) -> Vec<NavEvent> {
        let mut events = Vec::new();

        for raw in drain(&self.exec_cmd_socket) {
            match ExecCmd::from_wire(&raw) {
                Ok(cmd) => events.push(NavEvent::ExecCmd(cmd)),
                Err(e) => warn!("Dropping exec command: {}", e)
            }
        }

        for msg in drain_json::<ApStateMsg>(&self.ap_state_socket, "autopilot state") {
            match ApMode::from_wire(&msg.mode) {
                Some(mode) => events.push(NavEvent::ApState(mode)),
                // The autopilot has modes the navigator doesn't react to
                None => debug!("Ignoring autopilot mode {}", msg.mode)
            }
        }

        for list in drain_json::<WaypointList>(&self.waypoints_socket, "waypoints") {
            events.push(NavEvent::WaypointsChanged(list));
        }

        for list in drain_json::<WaypointList>(&self.map_waypoints_socket, "map waypoints") {
            events.push(NavEvent::MapWaypoints(list));
        }

        for msg in drain_json::<PoseMsg>(&self.pose_socket, "pose") {
            events.push(NavEvent::RobotPose(Pose::from_msg(&msg)));
        }

        for sightings in drain_json::<ConeSightings>(&self.cones_socket, "cone sightings") {
            events.push(NavEvent::ConeSightings(sightings));
        }

        for touched in drain_json::<bool>(&self.touch_socket, "touch") {
            events.push(NavEvent::Touch(touched));
        }

        events
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Drain all pending messages from a socket as strings.
fn drain(socket: &MonitoredSocket) -> Vec<String> {
    let mut messages = Vec::new();

    loop {
        match socket.recv_string(zmq::DONTWAIT) {
            Ok(Ok(s)) => messages.push(s),
            Ok(Err(_)) => warn!("Dropping a non-UTF8 message"),
            Err(zmq::Error::EAGAIN) => break,
            Err(e) => {
                warn!("Error receiving from a topic: {}", e);
                break;
            }
        }
    }

    messages
}

/// Drain all pending messages from a socket, deserialising each from JSON.
fn drain_json<M: DeserializeOwned>(
    socket: &MonitoredSocket,
    topic: &str
) -> Vec<M> {
    drain(socket).iter()
        .filter_map(|raw| match serde_json::from_str(raw) {
            Ok(msg) => Some(msg),
            Err(e) => {
                warn!("Dropping an invalid {} message: {}", topic, e);
                None
            }
        })
        .collect()
}
