//! # TM Server
//!
//! Publishes the navigator's telemetry: the current state name on every
//! cycle, and the adjusted waypoint list when one is produced.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{
    msg::mission::WaypointList,
    net::{zmq, MonitoredSocket, MonitoredSocketError, SocketOptions}
};

use crate::params::NavExecParams;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Telemetry server
pub struct TmServer {
    state_socket: MonitoredSocket,

    adjusted_waypoints_socket: MonitoredSocket
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum TmServerError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("Could not send telemetry: {0}")]
    SendError(zmq::Error),

    #[error("Could not serialise the telemetry: {0}")]
    SerializationError(serde_json::Error)
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl TmServer {
    /// Create a new instance of the TM server.
    ///
    /// This function will not block waiting for subscribers.
    pub fn new(
        ctx: &zmq::Context,
        params: &NavExecParams
    ) -> Result<Self, TmServerError> {
        let socket_options = || SocketOptions {
            block_on_first_connect: false,
            bind: true,
            linger: 1,
            send_timeout: 10,
            ..Default::default()
        };

        let state_socket = MonitoredSocket::new(
            ctx,
            zmq::PUB,
            socket_options(),
            &params.nav_state_endpoint
        ).map_err(TmServerError::SocketError)?;
        let adjusted_waypoints_socket = MonitoredSocket::new(
            ctx,
            zmq::PUB,
            socket_options(),
            &params.adjusted_waypoints_endpoint
        ).map_err(TmServerError::SocketError)?;

        Ok(Self {
            state_socket,
            adjusted_waypoints_socket
        })
    }

    /// Publish the navigator's state name.
    pub fn send_state(&mut self, state: &str) -> Result<(), TmServerError> {
        self.state_socket.send(state, 0)
            .map_err(TmServerError::SendError)
    }

    /// Publish an adjusted waypoint list.
    pub fn send_adjusted_waypoints(
        &mut self,
        list: &WaypointList
    ) -> Result<(), TmServerError> {
        let list_str = serde_json::to_string(list)
            .map_err(TmServerError::SerializationError)?;

        self.adjusted_waypoints_socket.send(&list_str, 0)
            .map_err(TmServerError::SendError)
    }
}
