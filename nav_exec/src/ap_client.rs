//! # Autopilot Client
//!
//! This module provides the bridge between the navigator and the external
//! autopilot. Acknowledged requests (mode, arming, parameters, mission
//! manipulation) ride a REQ/REP socket pair; servo overrides and velocity
//! setpoints are published fire-and-forget.
//!
//! The client is the sole writer of commands to the autopilot.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::thread;
use std::time::Duration;

use log::debug;
use serde::Deserialize;

use comms_if::{
    ap::{ApCommand, ApRequest, ApResponse, VelocitySetpoint},
    net::{zmq, MonitoredSocket, MonitoredSocketError, SocketOptions}
};

use crate::params::NavExecParams;
use crate::servo_map::{self, ServoCalibration};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct ApClient {
    params: ApClientParams,

    request_socket: MonitoredSocket,

    rc_override_socket: MonitoredSocket,

    velocity_socket: MonitoredSocket
}

/// Parameters for the autopilot client.
#[derive(Debug, Clone, Deserialize)]
pub struct ApClientParams {
    /// Time to wait after arming, current-waypoint, and parameter requests
    /// before the next request, milliseconds.
    ///
    /// The autopilot reports busy errors when these requests are followed
    /// too quickly by another, so the client settles here rather than
    /// pushing the retry burden onto every caller.
    pub settle_delay_ms: u64,

    /// PWM calibration for the servo override channels.
    pub servo: ServoCalibration
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum ApClientError {

    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("The client is not connected to the autopilot bridge")]
    NotConnected,

    #[error("Could not send the request: {0}")]
    SendError(zmq::Error),

    #[error("Could not receive a response: {0}")]
    RecvError(zmq::Error),

    #[error("Could not serialise the request: {0}")]
    SerializationError(serde_json::Error),

    #[error("Could not deserialise the response: {0}")]
    DeserializeError(serde_json::Error),

    #[error("The autopilot rejected the request: {0}")]
    Rejected(String)
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ApClient {
    /// Create a new instance of the autopilot client.
    pub fn new(
        ctx: &zmq::Context,
        exec_params: &NavExecParams,
        params: ApClientParams
    ) -> Result<Self, ApClientError> {

        // Create the socket options
        let request_socket_options = SocketOptions {
            connect_timeout: 1000,
            linger: 1,
            recv_timeout: 1000,
            send_timeout: 10,
            req_correlate: true,
            req_relaxed: true,
            ..Default::default()
        };
        let publish_socket_options = || SocketOptions {
            bind: true,
            block_on_first_connect: false,
            linger: 1,
            send_timeout: 10,
            ..Default::default()
        };

        // Create the sockets
        let request_socket = MonitoredSocket::new(
            ctx,
            zmq::REQ,
            request_socket_options,
            &exec_params.ap_request_endpoint
        ).map_err(ApClientError::SocketError)?;
        let rc_override_socket = MonitoredSocket::new(
            ctx,
            zmq::PUB,
            publish_socket_options(),
            &exec_params.rc_override_endpoint
        ).map_err(ApClientError::SocketError)?;
        let velocity_socket = MonitoredSocket::new(
            ctx,
            zmq::PUB,
            publish_socket_options(),
            &exec_params.velocity_endpoint
        ).map_err(ApClientError::SocketError)?;

        Ok(Self {
            params,
            request_socket,
            rc_override_socket,
            velocity_socket
        })
    }

    /// Execute a command from the state machine.
    pub fn exec(&mut self, cmd: &ApCommand) -> Result<(), ApClientError> {
        match cmd {
            ApCommand::Request(req) => {
                match self.request(req)? {
                    ApResponse::Accepted => {
                        self.settle(req);
                        Ok(())
                    },
                    ApResponse::Rejected(reason) =>
                        Err(ApClientError::Rejected(reason))
                }
            },
            ApCommand::ManualSpeed { speed, turning } => {
                let rc = servo_map::manual_speed_to_rc(
                    *speed, *turning, &self.params.servo
                );
                debug!("Servo override: {:?}", rc.channels);
                self.publish(&self.rc_override_socket, &rc)
            },
            ApCommand::Velocity(setpoint) => {
                self.publish(&self.velocity_socket, setpoint)
            }
        }
    }

    /// Publish a velocity setpoint directly.
    pub fn publish_velocity(
        &mut self,
        setpoint: &VelocitySetpoint
    ) -> Result<(), ApClientError> {
        self.publish(&self.velocity_socket, setpoint)
    }

    /// Send a request to the bridge and await its response.
    fn request(&mut self, req: &ApRequest) -> Result<ApResponse, ApClientError> {
        // If not connected return now
        if !self.request_socket.connected() {
            return Err(ApClientError::NotConnected)
        }

        let req_str = serde_json::to_string(req)
            .map_err(ApClientError::SerializationError)?;

        self.request_socket.send(&req_str, 0)
            .map_err(ApClientError::SendError)?;

        let msg = self.request_socket.recv_msg(0)
            .map_err(ApClientError::RecvError)?;

        serde_json::from_str(msg.as_str().unwrap_or(""))
            .map_err(ApClientError::DeserializeError)
    }

    /// Hold after requests the autopilot needs time to absorb.
    fn settle(&self, req: &ApRequest) {
        match req {
            ApRequest::Arm(_)
            | ApRequest::SetCurrentWaypoint(_)
            | ApRequest::SetParam { .. } => {
                thread::sleep(Duration::from_millis(self.params.settle_delay_ms));
            },
            _ => ()
        }
    }

    fn publish<M: serde::Serialize>(
        &self,
        socket: &MonitoredSocket,
        msg: &M
    ) -> Result<(), ApClientError> {
        let msg_str = serde_json::to_string(msg)
            .map_err(ApClientError::SerializationError)?;

        socket.send(&msg_str, 0)
            .map_err(ApClientError::SendError)
    }
}
