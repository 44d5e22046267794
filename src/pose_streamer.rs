//! Pose datagrams for head-tracking receivers listening on UDP.
//!
//! Each datagram carries six little-endian `f64` values: lateral, vertical
//! and depth translation in centimeters, then yaw, pitch and roll in
//! degrees. Sending is fire-and-forget.

use crate::constants::POSE_DATAGRAM_LEN;
use crate::face_data::FaceFrameState;
use crate::{Error, Result};
use log::{debug, info};
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};

const FIELD_LEN: usize = 8;

/// Wire order of the six pose fields
#[must_use]
pub fn pose_fields(state: &FaceFrameState) -> [f64; 6] {
    [
        state.translation[1],
        state.translation[0],
        state.translation[2],
        state.rotation[1],
        state.rotation[0],
        state.rotation[2],
    ]
}

/// Serialize the pose in `state` into a datagram
#[must_use]
pub fn encode_pose(state: &FaceFrameState) -> [u8; POSE_DATAGRAM_LEN] {
    let mut datagram = [0u8; POSE_DATAGRAM_LEN];
    for (chunk, value) in datagram.chunks_exact_mut(FIELD_LEN).zip(pose_fields(state)) {
        chunk.copy_from_slice(&value.to_le_bytes());
    }
    datagram
}

/// Read the six wire fields back out of a datagram
///
/// # Errors
///
/// Returns an error if the datagram is not exactly 48 bytes
pub fn decode_pose(datagram: &[u8]) -> Result<[f64; 6]> {
    if datagram.len() != POSE_DATAGRAM_LEN {
        return Err(Error::InvalidInput(format!(
            "Pose datagram must be {POSE_DATAGRAM_LEN} bytes, got {}",
            datagram.len()
        )));
    }

    let mut fields = [0.0; 6];
    for (field, chunk) in fields.iter_mut().zip(datagram.chunks_exact(FIELD_LEN)) {
        let mut bytes = [0u8; FIELD_LEN];
        bytes.copy_from_slice(chunk);
        *field = f64::from_le_bytes(bytes);
    }
    Ok(fields)
}

/// UDP sender bound to an ephemeral local port
#[derive(Debug)]
pub struct PoseStreamer {
    socket: UdpSocket,
    target: SocketAddr,
}

impl PoseStreamer {
    /// Resolve `host:port` and bind a local socket
    ///
    /// # Errors
    ///
    /// Returns an error if the host does not resolve or the socket cannot be bound
    pub fn new(host: &str, port: u16) -> Result<Self> {
        let target = (host, port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| Error::ConfigError(format!("Could not resolve UDP target {host}:{port}")))?;

        let bind_addr: SocketAddr = if target.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        };
        let socket = UdpSocket::bind(bind_addr)?;

        info!("Streaming pose to {}", target);
        Ok(Self { socket, target })
    }

    #[must_use]
    pub fn target(&self) -> SocketAddr {
        self.target
    }

    /// Send the current pose as one datagram
    ///
    /// # Errors
    ///
    /// Returns an error if the send fails
    pub fn send(&self, state: &FaceFrameState) -> Result<()> {
        let datagram = encode_pose(state);
        let sent = self.socket.send_to(&datagram, self.target)?;
        if sent != POSE_DATAGRAM_LEN {
            debug!("Short pose datagram: {} of {} bytes", sent, POSE_DATAGRAM_LEN);
        }
        Ok(())
    }
}
