use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionType {
    Server,
    Client,
}

impl fmt::Display for SessionType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Server => write!(f, "server"),
            Self::Client => write!(f, "client"),
        }
    }
}

/// Server-side session phases, entered in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerSessionState {
    Handshake,
    ReadMessages,
    Play,
    Publish,
}

/// What an outbound (client) session does once connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientSessionType {
    /// Pull a remote stream and publish it into the local hub.
    Pull,
    /// Subscribe to a local stream and push it to a remote peer.
    Push,
}

/// Outgoing chunk size announced after connect.
pub const OUT_CHUNK_SIZE: u32 = 4096;
/// Acknowledgement window announced after connect.
pub const OUT_WINDOW_ACK_SIZE: u32 = 2_500_000;
/// Peer bandwidth announced after connect.
pub const OUT_PEER_BANDWIDTH: u32 = 2_500_000;
/// Message stream id handed out by createStream.
pub const STREAM_ID: u32 = 1;
