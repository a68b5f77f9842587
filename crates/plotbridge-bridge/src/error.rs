use std::time::Duration;

/// Errors that can occur while running or talking to a bridge.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] plotbridge_transport::TransportError),

    /// Envelope-level error.
    #[error("frame error: {0}")]
    Frame(#[from] plotbridge_frame::FrameError),

    /// A frame could not be decoded.
    #[error("malformed frame: {0}")]
    Protocol(#[from] plotbridge_protocol::ProtocolError),

    /// The other side went away.
    #[error("peer disconnected: {0}")]
    Disconnected(String),

    /// No frame arrived in time.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// A producer call could not be expressed on the wire.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
