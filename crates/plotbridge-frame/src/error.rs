/// Errors that can occur while moving envelopes over a stream.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The envelope does not start with the expected magic number.
    #[error("invalid envelope magic (expected 0x5042 \"PB\")")]
    InvalidMagic,

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing envelopes.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer closed the connection. Also raised mid-envelope.
    #[error("connection closed")]
    ConnectionClosed,
}

impl From<plotbridge_transport::TransportError> for FrameError {
    fn from(err: plotbridge_transport::TransportError) -> Self {
        use plotbridge_transport::TransportError;
        match err {
            TransportError::Io(io) | TransportError::Accept(io) => FrameError::Io(io),
            TransportError::Bind { source, .. } | TransportError::Connect { source, .. } => {
                FrameError::Io(source)
            }
            other => FrameError::Io(std::io::Error::other(other.to_string())),
        }
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
