use std::time::Duration;

use plotbridge_frame::{FrameConfig, DEFAULT_MAX_PAYLOAD};
use plotbridge_protocol::ProtocolRevision;

/// Default receive poll interval. Bounds how long a stop request can go
/// unnoticed by either loop.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Runtime settings for the consumer side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// How often the receive loop and the processing loop wake up to check
    /// for shutdown.
    pub poll_interval: Duration,
    /// Header layout spoken by producers.
    pub revision: ProtocolRevision,
    /// Largest frame accepted from a producer.
    pub max_payload_size: usize,
    /// Write timeout on the return channel. `None` blocks.
    pub return_timeout: Option<Duration>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            revision: ProtocolRevision::default(),
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            return_timeout: Some(Duration::from_secs(5)),
        }
    }
}

impl BridgeConfig {
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_revision(mut self, revision: ProtocolRevision) -> Self {
        self.revision = revision;
        self
    }

    pub fn with_max_payload_size(mut self, max_payload_size: usize) -> Self {
        self.max_payload_size = max_payload_size;
        self
    }

    /// Envelope settings for a producer connection. The read timeout is the
    /// poll interval so a blocked receive returns control in time.
    pub fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            max_payload_size: self.max_payload_size,
            read_timeout: Some(self.poll_interval),
            write_timeout: self.return_timeout,
        }
    }
}
