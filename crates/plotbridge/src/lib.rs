//! Remote plotting bridge.
//!
//! A producer streams typed numeric buffers and a textual command over a
//! local socket; the consumer reassembles them, runs the command through an
//! evaluator and streams requested values back.
//!
//! # Crate Structure
//!
//! - [`transport`]: Unix domain socket listener and streams
//! - [`frame`]: Length-prefixed envelopes, one per protocol frame
//! - [`protocol`]: Frame classification, data headers, typed buffers
//! - [`bridge`]: Command cycles, dispatch, lifecycle, the producer client

/// Re-export transport types.
pub mod transport {
    pub use plotbridge_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use plotbridge_frame::*;
}

/// Re-export protocol types.
pub mod protocol {
    pub use plotbridge_protocol::*;
}

/// Re-export bridge types.
pub mod bridge {
    pub use plotbridge_bridge::*;
}
