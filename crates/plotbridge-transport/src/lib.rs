//! Local socket transport for plotbridge.
//!
//! The producer and the plotting consumer talk over a Unix domain socket.
//! This crate only moves bytes: it knows nothing about envelopes, headers or
//! command cycles. Everything else builds on the [`SocketStream`] returned by
//! [`BridgeSocket`].

pub mod error;

#[cfg(unix)]
pub mod stream;
#[cfg(unix)]
pub mod uds;

pub use error::{Result, TransportError};

#[cfg(unix)]
pub use stream::SocketStream;
#[cfg(unix)]
pub use uds::BridgeSocket;
