//! Message boundaries for the plotbridge byte stream.
//!
//! A socket delivers bytes; the bridge protocol wants discrete frames
//! ("one receive = one frame"). Every frame travels inside an envelope:
//! - A 2-byte magic number ("PB") for stream synchronization
//! - A 4-byte little-endian payload length
//!
//! The payload itself is opaque at this layer. Classification into data
//! headers, command text and control literals happens in `plotbridge-protocol`.

pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

pub use codec::{
    decode_envelope, encode_envelope, Frame, FrameConfig, DEFAULT_MAX_PAYLOAD, HEADER_SIZE,
};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;
