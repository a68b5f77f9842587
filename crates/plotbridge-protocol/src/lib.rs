//! The plotbridge wire vocabulary.
//!
//! A producer streams four kinds of frames: data headers
//! (`data|<symbol>|<type>|<count>|<shape>|<mode>`), raw payloads that follow
//! a header, the `finalize` and `exit` control literals, and free-form command
//! text. This crate turns those frames into typed values:
//!
//! - [`classify`] tags a frame without interpreting payload bytes
//! - [`Header`] parses the fields of a data header
//! - [`reconstruct`] rebuilds a [`Buffer`] from a header and its payload
//!
//! All numeric payloads use the host's native byte order; producer and
//! consumer are expected to run on the same machine.

pub mod buffer;
pub mod element;
pub mod error;
pub mod header;
pub mod tag;

pub use buffer::{reconstruct, Array, ArrayData, Buffer, Scalar};
pub use element::{to_ne_bytes, Element, ElementType};
pub use error::{ProtocolError, Result};
pub use header::{parse_shape, Header, Mode, ProtocolRevision};
pub use tag::{classify, is_header_frame, Tag, EXIT, FINALIZE};
