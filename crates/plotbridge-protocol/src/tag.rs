use crate::error::{ProtocolError, Result};
use crate::header::{Header, Mode, ProtocolRevision, FIELD_MODE};

/// Control literal that closes a command cycle.
pub const FINALIZE: &[u8] = b"finalize";
/// Control literal that stops the consumer.
pub const EXIT: &[u8] = b"exit";

const DATA_PREFIX: &[u8] = b"data";

/// Classification of one frame.
///
/// Borrowed from the frame; nothing is copied until a header is parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tag<'a> {
    /// A data header, split on `|` into its raw fields.
    DataHeader(Vec<&'a str>),
    Finalize,
    Exit,
    CommandText(&'a str),
}

impl Tag<'_> {
    /// Parse the raw fields of a `DataHeader` tag.
    pub fn header(&self, revision: ProtocolRevision) -> Option<Result<Header>> {
        match self {
            Tag::DataHeader(fields) => Some(Header::from_fields(fields, revision)),
            _ => None,
        }
    }

    /// Whether the producer sends a payload frame after this header.
    ///
    /// Read from the raw mode field, so it answers for headers that fail to
    /// parse as well. Only `send_back` declarations come without a payload.
    pub fn payload_follows(&self) -> bool {
        match self {
            Tag::DataHeader(fields) => !fields
                .get(FIELD_MODE)
                .is_some_and(|mode| matches!(Mode::parse(mode), Ok(Mode::BindAndReturn))),
            _ => false,
        }
    }
}

/// Whether `frame` carries the data header prefix, decodable or not.
pub fn is_header_frame(frame: &[u8]) -> bool {
    frame.starts_with(DATA_PREFIX)
}

/// Tag a frame by its leading bytes.
///
/// Priority: a `data` prefix wins, then a `finalize` prefix, then the exact
/// `exit` literal; anything else is command text. Data headers and command
/// text must be UTF-8.
pub fn classify(frame: &[u8]) -> Result<Tag<'_>> {
    if is_header_frame(frame) {
        let text = std::str::from_utf8(frame).map_err(|source| ProtocolError::InvalidUtf8 {
            context: "data header",
            source,
        })?;
        return Ok(Tag::DataHeader(text.split('|').collect()));
    }
    if frame.starts_with(FINALIZE) {
        return Ok(Tag::Finalize);
    }
    if frame == EXIT {
        return Ok(Tag::Exit);
    }
    let text = std::str::from_utf8(frame).map_err(|source| ProtocolError::InvalidUtf8 {
        context: "command text",
        source,
    })?;
    Ok(Tag::CommandText(text))
}
