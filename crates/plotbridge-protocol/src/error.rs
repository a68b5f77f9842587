/// Errors raised while decoding frames into headers and buffers.
///
/// All of these are "malformed frame" errors: they poison the current command
/// cycle but never the connection.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// A frame that must be text is not valid UTF-8.
    #[error("{context} is not valid UTF-8: {source}")]
    InvalidUtf8 {
        context: &'static str,
        source: std::str::Utf8Error,
    },

    /// The data header does not have the number of `|`-separated fields the
    /// protocol revision requires.
    #[error("data header has {found} fields, expected {expected}")]
    FieldCount { expected: &'static str, found: usize },

    /// The first header field is not the `data` literal.
    #[error("data header starts with '{0}', expected 'data'")]
    NotAHeader(String),

    /// The symbol field is empty.
    #[error("data header has an empty symbol name")]
    EmptySymbol,

    /// The type field is not a known single-character element code.
    #[error("unknown element type code '{0}'")]
    UnknownTypeCode(String),

    /// The element count is not a non-negative integer.
    #[error("invalid element count '{0}'")]
    InvalidCount(String),

    /// A shape dimension does not fit in `usize`.
    #[error("invalid shape '{0}'")]
    InvalidShape(String),

    /// The mode field is neither a bind nor a send-back marker.
    #[error("unknown data mode '{0}'")]
    UnknownMode(String),

    /// Declared element count disagrees with the product of the shape.
    #[error("'{symbol}' declares {count} elements but shape {shape:?} holds {product}")]
    ShapeMismatch {
        symbol: String,
        count: usize,
        shape: Vec<usize>,
        product: usize,
    },

    /// The payload length does not match `count × size_of(type)`.
    #[error("payload for '{symbol}' is {actual} bytes, expected {expected}")]
    PayloadLength {
        symbol: String,
        expected: usize,
        actual: usize,
    },

    /// `count × size_of(type)` overflows.
    #[error("payload size for '{0}' overflows")]
    SizeOverflow(String),
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
