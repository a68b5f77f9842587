use std::fmt;

use crate::element::ElementType;
use crate::error::{ProtocolError, Result};

const FIELD_LITERAL: usize = 0;
const FIELD_SYMBOL: usize = 1;
const FIELD_TYPE: usize = 2;
const FIELD_COUNT: usize = 3;
const FIELD_SHAPE: usize = 4;
pub(crate) const FIELD_MODE: usize = 5;

/// What the consumer does with a declared symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Bind the following payload frame under the symbol.
    #[default]
    Bind,
    /// Bind a zeroed placeholder (no payload follows) and stream the
    /// post-evaluation value back to the producer.
    BindAndReturn,
}

impl Mode {
    pub(crate) fn parse(text: &str) -> Result<Self> {
        match text.trim() {
            "use" | "dont_send_back" => Ok(Self::Bind),
            "send_back" => Ok(Self::BindAndReturn),
            other => Err(ProtocolError::UnknownMode(other.to_string())),
        }
    }

    /// Wire spelling.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bind => "use",
            Self::BindAndReturn => "send_back",
        }
    }
}

/// Which header layout the producer speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProtocolRevision {
    /// Five fields; a trailing mode field is tolerated.
    Legacy,
    /// Six fields; the mode field is mandatory.
    #[default]
    ReturnValues,
}

/// Decoded data header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub symbol: String,
    pub element_type: ElementType,
    pub element_count: usize,
    pub shape: Vec<usize>,
    pub mode: Mode,
}

impl Header {
    /// Header for `symbol` with an explicit shape. Scalars use an empty shape.
    pub fn new(symbol: impl Into<String>, element_type: ElementType, shape: Vec<usize>) -> Self {
        let element_count = if shape.is_empty() {
            1
        } else {
            shape.iter().product()
        };
        Self {
            symbol: symbol.into(),
            element_type,
            element_count,
            shape,
            mode: Mode::Bind,
        }
    }

    /// Header for a character payload of `len` bytes.
    pub fn text(symbol: impl Into<String>, len: usize) -> Self {
        Self {
            symbol: symbol.into(),
            element_type: ElementType::Char,
            element_count: len,
            shape: vec![len],
            mode: Mode::Bind,
        }
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Build a header from the `|`-separated fields of a data frame.
    pub fn from_fields(fields: &[&str], revision: ProtocolRevision) -> Result<Self> {
        let valid_len = match revision {
            ProtocolRevision::Legacy => fields.len() == 5 || fields.len() == 6,
            ProtocolRevision::ReturnValues => fields.len() == 6,
        };
        if !valid_len {
            return Err(ProtocolError::FieldCount {
                expected: match revision {
                    ProtocolRevision::Legacy => "5 or 6",
                    ProtocolRevision::ReturnValues => "6",
                },
                found: fields.len(),
            });
        }

        if fields[FIELD_LITERAL] != "data" {
            return Err(ProtocolError::NotAHeader(fields[FIELD_LITERAL].to_string()));
        }

        let symbol = fields[FIELD_SYMBOL].trim();
        if symbol.is_empty() {
            return Err(ProtocolError::EmptySymbol);
        }

        let element_type: ElementType = fields[FIELD_TYPE].trim().parse()?;
        let count_text = fields[FIELD_COUNT].trim();
        let element_count = count_text
            .parse::<usize>()
            .map_err(|_| ProtocolError::InvalidCount(count_text.to_string()))?;
        let shape = parse_shape(fields[FIELD_SHAPE])?;
        let mode = match fields.get(FIELD_MODE) {
            Some(text) => Mode::parse(text)?,
            None => Mode::Bind,
        };

        let header = Self {
            symbol: symbol.to_string(),
            element_type,
            element_count,
            shape,
            mode,
        };
        header.check_shape()?;
        Ok(header)
    }

    /// Parse the text of a whole data frame.
    pub fn parse(text: &str, revision: ProtocolRevision) -> Result<Self> {
        let fields: Vec<&str> = text.split('|').collect();
        Self::from_fields(&fields, revision)
    }

    /// An empty shape, or a leading zero dimension, declares a single value.
    pub fn is_scalar(&self) -> bool {
        self.shape.first().is_none_or(|&d| d == 0)
    }

    /// Whether a payload frame follows this header on the wire.
    pub fn expects_payload(&self) -> bool {
        self.mode == Mode::Bind
    }

    /// Payload length the header promises, in bytes.
    pub fn payload_len(&self) -> Result<usize> {
        if self.element_type.is_textual() {
            return Ok(self.element_count);
        }
        if self.is_scalar() {
            return Ok(self.element_type.size());
        }
        self.element_count
            .checked_mul(self.element_type.size())
            .ok_or_else(|| ProtocolError::SizeOverflow(self.symbol.clone()))
    }

    fn check_shape(&self) -> Result<()> {
        if self.element_type.is_textual() || self.is_scalar() {
            return Ok(());
        }
        let product = self
            .shape
            .iter()
            .try_fold(1usize, |acc, &d| acc.checked_mul(d))
            .ok_or_else(|| ProtocolError::SizeOverflow(self.symbol.clone()))?;
        if product != self.element_count {
            return Err(ProtocolError::ShapeMismatch {
                symbol: self.symbol.clone(),
                count: self.element_count,
                shape: self.shape.clone(),
                product,
            });
        }
        Ok(())
    }
}

/// Wire form: `data|<symbol>|<code>|<count>|(<d0>,<d1>)|<mode>`.
impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "data|{}|{}|{}|(",
            self.symbol,
            self.element_type.code(),
            self.element_count
        )?;
        for (i, dim) in self.shape.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{dim}")?;
        }
        write!(f, ")|{}", self.mode.as_str())
    }
}

/// Parse shape text such as `(3,4)`, `(3,)` or `()`.
///
/// Digits accumulate into a dimension; a comma or closing parenthesis ends
/// it. Everything else is ignored. An empty result means "scalar".
pub fn parse_shape(text: &str) -> Result<Vec<usize>> {
    let mut shape = Vec::new();
    let mut digits = String::new();

    for ch in text.chars() {
        if ch.is_ascii_digit() {
            digits.push(ch);
        } else if (ch == ',' || ch == ')') && !digits.is_empty() {
            let dim = digits
                .parse::<usize>()
                .map_err(|_| ProtocolError::InvalidShape(text.to_string()))?;
            shape.push(dim);
            digits.clear();
        }
    }

    Ok(shape)
}
