use std::fmt;

use crate::element::ElementType;
use crate::error::{ProtocolError, Result};
use crate::header::Header;

/// A single numeric value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
}

/// Contiguous, row-major numeric storage.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    I16(Vec<i16>),
    U16(Vec<u16>),
    I32(Vec<i32>),
    U32(Vec<u32>),
    I64(Vec<i64>),
    U64(Vec<u64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

/// A shaped numeric array.
#[derive(Debug, Clone, PartialEq)]
pub struct Array {
    shape: Vec<usize>,
    data: ArrayData,
}

/// A named value bound into a command cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum Buffer {
    Scalar(Scalar),
    Array(Array),
    Text(String),
}

fn decode_ne<T, const N: usize>(bytes: &[u8], from_ne: fn([u8; N]) -> T) -> Vec<T> {
    bytes
        .chunks_exact(N)
        .map(|chunk| {
            let mut raw = [0u8; N];
            raw.copy_from_slice(chunk);
            from_ne(raw)
        })
        .collect()
}

fn encode_ne<T: Copy, const N: usize>(values: &[T], to_ne: fn(T) -> [u8; N], out: &mut Vec<u8>) {
    out.reserve(values.len() * N);
    for value in values {
        out.extend_from_slice(&to_ne(*value));
    }
}

impl Scalar {
    fn decode(ty: ElementType, bytes: &[u8]) -> Option<Self> {
        let data = ArrayData::decode(ty, bytes)?;
        let scalar = match data {
            ArrayData::I16(v) => Self::I16(*v.first()?),
            ArrayData::U16(v) => Self::U16(*v.first()?),
            ArrayData::I32(v) => Self::I32(*v.first()?),
            ArrayData::U32(v) => Self::U32(*v.first()?),
            ArrayData::I64(v) => Self::I64(*v.first()?),
            ArrayData::U64(v) => Self::U64(*v.first()?),
            ArrayData::F32(v) => Self::F32(*v.first()?),
            ArrayData::F64(v) => Self::F64(*v.first()?),
        };
        Some(scalar)
    }

    /// Zero of a numeric type; `None` for textual types.
    pub fn zero(ty: ElementType) -> Option<Self> {
        let scalar = match ty {
            ElementType::Int16 => Self::I16(0),
            ElementType::UInt16 => Self::U16(0),
            ElementType::Int32 => Self::I32(0),
            ElementType::UInt32 => Self::U32(0),
            ElementType::Int64 => Self::I64(0),
            ElementType::UInt64 => Self::U64(0),
            ElementType::Float32 => Self::F32(0.0),
            ElementType::Float64 => Self::F64(0.0),
            ElementType::Char | ElementType::SignedByte | ElementType::UnsignedByte => {
                return None
            }
        };
        Some(scalar)
    }

    pub fn element_type(&self) -> ElementType {
        match self {
            Self::I16(_) => ElementType::Int16,
            Self::U16(_) => ElementType::UInt16,
            Self::I32(_) => ElementType::Int32,
            Self::U32(_) => ElementType::UInt32,
            Self::I64(_) => ElementType::Int64,
            Self::U64(_) => ElementType::UInt64,
            Self::F32(_) => ElementType::Float32,
            Self::F64(_) => ElementType::Float64,
        }
    }

    pub fn to_ne_bytes(&self) -> Vec<u8> {
        match *self {
            Self::I16(v) => v.to_ne_bytes().to_vec(),
            Self::U16(v) => v.to_ne_bytes().to_vec(),
            Self::I32(v) => v.to_ne_bytes().to_vec(),
            Self::U32(v) => v.to_ne_bytes().to_vec(),
            Self::I64(v) => v.to_ne_bytes().to_vec(),
            Self::U64(v) => v.to_ne_bytes().to_vec(),
            Self::F32(v) => v.to_ne_bytes().to_vec(),
            Self::F64(v) => v.to_ne_bytes().to_vec(),
        }
    }
}

impl ArrayData {
    /// Decode whole elements of `ty`; `None` for textual types.
    fn decode(ty: ElementType, bytes: &[u8]) -> Option<Self> {
        let data = match ty {
            ElementType::Int16 => Self::I16(decode_ne(bytes, i16::from_ne_bytes)),
            ElementType::UInt16 => Self::U16(decode_ne(bytes, u16::from_ne_bytes)),
            ElementType::Int32 => Self::I32(decode_ne(bytes, i32::from_ne_bytes)),
            ElementType::UInt32 => Self::U32(decode_ne(bytes, u32::from_ne_bytes)),
            ElementType::Int64 => Self::I64(decode_ne(bytes, i64::from_ne_bytes)),
            ElementType::UInt64 => Self::U64(decode_ne(bytes, u64::from_ne_bytes)),
            ElementType::Float32 => Self::F32(decode_ne(bytes, f32::from_ne_bytes)),
            ElementType::Float64 => Self::F64(decode_ne(bytes, f64::from_ne_bytes)),
            ElementType::Char | ElementType::SignedByte | ElementType::UnsignedByte => {
                return None
            }
        };
        Some(data)
    }

    /// `len` zeros of a numeric type; `None` for textual types.
    pub fn zeros(ty: ElementType, len: usize) -> Option<Self> {
        let data = match ty {
            ElementType::Int16 => Self::I16(vec![0; len]),
            ElementType::UInt16 => Self::U16(vec![0; len]),
            ElementType::Int32 => Self::I32(vec![0; len]),
            ElementType::UInt32 => Self::U32(vec![0; len]),
            ElementType::Int64 => Self::I64(vec![0; len]),
            ElementType::UInt64 => Self::U64(vec![0; len]),
            ElementType::Float32 => Self::F32(vec![0.0; len]),
            ElementType::Float64 => Self::F64(vec![0.0; len]),
            ElementType::Char | ElementType::SignedByte | ElementType::UnsignedByte => {
                return None
            }
        };
        Some(data)
    }

    pub fn len(&self) -> usize {
        match self {
            Self::I16(v) => v.len(),
            Self::U16(v) => v.len(),
            Self::I32(v) => v.len(),
            Self::U32(v) => v.len(),
            Self::I64(v) => v.len(),
            Self::U64(v) => v.len(),
            Self::F32(v) => v.len(),
            Self::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn element_type(&self) -> ElementType {
        match self {
            Self::I16(_) => ElementType::Int16,
            Self::U16(_) => ElementType::UInt16,
            Self::I32(_) => ElementType::Int32,
            Self::U32(_) => ElementType::UInt32,
            Self::I64(_) => ElementType::Int64,
            Self::U64(_) => ElementType::UInt64,
            Self::F32(_) => ElementType::Float32,
            Self::F64(_) => ElementType::Float64,
        }
    }

    fn write_ne(&self, out: &mut Vec<u8>) {
        match self {
            Self::I16(v) => encode_ne(v, i16::to_ne_bytes, out),
            Self::U16(v) => encode_ne(v, u16::to_ne_bytes, out),
            Self::I32(v) => encode_ne(v, i32::to_ne_bytes, out),
            Self::U32(v) => encode_ne(v, u32::to_ne_bytes, out),
            Self::I64(v) => encode_ne(v, i64::to_ne_bytes, out),
            Self::U64(v) => encode_ne(v, u64::to_ne_bytes, out),
            Self::F32(v) => encode_ne(v, f32::to_ne_bytes, out),
            Self::F64(v) => encode_ne(v, f64::to_ne_bytes, out),
        }
    }
}

impl Array {
    /// Pair `data` with a shape. Returns `None` if the shape does not hold
    /// exactly `data.len()` elements.
    pub fn new(shape: Vec<usize>, data: ArrayData) -> Option<Self> {
        let product = shape.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))?;
        (!shape.is_empty() && product == data.len()).then_some(Self { shape, data })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &ArrayData {
        &self.data
    }

    /// Replace the elements, keeping the shape. Returns `None` and leaves
    /// the array untouched if `data` holds a different number of elements.
    pub fn set_data(&mut self, data: ArrayData) -> Option<()> {
        (data.len() == self.data.len()).then(|| self.data = data)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn element_type(&self) -> ElementType {
        self.data.element_type()
    }
}

impl Buffer {
    /// Zero-initialised stand-in for a value the producer wants back.
    ///
    /// Numeric arrays get `product(shape)` zeros, numeric scalars a zero,
    /// character types an empty string.
    pub fn placeholder(header: &Header) -> Self {
        let ty = header.element_type;
        if ty.is_textual() {
            return Self::Text(String::new());
        }
        if !header.is_scalar() {
            let len = header.shape.iter().product();
            if let Some(array) = ArrayData::zeros(ty, len).and_then(|data| Array::new(header.shape.clone(), data)) {
                return Self::Array(array);
            }
        }
        Scalar::zero(ty).map_or_else(|| Self::Text(String::new()), Self::Scalar)
    }

    /// Element type, or `None` for text.
    pub fn element_type(&self) -> Option<ElementType> {
        match self {
            Self::Scalar(s) => Some(s.element_type()),
            Self::Array(a) => Some(a.element_type()),
            Self::Text(_) => None,
        }
    }

    /// Raw native-order bytes, as sent over the return channel.
    pub fn to_ne_bytes(&self) -> Vec<u8> {
        match self {
            Self::Scalar(s) => s.to_ne_bytes(),
            Self::Array(a) => {
                let mut out = Vec::new();
                a.data.write_ne(&mut out);
                out
            }
            Self::Text(t) => t.as_bytes().to_vec(),
        }
    }
}

/// Short description for logs: `int32[3]`, `float64 scalar`, `text(12)`.
impl fmt::Display for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(s) => write!(f, "{} scalar", s.element_type()),
            Self::Array(a) => {
                write!(f, "{}[", a.element_type())?;
                for (i, dim) in a.shape.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{dim}")?;
                }
                f.write_str("]")
            }
            Self::Text(t) => write!(f, "text({})", t.len()),
        }
    }
}

/// Rebuild the value a header announced from its payload frame.
///
/// Character and byte types decode to UTF-8 text regardless of shape. Numeric
/// types decode to an [`Array`] when the first dimension is non-zero and to a
/// [`Scalar`] otherwise. The payload length must match the header exactly.
pub fn reconstruct(header: &Header, payload: &[u8]) -> Result<Buffer> {
    let expected = header.payload_len()?;
    if payload.len() != expected {
        return Err(ProtocolError::PayloadLength {
            symbol: header.symbol.clone(),
            expected,
            actual: payload.len(),
        });
    }

    let ty = header.element_type;
    if ty.is_textual() {
        let text = std::str::from_utf8(payload).map_err(|source| ProtocolError::InvalidUtf8 {
            context: "text payload",
            source,
        })?;
        return Ok(Buffer::Text(text.to_string()));
    }

    let mismatch = || ProtocolError::PayloadLength {
        symbol: header.symbol.clone(),
        expected,
        actual: payload.len(),
    };

    if header.is_scalar() {
        return Scalar::decode(ty, payload).map(Buffer::Scalar).ok_or_else(mismatch);
    }

    let data = ArrayData::decode(ty, payload).ok_or_else(mismatch)?;
    let array = Array::new(header.shape.clone(), data).ok_or_else(|| ProtocolError::ShapeMismatch {
        symbol: header.symbol.clone(),
        count: header.element_count,
        shape: header.shape.clone(),
        product: header.shape.iter().product(),
    })?;
    tracing::trace!(
        symbol = %header.symbol,
        element_type = array.element_type().name(),
        shape = ?array.shape(),
        "reconstructed"
    );
    Ok(Buffer::Array(array))
}
