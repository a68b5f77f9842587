use std::fmt;
use std::str::FromStr;

use crate::error::{ProtocolError, Result};

/// Element type of a data frame, keyed by single-character format codes.
///
/// | code | type | bytes |
/// |---|---|---|
/// | `c` `b` `B` | char, signed/unsigned byte | 1 |
/// | `h` `H` | int16, uint16 | 2 |
/// | `i` `I` | int32, uint32 | 4 |
/// | `l` `L` | C `long` of the host | 4 or 8 |
/// | `q` `Q` | int64, uint64 | 8 |
/// | `f` `d` | float32, float64 | 4, 8 |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    Char,
    SignedByte,
    UnsignedByte,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    Float64,
}

impl ElementType {
    pub const ALL: [ElementType; 11] = [
        ElementType::Char,
        ElementType::SignedByte,
        ElementType::UnsignedByte,
        ElementType::Int16,
        ElementType::UInt16,
        ElementType::Int32,
        ElementType::UInt32,
        ElementType::Int64,
        ElementType::UInt64,
        ElementType::Float32,
        ElementType::Float64,
    ];

    /// Resolve a format code character.
    pub fn from_code(code: char) -> Result<Self> {
        let long_is_64 = std::mem::size_of::<std::ffi::c_long>() == 8;
        let ty = match code {
            'c' => Self::Char,
            'b' => Self::SignedByte,
            'B' => Self::UnsignedByte,
            'h' => Self::Int16,
            'H' => Self::UInt16,
            'i' => Self::Int32,
            'I' => Self::UInt32,
            'l' if long_is_64 => Self::Int64,
            'l' => Self::Int32,
            'L' if long_is_64 => Self::UInt64,
            'L' => Self::UInt32,
            'q' => Self::Int64,
            'Q' => Self::UInt64,
            'f' => Self::Float32,
            'd' => Self::Float64,
            other => return Err(ProtocolError::UnknownTypeCode(other.to_string())),
        };
        Ok(ty)
    }

    /// Canonical format code. `l`/`L` are never produced.
    pub const fn code(self) -> char {
        match self {
            Self::Char => 'c',
            Self::SignedByte => 'b',
            Self::UnsignedByte => 'B',
            Self::Int16 => 'h',
            Self::UInt16 => 'H',
            Self::Int32 => 'i',
            Self::UInt32 => 'I',
            Self::Int64 => 'q',
            Self::UInt64 => 'Q',
            Self::Float32 => 'f',
            Self::Float64 => 'd',
        }
    }

    /// Size of one element in bytes.
    pub const fn size(self) -> usize {
        match self {
            Self::Char | Self::SignedByte | Self::UnsignedByte => 1,
            Self::Int16 | Self::UInt16 => 2,
            Self::Int32 | Self::UInt32 | Self::Float32 => 4,
            Self::Int64 | Self::UInt64 | Self::Float64 => 8,
        }
    }

    /// Character and byte payloads are decoded as UTF-8 text, whatever their shape.
    pub const fn is_textual(self) -> bool {
        matches!(self, Self::Char | Self::SignedByte | Self::UnsignedByte)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Char => "char",
            Self::SignedByte => "int8",
            Self::UnsignedByte => "uint8",
            Self::Int16 => "int16",
            Self::UInt16 => "uint16",
            Self::Int32 => "int32",
            Self::UInt32 => "uint32",
            Self::Int64 => "int64",
            Self::UInt64 => "uint64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
        }
    }
}

impl FromStr for ElementType {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(code), None) => Self::from_code(code),
            _ => Err(ProtocolError::UnknownTypeCode(s.to_string())),
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Rust numeric types that can travel as plotbridge elements.
pub trait Element: Copy + sealed::Sealed {
    const TYPE: ElementType;

    /// Append the native-order bytes of `self` to `dst`.
    fn put_ne(self, dst: &mut Vec<u8>);
}

mod sealed {
    pub trait Sealed {}
}

macro_rules! impl_element {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl sealed::Sealed for $t {}

            impl Element for $t {
                const TYPE: ElementType = ElementType::$variant;

                fn put_ne(self, dst: &mut Vec<u8>) {
                    dst.extend_from_slice(&self.to_ne_bytes());
                }
            }
        )*
    };
}

impl_element! {
    i8 => SignedByte,
    u8 => UnsignedByte,
    i16 => Int16,
    u16 => UInt16,
    i32 => Int32,
    u32 => UInt32,
    i64 => Int64,
    u64 => UInt64,
    f32 => Float32,
    f64 => Float64,
}

/// Native-order bytes of a slice of elements.
pub fn to_ne_bytes<T: Element>(values: &[T]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * T::TYPE.size());
    for value in values {
        value.put_ne(&mut out);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip_through_from_code() {
        for ty in ElementType::ALL {
            assert_eq!(ElementType::from_code(ty.code()).unwrap(), ty);
        }
    }

    #[test]
    fn long_follows_host_c_long() {
        let ty = ElementType::from_code('l').unwrap();
        assert_eq!(ty.size(), std::mem::size_of::<std::ffi::c_long>());
        let uty = ElementType::from_code('L').unwrap();
        assert_eq!(uty.size(), std::mem::size_of::<std::ffi::c_ulong>());
    }

    #[test]
    fn sizes_match_rust_types() {
        assert_eq!(<i16 as Element>::TYPE.size(), std::mem::size_of::<i16>());
        assert_eq!(<u32 as Element>::TYPE.size(), std::mem::size_of::<u32>());
        assert_eq!(<i64 as Element>::TYPE.size(), std::mem::size_of::<i64>());
        assert_eq!(<f32 as Element>::TYPE.size(), std::mem::size_of::<f32>());
        assert_eq!(<f64 as Element>::TYPE.size(), std::mem::size_of::<f64>());
    }

    #[test]
    fn textual_types() {
        let textual: Vec<_> = ElementType::ALL
            .into_iter()
            .filter(|ty| ty.is_textual())
            .collect();
        assert_eq!(
            textual,
            vec![
                ElementType::Char,
                ElementType::SignedByte,
                ElementType::UnsignedByte
            ]
        );
    }

    #[test]
    fn parse_rejects_unknown_and_multi_char_codes() {
        assert!(matches!(
            "x".parse::<ElementType>(),
            Err(ProtocolError::UnknownTypeCode(code)) if code == "x"
        ));
        assert!("ii".parse::<ElementType>().is_err());
        assert!("".parse::<ElementType>().is_err());
        assert_eq!("d".parse::<ElementType>().unwrap(), ElementType::Float64);
    }

    #[test]
    fn to_ne_bytes_concatenates() {
        let bytes = to_ne_bytes(&[1i32, 2, 3]);
        assert_eq!(bytes.len(), 12);
        assert_eq!(&bytes[4..8], &2i32.to_ne_bytes());
    }
}
