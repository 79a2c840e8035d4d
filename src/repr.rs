//! Sample representation: the closed set of encodings the engine understands, the wider set
//! of element shapes a caller can declare, and the packed 24-bit sample type.
//!
//! # Encodings
//!
//! | Element type | Encoding | Bytes |
//! |--------------|----------|-------|
//! | `f32`        | [`SampleEncoding::Float32`] | 4 |
//! | `i32`        | [`SampleEncoding::Int32`]   | 4 |
//! | [`Int24`]    | [`SampleEncoding::Int24`]   | 3 |
//! | `i16`        | [`SampleEncoding::Int16`]   | 2 |
//! | `i8`         | [`SampleEncoding::Int8`]    | 1 |
//! | `u8`         | [`SampleEncoding::UInt8`]   | 1 |
//!
//! Every other [`ElementShape`] is representable so that it can be reported, but has no
//! encoding and is rejected during format inference.

use bytemuck::{Pod, Zeroable};
use i24::I24;
use std::fmt;

/// Sample encodings supported by the native engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleEncoding {
    /// 32-bit IEEE float, nominal range -1.0 to 1.0.
    Float32,
    /// 32-bit signed integer.
    Int32,
    /// 24-bit signed integer packed into 3 bytes.
    Int24,
    /// 16-bit signed integer.
    Int16,
    /// 8-bit signed integer.
    Int8,
    /// 8-bit unsigned integer, silence at 128.
    UInt8,
}

impl SampleEncoding {
    /// All encodings, in the engine's flag order.
    pub const ALL: [SampleEncoding; 6] = [
        SampleEncoding::Float32,
        SampleEncoding::Int32,
        SampleEncoding::Int24,
        SampleEncoding::Int16,
        SampleEncoding::Int8,
        SampleEncoding::UInt8,
    ];

    /// Size of one sample in bytes.
    pub const fn size_bytes(&self) -> usize {
        match self {
            Self::Float32 | Self::Int32 => 4,
            Self::Int24 => 3,
            Self::Int16 => 2,
            Self::Int8 | Self::UInt8 => 1,
        }
    }

    /// Check if this is a floating point encoding
    pub const fn is_float(&self) -> bool {
        matches!(self, Self::Float32)
    }

    /// Element shape a buffer must declare to use this encoding.
    pub const fn element(&self) -> ElementShape {
        match self {
            Self::Float32 => ElementShape::F32,
            Self::Int32 => ElementShape::I32,
            Self::Int24 => ElementShape::I24,
            Self::Int16 => ElementShape::I16,
            Self::Int8 => ElementShape::I8,
            Self::UInt8 => ElementShape::U8,
        }
    }
}

impl fmt::Display for SampleEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Float32 => "float32",
            Self::Int32 => "int32",
            Self::Int24 => "int24",
            Self::Int16 => "int16",
            Self::Int8 => "int8",
            Self::UInt8 => "uint8",
        };
        f.write_str(label)
    }
}

/// Element type declared by a buffer or callback parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementShape {
    /// `f32`
    F32,
    /// `f64`
    F64,
    /// `i8`
    I8,
    /// `i16`
    I16,
    /// Packed 24-bit integer ([`Int24`]).
    I24,
    /// `i32`
    I32,
    /// `i64`
    I64,
    /// `u8`
    U8,
    /// `u16`
    U16,
    /// `u32`
    U32,
    /// `u64`
    U64,
    /// Anything else, named for diagnostics.
    Other(&'static str),
}

impl ElementShape {
    /// Maps the element to its sample encoding, if the engine supports one.
    pub const fn encoding(&self) -> Option<SampleEncoding> {
        match self {
            Self::F32 => Some(SampleEncoding::Float32),
            Self::I32 => Some(SampleEncoding::Int32),
            Self::I24 => Some(SampleEncoding::Int24),
            Self::I16 => Some(SampleEncoding::Int16),
            Self::I8 => Some(SampleEncoding::Int8),
            Self::U8 => Some(SampleEncoding::UInt8),
            Self::F64 | Self::I64 | Self::U16 | Self::U32 | Self::U64 | Self::Other(_) => None,
        }
    }

    /// Returns the Rust-facing name of the element.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I24 => "Int24",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for ElementShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A 24-bit signed sample stored as 3 native-endian bytes.
///
/// This is the exact in-memory format the engine reads and writes for
/// [`SampleEncoding::Int24`], so slices of `Int24` can be handed to the engine directly.
/// Arithmetic goes through [`I24`]:
///
/// ```rust
/// use audio_io::{Int24, I24};
///
/// let packed = Int24::from_i32(-1_000);
/// assert_eq!(packed.to_i32(), -1_000);
/// let wide: I24 = packed.into();
/// assert_eq!(wide.to_i32(), -1_000);
/// ```
#[repr(transparent)]
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct Int24(pub [u8; 3]);

impl Int24 {
    /// Largest representable value.
    pub const MAX: Int24 = Int24::from_i32(0x7F_FFFF);
    /// Smallest representable value.
    pub const MIN: Int24 = Int24::from_i32(-0x80_0000);
    /// Zero.
    pub const ZERO: Int24 = Int24([0; 3]);

    /// Packs the low 24 bits of `value`. Bits above 24 are discarded.
    pub const fn from_i32(value: i32) -> Self {
        let b = value.to_ne_bytes();
        if cfg!(target_endian = "little") {
            Int24([b[0], b[1], b[2]])
        } else {
            Int24([b[1], b[2], b[3]])
        }
    }

    /// Packs `value`, saturating at the 24-bit limits.
    pub const fn saturating_from_i32(value: i32) -> Self {
        if value > 0x7F_FFFF {
            Self::MAX
        } else if value < -0x80_0000 {
            Self::MIN
        } else {
            Self::from_i32(value)
        }
    }

    /// Sign-extends the packed value to an `i32`.
    pub const fn to_i32(self) -> i32 {
        let [a, b, c] = self.0;
        let raw = if cfg!(target_endian = "little") {
            i32::from_le_bytes([a, b, c, 0])
        } else {
            i32::from_be_bytes([a, b, c, 0]) >> 8
        };
        (raw << 8) >> 8
    }
}

impl fmt::Debug for Int24 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Int24").field(&self.to_i32()).finish()
    }
}

impl fmt::Display for Int24 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_i32())
    }
}

impl From<I24> for Int24 {
    fn from(value: I24) -> Self {
        Int24::from_i32(value.to_i32())
    }
}

impl From<Int24> for I24 {
    fn from(value: Int24) -> Self {
        // Every sign-extended 24-bit value is in range.
        I24::try_from_i32(value.to_i32()).unwrap_or(I24::MIN)
    }
}

impl num_traits::Bounded for Int24 {
    fn min_value() -> Self {
        Int24::MIN
    }

    fn max_value() -> Self {
        Int24::MAX
    }
}
