use bytemuck::Pod;
use num_traits::Bounded;
use std::fmt::Debug;

use crate::repr::{ElementShape, Int24, SampleEncoding};

/// A type that may appear as the element of a declared buffer.
///
/// This is deliberately wider than the set of types the engine can exchange: `f64` or `u16`
/// buffers are expressible so that they can be rejected at open time with a
/// [`SignatureError`](crate::SignatureError) naming the offending element, instead of an
/// opaque trait-bound failure.
///
/// Only implemented inside this crate.
pub trait Element: Copy + Send + Sync + Debug + 'static {
    /// The declared shape of this element.
    const SHAPE: ElementShape;
}

/// Core trait for the sample types the engine exchanges natively.
///
/// Implemented for `f32`, `i32`, [`Int24`], `i16`, `i8` and `u8`. All of them are plain
/// old data, so buffers of samples can be viewed as bytes with `bytemuck`.
///
/// Conversions to and from `f32` are provided for convenience when filling or inspecting
/// buffers; they use the usual audio scaling (integer full scale maps to -1.0..1.0, `u8`
/// is offset by 128).
pub trait Sample: Element + Pod + Bounded + PartialEq + Default {
    /// The encoding this sample type selects.
    const ENCODING: SampleEncoding;

    /// Value that represents silence.
    const EQUILIBRIUM: Self;

    /// Bit depth of this sample type.
    const BITS: u8;

    /// Converts to a float in -1.0..=1.0.
    fn to_f32(self) -> f32;

    /// Converts from a float, clamping to the representable range.
    fn from_f32(value: f32) -> Self;
}

// ========================
// Element Implementations
// ========================

macro_rules! impl_element {
    ($($type:ty => $shape:ident),* $(,)?) => {
        $(
            impl Element for $type {
                const SHAPE: ElementShape = ElementShape::$shape;
            }
        )*
    };
}

impl_element!(
    f32 => F32,
    f64 => F64,
    i8 => I8,
    i16 => I16,
    Int24 => I24,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
);

// ========================
// Sample Implementations
// ========================

/// Generates signed-integer samples with full-scale float scaling.
macro_rules! impl_signed_sample {
    ($type:ty, $encoding:ident, $bits:expr) => {
        impl Sample for $type {
            const ENCODING: SampleEncoding = SampleEncoding::$encoding;
            const EQUILIBRIUM: Self = 0;
            const BITS: u8 = $bits;

            #[inline(always)]
            fn to_f32(self) -> f32 {
                if self < 0 {
                    self as f32 / -(<$type>::MIN as f32)
                } else {
                    self as f32 / <$type>::MAX as f32
                }
            }

            #[inline(always)]
            fn from_f32(value: f32) -> Self {
                let clamped = value.clamp(-1.0, 1.0);
                if clamped < 0.0 {
                    (clamped * -(<$type>::MIN as f32)).round() as $type
                } else {
                    (clamped * <$type>::MAX as f32).round() as $type
                }
            }
        }
    };
}

impl_signed_sample!(i8, Int8, 8);
impl_signed_sample!(i16, Int16, 16);
impl_signed_sample!(i32, Int32, 32);

impl Sample for f32 {
    const ENCODING: SampleEncoding = SampleEncoding::Float32;
    const EQUILIBRIUM: Self = 0.0;
    const BITS: u8 = 32;

    #[inline(always)]
    fn to_f32(self) -> f32 {
        self
    }

    #[inline(always)]
    fn from_f32(value: f32) -> Self {
        value
    }
}

impl Sample for u8 {
    const ENCODING: SampleEncoding = SampleEncoding::UInt8;
    const EQUILIBRIUM: Self = 128;
    const BITS: u8 = 8;

    #[inline(always)]
    fn to_f32(self) -> f32 {
        (self as i16 - 128) as i8 as f32 / 128.0
    }

    #[inline(always)]
    fn from_f32(value: f32) -> Self {
        (i8::from_f32(value) as i16 + 128) as u8
    }
}

impl Sample for Int24 {
    const ENCODING: SampleEncoding = SampleEncoding::Int24;
    const EQUILIBRIUM: Self = Int24::ZERO;
    const BITS: u8 = 24;

    #[inline(always)]
    fn to_f32(self) -> f32 {
        let val = self.to_i32();
        if val < 0 {
            val as f32 / -(Int24::MIN.to_i32() as f32)
        } else {
            val as f32 / Int24::MAX.to_i32() as f32
        }
    }

    #[inline(always)]
    fn from_f32(value: f32) -> Self {
        let clamped = value.clamp(-1.0, 1.0);
        let scaled = if clamped < 0.0 {
            (clamped * -(Int24::MIN.to_i32() as f32)).round() as i32
        } else {
            (clamped * Int24::MAX.to_i32() as f32).round() as i32
        };
        Int24::saturating_from_i32(scaled)
    }
}
