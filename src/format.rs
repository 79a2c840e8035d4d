//! Format inference: deriving sample encodings and channel layouts from declared shapes.
//!
//! The engine is never told a sample format explicitly. Instead every side of a stream gets its
//! encoding from the element type of the buffer bound to it, and its layout from whether that
//! buffer is flat (interleaved) or nested (one buffer per channel). All validation here runs
//! before any native resource is allocated.
//!
//! ## Callback rules
//!
//! 1. Buffers come first, one per side that has a device, in (input, output) order.
//! 2. If the first two parameters are both buffers, *both* sides take one, whether or not the
//!    side has a device. The buffer of a device-less side is validated but always empty.
//! 3. After the buffers, at most a [`TimeInfo`](crate::TimeInfo) and then a
//!    [`StatusFlags`](crate::StatusFlags), in that order.
//! 4. No return value.
//!
//! ## Blocking rules
//!
//! Each side that has a device must be given a buffer. A buffer given for a side without a
//! device is validated and otherwise ignored.

use std::fmt;

use crate::error::SignatureError;
use crate::host::params::{StreamDeviceParameters, StreamParameters};
use crate::repr::{ElementShape, SampleEncoding};
use crate::{ChannelLayout, Side};

/// Declared shape of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferShape {
    /// No buffer at this position (the `()` buffer of blocking streams).
    Absent,
    /// A flat or nested sequence of `element`.
    Buffer {
        /// Innermost element type.
        element: ElementShape,
        /// Flat sequences are interleaved, nested ones non-interleaved.
        layout: ChannelLayout,
    },
}

impl BufferShape {
    /// Shape of a buffer of `element` in the given layout.
    pub const fn buffer(element: ElementShape, layout: ChannelLayout) -> Self {
        Self::Buffer { element, layout }
    }

    /// Returns true for [`BufferShape::Absent`].
    pub const fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Resolves the shape to a side format with `channels` channels.
    ///
    /// `position` is only used for diagnostics.
    pub fn resolve(&self, position: usize, channels: usize) -> Result<SideFormat, SignatureError> {
        match *self {
            Self::Absent => Err(SignatureError::ExpectedBuffer {
                position,
                found: "()".to_string(),
            }),
            Self::Buffer { element, layout } => match element.encoding() {
                Some(encoding) => Ok(SideFormat {
                    encoding,
                    layout,
                    channels,
                }),
                None => Err(SignatureError::UnsupportedElement { position, element }),
            },
        }
    }
}

impl fmt::Display for BufferShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => f.write_str("()"),
            Self::Buffer {
                element,
                layout: ChannelLayout::Interleaved,
            } => write!(f, "[{element}]"),
            Self::Buffer {
                element,
                layout: ChannelLayout::NonInterleaved,
            } => write!(f, "[[{element}]]"),
        }
    }
}

/// Shape of one declared callback parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParamShape {
    /// A sample buffer.
    Buffer(BufferShape),
    /// Block timestamps.
    TimeInfo,
    /// Block status flags.
    StatusFlags,
    /// Anything else, named for diagnostics.
    Other(&'static str),
}

impl ParamShape {
    fn as_buffer(&self) -> Option<BufferShape> {
        match self {
            Self::Buffer(shape @ BufferShape::Buffer { .. }) => Some(*shape),
            _ => None,
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Buffer(shape) => shape.to_string(),
            Self::TimeInfo => "TimeInfo".to_string(),
            Self::StatusFlags => "StatusFlags".to_string(),
            Self::Other(name) => (*name).to_string(),
        }
    }
}

/// The ordered parameter shapes of a callback.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallbackSignature {
    /// Parameters in declaration order.
    pub params: Vec<ParamShape>,
    /// Whether the callback declares a return value.
    pub returns_value: bool,
}

impl CallbackSignature {
    /// A signature with the given parameters and no return value.
    pub const fn new(params: Vec<ParamShape>) -> Self {
        Self {
            params,
            returns_value: false,
        }
    }

    /// Marks the signature as declaring a return value.
    pub fn with_return_value(mut self) -> Self {
        self.returns_value = true;
        self
    }
}

/// Inferred format of one stream side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SideFormat {
    /// Sample encoding.
    pub encoding: SampleEncoding,
    /// Channel layout.
    pub layout: ChannelLayout,
    /// Channel count, from the stream parameters.
    pub channels: usize,
}

impl fmt::Display for SideFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} x{}", self.encoding, self.layout, self.channels)
    }
}

/// Inferred format of a whole stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct StreamFormat {
    /// Input side, present if the input side has a device.
    pub input: Option<SideFormat>,
    /// Output side, present if the output side has a device.
    pub output: Option<SideFormat>,
    /// Side bound to the only buffer parameter of a one-buffer callback.
    pub single: Option<Side>,
    /// The callback declares a time-info parameter.
    pub time_info: bool,
    /// The callback declares a status-flags parameter.
    pub status_flags: bool,
}

impl StreamFormat {
    /// Format of `side`.
    pub const fn side(&self, side: Side) -> Option<SideFormat> {
        match side {
            Side::Input => self.input,
            Side::Output => self.output,
        }
    }

    /// Channel count of `side`, zero if the side is unused.
    pub fn channels(&self, side: Side) -> usize {
        self.side(side).map_or(0, |format| format.channels)
    }
}

/// Infers the stream format of a callback stream.
///
/// # Errors
///
/// Returns a [`SignatureError`] describing the first rule the signature breaks.
pub fn infer_callback(
    signature: &CallbackSignature,
    params: &StreamParameters,
) -> Result<StreamFormat, SignatureError> {
    let declared = &signature.params;
    if declared.is_empty() {
        return Err(SignatureError::TooFewParameters);
    }
    if signature.returns_value {
        return Err(SignatureError::ReturnValue);
    }

    let both_buffers = declared.len() > 1 && matches!(declared[1], ParamShape::Buffer(_));
    let mut format = StreamFormat::default();
    let mut next = 0usize;
    let mut bound = Vec::with_capacity(2);

    for (side, device) in [(Side::Input, &params.input), (Side::Output, &params.output)] {
        if !device.has_device() && !both_buffers {
            continue;
        }
        let Some(param) = declared.get(next) else {
            return Err(SignatureError::TooFewBuffers);
        };
        let shape = param
            .as_buffer()
            .ok_or_else(|| SignatureError::ExpectedBuffer {
                position: next,
                found: param.describe(),
            })?;
        let side_format = shape.resolve(next, device.channels)?;
        next += 1;
        if device.has_device() {
            bound.push(side);
            match side {
                Side::Input => format.input = Some(side_format),
                Side::Output => format.output = Some(side_format),
            }
        }
    }

    if next == 1 {
        format.single = bound.first().copied();
    }

    if let Some(ParamShape::TimeInfo) = declared.get(next) {
        format.time_info = true;
        next += 1;
    }
    if let Some(ParamShape::StatusFlags) = declared.get(next) {
        format.status_flags = true;
        next += 1;
    }
    match declared.get(next) {
        None => Ok(format),
        Some(param) => Err(SignatureError::InvalidTrailing {
            position: next,
            found: param.describe(),
        }),
    }
}

/// Infers the stream format of a blocking stream from its two buffer shapes.
///
/// # Errors
///
/// Returns [`SignatureError::MissingBuffer`] if a side with a device has no buffer, or
/// [`SignatureError::UnsupportedElement`] if a buffer has no sample encoding.
pub fn infer_blocking(
    input: BufferShape,
    output: BufferShape,
    params: &StreamParameters,
) -> Result<StreamFormat, SignatureError> {
    let side_format = |position: usize,
                       side: Side,
                       shape: BufferShape,
                       device: &StreamDeviceParameters|
     -> Result<Option<SideFormat>, SignatureError> {
        if shape.is_absent() {
            return if device.has_device() {
                Err(SignatureError::MissingBuffer { side })
            } else {
                Ok(None)
            };
        }
        let resolved = shape.resolve(position, device.channels)?;
        Ok(device.has_device().then_some(resolved))
    };

    Ok(StreamFormat {
        input: side_format(0, Side::Input, input, &params.input)?,
        output: side_format(1, Side::Output, output, &params.output)?,
        ..StreamFormat::default()
    })
}
