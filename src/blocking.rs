//! Blocking I/O: buffers handed over at open time and transferred with
//! [`Stream::read`](crate::Stream::read) and [`Stream::write`](crate::Stream::write).
//!
//! | Buffer type | Layout | Frames per transfer |
//! |---|---|---|
//! | `Vec<T>` | interleaved | `len / channels` (must divide evenly) |
//! | `Vec<Vec<T>>` | non-interleaved | the common channel length (one `Vec` per channel) |
//! | `()` | no buffer | only for a side without a device |
//!
//! The buffers stay owned by the stream; resize or refill them between transfers through
//! [`Stream::input_buffer_mut`](crate::Stream::input_buffer_mut) and
//! [`Stream::output_buffer_mut`](crate::Stream::output_buffer_mut). Every transfer
//! re-validates them against the stream's channel count before the engine is called.

use std::ffi::c_void;

use crate::error::{StreamError, StreamResult};
use crate::format::{BufferShape, SideFormat};
use crate::host::{ErrorCode, NativeError};
use crate::repr::Int24;
use crate::traits::Element;
use crate::{ChannelLayout, Side};

/// A buffer usable with a blocking stream.
pub trait BlockingBuffer: Send + 'static {
    /// Declared shape of the buffer.
    fn shape() -> BufferShape;

    /// Validates the buffer against `channels` and returns the pointer to hand to the engine
    /// together with the frame count.
    ///
    /// Non-interleaved buffers fill `channel_pointers`, which has exactly `channels` entries.
    #[doc(hidden)]
    fn prepare(
        &mut self,
        side: Side,
        channels: usize,
        channel_pointers: &mut [*mut c_void],
    ) -> StreamResult<(*mut c_void, usize)>;
}

impl BlockingBuffer for () {
    fn shape() -> BufferShape {
        BufferShape::Absent
    }

    fn prepare(
        &mut self,
        side: Side,
        _channels: usize,
        _channel_pointers: &mut [*mut c_void],
    ) -> StreamResult<(*mut c_void, usize)> {
        Err(StreamError::buffer_mismatch(side, "no buffer was given"))
    }
}

fn prepare_interleaved<T>(
    buffer: &mut [T],
    side: Side,
    channels: usize,
) -> StreamResult<(*mut c_void, usize)> {
    if channels == 0 {
        return Err(StreamError::buffer_mismatch(side, "stream side has no channels"));
    }
    if buffer.len() % channels != 0 {
        return Err(StreamError::buffer_mismatch(
            side,
            format!(
                "length of interleaved buffer ({}) not divisible by number of channels ({channels})",
                buffer.len()
            ),
        ));
    }
    Ok((buffer.as_mut_ptr().cast(), buffer.len() / channels))
}

fn prepare_non_interleaved<T>(
    buffer: &mut [Vec<T>],
    side: Side,
    channels: usize,
    channel_pointers: &mut [*mut c_void],
) -> StreamResult<(*mut c_void, usize)> {
    if buffer.len() != channels || channel_pointers.len() != channels {
        return Err(StreamError::buffer_mismatch(
            side,
            format!(
                "buffer has {} channels, stream has {channels}",
                buffer.len()
            ),
        ));
    }
    let frames = buffer.first().map_or(0, Vec::len);
    if buffer.iter().any(|channel| channel.len() != frames) {
        return Err(StreamError::buffer_mismatch(
            side,
            "channels have different lengths",
        ));
    }
    for (slot, channel) in channel_pointers.iter_mut().zip(buffer.iter_mut()) {
        *slot = channel.as_mut_ptr().cast();
    }
    Ok((channel_pointers.as_mut_ptr().cast(), frames))
}

macro_rules! impl_blocking_buffer {
    ($($type:ty),* $(,)?) => {
        $(
            impl BlockingBuffer for Vec<$type> {
                fn shape() -> BufferShape {
                    BufferShape::buffer(<$type as Element>::SHAPE, ChannelLayout::Interleaved)
                }

                fn prepare(
                    &mut self,
                    side: Side,
                    channels: usize,
                    _channel_pointers: &mut [*mut c_void],
                ) -> StreamResult<(*mut c_void, usize)> {
                    prepare_interleaved(self, side, channels)
                }
            }

            impl BlockingBuffer for Vec<Vec<$type>> {
                fn shape() -> BufferShape {
                    BufferShape::buffer(<$type as Element>::SHAPE, ChannelLayout::NonInterleaved)
                }

                fn prepare(
                    &mut self,
                    side: Side,
                    channels: usize,
                    channel_pointers: &mut [*mut c_void],
                ) -> StreamResult<(*mut c_void, usize)> {
                    prepare_non_interleaved(self, side, channels, channel_pointers)
                }
            }
        )*
    };
}

impl_blocking_buffer!(f32, f64, i8, i16, Int24, i32, i64, u8, u16, u32, u64);

/// One side of a blocking stream: the caller's buffer plus the channel pointer array handed to
/// the engine for non-interleaved transfers, allocated once at open time.
pub(crate) struct BlockingSide<B> {
    pub(crate) buffer: B,
    format: Option<SideFormat>,
    channel_pointers: Box<[*mut c_void]>,
}

// SAFETY: the channel pointers only ever point into `buffer`, which is owned alongside them and
// only accessed through `&mut self`.
unsafe impl<B: Send> Send for BlockingSide<B> {}

impl<B: BlockingBuffer> BlockingSide<B> {
    pub(crate) fn new(buffer: B, format: Option<SideFormat>) -> Self {
        let slots = match format {
            Some(SideFormat {
                layout: ChannelLayout::NonInterleaved,
                channels,
                ..
            }) => channels,
            _ => 0,
        };
        Self {
            buffer,
            format,
            channel_pointers: vec![std::ptr::null_mut(); slots].into_boxed_slice(),
        }
    }

    /// Validates the buffer for one transfer.
    ///
    /// A side the stream does not use fails with the engine's own code, without a native call.
    pub(crate) fn prepare(&mut self, side: Side) -> StreamResult<(*mut c_void, usize)> {
        let Some(format) = self.format else {
            let code = match side {
                Side::Input => ErrorCode::CanNotReadFromAnOutputOnlyStream,
                Side::Output => ErrorCode::CanNotWriteToAnInputOnlyStream,
            };
            return Err(NativeError::Code(code).into());
        };
        self.buffer
            .prepare(side, format.channels, &mut self.channel_pointers)
    }
}
