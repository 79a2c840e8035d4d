//! Callback signatures for realtime streams.
//!
//! A stream callback declares its buffers first, then optionally a [`TimeInfo`] and then a
//! [`StatusFlags`]. Closures with any of these shapes implement [`StreamCallback`]:
//!
//! | Closure parameters | Marker |
//! |---|---|
//! | `(&mut B)` | [`OneBuffer<B>`] |
//! | `(&mut B, &TimeInfo)` | [`OneBufferTimed<B>`] |
//! | `(&mut B, &TimeInfo, StatusFlags)` | [`OneBufferFlagged<B>`] |
//! | `(&mut I, &mut O)` | [`TwoBuffers<I, O>`] |
//! | `(&mut I, &mut O, &TimeInfo)` | [`TwoBuffersTimed<I, O>`] |
//! | `(&mut I, &mut O, &TimeInfo, StatusFlags)` | [`TwoBuffersFlagged<I, O>`] |
//!
//! where `B`, `I` and `O` are [`Interleaved`](crate::Interleaved) or
//! [`NonInterleaved`](crate::NonInterleaved) views. The marker type parameter only exists to
//! keep the closure implementations apart; it is inferred and never named by callers.
//!
//! Processor types can implement [`StreamCallback`] directly.

use std::marker::PhantomData;
use std::time::Duration;

use bitflags::bitflags;

use crate::Side;
use crate::format::{CallbackSignature, ParamShape};
use crate::host::native::RawTimeInfo;
use crate::views::BufferView;

/// Engine timestamps for the current block, on the stream's clock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeInfo {
    /// Capture time of the first input sample.
    pub input_buffer_adc_time: Duration,
    /// Time the callback was invoked.
    pub current_time: Duration,
    /// Time the first output sample will reach the DAC.
    pub output_buffer_dac_time: Duration,
}

impl TimeInfo {
    /// Converts the engine's seconds into durations.
    ///
    /// Negative or non-finite values become zero; this runs on the realtime thread and must
    /// not panic.
    pub fn from_raw(raw: &RawTimeInfo) -> Self {
        Self {
            input_buffer_adc_time: seconds(raw.input_buffer_adc_time),
            current_time: seconds(raw.current_time),
            output_buffer_dac_time: seconds(raw.output_buffer_dac_time),
        }
    }
}

pub(crate) fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

bitflags! {
    /// Conditions the engine reports for the current block.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct StatusFlags: u64 {
        /// Input data is all silence because of an input underflow.
        const INPUT_UNDERFLOW = 0x01;
        /// Input data was discarded before this block.
        const INPUT_OVERFLOW = 0x02;
        /// Output was inserted (silence) before this block.
        const OUTPUT_UNDERFLOW = 0x04;
        /// Output data will be discarded.
        const OUTPUT_OVERFLOW = 0x08;
        /// Output is being primed; input is not valid.
        const PRIMING_OUTPUT = 0x10;
    }
}

/// Everything a callback sees for one block.
///
/// `input` and `output` are always present. For one-buffer callbacks both have the same type
/// and [`Block::single`] says which of them is bound to the declared parameter.
pub struct Block<'a, I, O> {
    /// Input view. Empty if the stream has no input side.
    pub input: &'a mut I,
    /// Output view. Empty if the stream has no output side.
    pub output: &'a mut O,
    /// Side bound to the only buffer parameter of a one-buffer callback.
    pub single: Side,
    /// Timestamps, populated only if the callback declares them.
    pub time_info: &'a TimeInfo,
    /// Status, populated only if the callback declares it.
    pub status: StatusFlags,
}

/// A realtime processing callback.
///
/// Implemented for closures of the shapes listed in the [module docs](self). Implementations
/// must not block, allocate or perform I/O if glitch-free audio matters, and must not panic:
/// a panic aborts the process.
pub trait StreamCallback<Marker>: Send + 'static {
    /// Input view type.
    type Input: BufferView;
    /// Output view type.
    type Output: BufferView;

    /// The declared parameter shapes.
    fn signature() -> CallbackSignature;

    /// Processes one block.
    fn process(&mut self, block: Block<'_, Self::Input, Self::Output>);
}

/// Marker for `(&mut B)` callbacks.
pub struct OneBuffer<B>(PhantomData<fn() -> B>);
/// Marker for `(&mut B, &TimeInfo)` callbacks.
pub struct OneBufferTimed<B>(PhantomData<fn() -> B>);
/// Marker for `(&mut B, &TimeInfo, StatusFlags)` callbacks.
pub struct OneBufferFlagged<B>(PhantomData<fn() -> B>);
/// Marker for `(&mut I, &mut O)` callbacks.
pub struct TwoBuffers<I, O>(PhantomData<fn() -> (I, O)>);
/// Marker for `(&mut I, &mut O, &TimeInfo)` callbacks.
pub struct TwoBuffersTimed<I, O>(PhantomData<fn() -> (I, O)>);
/// Marker for `(&mut I, &mut O, &TimeInfo, StatusFlags)` callbacks.
pub struct TwoBuffersFlagged<I, O>(PhantomData<fn() -> (I, O)>);

/// Picks the view bound to a one-buffer callback.
fn single<'a, B>(block: Block<'a, B, B>) -> &'a mut B {
    match block.single {
        Side::Input => block.input,
        Side::Output => block.output,
    }
}

impl<F, B> StreamCallback<OneBuffer<B>> for F
where
    F: FnMut(&mut B) + Send + 'static,
    B: BufferView,
{
    type Input = B;
    type Output = B;

    fn signature() -> CallbackSignature {
        CallbackSignature::new(vec![ParamShape::Buffer(B::shape())])
    }

    fn process(&mut self, block: Block<'_, B, B>) {
        self(single(block))
    }
}

impl<F, B> StreamCallback<OneBufferTimed<B>> for F
where
    F: FnMut(&mut B, &TimeInfo) + Send + 'static,
    B: BufferView,
{
    type Input = B;
    type Output = B;

    fn signature() -> CallbackSignature {
        CallbackSignature::new(vec![ParamShape::Buffer(B::shape()), ParamShape::TimeInfo])
    }

    fn process(&mut self, block: Block<'_, B, B>) {
        let time_info = block.time_info;
        self(single(block), time_info)
    }
}

impl<F, B> StreamCallback<OneBufferFlagged<B>> for F
where
    F: FnMut(&mut B, &TimeInfo, StatusFlags) + Send + 'static,
    B: BufferView,
{
    type Input = B;
    type Output = B;

    fn signature() -> CallbackSignature {
        CallbackSignature::new(vec![
            ParamShape::Buffer(B::shape()),
            ParamShape::TimeInfo,
            ParamShape::StatusFlags,
        ])
    }

    fn process(&mut self, block: Block<'_, B, B>) {
        let (time_info, status) = (block.time_info, block.status);
        self(single(block), time_info, status)
    }
}

impl<F, I, O> StreamCallback<TwoBuffers<I, O>> for F
where
    F: FnMut(&mut I, &mut O) + Send + 'static,
    I: BufferView,
    O: BufferView,
{
    type Input = I;
    type Output = O;

    fn signature() -> CallbackSignature {
        CallbackSignature::new(vec![
            ParamShape::Buffer(I::shape()),
            ParamShape::Buffer(O::shape()),
        ])
    }

    fn process(&mut self, block: Block<'_, I, O>) {
        self(block.input, block.output)
    }
}

impl<F, I, O> StreamCallback<TwoBuffersTimed<I, O>> for F
where
    F: FnMut(&mut I, &mut O, &TimeInfo) + Send + 'static,
    I: BufferView,
    O: BufferView,
{
    type Input = I;
    type Output = O;

    fn signature() -> CallbackSignature {
        CallbackSignature::new(vec![
            ParamShape::Buffer(I::shape()),
            ParamShape::Buffer(O::shape()),
            ParamShape::TimeInfo,
        ])
    }

    fn process(&mut self, block: Block<'_, I, O>) {
        self(block.input, block.output, block.time_info)
    }
}

impl<F, I, O> StreamCallback<TwoBuffersFlagged<I, O>> for F
where
    F: FnMut(&mut I, &mut O, &TimeInfo, StatusFlags) + Send + 'static,
    I: BufferView,
    O: BufferView,
{
    type Input = I;
    type Output = O;

    fn signature() -> CallbackSignature {
        CallbackSignature::new(vec![
            ParamShape::Buffer(I::shape()),
            ParamShape::Buffer(O::shape()),
            ParamShape::TimeInfo,
            ParamShape::StatusFlags,
        ])
    }

    fn process(&mut self, block: Block<'_, I, O>) {
        self(block.input, block.output, block.time_info, block.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::BufferShape;
    use crate::views::{Interleaved, NonInterleaved};
    use crate::{ChannelLayout, ElementShape};

    fn signature_of<F: StreamCallback<M>, M>(_: &F) -> CallbackSignature {
        F::signature()
    }

    #[test]
    fn closure_shapes_follow_declaration_order() {
        let duplex = |_: &mut Interleaved<f32>, _: &mut NonInterleaved<i16>, _: &TimeInfo| {};
        assert_eq!(
            signature_of(&duplex).params,
            vec![
                ParamShape::Buffer(BufferShape::buffer(
                    ElementShape::F32,
                    ChannelLayout::Interleaved
                )),
                ParamShape::Buffer(BufferShape::buffer(
                    ElementShape::I16,
                    ChannelLayout::NonInterleaved
                )),
                ParamShape::TimeInfo,
            ]
        );

        let mono = |_: &mut NonInterleaved<u8>, _: &TimeInfo, _: StatusFlags| {};
        assert_eq!(
            signature_of(&mono).params,
            vec![
                ParamShape::Buffer(BufferShape::buffer(
                    ElementShape::U8,
                    ChannelLayout::NonInterleaved
                )),
                ParamShape::TimeInfo,
                ParamShape::StatusFlags,
            ]
        );
        assert!(!signature_of(&mono).returns_value);
    }

    #[test]
    fn time_info_tolerates_garbage() {
        let raw = RawTimeInfo {
            input_buffer_adc_time: -1.0,
            current_time: f64::NAN,
            output_buffer_dac_time: 2.5,
        };
        let info = TimeInfo::from_raw(&raw);
        assert_eq!(info.input_buffer_adc_time, Duration::ZERO);
        assert_eq!(info.current_time, Duration::ZERO);
        assert_eq!(info.output_buffer_dac_time, Duration::from_millis(2500));
    }

    #[test]
    fn status_flags_truncate_unknown_bits() {
        let flags = StatusFlags::from_bits_truncate(0x04 | 0x100);
        assert_eq!(flags, StatusFlags::OUTPUT_UNDERFLOW);
    }
}
