//! The contract between this crate and a native realtime audio engine.
//!
//! Everything above this trait is engine-agnostic. The `portaudio` feature provides an FFI
//! implementation; tests drive the crate through a mock.

use std::ffi::{c_int, c_ulong, c_void};
use std::fmt;
use std::time::Duration;

use super::devices::{DeviceInfo, HostApiInfo};
use super::error::NativeResult;
use super::params::{StreamFlags, StreamInfo};
use crate::ChannelLayout;
use crate::repr::SampleEncoding;

/// Engine timestamps in seconds, laid out as the engine passes them to callbacks.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RawTimeInfo {
    /// Capture time of the first input sample.
    pub input_buffer_adc_time: f64,
    /// Time the callback was invoked.
    pub current_time: f64,
    /// Time the first output sample will reach the DAC.
    pub output_buffer_dac_time: f64,
}

/// Native callback entry point.
///
/// Receives the input and output buffers (flat sample pointers for interleaved sides, pointers
/// to arrays of channel pointers for non-interleaved sides, null for unused sides), the frame
/// count of the block, the block's timestamps, the status flags and the `user_data` registered
/// with the stream. Returns the continuation code, `0` to continue.
pub type CallbackEntry = unsafe extern "C" fn(
    input: *const c_void,
    output: *mut c_void,
    frames: c_ulong,
    time_info: *const RawTimeInfo,
    status: c_ulong,
    user_data: *mut c_void,
) -> c_int;

/// Continuation code returned by the callback entry point.
pub const CALLBACK_CONTINUE: c_int = 0;

/// Where the engine should deliver blocks of a callback stream.
#[derive(Clone, Copy)]
pub struct CallbackTarget {
    /// Entry point.
    pub entry: CallbackEntry,
    /// Opaque pointer passed back on every invocation.
    pub user_data: *mut c_void,
}

// SAFETY: `user_data` points to a heap allocation owned by the stream that outlives the native
// stream; the engine only passes it back to `entry`.
unsafe impl Send for CallbackTarget {}

impl fmt::Debug for CallbackTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackTarget")
            .field("user_data", &self.user_data)
            .finish_non_exhaustive()
    }
}

/// Parameters of one side of a native stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NativeSideParams {
    /// Engine-wide device index.
    pub device: usize,
    /// Channel count.
    pub channels: usize,
    /// Sample encoding.
    pub encoding: SampleEncoding,
    /// Channel layout.
    pub layout: ChannelLayout,
    /// Suggested latency.
    pub latency: Duration,
}

/// Everything the engine needs to open a stream.
#[derive(Debug)]
pub struct OpenRequest {
    /// Input side, `None` for output-only streams.
    pub input: Option<NativeSideParams>,
    /// Output side, `None` for input-only streams.
    pub output: Option<NativeSideParams>,
    /// Sample rate in Hz.
    pub sample_rate: f64,
    /// Frames per buffer, 0 for host-chosen.
    pub frames_per_buffer: usize,
    /// Stream flags.
    pub flags: StreamFlags,
    /// Callback target, `None` for blocking streams.
    pub callback: Option<CallbackTarget>,
}

/// A native realtime audio engine.
///
/// Implementations are called from caller threads only; the realtime thread only ever runs
/// the [`CallbackEntry`] given at open time.
pub trait NativeEngine: Send + Sync + 'static {
    /// Native stream resource.
    type Stream: Send;

    /// Initializes the engine.
    fn initialize(&self) -> NativeResult<()>;

    /// Terminates the engine, closing any streams still open.
    fn terminate(&self) -> NativeResult<()>;

    /// Engine version number.
    fn version(&self) -> i32;

    /// Engine version text.
    fn version_text(&self) -> String;

    /// All host APIs.
    fn host_apis(&self) -> NativeResult<Vec<HostApiInfo>>;

    /// All devices.
    fn devices(&self) -> NativeResult<Vec<DeviceInfo>>;

    /// Index of the default host API.
    fn default_host_api(&self) -> NativeResult<usize>;

    /// Index of the default input device, if there is one.
    fn default_input_device(&self) -> Option<usize>;

    /// Index of the default output device, if there is one.
    fn default_output_device(&self) -> Option<usize>;

    /// Checks whether a stream with these parameters could be opened.
    fn is_format_supported(
        &self,
        input: Option<&NativeSideParams>,
        output: Option<&NativeSideParams>,
        sample_rate: f64,
    ) -> NativeResult<()>;

    /// Opens a stream.
    fn open_stream(&self, request: OpenRequest) -> NativeResult<Self::Stream>;

    /// Starts a stream.
    fn start_stream(&self, stream: &mut Self::Stream) -> NativeResult<()>;

    /// Stops a stream after pending buffers have played.
    fn stop_stream(&self, stream: &mut Self::Stream) -> NativeResult<()>;

    /// Stops a stream immediately, discarding pending buffers.
    fn abort_stream(&self, stream: &mut Self::Stream) -> NativeResult<()>;

    /// Closes a stream. Blocks until any callback in flight has returned.
    ///
    /// On error the stream stays open.
    fn close_stream(&self, stream: &mut Self::Stream) -> NativeResult<()>;

    /// Reads `frames` frames from a blocking stream.
    ///
    /// Blocks until the frames are available or the stream stops.
    ///
    /// # Safety
    ///
    /// `buffer` must point to writable memory laid out as the stream's input side for `frames`
    /// frames: a flat sample buffer for interleaved streams, or an array of one pointer per
    /// channel, each to `frames` samples, for non-interleaved streams.
    unsafe fn read_stream(
        &self,
        stream: &mut Self::Stream,
        buffer: *mut c_void,
        frames: usize,
    ) -> NativeResult<()>;

    /// Writes `frames` frames to a blocking stream.
    ///
    /// Blocks until the frames have been accepted or the stream stops.
    ///
    /// # Safety
    ///
    /// As [`NativeEngine::read_stream`], for the output side, and only read from.
    unsafe fn write_stream(
        &self,
        stream: &mut Self::Stream,
        buffer: *const c_void,
        frames: usize,
    ) -> NativeResult<()>;

    /// Frames that can be read without blocking.
    fn read_available(&self, stream: &Self::Stream) -> NativeResult<usize>;

    /// Frames that can be written without blocking.
    fn write_available(&self, stream: &Self::Stream) -> NativeResult<usize>;

    /// Latencies and sample rate of an open stream.
    fn stream_info(&self, stream: &Self::Stream) -> Option<StreamInfo>;

    /// Current stream time.
    fn stream_time(&self, stream: &Self::Stream) -> Duration;

    /// Fraction of the available CPU time the callback is using.
    fn cpu_load(&self, stream: &Self::Stream) -> f64;
}
