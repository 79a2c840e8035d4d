//! An in-process [`NativeEngine`] for tests.
//!
//! Records every call, lets tests inject failures, fires callbacks on demand and emulates a
//! bounded output queue so blocking writes actually block.

use std::collections::HashMap;
use std::ffi::{c_int, c_ulong, c_void};
use std::slice;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use bytemuck::Pod;
use parking_lot::{Condvar, Mutex};

use crate::ChannelLayout;
use crate::host::native::{CallbackTarget, NativeSideParams, OpenRequest, RawTimeInfo};
use crate::host::{
    DeviceInfo, ErrorCode, HostApiInfo, HostApiType, NativeEngine, NativeError, NativeResult,
    StreamDeviceParameters, StreamFlags, StreamInfo, StreamParameters,
};
use crate::repr::SampleEncoding;

/// A native call made on the mock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Call {
    Initialize,
    Terminate,
    FormatQuery,
    Open,
    Start(usize),
    Stop(usize),
    Abort(usize),
    Close(usize),
    Read(usize, usize),
    Write(usize, usize),
}

/// What the mock was asked to open.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RecordedOpen {
    pub input: Option<NativeSideParams>,
    pub output: Option<NativeSideParams>,
    pub sample_rate: f64,
    pub frames_per_buffer: usize,
    pub flags: StreamFlags,
    pub has_callback: bool,
}

#[derive(Default)]
struct Settings {
    no_default_devices: bool,
    fail_initialize: Option<NativeError>,
    fail_open: Option<NativeError>,
    fail_start: Option<NativeError>,
    fail_close: Option<NativeError>,
    unsupported: Option<SampleEncoding>,
    write_capacity: Option<usize>,
}

struct Queue {
    pending: usize,
    halted: bool,
    waiting: usize,
    written: Vec<u8>,
}

struct MockStream {
    input: Option<NativeSideParams>,
    output: Option<NativeSideParams>,
    sample_rate: f64,
    callback: Mutex<Option<CallbackTarget>>,
    running: AtomicBool,
    frames: AtomicUsize,
    capacity: usize,
    queue: Mutex<Queue>,
    drained: Condvar,
    blocked: Condvar,
}

/// Native stream resource of the mock.
pub(crate) struct MockStreamHandle {
    id: usize,
    shared: Arc<MockStream>,
}

struct MockState {
    host_apis: Vec<HostApiInfo>,
    devices: Vec<DeviceInfo>,
    settings: Mutex<Settings>,
    calls: Mutex<Vec<Call>>,
    streams: Mutex<HashMap<usize, Arc<MockStream>>>,
    last_opened: Mutex<Option<RecordedOpen>>,
    last_stream: Mutex<Option<usize>>,
    next_id: AtomicUsize,
    initialized: AtomicUsize,
}

/// Cloneable handle to one mock engine; clones share all state.
#[derive(Clone)]
pub(crate) struct MockEngine {
    state: Arc<MockState>,
}

fn latencies(index: usize, name: &str, host_api: usize) -> DeviceInfo {
    DeviceInfo {
        index,
        name: name.to_string(),
        host_api,
        max_input_channels: 0,
        max_output_channels: 0,
        default_low_input_latency: Duration::from_millis(5),
        default_low_output_latency: Duration::from_millis(6),
        default_high_input_latency: Duration::from_millis(40),
        default_high_output_latency: Duration::from_millis(50),
        default_sample_rate: 44_100.0,
    }
}

/// A standalone device description on host API 0.
pub(crate) fn device(
    index: usize,
    name: &str,
    max_input_channels: usize,
    max_output_channels: usize,
    default_sample_rate: f64,
) -> Arc<DeviceInfo> {
    Arc::new(DeviceInfo {
        max_input_channels,
        max_output_channels,
        default_sample_rate,
        ..latencies(index, name, 0)
    })
}

fn catalog_devices() -> Vec<DeviceInfo> {
    vec![
        DeviceInfo {
            max_input_channels: 2,
            ..latencies(0, "Built-in Mic", 0)
        },
        DeviceInfo {
            max_output_channels: 2,
            ..latencies(1, "Built-in Output", 0)
        },
        DeviceInfo {
            max_input_channels: 8,
            max_output_channels: 8,
            default_sample_rate: 48_000.0,
            ..latencies(2, "USB Interface", 1)
        },
    ]
}

fn catalog_device(index: usize) -> Arc<DeviceInfo> {
    let mut devices = catalog_devices();
    Arc::new(devices.swap_remove(index))
}

fn side(index: usize, channels: usize) -> StreamDeviceParameters {
    let device = catalog_device(index);
    let latency = device.default_low_output_latency;
    StreamDeviceParameters::new(device, channels, latency)
}

/// Output-only parameters on "Built-in Output".
pub(crate) fn output_only(channels: usize) -> StreamParameters {
    StreamParameters {
        output: side(1, channels),
        sample_rate: 44_100.0,
        ..StreamParameters::default()
    }
}

/// Input-only parameters on "Built-in Mic".
pub(crate) fn input_only(channels: usize) -> StreamParameters {
    StreamParameters {
        input: side(0, channels),
        sample_rate: 44_100.0,
        ..StreamParameters::default()
    }
}

/// Full-duplex parameters on "USB Interface".
pub(crate) fn duplex_params(input: usize, output: usize) -> StreamParameters {
    StreamParameters {
        input: side(2, input),
        output: side(2, output),
        sample_rate: 48_000.0,
        ..StreamParameters::default()
    }
}

/// Writes a recognizable sample value in `encoding` at the start of `out`.
fn encode(encoding: SampleEncoding, value: i32, out: &mut [u8]) {
    match encoding {
        SampleEncoding::Float32 => out[..4].copy_from_slice(&(value as f32).to_ne_bytes()),
        SampleEncoding::Int32 => out[..4].copy_from_slice(&value.to_ne_bytes()),
        SampleEncoding::Int24 => out[..3].copy_from_slice(&value.to_le_bytes()[..3]),
        SampleEncoding::Int16 => out[..2].copy_from_slice(&(value as i16).to_ne_bytes()),
        SampleEncoding::Int8 => out[0] = value as i8 as u8,
        SampleEncoding::UInt8 => out[0] = value as u8,
    }
}

/// Value of the sample at (`frame`, `channel`) produced by the mock's capture side.
pub(crate) fn captured_value(frame: usize, channel: usize) -> i32 {
    (frame + 100 * channel) as i32
}

/// Channel byte slices of a side buffer in the engine's layout.
///
/// # Safety
///
/// `raw` must be laid out per `params` for `frames` frames.
unsafe fn channel_slices<'a>(
    params: &NativeSideParams,
    raw: *mut c_void,
    frames: usize,
) -> Vec<&'a mut [u8]> {
    let size = params.encoding.size_bytes();
    match params.layout {
        ChannelLayout::Interleaved => {
            vec![unsafe { slice::from_raw_parts_mut(raw.cast::<u8>(), frames * params.channels * size) }]
        }
        ChannelLayout::NonInterleaved => {
            let pointers = unsafe { slice::from_raw_parts(raw.cast::<*mut u8>(), params.channels) };
            pointers
                .iter()
                .map(|&channel| unsafe { slice::from_raw_parts_mut(channel, frames * size) })
                .collect()
        }
    }
}

/// Fills a side buffer with [`captured_value`]s, frames counted from `first_frame`.
unsafe fn fill_capture(params: &NativeSideParams, raw: *mut c_void, frames: usize, first_frame: usize) {
    let size = params.encoding.size_bytes();
    let mut slices = unsafe { channel_slices(params, raw, frames) };
    for frame in 0..frames {
        for channel in 0..params.channels {
            let value = captured_value(first_frame + frame, channel);
            let slot = match params.layout {
                ChannelLayout::Interleaved => &mut slices[0][(frame * params.channels + channel) * size..],
                ChannelLayout::NonInterleaved => &mut slices[channel][frame * size..],
            };
            encode(params.encoding, value, slot);
        }
    }
}

/// Copies a side buffer out in interleaved order.
unsafe fn collect_interleaved(params: &NativeSideParams, raw: *mut c_void, frames: usize) -> Vec<u8> {
    let size = params.encoding.size_bytes();
    let slices = unsafe { channel_slices(params, raw, frames) };
    let mut out = Vec::with_capacity(frames * params.channels * size);
    for frame in 0..frames {
        for channel in 0..params.channels {
            let offset = match params.layout {
                ChannelLayout::Interleaved => (frame * params.channels + channel) * size,
                ChannelLayout::NonInterleaved => frame * size,
            };
            let slice = match params.layout {
                ChannelLayout::Interleaved => &slices[0],
                ChannelLayout::NonInterleaved => &slices[channel],
            };
            out.extend_from_slice(&slice[offset..offset + size]);
        }
    }
    out
}

/// Engine-owned scratch memory for one side of a fired callback.
struct Scratch {
    data: Vec<Vec<u8>>,
    pointers: Vec<*mut c_void>,
    layout: ChannelLayout,
}

impl Scratch {
    fn new(params: Option<&NativeSideParams>, frames: usize) -> Option<Self> {
        let params = params?;
        let size = params.encoding.size_bytes();
        let mut data = match params.layout {
            ChannelLayout::Interleaved => vec![vec![0u8; frames * params.channels * size]],
            ChannelLayout::NonInterleaved => vec![vec![0u8; frames * size]; params.channels],
        };
        let pointers = data.iter_mut().map(|c| c.as_mut_ptr().cast()).collect();
        Some(Self {
            data,
            pointers,
            layout: params.layout,
        })
    }

    fn raw(&mut self) -> *mut c_void {
        match self.layout {
            ChannelLayout::Interleaved => self.data[0].as_mut_ptr().cast(),
            ChannelLayout::NonInterleaved => self.pointers.as_mut_ptr().cast(),
        }
    }
}

/// Result of one fired callback.
#[derive(Debug)]
pub(crate) struct FiredBlock {
    pub code: c_int,
    /// Output samples in interleaved order, empty without an output side.
    pub output: Vec<u8>,
}

impl FiredBlock {
    pub(crate) fn samples<T: Pod>(&self) -> Vec<T> {
        bytemuck::pod_collect_to_vec(&self.output)
    }
}

impl MockEngine {
    pub(crate) fn new() -> Self {
        let host_apis = vec![
            HostApiInfo {
                index: 0,
                api_type: HostApiType::Alsa,
                name: "ALSA".to_string(),
                devices: vec![0, 1],
                default_input_device: Some(0),
                default_output_device: Some(1),
            },
            HostApiInfo {
                index: 1,
                api_type: HostApiType::Jack,
                name: "JACK Audio Connection Kit".to_string(),
                devices: vec![2],
                default_input_device: Some(2),
                default_output_device: Some(2),
            },
        ];
        Self {
            state: Arc::new(MockState {
                host_apis,
                devices: catalog_devices(),
                settings: Mutex::new(Settings::default()),
                calls: Mutex::new(Vec::new()),
                streams: Mutex::new(HashMap::new()),
                last_opened: Mutex::new(None),
                last_stream: Mutex::new(None),
                next_id: AtomicUsize::new(1),
                initialized: AtomicUsize::new(0),
            }),
        }
    }

    pub(crate) fn without_default_devices(self) -> Self {
        self.state.settings.lock().no_default_devices = true;
        self
    }

    /// Output queue size in frames; writes beyond it block until drained or halted.
    pub(crate) fn with_write_capacity(self, frames: usize) -> Self {
        self.state.settings.lock().write_capacity = Some(frames);
        self
    }

    pub(crate) fn fail_initialize(&self, error: Option<NativeError>) {
        self.state.settings.lock().fail_initialize = error;
    }

    pub(crate) fn fail_open(&self, error: Option<NativeError>) {
        self.state.settings.lock().fail_open = error;
    }

    pub(crate) fn fail_start(&self, error: Option<NativeError>) {
        self.state.settings.lock().fail_start = error;
    }

    pub(crate) fn fail_close(&self, error: Option<NativeError>) {
        self.state.settings.lock().fail_close = error;
    }

    pub(crate) fn reject_encoding(&self, encoding: Option<SampleEncoding>) {
        self.state.settings.lock().unsupported = encoding;
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.state.calls.lock().clone()
    }

    pub(crate) fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.state.calls.lock().iter().filter(|call| predicate(call)).count()
    }

    /// Open attempts, successful or not.
    pub(crate) fn opens(&self) -> usize {
        self.count(|call| *call == Call::Open)
    }

    pub(crate) fn last_opened(&self) -> Option<RecordedOpen> {
        self.state.last_opened.lock().clone()
    }

    /// Id of the most recently opened native stream.
    pub(crate) fn last_stream(&self) -> Option<usize> {
        *self.state.last_stream.lock()
    }

    pub(crate) fn open_streams(&self) -> usize {
        self.state.streams.lock().len()
    }

    pub(crate) fn is_initialized(&self) -> bool {
        self.state.initialized.load(Ordering::SeqCst) > 0
    }

    pub(crate) fn is_running(&self, id: usize) -> bool {
        self.stream(id)
            .is_some_and(|stream| stream.running.load(Ordering::SeqCst))
    }

    fn stream(&self, id: usize) -> Option<Arc<MockStream>> {
        self.state.streams.lock().get(&id).cloned()
    }

    fn record(&self, call: Call) {
        self.state.calls.lock().push(call);
    }

    /// Delivers one block to a running callback stream, as the realtime thread would.
    pub(crate) fn fire(
        &self,
        id: usize,
        frames: usize,
        time_info: RawTimeInfo,
        status: u64,
    ) -> NativeResult<FiredBlock> {
        let stream = self.stream(id).ok_or(ErrorCode::BadStreamPtr)?;
        if !stream.running.load(Ordering::SeqCst) {
            return Err(ErrorCode::StreamIsStopped.into());
        }
        let target = (*stream.callback.lock()).ok_or(ErrorCode::CanNotReadFromACallbackStream)?;

        let first_frame = stream.frames.fetch_add(frames, Ordering::SeqCst);
        let mut input = Scratch::new(stream.input.as_ref(), frames);
        let mut output = Scratch::new(stream.output.as_ref(), frames);
        let input_raw = input.as_mut().map_or(std::ptr::null_mut(), Scratch::raw);
        let output_raw = output.as_mut().map_or(std::ptr::null_mut(), Scratch::raw);
        if let Some(params) = &stream.input {
            // SAFETY: scratch memory sized for `params` and `frames`.
            unsafe { fill_capture(params, input_raw, frames, first_frame) };
        }

        // SAFETY: buffers are laid out per the stream's sides; `user_data` is the target the
        // stream was opened with and the stream is open.
        let code = unsafe {
            (target.entry)(
                input_raw.cast_const(),
                output_raw,
                frames as c_ulong,
                &time_info,
                status as c_ulong,
                target.user_data,
            )
        };
        let output = match &stream.output {
            // SAFETY: as above.
            Some(params) => unsafe { collect_interleaved(params, output_raw, frames) },
            None => Vec::new(),
        };
        Ok(FiredBlock { code, output })
    }

    pub(crate) fn fire_block(&self, id: usize, frames: usize) -> NativeResult<FiredBlock> {
        self.fire(id, frames, RawTimeInfo::default(), 0)
    }

    /// Bytes written to a blocking stream so far, interleaved.
    pub(crate) fn written<T: Pod>(&self, id: usize) -> Vec<T> {
        self.stream(id)
            .map(|stream| bytemuck::pod_collect_to_vec(&stream.queue.lock().written))
            .unwrap_or_default()
    }

    /// Blocks until a writer on stream `id` is waiting for queue space.
    pub(crate) fn wait_for_blocked_writer(&self, id: usize) {
        let Some(stream) = self.stream(id) else {
            return;
        };
        let mut queue = stream.queue.lock();
        while queue.waiting == 0 {
            stream.blocked.wait(&mut queue);
        }
    }

    /// Plays out everything queued on stream `id`, releasing blocked writers.
    pub(crate) fn drain(&self, id: usize) {
        if let Some(stream) = self.stream(id) {
            stream.queue.lock().pending = 0;
            stream.drained.notify_all();
        }
    }

    /// Stops stream `id` from the engine side; blocked writers fail.
    pub(crate) fn halt(&self, id: usize) {
        if let Some(stream) = self.stream(id) {
            stream.running.store(false, Ordering::SeqCst);
            stream.queue.lock().halted = true;
            stream.drained.notify_all();
        }
    }

    fn check_side(&self, side: Option<&NativeSideParams>, input: bool) -> NativeResult<()> {
        let Some(side) = side else {
            return Ok(());
        };
        let device = self
            .state
            .devices
            .get(side.device)
            .ok_or(ErrorCode::InvalidDevice)?;
        let max = if input {
            device.max_input_channels
        } else {
            device.max_output_channels
        };
        if side.channels == 0 || side.channels > max {
            return Err(ErrorCode::InvalidChannelCount.into());
        }
        if self.state.settings.lock().unsupported == Some(side.encoding) {
            return Err(ErrorCode::SampleFormatNotSupported.into());
        }
        Ok(())
    }

    fn check_format(
        &self,
        input: Option<&NativeSideParams>,
        output: Option<&NativeSideParams>,
        sample_rate: f64,
    ) -> NativeResult<()> {
        if !self.is_initialized() {
            return Err(ErrorCode::NotInitialized.into());
        }
        if input.is_none() && output.is_none() {
            return Err(ErrorCode::BadIODeviceCombination.into());
        }
        self.check_side(input, true)?;
        self.check_side(output, false)?;
        if sample_rate.is_nan() || sample_rate <= 0.0 {
            return Err(ErrorCode::InvalidSampleRate.into());
        }
        Ok(())
    }
}

impl NativeEngine for MockEngine {
    type Stream = MockStreamHandle;

    fn initialize(&self) -> NativeResult<()> {
        self.record(Call::Initialize);
        if let Some(err) = self.state.settings.lock().fail_initialize.clone() {
            return Err(err);
        }
        self.state.initialized.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn terminate(&self) -> NativeResult<()> {
        self.record(Call::Terminate);
        self.state
            .initialized
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .map(|_| ())
            .map_err(|_| ErrorCode::NotInitialized.into())
    }

    fn version(&self) -> i32 {
        1900
    }

    fn version_text(&self) -> String {
        "MockAudio V19.0".to_string()
    }

    fn host_apis(&self) -> NativeResult<Vec<HostApiInfo>> {
        Ok(self.state.host_apis.clone())
    }

    fn devices(&self) -> NativeResult<Vec<DeviceInfo>> {
        Ok(self.state.devices.clone())
    }

    fn default_host_api(&self) -> NativeResult<usize> {
        Ok(0)
    }

    fn default_input_device(&self) -> Option<usize> {
        (!self.state.settings.lock().no_default_devices).then_some(0)
    }

    fn default_output_device(&self) -> Option<usize> {
        (!self.state.settings.lock().no_default_devices).then_some(1)
    }

    fn is_format_supported(
        &self,
        input: Option<&NativeSideParams>,
        output: Option<&NativeSideParams>,
        sample_rate: f64,
    ) -> NativeResult<()> {
        self.record(Call::FormatQuery);
        self.check_format(input, output, sample_rate)
    }

    fn open_stream(&self, request: OpenRequest) -> NativeResult<Self::Stream> {
        self.record(Call::Open);
        *self.state.last_opened.lock() = Some(RecordedOpen {
            input: request.input,
            output: request.output,
            sample_rate: request.sample_rate,
            frames_per_buffer: request.frames_per_buffer,
            flags: request.flags,
            has_callback: request.callback.is_some(),
        });
        if let Some(err) = self.state.settings.lock().fail_open.clone() {
            return Err(err);
        }
        self.check_format(request.input.as_ref(), request.output.as_ref(), request.sample_rate)?;

        let id = self.state.next_id.fetch_add(1, Ordering::SeqCst);
        let capacity = self.state.settings.lock().write_capacity.unwrap_or(usize::MAX);
        let shared = Arc::new(MockStream {
            input: request.input,
            output: request.output,
            sample_rate: request.sample_rate,
            callback: Mutex::new(request.callback),
            running: AtomicBool::new(false),
            frames: AtomicUsize::new(0),
            capacity,
            queue: Mutex::new(Queue {
                pending: 0,
                halted: false,
                waiting: 0,
                written: Vec::new(),
            }),
            drained: Condvar::new(),
            blocked: Condvar::new(),
        });
        self.state.streams.lock().insert(id, Arc::clone(&shared));
        *self.state.last_stream.lock() = Some(id);
        Ok(MockStreamHandle { id, shared })
    }

    fn start_stream(&self, stream: &mut Self::Stream) -> NativeResult<()> {
        self.record(Call::Start(stream.id));
        if let Some(err) = self.state.settings.lock().fail_start.clone() {
            return Err(err);
        }
        if stream.shared.running.swap(true, Ordering::SeqCst) {
            return Err(ErrorCode::StreamIsNotStopped.into());
        }
        stream.shared.queue.lock().halted = false;
        Ok(())
    }

    fn stop_stream(&self, stream: &mut Self::Stream) -> NativeResult<()> {
        self.record(Call::Stop(stream.id));
        if !stream.shared.running.swap(false, Ordering::SeqCst) {
            return Err(ErrorCode::StreamIsStopped.into());
        }
        stream.shared.queue.lock().pending = 0;
        Ok(())
    }

    fn abort_stream(&self, stream: &mut Self::Stream) -> NativeResult<()> {
        self.record(Call::Abort(stream.id));
        if !stream.shared.running.swap(false, Ordering::SeqCst) {
            return Err(ErrorCode::StreamIsStopped.into());
        }
        stream.shared.queue.lock().pending = 0;
        Ok(())
    }

    fn close_stream(&self, stream: &mut Self::Stream) -> NativeResult<()> {
        self.record(Call::Close(stream.id));
        if let Some(err) = self.state.settings.lock().fail_close.clone() {
            return Err(err);
        }
        stream.shared.running.store(false, Ordering::SeqCst);
        stream.shared.callback.lock().take();
        self.state.streams.lock().remove(&stream.id);
        Ok(())
    }

    unsafe fn read_stream(
        &self,
        stream: &mut Self::Stream,
        buffer: *mut c_void,
        frames: usize,
    ) -> NativeResult<()> {
        self.record(Call::Read(stream.id, frames));
        let shared = &stream.shared;
        let params = shared
            .input
            .as_ref()
            .ok_or(ErrorCode::CanNotReadFromAnOutputOnlyStream)?;
        if !shared.running.load(Ordering::SeqCst) {
            return Err(ErrorCode::StreamIsStopped.into());
        }
        let first_frame = shared.frames.fetch_add(frames, Ordering::SeqCst);
        // SAFETY: forwarded from the caller.
        unsafe { fill_capture(params, buffer, frames, first_frame) };
        Ok(())
    }

    unsafe fn write_stream(
        &self,
        stream: &mut Self::Stream,
        buffer: *const c_void,
        frames: usize,
    ) -> NativeResult<()> {
        self.record(Call::Write(stream.id, frames));
        let shared = &stream.shared;
        let params = shared
            .output
            .as_ref()
            .ok_or(ErrorCode::CanNotWriteToAnInputOnlyStream)?;
        if !shared.running.load(Ordering::SeqCst) {
            return Err(ErrorCode::StreamIsStopped.into());
        }
        // SAFETY: forwarded from the caller; only read.
        let bytes = unsafe { collect_interleaved(params, buffer.cast_mut(), frames) };

        let mut queue = shared.queue.lock();
        queue.written.extend_from_slice(&bytes);
        queue.pending += frames;
        while queue.pending > shared.capacity && !queue.halted {
            queue.waiting += 1;
            shared.blocked.notify_all();
            shared.drained.wait(&mut queue);
            queue.waiting -= 1;
        }
        if queue.halted {
            return Err(ErrorCode::StreamIsStopped.into());
        }
        shared.frames.fetch_add(frames, Ordering::SeqCst);
        Ok(())
    }

    fn read_available(&self, stream: &Self::Stream) -> NativeResult<usize> {
        if stream.shared.input.is_none() {
            return Err(ErrorCode::CanNotReadFromAnOutputOnlyStream.into());
        }
        Ok(1024)
    }

    fn write_available(&self, stream: &Self::Stream) -> NativeResult<usize> {
        if stream.shared.output.is_none() {
            return Err(ErrorCode::CanNotWriteToAnInputOnlyStream.into());
        }
        let pending = stream.shared.queue.lock().pending;
        Ok(stream.shared.capacity.saturating_sub(pending).min(1 << 20))
    }

    fn stream_info(&self, stream: &Self::Stream) -> Option<StreamInfo> {
        let shared = &stream.shared;
        Some(StreamInfo {
            input_latency: shared.input.map_or(Duration::ZERO, |side| side.latency),
            output_latency: shared.output.map_or(Duration::ZERO, |side| side.latency),
            sample_rate: shared.sample_rate,
        })
    }

    fn stream_time(&self, stream: &Self::Stream) -> Duration {
        let frames = stream.shared.frames.load(Ordering::SeqCst);
        Duration::from_secs_f64(frames as f64 / stream.shared.sample_rate)
    }

    fn cpu_load(&self, stream: &Self::Stream) -> f64 {
        if stream.shared.callback.lock().is_some() {
            0.25
        } else {
            0.0
        }
    }
}
