//! [`NativeEngine`] over `libportaudio` (v19).
//!
//! Enabled by the `portaudio` feature; links against the system library.

use std::ffi::{CStr, c_char, c_double, c_int, c_long, c_ulong, c_void};
use std::ptr::{self, NonNull};
use std::time::Duration;

use super::devices::{DeviceInfo, HostApiInfo, HostApiType};
use super::error::{ErrorCode, NativeError, NativeResult};
use super::native::{CallbackEntry, NativeEngine, NativeSideParams, OpenRequest};
use super::params::StreamInfo;
use crate::ChannelLayout;
use crate::callback::seconds;
use crate::repr::SampleEncoding;

type PaError = c_int;
type PaDeviceIndex = c_int;
type PaHostApiIndex = c_int;
type PaSampleFormat = c_ulong;

const PA_NO_ERROR: PaError = 0;
const PA_NO_DEVICE: PaDeviceIndex = -1;
const PA_NON_INTERLEAVED: PaSampleFormat = 0x8000_0000;

#[repr(C)]
struct PaStreamParameters {
    device: PaDeviceIndex,
    channel_count: c_int,
    sample_format: PaSampleFormat,
    suggested_latency: c_double,
    host_api_specific_stream_info: *mut c_void,
}

#[repr(C)]
struct PaDeviceInfo {
    #[allow(dead_code)]
    struct_version: c_int,
    name: *const c_char,
    host_api: PaHostApiIndex,
    max_input_channels: c_int,
    max_output_channels: c_int,
    default_low_input_latency: c_double,
    default_low_output_latency: c_double,
    default_high_input_latency: c_double,
    default_high_output_latency: c_double,
    default_sample_rate: c_double,
}

#[repr(C)]
struct PaHostApiInfo {
    #[allow(dead_code)]
    struct_version: c_int,
    type_id: c_int,
    name: *const c_char,
    device_count: c_int,
    default_input_device: PaDeviceIndex,
    default_output_device: PaDeviceIndex,
}

#[repr(C)]
struct PaStreamInfo {
    #[allow(dead_code)]
    struct_version: c_int,
    input_latency: c_double,
    output_latency: c_double,
    sample_rate: c_double,
}

#[repr(C)]
struct PaHostErrorInfo {
    host_api_type: c_int,
    error_code: c_long,
    error_text: *const c_char,
}

#[link(name = "portaudio")]
unsafe extern "C" {
    fn Pa_GetVersion() -> c_int;
    fn Pa_GetVersionText() -> *const c_char;
    fn Pa_Initialize() -> PaError;
    fn Pa_Terminate() -> PaError;
    fn Pa_GetLastHostErrorInfo() -> *const PaHostErrorInfo;

    fn Pa_GetHostApiCount() -> PaHostApiIndex;
    fn Pa_GetDefaultHostApi() -> PaHostApiIndex;
    fn Pa_GetHostApiInfo(host_api: PaHostApiIndex) -> *const PaHostApiInfo;
    fn Pa_HostApiDeviceIndexToDeviceIndex(
        host_api: PaHostApiIndex,
        host_api_device_index: c_int,
    ) -> PaDeviceIndex;

    fn Pa_GetDeviceCount() -> PaDeviceIndex;
    fn Pa_GetDefaultInputDevice() -> PaDeviceIndex;
    fn Pa_GetDefaultOutputDevice() -> PaDeviceIndex;
    fn Pa_GetDeviceInfo(device: PaDeviceIndex) -> *const PaDeviceInfo;

    fn Pa_IsFormatSupported(
        input: *const PaStreamParameters,
        output: *const PaStreamParameters,
        sample_rate: c_double,
    ) -> PaError;
    fn Pa_OpenStream(
        stream: *mut *mut c_void,
        input: *const PaStreamParameters,
        output: *const PaStreamParameters,
        sample_rate: c_double,
        frames_per_buffer: c_ulong,
        flags: c_ulong,
        callback: Option<CallbackEntry>,
        user_data: *mut c_void,
    ) -> PaError;
    fn Pa_CloseStream(stream: *mut c_void) -> PaError;
    fn Pa_StartStream(stream: *mut c_void) -> PaError;
    fn Pa_StopStream(stream: *mut c_void) -> PaError;
    fn Pa_AbortStream(stream: *mut c_void) -> PaError;
    fn Pa_GetStreamInfo(stream: *mut c_void) -> *const PaStreamInfo;
    fn Pa_GetStreamTime(stream: *mut c_void) -> c_double;
    fn Pa_GetStreamCpuLoad(stream: *mut c_void) -> c_double;
    fn Pa_ReadStream(stream: *mut c_void, buffer: *mut c_void, frames: c_ulong) -> PaError;
    fn Pa_WriteStream(stream: *mut c_void, buffer: *const c_void, frames: c_ulong) -> PaError;
    fn Pa_GetStreamReadAvailable(stream: *mut c_void) -> c_long;
    fn Pa_GetStreamWriteAvailable(stream: *mut c_void) -> c_long;
}

/// The system PortAudio library.
#[derive(Debug, Clone, Copy, Default)]
pub struct PortAudio;

/// An open PortAudio stream.
#[derive(Debug)]
pub struct PortAudioStream(NonNull<c_void>);

// SAFETY: PortAudio stream pointers may be used from any thread as long as calls on one stream
// are not concurrent, which `&mut` access through `Stream` guarantees.
unsafe impl Send for PortAudioStream {}

/// Copies a C string, empty for null.
///
/// # Safety
///
/// `raw` must be null or a valid NUL-terminated string.
unsafe fn text(raw: *const c_char) -> String {
    if raw.is_null() {
        return String::new();
    }
    // SAFETY: non-null and NUL-terminated per the caller.
    unsafe { CStr::from_ptr(raw) }.to_string_lossy().into_owned()
}

fn error(code: PaError) -> NativeError {
    if code == ErrorCode::UnanticipatedHostError.as_raw() {
        // SAFETY: PortAudio returns a pointer to static per-thread storage.
        if let Some(info) = unsafe { Pa_GetLastHostErrorInfo().as_ref() } {
            return NativeError::UnanticipatedHost {
                host_api: HostApiType::from_raw(info.host_api_type)
                    .unwrap_or(HostApiType::InDevelopment),
                code: i64::from(info.error_code),
                // SAFETY: the error text is a NUL-terminated string owned by PortAudio.
                text: unsafe { text(info.error_text) },
            };
        }
    }
    NativeError::from_code(code).unwrap_or(NativeError::Code(ErrorCode::InternalError))
}

fn check(code: PaError) -> NativeResult<()> {
    if code >= PA_NO_ERROR {
        Ok(())
    } else {
        Err(error(code))
    }
}

/// A non-negative count or index, or the error it encodes.
fn index(value: c_int) -> NativeResult<usize> {
    check(value)?;
    usize::try_from(value).map_err(|_| ErrorCode::InternalError.into())
}

fn device_index(value: PaDeviceIndex) -> Option<usize> {
    if value == PA_NO_DEVICE {
        None
    } else {
        usize::try_from(value).ok()
    }
}

fn raw_index(index: usize) -> NativeResult<c_int> {
    c_int::try_from(index).map_err(|_| ErrorCode::InvalidDevice.into())
}

fn sample_format(encoding: SampleEncoding, layout: ChannelLayout) -> PaSampleFormat {
    let format = match encoding {
        SampleEncoding::Float32 => 0x01,
        SampleEncoding::Int32 => 0x02,
        SampleEncoding::Int24 => 0x04,
        SampleEncoding::Int16 => 0x08,
        SampleEncoding::Int8 => 0x10,
        SampleEncoding::UInt8 => 0x20,
    };
    match layout {
        ChannelLayout::Interleaved => format,
        ChannelLayout::NonInterleaved => format | PA_NON_INTERLEAVED,
    }
}

fn stream_parameters(side: &NativeSideParams) -> NativeResult<PaStreamParameters> {
    Ok(PaStreamParameters {
        device: raw_index(side.device)?,
        channel_count: c_int::try_from(side.channels)
            .map_err(|_| NativeError::Code(ErrorCode::InvalidChannelCount))?,
        sample_format: sample_format(side.encoding, side.layout),
        suggested_latency: side.latency.as_secs_f64(),
        host_api_specific_stream_info: ptr::null_mut(),
    })
}

fn as_ptr(params: Option<&PaStreamParameters>) -> *const PaStreamParameters {
    params.map_or(ptr::null(), ptr::from_ref)
}

fn frames(frames: usize) -> NativeResult<c_ulong> {
    c_ulong::try_from(frames).map_err(|_| ErrorCode::BufferTooBig.into())
}

impl NativeEngine for PortAudio {
    type Stream = PortAudioStream;

    fn initialize(&self) -> NativeResult<()> {
        // SAFETY: plain library call.
        check(unsafe { Pa_Initialize() })
    }

    fn terminate(&self) -> NativeResult<()> {
        // SAFETY: plain library call.
        check(unsafe { Pa_Terminate() })
    }

    fn version(&self) -> i32 {
        // SAFETY: plain library call.
        unsafe { Pa_GetVersion() }
    }

    fn version_text(&self) -> String {
        // SAFETY: returns a static NUL-terminated string.
        unsafe { text(Pa_GetVersionText()) }
    }

    fn host_apis(&self) -> NativeResult<Vec<HostApiInfo>> {
        // SAFETY: plain library call.
        let count = index(unsafe { Pa_GetHostApiCount() })?;
        let mut host_apis = Vec::with_capacity(count);
        for i in 0..count {
            let raw = raw_index(i)?;
            // SAFETY: `raw` is in range; the info is owned by PortAudio until terminate.
            let info = unsafe { Pa_GetHostApiInfo(raw).as_ref() }
                .ok_or(ErrorCode::InvalidHostApi)?;
            let api_type =
                HostApiType::from_raw(info.type_id).unwrap_or(HostApiType::InDevelopment);
            let mut devices = Vec::with_capacity(usize::try_from(info.device_count).unwrap_or(0));
            for j in 0..info.device_count {
                // SAFETY: `j` is below the host API's device count.
                devices.push(index(unsafe { Pa_HostApiDeviceIndexToDeviceIndex(raw, j) })?);
            }
            host_apis.push(HostApiInfo {
                index: i,
                api_type,
                // SAFETY: NUL-terminated string owned by PortAudio.
                name: unsafe { text(info.name) },
                devices,
                default_input_device: device_index(info.default_input_device),
                default_output_device: device_index(info.default_output_device),
            });
        }
        Ok(host_apis)
    }

    fn devices(&self) -> NativeResult<Vec<DeviceInfo>> {
        // SAFETY: plain library call.
        let count = index(unsafe { Pa_GetDeviceCount() })?;
        let mut devices = Vec::with_capacity(count);
        for i in 0..count {
            // SAFETY: `i` is in range; the info is owned by PortAudio until terminate.
            let info = unsafe { Pa_GetDeviceInfo(raw_index(i)?).as_ref() }
                .ok_or(ErrorCode::InvalidDevice)?;
            devices.push(DeviceInfo {
                index: i,
                // SAFETY: NUL-terminated string owned by PortAudio.
                name: unsafe { text(info.name) },
                host_api: index(info.host_api)?,
                max_input_channels: usize::try_from(info.max_input_channels).unwrap_or(0),
                max_output_channels: usize::try_from(info.max_output_channels).unwrap_or(0),
                default_low_input_latency: seconds(info.default_low_input_latency),
                default_low_output_latency: seconds(info.default_low_output_latency),
                default_high_input_latency: seconds(info.default_high_input_latency),
                default_high_output_latency: seconds(info.default_high_output_latency),
                default_sample_rate: info.default_sample_rate,
            });
        }
        Ok(devices)
    }

    fn default_host_api(&self) -> NativeResult<usize> {
        // SAFETY: plain library call.
        index(unsafe { Pa_GetDefaultHostApi() })
    }

    fn default_input_device(&self) -> Option<usize> {
        // SAFETY: plain library call.
        device_index(unsafe { Pa_GetDefaultInputDevice() })
    }

    fn default_output_device(&self) -> Option<usize> {
        // SAFETY: plain library call.
        device_index(unsafe { Pa_GetDefaultOutputDevice() })
    }

    fn is_format_supported(
        &self,
        input: Option<&NativeSideParams>,
        output: Option<&NativeSideParams>,
        sample_rate: f64,
    ) -> NativeResult<()> {
        let input = input.map(stream_parameters).transpose()?;
        let output = output.map(stream_parameters).transpose()?;
        // SAFETY: the parameter structs outlive the call.
        check(unsafe {
            Pa_IsFormatSupported(as_ptr(input.as_ref()), as_ptr(output.as_ref()), sample_rate)
        })
    }

    fn open_stream(&self, request: OpenRequest) -> NativeResult<Self::Stream> {
        let input = request.input.as_ref().map(stream_parameters).transpose()?;
        let output = request.output.as_ref().map(stream_parameters).transpose()?;
        let (callback, user_data) = match request.callback {
            Some(target) => (Some(target.entry), target.user_data),
            None => (None, ptr::null_mut()),
        };
        let mut stream = ptr::null_mut();
        // SAFETY: the parameter structs outlive the call; `user_data` stays valid until the
        // stream is closed, as required of a `CallbackTarget`.
        check(unsafe {
            Pa_OpenStream(
                &mut stream,
                as_ptr(input.as_ref()),
                as_ptr(output.as_ref()),
                request.sample_rate,
                frames(request.frames_per_buffer)?,
                c_ulong::try_from(request.flags.bits()).map_err(|_| ErrorCode::InvalidFlag)?,
                callback,
                user_data,
            )
        })?;
        NonNull::new(stream)
            .map(PortAudioStream)
            .ok_or_else(|| ErrorCode::BadStreamPtr.into())
    }

    fn start_stream(&self, stream: &mut Self::Stream) -> NativeResult<()> {
        // SAFETY: `stream` is open.
        check(unsafe { Pa_StartStream(stream.0.as_ptr()) })
    }

    fn stop_stream(&self, stream: &mut Self::Stream) -> NativeResult<()> {
        // SAFETY: `stream` is open.
        check(unsafe { Pa_StopStream(stream.0.as_ptr()) })
    }

    fn abort_stream(&self, stream: &mut Self::Stream) -> NativeResult<()> {
        // SAFETY: `stream` is open.
        check(unsafe { Pa_AbortStream(stream.0.as_ptr()) })
    }

    fn close_stream(&self, stream: &mut Self::Stream) -> NativeResult<()> {
        // SAFETY: `stream` is open; the caller discards it on success.
        check(unsafe { Pa_CloseStream(stream.0.as_ptr()) })
    }

    unsafe fn read_stream(
        &self,
        stream: &mut Self::Stream,
        buffer: *mut c_void,
        frames_to_read: usize,
    ) -> NativeResult<()> {
        let count = frames(frames_to_read)?;
        // SAFETY: forwarded from the caller.
        check(unsafe { Pa_ReadStream(stream.0.as_ptr(), buffer, count) })
    }

    unsafe fn write_stream(
        &self,
        stream: &mut Self::Stream,
        buffer: *const c_void,
        frames_to_write: usize,
    ) -> NativeResult<()> {
        let count = frames(frames_to_write)?;
        // SAFETY: forwarded from the caller.
        check(unsafe { Pa_WriteStream(stream.0.as_ptr(), buffer, count) })
    }

    fn read_available(&self, stream: &Self::Stream) -> NativeResult<usize> {
        // SAFETY: `stream` is open.
        let available = unsafe { Pa_GetStreamReadAvailable(stream.0.as_ptr()) };
        available_frames(available)
    }

    fn write_available(&self, stream: &Self::Stream) -> NativeResult<usize> {
        // SAFETY: `stream` is open.
        let available = unsafe { Pa_GetStreamWriteAvailable(stream.0.as_ptr()) };
        available_frames(available)
    }

    fn stream_info(&self, stream: &Self::Stream) -> Option<StreamInfo> {
        // SAFETY: `stream` is open; the info is owned by PortAudio until close.
        let info = unsafe { Pa_GetStreamInfo(stream.0.as_ptr()).as_ref() }?;
        Some(StreamInfo {
            input_latency: seconds(info.input_latency),
            output_latency: seconds(info.output_latency),
            sample_rate: info.sample_rate,
        })
    }

    fn stream_time(&self, stream: &Self::Stream) -> Duration {
        // SAFETY: `stream` is open.
        seconds(unsafe { Pa_GetStreamTime(stream.0.as_ptr()) })
    }

    fn cpu_load(&self, stream: &Self::Stream) -> f64 {
        // SAFETY: `stream` is open.
        unsafe { Pa_GetStreamCpuLoad(stream.0.as_ptr()) }
    }
}

fn available_frames(value: c_long) -> NativeResult<usize> {
    if value < 0 {
        let code = PaError::try_from(value).unwrap_or(ErrorCode::InternalError.as_raw());
        return Err(error(code));
    }
    usize::try_from(value).map_err(|_| ErrorCode::InternalError.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_formats_match_the_library_flags() {
        assert_eq!(sample_format(SampleEncoding::Float32, ChannelLayout::Interleaved), 0x01);
        assert_eq!(sample_format(SampleEncoding::UInt8, ChannelLayout::Interleaved), 0x20);
        assert_eq!(
            sample_format(SampleEncoding::Int16, ChannelLayout::NonInterleaved),
            0x8000_0008
        );
    }

    #[test]
    fn negative_values_are_errors() {
        assert_eq!(device_index(PA_NO_DEVICE), None);
        assert_eq!(device_index(3), Some(3));
        assert_eq!(index(2).ok(), Some(2));
        assert_eq!(
            index(ErrorCode::NotInitialized.as_raw()).err(),
            Some(NativeError::Code(ErrorCode::NotInitialized))
        );
        assert_eq!(
            available_frames(c_long::from(ErrorCode::StreamIsStopped.as_raw())).err(),
            Some(NativeError::Code(ErrorCode::StreamIsStopped))
        );
    }
}
