//! Stream parameters and presets.

use std::sync::Arc;
use std::time::Duration;

use bitflags::bitflags;

use super::devices::DeviceInfo;
use crate::FRAMES_PER_BUFFER_UNSPECIFIED;

bitflags! {
    /// Flags controlling how the engine opens a stream.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct StreamFlags: u64 {
        /// Disable default clipping of out-of-range samples.
        const CLIP_OFF = 0x0000_0001;
        /// Disable default dithering.
        const DITHER_OFF = 0x0000_0002;
        /// Request that full-duplex streams never discard overflowed input.
        const NEVER_DROP_INPUT = 0x0000_0004;
        /// Fill initial output buffers by calling the stream callback.
        const PRIME_OUTPUT_BUFFERS_USING_STREAM_CALLBACK = 0x0000_0008;
        /// Range reserved for host-API-specific flags.
        const PLATFORM_SPECIFIC = 0xFFFF_0000;
    }
}

/// Parameters for one side (input or output) of a stream.
///
/// A side without a device is not used; an input-only stream has no output device and vice
/// versa.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamDeviceParameters {
    /// The device, or `None` to leave this side unused.
    pub device: Option<Arc<DeviceInfo>>,
    /// Channel count.
    pub channels: usize,
    /// Suggested latency.
    pub latency: Duration,
}

impl StreamDeviceParameters {
    /// Parameters for `channels` channels of `device` at `latency`.
    pub fn new(device: Arc<DeviceInfo>, channels: usize, latency: Duration) -> Self {
        Self {
            device: Some(device),
            channels,
            latency,
        }
    }

    /// Returns true if this side has a device.
    pub const fn has_device(&self) -> bool {
        self.device.is_some()
    }
}

/// All parameters needed to open a stream, apart from the callback or buffers.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamParameters {
    /// Input side.
    pub input: StreamDeviceParameters,
    /// Output side.
    pub output: StreamDeviceParameters,
    /// Sample rate in Hz.
    pub sample_rate: f64,
    /// Frames per callback or blocking transfer, or
    /// [`FRAMES_PER_BUFFER_UNSPECIFIED`] to let the host decide.
    pub frames_per_buffer: usize,
    /// Stream flags.
    pub flags: StreamFlags,
}

impl Default for StreamParameters {
    fn default() -> Self {
        Self {
            input: StreamDeviceParameters::default(),
            output: StreamDeviceParameters::default(),
            sample_rate: 0.0,
            frames_per_buffer: FRAMES_PER_BUFFER_UNSPECIFIED,
            flags: StreamFlags::empty(),
        }
    }
}

impl StreamParameters {
    /// Parameters for robust, non-interactive use.
    ///
    /// Mono input and stereo output (fewer if the device has fewer), the devices' default high
    /// latencies, the smaller of the two default sample rates and an unspecified buffer size.
    /// Either device may be `None`.
    pub fn high_latency(input: Option<Arc<DeviceInfo>>, output: Option<Arc<DeviceInfo>>) -> Self {
        Self::preset(input, output, Preset::High)
    }

    /// Parameters for interactive use.
    ///
    /// Like [`StreamParameters::high_latency`] but with the default low latencies and the larger
    /// of the two default sample rates.
    pub fn low_latency(input: Option<Arc<DeviceInfo>>, output: Option<Arc<DeviceInfo>>) -> Self {
        Self::preset(input, output, Preset::Low)
    }

    fn preset(
        input: Option<Arc<DeviceInfo>>,
        output: Option<Arc<DeviceInfo>>,
        preset: Preset,
    ) -> Self {
        let mut params = Self::default();
        let mut sample_rate: Option<f64> = None;

        if let Some(device) = input {
            let latency = match preset {
                Preset::High => device.default_high_input_latency,
                Preset::Low => device.default_low_input_latency,
            };
            sample_rate = Some(device.default_sample_rate);
            params.input = StreamDeviceParameters {
                channels: device.max_input_channels.min(1),
                latency,
                device: Some(device),
            };
        }
        if let Some(device) = output {
            let latency = match preset {
                Preset::High => device.default_high_output_latency,
                Preset::Low => device.default_low_output_latency,
            };
            let rate = device.default_sample_rate;
            sample_rate = Some(match (sample_rate, preset) {
                (None, _) => rate,
                (Some(current), Preset::High) => current.min(rate),
                (Some(current), Preset::Low) => current.max(rate),
            });
            params.output = StreamDeviceParameters {
                channels: device.max_output_channels.min(2),
                latency,
                device: Some(device),
            };
        }

        params.sample_rate = sample_rate.unwrap_or(0.0);
        params
    }

    /// Replaces the channel counts.
    pub fn with_channels(mut self, input: usize, output: usize) -> Self {
        self.input.channels = input;
        self.output.channels = output;
        self
    }

    /// Replaces the sample rate.
    pub fn with_sample_rate(mut self, sample_rate: f64) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Replaces the frames per buffer.
    pub fn with_frames_per_buffer(mut self, frames_per_buffer: usize) -> Self {
        self.frames_per_buffer = frames_per_buffer;
        self
    }

    /// Replaces the stream flags.
    pub fn with_flags(mut self, flags: StreamFlags) -> Self {
        self.flags = flags;
        self
    }
}

#[derive(Clone, Copy)]
enum Preset {
    High,
    Low,
}

/// Actual latencies and sample rate of an open stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamInfo {
    /// Input latency, zero for output-only streams.
    pub input_latency: Duration,
    /// Output latency, zero for input-only streams.
    pub output_latency: Duration,
    /// Actual sample rate, which may differ slightly from the requested one.
    pub sample_rate: f64,
}
