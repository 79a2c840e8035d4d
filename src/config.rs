//! Serializable stream configuration.
//!
//! A [`StreamConfig`] names devices instead of holding them, so it can live in a settings
//! file. [`Engine::parameters_for`](crate::Engine::parameters_for) resolves it against the
//! device catalog.
//!
//! ```rust,ignore
//! let config: StreamConfig = serde_json::from_str(r#"{
//!     "output_channels": 2,
//!     "output_device": "USB Interface",
//!     "latency": "low"
//! }"#)?;
//! let params = engine.parameters_for(&config)?;
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::FRAMES_PER_BUFFER_UNSPECIFIED;
use crate::Side;
use crate::error::{StreamError, StreamResult};
use crate::host::{DeviceCatalog, DeviceInfo, StreamFlags, StreamParameters};

/// Which default latencies and sample rate to start from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LatencyPreset {
    /// [`StreamParameters::low_latency`].
    Low,
    /// [`StreamParameters::high_latency`].
    #[default]
    High,
}

/// Stream parameters by device name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Input channels, 0 for no input.
    pub input_channels: usize,
    /// Output channels, 0 for no output.
    pub output_channels: usize,
    /// Input device name, the default input device when absent.
    pub input_device: Option<String>,
    /// Output device name, the default output device when absent.
    pub output_device: Option<String>,
    /// Sample rate in Hz, the preset's choice when absent.
    pub sample_rate: Option<f64>,
    /// Frames per buffer, 0 for host-chosen.
    pub frames_per_buffer: usize,
    /// Latency preset.
    pub latency: LatencyPreset,
    /// Disable clipping of out-of-range samples.
    pub clip_off: bool,
    /// Disable dithering.
    pub dither_off: bool,
    /// Never drop input in full-duplex streams.
    pub never_drop_input: bool,
    /// Fill the initial output buffers by calling the stream callback.
    pub prime_output_buffers: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            input_channels: 0,
            output_channels: 2,
            input_device: None,
            output_device: None,
            sample_rate: None,
            frames_per_buffer: FRAMES_PER_BUFFER_UNSPECIFIED,
            latency: LatencyPreset::High,
            clip_off: false,
            dither_off: false,
            never_drop_input: false,
            prime_output_buffers: false,
        }
    }
}

impl StreamConfig {
    /// The configured stream flags.
    pub fn flags(&self) -> StreamFlags {
        let mut flags = StreamFlags::empty();
        flags.set(StreamFlags::CLIP_OFF, self.clip_off);
        flags.set(StreamFlags::DITHER_OFF, self.dither_off);
        flags.set(StreamFlags::NEVER_DROP_INPUT, self.never_drop_input);
        flags.set(
            StreamFlags::PRIME_OUTPUT_BUFFERS_USING_STREAM_CALLBACK,
            self.prime_output_buffers,
        );
        flags
    }

    /// Resolves device names and presets into stream parameters.
    ///
    /// # Errors
    ///
    /// - [`StreamError::InvalidParameter`] if both sides have zero channels or a named device
    ///   does not exist or lacks channels in that direction.
    /// - [`ErrorCode::DeviceUnavailable`](crate::ErrorCode::DeviceUnavailable) if a side needs
    ///   the default device and there is none.
    pub fn resolve(&self, catalog: &DeviceCatalog) -> StreamResult<StreamParameters> {
        if self.input_channels == 0 && self.output_channels == 0 {
            return Err(StreamError::invalid_parameter(
                "stream needs at least one input or output channel",
            ));
        }
        let input = self.device(catalog, Side::Input)?;
        let output = self.device(catalog, Side::Output)?;

        let params = match self.latency {
            LatencyPreset::Low => StreamParameters::low_latency(input, output),
            LatencyPreset::High => StreamParameters::high_latency(input, output),
        }
        .with_channels(self.input_channels, self.output_channels)
        .with_frames_per_buffer(self.frames_per_buffer)
        .with_flags(self.flags());

        Ok(match self.sample_rate {
            Some(rate) if rate > 0.0 && rate.is_finite() => params.with_sample_rate(rate),
            Some(rate) => {
                return Err(StreamError::invalid_parameter(format!(
                    "invalid sample rate {rate}"
                )));
            }
            None => params,
        })
    }

    fn device(&self, catalog: &DeviceCatalog, side: Side) -> StreamResult<Option<Arc<DeviceInfo>>> {
        let (channels, name) = match side {
            Side::Input => (self.input_channels, self.input_device.as_deref()),
            Side::Output => (self.output_channels, self.output_device.as_deref()),
        };
        if channels == 0 {
            return Ok(None);
        }
        let Some(name) = name else {
            let device = match side {
                Side::Input => catalog.default_input_device()?,
                Side::Output => catalog.default_output_device()?,
            };
            return Ok(Some(device));
        };

        let device = catalog.find_device_by_name(name).ok_or_else(|| {
            StreamError::invalid_parameter(format!("unknown {side} device \"{name}\""))
        })?;
        let available = match side {
            Side::Input => device.max_input_channels,
            Side::Output => device.max_output_channels,
        };
        if available == 0 {
            return Err(StreamError::invalid_parameter(format!(
                "device \"{name}\" has no {side} channels"
            )));
        }
        Ok(Some(Arc::clone(device)))
    }
}
