//! Host API and device enumeration.
//!
//! The catalog is read from the engine once and then cached by the
//! [`Engine`](crate::Engine) until it is terminated; the engine itself keeps its lists fixed for
//! the same period, so the cache cannot go stale.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::{ErrorCode, NativeResult};
use super::native::NativeEngine;

/// Host API families, with their native type ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum HostApiType {
    InDevelopment,
    DirectSound,
    Mme,
    Asio,
    SoundManager,
    CoreAudio,
    Oss,
    Alsa,
    Al,
    BeOs,
    Wdmks,
    Jack,
    Wasapi,
    AudioScienceHpi,
}

impl HostApiType {
    /// Maps a native type id.
    pub const fn from_raw(id: i32) -> Option<Self> {
        Some(match id {
            0 => Self::InDevelopment,
            1 => Self::DirectSound,
            2 => Self::Mme,
            3 => Self::Asio,
            4 => Self::SoundManager,
            5 => Self::CoreAudio,
            7 => Self::Oss,
            8 => Self::Alsa,
            9 => Self::Al,
            10 => Self::BeOs,
            11 => Self::Wdmks,
            12 => Self::Jack,
            13 => Self::Wasapi,
            14 => Self::AudioScienceHpi,
            _ => return None,
        })
    }

    /// The native type id.
    pub const fn as_raw(self) -> i32 {
        match self {
            Self::InDevelopment => 0,
            Self::DirectSound => 1,
            Self::Mme => 2,
            Self::Asio => 3,
            Self::SoundManager => 4,
            Self::CoreAudio => 5,
            Self::Oss => 7,
            Self::Alsa => 8,
            Self::Al => 9,
            Self::BeOs => 10,
            Self::Wdmks => 11,
            Self::Jack => 12,
            Self::Wasapi => 13,
            Self::AudioScienceHpi => 14,
        }
    }

    /// Display name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::InDevelopment => "InDevelopment",
            Self::DirectSound => "DirectSound",
            Self::Mme => "MME",
            Self::Asio => "ASIO",
            Self::SoundManager => "SoundManager",
            Self::CoreAudio => "CoreAudio",
            Self::Oss => "OSS",
            Self::Alsa => "ALSA",
            Self::Al => "AL",
            Self::BeOs => "BeOS",
            Self::Wdmks => "WDMKS",
            Self::Jack => "JACK",
            Self::Wasapi => "WASAPI",
            Self::AudioScienceHpi => "AudioScienceHPI",
        }
    }
}

impl fmt::Display for HostApiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Static description of an audio device.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceInfo {
    /// Engine-wide device index.
    pub index: usize,
    /// Human-readable device name.
    pub name: String,
    /// Index of the owning host API in [`DeviceCatalog::host_apis`].
    pub host_api: usize,
    /// Maximum number of input channels.
    pub max_input_channels: usize,
    /// Maximum number of output channels.
    pub max_output_channels: usize,
    /// Default latency for interactive input.
    pub default_low_input_latency: Duration,
    /// Default latency for interactive output.
    pub default_low_output_latency: Duration,
    /// Default latency for robust non-interactive input.
    pub default_high_input_latency: Duration,
    /// Default latency for robust non-interactive output.
    pub default_high_output_latency: Duration,
    /// Default sample rate in Hz.
    pub default_sample_rate: f64,
}

impl DeviceInfo {
    /// Returns true if the device can capture audio.
    pub const fn is_input(&self) -> bool {
        self.max_input_channels > 0
    }

    /// Returns true if the device can play audio.
    pub const fn is_output(&self) -> bool {
        self.max_output_channels > 0
    }
}

/// Description of a host API and the devices it exposes.
#[derive(Debug, Clone, PartialEq)]
pub struct HostApiInfo {
    /// Index in [`DeviceCatalog::host_apis`].
    pub index: usize,
    /// Host API family.
    pub api_type: HostApiType,
    /// Human-readable name.
    pub name: String,
    /// Engine-wide indices of this host API's devices.
    pub devices: Vec<usize>,
    /// Default input device of this host API.
    pub default_input_device: Option<usize>,
    /// Default output device of this host API.
    pub default_output_device: Option<usize>,
}

/// Immutable snapshot of every host API and device the engine knows about.
#[derive(Debug, Clone, Default)]
pub struct DeviceCatalog {
    host_apis: Vec<HostApiInfo>,
    devices: Vec<Arc<DeviceInfo>>,
    default_host_api: Option<usize>,
    default_input_device: Option<usize>,
    default_output_device: Option<usize>,
}

impl DeviceCatalog {
    /// Reads the catalog from the engine.
    ///
    /// Device and host API indices reported by the engine are checked against the lists it
    /// returned; a dangling index is an internal engine error.
    pub fn load<N: NativeEngine>(native: &N) -> NativeResult<Self> {
        let devices: Vec<Arc<DeviceInfo>> = native.devices()?.into_iter().map(Arc::new).collect();
        let host_apis = native.host_apis()?;

        let in_range = |index: Option<usize>| -> NativeResult<Option<usize>> {
            match index {
                Some(i) if i >= devices.len() => Err(ErrorCode::InternalError.into()),
                other => Ok(other),
            }
        };
        for host in &host_apis {
            for &device in &host.devices {
                in_range(Some(device))?;
            }
            in_range(host.default_input_device)?;
            in_range(host.default_output_device)?;
        }
        if devices.iter().any(|device| device.host_api >= host_apis.len()) {
            return Err(ErrorCode::InternalError.into());
        }

        let default_host_api = native
            .default_host_api()
            .ok()
            .filter(|&i| i < host_apis.len());
        let default_input_device = in_range(native.default_input_device())?;
        let default_output_device = in_range(native.default_output_device())?;

        Ok(Self {
            host_apis,
            devices,
            default_host_api,
            default_input_device,
            default_output_device,
        })
    }

    /// Every host API.
    pub fn host_apis(&self) -> &[HostApiInfo] {
        &self.host_apis
    }

    /// Every device, across all host APIs.
    pub fn devices(&self) -> &[Arc<DeviceInfo>] {
        &self.devices
    }

    /// Device with engine-wide index `index`.
    pub fn device(&self, index: usize) -> Option<&Arc<DeviceInfo>> {
        self.devices.get(index)
    }

    /// First device named `name`.
    pub fn find_device_by_name(&self, name: &str) -> Option<&Arc<DeviceInfo>> {
        self.devices.iter().find(|device| device.name == name)
    }

    /// Host API that owns `device`.
    pub fn host_api_of(&self, device: &DeviceInfo) -> Option<&HostApiInfo> {
        self.host_apis.get(device.host_api)
    }

    /// Devices of `host_api`, in host API order.
    pub fn devices_of<'a>(
        &'a self,
        host_api: &'a HostApiInfo,
    ) -> impl Iterator<Item = &'a Arc<DeviceInfo>> + 'a {
        host_api
            .devices
            .iter()
            .filter_map(|&index| self.devices.get(index))
    }

    /// The host API of family `api_type`.
    ///
    /// # Errors
    ///
    /// [`ErrorCode::HostApiNotFound`] if the engine was built without it.
    pub fn host_api(&self, api_type: HostApiType) -> NativeResult<&HostApiInfo> {
        self.host_apis
            .iter()
            .find(|host| host.api_type == api_type)
            .ok_or_else(|| ErrorCode::HostApiNotFound.into())
    }

    /// The default host API.
    ///
    /// # Errors
    ///
    /// [`ErrorCode::HostApiNotFound`] if the engine has none.
    pub fn default_host_api(&self) -> NativeResult<&HostApiInfo> {
        self.default_host_api
            .and_then(|index| self.host_apis.get(index))
            .ok_or_else(|| ErrorCode::HostApiNotFound.into())
    }

    /// The default input device of the default host API.
    ///
    /// # Errors
    ///
    /// [`ErrorCode::DeviceUnavailable`] if there is no input device.
    pub fn default_input_device(&self) -> NativeResult<Arc<DeviceInfo>> {
        self.default_input_device
            .and_then(|index| self.devices.get(index))
            .cloned()
            .ok_or_else(|| ErrorCode::DeviceUnavailable.into())
    }

    /// The default output device of the default host API.
    ///
    /// # Errors
    ///
    /// [`ErrorCode::DeviceUnavailable`] if there is no output device.
    pub fn default_output_device(&self) -> NativeResult<Arc<DeviceInfo>> {
        self.default_output_device
            .and_then(|index| self.devices.get(index))
            .cloned()
            .ok_or_else(|| ErrorCode::DeviceUnavailable.into())
    }
}
