//! The native engine boundary: the [`NativeEngine`] contract, device enumeration, stream
//! parameters and engine error codes.
//!
//! # Backends
//!
//! - With the `portaudio` feature, [`portaudio::PortAudio`] binds `libportaudio` over FFI.
//! - Any other engine can be plugged in by implementing [`NativeEngine`].

pub mod devices;
pub mod error;
pub mod native;
pub mod params;

#[cfg(feature = "portaudio")]
pub mod portaudio;

// Re-export main types for convenience
pub use devices::{DeviceCatalog, DeviceInfo, HostApiInfo, HostApiType};
pub use error::{ErrorCode, NativeError, NativeResult};
pub use native::{CallbackTarget, NativeEngine, NativeSideParams, OpenRequest, RawTimeInfo};
pub use params::{StreamDeviceParameters, StreamFlags, StreamInfo, StreamParameters};
