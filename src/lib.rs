// Correctness and logic
#![warn(clippy::unit_cmp)] // Detects comparing unit types
#![warn(clippy::match_same_arms)]
// Duplicate match arms

// Performance-focused
#![warn(clippy::inefficient_to_string)] // `format!("{}", x)` vs `x.to_string()`
#![warn(clippy::map_clone)] // Cloning inside `map()` unnecessarily
#![warn(clippy::unnecessary_to_owned)] // Detects redundant `.to_owned()` or `.clone()`
#![warn(clippy::large_stack_arrays)] // Helps avoid stack overflows
#![warn(clippy::box_collection)] // Warns on boxed `Vec`, `String`, etc.
#![warn(clippy::vec_box)] // Avoids using `Vec<Box<T>>` when unnecessary
#![warn(clippy::needless_collect)] // Avoids `.collect().iter()` chains

// Style and idiomatic Rust
#![warn(clippy::redundant_clone)] // Detects unnecessary `.clone()`
#![warn(clippy::identity_op)] // e.g., `x + 0`, `x * 1`
#![warn(clippy::needless_return)] // Avoids `return` at the end of functions
#![warn(clippy::let_unit_value)] // Avoids binding `()` to variables
#![warn(clippy::manual_map)] // Use `.map()` instead of manual `match`
#![warn(clippy::unwrap_used)] // Avoids using `unwrap()`

// Maintainability
#![warn(clippy::missing_panics_doc)] // Docs for functions that might panic
#![warn(clippy::missing_safety_doc)] // Docs for `unsafe` functions
#![warn(missing_docs)] // Documentation is a must for release

//! # audio_io
//!
//! Typed stream bindings for a native realtime audio engine.
//!
//! Audio is exchanged with the engine in one of two ways:
//!
//! - **Callback streams**: a closure (or any [`StreamCallback`] implementor) is invoked on the
//!   engine's realtime thread once per block. The engine's raw buffer pointers are presented
//!   as typed [`Interleaved`] or [`NonInterleaved`] views without copying or allocating.
//! - **Blocking streams**: buffers handed over at open time are transferred synchronously with
//!   [`Stream::read`] and [`Stream::write`].
//!
//! ## Format inference
//!
//! There is no sample-format flag. The sample encoding and channel layout of each side are
//! inferred from the shapes the caller declares:
//!
//! - `Interleaved<T>` / `Vec<T>`: one flat buffer of `frames * channels` samples.
//! - `NonInterleaved<T>` / `Vec<Vec<T>>`: one buffer per channel, `frames` samples each.
//!
//! where `T` is one of `f32`, `i32`, [`Int24`], `i16`, `i8` or `u8`. Any other element type
//! is rejected with a [`SignatureError`] before the engine is touched.
//!
//! ## Callback signatures
//!
//! A callback takes its buffers first, optionally followed by a [`TimeInfo`] and then a
//! [`StatusFlags`]:
//!
//! ```rust,ignore
//! |input: &mut Interleaved<f32>, output: &mut Interleaved<f32>| { ... }
//! |output: &mut NonInterleaved<i16>| { ... }
//! |input: &mut Interleaved<f32>, output: &mut Interleaved<f32>, time: &TimeInfo, flags: StatusFlags| { ... }
//! ```
//!
//! With a single buffer parameter the buffer belongs to whichever side has a device. When the
//! first two parameters are both buffers, both sides get one even if a device is missing; the
//! device-less side is always an empty view. This allows generators to keep a uniform
//! `(input, output)` signature.
//!
//! ## Example
//!
//! ```rust,ignore
//! use audio_io::{Engine, Interleaved};
//! use audio_io::host::portaudio::PortAudio;
//!
//! let engine = Engine::initialize(PortAudio)?;
//! let mut phase = 0.0f32;
//! let mut stream = engine.open_default_stream(0, 2, 44100.0, 256,
//!     move |_in: &mut Interleaved<f32>, out: &mut Interleaved<f32>| {
//!         for frame in out.chunks_exact_mut(2) {
//!             let v = (phase * std::f32::consts::TAU).sin() * 0.2;
//!             frame[0] = v;
//!             frame[1] = v;
//!             phase = (phase + 440.0 / 44100.0).fract();
//!         }
//!     })?;
//! stream.start()?;
//! std::thread::sleep(std::time::Duration::from_secs(2));
//! stream.stop()?;
//! stream.close()?;
//! engine.terminate()?;
//! ```
//!
//! ## Error Handling
//!
//! Every fallible operation returns [`StreamResult`]. Shape problems surface as
//! [`StreamError::Signature`], lifecycle misuse as [`StreamError::State`] and engine failures
//! as [`StreamError::Native`] with the engine's own error code.
//!
//! A panic inside a realtime callback cannot be reported back through the engine. It is
//! logged together with a backtrace and the process is aborted.

mod binder;
mod blocking;
pub mod callback;
pub mod config;
mod engine;
mod error;
pub mod format;
pub mod host;
mod realtime;
pub mod registry;
mod repr;
mod stream;
/// Sample element traits.
pub mod traits;
pub mod views;

#[cfg(test)]
mod tests;

use std::fmt;

pub use crate::blocking::BlockingBuffer;
pub use crate::callback::{Block, StatusFlags, StreamCallback, TimeInfo};
pub use crate::config::{LatencyPreset, StreamConfig};
pub use crate::engine::Engine;
pub use crate::error::{HandleCorruption, SignatureError, StreamError, StreamResult};
pub use crate::format::{BufferShape, CallbackSignature, ParamShape, SideFormat, StreamFormat};
pub use crate::host::{
    DeviceCatalog, DeviceInfo, ErrorCode, HostApiInfo, HostApiType, NativeEngine, NativeError,
    StreamDeviceParameters, StreamFlags, StreamInfo, StreamParameters,
};
pub use crate::registry::{HandleRegistry, StreamHandle};
pub use crate::repr::{ElementShape, Int24, SampleEncoding};
pub use crate::stream::{BindingMode, Stream, StreamState};
pub use crate::traits::{Element, Sample};
pub use crate::views::{BufferView, Interleaved, NonInterleaved};

pub use i24::I24;

/// Frames-per-buffer value that lets the host choose, possibly varying per invocation.
pub const FRAMES_PER_BUFFER_UNSPECIFIED: usize = 0;

/// Describes how multi-channel audio data is organized in memory
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ChannelLayout {
    /// Samples from different channels are stored sequentially (LRLRLR...)
    /// This is the most common format for audio files and streaming
    #[default]
    Interleaved,
    /// Samples from each channel are stored in separate contiguous blocks (LLL...RRR...)
    /// This format is often preferred for digital signal processing
    NonInterleaved,
}

impl ChannelLayout {
    /// Returns true if the layout is interleaved
    pub const fn is_interleaved(&self) -> bool {
        matches!(self, ChannelLayout::Interleaved)
    }

    /// Returns true if the layout is non-interleaved
    pub const fn is_non_interleaved(&self) -> bool {
        matches!(self, ChannelLayout::NonInterleaved)
    }
}

impl fmt::Display for ChannelLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelLayout::Interleaved => f.write_str("interleaved"),
            ChannelLayout::NonInterleaved => f.write_str("non-interleaved"),
        }
    }
}

/// One direction of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// Samples captured by the engine and handed to the caller.
    Input,
    /// Samples produced by the caller and played by the engine.
    Output,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Input => f.write_str("input"),
            Side::Output => f.write_str("output"),
        }
    }
}
