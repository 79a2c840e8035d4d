//! Zero-copy view types over engine-owned buffers.
//!
//! A view is a slice header (pointer and length) that lives in the stream's binding context
//! for the whole life of the stream. On every realtime invocation the marshaler points it at
//! the buffers the engine handed over for that block; the caller only ever sees it through a
//! `&mut` borrow that ends when the callback returns. Nothing is copied and nothing is
//! allocated per block: a [`NonInterleaved`] view allocates its per-channel header array once,
//! when the stream is opened.

use std::ffi::c_void;
use std::fmt;
use std::ops::{Deref, DerefMut, Index, IndexMut};
use std::ptr::NonNull;
use std::slice;

use crate::ChannelLayout;
use crate::format::BufferShape;
use crate::traits::{Element, Sample};

/// A buffer type that can be declared as a callback parameter.
///
/// Implemented by [`Interleaved`] and [`NonInterleaved`] only; callers need the trait as a
/// bound and nothing else.
pub trait BufferView: sealed::Bind + Send + 'static {
    /// Element type of the buffer.
    type Elem: Element;

    /// Memory layout of the buffer.
    const LAYOUT: ChannelLayout;

    /// Declared shape of this buffer type.
    fn shape() -> BufferShape {
        BufferShape::buffer(Self::Elem::SHAPE, Self::LAYOUT)
    }
}

pub(crate) mod sealed {
    use std::ffi::c_void;

    /// Binder-side operations on a view. Not nameable outside the crate.
    pub trait Bind {
        /// Creates an empty view for a side with `channels` channels.
        fn unbound(channels: usize) -> Self;

        /// Points the view at the engine's buffer for one invocation.
        ///
        /// `channels` replaces whatever channel count the view currently carries.
        ///
        /// # Safety
        ///
        /// `raw` must be null or point to memory laid out as the view's layout for `channels`
        /// channels and `frames` frames, valid for reads and writes until the view is rebound.
        unsafe fn rebind(&mut self, raw: *mut c_void, channels: usize, frames: usize);
    }
}

/// Raw slice header.
struct RawSlice<T> {
    ptr: NonNull<T>,
    len: usize,
}

impl<T> RawSlice<T> {
    const fn empty() -> Self {
        Self {
            ptr: NonNull::dangling(),
            len: 0,
        }
    }

    /// # Safety
    /// The pointer must be valid for `len` elements (or `len` must be 0).
    unsafe fn set(&mut self, ptr: *mut T, len: usize) {
        match NonNull::new(ptr) {
            Some(ptr) => {
                self.ptr = ptr;
                self.len = len;
            }
            None => *self = Self::empty(),
        }
    }

    fn as_slice(&self) -> &[T] {
        // SAFETY: the header is either empty with a dangling pointer or was set from a buffer
        // valid for the current invocation.
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    fn as_mut_slice(&mut self) -> &mut [T] {
        // SAFETY: as above; `&mut self` guarantees uniqueness of the returned borrow.
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

/// A flat buffer holding `frames * channels` samples, channel samples of one frame adjacent.
///
/// Dereferences to `[T]`.
///
/// ```rust,ignore
/// |_in: &mut Interleaved<f32>, out: &mut Interleaved<f32>| {
///     for frame in out.chunks_exact_mut(out.channels()) {
///         frame.fill(0.0);
///     }
/// }
/// ```
pub struct Interleaved<T> {
    raw: RawSlice<T>,
    channels: usize,
}

// SAFETY: the view only refers to engine memory for the duration of one invocation and is
// exclusively accessed by the thread running that invocation.
unsafe impl<T: Send> Send for Interleaved<T> {}

impl<T: Element> Interleaved<T> {
    /// Number of channels in each frame.
    pub const fn channels(&self) -> usize {
        self.channels
    }

    /// Number of frames in the current block.
    pub const fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.raw.len / self.channels
        }
    }

    /// Returns the samples of frame `index`, one per channel.
    pub fn frame(&self, index: usize) -> Option<&[T]> {
        let start = index.checked_mul(self.channels)?;
        let end = start.checked_add(self.channels)?;
        self.get(start..end)
    }
}

impl<T: Sample> Interleaved<T> {
    /// Fills the block with the sample type's silence value.
    ///
    /// Silence is not zero for every encoding: `u8` samples rest at 128.
    pub fn fill_silence(&mut self) {
        self.fill(T::EQUILIBRIUM);
    }
}

impl<T: Element> BufferView for Interleaved<T> {
    type Elem = T;
    const LAYOUT: ChannelLayout = ChannelLayout::Interleaved;
}

impl<T: Element> sealed::Bind for Interleaved<T> {
    fn unbound(channels: usize) -> Self {
        Self {
            raw: RawSlice::empty(),
            channels,
        }
    }

    unsafe fn rebind(&mut self, raw: *mut c_void, channels: usize, frames: usize) {
        self.channels = channels;
        let Some(len) = frames.checked_mul(channels) else {
            // No engine buffer can be this large.
            self.raw = RawSlice::empty();
            return;
        };
        // SAFETY: forwarded from the caller's contract.
        unsafe { self.raw.set(raw.cast::<T>(), len) }
    }
}

impl<T> Deref for Interleaved<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.raw.as_slice()
    }
}

impl<T> DerefMut for Interleaved<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        self.raw.as_mut_slice()
    }
}

impl<T: fmt::Debug> fmt::Debug for Interleaved<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interleaved")
            .field("channels", &self.channels)
            .field("samples", &self.raw.len)
            .finish()
    }
}

/// One buffer per channel, each holding `frames` samples.
///
/// Indexing yields the channel's samples:
///
/// ```rust,ignore
/// |input: &mut NonInterleaved<i16>, output: &mut NonInterleaved<i16>| {
///     for ch in 0..output.channels() {
///         output[ch].copy_from_slice(&input[ch]);
///     }
/// }
/// ```
pub struct NonInterleaved<T> {
    // Sized once at bind time; only the headers are rewritten per invocation.
    channels: Box<[RawSlice<T>]>,
    frames: usize,
}

// SAFETY: see `Interleaved`.
unsafe impl<T: Send> Send for NonInterleaved<T> {}

impl<T: Element> NonInterleaved<T> {
    /// Number of channel buffers.
    pub fn channels(&self) -> usize {
        self.channels.len()
    }

    /// Number of frames in each channel for the current block.
    pub const fn frames(&self) -> usize {
        self.frames
    }

    /// Returns true if there are no channels or no frames.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty() || self.frames == 0
    }

    /// Samples of channel `index`, or `None` if out of range.
    pub fn get(&self, index: usize) -> Option<&[T]> {
        self.channels.get(index).map(RawSlice::as_slice)
    }

    /// Mutable samples of channel `index`, or `None` if out of range.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut [T]> {
        self.channels.get_mut(index).map(RawSlice::as_mut_slice)
    }

    /// Iterates over the channel buffers.
    pub fn iter(&self) -> impl Iterator<Item = &[T]> {
        self.channels.iter().map(RawSlice::as_slice)
    }

    /// Iterates mutably over the channel buffers.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut [T]> {
        self.channels.iter_mut().map(RawSlice::as_mut_slice)
    }
}

impl<T: Sample> NonInterleaved<T> {
    /// Fills every channel with the sample type's silence value.
    pub fn fill_silence(&mut self) {
        for channel in self.iter_mut() {
            channel.fill(T::EQUILIBRIUM);
        }
    }
}

impl<T: Element> BufferView for NonInterleaved<T> {
    type Elem = T;
    const LAYOUT: ChannelLayout = ChannelLayout::NonInterleaved;
}

impl<T: Element> sealed::Bind for NonInterleaved<T> {
    fn unbound(channels: usize) -> Self {
        Self {
            channels: (0..channels).map(|_| RawSlice::empty()).collect(),
            frames: 0,
        }
    }

    unsafe fn rebind(&mut self, raw: *mut c_void, channels: usize, frames: usize) {
        if self.channels.len() != channels {
            // Only reached if the callback swapped or replaced its view.
            self.channels = (0..channels).map(|_| RawSlice::empty()).collect();
        }
        if raw.is_null() {
            for header in self.channels.iter_mut() {
                *header = RawSlice::empty();
            }
            self.frames = 0;
            return;
        }
        let pointers = raw.cast::<*mut T>();
        for (i, header) in self.channels.iter_mut().enumerate() {
            // SAFETY: the caller guarantees `raw` points to one pointer per channel, each
            // valid for `frames` samples.
            unsafe { header.set(*pointers.add(i), frames) }
        }
        self.frames = frames;
    }
}

impl<T: Element> Index<usize> for NonInterleaved<T> {
    type Output = [T];

    fn index(&self, index: usize) -> &[T] {
        self.channels[index].as_slice()
    }
}

impl<T: Element> IndexMut<usize> for NonInterleaved<T> {
    fn index_mut(&mut self, index: usize) -> &mut [T] {
        self.channels[index].as_mut_slice()
    }
}

impl<T: fmt::Debug> fmt::Debug for NonInterleaved<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NonInterleaved")
            .field("channels", &self.channels.len())
            .field("frames", &self.frames)
            .finish()
    }
}
