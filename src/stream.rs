//! Streams and their lifecycle.
//!
//! ```text
//!            start              stop / abort
//!  Opened ──────────▶ Started ──────────────▶ Stopped | Aborted
//!                        ▲                          │
//!                        └────────── start ─────────┘
//!
//!  any state but Closed ── close ──▶ Closed
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::Side;
use crate::binder::{bind_blocking, bind_callback};
use crate::blocking::{BlockingBuffer, BlockingSide};
use crate::callback::StreamCallback;
use crate::engine::EngineShared;
use crate::error::{StreamError, StreamResult};
use crate::format::{self, SideFormat, StreamFormat};
use crate::host::native::{CallbackTarget, NativeSideParams, OpenRequest};
use crate::host::{ErrorCode, NativeEngine, NativeError, NativeResult, StreamInfo};
use crate::host::params::{StreamDeviceParameters, StreamParameters};
use crate::realtime::Dispatch;
use crate::registry::StreamHandle;

/// Lifecycle state of a [`Stream`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamState {
    /// Opened, never started.
    Opened,
    /// Running.
    Started,
    /// Stopped after draining pending buffers.
    Stopped,
    /// Stopped immediately, pending buffers discarded.
    Aborted,
    /// Closed; every further operation fails.
    Closed,
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Opened => "opened",
            Self::Started => "started",
            Self::Stopped => "stopped",
            Self::Aborted => "aborted",
            Self::Closed => "closed",
        };
        f.write_str(label)
    }
}

/// How a stream exchanges audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingMode {
    /// Blocks are delivered to a callback on the engine's realtime thread.
    Callback,
    /// The caller transfers blocks with [`Stream::read`] and [`Stream::write`].
    Blocking,
}

impl fmt::Display for BindingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Callback => f.write_str("callback"),
            Self::Blocking => f.write_str("blocking"),
        }
    }
}

struct BlockingSides<I, O> {
    input: BlockingSide<I>,
    output: BlockingSide<O>,
}

/// An open audio stream.
///
/// Callback streams are `Stream<N>`; blocking streams carry their input and output buffer
/// types, `Stream<N, I, O>`.
///
/// Dropping a stream that is not closed closes it. Close failures during drop are logged; the
/// native stream and its binding are then leaked rather than freed under a possibly running
/// callback.
pub struct Stream<N: NativeEngine, I = (), O = ()> {
    engine: Arc<EngineShared<N>>,
    native: Option<N::Stream>,
    handle: StreamHandle,
    format: StreamFormat,
    state: StreamState,
    dispatch: Option<Box<Dispatch>>,
    blocking: Option<BlockingSides<I, O>>,
}

/// Native parameters of one side, if the side is used.
pub(crate) fn native_side(
    params: &StreamDeviceParameters,
    format: Option<SideFormat>,
) -> Option<NativeSideParams> {
    let device = params.device.as_ref()?;
    let format = format?;
    Some(NativeSideParams {
        device: device.index,
        channels: format.channels,
        encoding: format.encoding,
        layout: format.layout,
        latency: params.latency,
    })
}

fn open_request(
    params: &StreamParameters,
    format: &StreamFormat,
    callback: Option<CallbackTarget>,
) -> OpenRequest {
    OpenRequest {
        input: native_side(&params.input, format.input),
        output: native_side(&params.output, format.output),
        sample_rate: params.sample_rate,
        frames_per_buffer: params.frames_per_buffer,
        flags: params.flags,
        callback,
    }
}

impl<N: NativeEngine> Stream<N> {
    /// Infers, binds and opens a callback stream.
    pub(crate) fn open_callback<F, M>(
        engine: &Arc<EngineShared<N>>,
        params: &StreamParameters,
        callback: F,
    ) -> StreamResult<Self>
    where
        F: StreamCallback<M>,
        M: 'static,
    {
        let format = format::infer_callback(&F::signature(), params)?;
        let bound = bind_callback(&engine.registry, format, callback);
        let dispatch = Dispatch::new(Arc::clone(&engine.registry), bound.handle());
        let request = open_request(params, &format, Some(dispatch.target()));

        // On failure `bound` untracks the handle as it goes out of scope.
        let native = engine.native.open_stream(request)?;
        let handle = bound.commit();
        tracing::debug!(%handle, ?format, "opened callback stream");

        Ok(Self {
            engine: Arc::clone(engine),
            native: Some(native),
            handle,
            format,
            state: StreamState::Opened,
            dispatch: Some(dispatch),
            blocking: None,
        })
    }
}

impl<N, I, O> Stream<N, I, O>
where
    N: NativeEngine,
    I: BlockingBuffer,
    O: BlockingBuffer,
{
    /// Infers, binds and opens a blocking stream.
    pub(crate) fn open_blocking(
        engine: &Arc<EngineShared<N>>,
        params: &StreamParameters,
        input: I,
        output: O,
    ) -> StreamResult<Self> {
        let format = format::infer_blocking(I::shape(), O::shape(), params)?;
        let bound = bind_blocking(&engine.registry);
        let request = open_request(params, &format, None);

        let native = engine.native.open_stream(request)?;
        let handle = bound.commit();
        tracing::debug!(%handle, ?format, "opened blocking stream");

        Ok(Self {
            engine: Arc::clone(engine),
            native: Some(native),
            handle,
            format,
            state: StreamState::Opened,
            dispatch: None,
            blocking: Some(BlockingSides {
                input: BlockingSide::new(input, format.input),
                output: BlockingSide::new(output, format.output),
            }),
        })
    }

    /// Reads one block from the engine into the input buffer.
    ///
    /// The frame count is derived from the buffer: `len / channels` for `Vec<T>`, the common
    /// channel length for `Vec<Vec<T>>`. Blocks until the frames are available or the stream
    /// is stopped.
    ///
    /// # Errors
    ///
    /// - [`StreamError::State`] unless this is a started blocking stream.
    /// - [`StreamError::BufferMismatch`] if the buffer does not fit the channel count.
    /// - [`StreamError::Native`] with [`ErrorCode::CanNotReadFromAnOutputOnlyStream`] if the
    ///   stream has no input, or whatever the engine reports (including
    ///   [`ErrorCode::InputOverflowed`]).
    pub fn read(&mut self) -> StreamResult<()> {
        self.require_transfer("read")?;
        let (Some(sides), Some(native)) = (self.blocking.as_mut(), self.native.as_mut()) else {
            return Err(StreamError::state("read", BindingMode::Callback, self.state));
        };
        let (buffer, frames) = sides.input.prepare(Side::Input)?;
        // SAFETY: `buffer` was just validated against the stream's input format and points into
        // the input buffer, which `&mut self` keeps alive and unaliased for the call.
        unsafe { self.engine.native.read_stream(native, buffer, frames) }?;
        Ok(())
    }

    /// Writes the output buffer to the engine as one block.
    ///
    /// Blocks until the engine has accepted the frames or the stream is stopped.
    ///
    /// # Errors
    ///
    /// As [`Stream::read`], with [`ErrorCode::CanNotWriteToAnInputOnlyStream`] and
    /// [`ErrorCode::OutputUnderflowed`] in place of their input counterparts.
    pub fn write(&mut self) -> StreamResult<()> {
        self.require_transfer("write")?;
        let (Some(sides), Some(native)) = (self.blocking.as_mut(), self.native.as_mut()) else {
            return Err(StreamError::state("write", BindingMode::Callback, self.state));
        };
        let (buffer, frames) = sides.output.prepare(Side::Output)?;
        // SAFETY: as in `read`, for the output buffer, which the engine only reads.
        unsafe { self.engine.native.write_stream(native, buffer.cast_const(), frames) }?;
        Ok(())
    }

    /// The input buffer of a blocking stream.
    pub fn input_buffer(&self) -> Option<&I> {
        self.blocking.as_ref().map(|sides| &sides.input.buffer)
    }

    /// The input buffer of a blocking stream, for inspection or resizing between reads.
    pub fn input_buffer_mut(&mut self) -> Option<&mut I> {
        self.blocking.as_mut().map(|sides| &mut sides.input.buffer)
    }

    /// The output buffer of a blocking stream.
    pub fn output_buffer(&self) -> Option<&O> {
        self.blocking.as_ref().map(|sides| &sides.output.buffer)
    }

    /// The output buffer of a blocking stream, for filling between writes.
    pub fn output_buffer_mut(&mut self) -> Option<&mut O> {
        self.blocking.as_mut().map(|sides| &mut sides.output.buffer)
    }
}

impl<N: NativeEngine, I, O> Stream<N, I, O> {
    /// Current lifecycle state.
    pub fn state(&self) -> StreamState {
        self.state
    }

    /// The stream's handle.
    pub fn handle(&self) -> StreamHandle {
        self.handle
    }

    /// The inferred stream format.
    pub fn format(&self) -> &StreamFormat {
        &self.format
    }

    /// Whether the stream is callback- or blocking-bound.
    pub fn mode(&self) -> BindingMode {
        if self.blocking.is_some() {
            BindingMode::Blocking
        } else {
            BindingMode::Callback
        }
    }

    /// Returns true for callback streams.
    pub fn is_callback(&self) -> bool {
        self.mode() == BindingMode::Callback
    }

    /// Starts the stream.
    ///
    /// # Errors
    ///
    /// [`StreamError::State`] if the stream is started or closed, and
    /// [`StreamError::HandleCorruption`] if the stream's binding is no longer registered; the
    /// engine's error otherwise.
    pub fn start(&mut self) -> StreamResult<()> {
        if !matches!(
            self.state,
            StreamState::Opened | StreamState::Stopped | StreamState::Aborted
        ) {
            return Err(self.conflict("start"));
        }
        // A started stream whose binding cannot be resolved would abort on its first block.
        self.engine.registry.get(self.handle)?;
        self.with_native("start", |native, stream| native.start_stream(stream))?;
        self.transition(StreamState::Started);
        Ok(())
    }

    /// Stops the stream after the buffers already accepted have played.
    ///
    /// # Errors
    ///
    /// [`StreamError::State`] unless the stream is started; the engine's error otherwise.
    pub fn stop(&mut self) -> StreamResult<()> {
        if self.state != StreamState::Started {
            return Err(self.conflict("stop"));
        }
        self.with_native("stop", |native, stream| native.stop_stream(stream))?;
        self.transition(StreamState::Stopped);
        Ok(())
    }

    /// Stops the stream immediately, discarding pending buffers.
    ///
    /// # Errors
    ///
    /// [`StreamError::State`] unless the stream is started; the engine's error otherwise.
    pub fn abort(&mut self) -> StreamResult<()> {
        if self.state != StreamState::Started {
            return Err(self.conflict("abort"));
        }
        self.with_native("abort", |native, stream| native.abort_stream(stream))?;
        self.transition(StreamState::Aborted);
        Ok(())
    }

    /// Closes the stream. Closing a closed stream does nothing.
    ///
    /// The handle is released only after the engine confirmed the close, which also
    /// guarantees that no callback is still running.
    ///
    /// # Errors
    ///
    /// The engine's error, in which case the stream keeps its state and handle and the close
    /// can be retried.
    pub fn close(&mut self) -> StreamResult<()> {
        let Some(stream) = self.native.as_mut() else {
            return Ok(());
        };
        self.engine.native.close_stream(stream)?;
        self.native = None;
        let binding = self.engine.registry.untrack(self.handle);
        drop(binding);
        self.transition(StreamState::Closed);
        Ok(())
    }

    /// Actual latencies and sample rate.
    ///
    /// # Errors
    ///
    /// [`StreamError::State`] if the stream is closed, [`ErrorCode::BadStreamPtr`] if the
    /// engine has no information.
    pub fn info(&self) -> StreamResult<StreamInfo> {
        let stream = self.native_ref("query")?;
        self.engine
            .native
            .stream_info(stream)
            .ok_or_else(|| NativeError::Code(ErrorCode::BadStreamPtr).into())
    }

    /// Current stream time, on the same clock as the callback's time info.
    ///
    /// # Errors
    ///
    /// [`StreamError::State`] if the stream is closed.
    pub fn time(&self) -> StreamResult<Duration> {
        let stream = self.native_ref("query")?;
        Ok(self.engine.native.stream_time(stream))
    }

    /// Fraction of the available CPU time used by the callback, 0.0 for blocking streams.
    ///
    /// # Errors
    ///
    /// [`StreamError::State`] if the stream is closed.
    pub fn cpu_load(&self) -> StreamResult<f64> {
        let stream = self.native_ref("query")?;
        Ok(self.engine.native.cpu_load(stream))
    }

    /// Frames that can be read without blocking.
    ///
    /// # Errors
    ///
    /// [`StreamError::State`] if the stream is closed or callback-bound.
    pub fn available_to_read(&self) -> StreamResult<usize> {
        let stream = self.blocking_native_ref("query")?;
        Ok(self.engine.native.read_available(stream)?)
    }

    /// Frames that can be written without blocking.
    ///
    /// # Errors
    ///
    /// [`StreamError::State`] if the stream is closed or callback-bound.
    pub fn available_to_write(&self) -> StreamResult<usize> {
        let stream = self.blocking_native_ref("query")?;
        Ok(self.engine.native.write_available(stream)?)
    }

    fn conflict(&self, operation: &'static str) -> StreamError {
        StreamError::state(operation, self.mode(), self.state)
    }

    fn transition(&mut self, next: StreamState) {
        tracing::debug!(handle = %self.handle, from = %self.state, to = %next, "stream state changed");
        self.state = next;
    }

    fn with_native<R>(
        &mut self,
        operation: &'static str,
        f: impl FnOnce(&N, &mut N::Stream) -> NativeResult<R>,
    ) -> StreamResult<R> {
        let conflict = self.conflict(operation);
        match self.native.as_mut() {
            Some(stream) => Ok(f(&self.engine.native, stream)?),
            None => Err(conflict),
        }
    }

    fn native_ref(&self, operation: &'static str) -> StreamResult<&N::Stream> {
        self.native.as_ref().ok_or_else(|| self.conflict(operation))
    }

    fn blocking_native_ref(&self, operation: &'static str) -> StreamResult<&N::Stream> {
        if self.is_callback() {
            return Err(self.conflict(operation));
        }
        self.native_ref(operation)
    }

    fn require_transfer(&self, operation: &'static str) -> StreamResult<()> {
        if self.is_callback() || self.state != StreamState::Started {
            return Err(self.conflict(operation));
        }
        Ok(())
    }
}

impl<N: NativeEngine, I, O> fmt::Debug for Stream<N, I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("handle", &self.handle)
            .field("mode", &self.mode())
            .field("state", &self.state)
            .field("format", &self.format)
            .finish()
    }
}

impl<N: NativeEngine, I, O> Drop for Stream<N, I, O> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::warn!(
                handle = %self.handle,
                error = %err,
                "failed to close stream on drop, leaking it"
            );
            if let Some(native) = self.native.take() {
                std::mem::forget(native);
            }
            if let Some(dispatch) = self.dispatch.take() {
                Box::leak(dispatch);
            }
        }
    }
}
