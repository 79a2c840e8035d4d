//! The engine context: owns the native engine, the handle registry and the device catalog.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::binder::BindingRegistry;
use crate::blocking::BlockingBuffer;
use crate::callback::StreamCallback;
use crate::config::StreamConfig;
use crate::error::StreamResult;
use crate::format;
use crate::host::{
    DeviceCatalog, DeviceInfo, HostApiInfo, HostApiType, NativeEngine, StreamParameters,
};
use crate::stream::{Stream, native_side};

/// State shared between an engine and its streams.
pub(crate) struct EngineShared<N> {
    pub(crate) native: N,
    pub(crate) registry: Arc<BindingRegistry>,
    catalog: RwLock<Option<Arc<DeviceCatalog>>>,
}

/// An initialized native audio engine.
///
/// Streams keep the engine's shared state alive, so an `Engine` may be terminated or dropped
/// while streams are still open; those streams then fail with the engine's own errors.
/// Dropping an engine that was not terminated terminates it.
pub struct Engine<N: NativeEngine> {
    shared: Arc<EngineShared<N>>,
    terminated: bool,
}

impl<N: NativeEngine> Engine<N> {
    /// Initializes `native` and wraps it.
    ///
    /// # Errors
    ///
    /// The engine's error if it fails to initialize.
    pub fn initialize(native: N) -> StreamResult<Self> {
        native.initialize()?;
        tracing::info!(version = %native.version_text(), "audio engine initialized");
        Ok(Self {
            shared: Arc::new(EngineShared {
                native,
                registry: Arc::new(BindingRegistry::new()),
                catalog: RwLock::new(None),
            }),
            terminated: false,
        })
    }

    /// Terminates the engine and drops the cached device catalog.
    ///
    /// # Errors
    ///
    /// The engine's error if it fails to terminate.
    pub fn terminate(mut self) -> StreamResult<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> StreamResult<()> {
        self.terminated = true;
        let live = self.shared.registry.len();
        if live > 0 {
            tracing::warn!(live, "terminating audio engine with streams still open");
        }
        self.shared.catalog.write().take();
        self.shared.native.terminate()?;
        tracing::info!("audio engine terminated");
        Ok(())
    }

    /// The native engine.
    pub fn native(&self) -> &N {
        &self.shared.native
    }

    /// Engine version number.
    pub fn version(&self) -> i32 {
        self.shared.native.version()
    }

    /// Engine version text.
    pub fn version_text(&self) -> String {
        self.shared.native.version_text()
    }

    /// The device catalog, read from the engine on first use and cached until terminate.
    ///
    /// # Errors
    ///
    /// The engine's error if enumeration fails. Nothing is cached in that case.
    pub fn catalog(&self) -> StreamResult<Arc<DeviceCatalog>> {
        if let Some(catalog) = self.shared.catalog.read().as_ref() {
            return Ok(Arc::clone(catalog));
        }
        let loaded = Arc::new(DeviceCatalog::load(&self.shared.native)?);
        let mut slot = self.shared.catalog.write();
        // Another thread may have loaded it meanwhile; keep the first.
        let catalog = slot.get_or_insert(loaded);
        tracing::debug!(
            host_apis = catalog.host_apis().len(),
            devices = catalog.devices().len(),
            "device catalog loaded"
        );
        Ok(Arc::clone(catalog))
    }

    /// Every host API.
    ///
    /// # Errors
    ///
    /// As [`Engine::catalog`].
    pub fn host_apis(&self) -> StreamResult<Vec<HostApiInfo>> {
        Ok(self.catalog()?.host_apis().to_vec())
    }

    /// Every device.
    ///
    /// # Errors
    ///
    /// As [`Engine::catalog`].
    pub fn devices(&self) -> StreamResult<Vec<Arc<DeviceInfo>>> {
        Ok(self.catalog()?.devices().to_vec())
    }

    /// The default host API.
    ///
    /// # Errors
    ///
    /// As [`DeviceCatalog::default_host_api`].
    pub fn default_host_api(&self) -> StreamResult<HostApiInfo> {
        Ok(self.catalog()?.default_host_api()?.clone())
    }

    /// The host API of family `api_type`.
    ///
    /// # Errors
    ///
    /// As [`DeviceCatalog::host_api`].
    pub fn host_api(&self, api_type: HostApiType) -> StreamResult<HostApiInfo> {
        Ok(self.catalog()?.host_api(api_type)?.clone())
    }

    /// The default input device.
    ///
    /// # Errors
    ///
    /// As [`DeviceCatalog::default_input_device`].
    pub fn default_input_device(&self) -> StreamResult<Arc<DeviceInfo>> {
        Ok(self.catalog()?.default_input_device()?)
    }

    /// The default output device.
    ///
    /// # Errors
    ///
    /// As [`DeviceCatalog::default_output_device`].
    pub fn default_output_device(&self) -> StreamResult<Arc<DeviceInfo>> {
        Ok(self.catalog()?.default_output_device()?)
    }

    /// Opens a callback stream.
    ///
    /// The sample encoding and layout of each side are inferred from the callback's
    /// parameters; the stream starts in [`StreamState::Opened`](crate::StreamState::Opened).
    ///
    /// # Errors
    ///
    /// [`StreamError::Signature`](crate::StreamError::Signature) if the callback cannot be
    /// bound (no native call is made), otherwise the engine's error.
    pub fn open_stream<F, M>(&self, params: &StreamParameters, callback: F) -> StreamResult<Stream<N>>
    where
        F: StreamCallback<M>,
        M: 'static,
    {
        Stream::open_callback(&self.shared, params, callback)
    }

    /// Opens a blocking stream transferring through `input` and `output`.
    ///
    /// Pass `()` for a side without a device.
    ///
    /// # Errors
    ///
    /// As [`Engine::open_stream`].
    pub fn open_blocking_stream<I, O>(
        &self,
        params: &StreamParameters,
        input: I,
        output: O,
    ) -> StreamResult<Stream<N, I, O>>
    where
        I: BlockingBuffer,
        O: BlockingBuffer,
    {
        Stream::open_blocking(&self.shared, params, input, output)
    }

    /// Opens a callback stream on the default devices.
    ///
    /// A side with zero channels gets no device. The remaining parameters follow
    /// [`StreamParameters::high_latency`].
    ///
    /// # Errors
    ///
    /// [`ErrorCode::DeviceUnavailable`](crate::ErrorCode::DeviceUnavailable) if a side with
    /// channels has no default device, otherwise as [`Engine::open_stream`].
    pub fn open_default_stream<F, M>(
        &self,
        input_channels: usize,
        output_channels: usize,
        sample_rate: f64,
        frames_per_buffer: usize,
        callback: F,
    ) -> StreamResult<Stream<N>>
    where
        F: StreamCallback<M>,
        M: 'static,
    {
        let params =
            self.default_parameters(input_channels, output_channels, sample_rate, frames_per_buffer)?;
        self.open_stream(&params, callback)
    }

    /// Opens a blocking stream on the default devices.
    ///
    /// # Errors
    ///
    /// As [`Engine::open_default_stream`].
    pub fn open_default_blocking_stream<I, O>(
        &self,
        input_channels: usize,
        output_channels: usize,
        sample_rate: f64,
        frames_per_buffer: usize,
        input: I,
        output: O,
    ) -> StreamResult<Stream<N, I, O>>
    where
        I: BlockingBuffer,
        O: BlockingBuffer,
    {
        let params =
            self.default_parameters(input_channels, output_channels, sample_rate, frames_per_buffer)?;
        self.open_blocking_stream(&params, input, output)
    }

    fn default_parameters(
        &self,
        input_channels: usize,
        output_channels: usize,
        sample_rate: f64,
        frames_per_buffer: usize,
    ) -> StreamResult<StreamParameters> {
        let catalog = self.catalog()?;
        let input = if input_channels > 0 {
            Some(catalog.default_input_device()?)
        } else {
            None
        };
        let output = if output_channels > 0 {
            Some(catalog.default_output_device()?)
        } else {
            None
        };
        Ok(StreamParameters::high_latency(input, output)
            .with_channels(input_channels, output_channels)
            .with_sample_rate(sample_rate)
            .with_frames_per_buffer(frames_per_buffer))
    }

    /// Checks whether a callback stream shaped like `callback` could be opened with `params`.
    ///
    /// No stream is opened and nothing is registered.
    ///
    /// # Errors
    ///
    /// [`StreamError::Signature`](crate::StreamError::Signature) if the callback cannot be
    /// bound, otherwise the engine's verdict.
    pub fn is_callback_format_supported<F, M>(
        &self,
        params: &StreamParameters,
        _callback: &F,
    ) -> StreamResult<()>
    where
        F: StreamCallback<M>,
        M: 'static,
    {
        let format = format::infer_callback(&F::signature(), params)?;
        self.query_format(params, &format)
    }

    /// Checks whether a blocking stream with buffers `I` and `O` could be opened with `params`.
    ///
    /// # Errors
    ///
    /// As [`Engine::is_callback_format_supported`].
    pub fn is_blocking_format_supported<I, O>(&self, params: &StreamParameters) -> StreamResult<()>
    where
        I: BlockingBuffer,
        O: BlockingBuffer,
    {
        let format = format::infer_blocking(I::shape(), O::shape(), params)?;
        self.query_format(params, &format)
    }

    fn query_format(
        &self,
        params: &StreamParameters,
        format: &format::StreamFormat,
    ) -> StreamResult<()> {
        let input = native_side(&params.input, format.input);
        let output = native_side(&params.output, format.output);
        self.shared
            .native
            .is_format_supported(input.as_ref(), output.as_ref(), params.sample_rate)?;
        Ok(())
    }

    /// Number of streams currently registered.
    pub fn live_streams(&self) -> usize {
        self.shared.registry.len()
    }

    /// Resolves `config` against the device catalog.
    ///
    /// # Errors
    ///
    /// [`StreamError::InvalidParameter`](crate::StreamError::InvalidParameter) for an unknown
    /// device name, or the catalog's errors.
    pub fn parameters_for(&self, config: &StreamConfig) -> StreamResult<StreamParameters> {
        config.resolve(&*self.catalog()?)
    }
}

impl<N: NativeEngine> Drop for Engine<N> {
    fn drop(&mut self) {
        if self.terminated {
            return;
        }
        if let Err(err) = self.shutdown() {
            tracing::warn!(error = %err, "failed to terminate audio engine on drop");
        }
    }
}

impl<N: NativeEngine> std::fmt::Debug for Engine<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("live_streams", &self.live_streams())
            .field("terminated", &self.terminated)
            .finish()
    }
}
