//! Stream binder: builds the per-stream binding context and registers it under a handle.
//!
//! A callback stream's context owns the user callback, one view per side and the storage for
//! the per-block metadata. The views are allocated here, once; the realtime path only rewrites
//! their pointers.

use std::cell::UnsafeCell;
use std::ffi::c_void;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::Side;
use crate::callback::{Block, StatusFlags, StreamCallback, TimeInfo};
use crate::format::StreamFormat;
use crate::host::native::RawTimeInfo;
use crate::registry::{HandleRegistry, StreamHandle};
use crate::views::sealed::Bind;

/// Registry of the binding contexts of all live streams of an engine.
pub(crate) type BindingRegistry = HandleRegistry<dyn RealtimeBinding>;

/// Raw arguments of one realtime invocation.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Invocation {
    pub input: *const c_void,
    pub output: *mut c_void,
    pub frames: usize,
    pub time_info: *const RawTimeInfo,
    pub status: u64,
}

/// Binding state reachable from the realtime thread through a handle.
pub(crate) trait RealtimeBinding: Send + Sync {
    /// Returns true if the engine may deliver callbacks for this binding.
    fn is_callback(&self) -> bool;

    /// Presents one block to the user callback.
    ///
    /// # Safety
    ///
    /// The pointers in `invocation` must follow the engine's callback contract for this
    /// binding's format, and no other invocation for the same binding may be in flight.
    unsafe fn marshal(&self, invocation: &Invocation);
}

struct ContextState<F, I, O> {
    callback: F,
    input: I,
    output: O,
    time_info: TimeInfo,
}

/// Binding context of a callback stream.
pub(crate) struct CallbackContext<F: StreamCallback<M>, M> {
    format: StreamFormat,
    state: UnsafeCell<ContextState<F, F::Input, F::Output>>,
    _marker: PhantomData<fn() -> M>,
}

// SAFETY: the state is only touched from `marshal`, and the engine runs at most one invocation
// per stream at a time. Caller threads never touch the context after binding.
unsafe impl<F: StreamCallback<M>, M> Sync for CallbackContext<F, M> {}

impl<F: StreamCallback<M>, M> CallbackContext<F, M> {
    pub(crate) fn new(format: StreamFormat, callback: F) -> Self {
        Self {
            state: UnsafeCell::new(ContextState {
                callback,
                input: F::Input::unbound(format.channels(Side::Input)),
                output: F::Output::unbound(format.channels(Side::Output)),
                time_info: TimeInfo::default(),
            }),
            format,
            _marker: PhantomData,
        }
    }
}

impl<F, M> RealtimeBinding for CallbackContext<F, M>
where
    F: StreamCallback<M>,
    M: 'static,
{
    fn is_callback(&self) -> bool {
        true
    }

    unsafe fn marshal(&self, invocation: &Invocation) {
        // SAFETY: exclusive per the one-invocation-in-flight contract.
        let state = unsafe { &mut *self.state.get() };
        let frames = invocation.frames;

        // Channel counts come from the format, never from the views the callback held.
        // Device-less sides are rebound to zero channels and stay empty.
        let input_channels = self.format.channels(Side::Input);
        let output_channels = self.format.channels(Side::Output);
        let input = if self.format.input.is_some() {
            invocation.input.cast_mut()
        } else {
            std::ptr::null_mut()
        };
        let output = if self.format.output.is_some() {
            invocation.output
        } else {
            std::ptr::null_mut()
        };
        // SAFETY: the engine's buffers match the inferred format of each bound side.
        unsafe {
            state.input.rebind(input, input_channels, frames);
            state.output.rebind(output, output_channels, frames);
        }
        if self.format.time_info && !invocation.time_info.is_null() {
            // SAFETY: non-null and valid for the invocation.
            state.time_info = TimeInfo::from_raw(unsafe { &*invocation.time_info });
        }
        let status = if self.format.status_flags {
            StatusFlags::from_bits_truncate(invocation.status)
        } else {
            StatusFlags::empty()
        };

        state.callback.process(Block {
            input: &mut state.input,
            output: &mut state.output,
            single: self.format.single.unwrap_or(Side::Output),
            time_info: &state.time_info,
            status,
        });
    }
}

/// Binding context of a blocking stream. The engine never invokes it.
pub(crate) struct BlockingContext;

impl RealtimeBinding for BlockingContext {
    fn is_callback(&self) -> bool {
        false
    }

    unsafe fn marshal(&self, _invocation: &Invocation) {}
}

/// A registered handle that is untracked again on drop unless committed.
///
/// Keeps the registry consistent when the native open fails after binding.
pub(crate) struct BoundHandle<'a> {
    registry: &'a BindingRegistry,
    handle: StreamHandle,
    committed: bool,
}

impl BoundHandle<'_> {
    pub(crate) fn handle(&self) -> StreamHandle {
        self.handle
    }

    /// Keeps the registration.
    pub(crate) fn commit(mut self) -> StreamHandle {
        self.committed = true;
        self.handle
    }
}

impl Drop for BoundHandle<'_> {
    fn drop(&mut self) {
        if !self.committed {
            let released = self.registry.untrack(self.handle);
            tracing::debug!(handle = %self.handle, "released binding of unopened stream");
            drop(released);
        }
    }
}

/// Binds a callback stream.
pub(crate) fn bind_callback<F, M>(
    registry: &BindingRegistry,
    format: StreamFormat,
    callback: F,
) -> BoundHandle<'_>
where
    F: StreamCallback<M>,
    M: 'static,
{
    let context: Arc<dyn RealtimeBinding> = Arc::new(CallbackContext::new(format, callback));
    register(registry, context)
}

/// Binds a blocking stream.
pub(crate) fn bind_blocking(registry: &BindingRegistry) -> BoundHandle<'_> {
    register(registry, Arc::new(BlockingContext))
}

fn register(registry: &BindingRegistry, context: Arc<dyn RealtimeBinding>) -> BoundHandle<'_> {
    let handle = registry.track(context);
    tracing::debug!(%handle, "bound stream");
    BoundHandle {
        registry,
        handle,
        committed: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::SideFormat;
    use crate::repr::SampleEncoding;
    use crate::views::{Interleaved, NonInterleaved};
    use crate::ChannelLayout;

    fn side(layout: ChannelLayout, channels: usize) -> Option<SideFormat> {
        Some(SideFormat {
            encoding: SampleEncoding::Float32,
            layout,
            channels,
        })
    }

    #[test]
    fn uncommitted_binding_is_released() {
        let registry = BindingRegistry::new();
        let handle = {
            let bound = bind_blocking(&registry);
            assert!(registry.contains(bound.handle()));
            bound.handle()
        };
        assert!(!registry.contains(handle));

        let committed = bind_blocking(&registry).commit();
        assert!(registry.contains(committed));
        assert!(!registry.get(committed).expect("bound").is_callback());
    }

    #[test]
    fn marshal_rebinds_only_bound_sides() {
        let registry = BindingRegistry::new();
        let format = StreamFormat {
            output: side(ChannelLayout::Interleaved, 2),
            ..StreamFormat::default()
        };
        let seen = Arc::new(parking_lot::Mutex::new((usize::MAX, usize::MAX)));
        let sink = Arc::clone(&seen);
        let callback = move |input: &mut Interleaved<f32>, output: &mut Interleaved<f32>| {
            output.fill(0.25);
            *sink.lock() = (input.len(), output.len());
        };
        let handle = bind_callback(&registry, format, callback).commit();

        let mut out = vec![0.0f32; 8];
        let mut stray = vec![1.0f32; 8];
        let invocation = Invocation {
            input: stray.as_mut_ptr().cast(),
            output: out.as_mut_ptr().cast(),
            frames: 4,
            time_info: std::ptr::null(),
            status: 0,
        };
        let binding = registry.get(handle).expect("bound");
        unsafe { binding.marshal(&invocation) };

        assert_eq!(*seen.lock(), (0, 8));
        assert!(out.iter().all(|&s| s == 0.25));
        assert!(stray.iter().all(|&s| s == 1.0));
    }

    #[test]
    fn non_interleaved_headers_are_sized_at_bind_time() {
        let registry = BindingRegistry::new();
        let format = StreamFormat {
            input: side(ChannelLayout::NonInterleaved, 3),
            single: Some(Side::Input),
            ..StreamFormat::default()
        };
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback = move |input: &mut NonInterleaved<f32>| {
            sink.lock().push((input.channels(), input.frames()));
        };
        let handle = bind_callback(&registry, format, callback).commit();
        let binding = registry.get(handle).expect("bound");

        let mut channels = [[0.0f32; 5]; 3];
        let mut pointers: Vec<*mut f32> = channels.iter_mut().map(|c| c.as_mut_ptr()).collect();
        for frames in [5, 2] {
            let invocation = Invocation {
                input: pointers.as_mut_ptr().cast_const().cast(),
                output: std::ptr::null_mut(),
                frames,
                time_info: std::ptr::null(),
                status: 0,
            };
            unsafe { binding.marshal(&invocation) };
        }
        assert_eq!(*seen.lock(), vec![(3, 5), (3, 2)]);
    }

    #[test]
    fn replaced_views_are_resized_to_the_stream_format() {
        let registry = BindingRegistry::new();
        let format = StreamFormat {
            output: side(ChannelLayout::NonInterleaved, 2),
            single: Some(Side::Output),
            ..StreamFormat::default()
        };
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback = move |output: &mut NonInterleaved<f32>| {
            sink.lock().push(output.channels());
            *output = NonInterleaved::unbound(3);
        };
        let handle = bind_callback(&registry, format, callback).commit();
        let binding = registry.get(handle).expect("bound");

        let mut channels = [[0.0f32; 4]; 2];
        let mut pointers: Vec<*mut f32> = channels.iter_mut().map(|c| c.as_mut_ptr()).collect();
        let invocation = Invocation {
            input: std::ptr::null(),
            output: pointers.as_mut_ptr().cast(),
            frames: 4,
            time_info: std::ptr::null(),
            status: 0,
        };
        for _ in 0..2 {
            unsafe { binding.marshal(&invocation) };
        }
        assert_eq!(*seen.lock(), vec![2, 2]);
    }
}
