//! Realtime marshaling: the entry point the engine calls once per block.
//!
//! # Key Design Principles
//!
//! ## Zero Allocation
//! Resolving the handle takes the registry's read lock and clones an `Arc`. Building the views
//! only rewrites pointer and length fields of headers allocated when the stream was bound.
//!
//! ## No Silent Failure
//! The engine has no channel for reporting an error back from a callback. A panic in user code,
//! or a handle that no longer resolves, is logged with a backtrace and the process is aborted.
//! Continuing would mean playing garbage or touching freed state.

use std::any::Any;
use std::backtrace::Backtrace;
use std::ffi::{c_int, c_ulong, c_void};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::binder::{BindingRegistry, Invocation};
use crate::error::HandleCorruption;
use crate::host::native::{CALLBACK_CONTINUE, CallbackTarget, RawTimeInfo};
use crate::registry::StreamHandle;

/// A callback stream's route from the engine back to its binding.
///
/// Boxed by the stream; the box's address is the engine's `user_data` and stays fixed until
/// the native stream is closed.
pub(crate) struct Dispatch {
    registry: Arc<BindingRegistry>,
    handle: StreamHandle,
}

/// Why a block could not be delivered.
#[derive(Debug, thiserror::Error)]
pub(crate) enum DispatchFault {
    #[error(transparent)]
    Corruption(#[from] HandleCorruption),
    #[error("stream {0} is blocking but received a callback")]
    NotCallback(StreamHandle),
}

impl Dispatch {
    pub(crate) fn new(registry: Arc<BindingRegistry>, handle: StreamHandle) -> Box<Self> {
        Box::new(Self { registry, handle })
    }

    /// The native callback target for this dispatch.
    pub(crate) fn target(&self) -> CallbackTarget {
        CallbackTarget {
            entry: stream_callback,
            user_data: std::ptr::from_ref(self).cast_mut().cast(),
        }
    }

    /// Resolves the binding and hands it the block.
    ///
    /// # Safety
    ///
    /// `invocation` must follow the engine's callback contract for the bound stream.
    pub(crate) unsafe fn deliver(&self, invocation: &Invocation) -> Result<(), DispatchFault> {
        let binding = self.registry.get(self.handle)?;
        if !binding.is_callback() {
            return Err(DispatchFault::NotCallback(self.handle));
        }
        // SAFETY: forwarded; the engine runs one invocation per stream at a time.
        unsafe { binding.marshal(invocation) };
        Ok(())
    }
}

/// Entry point registered with the engine for every callback stream.
///
/// # Safety
///
/// `user_data` must be the address of a live [`Dispatch`] and the buffers must follow the
/// engine's callback contract.
pub(crate) unsafe extern "C" fn stream_callback(
    input: *const c_void,
    output: *mut c_void,
    frames: c_ulong,
    time_info: *const RawTimeInfo,
    status: c_ulong,
    user_data: *mut c_void,
) -> c_int {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        // SAFETY: registered as the address of the stream's boxed `Dispatch`.
        let Some(dispatch) = (unsafe { user_data.cast::<Dispatch>().as_ref() }) else {
            return Err(None);
        };
        let invocation = Invocation {
            input,
            output,
            frames: frames as usize,
            time_info,
            status: u64::from(status),
        };
        // SAFETY: the engine upholds the buffer contract.
        unsafe { dispatch.deliver(&invocation) }.map_err(Some)
    }));

    match outcome {
        Ok(Ok(())) => CALLBACK_CONTINUE,
        Ok(Err(Some(fault))) => fatal(&fault.to_string()),
        Ok(Err(None)) => fatal("stream callback invoked without user data"),
        Err(payload) => fatal(&panic_message(payload.as_ref())),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cold]
fn fatal(message: &str) -> ! {
    let backtrace = Backtrace::force_capture();
    tracing::error!(%message, "fatal error in stream callback, aborting");
    eprintln!("fatal error in stream callback: {message}\n{backtrace}");
    std::process::abort()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::{bind_blocking, bind_callback};
    use crate::format::{SideFormat, StreamFormat};
    use crate::repr::SampleEncoding;
    use crate::views::Interleaved;
    use crate::ChannelLayout;

    #[test]
    fn entry_point_delivers_through_the_registry() {
        let registry = Arc::new(BindingRegistry::new());
        let format = StreamFormat {
            output: Some(SideFormat {
                encoding: SampleEncoding::Int16,
                layout: ChannelLayout::Interleaved,
                channels: 1,
            }),
            single: Some(crate::Side::Output),
            ..StreamFormat::default()
        };
        let callback = |out: &mut Interleaved<i16>| {
            for (i, s) in out.iter_mut().enumerate() {
                *s = i as i16;
            }
        };
        let handle = bind_callback(&registry, format, callback).commit();
        let dispatch = Dispatch::new(Arc::clone(&registry), handle);
        let target = dispatch.target();

        let mut out = [0i16; 4];
        let code = unsafe {
            (target.entry)(
                std::ptr::null(),
                out.as_mut_ptr().cast(),
                4,
                std::ptr::null(),
                0,
                target.user_data,
            )
        };
        assert_eq!(code, CALLBACK_CONTINUE);
        assert_eq!(out, [0, 1, 2, 3]);
    }

    #[test]
    fn untracked_handle_is_corruption() {
        let registry = Arc::new(BindingRegistry::new());
        let handle = bind_blocking(&registry).handle();
        let dispatch = Dispatch::new(registry, handle);
        let invocation = Invocation {
            input: std::ptr::null(),
            output: std::ptr::null_mut(),
            frames: 0,
            time_info: std::ptr::null(),
            status: 0,
        };
        let fault = unsafe { dispatch.deliver(&invocation) }.expect_err("untracked");
        assert!(matches!(fault, DispatchFault::Corruption(HandleCorruption(h)) if h == handle));
    }

    #[test]
    fn blocking_bindings_refuse_callbacks() {
        let registry = Arc::new(BindingRegistry::new());
        let handle = bind_blocking(&registry).commit();
        let dispatch = Dispatch::new(registry, handle);
        let invocation = Invocation {
            input: std::ptr::null(),
            output: std::ptr::null_mut(),
            frames: 16,
            time_info: std::ptr::null(),
            status: 0,
        };
        let fault = unsafe { dispatch.deliver(&invocation) }.expect_err("blocking");
        assert_eq!(fault.to_string(), format!("stream {handle} is blocking but received a callback"));
    }

    #[test]
    fn panic_payloads_are_readable() {
        let payload = panic::catch_unwind(|| panic!("boom {}", 7)).expect_err("panicked");
        assert_eq!(panic_message(payload.as_ref()), "boom 7");
        let payload = panic::catch_unwind(|| std::panic::panic_any(5u8)).expect_err("panicked");
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
