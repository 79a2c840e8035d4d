//! Error types and result utilities for stream operations.

use thiserror::Error;

use crate::host::NativeError;
use crate::registry::StreamHandle;
use crate::repr::ElementShape;
use crate::stream::{BindingMode, StreamState};
use crate::Side;

/// Convenience type alias for results that may contain a [`StreamError`].
pub type StreamResult<T> = Result<T, StreamError>;

/// A declared callback or buffer shape the engine cannot serve.
///
/// Always raised before any native resource is allocated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    /// The callback declares no parameters at all.
    #[error("too few parameters in stream callback")]
    TooFewParameters,

    /// A side with a device has no buffer parameter left to bind.
    #[error("too few buffer parameters in stream callback")]
    TooFewBuffers,

    /// A buffer was expected at this position.
    #[error("expected a buffer at parameter {position}, got {found}")]
    ExpectedBuffer {
        /// Zero-based parameter position.
        position: usize,
        /// The declared shape.
        found: String,
    },

    /// The buffer element has no sample encoding.
    #[error("invalid buffer at parameter {position}: {element} is not a supported sample type")]
    UnsupportedElement {
        /// Zero-based parameter or buffer position.
        position: usize,
        /// The declared element.
        element: ElementShape,
    },

    /// Something other than time info followed by status flags trails the buffers.
    #[error("invalid stream callback: unexpected {found} at parameter {position}")]
    InvalidTrailing {
        /// Zero-based parameter position.
        position: usize,
        /// The declared shape.
        found: String,
    },

    /// The callback declares a return value.
    #[error("stream callback must not return a value")]
    ReturnValue,

    /// A blocking stream side with a device was given no buffer.
    #[error("missing {side} buffer")]
    MissingBuffer {
        /// The side lacking a buffer.
        side: Side,
    },
}

/// A handle that does not resolve to a live binding.
///
/// On the realtime path this is fatal: the engine is delivering a block for a stream this
/// process does not know about.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("unknown stream handle {0}")]
pub struct HandleCorruption(pub StreamHandle);

/// Error types that can occur during stream operations.
#[derive(Error, Debug)]
pub enum StreamError {
    /// The declared callback or buffers cannot be bound.
    #[error("signature error: {0}")]
    Signature(#[from] SignatureError),

    /// The operation is not valid in the stream's current state or binding mode.
    #[error("cannot {operation} a {mode} stream that is {state}")]
    State {
        /// The attempted operation.
        operation: &'static str,
        /// Binding mode of the stream.
        mode: BindingMode,
        /// Lifecycle state of the stream.
        state: StreamState,
    },

    /// The engine reported an error; returned verbatim.
    #[error(transparent)]
    Native(#[from] NativeError),

    /// A blocking buffer no longer matches the stream's channel layout.
    #[error("{side} buffer mismatch: {reason}")]
    BufferMismatch {
        /// Side of the offending buffer.
        side: Side,
        /// What is wrong with it.
        reason: String,
    },

    /// A handle was not found in the registry.
    #[error(transparent)]
    HandleCorruption(#[from] HandleCorruption),

    /// A configuration value could not be resolved.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

impl StreamError {
    /// Create a lifecycle state error
    pub fn state(operation: &'static str, mode: BindingMode, state: StreamState) -> Self {
        Self::State {
            operation,
            mode,
            state,
        }
    }

    /// Create a buffer mismatch error
    pub fn buffer_mismatch(side: Side, reason: impl Into<String>) -> Self {
        Self::BufferMismatch {
            side,
            reason: reason.into(),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(details: impl Into<String>) -> Self {
        Self::InvalidParameter(details.into())
    }

    /// The engine error, if this error came from the engine.
    pub fn native(&self) -> Option<&NativeError> {
        match self {
            Self::Native(err) => Some(err),
            _ => None,
        }
    }

    /// Check if this error was raised before any native call was made
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            Self::Signature(_)
                | Self::State { .. }
                | Self::BufferMismatch { .. }
                | Self::InvalidParameter(_)
        )
    }
}
