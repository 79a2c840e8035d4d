//! Error codes reported by the native engine.

use std::fmt;

use super::devices::HostApiType;

/// Error codes of the native engine, with their native numeric values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
#[allow(missing_docs)]
pub enum ErrorCode {
    NotInitialized = -10000,
    UnanticipatedHostError = -9999,
    InvalidChannelCount = -9998,
    InvalidSampleRate = -9997,
    InvalidDevice = -9996,
    InvalidFlag = -9995,
    SampleFormatNotSupported = -9994,
    BadIODeviceCombination = -9993,
    InsufficientMemory = -9992,
    BufferTooBig = -9991,
    BufferTooSmall = -9990,
    NullCallback = -9989,
    BadStreamPtr = -9988,
    TimedOut = -9987,
    InternalError = -9986,
    DeviceUnavailable = -9985,
    IncompatibleHostApiSpecificStreamInfo = -9984,
    StreamIsStopped = -9983,
    StreamIsNotStopped = -9982,
    InputOverflowed = -9981,
    OutputUnderflowed = -9980,
    HostApiNotFound = -9979,
    InvalidHostApi = -9978,
    CanNotReadFromACallbackStream = -9977,
    CanNotWriteToACallbackStream = -9976,
    CanNotReadFromAnOutputOnlyStream = -9975,
    CanNotWriteToAnInputOnlyStream = -9974,
    IncompatibleStreamHostApi = -9973,
    BadBufferPtr = -9972,
}

impl ErrorCode {
    const ALL: [ErrorCode; 29] = [
        Self::NotInitialized,
        Self::UnanticipatedHostError,
        Self::InvalidChannelCount,
        Self::InvalidSampleRate,
        Self::InvalidDevice,
        Self::InvalidFlag,
        Self::SampleFormatNotSupported,
        Self::BadIODeviceCombination,
        Self::InsufficientMemory,
        Self::BufferTooBig,
        Self::BufferTooSmall,
        Self::NullCallback,
        Self::BadStreamPtr,
        Self::TimedOut,
        Self::InternalError,
        Self::DeviceUnavailable,
        Self::IncompatibleHostApiSpecificStreamInfo,
        Self::StreamIsStopped,
        Self::StreamIsNotStopped,
        Self::InputOverflowed,
        Self::OutputUnderflowed,
        Self::HostApiNotFound,
        Self::InvalidHostApi,
        Self::CanNotReadFromACallbackStream,
        Self::CanNotWriteToACallbackStream,
        Self::CanNotReadFromAnOutputOnlyStream,
        Self::CanNotWriteToAnInputOnlyStream,
        Self::IncompatibleStreamHostApi,
        Self::BadBufferPtr,
    ];

    /// Maps a native code to an [`ErrorCode`]. Returns `None` for success and unknown codes.
    pub fn from_raw(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|known| *known as i32 == code)
    }

    /// The native numeric value.
    pub const fn as_raw(self) -> i32 {
        self as i32
    }

    /// The engine's description of the code.
    pub const fn text(self) -> &'static str {
        match self {
            Self::NotInitialized => "PortAudio not initialized",
            Self::UnanticipatedHostError => "Unanticipated host error",
            Self::InvalidChannelCount => "Invalid number of channels",
            Self::InvalidSampleRate => "Invalid sample rate",
            Self::InvalidDevice => "Invalid device",
            Self::InvalidFlag => "Invalid flag",
            Self::SampleFormatNotSupported => "Sample format not supported",
            Self::BadIODeviceCombination => "Illegal combination of I/O devices",
            Self::InsufficientMemory => "Insufficient memory",
            Self::BufferTooBig => "Buffer too big",
            Self::BufferTooSmall => "Buffer too small",
            Self::NullCallback => "No callback routine specified",
            Self::BadStreamPtr => "Invalid stream pointer",
            Self::TimedOut => "Wait timed out",
            Self::InternalError => "Internal PortAudio error",
            Self::DeviceUnavailable => "Device unavailable",
            Self::IncompatibleHostApiSpecificStreamInfo => {
                "Incompatible host API specific stream info"
            }
            Self::StreamIsStopped => "Stream is stopped",
            Self::StreamIsNotStopped => "Stream is not stopped",
            Self::InputOverflowed => "Input overflowed",
            Self::OutputUnderflowed => "Output underflowed",
            Self::HostApiNotFound => "Host API not found",
            Self::InvalidHostApi => "Invalid host API",
            Self::CanNotReadFromACallbackStream => "Can't read from a callback stream",
            Self::CanNotWriteToACallbackStream => "Can't write to a callback stream",
            Self::CanNotReadFromAnOutputOnlyStream => "Can't read from an output only stream",
            Self::CanNotWriteToAnInputOnlyStream => "Can't write to an input only stream",
            Self::IncompatibleStreamHostApi => "Incompatible stream host API",
            Self::BadBufferPtr => "Bad buffer pointer",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

/// An error reported by the native engine.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NativeError {
    /// A documented engine error code.
    #[error("{0}")]
    Code(ErrorCode),

    /// A host-specific error the engine passed through.
    #[error("{host_api} error {code}: {text}")]
    UnanticipatedHost {
        /// Host API that raised it.
        host_api: HostApiType,
        /// Host-specific error code.
        code: i64,
        /// Host-specific description.
        text: String,
    },

    /// A code the engine is not documented to return.
    #[error("unknown engine error {0}")]
    Unknown(i32),
}

impl NativeError {
    /// Create an error from a native return code, `None` for success
    pub fn from_code(code: i32) -> Option<Self> {
        if code >= 0 {
            return None;
        }
        Some(match ErrorCode::from_raw(code) {
            Some(code) => Self::Code(code),
            None => Self::Unknown(code),
        })
    }

    /// The engine error code, if this is a documented code.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Code(code) => Some(*code),
            Self::UnanticipatedHost { .. } => Some(ErrorCode::UnanticipatedHostError),
            Self::Unknown(_) => None,
        }
    }

    /// Check if this is a buffer overflow or underflow
    pub fn is_xrun(&self) -> bool {
        matches!(
            self,
            Self::Code(ErrorCode::InputOverflowed | ErrorCode::OutputUnderflowed)
        )
    }

    /// Check if this is a recoverable error
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Code(code) => matches!(
                code,
                ErrorCode::InputOverflowed
                    | ErrorCode::OutputUnderflowed
                    | ErrorCode::TimedOut
                    | ErrorCode::StreamIsStopped
                    | ErrorCode::StreamIsNotStopped
            ),
            _ => false,
        }
    }
}

impl From<ErrorCode> for NativeError {
    fn from(code: ErrorCode) -> Self {
        Self::Code(code)
    }
}

/// Result type for native engine calls
pub type NativeResult<T> = Result<T, NativeError>;
