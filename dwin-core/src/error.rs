//! Engine error type

use dwin_protocol::FrameError;

/// Errors returned by the DWIN engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Zero-length request or out-of-range argument
    InvalidArgument,
    /// Engine has not been initialized
    NotReady,
    /// A transaction is already open
    Busy,
    /// Requested ring capacity exceeds the reserved storage
    OutOfMemory,
    /// Request does not fit the transmit frame buffer
    FrameTooLarge,
    /// Every callback slot is taken
    CallbackTableFull,
    /// Receive ring has no room for another byte
    RingOverflow,
    /// The transport refused an operation
    Transport,
}

impl From<FrameError> for Error {
    fn from(e: FrameError) -> Self {
        match e {
            FrameError::EmptyPayload | FrameError::InvalidFrame => Error::InvalidArgument,
            FrameError::PayloadTooLarge => Error::FrameTooLarge,
        }
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            Error::InvalidArgument => "invalid argument",
            Error::NotReady => "engine not initialized",
            Error::Busy => "transaction in progress",
            Error::OutOfMemory => "ring capacity exceeds reserved storage",
            Error::FrameTooLarge => "frame exceeds transmit buffer",
            Error::CallbackTableFull => "callback table full",
            Error::RingOverflow => "receive ring overflow",
            Error::Transport => "transport error",
        };
        f.write_str(msg)
    }
}

/// Result type for engine operations
pub type Result<T> = core::result::Result<T, Error>;
