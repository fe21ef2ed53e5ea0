//! Errors raised at the guest/host boundary
//!
//! Every failure of a host call is classified as exactly one WASI error
//! number, which is written into the call's status slot before the call traps.
//! The remaining variants describe failures outside of a guest call, e.g. when
//! a module is instantiated.
//!
//! ## Authors
//!
//! The Veracruz Development Team.
//!
//! ## Licensing and copyright notice
//!
//! See the `LICENSE.md` file in the repository root directory for
//! information on licensing and copyright.

use err_derive::Error;
use num_derive::{FromPrimitive, ToPrimitive};
use serde::{Deserialize, Serialize};
use std::string::String;

////////////////////////////////////////////////////////////////////////////////
// WASI error numbers.
////////////////////////////////////////////////////////////////////////////////

/// The subset of WASI preview1 error numbers this bridge reports.
///
/// See `wasi-libc/libc-bottom-half/headers/public/wasi/api.h`.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, FromPrimitive, ToPrimitive, Serialize, Deserialize,
)]
#[repr(u16)]
pub enum ErrNo {
    /// No error occurred.
    Success = 0,
    /// Permission denied.
    Acces = 2,
    /// Invalid argument.
    Inval = 28,
    /// I/O error.
    Io = 29,
}

impl ErrNo {
    /// The value placed into an `I32` status slot.
    #[inline]
    pub fn as_status(self) -> i32 {
        self as u16 as i32
    }
}

////////////////////////////////////////////////////////////////////////////////
// Bridge errors.
////////////////////////////////////////////////////////////////////////////////

/// A failure at the guest/host boundary.
///
/// The first four families (`InvalidArgument`, `PermissionDenied`, the memory
/// errors and `RandomnessUnavailable`) are the guest-visible taxonomy: their
/// display strings are the short diagnostics carried by the trap.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The call's arity or argument kinds do not match the declared signature,
    /// or an enumerated argument is out of range.
    #[error(display = "Invalid arguments")]
    InvalidArgument,
    /// The calling instance lacks the capability the operation is gated on.
    #[error(display = "Not permitted")]
    PermissionDenied,
    /// The instance has no linear memory attached.
    #[error(display = "Invalid memory")]
    InvalidMemory,
    /// A guest supplied span falls outside of the guest's linear memory.
    #[error(display = "Invalid memory")]
    OutOfBounds {
        /// First byte of the span.
        address: u64,
        /// Length of the span in bytes.
        length: u64,
    },
    /// The host could not produce random bytes.
    #[error(display = "Random source unavailable")]
    RandomnessUnavailable,
    /// A host object lock was poisoned.
    #[error(display = "Failed to obtain lock {:?}.", _0)]
    FailedToObtainLock(String),
    /// The guest called `proc_exit`.  Not an error from the guest's point of
    /// view; it is delivered as a trap so that guest execution stops.
    #[error(display = "Guest exited with code {}.", _0)]
    Exit(i32),
    /// A guest module imports a name that is not in the export table.
    #[error(display = "Unknown host function '{}'.", _0)]
    UnknownHostFunction(String),
    /// A guest module is malformed or imports something other than a function.
    #[error(display = "Invalid WASM module: {}.", _0)]
    InvalidModule(String),
    /// The guest module does not export a usable `_start`.
    #[error(display = "Failed to find the entry point in the WASM program.")]
    NoProgramEntryPoint,
}

impl BridgeError {
    /// Classifies the error as the WASI error number written to the guest.
    pub fn errno(&self) -> ErrNo {
        match self {
            BridgeError::PermissionDenied => ErrNo::Acces,
            BridgeError::InvalidMemory
            | BridgeError::OutOfBounds { .. }
            | BridgeError::RandomnessUnavailable
            | BridgeError::FailedToObtainLock(_) => ErrNo::Io,
            BridgeError::Exit(_) => ErrNo::Success,
            BridgeError::InvalidArgument
            | BridgeError::UnknownHostFunction(_)
            | BridgeError::InvalidModule(_)
            | BridgeError::NoProgramEntryPoint => ErrNo::Inval,
        }
    }
}

// Conversion from any error raised by any mutex of type <T> to BridgeError.
impl<T> From<std::sync::PoisonError<T>> for BridgeError {
    fn from(error: std::sync::PoisonError<T>) -> Self {
        BridgeError::FailedToObtainLock(format!("{:?}", error))
    }
}

/// Result type of every bridge operation.
pub type BridgeResult<T> = Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::FromPrimitive;

    #[test]
    fn errno_values_match_wasi() {
        assert_eq!(ErrNo::Success.as_status(), 0);
        assert_eq!(ErrNo::Acces.as_status(), 2);
        assert_eq!(ErrNo::Inval.as_status(), 28);
        assert_eq!(ErrNo::Io.as_status(), 29);
        assert_eq!(ErrNo::from_u16(29), Some(ErrNo::Io));
        assert_eq!(ErrNo::from_u16(30), None);
    }

    #[test]
    fn memory_errors_share_the_io_class() {
        let out_of_bounds = BridgeError::OutOfBounds {
            address: 70_000,
            length: 4,
        };
        assert_eq!(out_of_bounds.errno(), ErrNo::Io);
        assert_eq!(BridgeError::InvalidMemory.errno(), ErrNo::Io);
        assert_eq!(out_of_bounds.to_string(), "Invalid memory");
        assert_eq!(BridgeError::InvalidMemory.to_string(), "Invalid memory");
    }

    #[test]
    fn guest_visible_diagnostics() {
        assert_eq!(BridgeError::InvalidArgument.to_string(), "Invalid arguments");
        assert_eq!(BridgeError::PermissionDenied.to_string(), "Not permitted");
        assert_eq!(BridgeError::PermissionDenied.errno(), ErrNo::Acces);
        assert_eq!(BridgeError::InvalidArgument.errno(), ErrNo::Inval);
    }
}
