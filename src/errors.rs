// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Common error types used by the scheduling core
//!
//! Only conditions a caller can recover from are reported through
//! [`Error`]. Broken invariants (a corrupted thread block, blocking from
//! interrupt context, an unimplemented policy) are fatal and never
//! reach a `Result`.

use core::fmt;

/// Status code type (negative values indicate errors)
pub type Status = i32;

/// Result type for operations that can fail
pub type Result<T = ()> = core::result::Result<T, Error>;

/// Recoverable error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Error {
    InvalidArgs = -2,
    BadState = -4,
    NotSupported = -5,
    NoMemory = -6,
    NotFound = -8,
    Internal = -12,
}

impl Error {
    /// Convert error to status code
    pub fn to_status(self) -> Status {
        self as Status
    }

    /// Convert status code to error
    pub fn from_status(status: Status) -> Self {
        match status {
            -2 => Error::InvalidArgs,
            -4 => Error::BadState,
            -5 => Error::NotSupported,
            -6 => Error::NoMemory,
            -8 => Error::NotFound,
            _ => Error::Internal,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Error::InvalidArgs => "invalid arguments",
            Error::BadState => "bad state",
            Error::NotSupported => "not supported",
            Error::NoMemory => "out of memory",
            Error::NotFound => "not found",
            Error::Internal => "internal error",
        };
        f.write_str(msg)
    }
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        err.to_status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(Error::NoMemory.to_status(), -6);
        assert_eq!(Error::from_status(-2), Error::InvalidArgs);
        assert_eq!(Error::from_status(-999), Error::Internal);
        let status: Status = Error::NotFound.into();
        assert_eq!(Error::from_status(status), Error::NotFound);
    }
}
