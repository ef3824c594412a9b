//! Error types for the Galaxy3D buffer layer
//!
//! Allocation and driver failures are surfaced to the direct caller through
//! these variants. Contract violations detected at runtime (stale keys, data
//! added to a built vertex buffer in release builds) use `InvalidResource`.

use std::fmt;

/// Result type for Galaxy3D buffer operations
pub type Result<T> = std::result::Result<T, Error>;

/// Galaxy3D buffer layer errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Backend-specific error
    BackendError(String),

    /// Out of GPU memory (buffer creation or storage allocation)
    OutOfMemory,

    /// Invalid resource (unknown key, detached data, unbuilt buffer, ...)
    InvalidResource(String),

    /// Initialization failed (engine guard, buffer manager)
    InitializationFailed(String),

    /// Error reported by the driver, with its native error code
    DriverError {
        /// Native driver error code (e.g. `GL_OUT_OF_MEMORY`)
        code: u32,
        /// Call that produced the error
        message: String,
    },
}

impl Error {
    /// Native driver code carried by this error, if any
    pub fn driver_code(&self) -> Option<u32> {
        match self {
            Error::DriverError { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::DriverError { code, message } => {
                write!(f, "Driver error 0x{:04X}: {}", code, message)
            }
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
