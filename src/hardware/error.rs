//! Error types for hardware access.

use thiserror::Error;

/// Errors raised by a hardware port.
#[derive(Debug, Error)]
pub enum HardwareError {
    /// Pin could not be claimed (export or direction setup failed)
    #[error("GPIO {pin} unavailable: {source}")]
    Unavailable {
        pin: u32,
        #[source]
        source: std::io::Error,
    },

    /// Reading or writing a claimed pin failed
    #[error("GPIO {pin} I/O error: {source}")]
    Io {
        pin: u32,
        #[source]
        source: std::io::Error,
    },

    /// Pin value file held something other than 0 or 1
    #[error("GPIO {pin} returned unexpected value '{value}'")]
    InvalidValue { pin: u32, value: String },

    /// Port was used after `shutdown()`
    #[error("hardware port already released")]
    Released,
}
