//! Custom error types for the application.
//!
//! Each subsystem has its own error enum; `PlayerError` consolidates them so
//! the `?` operator works across module boundaries.
//!
//! ## Error Hierarchy
//!
//! - **`Config`**: loading or validating settings ([`ConfigError`]).
//! - **`Decode`**: a serial line that could not be turned into a sensor event
//!   ([`DecodeError`]). The control loop logs these and keeps going; they only
//!   surface as errors when a caller asks for strict decoding.
//! - **`Port`**: serial link failures ([`PortError`]). A read timeout is not
//!   an error, a lost connection is.
//! - **`Source`**: a video that could not be opened or decoded
//!   ([`SourceError`]). The engine stays closed and shows blank.
//! - **`Io`**: anything else touching the filesystem or child processes.
//!
//! None of these stop the installation; the only way out of the control loop
//! is an explicit quit.

use thiserror::Error;

use crate::config::ConfigError;
use crate::playback::SourceError;
use crate::sensor::DecodeError;
use crate::serial::PortError;

/// Convenience alias for results using the application error type.
pub type AppResult<T> = std::result::Result<T, PlayerError>;

/// Application-wide error.
#[derive(Error, Debug)]
pub enum PlayerError {
    /// Settings could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A serial line could not be decoded.
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// The serial link failed.
    #[error("Serial error: {0}")]
    Port(#[from] PortError),

    /// A video could not be opened or decoded.
    #[error("Video source error: {0}")]
    Source(#[from] SourceError),

    /// Filesystem or process failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The window could not be created or crashed.
    #[error("Window error: {0}")]
    Window(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PlayerError::from(DecodeError::UnknownTag("0x01 0x02".to_string()));
        assert_eq!(err.to_string(), "Decode error: unknown tag UID '0x01 0x02'");
    }

    #[test]
    fn test_port_error_display() {
        let err = PlayerError::from(PortError::NotConnected);
        assert_eq!(err.to_string(), "Serial error: Serial port not connected");
    }
}
