//! # Error Types
//!
//! Custom error types for Joydrive using `thiserror`.

use thiserror::Error;

/// Main error type for Joydrive
#[derive(Debug, Error)]
pub enum JoydriveError {
    /// GPIO open or pin write failure
    #[error("GPIO error: {0}")]
    Gpio(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Inbound joystick message could not be decoded
    #[error("Invalid joystick message: {0}")]
    Message(String),

    /// HTTP/WebSocket server errors
    #[error("Server error: {0}")]
    Server(String),

    /// Operation not allowed in the session's current state
    #[error("Session error: {0}")]
    Session(String),

    /// Another session already owns the motors
    #[error("Another session is already driving")]
    SessionBusy,
}

impl From<rppal::gpio::Error> for JoydriveError {
    fn from(err: rppal::gpio::Error) -> Self {
        JoydriveError::Gpio(err.to_string())
    }
}

/// Result type alias for Joydrive
pub type Result<T> = std::result::Result<T, JoydriveError>;
