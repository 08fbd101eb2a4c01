//! Error types for the fancon system

use thiserror::Error;

/// Core error type for fancon operations
#[derive(Error, Debug)]
pub enum FanconError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Register bus communication errors (NACK, arbitration loss, timeout)
    #[error("Bus error: {0}")]
    Bus(String),

    /// Console transport errors
    #[error("Transport error: {0}")]
    Transport(String),

    /// Serial port errors
    #[error("Serial port error: {0}")]
    Serial(String),

    /// Invalid input or arguments
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A peripheral or its configuration is missing
    #[error("Unavailable: {0}")]
    Unavailable(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Device not found
    #[error("Device not found")]
    DeviceNotFound,
}

/// Result type alias for fancon operations
pub type Result<T> = std::result::Result<T, FanconError>;

impl From<toml::de::Error> for FanconError {
    fn from(err: toml::de::Error) -> Self {
        FanconError::Config(err.to_string())
    }
}
