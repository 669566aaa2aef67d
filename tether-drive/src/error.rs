//! Error types for TetherDrive

use std::time::Duration;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// TetherDrive error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No open channel to the robot
    #[error("Robot not connected")]
    NotConnected,

    /// Serial port error (open/configure)
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// I/O error on the underlying transport
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed or short response
    #[error("Decode error: {0}")]
    Decode(String),

    /// No response within the bounded window
    #[error("Communication timeout after {waited:?}")]
    Timeout {
        /// How long the caller waited before giving up
        waited: Duration,
    },

    /// Operation not valid in the current session state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True for transport-level failures (serial or I/O)
    pub fn is_io(&self) -> bool {
        matches!(self, Error::Serial(_) | Error::Io(_))
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(e: toml::ser::Error) -> Self {
        Error::Config(e.to_string())
    }
}
