//! Error types for the audio link

use thiserror::Error;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Sound device errors
#[derive(Error, Debug, Clone)]
pub enum AudioError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Failed to open stream: {0}")]
    StreamError(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("cpal error: {0}")]
    CpalError(String),
}

/// Transport errors
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Connect to {0} timed out")]
    ConnectTimeout(String),

    #[error("No response from server within {0:?}")]
    IdleTimeout(std::time::Duration),

    #[error("Keepalive not answered after {0} requests")]
    KeepaliveTimeout(u32),

    #[error("Connection closed by peer")]
    Closed,

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Receive failed: {0}")]
    ReceiveFailed(String),
}

/// Wire framing violations. All of them are fatal for the connection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Declared message length {declared} exceeds limit {limit}")]
    MessageTooLong { declared: usize, limit: usize },

    #[error("Declared message length {0} is shorter than the header")]
    InvalidLength(usize),

    #[error("Outgoing message of {0} bytes does not fit a frame")]
    TooLong(usize),
}

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(feature = "device")]
impl From<cpal::BuildStreamError> for AudioError {
    fn from(e: cpal::BuildStreamError) -> Self {
        AudioError::StreamError(e.to_string())
    }
}

#[cfg(feature = "device")]
impl From<cpal::PlayStreamError> for AudioError {
    fn from(e: cpal::PlayStreamError) -> Self {
        AudioError::StreamError(e.to_string())
    }
}

#[cfg(feature = "device")]
impl From<cpal::DefaultStreamConfigError> for AudioError {
    fn from(e: cpal::DefaultStreamConfigError) -> Self {
        AudioError::UnsupportedFormat(e.to_string())
    }
}
