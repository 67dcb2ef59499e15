//! Protocol errors

use thiserror::Error;

/// Errors that can occur while talking to the board
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Serial port error: {0}")]
    SerialError(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("No compatible device found on any candidate port")]
    NoDeviceFound,

    #[error("Handshake mismatch: expected '{expected}', got '{actual}'")]
    HandshakeMismatch { expected: String, actual: String },

    #[error("Reply timeout")]
    Timeout,

    #[error("Could not decode reply '{0}' as an integer")]
    BadReply(String),

    #[error("Not connected to a board")]
    NotConnected,

    #[error("Already connected")]
    AlreadyConnected,

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
