//! Error types for the device transports.
//!
//! None of these reach the conversational path: the bridge logs and drops
//! them. Only registry forwarding surfaces `ForwardError` to its caller.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("serial channel is not open")]
    SerialUnavailable,

    #[error("device socket is not attached")]
    SocketUnavailable,

    #[error("device socket is closed")]
    SocketClosed,

    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Why a command could not be forwarded to a registered device.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("device {0} is not connected")]
    DeviceOffline(String),

    #[error("device {0} socket is closed")]
    SocketClosed(String),

    #[error("failed to encode command: {0}")]
    Encode(#[from] serde_json::Error),
}
