use std::net::SocketAddr;
use thiserror::Error;

use crate::session::ConnectionState;

/// Errors of the bridge server.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Failed to bind to address
    #[error("Failed to bind to {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Rejected configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Connection lifecycle violated
    #[error("Invalid connection state transition from {from} to {to}")]
    InvalidTransition {
        from: ConnectionState,
        to: ConnectionState,
    },

    /// Low-level I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors of the device simulator.
#[derive(Debug, Error)]
pub enum SimulatorError {
    /// Connection attempt timed out
    #[error("Connection timeout after {0}ms")]
    ConnectionTimeout(u64),

    /// Write of the event line timed out
    #[error("Write timeout after {0}ms")]
    WriteTimeout(u64),

    /// No verdict byte within the device window
    #[error("Read timeout after {0}ms")]
    ReadTimeout(u64),

    /// Bridge closed the connection without answering
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// Protocol-level error from the turnstile codec
    #[error("Protocol error: {0}")]
    Protocol(#[from] henry_core::Error),

    /// Low-level I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
