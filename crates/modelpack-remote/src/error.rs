//! Error type for the remote layer.

use std::path::PathBuf;

use thiserror::Error;

/// Failures of the remote predict protocol, on either side of the wire.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The server was asked to listen on a reserved port.
    #[error("server port must be at least 1025, got {0}")]
    PortReserved(u16),

    /// Binding the listener failed.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address that was requested
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Connecting or talking to the peer failed.
    #[error("connection error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection check did not come back with the expected banner.
    #[error("could not connect to {addr}: {reason}")]
    Handshake {
        /// Server address
        addr: String,
        /// What went wrong
        reason: String,
    },

    /// A line on the wire was not a valid protocol message.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The server processed the request and reported a failure.
    #[error("[{kind} @server] {message}")]
    Server {
        /// Failure domain reported by the server
        kind: String,
        /// Original error message
        message: String,
    },

    /// A data file to be shipped could not be read, or was empty.
    #[error("cannot send file {path}: {reason}")]
    File {
        /// File that was to be shipped
        path: PathBuf,
        /// What went wrong
        reason: String,
    },
}
