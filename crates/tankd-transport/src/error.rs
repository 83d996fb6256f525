use std::net::SocketAddr;

/// Errors that can occur in transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to bind to the specified address.
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// Failed to connect to the specified address.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The transport has been shut down.
    #[error("transport shut down")]
    Shutdown,
}

pub type Result<T> = std::result::Result<T, TransportError>;
