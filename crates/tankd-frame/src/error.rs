/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload exceeds the 3-byte length field's maximum.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed; when mid-frame, no partial payload is
    /// ever surfaced.
    #[error("connection closed")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
