use serde::{Deserialize, Serialize};

/// Failure categories carried on the wire in error envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Missing/invalid request keys, or an operation the peripheral's kind
    /// does not allow.
    MalformedRequest,
    /// Unknown peripheral or resource name.
    NotFound,
    /// Params invariant violation, extra/missing params keys.
    Validation,
    /// Operation disallowed in the current run/stop state.
    Conflict,
    /// Uncaught handler failure.
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::MalformedRequest => "malformed_request",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Validation => "validation",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Internal => "internal",
        };
        f.write_str(name)
    }
}

/// A failure a request handler reports back to the caller as data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ServiceError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ServiceError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedRequest, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    /// An uncaught handler failure. The message keeps the legacy
    /// `Internal error` prefix so prefix-matching callers still recognise it.
    pub fn internal(description: impl std::fmt::Display) -> Self {
        Self::new(ErrorKind::Internal, format!("Internal error {description}"))
    }
}

/// Errors surfaced by [`crate::RpcServer`].
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    /// Transport-level error (bind/accept).
    #[error("transport error: {0}")]
    Transport(#[from] tankd_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] tankd_frame::FrameError),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors surfaced by [`crate::RpcClient`].
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The server could not be reached: no cached connection and the single
    /// fresh connection attempt failed too.
    #[error("server unreachable at {addr}: {source}")]
    Unreachable {
        addr: String,
        #[source]
        source: tankd_transport::TransportError,
    },

    /// Frame-level error, including connection closure during a request.
    #[error("frame error: {0}")]
    Frame(#[from] tankd_frame::FrameError),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The response was not a well-formed envelope.
    #[error("malformed response envelope: {0}")]
    BadEnvelope(String),

    /// The server answered with an error envelope.
    #[error("remote error: {0}")]
    Remote(ServiceError),
}

impl ClientError {
    /// Whether this failure means the cached connection is gone and a
    /// reconnect may help.
    pub(crate) fn is_closed(&self) -> bool {
        match self {
            ClientError::Frame(tankd_frame::FrameError::ConnectionClosed) => true,
            ClientError::Frame(tankd_frame::FrameError::Io(err)) => matches!(
                err.kind(),
                std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, RpcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::MalformedRequest).unwrap();
        assert_eq!(json, "\"malformed_request\"");

        let back: ErrorKind = serde_json::from_str("\"not_found\"").unwrap();
        assert_eq!(back, ErrorKind::NotFound);
    }

    #[test]
    fn internal_keeps_legacy_prefix() {
        let err = ServiceError::internal("sensor driver fault");
        assert_eq!(err.kind, ErrorKind::Internal);
        assert!(err.message.starts_with("Internal error "));
    }

    #[test]
    fn closed_detection() {
        let closed = ClientError::Frame(tankd_frame::FrameError::ConnectionClosed);
        assert!(closed.is_closed());

        let reset = ClientError::Frame(tankd_frame::FrameError::Io(std::io::Error::from(
            std::io::ErrorKind::ConnectionReset,
        )));
        assert!(reset.is_closed());

        let parse_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(!ClientError::Json(parse_err).is_closed());
    }
}
