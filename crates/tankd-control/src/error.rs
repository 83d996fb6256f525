/// Params invariant violations and malformed params payloads.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParamsError {
    #[error("high ({high}) must be greater than low ({low})")]
    BandInverted { low: f64, high: f64 },

    #[error("fan_retain must be non-negative, got {0}")]
    NegativeRetain(f64),

    #[error("tick_time must be between 1 and 60 seconds, got {0}")]
    TickTimeOutOfRange(f64),

    /// Extra keys, missing keys, or non-numeric values in a params payload.
    #[error("invalid params payload: {0}")]
    Payload(String),
}

/// Failures reaching or driving a peripheral during a sub-tick.
#[derive(Debug, thiserror::Error)]
pub enum GpioError {
    #[error("gpio request failed: {0}")]
    Client(#[from] tankd_rpc::ClientError),

    #[error("unexpected gpio response: {0}")]
    UnexpectedResponse(String),
}

/// Control-loop lifecycle errors.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    /// `run()` was called while the loop is already active.
    #[error("control loop is already running")]
    AlreadyRunning,
}

/// Failures encoding or emitting a status message.
#[derive(Debug, thiserror::Error)]
pub enum StatusError {
    /// The framed message exceeds the 5-digit decimal length header.
    #[error("status payload too large ({0} bytes)")]
    PayloadTooLarge(usize),

    #[error("status serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("status write failed: {0}")]
    Io(#[from] std::io::Error),
}
