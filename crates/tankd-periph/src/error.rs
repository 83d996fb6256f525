/// A hardware-level failure reported by a driver.
///
/// Drivers are opaque to the service; whatever they report is carried to
/// the caller as an internal error.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct DriverError(pub String);

impl DriverError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}
