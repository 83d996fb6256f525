use crate::error::DriverError;

/// A sensor: something with a reading.
pub trait SensorDriver: Send {
    /// Take a fresh sample from the hardware.
    fn sample(&mut self) -> Result<f64, DriverError>;
}

/// A device: something with an on state and an off state.
///
/// `turn_on`/`turn_off` must be idempotent — calling them in the state they
/// would produce has no side effects.
pub trait DeviceDriver: Send {
    /// The last state this driver put the device in.
    fn is_on(&self) -> bool;

    fn turn_on(&mut self) -> Result<(), DriverError>;

    fn turn_off(&mut self) -> Result<(), DriverError>;
}
