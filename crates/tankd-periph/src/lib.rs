//! Peripheral registry and request handling for the tankd gpio service.
//!
//! The gpio service exposes every registered peripheral over RPC so that
//! several processes can read sensors and drive relays at the same time —
//! raw GPIO access is not shareable. Peripherals come in exactly two kinds,
//! sensors and devices, each with a fixed allowed-operation set; dispatch is
//! a total match over `(kind, operation)`.
//!
//! The board-specific hardware binding stays outside this crate: it plugs in
//! through the [`SensorDriver`] / [`DeviceDriver`] traits. The simulated
//! drivers in [`sim`] stand in on hosts without hardware.

pub mod cache;
pub mod driver;
pub mod error;
pub mod registry;
pub mod service;
pub mod sim;

pub use cache::ReadCache;
pub use driver::{DeviceDriver, SensorDriver};
pub use error::DriverError;
pub use registry::{Operation, Peripheral, Registry};
pub use service::PeripheralService;
pub use sim::{SimRelay, SimSensor, SimSensorHandle};
