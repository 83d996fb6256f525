//! Temperature-regulation control loop and status side-channel.
//!
//! The controller is a two-phase hysteresis state machine for the cooling
//! element (peltier) plus a time-retained fan rule, driven by a fixed-period
//! tick. Peripherals are reached through the [`GpioPort`] seam, backed in
//! production by an RPC client talking to the peripheral service.
//!
//! The loop reports its liveness through a [`StatusSink`]: when run as a
//! supervised child process the sink frames status messages onto stderr,
//! where the supervisor's side-channel reader picks them up.

pub mod controller;
pub mod error;
pub mod gpio;
pub mod params;
pub mod state;
pub mod status;

pub use controller::{Controller, TickReport};
pub use error::{ControlError, GpioError, ParamsError, StatusError};
pub use gpio::{GpioPort, RemoteGpio, FAN, PELTIER, TANK_TEMP};
pub use params::Params;
pub use state::{Phase, State};
pub use status::{NullSink, StatusEvent, StatusMessage, StatusReader, StatusSink, StatusWriter};
