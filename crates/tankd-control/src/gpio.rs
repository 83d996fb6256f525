use serde_json::{json, Value};
use tankd_rpc::RpcClient;

use crate::error::GpioError;

/// Peripheral names exported by the peripheral service.
pub const TANK_TEMP: &str = "tank_temp";
pub const PELTIER: &str = "peltier";
pub const FAN: &str = "fan";

/// Access to the peripheral service, as seen by the control loop.
///
/// Production uses [`RemoteGpio`]; tests use scripted fakes.
pub trait GpioPort: Send + Sync {
    /// Read a sensor value.
    fn read(&self, name: &str) -> Result<f64, GpioError>;

    /// Query a device's on/off state.
    fn is_on(&self, name: &str) -> Result<bool, GpioError>;

    /// Switch a device on. Idempotent on the driver side, but the control
    /// loop only calls it on observed disagreement anyway.
    fn turn_on(&self, name: &str) -> Result<(), GpioError>;

    /// Switch a device off.
    fn turn_off(&self, name: &str) -> Result<(), GpioError>;
}

/// [`GpioPort`] backed by an RPC connection to the peripheral service.
pub struct RemoteGpio {
    client: RpcClient,
}

impl RemoteGpio {
    pub fn new(client: RpcClient) -> Self {
        Self { client }
    }

    fn call(&self, name: &str, operation: &str) -> Result<Value, GpioError> {
        let response = self
            .client
            .call(&json!({ "name": name, "operation": operation }))?;
        Ok(response)
    }
}

impl GpioPort for RemoteGpio {
    fn read(&self, name: &str) -> Result<f64, GpioError> {
        let value = self.call(name, "read")?;
        value.as_f64().ok_or_else(|| {
            GpioError::UnexpectedResponse(format!("read of {name} returned {value}"))
        })
    }

    fn is_on(&self, name: &str) -> Result<bool, GpioError> {
        let value = self.call(name, "is_on")?;
        value.as_bool().ok_or_else(|| {
            GpioError::UnexpectedResponse(format!("is_on of {name} returned {value}"))
        })
    }

    fn turn_on(&self, name: &str) -> Result<(), GpioError> {
        self.call(name, "turn_on")?;
        Ok(())
    }

    fn turn_off(&self, name: &str) -> Result<(), GpioError> {
        self.call(name, "turn_off")?;
        Ok(())
    }
}
