use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ParamsError;

/// Controller parameters.
///
/// `low`/`high` bound the hysteresis band in °C, `fan_retain` is how long
/// the fan keeps running after the peltier switches off (seconds), and
/// `tick_time` is the target period between tick starts (seconds).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Params {
    pub low: f64,
    pub high: f64,
    pub fan_retain: f64,
    pub tick_time: f64,
}

impl Params {
    /// Check the invariants: `high > low`, `fan_retain ≥ 0`,
    /// `1 ≤ tick_time ≤ 60` (a long tick makes the system unresponsive).
    pub fn validate(&self) -> Result<(), ParamsError> {
        if !(self.high > self.low) {
            return Err(ParamsError::BandInverted {
                low: self.low,
                high: self.high,
            });
        }
        if !(self.fan_retain >= 0.0) {
            return Err(ParamsError::NegativeRetain(self.fan_retain));
        }
        if !(1.0..=60.0).contains(&self.tick_time) {
            return Err(ParamsError::TickTimeOutOfRange(self.tick_time));
        }
        Ok(())
    }

    /// Parse and validate a params payload. Extra or missing keys are
    /// rejected, not ignored.
    pub fn from_value(value: &Value) -> Result<Self, ParamsError> {
        let params: Params = serde_json::from_value(value.clone())
            .map_err(|e| ParamsError::Payload(e.to_string()))?;
        params.validate()?;
        Ok(params)
    }

    /// The tick period as a [`Duration`].
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(self.tick_time)
    }
}
