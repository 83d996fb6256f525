use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::driver::{DeviceDriver, SensorDriver};
use crate::error::DriverError;

/// Shared handle for steering a [`SimSensor`] after it has been registered.
#[derive(Clone)]
pub struct SimSensorHandle {
    value: Arc<Mutex<f64>>,
    samples: Arc<AtomicU64>,
}

impl SimSensorHandle {
    /// Change what subsequent samples return.
    pub fn set(&self, value: f64) {
        *self
            .value
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = value;
    }

    pub fn get(&self) -> f64 {
        *self
            .value
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// How many samples have actually been taken (cache misses).
    pub fn samples_taken(&self) -> u64 {
        self.samples.load(Ordering::SeqCst)
    }
}

/// A simulated sensor returning a steerable value.
pub struct SimSensor {
    value: Arc<Mutex<f64>>,
    samples: Arc<AtomicU64>,
}

impl SimSensor {
    pub fn new(initial: f64) -> Self {
        Self {
            value: Arc::new(Mutex::new(initial)),
            samples: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn handle(&self) -> SimSensorHandle {
        SimSensorHandle {
            value: Arc::clone(&self.value),
            samples: Arc::clone(&self.samples),
        }
    }
}

impl SensorDriver for SimSensor {
    fn sample(&mut self) -> Result<f64, DriverError> {
        self.samples.fetch_add(1, Ordering::SeqCst);
        Ok(*self
            .value
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()))
    }
}

/// A simulated relay latching its on/off state.
#[derive(Default)]
pub struct SimRelay {
    on: bool,
}

impl SimRelay {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DeviceDriver for SimRelay {
    fn is_on(&self) -> bool {
        self.on
    }

    fn turn_on(&mut self) -> Result<(), DriverError> {
        self.on = true;
        Ok(())
    }

    fn turn_off(&mut self) -> Result<(), DriverError> {
        self.on = false;
        Ok(())
    }
}
