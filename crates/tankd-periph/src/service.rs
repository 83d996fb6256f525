use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde_json::{json, Value};
use tankd_rpc::{Handler, ServiceError};
use tracing::debug;

use crate::cache::ReadCache;
use crate::registry::{Operation, Peripheral, Registry};

struct Inner {
    registry: Registry,
    cache: ReadCache,
}

/// The gpio service request handler.
///
/// Requests look like `{"name": "...", "operation": "..."}`. Sensors answer
/// `read` (through the cache); devices answer `is_on`, `turn_on` and
/// `turn_off`. One lock serializes all hardware access — sessions are
/// concurrent, GPIO manipulation is not.
pub struct PeripheralService {
    inner: Mutex<Inner>,
}

impl PeripheralService {
    pub fn new(registry: Registry, cache_lifetime: Duration) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Inner {
                registry,
                cache: ReadCache::new(cache_lifetime),
            }),
        })
    }

    /// Adapt this service into an RPC server handler.
    pub fn handler(self: &Arc<Self>) -> Arc<Handler> {
        let service = Arc::clone(self);
        Arc::new(move |request: Value, peer: SocketAddr| {
            debug!(%peer, %request, "gpio request");
            service.handle(&request)
        })
    }

    /// Handle one request.
    pub fn handle(&self, request: &Value) -> Result<Value, ServiceError> {
        let name = request
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| ServiceError::malformed("request must have a `name` key"))?;
        let operation = request
            .get("operation")
            .and_then(Value::as_str)
            .ok_or_else(|| ServiceError::malformed("request must have an `operation` key"))?;

        let operation = Operation::parse(operation).ok_or_else(|| {
            ServiceError::malformed(format!("operation {operation} is not recognised"))
        })?;

        let mut inner = self.lock_inner();
        let Inner { registry, cache } = &mut *inner;

        let peripheral = registry
            .get_mut(name)
            .ok_or_else(|| ServiceError::not_found(format!("peripheral {name} is not found")))?;

        match (peripheral, operation) {
            (Peripheral::Sensor(driver), Operation::Read) => {
                let now = Instant::now();
                if let Some(cached) = cache.get(name, now) {
                    return Ok(json!(cached));
                }
                let reading = driver.sample().map_err(ServiceError::internal)?;
                cache.put(name, reading, now);
                Ok(json!(reading))
            }
            (peripheral @ Peripheral::Sensor(_), _)
            | (peripheral @ Peripheral::Device(_), Operation::Read) => {
                Err(ServiceError::malformed(format!(
                    "operation {} for {} not allowed",
                    operation.as_str(),
                    peripheral.kind_name(),
                )))
            }
            (Peripheral::Device(driver), Operation::IsOn) => Ok(json!(driver.is_on())),
            (Peripheral::Device(driver), Operation::TurnOn) => {
                driver.turn_on().map_err(ServiceError::internal)?;
                Ok(json!("OK"))
            }
            (Peripheral::Device(driver), Operation::TurnOff) => {
                driver.turn_off().map_err(ServiceError::internal)?;
                Ok(json!("OK"))
            }
        }
    }

    fn lock_inner(&self) -> MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
