use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use tankd_control::Params;
use tankd_rpc::{Handler, ServiceError};
use tracing::debug;

use crate::error::SupervisorError;
use crate::instance::Instance;
use crate::store::ParamsStore;

/// The supervisor request handler.
///
/// Requests look like `{"request": "...", "data": ...}` with the `data` key
/// only used by `set_params`. `start` always runs with the persisted params,
/// so `set_params` while stopped is the only way to change what the next
/// run uses.
pub struct SupervisorService {
    instance: Arc<Instance>,
    store: ParamsStore,
    /// Serializes set_params against itself (check-then-persist).
    params_lock: Mutex<()>,
}

impl SupervisorService {
    pub fn new(instance: Arc<Instance>, store: ParamsStore) -> Arc<Self> {
        Arc::new(Self {
            instance,
            store,
            params_lock: Mutex::new(()),
        })
    }

    /// Adapt this service into an RPC server handler.
    pub fn handler(self: &Arc<Self>) -> Arc<Handler> {
        let service = Arc::clone(self);
        Arc::new(move |request: Value, peer: SocketAddr| {
            debug!(%peer, %request, "supervisor request");
            service.handle(&request)
        })
    }

    /// Handle one request.
    pub fn handle(&self, request: &Value) -> Result<Value, ServiceError> {
        let name = request
            .get("request")
            .and_then(Value::as_str)
            .ok_or_else(|| ServiceError::malformed("request must have a `request` key"))?;

        match name {
            "get_params" => {
                let params = self.store.load().map_err(ServiceError::internal)?;
                serde_json::to_value(params).map_err(ServiceError::internal)
            }
            "get_state" => match self.instance.live_mirror().state {
                Some(state) => serde_json::to_value(state).map_err(ServiceError::internal),
                None => Ok(Value::Null),
            },
            "status" => {
                let (running, run_info) = self.instance.status();
                let mut status =
                    serde_json::to_value(run_info).map_err(ServiceError::internal)?;
                status["running"] = json!(running);
                Ok(status)
            }
            "start" => {
                let params = self.store.load().map_err(ServiceError::internal)?;
                self.instance.start(&params).map_err(to_service_error)?;
                Ok(json!("OK"))
            }
            "stop" => {
                self.instance.stop().map_err(to_service_error)?;
                Ok(json!("OK"))
            }
            "set_params" => {
                let data = request
                    .get("data")
                    .ok_or_else(|| ServiceError::malformed("set_params needs a `data` key"))?;

                let _guard = self
                    .params_lock
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());

                if self.instance.is_running() {
                    return Err(ServiceError::conflict(
                        "params cannot change while the control loop is running",
                    ));
                }

                let params = Params::from_value(data)
                    .map_err(|err| ServiceError::validation(err.to_string()))?;
                self.store.save(&params).map_err(ServiceError::internal)?;
                Ok(json!("OK"))
            }
            other => Err(ServiceError::malformed(format!(
                "unknown request {other}"
            ))),
        }
    }
}

fn to_service_error(err: SupervisorError) -> ServiceError {
    match err {
        SupervisorError::AlreadyRunning => ServiceError::conflict("already running"),
        SupervisorError::NotRunning => ServiceError::conflict("already stopped"),
        SupervisorError::Params(err) => ServiceError::validation(err.to_string()),
        other => ServiceError::internal(other),
    }
}
