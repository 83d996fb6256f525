use std::path::PathBuf;
use std::sync::Arc;

use tankd_rpc::{RpcServer, ServerConfig};
use tankd_supervisor::{ChildCommand, Instance, ParamsStore, SupervisorService};
use tracing::{info, warn};

use crate::cmd::{wait_for_termination, SuperviseArgs};
use crate::exit::{io_error, rpc_error, CliResult, SUCCESS};
use crate::settings::Settings;

pub fn run(
    args: SuperviseArgs,
    mut settings: Settings,
    config: Option<PathBuf>,
) -> CliResult<i32> {
    if let Some(port) = args.port {
        settings.supervisor.port = port;
    }
    let autostart = args.autostart || settings.supervisor.autostart;

    if let Some(parent) = settings.supervisor.params_file.parent() {
        if let Err(err) = std::fs::create_dir_all(parent) {
            warn!(%err, "could not create params directory");
        }
    }
    let store = ParamsStore::new(&settings.supervisor.params_file);
    if let Err(err) = store.load() {
        warn!(%err, "persisted params not loadable; set_params before start");
    }

    // The child is this same executable running `core`, with the same
    // settings file so it finds the gpio service.
    let mut child_args = Vec::new();
    if let Some(path) = &config {
        child_args.push("--config".to_string());
        child_args.push(path.display().to_string());
    }
    child_args.push("core".to_string());

    let program = std::env::current_exe()
        .map_err(|err| io_error("cannot locate own executable", err))?;
    let instance = Arc::new(Instance::new(ChildCommand {
        program,
        args: child_args,
    }));

    let service = SupervisorService::new(Arc::clone(&instance), store.clone());
    let server = RpcServer::bind(
        ServerConfig {
            scope: settings.supervisor_scope(),
            port: settings.supervisor.port,
        },
        service.handler(),
    )
    .map_err(|err| rpc_error("supervisor bind failed", err))?;

    info!(addr = %server.local_addr(), "supervisor ready");
    let handle = server.spawn();

    if autostart {
        match store.load() {
            Ok(params) => {
                if let Err(err) = instance.start(&params) {
                    warn!(%err, "autostart failed");
                }
            }
            Err(err) => warn!(%err, "autostart skipped"),
        }
    }

    wait_for_termination()?;

    info!("supervisor shutting down");
    handle.shutdown();
    if instance.is_running() {
        if let Err(err) = instance.stop() {
            warn!(%err, "control loop stop failed during shutdown");
        }
    }
    Ok(SUCCESS)
}
