use std::sync::Arc;

use tankd_control::{Controller, Params, RemoteGpio, StatusWriter};
use tankd_rpc::RpcClient;
use tracing::info;

use crate::cmd::CoreArgs;
use crate::exit::{CliError, CliResult, INTERNAL, SUCCESS, USAGE};
use crate::settings::Settings;

/// The control-loop child process. Logs to stdout; stderr carries the
/// framed status side-channel for the supervisor.
pub fn run(args: CoreArgs, settings: Settings) -> CliResult<i32> {
    let params = Params {
        low: args.low,
        high: args.high,
        fan_retain: args.fan_retain,
        tick_time: args.tick_time,
    };
    params
        .validate()
        .map_err(|err| CliError::new(USAGE, format!("invalid params: {err}")))?;

    let gpio = RemoteGpio::new(RpcClient::new(settings.gpio_target()));
    let controller = Arc::new(Controller::new(params, gpio));

    {
        let controller = Arc::clone(&controller);
        ctrlc::set_handler(move || {
            info!("termination requested");
            controller.stop();
        })
        .map_err(|err| {
            CliError::new(INTERNAL, format!("signal handler setup failed: {err}"))
        })?;
    }

    let mut sink = StatusWriter::new(std::io::stderr());
    controller
        .run(&mut sink)
        .map_err(|err| CliError::new(INTERNAL, err.to_string()))?;

    Ok(SUCCESS)
}
