use std::time::Duration;

use tankd_periph::{PeripheralService, Registry, SimRelay, SimSensor};
use tankd_rpc::{RpcServer, ServerConfig};
use tracing::info;

use crate::cmd::{wait_for_termination, GpioArgs};
use crate::exit::{rpc_error, CliError, CliResult, SUCCESS, USAGE};
use crate::settings::Settings;

pub fn run(args: GpioArgs, mut settings: Settings) -> CliResult<i32> {
    if let Some(port) = args.port {
        settings.gpio.port = port;
    }
    if !(settings.gpio.cache_expire >= 0.0) {
        return Err(CliError::new(
            USAGE,
            format!(
                "gpio.cache_expire must be non-negative, got {}",
                settings.gpio.cache_expire
            ),
        ));
    }

    let mut registry = Registry::new();
    registry.register_sensor(
        "tank_temp",
        Box::new(SimSensor::new(settings.gpio.sim_temperature)),
    );
    registry.register_device("peltier", Box::new(SimRelay::new()));
    registry.register_device("fan", Box::new(SimRelay::new()));

    let service = PeripheralService::new(
        registry,
        Duration::from_secs_f64(settings.gpio.cache_expire),
    );

    let server = RpcServer::bind(
        ServerConfig {
            scope: settings.gpio_scope(),
            port: settings.gpio.port,
        },
        service.handler(),
    )
    .map_err(|err| rpc_error("gpio service bind failed", err))?;

    info!(addr = %server.local_addr(), "gpio service ready (simulated board)");
    let handle = server.spawn();

    wait_for_termination()?;

    info!("gpio service shutting down");
    handle.shutdown();
    Ok(SUCCESS)
}
