use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::exit::{CliError, CliResult, INTERNAL};
use crate::settings::Settings;

pub mod core;
pub mod gpio;
pub mod request;
pub mod supervise;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the peripheral (gpio) service with the simulated board.
    Gpio(GpioArgs),
    /// Run the control loop in the foreground (the supervised child).
    Core(CoreArgs),
    /// Run the supervisor service.
    Supervise(SuperviseArgs),
    /// Send one request to a tankd service and print the response envelope.
    Request(RequestArgs),
}

pub fn run(command: Command, settings: Settings, config: Option<PathBuf>) -> CliResult<i32> {
    match command {
        Command::Gpio(args) => gpio::run(args, settings),
        Command::Core(args) => core::run(args, settings),
        Command::Supervise(args) => supervise::run(args, settings, config),
        Command::Request(args) => request::run(args),
    }
}

/// Park the calling thread until SIGINT/SIGTERM arrives.
pub(crate) fn wait_for_termination() -> CliResult<()> {
    let (tx, rx) = std::sync::mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .map_err(|err| {
        CliError::new(INTERNAL, format!("signal handler setup failed: {err}"))
    })?;
    let _ = rx.recv();
    Ok(())
}

#[derive(Args, Debug)]
pub struct GpioArgs {
    /// Override the configured listen port.
    #[arg(long)]
    pub port: Option<u16>,
}

#[derive(Args, Debug)]
pub struct CoreArgs {
    /// Lower bound of the hysteresis band, °C.
    pub low: f64,
    /// Upper bound of the hysteresis band, °C.
    pub high: f64,
    /// How long the fan keeps running after the peltier stops, seconds.
    pub fan_retain: f64,
    /// Target tick period, seconds.
    pub tick_time: f64,
}

#[derive(Args, Debug)]
pub struct SuperviseArgs {
    /// Override the configured listen port.
    #[arg(long)]
    pub port: Option<u16>,
    /// Start the control loop immediately with the persisted params.
    #[arg(long)]
    pub autostart: bool,
}

#[derive(Args, Debug)]
pub struct RequestArgs {
    /// Server to talk to, `host:port`.
    pub target: String,
    /// JSON request body.
    #[arg(long)]
    pub json: String,
}
