mod cmd;
mod exit;
mod logging;
mod settings;

use std::path::PathBuf;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogDestination, LogFormat, LogLevel};
use crate::settings::Settings;

#[derive(Parser, Debug)]
#[command(name = "tankd", version, about = "Supervised tank-cooling control plane")]
struct Cli {
    /// Settings file (YAML). Defaults apply when omitted.
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Log output format.
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level.
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();

    // The core child's stderr is the side-channel to its supervisor, so its
    // log lines go to stdout, where the supervisor relays them.
    let destination = match cli.command {
        Command::Core(_) => LogDestination::Stdout,
        _ => LogDestination::Stderr,
    };
    init_logging(cli.log_format, cli.log_level, destination);

    let settings = match Settings::load(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    };

    match cmd::run(cli.command, settings, cli.config) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}
