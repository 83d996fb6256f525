use clap::ValueEnum;

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(self) -> tracing::level_filters::LevelFilter {
        match self {
            LogLevel::Error => tracing::level_filters::LevelFilter::ERROR,
            LogLevel::Warn => tracing::level_filters::LevelFilter::WARN,
            LogLevel::Info => tracing::level_filters::LevelFilter::INFO,
            LogLevel::Debug => tracing::level_filters::LevelFilter::DEBUG,
            LogLevel::Trace => tracing::level_filters::LevelFilter::TRACE,
        }
    }
}

/// Which stream log lines go to. The `core` child logs to stdout because
/// its stderr carries the side-channel status stream.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LogDestination {
    Stderr,
    Stdout,
}

pub fn init_logging(format: LogFormat, level: LogLevel, destination: LogDestination) {
    match destination {
        LogDestination::Stderr => init_with_writer(format, level, std::io::stderr),
        LogDestination::Stdout => init_with_writer(format, level, std::io::stdout),
    }
}

fn init_with_writer<W>(format: LogFormat, level: LogLevel, writer: W)
where
    W: for<'a> tracing_subscriber::fmt::MakeWriter<'a> + Send + Sync + 'static,
{
    let builder = tracing_subscriber::fmt()
        .with_writer(writer)
        .with_max_level(level.as_filter())
        .with_ansi(false)
        .with_target(false);

    match format {
        LogFormat::Text => {
            let _ = builder.try_init();
        }
        LogFormat::Json => {
            let _ = builder.json().try_init();
        }
    }
}
