use clap::ValueEnum;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Per-target overrides on top of `--log-level`, e.g.
/// `UNSPUB_LOG=unspub::publish=warn,rumqttc=debug`.
pub const DIRECTIVES_ENV: &str = "UNSPUB_LOG";

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Accepts the level names operators already use in `LOG_LEVEL`.
#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogLevel {
    #[value(alias = "critical", alias = "fatal")]
    Error,
    #[value(alias = "warning")]
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

/// `level` applies to every target without a more specific directive.
/// Malformed directives are skipped.
pub fn build_filter(level: LogLevel, directives: Option<&str>) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(level.as_filter().into())
        .parse_lossy(directives.unwrap_or_default())
}

pub fn init_logging(format: LogFormat, level: LogLevel) {
    let directives = std::env::var(DIRECTIVES_ENV).ok();
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(build_filter(level, directives.as_deref()))
        .with_ansi(false)
        .with_target(true);

    match format {
        LogFormat::Text => {
            let _ = builder.try_init();
        }
        LogFormat::Json => {
            let _ = builder.json().try_init();
        }
    }
}
