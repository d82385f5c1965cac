use clap::ValueEnum;
use tracing::subscriber::SetGlobalDefaultError;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Quiet,
}

impl LogLevel {
    fn directive(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Quiet => "off",
        }
    }
}

/// Builds the filter applying `level` to the library and to each of `targets`.
pub fn env_filter(targets: &[&str], level: LogLevel) -> String {
    std::iter::once("vhs_client")
        .chain(targets.iter().copied())
        .map(|target| format!("{}={}", target, level.directive()))
        .collect::<Vec<_>>()
        .join(",")
}

/// Installs the global fmt subscriber used by the binaries.
pub fn init_tracing(
    targets: &[&str],
    level: LogLevel,
    timestamp: bool,
) -> Result<(), SetGlobalDefaultError> {
    let filter = env_filter(targets, level);

    // "if" because the subscriber doesn't yield the same type with or without time which prevents
    // using a match statement.
    if timestamp {
        let sub = tracing_subscriber::fmt::Subscriber::builder()
            .with_env_filter(filter)
            .finish();
        tracing::subscriber::set_global_default(sub)
    } else {
        let sub = tracing_subscriber::fmt::Subscriber::builder()
            .with_env_filter(filter)
            .without_time()
            .finish();
        tracing::subscriber::set_global_default(sub)
    }
}
