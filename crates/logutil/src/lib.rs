//! Utilities for logging.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

/// Output format of log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    HumanReadable,
    Json,
}

/// Configure the global logger.
///
/// `default_level` is used when `RUST_LOG` isn't set. Calling this more than
/// once is a no-op after the first successful call.
pub fn configure_global_logger(default_level: tracing::Level, format: LogFormat) {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(default_level).into())
        .from_env_lossy();

    let builder = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_thread_ids(true)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Json => {
            let _ = builder.json().try_init();
        }
        LogFormat::HumanReadable => {
            let _ = builder.try_init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configure_more_than_once() {
        configure_global_logger(tracing::Level::DEBUG, LogFormat::HumanReadable);
        configure_global_logger(tracing::Level::INFO, LogFormat::Json);
        tracing::debug!("still logging");
    }
}
