//! Logging setup and configuration.

use tracing_appender::rolling::RollingFileAppender;
use tracing_appender::rolling::Rotation;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::Config;
use crate::error::AppError;

/// Sets up logging with both console and file output.
///
/// Records emitted through the `log` macros are forwarded into the same
/// subscriber, so they pick up the worker and scheduler spans.
pub fn setup_logging(config: &Config) -> Result<(), AppError> {
    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("promo-watch")
        .filename_suffix("log")
        .max_log_files(7)
        .build(&config.logs_path)
        .map_err(|e| AppError::ConfigurationError {
            msg: format!(
                "Failed to initialize rolling file appender at '{}': {}",
                config.logs_path.to_string_lossy(),
                e
            ),
        })?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // The writer thread must outlive every task that logs.
    std::mem::forget(guard);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("promo_watch=info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stdout).with_ansi(true))
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .try_init()
        .map_err(|e| AppError::ConfigurationError {
            msg: format!("Failed to install log subscriber: {e}"),
        })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unusable_logs_path_is_configuration_error() {
        let blocker = std::env::temp_dir().join(format!(
            "promo-watch-logging-test-{}",
            std::process::id()
        ));
        std::fs::write(&blocker, b"not a directory").unwrap();

        let mut config = Config::new();
        config.logs_path = blocker.join("logs");
        let result = setup_logging(&config);
        std::fs::remove_file(&blocker).unwrap();

        match result {
            Err(AppError::ConfigurationError { msg }) => {
                assert!(msg.contains("rolling file appender"), "{msg}");
            }
            other => panic!("expected ConfigurationError, got {other:?}"),
        }
    }
}
