//! Runtime configuration loaded from the environment.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::time::Duration;

use dotenv::dotenv;
use log::debug;

use crate::error::AppError;

/// Rate budget of one external source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SourceLimits {
    /// Maximum calls inside any rolling 60 second window.
    pub requests_per_minute: NonZeroU32,
    /// Minimum spacing between two consecutive calls.
    pub min_interval: Duration,
}

impl SourceLimits {
    pub fn new(requests_per_minute: NonZeroU32, min_interval: Duration) -> Self {
        Self {
            requests_per_minute,
            min_interval,
        }
    }
}

/// Settings of the promotion monitoring engine.
#[derive(Clone, Debug)]
pub struct MonitorConfig {
    /// Period of the scheduling loop.
    pub scheduler_interval: Duration,
    /// Cadence used for subscribers that never configured one.
    pub default_check_interval: Duration,
    /// Pause after a worker iteration failed unexpectedly.
    pub worker_error_delay: Duration,
    /// Minimum spacing between outbound notifications. Zero disables pacing.
    pub notify_interval: Duration,
    /// Delays between retries of a failing source call. Its length is the attempt ceiling.
    pub retry_backoff: Vec<Duration>,
    /// Rate budget per source name.
    pub sources: HashMap<String, SourceLimits>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            scheduler_interval: Duration::from_secs(900),
            default_check_interval: Duration::from_secs(14400),
            worker_error_delay: Duration::from_secs(5),
            notify_interval: Duration::from_secs(2),
            retry_backoff: [1, 2, 5, 10, 30].map(Duration::from_secs).to_vec(),
            sources: default_sources(),
        }
    }
}

const DEFAULT_REQUESTS_PER_MINUTE: NonZeroU32 = NonZeroU32::new(30).unwrap();

fn default_sources() -> HashMap<String, SourceLimits> {
    let limits = SourceLimits::new(DEFAULT_REQUESTS_PER_MINUTE, Duration::from_secs(2));
    HashMap::from([
        ("ozon".to_string(), limits),
        ("wildberries".to_string(), limits),
    ])
}

#[derive(Clone, Debug)]
pub struct Config {
    pub logs_path: PathBuf,
    pub monitor: MonitorConfig,
}

impl Config {
    pub fn new() -> Self {
        Self {
            logs_path: PathBuf::from("logs"),
            monitor: MonitorConfig::default(),
        }
    }

    /// Overrides the defaults with values from `.env` and the process environment.
    pub fn load(&mut self) -> Result<(), AppError> {
        dotenv().ok();

        if let Some(path) = env_var("LOGS_PATH") {
            self.logs_path = PathBuf::from(path);
        }
        if let Some(v) = env_var("MONITOR_INTERVAL") {
            self.monitor.scheduler_interval = parse_secs("MONITOR_INTERVAL", &v)?;
        }
        if let Some(v) = env_var("CHECK_INTERVAL") {
            self.monitor.default_check_interval = parse_secs("CHECK_INTERVAL", &v)?;
        }
        if let Some(v) = env_var("WORKER_ERROR_DELAY") {
            self.monitor.worker_error_delay = parse_secs("WORKER_ERROR_DELAY", &v)?;
        }
        if let Some(v) = env_var("NOTIFY_INTERVAL") {
            self.monitor.notify_interval = parse_secs("NOTIFY_INTERVAL", &v)?;
        }
        if let Some(v) = env_var("RETRY_BACKOFF") {
            self.monitor.retry_backoff = parse_backoff("RETRY_BACKOFF", &v)?;
        }
        if let Some(v) = env_var("SOURCE_LIMITS") {
            self.monitor.sources = parse_source_limits("SOURCE_LIMITS", &v)?;
        }

        debug!("Loaded configuration: {:?}", self);
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_secs(key: &str, value: &str) -> Result<Duration, AppError> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|e| AppError::invalid_config(key, value, e.to_string()))
}

/// Parses `"1,2,5"` into a list of second delays.
fn parse_backoff(key: &str, value: &str) -> Result<Vec<Duration>, AppError> {
    let delays = value
        .split(',')
        .map(|part| parse_secs(key, part))
        .collect::<Result<Vec<_>, _>>()?;

    if delays.is_empty() {
        return Err(AppError::invalid_config(
            key,
            value,
            "at least one attempt is required",
        ));
    }
    Ok(delays)
}

/// Parses `"name:rpm:min_interval,..."`.
fn parse_source_limits(key: &str, value: &str) -> Result<HashMap<String, SourceLimits>, AppError> {
    let mut sources = HashMap::new();

    for entry in value.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let parts: Vec<&str> = entry.split(':').map(str::trim).collect();
        let &[name, rpm, min_interval] = parts.as_slice() else {
            return Err(AppError::invalid_config(
                key,
                entry,
                "expected `name:requests_per_minute:min_interval`",
            ));
        };
        if name.is_empty() {
            return Err(AppError::invalid_config(key, entry, "empty source name"));
        }

        let rpm = rpm
            .parse::<u32>()
            .ok()
            .and_then(NonZeroU32::new)
            .ok_or_else(|| {
                AppError::invalid_config(key, entry, "requests per minute must be a positive integer")
            })?;
        let min_interval = parse_secs(key, min_interval)?;

        sources.insert(name.to_lowercase(), SourceLimits::new(rpm, min_interval));
    }

    if sources.is_empty() {
        return Err(AppError::invalid_config(key, value, "no sources configured"));
    }
    Ok(sources)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEYS: [&str; 7] = [
        "LOGS_PATH",
        "MONITOR_INTERVAL",
        "CHECK_INTERVAL",
        "WORKER_ERROR_DELAY",
        "NOTIFY_INTERVAL",
        "RETRY_BACKOFF",
        "SOURCE_LIMITS",
    ];

    fn clear_env() {
        for key in KEYS {
            // SAFETY: env-mutating tests are serialized with `serial_test`.
            unsafe { std::env::remove_var(key) };
        }
    }

    #[test]
    fn test_defaults() {
        let config = Config::new();
        assert_eq!(config.monitor.scheduler_interval, Duration::from_secs(900));
        assert_eq!(config.monitor.default_check_interval, Duration::from_secs(14400));
        assert_eq!(config.monitor.retry_backoff.len(), 5);

        let ozon = config.monitor.sources["ozon"];
        assert_eq!(ozon.requests_per_minute.get(), 30);
        assert_eq!(ozon.min_interval, Duration::from_secs(2));
        assert!(config.monitor.sources.contains_key("wildberries"));
    }

    #[test]
    fn test_parse_backoff() {
        assert_eq!(
            parse_backoff("K", "1, 2,30").unwrap(),
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(30)
            ]
        );
        assert!(parse_backoff("K", "1,x").is_err());
    }

    #[test]
    fn test_parse_source_limits() {
        let sources = parse_source_limits("K", "Ozon:10:1, wildberries:60:0").unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources["ozon"].requests_per_minute.get(), 10);
        assert_eq!(sources["wildberries"].min_interval, Duration::ZERO);

        assert!(parse_source_limits("K", "ozon:0:1").is_err());
        assert!(parse_source_limits("K", "ozon:10").is_err());
        assert!(parse_source_limits("K", ":10:1").is_err());
        assert!(parse_source_limits("K", " , ").is_err());
    }

    #[test]
    #[serial_test::serial]
    fn test_load_from_env() {
        clear_env();
        // SAFETY: see `clear_env`.
        unsafe {
            std::env::set_var("MONITOR_INTERVAL", "60");
            std::env::set_var("NOTIFY_INTERVAL", "0");
            std::env::set_var("RETRY_BACKOFF", "1,1");
            std::env::set_var("SOURCE_LIMITS", "ozon:5:1");
        }

        let mut config = Config::new();
        config.load().expect("Failed to load config");

        assert_eq!(config.monitor.scheduler_interval, Duration::from_secs(60));
        assert_eq!(config.monitor.notify_interval, Duration::ZERO);
        assert_eq!(config.monitor.retry_backoff.len(), 2);
        assert_eq!(config.monitor.sources.len(), 1);
        assert_eq!(config.monitor.default_check_interval, Duration::from_secs(14400));

        clear_env();
    }

    #[test]
    #[serial_test::serial]
    fn test_load_rejects_malformed_value() {
        clear_env();
        // SAFETY: see `clear_env`.
        unsafe { std::env::set_var("CHECK_INTERVAL", "four hours") };

        let mut config = Config::new();
        let err = config.load().unwrap_err();
        assert!(matches!(err, AppError::InvalidConfig { ref key, .. } if key == "CHECK_INTERVAL"));

        clear_env();
    }
}
