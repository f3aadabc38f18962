use std::path::Path;
use std::time::Duration;

use log::{info, warn};
use serde::Deserialize;
use serde_json::Value;

use crate::error::Result;

pub const DEFAULT_DEVICE_NAME: &str = "HUAWEI WATCH HR-487";
pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_SCAN_ATTEMPTS: u32 = 5;
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// How the supervisor finds and re-finds the sensor. Read once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct SupervisorConfig {
    /// Substring matched (case-sensitively) against advertised names.
    pub device_name_filter: String,
    /// Upper bound on a single discovery scan.
    pub scan_timeout: Duration,
    /// Scans per locate cycle before giving up on that cycle.
    pub max_scan_attempts: u32,
    /// Fixed pause between the end of one cycle and the start of the next.
    pub retry_interval: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        SupervisorConfig {
            device_name_filter: DEFAULT_DEVICE_NAME.to_string(),
            scan_timeout: DEFAULT_SCAN_TIMEOUT,
            max_scan_attempts: DEFAULT_MAX_SCAN_ATTEMPTS,
            retry_interval: DEFAULT_RETRY_INTERVAL,
        }
    }
}

// Fields stay untyped so one bad value doesn't throw away the rest of the file.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(alias = "device_name")]
    device_name_filter: Option<Value>,
    scan_timeout_seconds: Option<Value>,
    max_scan_attempts: Option<Value>,
    retry_interval_seconds: Option<Value>,
}

impl SupervisorConfig {
    /// Reads the config at `path`, falling back to defaults for the whole file
    /// when it can't be read and for each field that is missing or invalid.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::read(path) {
            Ok(config) => {
                info!("Loaded config from {}: {config:?}", path.display());
                config
            }
            Err(err) => {
                warn!("Could not load config from {}: {err}, using defaults", path.display());
                SupervisorConfig::default()
            }
        }
    }

    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let file: ConfigFile = serde_json::from_str(text)?;
        let defaults = SupervisorConfig::default();

        let device_name_filter = match file.device_name_filter {
            Some(Value::String(name)) if !name.is_empty() => name,
            other => fallback("device_name_filter", other, defaults.device_name_filter),
        };

        let scan_timeout = match file.scan_timeout_seconds.as_ref().and_then(seconds) {
            Some(timeout) => timeout,
            None => fallback(
                "scan_timeout_seconds",
                file.scan_timeout_seconds,
                defaults.scan_timeout,
            ),
        };

        let max_scan_attempts = match file.max_scan_attempts.as_ref().and_then(Value::as_u64) {
            Some(attempts) if attempts > 0 => u32::try_from(attempts).unwrap_or(u32::MAX),
            _ => fallback("max_scan_attempts", file.max_scan_attempts, defaults.max_scan_attempts),
        };

        let retry_interval = match file.retry_interval_seconds.as_ref().and_then(seconds) {
            Some(interval) => interval,
            None => fallback(
                "retry_interval_seconds",
                file.retry_interval_seconds,
                defaults.retry_interval,
            ),
        };

        Ok(SupervisorConfig {
            device_name_filter,
            scan_timeout,
            max_scan_attempts,
            retry_interval,
        })
    }
}

fn seconds(value: &Value) -> Option<Duration> {
    let secs = value.as_f64()?;
    if secs.is_finite() && secs > 0.0 {
        Duration::try_from_secs_f64(secs).ok()
    } else {
        None
    }
}

fn fallback<T: std::fmt::Debug>(field: &str, found: Option<Value>, default: T) -> T {
    if let Some(value) = found {
        warn!("Invalid value {value} for {field}, using {default:?}");
    }
    default
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_config_is_read() {
        let config = SupervisorConfig::from_json(
            r#"{"device_name_filter": "HR-487", "scan_timeout_seconds": 10,
                "max_scan_attempts": 3, "retry_interval_seconds": 2.5}"#,
        )
        .unwrap();

        assert_eq!(config.device_name_filter, "HR-487");
        assert_eq!(config.scan_timeout, Duration::from_secs(10));
        assert_eq!(config.max_scan_attempts, 3);
        assert_eq!(config.retry_interval, Duration::from_millis(2500));
    }

    #[test]
    fn missing_fields_use_defaults() {
        let config = SupervisorConfig::from_json("{}").unwrap();
        assert_eq!(config, SupervisorConfig::default());
    }

    #[test]
    fn invalid_fields_fall_back_individually() {
        let config = SupervisorConfig::from_json(
            r#"{"device_name_filter": 42, "scan_timeout_seconds": -1,
                "max_scan_attempts": 0, "retry_interval_seconds": 7}"#,
        )
        .unwrap();

        assert_eq!(config.device_name_filter, DEFAULT_DEVICE_NAME);
        assert_eq!(config.scan_timeout, DEFAULT_SCAN_TIMEOUT);
        assert_eq!(config.max_scan_attempts, DEFAULT_MAX_SCAN_ATTEMPTS);
        assert_eq!(config.retry_interval, Duration::from_secs(7));
    }

    #[test]
    fn device_name_key_is_accepted() {
        let config = SupervisorConfig::from_json(r#"{"device_name": "COROS PACE Pro"}"#).unwrap();
        assert_eq!(config.device_name_filter, "COROS PACE Pro");
    }

    #[test]
    fn unreadable_file_gives_defaults() {
        let config = SupervisorConfig::load("/nonexistent/bthr-link/config.json");
        assert_eq!(config, SupervisorConfig::default());
    }
}
