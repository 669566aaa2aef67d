//! Configuration for the TetherDrive client
//!
//! Loads configuration from a TOML file. Every section falls back to the
//! Create 2 defaults when omitted.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub drive: DriveConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Serial link to the robot
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Port to open when none is given on the command line
    pub port: String,
    /// Baud rate (Create 2 default is 115200)
    pub baud_rate: u32,
    /// How long a sensor query waits for its response
    pub response_timeout_ms: u64,
}

/// Key-driven motion steps
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DriveConfig {
    /// Velocity applied while forward/back is held (mm/s)
    pub velocity_step: i16,
    /// Rotation applied while left/right is held (mm/s wheel differential)
    pub rotation_step: i16,
}

/// Telemetry polling
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Poll period in milliseconds
    pub interval_ms: u64,
    /// Log every rendered sample at info level
    pub log_samples: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level (trace, debug, info, warn, error); RUST_LOG overrides
    pub level: String,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 115_200,
            response_timeout_ms: 500,
        }
    }
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            velocity_step: 200,
            rotation_step: 300,
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 500,
            log_samples: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl SerialConfig {
    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl AppConfig {
    /// Load configuration from TOML file
    ///
    /// # Example
    /// ```no_run
    /// use tether_drive::config::AppConfig;
    ///
    /// let config = AppConfig::from_file("tether.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the session cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.polling.interval_ms == 0 {
            return Err(Error::Config(
                "polling.interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Save configuration to TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.serial.baud_rate, 115_200);
        assert_eq!(config.drive.velocity_step, 200);
        assert_eq!(config.drive.rotation_step, 300);
        assert_eq!(config.polling.interval(), Duration::from_millis(500));
        assert!(!config.polling.log_samples);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let toml_content = r#"
[serial]
port = "/dev/ttyACM0"

[polling]
interval_ms = 250
"#;

        let config: AppConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.serial.port, "/dev/ttyACM0");
        assert_eq!(config.serial.baud_rate, 115_200);
        assert_eq!(config.polling.interval_ms, 250);
        assert_eq!(config.drive.velocity_step, 200);
    }

    #[test]
    fn test_toml_serialization() {
        let config = AppConfig::default();
        let toml_string = toml::to_string_pretty(&config).unwrap();

        assert!(toml_string.contains("[serial]"));
        assert!(toml_string.contains("[drive]"));
        assert!(toml_string.contains("[polling]"));
        assert!(toml_string.contains("[logging]"));
        assert!(toml_string.contains("velocity_step = 200"));
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tether.toml");

        let mut config = AppConfig::default();
        config.serial.port = "COM4".to_string();
        config.drive.rotation_step = 150;
        config.to_file(&path).unwrap();

        let loaded = AppConfig::from_file(&path).unwrap();
        assert_eq!(loaded.serial.port, "COM4");
        assert_eq!(loaded.drive.rotation_step, 150);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "[serial\nport = 3").unwrap();

        let err = AppConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
    }

    #[test]
    fn test_zero_poll_interval_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zero.toml");
        fs::write(&path, "[polling]\ninterval_ms = 0\n").unwrap();

        let err = AppConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
        assert!(AppConfig::default().validate().is_ok());
    }
}
