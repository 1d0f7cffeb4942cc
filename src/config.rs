//! # Plotter Configuration
//!
//! Tick periods, log placement and motor defaults, loaded from TOML.
//!
//! ## Example: TOML Configuration
//!
//! ```toml
//! [simulation]
//! period = 0.05
//!
//! [logging]
//! period = 0.5
//! directory = "logs"
//!
//! [motor]
//! max_speed = 2.0
//! acceleration = 4.0
//! target = 25.0
//! ```
//!
//! Every field is optional; missing values fall back to the defaults below.

// src/config.rs - Single configuration file
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration struct for the simulation clock, pen logging and motor defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub motor: MotorDefaults,
}

/// Simulation tick configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulationConfig {
    /// Simulation tick period in seconds.
    #[serde(default = "default_simulation_period")]
    pub period: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            period: default_simulation_period(),
        }
    }
}

/// Pen logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Logging tick period in seconds.
    #[serde(default = "default_logging_period")]
    pub period: f64,
    /// Directory the per-pen `<name>.log` files are created in.
    #[serde(default = "default_log_directory")]
    pub directory: PathBuf,
    /// Write the pen-up marker as `<time>--;--` instead of `<time>;--;--`.
    #[serde(default)]
    pub legacy_pen_up_marker: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            period: default_logging_period(),
            directory: default_log_directory(),
            legacy_pen_up_marker: false,
        }
    }
}

/// Parameters given to every newly created motor.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct MotorDefaults {
    #[serde(default = "default_max_speed")]
    pub max_speed: f64,
    #[serde(default = "default_acceleration")]
    pub acceleration: f64,
    #[serde(default = "default_target")]
    pub target: f64,
}

impl Default for MotorDefaults {
    fn default() -> Self {
        Self {
            max_speed: default_max_speed(),
            acceleration: default_acceleration(),
            target: default_target(),
        }
    }
}

impl Config {
    /// Validate periods and motor defaults.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if tick_period(self.simulation.period).is_none() {
            return Err(ConfigError::Invalid(format!(
                "simulation period must be between 0 and {} seconds, got {}",
                MAX_TICK_PERIOD.as_secs(),
                self.simulation.period
            )));
        }
        if tick_period(self.logging.period).is_none() {
            return Err(ConfigError::Invalid(format!(
                "logging period must be between 0 and {} seconds, got {}",
                MAX_TICK_PERIOD.as_secs(),
                self.logging.period
            )));
        }
        if !(self.motor.acceleration >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "motor acceleration must be >= 0, got {}",
                self.motor.acceleration
            )));
        }
        Ok(())
    }
}

/// Longest tick period accepted for either worker.
pub const MAX_TICK_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

/// Converts a period in seconds to a tick duration; `None` unless positive,
/// non-zero and at most [`MAX_TICK_PERIOD`].
pub fn tick_period(seconds: f64) -> Option<Duration> {
    if seconds > 0.0 {
        Duration::try_from_secs_f64(seconds)
            .ok()
            .filter(|d| !d.is_zero() && *d <= MAX_TICK_PERIOD)
    } else {
        None
    }
}

// Default value functions
fn default_simulation_period() -> f64 { 0.1 }
fn default_logging_period() -> f64 { 1.0 }
fn default_log_directory() -> PathBuf { PathBuf::from(".") }
fn default_max_speed() -> f64 { 1.0 }
fn default_acceleration() -> f64 { 1.0 }
fn default_target() -> f64 { 10.0 }

/// Load and validate configuration from a TOML file at the given path.
pub fn load_config(path: &str) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        tracing::error!("Failed to read config file '{}': {}", path, e);
        ConfigError::Io(e)
    })?;
    let config: Config = toml::from_str(&contents).map_err(|e| {
        tracing::error!("Failed to parse config TOML: {}", e);
        ConfigError::Toml(e)
    })?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.simulation.period, 0.1);
        assert_eq!(config.logging.period, 1.0);
        assert_eq!(config.logging.directory, PathBuf::from("."));
        assert!(!config.logging.legacy_pen_up_marker);
        assert_eq!(config.motor.max_speed, 1.0);
        assert_eq!(config.motor.acceleration, 1.0);
        assert_eq!(config.motor.target, 10.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_config_success() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("plotter.toml");
        let mut file = File::create(&file_path).unwrap();
        writeln!(file, "[simulation]\nperiod = 0.05\n[motor]\ntarget = 3.5").unwrap();
        file.flush().unwrap();
        let config = load_config(file_path.to_str().unwrap()).unwrap();
        assert_eq!(config.simulation.period, 0.05);
        assert_eq!(config.motor.target, 3.5);
        // Defaults for missing fields
        assert_eq!(config.logging.period, 1.0);
        assert_eq!(config.motor.acceleration, 1.0);
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config("nonexistent_file.toml");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("bad.toml");
        let mut file = File::create(&file_path).unwrap();
        writeln!(file, "not a valid toml").unwrap();
        file.flush().unwrap();
        let result = load_config(file_path.to_str().unwrap());
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn test_rejects_non_positive_period() {
        let toml = r#"
        [logging]
        period = 0.0
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_tick_period() {
        assert_eq!(tick_period(0.1), Some(Duration::from_millis(100)));
        assert_eq!(tick_period(0.0), None);
        assert_eq!(tick_period(-1.0), None);
        assert_eq!(tick_period(f64::NAN), None);
        assert_eq!(tick_period(f64::INFINITY), None);
        assert_eq!(tick_period(86400.0), Some(MAX_TICK_PERIOD));
        assert_eq!(tick_period(86400.5), None);
        assert_eq!(tick_period(1e19), None);
    }

    #[test]
    fn test_rejects_unschedulable_period() {
        let toml = r#"
        [simulation]
        period = 1e19
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_negative_acceleration() {
        let toml = r#"
        [motor]
        acceleration = -2.0
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
