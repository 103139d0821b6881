//! Service configuration
//!
//! Layered loading: YAML file first, then `SIMSRV_`-prefixed environment
//! variables (e.g. `SIMSRV_DEVICE__HOST`). Every field has a default so the
//! service starts against a local simulator without any file present.

use std::time::Duration;

use figment::{
    providers::{Env, Format, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SimSrvError};

/// Field device connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(default = "default_device_host")]
    pub host: String,
    #[serde(default = "default_device_port")]
    pub port: u16,
    #[serde(default = "default_unit_id")]
    pub unit_id: u8,
}

/// Historian database settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistorianConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

/// Simulation pacing and scenario source settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_scenario_file")]
    pub scenario_file: String,
    /// Pause between steps; pacing only, not flow control
    #[serde(default = "default_step_interval_secs")]
    pub step_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub historian: HistorianConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

fn default_device_host() -> String {
    "127.0.0.1".to_string()
}

fn default_device_port() -> u16 {
    502
}

fn default_unit_id() -> u8 {
    1
}

fn default_db_path() -> String {
    "data/simsrv.db".to_string()
}

fn default_scenario_file() -> String {
    "config/sensor_data.txt".to_string()
}

fn default_step_interval_secs() -> u64 {
    10
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            host: default_device_host(),
            port: default_device_port(),
            unit_id: default_unit_id(),
        }
    }
}

impl Default for HistorianConfig {
    fn default() -> Self {
        HistorianConfig {
            db_path: default_db_path(),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            scenario_file: default_scenario_file(),
            step_interval_secs: default_step_interval_secs(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            device: DeviceConfig::default(),
            historian: HistorianConfig::default(),
            simulation: SimulationConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file merged with environment
    /// overrides
    pub fn load(path: &str) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Yaml::file(path))
            .merge(Env::prefixed("SIMSRV_").split("__"))
            .extract()
            .map_err(|e| SimSrvError::ConfigError(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration completeness
    pub fn validate(&self) -> Result<()> {
        if self.device.host.is_empty() {
            return Err(SimSrvError::ConfigError(
                "device host cannot be empty".to_string(),
            ));
        }
        if self.historian.db_path.is_empty() {
            return Err(SimSrvError::ConfigError(
                "historian db_path cannot be empty".to_string(),
            ));
        }
        if self.simulation.scenario_file.is_empty() {
            return Err(SimSrvError::ConfigError(
                "scenario file path cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Inter-step pause as a typed duration
    pub fn step_interval(&self) -> Duration {
        Duration::from_secs(self.simulation.step_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.device.port, 502);
        assert_eq!(config.step_interval(), Duration::from_secs(10));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = Config::load("config/does-not-exist.yaml").unwrap();
        assert_eq!(config.device.host, "127.0.0.1");
    }

    #[test]
    fn test_empty_host_is_rejected() {
        let mut config = Config::default();
        config.device.host.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_yaml_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("simsrv.yaml");
        std::fs::write(
            &path,
            "device:\n  host: 10.0.0.5\n  port: 1502\nsimulation:\n  step_interval_secs: 1\n",
        )
        .unwrap();

        let config = Config::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.device.host, "10.0.0.5");
        assert_eq!(config.device.port, 1502);
        assert_eq!(config.step_interval(), Duration::from_secs(1));
        // Untouched sections keep their defaults
        assert_eq!(config.historian.db_path, "data/simsrv.db");
    }
}
