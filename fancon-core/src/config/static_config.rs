//! Static configuration loaded once at startup
//!
//! This configuration is read-only after the console starts.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::board::{BoardConfig, DefaultBoard};
use crate::types::FanControllerConfig;
use crate::{FanconError, Result};

/// Console link configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Console baud rate
    pub baud_rate: u32,
    /// Emit ANSI colours on the console
    pub color: bool,
    /// Serial device to serve the console on; stdin/stdout when unset
    pub device: Option<String>,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            baud_rate: DefaultBoard::BAUD_RATE,
            color: true,
            device: None,
        }
    }
}

/// Register bus configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Enable fast-mode plus
    pub fast_mode: bool,
    /// Transfer attempts per request; every failed attempt re-initializes the bus
    pub attempts: u8,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            fast_mode: false,
            attempts: 1,
        }
    }
}

/// Static configuration for the console firmware.
///
/// Located at `~/.config/fancon/config.toml` by default. A file without a
/// `[fan]` table leaves the fan controller unconfigured.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticConfig {
    /// Console link settings
    #[serde(default)]
    pub console: ConsoleConfig,

    /// Register bus settings
    #[serde(default)]
    pub bus: BusConfig,

    /// MAX6650 and fan settings
    pub fan: Option<FanControllerConfig>,
}

impl Default for StaticConfig {
    fn default() -> Self {
        Self {
            console: ConsoleConfig::default(),
            bus: BusConfig::default(),
            fan: Some(FanControllerConfig::default()),
        }
    }
}

impl StaticConfig {
    /// Parse StaticConfig from TOML string.
    pub fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Serialize StaticConfig to TOML string.
    pub fn to_toml(&self) -> std::result::Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Load and validate the configuration file, falling back to defaults
    /// when it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field constraints
    pub fn validate(&self) -> Result<()> {
        if self.bus.attempts == 0 {
            return Err(FanconError::Config(
                "bus.attempts must be at least 1".to_string(),
            ));
        }
        if let Some(fan) = &self.fan {
            fan.validate()
                .map_err(|e| FanconError::Config(format!("[fan]: {}", e)))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AddressLine, KScale};
    use std::io::Write;

    #[test]
    fn test_default_static_config() {
        let config = StaticConfig::default();
        assert_eq!(config.console.baud_rate, 115200);
        assert!(config.console.device.is_none());
        assert_eq!(config.bus.attempts, 1);
        assert_eq!(config.fan, Some(FanControllerConfig::default()));
    }

    #[test]
    fn test_static_config_serialization() {
        let config = StaticConfig::default();
        let toml_str = config.to_toml().unwrap();

        assert!(toml_str.contains("[console]"));
        assert!(toml_str.contains("[bus]"));
        assert!(toml_str.contains("[fan]"));
        assert!(toml_str.contains("k_scale = 16"));
    }

    #[test]
    fn test_static_config_deserialization() {
        let toml_str = r#"
            [console]
            baud_rate = 9600
            color = false
            device = "/dev/ttyACM0"

            [bus]
            fast_mode = true
            attempts = 3

            [fan]
            address_line = "vcc"
            operating_mode = "closed-loop"
            fan_voltage = "12v"
            k_scale = 8
            rpm_max = 4000
        "#;

        let config = StaticConfig::from_toml(toml_str).unwrap();
        assert_eq!(config.console.baud_rate, 9600);
        assert!(!config.console.color);
        assert_eq!(config.console.device.as_deref(), Some("/dev/ttyACM0"));
        assert!(config.bus.fast_mode);
        assert_eq!(config.bus.attempts, 3);
        let fan = config.fan.unwrap();
        assert_eq!(fan.address_line, AddressLine::Vcc);
        assert_eq!(fan.k_scale, KScale::X8);
    }

    #[test]
    fn test_missing_fan_table_leaves_fan_unconfigured() {
        let config = StaticConfig::from_toml("[console]\ncolor = false\n").unwrap();
        assert!(config.fan.is_none());
        assert_eq!(config.console.baud_rate, 115200);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = StaticConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert!(config.fan.is_some());
    }

    #[test]
    fn test_load_rejects_invalid_fan() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[fan]\naddress_line = \"gnd\"\noperating_mode = \"closed-loop\"\nfan_voltage = \"12v\"\nk_scale = 16\nrpm_max = 50"
        )
        .unwrap();

        let result = StaticConfig::load(file.path());
        assert!(matches!(result, Err(FanconError::Config(_))));
    }

    #[test]
    fn test_load_rejects_zero_attempts() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[bus]\nattempts = 0").unwrap();

        let result = StaticConfig::load(file.path());
        assert!(matches!(result, Err(FanconError::Config(_))));
    }
}
