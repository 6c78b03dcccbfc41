//! Configuration files
//!
//! Driver settings are built in layers: [`DriverConfig`] defaults, then the
//! board classification for the DMI identity, then whatever the TOML file
//! sets. A separate register dump seeds the simulated EC.
//!
//! ```toml
//! [identity]              # classify as this board instead of the running one
//! board_name = "POLARIS1501A2060"
//!
//! [driver]
//! brightness = 120
//! color = 0x00ff00
//!
//! [driver.calibration]
//! attempts = 20
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use uniwill_keyboard::{CalibrationConfig, DriverConfig, FanProfileScheme};

use crate::boards::BoardFeatures;
use crate::dmi::DmiIdentity;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid register address: {0}")]
    InvalidAddress(String),
}

/// Driver fields a config file may override; unset fields keep the layer below
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DriverOverrides {
    pub brightness: Option<u8>,
    pub color: Option<u32>,
    pub rgb_single_zone: Option<bool>,
    pub lightbar: Option<bool>,
    pub fan_profile: Option<FanProfileScheme>,
    pub charging_unsupported: Option<bool>,
    pub calibration: Option<CalibrationConfig>,
    pub write_retries: Option<u32>,
    pub retry_backoff_ms: Option<u64>,
}

impl DriverOverrides {
    pub fn apply(&self, config: &mut DriverConfig) {
        macro_rules! set {
            ($($field:ident),*) => {
                $(if let Some(value) = &self.$field {
                    config.$field = value.clone();
                })*
            };
        }
        set!(
            brightness,
            color,
            rgb_single_zone,
            lightbar,
            fan_profile,
            charging_unsupported,
            calibration,
            write_retries,
            retry_backoff_ms
        );
    }
}

/// Contents of a `--config` file
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub identity: Option<DmiIdentity>,
    pub driver: DriverOverrides,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::from_toml(&read(path)?)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Identity to classify: the configured one, else the detected one
    pub fn identity(&self, detected: DmiIdentity) -> DmiIdentity {
        self.identity.clone().unwrap_or(detected)
    }

    /// Layer defaults, board classification and overrides
    pub fn driver_config(&self, identity: &DmiIdentity) -> DriverConfig {
        let mut config = DriverConfig::default();
        BoardFeatures::classify(identity).apply(&mut config);
        self.driver.apply(&mut config);
        config
    }
}

/// EC register contents, keyed by address
///
/// ```toml
/// [registers]
/// "0x078c" = 0x02
/// "0x0740" = 0x13
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegisterDump {
    registers: BTreeMap<String, u8>,
}

impl RegisterDump {
    pub fn load(path: &Path) -> Result<Vec<(u16, u8)>, ConfigError> {
        Self::from_toml(&read(path)?)
    }

    pub fn from_toml(content: &str) -> Result<Vec<(u16, u8)>, ConfigError> {
        let dump: Self = toml::from_str(content)?;
        let mut registers = dump
            .registers
            .iter()
            .map(|(address, value)| Ok((parse_address(address)?, *value)))
            .collect::<Result<Vec<_>, ConfigError>>()?;
        registers.sort_unstable();
        Ok(registers)
    }
}

/// Parse a register address, hex with `0x` prefix or decimal
pub fn parse_address(s: &str) -> Result<u16, ConfigError> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|_| ConfigError::InvalidAddress(s.to_string()))
}

fn read(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_settings_use_classification() {
        let settings = Settings::from_toml("").unwrap();
        let config = settings.driver_config(&DmiIdentity::new("POLARIS1701I2060", "", ""));
        assert!(config.rgb_single_zone);
        assert_eq!(config.fan_profile, FanProfileScheme::V1ThreeProfiles);
        assert_eq!(config.brightness, DriverConfig::default().brightness);
    }

    #[test]
    fn test_overrides_win_over_classification() {
        let settings = Settings::from_toml(
            r#"
            [driver]
            brightness = 120
            rgb_single_zone = false
            fan_profile = "v1_two_profiles"

            [driver.calibration]
            attempts = 20
            "#,
        )
        .unwrap();
        let config = settings.driver_config(&DmiIdentity::new("POLARIS1701I2060", "", ""));
        assert_eq!(config.brightness, 120);
        assert!(!config.rgb_single_zone);
        assert_eq!(config.fan_profile, FanProfileScheme::V1TwoProfiles);
        assert_eq!(config.calibration.attempts, 20);
        assert_eq!(config.calibration.window, 3);
        assert_eq!(config.color, DriverConfig::default().color);
    }

    #[test]
    fn test_identity_override() {
        let settings = Settings::from_toml(
            r#"
            [identity]
            product_name = "A60 MUV"
            "#,
        )
        .unwrap();
        let identity = settings.identity(DmiIdentity::new("SOMETHING", "", ""));
        assert_eq!(identity.product_name, "A60 MUV");
        assert!(identity.board_name.is_empty());
        assert!(settings.driver_config(&identity).lightbar);
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!(matches!(
            Settings::from_toml("[driver]\nbrightnes = 3\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_register_dump() {
        let registers = RegisterDump::from_toml(
            r#"
            [registers]
            "0x078c" = 2
            "1856" = 0x13
            "#,
        )
        .unwrap();
        assert_eq!(registers, vec![(0x0740, 0x13), (0x078c, 0x02)]);
    }

    #[test]
    fn test_register_dump_bad_address() {
        assert!(matches!(
            RegisterDump::from_toml("[registers]\n\"0xzz\" = 1\n"),
            Err(ConfigError::InvalidAddress(_))
        ));
        assert!(matches!(
            RegisterDump::from_toml("[registers]\n\"0x1ffff\" = 1\n"),
            Err(ConfigError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_parse_address() {
        assert_eq!(parse_address("0x078C").unwrap(), 0x078c);
        assert_eq!(parse_address("0X1803").unwrap(), 0x1803);
        assert_eq!(parse_address("1856").unwrap(), 1856);
        assert!(parse_address("").is_err());
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            Settings::load(Path::new("/nonexistent/uniwill.toml")),
            Err(ConfigError::Io { .. })
        ));
    }
}
