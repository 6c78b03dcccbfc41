//! Driver configuration
//!
//! Everything the core needs to know about the board is injected here before
//! the first backend is registered. Every field has a default, so a TOML file
//! only has to name what differs.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;
use uniwill_transport::protocol::timing;

use crate::led::{BRIGHTNESS_DEFAULT, BRIGHTNESS_MAX, COLOR_DEFAULT, COLOR_MAX};

/// Fan profile register layout used by the board
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FanProfileScheme {
    #[default]
    None,
    V1TwoProfiles,
    V1ThreeProfiles,
    V1ThreeProfilesLedsOnly,
}

/// Boot calibration tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Time between samples
    pub interval_ms: u64,
    /// Samples taken before giving up
    pub attempts: u32,
    /// Consecutive equal samples that count as quiescent
    pub window: usize,
}

impl CalibrationConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            interval_ms: 500,
            attempts: 40,
            window: 3,
        }
    }
}

/// Board features and initial state for one driver instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Initial keyboard brightness (0-0xc8)
    pub brightness: u8,
    /// Initial keyboard color (0xRRGGBB)
    pub color: u32,
    /// Keyboard backlight is one RGB zone
    pub rgb_single_zone: bool,
    /// Board has a status lightbar
    pub lightbar: bool,
    pub fan_profile: FanProfileScheme,
    /// Board reports charging capability bits it does not implement
    pub charging_unsupported: bool,
    pub calibration: CalibrationConfig,
    /// Rounds for verified writes
    pub write_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            brightness: BRIGHTNESS_DEFAULT,
            color: COLOR_DEFAULT,
            rgb_single_zone: false,
            lightbar: false,
            fan_profile: FanProfileScheme::None,
            charging_unsupported: false,
            calibration: CalibrationConfig::default(),
            write_retries: timing::DEFAULT_WRITE_RETRIES,
            retry_backoff_ms: timing::WRITE_RETRY_BACKOFF_MS,
        }
    }
}

impl DriverConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// Replace out-of-range initial values with their defaults
    pub fn sanitized(mut self) -> Self {
        if self.brightness > BRIGHTNESS_MAX {
            warn!(
                "initial brightness {} out of range, using {}",
                self.brightness, BRIGHTNESS_DEFAULT
            );
            self.brightness = BRIGHTNESS_DEFAULT;
        }
        if self.color > COLOR_MAX {
            warn!(
                "initial color 0x{:x} out of range, using 0x{:06x}",
                self.color, COLOR_DEFAULT
            );
            self.color = COLOR_DEFAULT;
        }
        if self.calibration.window < 2 {
            warn!("calibration window {} too small, using 2", self.calibration.window);
            self.calibration.window = 2;
        }
        self
    }
}
