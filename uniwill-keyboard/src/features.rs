//! Device feature detection

use tracing::debug;
use uniwill_transport::protocol::reg;
use uniwill_transport::EcRam;

use crate::charging::Charging;
use crate::config::{DriverConfig, FanProfileScheme};

/// Features of the running board
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceFeatures {
    /// Model byte, 0 when unreadable
    pub model: u8,
    pub profile_v1_two_profiles: bool,
    pub profile_v1_three_profiles: bool,
    pub profile_v1_three_profiles_leds_only: bool,
    pub rgb_single_zone: bool,
    pub lightbar: bool,
    pub charging_priority: bool,
    pub charging_profile: bool,
}

impl DeviceFeatures {
    /// Combine the configured board flags with what the EC reports
    pub fn probe(ec: &EcRam, config: &DriverConfig) -> Self {
        let model = ec.read(reg::MODEL_ID).unwrap_or(0);

        let charging = Charging::new(ec.clone(), config.charging_unsupported);
        let charging_priority = charging.has_priority().unwrap_or(false);
        let charging_profile = charging.has_profile().unwrap_or(false);

        let features = Self {
            model,
            profile_v1_two_profiles: config.fan_profile == FanProfileScheme::V1TwoProfiles,
            profile_v1_three_profiles: config.fan_profile == FanProfileScheme::V1ThreeProfiles,
            profile_v1_three_profiles_leds_only: config.fan_profile
                == FanProfileScheme::V1ThreeProfilesLedsOnly,
            rgb_single_zone: config.rgb_single_zone,
            lightbar: config.lightbar,
            charging_priority,
            charging_profile,
        };
        debug!("device features: {:?}", features);
        features
    }

    /// Board uses the first-generation profile registers
    pub fn profile_v1(&self) -> bool {
        self.profile_v1_two_profiles || self.profile_v1_three_profiles
    }
}
