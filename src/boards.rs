// Board classification tables
// Which board has which feature, keyed on DMI strings. Extend the tables when a
// new board shows up; nothing else needs to change.

use uniwill_keyboard::{DriverConfig, FanProfileScheme};

use crate::dmi::DmiIdentity;

/// One DMI string to compare against, matched exactly
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmiMatch {
    BoardName(&'static str),
    ProductName(&'static str),
    ProductSku(&'static str),
}

impl DmiMatch {
    pub fn matches(&self, identity: &DmiIdentity) -> bool {
        match self {
            Self::BoardName(name) => identity.board_name == *name,
            Self::ProductName(name) => identity.product_name == *name,
            Self::ProductSku(sku) => identity.product_sku == *sku,
        }
    }
}

use DmiMatch::{BoardName, ProductName, ProductSku};

/// Keyboard backlight is a single RGB zone
pub const RGB_SINGLE_ZONE: &[DmiMatch] = &[
    BoardName("POLARIS1501A1650TI"),
    BoardName("POLARIS1501A2060"),
    BoardName("POLARIS1501I1650TI"),
    BoardName("POLARIS1501I2060"),
    BoardName("POLARIS1701A1650TI"),
    BoardName("POLARIS1701A2060"),
    BoardName("POLARIS1701I1650TI"),
    BoardName("POLARIS1701I2060"),
    BoardName("GMxNGxx"),
    ProductSku("POLARIS1XA02"),
    ProductSku("POLARIS1XI02"),
    ProductSku("POLARIS1XA03"),
    ProductSku("POLARIS1XI03"),
];

/// Status lightbar present
pub const LIGHTBAR: &[DmiMatch] = &[
    BoardName("LAPQC71A"),
    BoardName("LAPQC71B"),
    BoardName("TRINITY1501I"),
    BoardName("TRINITY1701I"),
    ProductName("A60 MUV"),
    ProductSku("STELLARIS1XI03"),
    ProductSku("STELLARIS1XA03"),
    ProductSku("STELLARIS1XI04"),
    ProductSku("STEPOL1XA04"),
];

pub const FAN_V1_TWO_PROFILES: &[DmiMatch] = &[
    BoardName("PF5PU1G"),
    BoardName("PULSE1401"),
    BoardName("PULSE1501"),
];

pub const FAN_V1_THREE_PROFILES: &[DmiMatch] = &[
    BoardName("POLARIS1501A1650TI"),
    BoardName("POLARIS1501A2060"),
    BoardName("POLARIS1501I1650TI"),
    BoardName("POLARIS1501I2060"),
    BoardName("POLARIS1701A1650TI"),
    BoardName("POLARIS1701A2060"),
    BoardName("POLARIS1701I1650TI"),
    BoardName("POLARIS1701I2060"),
];

/// Profile mostly drives the power profile LEDs
pub const FAN_V1_THREE_PROFILES_LEDS_ONLY: &[DmiMatch] = &[
    ProductSku("POLARIS1XA02"),
    ProductSku("POLARIS1XI02"),
    ProductSku("POLARIS1XA03"),
    ProductSku("POLARIS1XI03"),
    ProductSku("STELLARIS1XI03"),
    ProductSku("STELLARIS1XA03"),
    ProductSku("STELLARIS1XI04"),
    ProductSku("STEPOL1XA04"),
];

/// Boards that set the charging capability bits without implementing them
pub const CHARGING_UNSUPPORTED: &[DmiMatch] = &[
    BoardName("PF5PU1G"),
    BoardName("LAPQC71A"),
    BoardName("LAPQC71B"),
    ProductName("A60 MUV"),
];

/// True if any entry of `table` matches
pub fn matches_any(table: &[DmiMatch], identity: &DmiIdentity) -> bool {
    table.iter().any(|m| m.matches(identity))
}

/// Feature flags resolved for one machine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BoardFeatures {
    pub rgb_single_zone: bool,
    pub lightbar: bool,
    pub fan_profile: FanProfileScheme,
    pub charging_unsupported: bool,
}

impl BoardFeatures {
    pub fn classify(identity: &DmiIdentity) -> Self {
        // a board can sit in more than one fan table; the first hit wins
        let fan_profile = if matches_any(FAN_V1_TWO_PROFILES, identity) {
            FanProfileScheme::V1TwoProfiles
        } else if matches_any(FAN_V1_THREE_PROFILES, identity) {
            FanProfileScheme::V1ThreeProfiles
        } else if matches_any(FAN_V1_THREE_PROFILES_LEDS_ONLY, identity) {
            FanProfileScheme::V1ThreeProfilesLedsOnly
        } else {
            FanProfileScheme::None
        };

        Self {
            rgb_single_zone: matches_any(RGB_SINGLE_ZONE, identity),
            lightbar: matches_any(LIGHTBAR, identity),
            fan_profile,
            charging_unsupported: matches_any(CHARGING_UNSUPPORTED, identity),
        }
    }

    /// Copy the flags into a driver configuration
    pub fn apply(&self, config: &mut DriverConfig) {
        config.rgb_single_zone = self.rgb_single_zone;
        config.lightbar = self.lightbar;
        config.fan_profile = self.fan_profile;
        config.charging_unsupported = self.charging_unsupported;
    }
}
