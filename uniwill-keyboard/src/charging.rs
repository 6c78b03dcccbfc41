//! Charging priority and charging profile
//!
//! Both are bit fields updated by read-modify-write so the other bits sharing
//! the register survive. Availability comes from capability bits, except on
//! boards known to report capabilities they do not implement.

use std::fmt;
use std::str::FromStr;

use uniwill_transport::protocol::{bits, reg};
use uniwill_transport::EcRam;

use crate::error::KeyboardError;

/// What the charger favours while on AC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ChargingPriority {
    ChargeBattery = 0,
    Performance = 1,
}

impl ChargingPriority {
    pub const ALL: [ChargingPriority; 2] = [Self::ChargeBattery, Self::Performance];

    pub fn from_raw(value: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|p| *p as u8 == value)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ChargeBattery => "charge_battery",
            Self::Performance => "performance",
        }
    }
}

/// Battery charge limit strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ChargingProfile {
    HighCapacity = 0,
    Balanced = 1,
    Stationary = 2,
}

impl ChargingProfile {
    pub const ALL: [ChargingProfile; 3] = [Self::HighCapacity, Self::Balanced, Self::Stationary];

    pub fn from_raw(value: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|p| *p as u8 == value)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::HighCapacity => "high_capacity",
            Self::Balanced => "balanced",
            Self::Stationary => "stationary",
        }
    }
}

macro_rules! option_names {
    ($ty:ident, $what:literal) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = KeyboardError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let s = s.trim();
                Self::ALL
                    .into_iter()
                    .find(|o| o.as_str() == s)
                    .ok_or_else(|| {
                        KeyboardError::InvalidParameter(format!(
                            concat!("unknown ", $what, ": {}"),
                            s
                        ))
                    })
            }
        }

        impl $ty {
            /// Space-separated list of accepted option names
            pub fn available() -> String {
                Self::ALL
                    .iter()
                    .map(|o| o.as_str())
                    .collect::<Vec<_>>()
                    .join(" ")
            }
        }
    };
}

option_names!(ChargingPriority, "charging priority");
option_names!(ChargingProfile, "charging profile");

/// Charging feature accessors
#[derive(Clone)]
pub struct Charging {
    ec: EcRam,
    /// Board is known to misreport its charging capability bits
    excluded: bool,
}

impl Charging {
    pub fn new(ec: EcRam, excluded: bool) -> Self {
        Self { ec, excluded }
    }

    pub fn has_priority(&self) -> Result<bool, KeyboardError> {
        if self.excluded {
            return Ok(false);
        }
        let caps = self.ec.read(reg::CHARGING_PRIORITY_CAP)?;
        Ok(caps & bits::CHARGING_PRIORITY_CAP != 0)
    }

    pub fn has_profile(&self) -> Result<bool, KeyboardError> {
        if self.excluded {
            return Ok(false);
        }
        let caps = self.ec.read(reg::CHARGING_PROFILE_CAP)?;
        Ok(caps & bits::CHARGING_PROFILE_CAP != 0)
    }

    pub fn priority(&self) -> Result<ChargingPriority, KeyboardError> {
        let raw = (self.ec.read(reg::CHARGING_PRIORITY)? & bits::CHARGING_PRIORITY)
            >> bits::CHARGING_PRIORITY_SHIFT;
        ChargingPriority::from_raw(raw).ok_or_else(|| {
            KeyboardError::UnexpectedResponse(format!("charging priority value {}", raw))
        })
    }

    pub fn set_priority(&self, priority: ChargingPriority) -> Result<(), KeyboardError> {
        self.ec.update_bits(
            reg::CHARGING_PRIORITY,
            bits::CHARGING_PRIORITY,
            (priority as u8) << bits::CHARGING_PRIORITY_SHIFT,
        )?;
        Ok(())
    }

    /// Current profile; the unused field value 3 is reported as unexpected
    pub fn profile(&self) -> Result<ChargingProfile, KeyboardError> {
        let raw = (self.ec.read(reg::CHARGING_PROFILE)? & bits::CHARGING_PROFILE)
            >> bits::CHARGING_PROFILE_SHIFT;
        ChargingProfile::from_raw(raw).ok_or_else(|| {
            KeyboardError::UnexpectedResponse(format!(
                "charging profile value {} has no name",
                raw
            ))
        })
    }

    pub fn set_profile(&self, profile: ChargingProfile) -> Result<(), KeyboardError> {
        self.ec.update_bits(
            reg::CHARGING_PROFILE,
            bits::CHARGING_PROFILE,
            (profile as u8) << bits::CHARGING_PROFILE_SHIFT,
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use uniwill_transport::{BackendRegistry, MemoryBackend};

    fn setup(excluded: bool) -> (Charging, Arc<MemoryBackend>) {
        let registry = Arc::new(BackendRegistry::new());
        let backend = Arc::new(MemoryBackend::new());
        registry.register(backend.clone()).unwrap();
        let ec = EcRam::new(registry).with_backoff(Duration::ZERO);
        (Charging::new(ec, excluded), backend)
    }

    #[test]
    fn test_option_names() {
        assert_eq!(
            "balanced".parse::<ChargingProfile>().unwrap(),
            ChargingProfile::Balanced
        );
        assert_eq!(
            " performance\n".parse::<ChargingPriority>().unwrap(),
            ChargingPriority::Performance
        );
        assert!("turbo".parse::<ChargingProfile>().is_err());
        assert_eq!(
            ChargingProfile::available(),
            "high_capacity balanced stationary"
        );
        assert_eq!(ChargingPriority::available(), "charge_battery performance");
        assert_eq!(ChargingProfile::Stationary.to_string(), "stationary");
    }

    #[test]
    fn test_priority_round_trip() {
        let (charging, backend) = setup(false);
        backend.set_register(reg::CHARGING_PRIORITY, 0x15);
        charging.set_priority(ChargingPriority::Performance).unwrap();
        assert_eq!(backend.register(reg::CHARGING_PRIORITY), 0x95);
        assert_eq!(charging.priority().unwrap(), ChargingPriority::Performance);

        charging.set_priority(ChargingPriority::ChargeBattery).unwrap();
        assert_eq!(backend.register(reg::CHARGING_PRIORITY), 0x15);
    }

    #[test]
    fn test_profile_value_three_is_unexpected() {
        let (charging, backend) = setup(false);
        backend.set_register(reg::CHARGING_PROFILE, 0x30);
        assert!(matches!(
            charging.profile(),
            Err(KeyboardError::UnexpectedResponse(_))
        ));
    }

    #[test]
    fn test_capability_bits() {
        let (charging, backend) = setup(false);
        assert!(!charging.has_priority().unwrap());
        assert!(!charging.has_profile().unwrap());

        backend.set_register(reg::CHARGING_PRIORITY_CAP, 1 << 5);
        backend.set_register(reg::CHARGING_PROFILE_CAP, 1 << 3);
        assert!(charging.has_priority().unwrap());
        assert!(charging.has_profile().unwrap());
    }

    #[test]
    fn test_excluded_board_ignores_capability_bits() {
        let (charging, backend) = setup(true);
        backend.set_register(reg::CHARGING_PRIORITY_CAP, 0xff);
        backend.set_register(reg::CHARGING_PROFILE_CAP, 0xff);
        assert!(!charging.has_priority().unwrap());
        assert!(!charging.has_profile().unwrap());
        assert_eq!(backend.read_count(), 0);
    }
}
