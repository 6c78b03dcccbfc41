//! Integration tests from DMI identity to a probed driver.
//!
//! These exercise the boundary between board classification, the settings
//! file layering and the driver core running on the simulated EC.

use std::sync::Arc;
use std::time::Duration;

use uniwill_driver::{DmiIdentity, RegisterDump, Settings};
use uniwill_keyboard::{
    CalibrationOutcome, ChargingProfile, KeyboardError, RecordingSink, UniwillDriver,
};
use uniwill_transport::protocol::reg;
use uniwill_transport::{BackendRegistry, MemoryBackend};

const FAST: &str = r#"
[driver]
retry_backoff_ms = 0

[driver.calibration]
interval_ms = 1
"#;

fn boot(settings: &Settings, identity: &DmiIdentity, registers: Vec<(u16, u8)>) -> Booted {
    let registry = Arc::new(BackendRegistry::new());
    let driver = UniwillDriver::attach(
        Arc::clone(&registry),
        settings.driver_config(identity),
        Arc::new(RecordingSink::new()),
    )
    .unwrap();
    let ec = Arc::new(MemoryBackend::with_registers(registers));
    registry.register(ec.clone()).unwrap();
    Booted { driver, ec }
}

struct Booted {
    driver: Arc<UniwillDriver>,
    ec: Arc<MemoryBackend>,
}

#[test]
fn excluded_board_never_probes_charging() {
    let settings = Settings::from_toml(FAST).unwrap();
    let identity = DmiIdentity::new("", "A60 MUV", "");
    // capability bits set, but the board is on the exclusion list
    let booted = boot(
        &settings,
        &identity,
        vec![(reg::CHARGING_PRIORITY_CAP, 0xff), (reg::CHARGING_PROFILE_CAP, 0xff)],
    );

    let features = booted.driver.features().unwrap();
    assert!(!features.charging_priority);
    assert!(!features.charging_profile);
    assert!(features.lightbar);
    assert!(matches!(
        booted.driver.charging_profile(),
        Err(KeyboardError::NotSupported(_))
    ));
}

#[test]
fn capable_board_exposes_charging() {
    let settings = Settings::from_toml(FAST).unwrap();
    let identity = DmiIdentity::new("PULSE1501", "", "");
    let booted = boot(
        &settings,
        &identity,
        vec![(reg::CHARGING_PROFILE_CAP, 0x08), (reg::CHARGING_PROFILE, 0xc0)],
    );

    booted
        .driver
        .set_charging_profile(ChargingProfile::Stationary)
        .unwrap();
    assert_eq!(
        booted.driver.charging_profile().unwrap(),
        ChargingProfile::Stationary
    );
    assert_eq!(booted.ec.register(reg::CHARGING_PROFILE), 0xe0);
}

#[test]
fn polaris_board_calibrates_from_dump() {
    let settings = Settings::from_toml(FAST).unwrap();
    let identity = DmiIdentity::new("POLARIS1501A2060", "", "");
    let registers = RegisterDump::from_toml(
        r#"
        [registers]
        "0x1803" = 0x40
        "0x1805" = 0x40
        "0x1808" = 0x40
        "0x0786" = 0x11
        "#,
    )
    .unwrap();
    let booted = boot(&settings, &identity, registers);

    // the channels never change, so the first full window is quiescent
    assert_eq!(
        booted.driver.wait_for_calibration(Duration::from_secs(5)),
        Some(CalibrationOutcome::Applied)
    );
    assert!(booted.driver.backlight_enabled().unwrap());
    // three-profile boards seed the manual fan curve
    assert_eq!(booted.ec.register(reg::FAN_CURVE_MANUAL), 0x11);
}

#[test]
fn settings_can_disable_classified_features() {
    let settings = Settings::from_toml(
        r#"
        [driver]
        rgb_single_zone = false
        retry_backoff_ms = 0
        "#,
    )
    .unwrap();
    let identity = DmiIdentity::new("POLARIS1501A2060", "", "");
    let booted = boot(&settings, &identity, Vec::new());

    assert!(booted.driver.wait_for_calibration(Duration::ZERO).is_none());
    assert!(matches!(
        booted.driver.brightness(),
        Err(KeyboardError::NotSupported(_))
    ));
}
