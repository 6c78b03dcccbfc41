//! Driver lifecycle
//!
//! [`UniwillDriver`] listens on the [`BackendRegistry`]: registering a backend
//! probes the board and brings up every feature, removing it tears them down
//! again while register I/O still works. Suspend and resume are forwarded by
//! the platform.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};
use uniwill_transport::protocol::reg;
use uniwill_transport::{BackendRegistry, EcRam, EventCallback, RegistryListener};

use crate::calibration::{BootCalibration, CalibrationOutcome};
use crate::charging::{Charging, ChargingPriority, ChargingProfile};
use crate::config::DriverConfig;
use crate::error::KeyboardError;
use crate::features::DeviceFeatures;
use crate::hotkey::{HotkeyClassifier, InputSink};
use crate::led::{BacklightState, KbdBacklight};
use crate::lightbar::{Lightbar, LightbarLed};
use crate::work::WorkQueue;

/// Fan curve bytes that activate dynamic GPU boost on non-v1 boards
const DYNAMIC_BOOST: [(u16, u8); 3] = [(0x0746, 0x19), (0x0745, 0x23), (0x0743, 0x03)];

/// What a successful probe brought up
struct Probed {
    features: DeviceFeatures,
    /// Backlight enable state found at probe, restored on remove
    enable_state_on_start: Option<bool>,
    calibration: Option<Arc<BootCalibration>>,
    lightbar_loaded: bool,
}

pub struct UniwillDriver {
    config: DriverConfig,
    ec: EcRam,
    queue: Arc<WorkQueue>,
    backlight: Arc<KbdBacklight>,
    lightbar: Lightbar,
    charging: Charging,
    classifier: Arc<HotkeyClassifier>,
    probed: Mutex<Option<Probed>>,
}

impl UniwillDriver {
    /// Create the driver and attach it to `registry`
    ///
    /// Nothing touches the EC until a backend is registered.
    pub fn attach(
        registry: Arc<BackendRegistry>,
        config: DriverConfig,
        sink: Arc<dyn InputSink>,
    ) -> Result<Arc<Self>, KeyboardError> {
        let config = config.sanitized();
        let ec = EcRam::new(Arc::clone(&registry)).with_backoff(config.retry_backoff());
        let queue = Arc::new(WorkQueue::new("uniwill-work")?);

        let backlight = Arc::new(KbdBacklight::new(
            ec.clone(),
            BacklightState {
                brightness: config.brightness,
                color: config.color,
            },
        ));
        let classifier = Arc::new(HotkeyClassifier::new(
            sink,
            Arc::clone(&queue),
            config.rgb_single_zone.then(|| Arc::clone(&backlight)),
        ));

        let driver = Arc::new(Self {
            lightbar: Lightbar::new(ec.clone()),
            charging: Charging::new(ec.clone(), config.charging_unsupported),
            config,
            ec,
            queue,
            backlight,
            classifier,
            probed: Mutex::new(None),
        });

        let listener: Arc<dyn RegistryListener> = driver.clone();
        registry.set_listener(Arc::downgrade(&listener));
        Ok(driver)
    }

    /// Bring up every feature; a second call while probed does nothing
    pub fn probe(&self) -> Result<(), KeyboardError> {
        let mut probed = self.probed.lock();
        if probed.is_some() {
            debug!("already probed");
            return Ok(());
        }

        let features = DeviceFeatures::probe(&self.ec, &self.config);

        self.init_fan(&features);

        self.classifier.set_key_notifier(true);

        let enable_state_on_start = match self.backlight.read_enabled() {
            Ok(enabled) => Some(enabled),
            Err(e) => {
                warn!("could not read backlight enable state: {}", e);
                None
            }
        };

        let calibration = if self.config.rgb_single_zone {
            match BootCalibration::start(
                Arc::clone(&self.backlight),
                Arc::clone(&self.queue),
                &self.config.calibration,
            ) {
                Ok(calibration) => Some(Arc::new(calibration)),
                Err(e) => {
                    warn!("could not start boot calibration: {}", e);
                    None
                }
            }
        } else {
            None
        };
        if calibration.is_none() {
            if let Err(e) = self.backlight.write_enable(true) {
                warn!("could not enable keyboard backlight: {}", e);
            }
        }

        let lightbar_loaded = features.lightbar
            && match self.lightbar.init() {
                Ok(()) => true,
                Err(e) => {
                    warn!("lightbar init failed: {}", e);
                    false
                }
            };

        info!(
            "Probed board model 0x{:02x} (single zone: {}, lightbar: {}, charging priority: {}, charging profile: {})",
            features.model,
            features.rgb_single_zone,
            lightbar_loaded,
            features.charging_priority,
            features.charging_profile
        );

        *probed = Some(Probed {
            features,
            enable_state_on_start,
            calibration,
            lightbar_loaded,
        });
        Ok(())
    }

    /// Fan control setup; a failing register is logged and skipped
    fn init_fan(&self, features: &DeviceFeatures) {
        if let Err(e) = self.ec.write(reg::FORCED_PROFILE, 0x00) {
            warn!("could not clear forced profile: {}", e);
        }

        if features.profile_v1() {
            // seed the manual curve from the factory default
            for i in 0..reg::FAN_CURVE_LEN {
                let copied = self
                    .ec
                    .read(reg::FAN_CURVE_DEFAULT + i)
                    .and_then(|value| self.ec.write(reg::FAN_CURVE_MANUAL + i, value));
                if let Err(e) = copied {
                    warn!("could not copy fan curve byte {}: {}", i, e);
                }
            }
        } else {
            for (address, value) in DYNAMIC_BOOST {
                if let Err(e) = self.ec.write(address, value) {
                    warn!("could not write dynamic boost 0x{:04x}: {}", address, e);
                }
            }
        }

        if let Err(e) = self
            .ec
            .write_verified(reg::FAN_MANUAL_MODE, 0x01, self.config.write_retries)
        {
            warn!("could not enter manual fan mode: {}", e);
        }

        // zero second fan temp for detection
        if let Err(e) = self.ec.write(reg::FAN2_TEMP, 0x00) {
            warn!("could not clear second fan temp: {}", e);
        }
    }

    /// Tear down everything probe brought up
    ///
    /// Pending deferred work is cancelled before the final register writes.
    /// Must not be called from a job on the driver's work queue.
    pub fn remove(&self) {
        let Some(probed) = self.probed.lock().take() else {
            return;
        };

        self.classifier.set_key_notifier(false);
        if let Some(calibration) = &probed.calibration {
            calibration.cancel();
        }
        self.queue.cancel_pending();
        self.queue.flush();

        if let Some(enabled) = probed.enable_state_on_start {
            if let Err(e) = self.backlight.write_enable(enabled) {
                warn!("could not restore backlight enable state: {}", e);
            }
        }

        if probed.lightbar_loaded {
            debug!("lightbar unloaded");
        }

        if let Err(e) = self.ec.write(reg::FAN_MANUAL_MODE, 0x00) {
            warn!("could not leave manual fan mode: {}", e);
        }
        info!("Removed driver state");
    }

    /// Switch the backlight off for sleep
    pub fn suspend(&self) -> Result<(), KeyboardError> {
        self.backlight.write_enable(false)
    }

    /// Restore the backlight after sleep
    pub fn resume(&self) -> Result<(), KeyboardError> {
        self.backlight.init_set(self.config.rgb_single_zone)
    }

    // === Accessors ===

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn ec(&self) -> &EcRam {
        &self.ec
    }

    pub fn is_probed(&self) -> bool {
        self.probed.lock().is_some()
    }

    pub fn features(&self) -> Option<DeviceFeatures> {
        self.probed.lock().as_ref().map(|p| p.features)
    }

    pub fn classifier(&self) -> &Arc<HotkeyClassifier> {
        &self.classifier
    }

    /// Feed a key edge from the keyboard
    pub fn key_event(&self, code: u16, down: bool) {
        self.classifier.handle_key(code, down);
    }

    /// Block until queued deferred work has run
    pub fn flush(&self) {
        self.queue.flush();
    }

    /// Calibration outcome, if calibration ran and ended
    pub fn calibration_outcome(&self) -> Option<CalibrationOutcome> {
        self.calibration().and_then(|c| c.outcome())
    }

    /// Block until calibration ends; None if none is running or the wait timed out
    pub fn wait_for_calibration(&self, timeout: Duration) -> Option<CalibrationOutcome> {
        self.calibration().and_then(|c| c.wait(timeout))
    }

    fn calibration(&self) -> Option<Arc<BootCalibration>> {
        self.probed
            .lock()
            .as_ref()
            .and_then(|p| p.calibration.clone())
    }

    // === Keyboard backlight ===

    fn single_zone(&self) -> Result<&KbdBacklight, KeyboardError> {
        if self.config.rgb_single_zone {
            Ok(&self.backlight)
        } else {
            Err(KeyboardError::NotSupported("keyboard color control".to_string()))
        }
    }

    pub fn brightness(&self) -> Result<u8, KeyboardError> {
        Ok(self.single_zone()?.brightness())
    }

    pub fn set_brightness(&self, brightness: u32) -> Result<(), KeyboardError> {
        self.single_zone()?.set_brightness(brightness)
    }

    pub fn color(&self) -> Result<u32, KeyboardError> {
        Ok(self.single_zone()?.color())
    }

    pub fn set_color(&self, color: u32) -> Result<(), KeyboardError> {
        self.single_zone()?.set_color(color)
    }

    pub fn backlight_enabled(&self) -> Result<bool, KeyboardError> {
        self.backlight.read_enabled()
    }

    // === Lightbar ===

    fn loaded_lightbar(&self) -> Result<&Lightbar, KeyboardError> {
        let loaded = self
            .probed
            .lock()
            .as_ref()
            .is_some_and(|p| p.lightbar_loaded);
        if loaded {
            Ok(&self.lightbar)
        } else {
            Err(KeyboardError::NotSupported("lightbar".to_string()))
        }
    }

    pub fn lightbar_brightness(&self, led: LightbarLed) -> Result<u8, KeyboardError> {
        self.loaded_lightbar()?.brightness(led)
    }

    pub fn set_lightbar_brightness(
        &self,
        led: LightbarLed,
        brightness: u8,
    ) -> Result<(), KeyboardError> {
        self.loaded_lightbar()?.set_brightness(led, brightness)
    }

    // === Charging ===

    fn charging_feature(&self, priority: bool) -> Result<&Charging, KeyboardError> {
        let available = self.features().is_some_and(|f| {
            if priority {
                f.charging_priority
            } else {
                f.charging_profile
            }
        });
        if available {
            Ok(&self.charging)
        } else if priority {
            Err(KeyboardError::NotSupported("charging priority".to_string()))
        } else {
            Err(KeyboardError::NotSupported("charging profile".to_string()))
        }
    }

    pub fn charging_priority(&self) -> Result<ChargingPriority, KeyboardError> {
        self.charging_feature(true)?.priority()
    }

    pub fn set_charging_priority(&self, priority: ChargingPriority) -> Result<(), KeyboardError> {
        self.charging_feature(true)?.set_priority(priority)
    }

    pub fn charging_profile(&self) -> Result<ChargingProfile, KeyboardError> {
        self.charging_feature(false)?.profile()
    }

    pub fn set_charging_profile(&self, profile: ChargingProfile) -> Result<(), KeyboardError> {
        self.charging_feature(false)?.set_profile(profile)
    }
}

impl RegistryListener for UniwillDriver {
    fn event_callback(&self) -> EventCallback {
        let classifier = Arc::clone(&self.classifier);
        Arc::new(move |code| classifier.handle_event(code))
    }

    fn backend_added(&self) {
        if let Err(e) = self.probe() {
            warn!("driver probe failed: {}", e);
        }
    }

    fn backend_removing(&self) {
        self.remove();
    }
}
