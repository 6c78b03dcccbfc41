//! Keyboard backlight, lightbar, hotkey and charging control for Uniwill boards
//!
//! Everything here talks to the EC through [`uniwill_transport::EcRam`], so it
//! works the same on whichever backend is registered.

pub mod calibration;
pub mod charging;
pub mod config;
pub mod driver;
pub mod error;
pub mod features;
pub mod hotkey;
pub mod led;
pub mod lightbar;
pub mod work;

pub use calibration::{BootCalibration, CalibrationDetector, CalibrationOutcome, CalibrationState};
pub use charging::{Charging, ChargingPriority, ChargingProfile};
pub use config::{CalibrationConfig, DriverConfig, FanProfileScheme};
pub use driver::UniwillDriver;
pub use error::KeyboardError;
pub use features::DeviceFeatures;
pub use hotkey::{HotkeyClassifier, InputEvent, InputSink, Key, KeyHistory, RecordingSink};
pub use led::{BacklightState, KbdBacklight, RgbColor};
pub use lightbar::{Lightbar, LightbarLed};
pub use work::WorkQueue;
