//! Keyboard backlight state and register writers
//!
//! The backlight of single-zone boards is driven through three channel
//! registers (0x00-0xc8 each) and a status register holding the enable flag
//! and a brightness-state nibble.

use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;
use uniwill_transport::protocol::{bits, reg, timing};
use uniwill_transport::EcRam;

use crate::error::KeyboardError;

/// Maximum brightness and maximum channel value
pub const BRIGHTNESS_MAX: u8 = 0xc8;

/// Initial brightness (30%)
pub const BRIGHTNESS_DEFAULT: u8 = (BRIGHTNESS_MAX as u32 * 30 / 100) as u8;

/// Maximum 24-bit color value
pub const COLOR_MAX: u32 = 0xffffff;

/// Initial color (white)
pub const COLOR_DEFAULT: u32 = 0xffffff;

/// Brightness applied for each of the five hardware LED level keys
pub const BRIGHTNESS_LEVELS: [u8; 5] = [0x00, 0x20, 0x50, 0x80, 0xc8];

/// RGB color value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct RgbColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl RgbColor {
    /// Create a new RGB color
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Split a 0xRRGGBB value into channels
    pub fn from_u32(color: u32) -> Self {
        Self {
            r: ((color >> 16) & 0xff) as u8,
            g: ((color >> 8) & 0xff) as u8,
            b: (color & 0xff) as u8,
        }
    }

    /// Pack channels as 0xRRGGBB
    pub fn to_u32(self) -> u32 {
        (self.r as u32) << 16 | (self.g as u32) << 8 | self.b as u32
    }

    /// Black (all LEDs off)
    pub const BLACK: Self = Self { r: 0, g: 0, b: 0 };
}

impl std::fmt::Display for RgbColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Stored keyboard backlight settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BacklightState {
    pub brightness: u8,
    pub color: u32,
}

impl Default for BacklightState {
    fn default() -> Self {
        Self {
            brightness: BRIGHTNESS_DEFAULT,
            color: COLOR_DEFAULT,
        }
    }
}

impl BacklightState {
    /// Channel values to program, scaled to 0..0xc8 and then by brightness
    pub fn channels(&self) -> RgbColor {
        let percent = self.brightness as u32 * 100 / BRIGHTNESS_MAX as u32;
        let scale = |c: u8| -> u8 {
            let full = c as u32 * BRIGHTNESS_MAX as u32 / 0xff;
            (full * percent / 100).min(BRIGHTNESS_MAX as u32) as u8
        };
        let color = RgbColor::from_u32(self.color);
        RgbColor::new(scale(color.r), scale(color.g), scale(color.b))
    }
}

/// Keyboard backlight controller
pub struct KbdBacklight {
    ec: EcRam,
    state: Mutex<BacklightState>,
    reset_delay: Duration,
}

impl KbdBacklight {
    pub fn new(ec: EcRam, initial: BacklightState) -> Self {
        Self {
            ec,
            state: Mutex::new(initial),
            reset_delay: Duration::from_millis(timing::KBD_BL_RESET_DELAY_MS),
        }
    }

    /// Override the settle time after a controller reset
    pub fn with_reset_delay(mut self, delay: Duration) -> Self {
        self.reset_delay = delay;
        self
    }

    /// Snapshot of the stored settings
    pub fn state(&self) -> BacklightState {
        *self.state.lock()
    }

    pub fn brightness(&self) -> u8 {
        self.state.lock().brightness
    }

    pub fn color(&self) -> u32 {
        self.state.lock().color
    }

    /// Set brightness (0-0xc8) and program the channels
    ///
    /// Out-of-range values are rejected before anything is stored.
    pub fn set_brightness(&self, brightness: u32) -> Result<(), KeyboardError> {
        if brightness > BRIGHTNESS_MAX as u32 {
            return Err(KeyboardError::InvalidParameter(format!(
                "brightness {} exceeds maximum {}",
                brightness, BRIGHTNESS_MAX
            )));
        }
        let mut state = self.state.lock();
        state.brightness = brightness as u8;
        self.program(&state)
    }

    /// Set color (0xRRGGBB) and program the channels
    pub fn set_color(&self, color: u32) -> Result<(), KeyboardError> {
        if color > COLOR_MAX {
            return Err(KeyboardError::InvalidParameter(format!(
                "color 0x{:x} exceeds 0x{:06x}",
                color, COLOR_MAX
            )));
        }
        let mut state = self.state.lock();
        state.color = color;
        self.program(&state)
    }

    /// Apply one of the five hardware brightness levels
    pub fn set_level(&self, level: usize) -> Result<(), KeyboardError> {
        let brightness = *BRIGHTNESS_LEVELS.get(level).ok_or_else(|| {
            KeyboardError::InvalidParameter(format!("brightness level {}", level))
        })?;
        let mut state = self.state.lock();
        state.brightness = brightness;
        self.program(&state)
    }

    /// Re-program the channels from the stored settings
    pub fn write_state(&self) -> Result<(), KeyboardError> {
        let state = self.state.lock();
        self.program(&state)
    }

    fn program(&self, state: &BacklightState) -> Result<(), KeyboardError> {
        let channels = state.channels();
        debug!(
            "kbd backlight brightness {} color 0x{:06x} -> {}",
            state.brightness, state.color, channels
        );
        self.write_rgb(channels)
    }

    /// Write raw channel values, clamped to the channel maximum
    pub fn write_rgb(&self, color: RgbColor) -> Result<(), KeyboardError> {
        self.ec.write(reg::KBD_BL_RED, color.r.min(BRIGHTNESS_MAX))?;
        self.ec.write(reg::KBD_BL_GREEN, color.g.min(BRIGHTNESS_MAX))?;
        self.ec.write(reg::KBD_BL_BLUE, color.b.min(BRIGHTNESS_MAX))?;
        Ok(())
    }

    /// Read the channel values currently in the EC
    pub fn read_rgb(&self) -> Result<RgbColor, KeyboardError> {
        Ok(RgbColor::new(
            self.ec.read(reg::KBD_BL_RED)?,
            self.ec.read(reg::KBD_BL_GREEN)?,
            self.ec.read(reg::KBD_BL_BLUE)?,
        ))
    }

    /// Check if the backlight output is on
    pub fn read_enabled(&self) -> Result<bool, KeyboardError> {
        let status = self.ec.read(reg::KBD_BL_STATUS)?;
        Ok(status & bits::KBD_BL_DISABLE == 0)
    }

    /// Switch the backlight output on or off
    pub fn write_enable(&self, enable: bool) -> Result<(), KeyboardError> {
        let value = if enable { 0 } else { bits::KBD_BL_DISABLE };
        self.ec.update_bits(reg::KBD_BL_STATUS, bits::KBD_BL_DISABLE, value)?;
        Ok(())
    }

    /// Reset the backlight controller
    pub fn write_reset(&self) -> Result<(), KeyboardError> {
        self.ec.write(reg::KBD_BL_STATUS, bits::KBD_BL_RESET)?;
        Ok(())
    }

    /// Brightness state nibble reported by the EC
    pub fn read_brightness_state(&self) -> Result<u8, KeyboardError> {
        let status = self.ec.read(reg::KBD_BL_STATUS)?;
        Ok((status & bits::KBD_BL_BRIGHTNESS_STATE) >> 4)
    }

    /// Bring the backlight into its steady state
    ///
    /// Single-zone boards get a reset, a settle and the stored color first.
    /// Every board then has its output switched on.
    pub fn init_set(&self, single_zone: bool) -> Result<(), KeyboardError> {
        if single_zone {
            self.write_reset()?;
            if !self.reset_delay.is_zero() {
                std::thread::sleep(self.reset_delay);
            }
            self.write_state()?;
        }
        self.write_enable(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use uniwill_transport::{BackendRegistry, MemoryBackend, TransportError};

    fn setup() -> (KbdBacklight, Arc<MemoryBackend>) {
        let registry = Arc::new(BackendRegistry::new());
        let backend = Arc::new(MemoryBackend::new());
        registry.register(backend.clone()).unwrap();
        let ec = EcRam::new(registry).with_backoff(Duration::ZERO);
        let backlight =
            KbdBacklight::new(ec, BacklightState::default()).with_reset_delay(Duration::ZERO);
        (backlight, backend)
    }

    #[test]
    fn test_color_packing() {
        let color = RgbColor::from_u32(0x12ab34);
        assert_eq!(color, RgbColor::new(0x12, 0xab, 0x34));
        assert_eq!(color.to_u32(), 0x12ab34);
        assert_eq!(color.to_string(), "#12ab34");
    }

    #[test]
    fn test_default_brightness_is_thirty_percent() {
        assert_eq!(BRIGHTNESS_DEFAULT, 60);
    }

    #[test]
    fn test_channel_scaling() {
        let full = BacklightState {
            brightness: 0xc8,
            color: 0xffffff,
        };
        assert_eq!(full.channels(), RgbColor::new(0xc8, 0xc8, 0xc8));

        let default = BacklightState::default();
        assert_eq!(default.channels(), RgbColor::new(60, 60, 60));

        let red = BacklightState {
            brightness: 0xc8,
            color: 0xff0000,
        };
        assert_eq!(red.channels(), RgbColor::new(0xc8, 0, 0));

        let off = BacklightState {
            brightness: 0,
            color: 0xffffff,
        };
        assert_eq!(off.channels(), RgbColor::BLACK);
    }

    #[test]
    fn test_set_brightness_rejects_out_of_range() {
        let (backlight, backend) = setup();
        for value in [0xc9, 0xff, 1000] {
            assert!(matches!(
                backlight.set_brightness(value),
                Err(KeyboardError::InvalidParameter(_))
            ));
        }
        assert_eq!(backlight.brightness(), BRIGHTNESS_DEFAULT);
        assert_eq!(backend.write_count(), 0);

        backlight.set_brightness(0xc8).unwrap();
        assert_eq!(backlight.brightness(), 0xc8);
        assert_eq!(backend.register(reg::KBD_BL_RED), 0xc8);
    }

    #[test]
    fn test_set_color_rejects_out_of_range() {
        let (backlight, _backend) = setup();
        assert!(backlight.set_color(0x1000000).is_err());
        assert_eq!(backlight.color(), COLOR_DEFAULT);

        backlight.set_color(0x00ff00).unwrap();
        assert_eq!(backlight.color(), 0x00ff00);
    }

    #[test]
    fn test_set_level() {
        let (backlight, backend) = setup();
        backlight.set_level(2).unwrap();
        assert_eq!(backlight.brightness(), 0x50);
        assert_eq!(backend.register(reg::KBD_BL_BLUE), 0x50);
        assert!(backlight.set_level(5).is_err());
    }

    #[test]
    fn test_enable_bit_is_inverted() {
        let (backlight, backend) = setup();
        backend.set_register(reg::KBD_BL_STATUS, 0x32);
        assert!(!backlight.read_enabled().unwrap());

        backlight.write_enable(true).unwrap();
        assert_eq!(backend.register(reg::KBD_BL_STATUS), 0x30);
        assert!(backlight.read_enabled().unwrap());

        backlight.write_enable(false).unwrap();
        assert_eq!(backend.register(reg::KBD_BL_STATUS), 0x32);
        assert_eq!(backlight.read_brightness_state().unwrap(), 0x3);
    }

    #[test]
    fn test_init_set_sequence() {
        let (backlight, backend) = setup();
        backlight.init_set(true).unwrap();
        assert_eq!(
            backend.write_log(),
            vec![
                (reg::KBD_BL_STATUS, 0x10),
                (reg::KBD_BL_RED, 60),
                (reg::KBD_BL_GREEN, 60),
                (reg::KBD_BL_BLUE, 60),
                (reg::KBD_BL_STATUS, 0x10),
            ]
        );

    }

    #[test]
    fn test_init_set_keeps_status_on_multi_zone() {
        let (backlight, backend) = setup();
        backend.set_register(reg::KBD_BL_STATUS, 0x32);
        backlight.init_set(false).unwrap();

        // no reset and no color, only the enable bit changes
        assert_eq!(backend.write_log(), vec![(reg::KBD_BL_STATUS, 0x30)]);
        assert_eq!(backend.register(reg::KBD_BL_STATUS), 0x30);
    }

    #[test]
    fn test_failure_without_backend() {
        let ec = EcRam::new(Arc::new(BackendRegistry::new()));
        let backlight = KbdBacklight::new(ec, BacklightState::default());
        assert_eq!(
            backlight.read_enabled(),
            Err(KeyboardError::Transport(TransportError::NoActiveBackend))
        );
    }
}
