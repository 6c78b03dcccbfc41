//! Status lightbar
//!
//! Three channel registers (0x00-0x24) plus an animation flag. Exposed as four
//! LEDs the way the platform presents them: one per color channel and an
//! on/off animation LED.

use std::fmt;
use std::str::FromStr;

use tracing::debug;
use uniwill_transport::protocol::{bits, reg};
use uniwill_transport::EcRam;

use crate::error::KeyboardError;
use crate::led::RgbColor;

/// Maximum lightbar channel value
pub const LIGHTBAR_MAX: u8 = 0x24;

/// One lightbar LED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightbarLed {
    Red,
    Green,
    Blue,
    Animation,
}

impl LightbarLed {
    pub const ALL: [LightbarLed; 4] = [Self::Red, Self::Green, Self::Blue, Self::Animation];

    /// LED device name
    pub fn name(self) -> &'static str {
        match self {
            Self::Red => "lightbar_rgb:1:status",
            Self::Green => "lightbar_rgb:2:status",
            Self::Blue => "lightbar_rgb:3:status",
            Self::Animation => "lightbar_animation::status",
        }
    }

    pub fn max_brightness(self) -> u8 {
        match self {
            Self::Animation => 1,
            _ => LIGHTBAR_MAX,
        }
    }
}

impl fmt::Display for LightbarLed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LightbarLed {
    type Err = KeyboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "red" | "lightbar_rgb:1:status" => Ok(Self::Red),
            "green" | "lightbar_rgb:2:status" => Ok(Self::Green),
            "blue" | "lightbar_rgb:3:status" => Ok(Self::Blue),
            "animation" | "lightbar_animation::status" => Ok(Self::Animation),
            _ => Err(KeyboardError::InvalidParameter(format!(
                "unknown lightbar LED: {}",
                s
            ))),
        }
    }
}

/// Lightbar controller
#[derive(Clone)]
pub struct Lightbar {
    ec: EcRam,
}

impl Lightbar {
    pub fn new(ec: EcRam) -> Self {
        Self { ec }
    }

    /// Write channel values; a value above [`LIGHTBAR_MAX`] leaves that channel untouched
    pub fn write_rgb(&self, color: RgbColor) -> Result<(), KeyboardError> {
        for (address, value) in [
            (reg::LIGHTBAR_RED, color.r),
            (reg::LIGHTBAR_GREEN, color.g),
            (reg::LIGHTBAR_BLUE, color.b),
        ] {
            if value <= LIGHTBAR_MAX {
                self.ec.write(address, value)?;
            }
        }
        Ok(())
    }

    pub fn read_rgb(&self) -> Result<RgbColor, KeyboardError> {
        Ok(RgbColor::new(
            self.ec.read(reg::LIGHTBAR_RED)?,
            self.ec.read(reg::LIGHTBAR_GREEN)?,
            self.ec.read(reg::LIGHTBAR_BLUE)?,
        ))
    }

    pub fn write_animation(&self, on: bool) -> Result<(), KeyboardError> {
        let value = if on { bits::LIGHTBAR_ANIMATION } else { 0 };
        self.ec
            .update_bits(reg::LIGHTBAR_ANIMATION, bits::LIGHTBAR_ANIMATION, value)?;
        Ok(())
    }

    pub fn read_animation(&self) -> Result<bool, KeyboardError> {
        Ok(self.ec.read(reg::LIGHTBAR_ANIMATION)? & bits::LIGHTBAR_ANIMATION != 0)
    }

    /// Set one LED's brightness
    ///
    /// Setting a color channel also stops the animation. The animation LED
    /// is on only for brightness 1.
    pub fn set_brightness(&self, led: LightbarLed, brightness: u8) -> Result<(), KeyboardError> {
        debug!("{} <- {}", led, brightness);
        // 0xff is above the channel maximum, so the other channels are skipped
        let mut color = RgbColor::new(0xff, 0xff, 0xff);
        match led {
            LightbarLed::Red => color.r = brightness,
            LightbarLed::Green => color.g = brightness,
            LightbarLed::Blue => color.b = brightness,
            LightbarLed::Animation => return self.write_animation(brightness == 1),
        }
        self.write_rgb(color)?;
        self.write_animation(false)
    }

    /// Get one LED's brightness
    pub fn brightness(&self, led: LightbarLed) -> Result<u8, KeyboardError> {
        match led {
            LightbarLed::Red => Ok(self.ec.read(reg::LIGHTBAR_RED)?),
            LightbarLed::Green => Ok(self.ec.read(reg::LIGHTBAR_GREEN)?),
            LightbarLed::Blue => Ok(self.ec.read(reg::LIGHTBAR_BLUE)?),
            LightbarLed::Animation => Ok(self.read_animation()? as u8),
        }
    }

    /// Stop the animation and turn all channels off
    pub fn init(&self) -> Result<(), KeyboardError> {
        self.write_animation(false)?;
        self.write_rgb(RgbColor::BLACK)
    }
}
