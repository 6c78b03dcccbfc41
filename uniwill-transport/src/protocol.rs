//! Protocol constants for Uniwill EC communication
//!
//! Register addresses are the wire contract with the embedded controller and
//! are shared by every board of the family. Event codes are the raw values the
//! management interface pushes through the backend's event callback.

/// Identifier of the WMI management interface backend
pub const INTERFACE_WMI: &str = "uniwill_wmi";

/// Transport names a backend may register under
pub const KNOWN_BACKENDS: &[&str] = &[INTERFACE_WMI];

/// Check if an identifier names a known transport
#[inline]
pub fn is_known_backend(id: &str) -> bool {
    KNOWN_BACKENDS.contains(&id)
}

/// EC RAM register addresses
pub mod reg {
    /// Backlight enable (bit1, inverted) and brightness state (bits 4-7)
    pub const KBD_BL_STATUS: u16 = 0x078c;
    /// Keyboard backlight red channel (0x00-0xc8)
    pub const KBD_BL_RED: u16 = 0x1803;
    /// Keyboard backlight green channel (0x00-0xc8)
    pub const KBD_BL_GREEN: u16 = 0x1805;
    /// Keyboard backlight blue channel (0x00-0xc8)
    pub const KBD_BL_BLUE: u16 = 0x1808;

    /// Lightbar animation enable (bit7)
    pub const LIGHTBAR_ANIMATION: u16 = 0x0748;
    /// Lightbar red channel (0x00-0x24)
    pub const LIGHTBAR_RED: u16 = 0x0749;
    /// Lightbar green channel (0x00-0x24)
    pub const LIGHTBAR_GREEN: u16 = 0x074a;
    /// Lightbar blue channel (0x00-0x24)
    pub const LIGHTBAR_BLUE: u16 = 0x074b;

    /// Charging priority (bit7)
    pub const CHARGING_PRIORITY: u16 = 0x07cc;
    /// Charging profile (bits 4-5)
    pub const CHARGING_PROFILE: u16 = 0x07a6;
    /// Charging priority capability (bit5)
    pub const CHARGING_PRIORITY_CAP: u16 = 0x0742;
    /// Charging profile capability (bit3)
    pub const CHARGING_PROFILE_CAP: u16 = 0x078e;

    /// Board model identifier
    pub const MODEL_ID: u16 = 0x0740;
    /// Manual fan-control mode enable
    pub const FAN_MANUAL_MODE: u16 = 0x0741;
    /// First byte of the manual fan curve (0x0743-0x0747)
    pub const FAN_CURVE_MANUAL: u16 = 0x0743;
    /// First byte of the factory default fan curve (0x0786-0x078a)
    pub const FAN_CURVE_DEFAULT: u16 = 0x0786;
    /// Number of bytes in a fan curve
    pub const FAN_CURVE_LEN: u16 = 5;
    /// Secondary fan temperature, zeroed for detection
    pub const FAN2_TEMP: u16 = 0x044f;
    /// Charging/power profile forced during driver start
    pub const FORCED_PROFILE: u16 = 0x0751;
}

/// Register bit layouts
pub mod bits {
    /// Backlight disable flag in `KBD_BL_STATUS` (set = off)
    pub const KBD_BL_DISABLE: u8 = 1 << 1;
    /// Brightness state nibble in `KBD_BL_STATUS`
    pub const KBD_BL_BRIGHTNESS_STATE: u8 = 0xf0;
    /// Value written to `KBD_BL_STATUS` to reset the backlight controller
    pub const KBD_BL_RESET: u8 = 0x10;

    /// Lightbar animation flag
    pub const LIGHTBAR_ANIMATION: u8 = 1 << 7;

    /// Charging priority field
    pub const CHARGING_PRIORITY: u8 = 1 << 7;
    pub const CHARGING_PRIORITY_SHIFT: u8 = 7;
    /// Charging profile field
    pub const CHARGING_PROFILE: u8 = 0x03 << 4;
    pub const CHARGING_PROFILE_SHIFT: u8 = 4;

    /// Charging priority supported
    pub const CHARGING_PRIORITY_CAP: u8 = 1 << 5;
    /// Charging profile supported
    pub const CHARGING_PROFILE_CAP: u8 = 1 << 3;
}

/// Raw event codes delivered by the management interface
pub mod event {
    pub const OSD_RADIO_ON: u32 = 0x01A;
    pub const OSD_RADIO_OFF: u32 = 0x01B;
    pub const OSD_KB_LED_LEVEL0: u32 = 0x03B;
    pub const OSD_KB_LED_LEVEL1: u32 = 0x03C;
    pub const OSD_KB_LED_LEVEL2: u32 = 0x03D;
    pub const OSD_KB_LED_LEVEL3: u32 = 0x03E;
    pub const OSD_KB_LED_LEVEL4: u32 = 0x03F;
    pub const OSD_DC_ADAPTER_CHANGE: u32 = 0x0AB;

    pub const KEY_RFKILL: u32 = 0x0A4;
    /// Performance/mode toggle key
    pub const KEY_MODE_TOGGLE: u32 = 0x0B0;
    pub const KEY_KBDILLUMDOWN: u32 = 0x0B1;
    pub const KEY_KBDILLUMUP: u32 = 0x0B2;
    pub const KEY_KBDILLUMTOGGLE: u32 = 0x0B9;

    /// Synthetic code for the touchpad toggle key combination
    pub const OSD_TOUCHPAD_WORKAROUND: u32 = 0xFFF;

    /// Get a human-readable name for an event code
    pub fn name(code: u32) -> &'static str {
        match code {
            OSD_RADIO_ON => "OSD_RADIO_ON",
            OSD_RADIO_OFF => "OSD_RADIO_OFF",
            OSD_KB_LED_LEVEL0 => "OSD_KB_LED_LEVEL0",
            OSD_KB_LED_LEVEL1 => "OSD_KB_LED_LEVEL1",
            OSD_KB_LED_LEVEL2 => "OSD_KB_LED_LEVEL2",
            OSD_KB_LED_LEVEL3 => "OSD_KB_LED_LEVEL3",
            OSD_KB_LED_LEVEL4 => "OSD_KB_LED_LEVEL4",
            OSD_DC_ADAPTER_CHANGE => "OSD_DC_ADAPTER_CHANGE",
            KEY_RFKILL => "KEY_RFKILL",
            KEY_MODE_TOGGLE => "KEY_MODE_TOGGLE",
            KEY_KBDILLUMDOWN => "KEY_KBDILLUMDOWN",
            KEY_KBDILLUMUP => "KEY_KBDILLUMUP",
            KEY_KBDILLUMTOGGLE => "KEY_KBDILLUMTOGGLE",
            OSD_TOUCHPAD_WORKAROUND => "OSD_TOUCHPAD_WORKAROUND",
            _ => "UNKNOWN",
        }
    }
}

/// Timing constants
pub mod timing {
    /// Backoff between write-verify-retry rounds
    pub const WRITE_RETRY_BACKOFF_MS: u64 = 50;
    /// Default number of write-verify-retry rounds
    pub const DEFAULT_WRITE_RETRIES: u32 = 3;
    /// Settle time after a backlight controller reset
    pub const KBD_BL_RESET_DELAY_MS: u64 = 100;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_backends() {
        assert!(is_known_backend("uniwill_wmi"));
        assert!(!is_known_backend("bogus"));
        assert!(!is_known_backend(""));
    }

    #[test]
    fn test_fan_curve_regions_do_not_overlap() {
        let manual = reg::FAN_CURVE_MANUAL..reg::FAN_CURVE_MANUAL + reg::FAN_CURVE_LEN;
        let default = reg::FAN_CURVE_DEFAULT..reg::FAN_CURVE_DEFAULT + reg::FAN_CURVE_LEN;
        assert_eq!(manual.end, 0x0748);
        assert_eq!(default.end, 0x078b);
        assert!(!manual.contains(&reg::LIGHTBAR_ANIMATION));
    }

    #[test]
    fn test_event_names() {
        assert_eq!(event::name(event::OSD_KB_LED_LEVEL2), "OSD_KB_LED_LEVEL2");
        assert_eq!(event::name(0x1234), "UNKNOWN");
    }
}
