//! PrinterBackend middleware for monitoring register traffic
//!
//! Wraps any [`Backend`] and logs every read, write and pushed event passing
//! through it, decoded against the known register map.
//!
//! ```ignore
//! use uniwill_transport::{MemoryBackend, PrinterBackend, PrinterConfig};
//!
//! let monitored = PrinterBackend::wrap(Arc::new(MemoryBackend::new()), PrinterConfig::default());
//! registry.register(monitored)?;
//! ```

use std::str::FromStr;
use std::sync::Arc;

use tracing::info;

use crate::error::TransportError;
use crate::protocol::{event, reg};
use crate::{Backend, BoxedBackend, EventCallback};

/// Traffic filter for selective display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrafficFilter {
    #[default]
    All,
    Reads,
    Writes,
    Events,
    Address(u16),
}

impl FromStr for TrafficFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" | "" => Ok(Self::All),
            "reads" | "read" => Ok(Self::Reads),
            "writes" | "write" => Ok(Self::Writes),
            "events" | "event" => Ok(Self::Events),
            s if s.starts_with("addr=") || s.starts_with("0x") => {
                let hex_str = s.strip_prefix("addr=").unwrap_or(s);
                let hex_str = hex_str.strip_prefix("0x").unwrap_or(hex_str);
                u16::from_str_radix(hex_str, 16)
                    .map(Self::Address)
                    .map_err(|e| format!("Invalid register address: {}", e))
            }
            _ => Err(format!("Unknown filter: {}", s)),
        }
    }
}

/// Configuration for the PrinterBackend
#[derive(Debug, Clone, Copy, Default)]
pub struct PrinterConfig {
    pub filter: TrafficFilter,
    /// Also log failed calls
    pub show_errors: bool,
}

impl PrinterConfig {
    pub fn with_filter(mut self, filter: TrafficFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_errors(mut self, show: bool) -> Self {
        self.show_errors = show;
        self
    }
}

/// Backend middleware that logs all register traffic
pub struct PrinterBackend {
    inner: BoxedBackend,
    config: PrinterConfig,
}

impl PrinterBackend {
    /// Wrap a backend with logging middleware
    pub fn wrap(backend: BoxedBackend, config: PrinterConfig) -> BoxedBackend {
        Arc::new(Self {
            inner: backend,
            config,
        })
    }

    fn shows_address(&self, address: u16) -> bool {
        match self.config.filter {
            TrafficFilter::All => true,
            TrafficFilter::Address(a) => a == address,
            _ => false,
        }
    }

    fn print_read(&self, address: u16, result: &Result<u8, TransportError>) {
        if !(self.config.filter == TrafficFilter::Reads || self.shows_address(address)) {
            return;
        }
        match result {
            Ok(value) => info!(
                "RD  0x{:04x} {:<22} -> 0x{:02x}",
                address,
                register_name(address),
                value
            ),
            Err(e) if self.config.show_errors => {
                info!("RD  0x{:04x} {:<22} !! {}", address, register_name(address), e)
            }
            Err(_) => {}
        }
    }

    fn print_write(&self, address: u16, data: u8, result: &Result<(), TransportError>) {
        if !(self.config.filter == TrafficFilter::Writes || self.shows_address(address)) {
            return;
        }
        match result {
            Ok(()) => info!(
                "WR  0x{:04x} {:<22} <- 0x{:02x}",
                address,
                register_name(address),
                data
            ),
            Err(e) if self.config.show_errors => info!(
                "WR  0x{:04x} {:<22} <- 0x{:02x} !! {}",
                address,
                register_name(address),
                data,
                e
            ),
            Err(_) => {}
        }
    }
}

/// Name of a known EC register, for display
pub fn register_name(address: u16) -> &'static str {
    match address {
        reg::KBD_BL_STATUS => "KBD_BL_STATUS",
        reg::KBD_BL_RED => "KBD_BL_RED",
        reg::KBD_BL_GREEN => "KBD_BL_GREEN",
        reg::KBD_BL_BLUE => "KBD_BL_BLUE",
        reg::LIGHTBAR_ANIMATION => "LIGHTBAR_ANIMATION",
        reg::LIGHTBAR_RED => "LIGHTBAR_RED",
        reg::LIGHTBAR_GREEN => "LIGHTBAR_GREEN",
        reg::LIGHTBAR_BLUE => "LIGHTBAR_BLUE",
        reg::CHARGING_PRIORITY => "CHARGING_PRIORITY",
        reg::CHARGING_PROFILE => "CHARGING_PROFILE",
        reg::CHARGING_PRIORITY_CAP => "CHARGING_PRIORITY_CAP",
        reg::CHARGING_PROFILE_CAP => "CHARGING_PROFILE_CAP",
        reg::MODEL_ID => "MODEL_ID",
        reg::FAN_MANUAL_MODE => "FAN_MANUAL_MODE",
        a if (reg::FAN_CURVE_MANUAL..reg::FAN_CURVE_MANUAL + reg::FAN_CURVE_LEN).contains(&a) => {
            "FAN_CURVE_MANUAL"
        }
        a if (reg::FAN_CURVE_DEFAULT..reg::FAN_CURVE_DEFAULT + reg::FAN_CURVE_LEN)
            .contains(&a) =>
        {
            "FAN_CURVE_DEFAULT"
        }
        reg::FAN2_TEMP => "FAN2_TEMP",
        reg::FORCED_PROFILE => "FORCED_PROFILE",
        _ => "?",
    }
}

impl Backend for PrinterBackend {
    fn id(&self) -> &str {
        self.inner.id()
    }

    fn read_ec_ram(&self, address: u16) -> Result<u8, TransportError> {
        let result = self.inner.read_ec_ram(address);
        self.print_read(address, &result);
        result
    }

    fn write_ec_ram(&self, address: u16, data: u8) -> Result<(), TransportError> {
        let result = self.inner.write_ec_ram(address, data);
        self.print_write(address, data, &result);
        result
    }

    fn set_event_callback(&self, callback: Option<EventCallback>) {
        let show_events = matches!(
            self.config.filter,
            TrafficFilter::All | TrafficFilter::Events
        );
        let callback = match callback {
            Some(callback) if show_events => {
                let wrapped: EventCallback = Arc::new(move |code| {
                    info!("EVT 0x{:03x} {}", code, event::name(code));
                    callback(code);
                });
                Some(wrapped)
            }
            other => other,
        };
        self.inner.set_event_callback(callback);
    }
}
