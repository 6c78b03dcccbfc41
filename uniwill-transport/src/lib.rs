//! Transport abstraction layer for Uniwill embedded-controller access
//!
//! The EC register space of Uniwill-based notebooks is reachable through one of
//! several management-interface backends. This crate hides which one is active:
//!
//! ```text
//! [uniwill_wmi / simulated EC]      ← implements Backend (raw register I/O)
//!              |
//!      [BackendRegistry]            ← at most one active backend, swapped under a lock
//!              |
//!          [EcRam]                  ← routing, NoActiveBackend, write-verify-retry
//!              |
//!   [keyboard / lightbar / charging]
//! ```

pub mod ec_ram;
pub mod error;
pub mod memory;
pub mod printer;
pub mod protocol;
pub mod registry;

pub use ec_ram::EcRam;
pub use error::TransportError;
pub use memory::MemoryBackend;
pub use printer::{PrinterBackend, PrinterConfig, TrafficFilter};
pub use registry::{BackendRegistry, RegistryListener};

use std::sync::Arc;

/// Callback receiving raw numeric event codes from a backend
pub type EventCallback = Arc<dyn Fn(u32) + Send + Sync>;

/// The core backend trait - all transports implement this
///
/// A backend only moves single bytes to and from EC RAM. Retries, routing and
/// verification live above it in [`EcRam`].
pub trait Backend: Send + Sync {
    /// Transport name this backend registers under (e.g. `uniwill_wmi`)
    fn id(&self) -> &str;

    /// Read one byte of EC RAM
    fn read_ec_ram(&self, address: u16) -> Result<u8, TransportError>;

    /// Write one byte of EC RAM
    fn write_ec_ram(&self, address: u16, data: u8) -> Result<(), TransportError>;

    /// Install (or clear) the callback that receives hardware event codes
    ///
    /// The registry wires the driver's event classifier in here on
    /// registration and clears it again on removal.
    fn set_event_callback(&self, callback: Option<EventCallback>);
}

/// Type alias for a shared backend
pub type BoxedBackend = Arc<dyn Backend>;
