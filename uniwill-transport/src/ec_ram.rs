//! Register access layer
//!
//! Routes single-byte EC RAM reads and writes to whatever backend is active in
//! the [`BackendRegistry`]. Every call takes a fresh snapshot of the slot, so
//! nothing is cached across calls.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error};

use crate::error::TransportError;
use crate::protocol::timing;
use crate::registry::BackendRegistry;

/// Handle for EC register I/O through the active backend
#[derive(Clone)]
pub struct EcRam {
    registry: Arc<BackendRegistry>,
    retry_backoff: Duration,
}

impl EcRam {
    /// Create a register access handle with the standard retry backoff
    pub fn new(registry: Arc<BackendRegistry>) -> Self {
        Self {
            registry,
            retry_backoff: Duration::from_millis(timing::WRITE_RETRY_BACKOFF_MS),
        }
    }

    /// Override the pause between write-verify rounds
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// The registry this handle routes through
    pub fn registry(&self) -> &Arc<BackendRegistry> {
        &self.registry
    }

    /// Read one byte of EC RAM
    pub fn read(&self, address: u16) -> Result<u8, TransportError> {
        match self.registry.active() {
            Some(backend) => backend.read_ec_ram(address),
            None => {
                error!("no active interface while read addr 0x{:04x}", address);
                Err(TransportError::NoActiveBackend)
            }
        }
    }

    /// Write one byte of EC RAM without verification
    pub fn write(&self, address: u16, data: u8) -> Result<(), TransportError> {
        match self.registry.active() {
            Some(backend) => backend.write_ec_ram(address, data),
            None => {
                error!(
                    "no active interface while write addr 0x{:04x} data 0x{:02x}",
                    address, data
                );
                Err(TransportError::NoActiveBackend)
            }
        }
    }

    /// Write a byte and read it back, retrying up to `max_retries` rounds
    ///
    /// A failed write or a failed/mismatching read-back pauses for the
    /// backoff and starts the next round. At least one round always runs.
    /// Returns the last failure once the rounds are used up.
    ///
    /// Blocks for up to `max_retries * backoff`; keep it off the event
    /// delivery path.
    pub fn write_verified(
        &self,
        address: u16,
        data: u8,
        max_retries: u32,
    ) -> Result<(), TransportError> {
        let rounds = max_retries.max(1);
        let mut last_err = TransportError::NoActiveBackend;

        for attempt in 0..rounds {
            if attempt > 0 && !self.retry_backoff.is_zero() {
                std::thread::sleep(self.retry_backoff);
            }

            if let Err(e) = self.write(address, data) {
                if e == TransportError::NoActiveBackend {
                    return Err(e);
                }
                debug!("Write attempt {} failed for 0x{:04x}: {}", attempt, address, e);
                last_err = e;
                continue;
            }

            match self.read(address) {
                Ok(actual) if actual == data => return Ok(()),
                Ok(actual) => {
                    debug!(
                        "Read-back mismatch at 0x{:04x}: wrote 0x{:02x}, read 0x{:02x}",
                        address, data, actual
                    );
                    last_err = TransportError::VerificationMismatch {
                        address,
                        expected: data,
                        actual,
                    };
                }
                Err(e) => {
                    debug!("Read-back attempt {} failed for 0x{:04x}: {}", attempt, address, e);
                    last_err = e;
                }
            }
        }

        Err(last_err)
    }

    /// Read-modify-write the bits selected by `mask`, leaving the rest intact
    ///
    /// `value` is already shifted into position.
    pub fn update_bits(&self, address: u16, mask: u8, value: u8) -> Result<(), TransportError> {
        let current = self.read(address)?;
        let updated = (current & !mask) | (value & mask);
        self.write(address, updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Backend, MemoryBackend};

    fn setup() -> (EcRam, Arc<MemoryBackend>) {
        let registry = Arc::new(BackendRegistry::new());
        let backend = Arc::new(MemoryBackend::new());
        registry.register(backend.clone()).unwrap();
        (EcRam::new(registry).with_backoff(Duration::ZERO), backend)
    }

    #[test]
    fn test_read_write_routed_to_backend() {
        let (ec, backend) = setup();
        backend.set_register(0x0740, 0x12);
        assert_eq!(ec.read(0x0740), Ok(0x12));
        ec.write(0x0741, 0x01).unwrap();
        assert_eq!(backend.register(0x0741), 0x01);
    }

    #[test]
    fn test_no_backend_means_no_backend_calls() {
        let registry = Arc::new(BackendRegistry::new());
        let ec = EcRam::new(Arc::clone(&registry)).with_backoff(Duration::ZERO);
        let backend = Arc::new(MemoryBackend::new());

        assert_eq!(ec.read(0x0740), Err(TransportError::NoActiveBackend));
        assert_eq!(ec.write(0x0741, 1), Err(TransportError::NoActiveBackend));
        assert_eq!(
            ec.write_verified(0x0741, 1, 3),
            Err(TransportError::NoActiveBackend)
        );
        assert_eq!(
            ec.update_bits(0x07cc, 0x80, 0x80),
            Err(TransportError::NoActiveBackend)
        );
        assert_eq!(backend.read_count(), 0);
        assert_eq!(backend.write_count(), 0);
    }

    #[test]
    fn test_write_verified_recovers_after_two_failures() {
        let (ec, backend) = setup();
        backend.fail_next_writes(2);
        assert_eq!(ec.write_verified(0x0741, 0x01, 3), Ok(()));
        assert_eq!(backend.write_count(), 3);
        assert_eq!(backend.register(0x0741), 0x01);
    }

    #[test]
    fn test_write_verified_exhausts_on_corruption() {
        let (ec, backend) = setup();
        backend.set_corrupt_writes(true);
        assert_eq!(
            ec.write_verified(0x0741, 0x01, 3),
            Err(TransportError::VerificationMismatch {
                address: 0x0741,
                expected: 0x01,
                actual: 0xfe,
            })
        );
        assert_eq!(backend.write_count(), 3);
        assert_eq!(backend.read_count(), 3);
    }

    #[test]
    fn test_write_verified_dropped_writes() {
        let (ec, backend) = setup();
        backend.set_register(0x0741, 0x00);
        backend.set_drop_writes(true);
        assert!(ec.write_verified(0x0741, 0x01, 3).is_err());
        assert_eq!(backend.write_count(), 3);
    }

    #[test]
    fn test_write_verified_returns_last_error() {
        let (ec, backend) = setup();
        backend.fail_next_writes(10);
        assert_eq!(
            ec.write_verified(0x0741, 0x01, 2),
            Err(TransportError::TransportFailure {
                address: 0x0741,
                status: 5,
            })
        );
        assert_eq!(backend.write_count(), 2);
    }

    #[test]
    fn test_write_verified_read_failure_retries() {
        let (ec, backend) = setup();
        backend.fail_next_reads(1);
        assert_eq!(ec.write_verified(0x0741, 0x01, 3), Ok(()));
        assert_eq!(backend.write_count(), 2);
    }

    #[test]
    fn test_write_verified_zero_retries_runs_once() {
        let (ec, backend) = setup();
        assert_eq!(ec.write_verified(0x0741, 0x01, 0), Ok(()));
        assert_eq!(backend.write_count(), 1);
    }

    #[test]
    fn test_update_bits_preserves_others() {
        let (ec, backend) = setup();
        backend.set_register(0x07a6, 0b1100_0101);
        ec.update_bits(0x07a6, 0x30, 0x20).unwrap();
        assert_eq!(backend.register(0x07a6), 0b1110_0101);
        assert_eq!(backend.id(), "uniwill_wmi");
    }
}
