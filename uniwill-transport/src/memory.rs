//! Simulated EC backend
//!
//! `MemoryBackend` keeps a sparse register file in memory and can inject the
//! failure modes seen on real hardware: failed calls, dropped writes and
//! corrupted writes. It records every write so callers can check exactly what
//! reached the "EC". Used by the CLI simulator and throughout the tests.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::{Mutex, RwLock};
use tracing::trace;

use crate::error::TransportError;
use crate::protocol::INTERFACE_WMI;
use crate::{Backend, EventCallback};

/// Status reported for injected transport failures (EIO)
const SIMULATED_IO_STATUS: u32 = 5;

#[derive(Default)]
struct Faults {
    fail_writes: u32,
    fail_reads: u32,
    drop_writes: bool,
    corrupt_writes: bool,
    failing_addresses: HashMap<u16, u32>,
    scripted_reads: HashMap<u16, VecDeque<u8>>,
}

/// In-memory EC register file implementing [`Backend`]
pub struct MemoryBackend {
    id: String,
    registers: Mutex<BTreeMap<u16, u8>>,
    faults: Mutex<Faults>,
    write_log: Mutex<Vec<(u16, u8)>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
    callback: RwLock<Option<EventCallback>>,
}

impl MemoryBackend {
    /// Create a simulated EC registering as the WMI interface
    pub fn new() -> Self {
        Self::with_id(INTERFACE_WMI)
    }

    /// Create a simulated EC with a custom identifier
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            registers: Mutex::new(BTreeMap::new()),
            faults: Mutex::new(Faults::default()),
            write_log: Mutex::new(Vec::new()),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
            callback: RwLock::new(None),
        }
    }

    /// Create a simulated EC seeded with register contents
    pub fn with_registers(registers: impl IntoIterator<Item = (u16, u8)>) -> Self {
        let backend = Self::new();
        backend.registers.lock().extend(registers);
        backend
    }

    // === Register file ===

    /// Set a register directly (not logged, no faults)
    pub fn set_register(&self, address: u16, value: u8) {
        self.registers.lock().insert(address, value);
    }

    /// Get a register directly (unset registers read as 0)
    pub fn register(&self, address: u16) -> u8 {
        self.registers.lock().get(&address).copied().unwrap_or(0)
    }

    /// Snapshot of all registers that have been set
    pub fn registers(&self) -> BTreeMap<u16, u8> {
        self.registers.lock().clone()
    }

    // === Fault injection ===

    /// Fail the next `count` write calls
    pub fn fail_next_writes(&self, count: u32) {
        self.faults.lock().fail_writes = count;
    }

    /// Fail the next `count` read calls
    pub fn fail_next_reads(&self, count: u32) {
        self.faults.lock().fail_reads = count;
    }

    /// Fail the next `count` writes to one address
    pub fn fail_writes_to(&self, address: u16, count: u32) {
        self.faults.lock().failing_addresses.insert(address, count);
    }

    /// Report writes as successful without storing them
    pub fn set_drop_writes(&self, drop: bool) {
        self.faults.lock().drop_writes = drop;
    }

    /// Store a different value than the one written
    pub fn set_corrupt_writes(&self, corrupt: bool) {
        self.faults.lock().corrupt_writes = corrupt;
    }

    /// Queue values returned by upcoming reads of `address`, in order
    ///
    /// Once the queue runs dry, reads return the stored register again.
    pub fn queue_reads(&self, address: u16, values: &[u8]) {
        self.faults
            .lock()
            .scripted_reads
            .entry(address)
            .or_default()
            .extend(values.iter().copied());
    }

    // === Inspection ===

    /// Number of read calls received (including failed ones)
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of write calls received (including failed ones)
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// All successful writes in order
    pub fn write_log(&self) -> Vec<(u16, u8)> {
        self.write_log.lock().clone()
    }

    /// Values successfully written to one address, in order
    pub fn writes_to(&self, address: u16) -> Vec<u8> {
        self.write_log
            .lock()
            .iter()
            .filter(|(a, _)| *a == address)
            .map(|(_, v)| *v)
            .collect()
    }

    /// Forget recorded writes and reset the call counters
    pub fn clear_log(&self) {
        self.write_log.lock().clear();
        self.reads.store(0, Ordering::SeqCst);
        self.writes.store(0, Ordering::SeqCst);
    }

    // === Events ===

    /// Check if an event callback is installed
    pub fn has_event_callback(&self) -> bool {
        self.callback.read().is_some()
    }

    /// Deliver a hardware event code as the management interface would
    ///
    /// Returns false if no callback is installed.
    pub fn inject_event(&self, code: u32) -> bool {
        let callback = self.callback.read().clone();
        match callback {
            Some(callback) => {
                callback(code);
                true
            }
            None => false,
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for MemoryBackend {
    fn id(&self) -> &str {
        &self.id
    }

    fn read_ec_ram(&self, address: u16) -> Result<u8, TransportError> {
        self.reads.fetch_add(1, Ordering::SeqCst);

        let mut faults = self.faults.lock();
        if faults.fail_reads > 0 {
            faults.fail_reads -= 1;
            return Err(TransportError::TransportFailure {
                address,
                status: SIMULATED_IO_STATUS,
            });
        }
        if let Some(value) = faults
            .scripted_reads
            .get_mut(&address)
            .and_then(VecDeque::pop_front)
        {
            return Ok(value);
        }
        drop(faults);

        let value = self.register(address);
        trace!("sim read 0x{:04x} -> 0x{:02x}", address, value);
        Ok(value)
    }

    fn write_ec_ram(&self, address: u16, data: u8) -> Result<(), TransportError> {
        self.writes.fetch_add(1, Ordering::SeqCst);

        let mut faults = self.faults.lock();
        let address_failure = match faults.failing_addresses.get_mut(&address) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        };
        if address_failure || faults.fail_writes > 0 {
            if !address_failure {
                faults.fail_writes -= 1;
            }
            return Err(TransportError::TransportFailure {
                address,
                status: SIMULATED_IO_STATUS,
            });
        }
        let (drop_write, corrupt) = (faults.drop_writes, faults.corrupt_writes);
        drop(faults);

        self.write_log.lock().push((address, data));
        trace!("sim write 0x{:04x} <- 0x{:02x}", address, data);
        if !drop_write {
            let stored = if corrupt { !data } else { data };
            self.registers.lock().insert(address, stored);
        }
        Ok(())
    }

    fn set_event_callback(&self, callback: Option<EventCallback>) {
        *self.callback.write() = callback;
    }
}
