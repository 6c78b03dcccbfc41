//! Backend registry - the single active transport slot
//!
//! Holds at most one active backend. Registration and removal are serialized
//! under one modification lock; register I/O only takes a read lock on the
//! slot and clones the `Arc`, so a read racing a removal sees either the old
//! backend or none, never a partial one.

use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::error::TransportError;
use crate::protocol;
use crate::{BoxedBackend, EventCallback};

/// Driver-side hooks invoked by the registry
pub trait RegistryListener: Send + Sync {
    /// Event callback wired into every newly registered backend
    fn event_callback(&self) -> EventCallback;

    /// A backend became active. Must be idempotent.
    fn backend_added(&self);

    /// The active backend is about to be cleared. Register I/O still works.
    fn backend_removing(&self);
}

/// Registry of the active EC transport backend
pub struct BackendRegistry {
    active: RwLock<Option<BoxedBackend>>,
    modification_lock: Mutex<()>,
    listener: RwLock<Option<Weak<dyn RegistryListener>>>,
}

impl BackendRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            active: RwLock::new(None),
            modification_lock: Mutex::new(()),
            listener: RwLock::new(None),
        }
    }

    /// Attach the driver that should be initialized when a backend arrives
    pub fn set_listener(&self, listener: Weak<dyn RegistryListener>) {
        *self.listener.write() = Some(listener);
    }

    fn listener(&self) -> Option<Arc<dyn RegistryListener>> {
        self.listener.read().as_ref().and_then(Weak::upgrade)
    }

    /// Install a backend as the sole active transport
    ///
    /// Wires the listener's event callback into the backend and then lets the
    /// listener initialize the driver.
    pub fn register(&self, backend: BoxedBackend) -> Result<(), TransportError> {
        let _guard = self.modification_lock.lock();

        let id = backend.id().to_string();
        if !protocol::is_known_backend(&id) {
            debug!("trying to add unknown interface {}", id);
            return Err(TransportError::InvalidBackend(id));
        }

        if let Some(active) = self.active.read().as_ref() {
            debug!("interface {} already active", active.id());
            return Err(TransportError::AlreadyRegistered(active.id().to_string()));
        }

        let listener = self.listener();
        if let Some(listener) = &listener {
            backend.set_event_callback(Some(listener.event_callback()));
        }
        *self.active.write() = Some(backend);
        info!("Registered EC interface {}", id);

        // Initialize driver if not already present
        if let Some(listener) = listener {
            listener.backend_added();
        }

        Ok(())
    }

    /// Remove the active backend
    ///
    /// Driver state is torn down first, while the backend is still
    /// registered, so final register writes can go through.
    pub fn unregister(&self, backend: &dyn crate::Backend) -> Result<(), TransportError> {
        let _guard = self.modification_lock.lock();

        let id = backend.id();
        if !protocol::is_known_backend(id) {
            return Err(TransportError::InvalidBackend(id.to_string()));
        }

        let active_id = self.active.read().as_ref().map(|b| b.id().to_string());
        match active_id {
            None => return Err(TransportError::NoActiveBackend),
            Some(active_id) if active_id != id => {
                return Err(TransportError::InvalidBackend(id.to_string()));
            }
            Some(_) => {}
        }

        if let Some(listener) = self.listener() {
            listener.backend_removing();
        }

        if let Some(old) = self.active.write().take() {
            old.set_event_callback(None);
        }
        info!("Removed EC interface {}", id);

        Ok(())
    }

    /// Identifier of the active backend
    pub fn current_identifier(&self) -> Result<String, TransportError> {
        self.active
            .read()
            .as_ref()
            .map(|b| b.id().to_string())
            .ok_or(TransportError::NoActiveBackend)
    }

    /// Snapshot of the active backend for a single I/O call
    pub fn active(&self) -> Option<BoxedBackend> {
        self.active.read().clone()
    }

    /// Check if a backend is registered
    pub fn is_active(&self) -> bool {
        self.active.read().is_some()
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Backend, MemoryBackend};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingListener {
        added: AtomicUsize,
        removing: AtomicUsize,
        registry: parking_lot::Mutex<Option<Arc<BackendRegistry>>>,
        active_during_removal: parking_lot::Mutex<Option<bool>>,
    }

    impl RegistryListener for CountingListener {
        fn event_callback(&self) -> EventCallback {
            Arc::new(|_| {})
        }

        fn backend_added(&self) {
            self.added.fetch_add(1, Ordering::SeqCst);
        }

        fn backend_removing(&self) {
            self.removing.fetch_add(1, Ordering::SeqCst);
            if let Some(registry) = self.registry.lock().as_ref() {
                *self.active_during_removal.lock() = Some(registry.is_active());
            }
        }
    }

    fn setup() -> (Arc<BackendRegistry>, Arc<CountingListener>) {
        let registry = Arc::new(BackendRegistry::new());
        let listener = Arc::new(CountingListener::default());
        *listener.registry.lock() = Some(Arc::clone(&registry));
        let weak: Weak<dyn RegistryListener> =
            Arc::downgrade(&(Arc::clone(&listener) as Arc<dyn RegistryListener>));
        registry.set_listener(weak);
        (registry, listener)
    }

    #[test]
    fn test_no_backend_initially() {
        let registry = BackendRegistry::new();
        assert_eq!(
            registry.current_identifier(),
            Err(TransportError::NoActiveBackend)
        );
        assert!(registry.active().is_none());
    }

    #[test]
    fn test_register_and_identify() {
        let (registry, listener) = setup();
        let backend = Arc::new(MemoryBackend::new());
        registry.register(backend.clone()).unwrap();

        assert_eq!(registry.current_identifier().unwrap(), "uniwill_wmi");
        assert_eq!(listener.added.load(Ordering::SeqCst), 1);
        assert!(backend.has_event_callback());
    }

    #[test]
    fn test_register_bogus_keeps_previous() {
        let (registry, listener) = setup();
        let good = Arc::new(MemoryBackend::new());
        registry.register(good).unwrap();

        let bogus = Arc::new(MemoryBackend::with_id("bogus"));
        assert_eq!(
            registry.register(bogus),
            Err(TransportError::InvalidBackend("bogus".into()))
        );
        assert_eq!(registry.current_identifier().unwrap(), "uniwill_wmi");
        assert_eq!(listener.added.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_register_bogus_on_empty_registry() {
        let (registry, listener) = setup();
        let bogus = Arc::new(MemoryBackend::with_id("bogus"));
        assert!(matches!(
            registry.register(bogus),
            Err(TransportError::InvalidBackend(_))
        ));
        assert!(!registry.is_active());
        assert_eq!(listener.added.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_reregister_rejected() {
        let (registry, _listener) = setup();
        registry.register(Arc::new(MemoryBackend::new())).unwrap();
        assert_eq!(
            registry.register(Arc::new(MemoryBackend::new())),
            Err(TransportError::AlreadyRegistered("uniwill_wmi".into()))
        );
    }

    #[test]
    fn test_unregister_tears_down_before_clearing() {
        let (registry, listener) = setup();
        let backend = Arc::new(MemoryBackend::new());
        registry.register(backend.clone()).unwrap();
        registry.unregister(backend.as_ref()).unwrap();

        assert_eq!(listener.removing.load(Ordering::SeqCst), 1);
        assert_eq!(*listener.active_during_removal.lock(), Some(true));
        assert!(!registry.is_active());
        assert!(!backend.has_event_callback());
    }

    #[test]
    fn test_unregister_unknown_id() {
        let (registry, listener) = setup();
        registry.register(Arc::new(MemoryBackend::new())).unwrap();
        let bogus = MemoryBackend::with_id("bogus");
        assert!(matches!(
            registry.unregister(&bogus),
            Err(TransportError::InvalidBackend(_))
        ));
        assert!(registry.is_active());
        assert_eq!(listener.removing.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unregister_without_active() {
        let (registry, _listener) = setup();
        let backend = MemoryBackend::new();
        assert_eq!(
            registry.unregister(&backend),
            Err(TransportError::NoActiveBackend)
        );
    }

    #[test]
    fn test_register_without_listener() {
        let registry = BackendRegistry::new();
        let backend = Arc::new(MemoryBackend::new());
        registry.register(backend.clone()).unwrap();
        assert!(!backend.has_event_callback());
        registry.unregister(backend.as_ref()).unwrap();
    }

    #[test]
    fn test_io_racing_swaps_sees_whole_backend() {
        let registry = Arc::new(BackendRegistry::new());
        let backend = Arc::new(MemoryBackend::new());
        backend.set_register(0x0740, 0x42);

        let reader = {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || {
                for _ in 0..2000 {
                    if let Some(active) = registry.active() {
                        assert_eq!(active.read_ec_ram(0x0740), Ok(0x42));
                    }
                }
            })
        };

        for _ in 0..200 {
            registry.register(backend.clone()).unwrap();
            registry.unregister(backend.as_ref()).unwrap();
        }
        reader.join().unwrap();
        assert!(!registry.is_active());
    }
}
