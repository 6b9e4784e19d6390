//! Status Listener Registry
//!
//! Holds at most one status listener per [`DeviceKind`]. Drivers use it to
//! fan raw status transitions out to whoever is currently listening.

use crate::domain::models::{DeviceKind, RawDeviceStatus};
use crate::infrastructure::device::transport::StatusListener;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{trace, warn};

#[derive(Default)]
pub struct ListenerRegistry {
    listeners: Mutex<HashMap<DeviceKind, StatusListener>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `listener` for `kind`. A listener left registered is replaced
    /// and will not be called again.
    pub fn add(&self, kind: DeviceKind, listener: StatusListener) {
        let mut listeners = self.lock();
        if listeners.insert(kind, listener).is_some() {
            warn!("Replaced a {:?} status listener that was never removed", kind);
        }
    }

    pub fn remove(&self, kind: DeviceKind) {
        self.lock().remove(&kind);
    }

    pub fn has_listener(&self, kind: DeviceKind) -> bool {
        self.lock().contains_key(&kind)
    }

    /// Deliver `status` to the listener for `kind`, if any
    pub fn emit(&self, kind: DeviceKind, status: RawDeviceStatus) {
        // Clone out so the listener runs without the lock held
        let listener = self.lock().get(&kind).cloned();
        match listener {
            Some(listener) => {
                trace!("{:?} status -> {:?}", kind, status);
                listener(status);
            }
            None => trace!("{:?} status {:?} dropped: no listener", kind, status),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<DeviceKind, StatusListener>> {
        // A panicking listener never runs under the lock, so poisoning is benign
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_listener(counter: Arc<AtomicUsize>) -> StatusListener {
        Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_new_listener_replaces_previous() {
        let registry = ListenerRegistry::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        registry.add(DeviceKind::Wireless, counting_listener(first.clone()));
        registry.emit(DeviceKind::Wireless, RawDeviceStatus::Connecting);
        registry.add(DeviceKind::Wireless, counting_listener(second.clone()));
        registry.emit(DeviceKind::Wireless, RawDeviceStatus::Connected);
        registry.emit(DeviceKind::Wireless, RawDeviceStatus::Disconnected);

        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_kinds_are_independent() {
        let registry = ListenerRegistry::new();
        let radio = Arc::new(AtomicUsize::new(0));
        let usb = Arc::new(AtomicUsize::new(0));

        registry.add(DeviceKind::RadioRemote, counting_listener(radio.clone()));
        registry.add(DeviceKind::UsbBridge, counting_listener(usb.clone()));
        registry.emit(DeviceKind::UsbBridge, RawDeviceStatus::Disconnected);

        assert_eq!(radio.load(Ordering::SeqCst), 0);
        assert_eq!(usb.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_removed_listener_is_silent() {
        let registry = ListenerRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));

        registry.add(DeviceKind::Wireless, counting_listener(counter.clone()));
        assert!(registry.has_listener(DeviceKind::Wireless));
        registry.remove(DeviceKind::Wireless);
        assert!(!registry.has_listener(DeviceKind::Wireless));
        registry.emit(DeviceKind::Wireless, RawDeviceStatus::Connected);

        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
