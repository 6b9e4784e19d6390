//! Simulated Device
//!
//! In-memory stand-in for the USB, wireless and radio drivers. It backs the
//! command-line demo and the tests; failures and status sequences can be
//! scripted ahead of each call.

use crate::domain::models::{BoardVersion, DeviceKind, RawDeviceStatus};
use crate::infrastructure::device::listeners::ListenerRegistry;
use crate::infrastructure::device::transport::{
    DeviceLink, LinkTarget, ProgressCallback, StatusListener, TransportError, UsbTransport,
};
use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

#[derive(Debug, Default)]
struct SimulatedState {
    board_version: Option<BoardVersion>,
    device_id: u32,
    usb_connected: bool,
    /// Link currently up, keyed by the kind its statuses are reported under
    link: Option<DeviceKind>,
    selection_error: Option<TransportError>,
    flash_error: Option<TransportError>,
    connect_error: Option<TransportError>,
    connect_script: Option<Vec<(DeviceKind, RawDeviceStatus)>>,
    flashed: Vec<Vec<u8>>,
    connects: Vec<LinkTarget>,
    link_disconnects: usize,
}

/// A scriptable device reachable over every transport
pub struct SimulatedDevice {
    listeners: ListenerRegistry,
    state: Mutex<SimulatedState>,
}

impl SimulatedDevice {
    pub fn new(board_version: BoardVersion, device_id: u32) -> Self {
        Self {
            listeners: ListenerRegistry::new(),
            state: Mutex::new(SimulatedState {
                board_version: Some(board_version),
                device_id,
                ..SimulatedState::default()
            }),
        }
    }

    pub fn set_board_version(&self, version: Option<BoardVersion>) {
        self.lock().board_version = version;
    }

    pub fn set_device_id(&self, id: u32) {
        self.lock().device_id = id;
    }

    pub fn fail_next_selection(&self, error: TransportError) {
        self.lock().selection_error = Some(error);
    }

    pub fn fail_next_flash(&self, error: TransportError) {
        self.lock().flash_error = Some(error);
    }

    pub fn fail_next_connect(&self, error: TransportError) {
        self.lock().connect_error = Some(error);
    }

    /// Statuses the next `connect` reports instead of a clean handshake
    pub fn script_next_connect(&self, statuses: Vec<(DeviceKind, RawDeviceStatus)>) {
        self.lock().connect_script = Some(statuses);
    }

    /// Report a status from the device, as a driver would out of band
    pub fn emit(&self, kind: DeviceKind, status: RawDeviceStatus) {
        self.listeners.emit(kind, status);
    }

    pub fn has_listener(&self, kind: DeviceKind) -> bool {
        self.listeners.has_listener(kind)
    }

    pub fn is_usb_connected(&self) -> bool {
        self.lock().usb_connected
    }

    pub fn flashed_images(&self) -> Vec<Vec<u8>> {
        self.lock().flashed.clone()
    }

    pub fn connects(&self) -> Vec<LinkTarget> {
        self.lock().connects.clone()
    }

    pub fn link_disconnects(&self) -> usize {
        self.lock().link_disconnects
    }

    fn lock(&self) -> MutexGuard<'_, SimulatedState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl UsbTransport for SimulatedDevice {
    async fn select_device(&self) -> Result<(), TransportError> {
        let mut state = self.lock();
        if let Some(error) = state.selection_error.take() {
            return Err(error);
        }
        state.usb_connected = true;
        info!("Simulated USB device selected");
        Ok(())
    }

    async fn disconnect(&self) {
        let was_connected = std::mem::replace(&mut self.lock().usb_connected, false);
        if was_connected {
            debug!("Simulated USB device released");
            self.emit(DeviceKind::UsbBridge, RawDeviceStatus::Disconnected);
        }
    }

    async fn board_version(&self) -> Option<BoardVersion> {
        self.lock().board_version
    }

    async fn device_id(&self) -> Option<u32> {
        let state = self.lock();
        state.usb_connected.then_some(state.device_id)
    }

    async fn flash(
        &self,
        image: &[u8],
        progress: ProgressCallback<'_>,
    ) -> Result<(), TransportError> {
        {
            let mut state = self.lock();
            if !state.usb_connected {
                return Err(TransportError::Disconnected);
            }
            if let Some(error) = state.flash_error.take() {
                return Err(error);
            }
        }
        for step in 0..=4 {
            progress(step as f32 / 4.0);
        }
        self.lock().flashed.push(image.to_vec());
        Ok(())
    }

    fn add_status_listener(&self, kind: DeviceKind, listener: StatusListener) {
        self.listeners.add(kind, listener);
    }

    fn remove_status_listener(&self, kind: DeviceKind) {
        self.listeners.remove(kind);
    }
}

#[async_trait]
impl DeviceLink for SimulatedDevice {
    async fn connect(&self, target: &LinkTarget) -> Result<(), TransportError> {
        let kind = match target {
            LinkTarget::Wireless { .. } => DeviceKind::Wireless,
            LinkTarget::Radio { .. } => DeviceKind::RadioRemote,
        };
        let (script, error) = {
            let mut state = self.lock();
            state.connects.push(target.clone());
            let script = state.connect_script.take();
            match state.connect_error.take() {
                // a failing driver only reports what was scripted for it
                Some(error) => (script.unwrap_or_default(), Some(error)),
                None => {
                    state.link = Some(kind);
                    let script = script.unwrap_or_else(|| {
                        vec![
                            (kind, RawDeviceStatus::Connecting),
                            (kind, RawDeviceStatus::Connected),
                        ]
                    });
                    (script, None)
                }
            }
        };
        info!("Simulated link to {:?}", target);
        for (kind, status) in script {
            self.emit(kind, status);
        }
        match error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn disconnect(&self) {
        let link = {
            let mut state = self.lock();
            state.link_disconnects += 1;
            state.link.take()
        };
        if let Some(kind) = link {
            debug!("Simulated {:?} link closed", kind);
            self.emit(kind, RawDeviceStatus::Disconnected);
        }
    }

    fn add_status_listener(&self, kind: DeviceKind, listener: StatusListener) {
        self.listeners.add(kind, listener);
    }

    fn remove_status_listener(&self, kind: DeviceKind) {
        self.listeners.remove(kind);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn recorder(device: &SimulatedDevice, kind: DeviceKind) -> Arc<Mutex<Vec<RawDeviceStatus>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        device.listeners.add(
            kind,
            Arc::new(move |status| sink.lock().unwrap().push(status)),
        );
        seen
    }

    #[tokio::test]
    async fn test_connect_reports_handshake() {
        let device = SimulatedDevice::new(BoardVersion::V2, 1);
        let seen = recorder(&device, DeviceKind::Wireless);

        DeviceLink::connect(&device, &LinkTarget::Wireless { name: "zuzuz".into() })
            .await
            .unwrap();
        DeviceLink::disconnect(&device).await;

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                RawDeviceStatus::Connecting,
                RawDeviceStatus::Connected,
                RawDeviceStatus::Disconnected
            ]
        );
    }

    #[tokio::test]
    async fn test_scripted_connect_failure() {
        let device = SimulatedDevice::new(BoardVersion::V2, 1);
        device.fail_next_connect(TransportError::IncompatibleFirmware);

        let result =
            DeviceLink::connect(&device, &LinkTarget::Radio { remote_id: 9 }).await;
        assert_eq!(result, Err(TransportError::IncompatibleFirmware));
        assert_eq!(device.connects(), vec![LinkTarget::Radio { remote_id: 9 }]);
    }

    #[tokio::test]
    async fn test_failed_connect_reports_script_then_error() {
        let device = SimulatedDevice::new(BoardVersion::V2, 1);
        let seen = recorder(&device, DeviceKind::Wireless);
        device.script_next_connect(vec![
            (DeviceKind::Wireless, RawDeviceStatus::Connecting),
            (DeviceKind::Wireless, RawDeviceStatus::Disconnected),
        ]);
        device.fail_next_connect(TransportError::Other("link refused".into()));

        let result =
            DeviceLink::connect(&device, &LinkTarget::Wireless { name: "zuzuz".into() }).await;
        assert!(result.is_err());
        assert_eq!(
            *seen.lock().unwrap(),
            vec![RawDeviceStatus::Connecting, RawDeviceStatus::Disconnected]
        );
        // nothing left up to tear down
        DeviceLink::disconnect(&device).await;
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_device_id_needs_usb() {
        let device = SimulatedDevice::new(BoardVersion::V1, 42);
        assert_eq!(device.device_id().await, None);
        device.select_device().await.unwrap();
        assert_eq!(device.device_id().await, Some(42));
    }
}
