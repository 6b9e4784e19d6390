//! Flashing Orchestrator
//!
//! Connects to a device over USB, writes the firmware for the requested
//! transport and reads back the device id. Every transport failure is turned
//! into a [`FlashError`] here.

use crate::domain::errors::FlashError;
use crate::domain::models::TransportKind;
use crate::infrastructure::device::firmware::{firmware_for, FirmwareStore, FirmwareVersion};
use crate::infrastructure::device::transport::{ProgressCallback, TransportError, UsbTransport};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Map a driver failure onto the flashing taxonomy
pub fn classify(error: &TransportError) -> FlashError {
    match error {
        TransportError::NoDeviceSelected => FlashError::NoDeviceSelected,
        TransportError::InterfaceClaimed => FlashError::UnableToClaimInterface,
        TransportError::FirmwareRejected | TransportError::IncompatibleFirmware => {
            FlashError::BadFirmware
        }
        TransportError::Disconnected | TransportError::Other(_) => {
            FlashError::Failed(error.to_string())
        }
    }
}

pub struct FlashingOrchestrator {
    usb: Arc<dyn UsbTransport>,
    store: FirmwareStore,
}

impl FlashingOrchestrator {
    pub fn new(usb: Arc<dyn UsbTransport>, store: FirmwareStore) -> Self {
        Self { usb, store }
    }

    /// Ask the platform chooser for a device and connect to it.
    ///
    /// Completes only once the user has picked a device or dismissed the
    /// chooser.
    pub async fn select_device(&self) -> Result<(), FlashError> {
        info!("Requesting USB device selection");
        self.usb.select_device().await.map_err(|e| {
            warn!("Device selection failed: {}", e);
            classify(&e)
        })
    }

    /// Write the firmware for `transport` to the selected device and return
    /// its device id.
    ///
    /// The USB connection is released afterwards unless the device is the
    /// radio bridge, which keeps serving the serial link.
    pub async fn flash(
        &self,
        transport: TransportKind,
        progress: ProgressCallback<'_>,
    ) -> Result<u32, FlashError> {
        let result = self.write_firmware(transport, progress).await;
        if result.is_err() || transport != TransportKind::RadioBridge {
            self.usb.disconnect().await;
        }
        result
    }

    async fn write_firmware(
        &self,
        transport: TransportKind,
        progress: ProgressCallback<'_>,
    ) -> Result<u32, FlashError> {
        let board_version = self.usb.board_version().await;
        let version = board_version
            .map(FirmwareVersion::Board)
            .unwrap_or(FirmwareVersion::Universal);

        let Some(resource) = firmware_for(version, transport) else {
            warn!("No {:?} firmware for {:?} hardware", transport, version);
            return Err(FlashError::MicrobitUnsupported);
        };

        let image = self.store.load(&resource).await.map_err(|e| {
            error!("{:#}", e);
            FlashError::Failed(e.to_string())
        })?;

        info!(
            "Flashing {} ({} bytes) for {:?}",
            resource.file_name,
            image.len(),
            transport
        );
        self.usb.flash(&image, progress).await.map_err(|e| {
            error!("Firmware write failed: {}", e);
            classify(&e)
        })?;

        let device_id = self.usb.device_id().await.ok_or_else(|| {
            error!("Device id unavailable after flashing");
            FlashError::Failed("device id unavailable".to_string())
        })?;

        info!("Flashed device {} ({:?})", device_id, board_version);
        Ok(device_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::BoardVersion;
    use crate::infrastructure::device::simulated::SimulatedDevice;
    use std::sync::Mutex;
    use tempfile::{tempdir, TempDir};

    fn firmware_dir() -> TempDir {
        let dir = tempdir().unwrap();
        for name in [
            "wireless-v1.hex",
            "wireless-v2.hex",
            "universal.hex",
            "radio-remote-v2.hex",
            "radio-bridge-v2.hex",
        ] {
            std::fs::write(dir.path().join(name), name.as_bytes()).unwrap();
        }
        dir
    }

    fn orchestrator(device: &Arc<SimulatedDevice>, dir: &TempDir) -> FlashingOrchestrator {
        FlashingOrchestrator::new(device.clone(), FirmwareStore::new(dir.path()))
    }

    async fn select_and_flash(
        orchestrator: &FlashingOrchestrator,
        transport: TransportKind,
        progress: ProgressCallback<'_>,
    ) -> Result<u32, FlashError> {
        orchestrator.select_device().await?;
        orchestrator.flash(transport, progress).await
    }

    #[test]
    fn test_classify() {
        assert_eq!(
            classify(&TransportError::NoDeviceSelected),
            FlashError::NoDeviceSelected
        );
        assert_eq!(
            classify(&TransportError::InterfaceClaimed),
            FlashError::UnableToClaimInterface
        );
        assert_eq!(
            classify(&TransportError::FirmwareRejected),
            FlashError::BadFirmware
        );
        assert!(matches!(
            classify(&TransportError::Other("usb stall".into())),
            FlashError::Failed(_)
        ));
    }

    #[tokio::test]
    async fn test_flash_writes_matching_image() {
        let dir = firmware_dir();
        let device = Arc::new(SimulatedDevice::new(BoardVersion::V2, 77));
        let progress = Mutex::new(Vec::new());

        let orchestrator = orchestrator(&device, &dir);
        let device_id = select_and_flash(&orchestrator, TransportKind::RadioRemote, &|p| {
            progress.lock().unwrap().push(p)
        })
        .await
        .unwrap();

        assert_eq!(device_id, 77);
        assert_eq!(device.flashed_images(), vec![b"radio-remote-v2.hex".to_vec()]);
        let progress = progress.into_inner().unwrap();
        assert_eq!(progress.last(), Some(&1.0));
        // remote leg releases USB so the user can unplug
        assert!(!device.is_usb_connected());
    }

    #[tokio::test]
    async fn test_bridge_keeps_usb_connection() {
        let dir = firmware_dir();
        let device = Arc::new(SimulatedDevice::new(BoardVersion::V2, 5));

        select_and_flash(&orchestrator(&device, &dir), TransportKind::RadioBridge, &|_| {})
            .await
            .unwrap();
        assert!(device.is_usb_connected());
    }

    #[tokio::test]
    async fn test_v1_radio_is_unsupported() {
        let dir = firmware_dir();
        let device = Arc::new(SimulatedDevice::new(BoardVersion::V1, 5));

        let result = select_and_flash(&orchestrator(&device, &dir), TransportKind::RadioBridge, &|_| {}).await;
        assert_eq!(result, Err(FlashError::MicrobitUnsupported));
        assert!(device.flashed_images().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_board_uses_universal_image() {
        let dir = firmware_dir();
        let device = Arc::new(SimulatedDevice::new(BoardVersion::V2, 5));
        device.set_board_version(None);

        select_and_flash(&orchestrator(&device, &dir), TransportKind::Wireless, &|_| {})
            .await
            .unwrap();
        assert_eq!(device.flashed_images(), vec![b"universal.hex".to_vec()]);
    }

    #[tokio::test]
    async fn test_transport_failures_are_classified() {
        let dir = firmware_dir();
        let device = Arc::new(SimulatedDevice::new(BoardVersion::V2, 5));
        let orchestrator = orchestrator(&device, &dir);

        device.fail_next_selection(TransportError::NoDeviceSelected);
        assert_eq!(
            select_and_flash(&orchestrator, TransportKind::Wireless, &|_| {}).await,
            Err(FlashError::NoDeviceSelected)
        );

        device.fail_next_flash(TransportError::FirmwareRejected);
        assert_eq!(
            select_and_flash(&orchestrator, TransportKind::Wireless, &|_| {}).await,
            Err(FlashError::BadFirmware)
        );
        assert!(!device.is_usb_connected());
    }

    #[tokio::test]
    async fn test_missing_image_is_generic_failure() {
        let dir = tempdir().unwrap();
        let device = Arc::new(SimulatedDevice::new(BoardVersion::V2, 5));

        let result = select_and_flash(&orchestrator(&device, &dir), TransportKind::Wireless, &|_| {}).await;
        assert!(matches!(result, Err(FlashError::Failed(_))));
    }
}
