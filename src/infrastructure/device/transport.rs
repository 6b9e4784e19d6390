//! Transport Driver Interface
//!
//! The capability surface the connection core consumes from the platform
//! drivers. Implementations own the physical stacks; this crate only sees the
//! operations below and the structured errors they return.

use crate::domain::models::{BoardVersion, DeviceKind, RawDeviceStatus};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Callback receiving raw status transitions from a driver
pub type StatusListener = Arc<dyn Fn(RawDeviceStatus) + Send + Sync>;

/// Firmware write progress callback, 0.0..=1.0
pub type ProgressCallback<'a> = &'a (dyn Fn(f32) + Send + Sync);

/// Failure reported by a driver.
///
/// Drivers decide the kind from the underlying failure; message text is only
/// carried for logs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Device chooser was dismissed")]
    NoDeviceSelected,

    #[error("Device interface is claimed by another process")]
    InterfaceClaimed,

    #[error("Bootloader rejected the image")]
    FirmwareRejected,

    /// The wireless device runs firmware the link cannot talk to
    #[error("Device firmware is incompatible with this link")]
    IncompatibleFirmware,

    #[error("Device disconnected during the operation")]
    Disconnected,

    #[error("Transport error: {0}")]
    Other(String),
}

/// Target of a link connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkTarget {
    /// Wireless device advertising this pairing name
    Wireless { name: String },
    /// Remote device reached through the USB bridge
    Radio { remote_id: u32 },
}

/// USB access to a device: selection, flashing and identity
#[async_trait]
pub trait UsbTransport: Send + Sync {
    /// Open the platform device chooser and connect to the chosen device
    async fn select_device(&self) -> Result<(), TransportError>;

    async fn disconnect(&self);

    async fn board_version(&self) -> Option<BoardVersion>;

    async fn device_id(&self) -> Option<u32>;

    async fn flash(
        &self,
        image: &[u8],
        progress: ProgressCallback<'_>,
    ) -> Result<(), TransportError>;

    /// Register the listener for `kind`, replacing any previous one
    fn add_status_listener(&self, kind: DeviceKind, listener: StatusListener);

    fn remove_status_listener(&self, kind: DeviceKind);
}

/// A data link to a paired device (wireless, or radio through the bridge)
#[async_trait]
pub trait DeviceLink: Send + Sync {
    async fn connect(&self, target: &LinkTarget) -> Result<(), TransportError>;

    async fn disconnect(&self);

    /// Register the listener for `kind`, replacing any previous one
    fn add_status_listener(&self, kind: DeviceKind, listener: StatusListener);

    fn remove_status_listener(&self, kind: DeviceKind);
}

/// The device handles injected into the connection service
#[derive(Clone)]
pub struct Devices {
    pub usb: Arc<dyn UsbTransport>,
    pub wireless: Arc<dyn DeviceLink>,
    pub radio: Arc<dyn DeviceLink>,
}
