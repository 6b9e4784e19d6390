use serde::{Deserialize, Serialize};

/// Transport used to reach the sensor device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportKind {
    /// Short-range wireless link straight to the sensor device
    Wireless,
    /// Sensor device that will talk to the host through a radio bridge
    RadioRemote,
    /// USB-attached relay device forwarding radio traffic to the host
    RadioBridge,
}

impl TransportKind {
    /// Whether this transport belongs to the radio flow (remote or bridge leg)
    pub fn is_radio(&self) -> bool {
        matches!(self, TransportKind::RadioRemote | TransportKind::RadioBridge)
    }
}

impl Default for TransportKind {
    fn default() -> Self {
        TransportKind::Wireless
    }
}

/// Driver that emitted a raw status. Status listeners are keyed by this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    Wireless,
    RadioRemote,
    /// The USB relay; its status stands in for the remote device's health
    UsbBridge,
}

/// Status reported by a transport driver. Arrives out of band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawDeviceStatus {
    Connecting,
    Connected,
    Disconnected,
    Reconnecting,
    NoAuthorizedDevice,
}

/// Connection status observed by the rest of the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppConnectionStatus {
    NotConnected,
    Connecting,
    Connected,
    ReconnectingExplicitly,
    ReconnectingAutomatically,
    /// User explicitly disconnected
    Disconnected,
    FailedToSelectDevice,
    FailedToConnect,
    FailedToReconnect,
    ConnectionLost,
    FailedToReconnectTwice,
}

impl AppConnectionStatus {
    /// A wizard session that is starting over rather than recovering
    pub fn is_fresh_start(&self) -> bool {
        matches!(
            self,
            AppConnectionStatus::NotConnected | AppConnectionStatus::FailedToConnect
        )
    }
}

/// Application status together with the transport it refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionState {
    pub status: AppConnectionStatus,
    pub transport: TransportKind,
}

impl ConnectionState {
    pub fn new(status: AppConnectionStatus, transport: TransportKind) -> Self {
        Self { status, transport }
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::new(AppConnectionStatus::NotConnected, TransportKind::Wireless)
    }
}

/// Hardware revision reported by the USB device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoardVersion {
    V1,
    V2,
}

/// What the host platform lets us use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostCapabilities {
    pub usb: bool,
    pub wireless: bool,
}

impl Default for HostCapabilities {
    fn default() -> Self {
        Self {
            usb: true,
            wireless: true,
        }
    }
}

/// Notifications published to the UI layer
#[derive(Debug, Clone)]
pub enum AppEvent {
    ConnectionStatus(ConnectionState),
    StageChanged(crate::domain::steps::FlowStage),
    /// Firmware write progress in 0.0..=1.0
    FlashProgress(f32),
    /// Offer the given firmware file for manual flashing
    DownloadFirmware(String),
    LogMessage(StatusMessage),
}

#[derive(Debug, Clone)]
pub struct StatusMessage {
    pub message: String,
    pub severity: MessageSeverity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSeverity {
    Info,
    Success,
    Warning,
    Error,
}
