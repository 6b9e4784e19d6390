//! Connection Service
//!
//! Owns the pairing wizard and the application connection status, and drives
//! the injected device drivers on behalf of UI commands.
//!
//! Driver status callbacks never touch the service directly: they only queue
//! a [`DeviceEvent`]. The queue is drained on the service's own thread of
//! control by [`ConnectionService::process_pending_events`], which is also
//! called at the end of every command that talks to a device.

use crate::domain::errors::FlashError;
use crate::domain::models::{
    AppConnectionStatus, AppEvent, ConnectionState, DeviceKind, HostCapabilities,
    MessageSeverity, RawDeviceStatus, StatusMessage, TransportKind,
};
use crate::domain::pairing;
use crate::domain::settings::ConnectionSettings;
use crate::domain::status::{next_status, HandshakeState, StatusInput};
use crate::domain::steps::FlowStage;
use crate::domain::wizard::{FlashSuccess, NavigationResult, WizardFlow, WizardState};
use crate::infrastructure::device::firmware::{universal_firmware, FirmwareStore};
use crate::infrastructure::device::flashing::FlashingOrchestrator;
use crate::infrastructure::device::transport::{
    DeviceLink, Devices, LinkTarget, StatusListener, TransportError,
};
use crate::infrastructure::device::watchdog::{TimerKind, Watchdog};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Something a driver or timer reported, waiting to be classified
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceEvent {
    Status {
        device: DeviceKind,
        status: RawDeviceStatus,
    },
    TimedOut {
        device: DeviceKind,
        timer: TimerKind,
        generation: u64,
    },
}

pub struct ConnectionService {
    devices: Devices,
    orchestrator: FlashingOrchestrator,
    flow: WizardFlow,
    status: ConnectionState,
    handshake: HandshakeState,
    prev_raw: HashMap<DeviceKind, RawDeviceStatus>,
    event_sender: mpsc::UnboundedSender<AppEvent>,
    device_tx: mpsc::UnboundedSender<DeviceEvent>,
    device_rx: mpsc::UnboundedReceiver<DeviceEvent>,
    watchdog: Watchdog,
}

impl ConnectionService {
    pub fn new(
        devices: Devices,
        firmware: FirmwareStore,
        capabilities: HostCapabilities,
        settings: ConnectionSettings,
        event_sender: mpsc::UnboundedSender<AppEvent>,
    ) -> Self {
        let (device_tx, device_rx) = mpsc::unbounded_channel();
        Self {
            orchestrator: FlashingOrchestrator::new(devices.usb.clone(), firmware),
            devices,
            flow: WizardFlow::new(capabilities),
            status: ConnectionState::default(),
            handshake: HandshakeState::default(),
            prev_raw: HashMap::new(),
            event_sender,
            watchdog: Watchdog::new(device_tx.clone(), settings),
            device_tx,
            device_rx,
        }
    }

    pub fn wizard(&self) -> &WizardState {
        self.flow.state()
    }

    pub fn status(&self) -> ConnectionState {
        self.status
    }

    // ---- Wizard navigation ----

    /// Open the wizard at the start of a flow the host supports
    pub fn start_connect(&mut self) -> FlowStage {
        let stage = self.flow.open();
        info!("Connection wizard opened at {}", stage);
        self.publish_stage();
        stage
    }

    pub fn on_next_click(&mut self) -> NavigationResult {
        let result = self.flow.next();
        self.after_navigation(&result);
        result
    }

    pub fn on_back_click(&mut self) -> NavigationResult {
        let result = self.flow.back();
        self.after_navigation(&result);
        result
    }

    pub fn on_try_again(&mut self) -> NavigationResult {
        let result = self.flow.try_again();
        self.after_navigation(&result);
        result
    }

    pub fn switch_transport(&mut self) -> FlowStage {
        let stage = self.flow.switch_transport();
        info!("Switched to {:?} flow", stage.transport());
        self.publish_stage();
        stage
    }

    /// Name typed in, or decoded from the pairing pattern grid
    pub fn on_change_device_name(&mut self, name: &str) {
        debug!("Device name set to {:?}", name);
        self.flow.set_device_name(name);
    }

    pub fn close_wizard(&mut self) {
        self.flow.close();
        self.publish_stage();
    }

    fn after_navigation(&self, result: &NavigationResult) {
        match result {
            NavigationResult::Moved(stage) => {
                debug!("Wizard at {}", stage);
                self.publish_stage();
            }
            NavigationResult::Blocked { reason } => debug!("Navigation blocked: {}", reason),
        }
    }

    // ---- Flashing ----

    /// Select a device over USB and install the firmware for the current leg.
    ///
    /// A flashed bridge is connected to its remote straight away.
    pub async fn connect_and_flash(&mut self) -> Result<(), FlashError> {
        if !self.flow.state().web_usb_supported() {
            warn!("USB flashing requested on a host without USB support");
            return Err(FlashError::Failed("USB is not supported".to_string()));
        }
        let transport = self.flow.stage().transport();

        self.flow.choose_device();
        self.publish_stage();
        if let Err(e) = self.orchestrator.select_device().await {
            self.on_flash_failed(&e);
            return Err(e);
        }

        self.flow.flashing_started();
        self.publish_stage();
        let sender = self.event_sender.clone();
        let progress = move |value: f32| {
            let _ = sender.send(AppEvent::FlashProgress(value));
        };
        let result = self.orchestrator.flash(transport, &progress).await;
        let device_id = match result {
            Ok(device_id) => device_id,
            Err(e) => {
                self.on_flash_failed(&e);
                return Err(e);
            }
        };

        self.notify(
            MessageSeverity::Success,
            format!("Firmware installed on device {}", device_id),
        );
        let next = self.flow.flash_succeeded(device_id);
        self.publish_stage();
        if next == FlashSuccess::ConnectBridge {
            self.connect_bridge().await;
        }
        Ok(())
    }

    fn on_flash_failed(&mut self, error: &FlashError) {
        let severity = if error.is_recoverable() {
            warn!("Flashing failed: {}", error);
            MessageSeverity::Warning
        } else {
            error!("Flashing failed: {}", error);
            MessageSeverity::Error
        };
        let failure = self.flow.flash_failed(error);
        self.publish_stage();
        self.notify(severity, error.to_string());
        if failure.download_universal_firmware {
            let file = universal_firmware().file_name.to_string();
            info!("Offering {} for manual flashing", file);
            let _ = self.event_sender.send(AppEvent::DownloadFirmware(file));
        }
    }

    // ---- Connections ----

    /// Connect to the wireless device named in the wizard
    pub async fn connect_wireless(&mut self) {
        if self.flow.stage().transport() != TransportKind::Wireless {
            warn!("Wireless connection requested from the radio flow");
            self.notify(
                MessageSeverity::Warning,
                "Switch to the wireless connection to pair by name".to_string(),
            );
            return;
        }
        let Some(name) = self.flow.state().wireless_device_name().map(str::to_string) else {
            warn!("No wireless device name to connect to");
            return;
        };
        if !pairing::is_valid_name(&name) {
            warn!("{:?} is not a valid device name", name);
            self.notify(
                MessageSeverity::Warning,
                format!("{:?} is not a valid device name", name),
            );
            return;
        }

        self.flow.connecting_wireless();
        self.publish_stage();
        self.begin_attempt(AppConnectionStatus::NotConnected, TransportKind::Wireless);

        let link = self.devices.wireless.clone();
        let result = self
            .attach(&link, DeviceKind::Wireless, &LinkTarget::Wireless { name })
            .await;
        match result {
            Err(TransportError::IncompatibleFirmware) => {
                warn!("Wireless device runs incompatible firmware");
                self.watchdog.clear();
                self.flow.wireless_firmware_rejected();
                self.publish_stage();
            }
            Err(e) => self.link_failed(DeviceKind::Wireless, &e),
            Ok(()) => {}
        }
        self.process_pending_events();
    }

    /// Connect the bridge to the flashed remote device
    pub async fn connect_bridge(&mut self) {
        let Some(remote_id) = self.flow.state().radio_remote_device_id() else {
            warn!("Bridge connection requested before the remote was flashed");
            return;
        };

        self.flow.connecting_bridge();
        self.publish_stage();
        self.begin_attempt(AppConnectionStatus::NotConnected, TransportKind::RadioRemote);

        let link = self.devices.radio.clone();
        if let Err(e) = self
            .attach(&link, DeviceKind::RadioRemote, &LinkTarget::Radio { remote_id })
            .await
        {
            self.link_failed(DeviceKind::RadioRemote, &e);
        }
        self.process_pending_events();
    }

    /// Drop the connection on the user's request
    pub async fn disconnect(&mut self) {
        // Status first so teardown noise is not read as a failure
        self.apply_status(ConnectionState::new(
            AppConnectionStatus::Disconnected,
            self.status.transport,
        ));
        self.watchdog.clear();
        self.detach_all();
        if self.status.transport.is_radio() {
            self.devices.radio.disconnect().await;
            self.devices.usb.disconnect().await;
        } else {
            self.devices.wireless.disconnect().await;
        }
        self.notify(MessageSeverity::Info, "Disconnected from device".to_string());
    }

    /// Reconnect to the devices paired earlier in the session
    pub async fn reconnect(&mut self) {
        let transport = self.status.transport;
        let (link, device, target) = if transport.is_radio() {
            let Some(remote_id) = self.flow.state().radio_remote_device_id() else {
                warn!("No paired radio device to reconnect to");
                return;
            };
            (
                self.devices.radio.clone(),
                DeviceKind::RadioRemote,
                LinkTarget::Radio { remote_id },
            )
        } else {
            let Some(name) = self.flow.state().wireless_device_name().map(str::to_string) else {
                warn!("No paired wireless device to reconnect to");
                return;
            };
            (
                self.devices.wireless.clone(),
                DeviceKind::Wireless,
                LinkTarget::Wireless { name },
            )
        };

        info!("Reconnecting to {:?}", target);
        self.begin_attempt(AppConnectionStatus::ReconnectingExplicitly, transport);
        if let Err(e) = self.attach(&link, device, &target).await {
            self.link_failed(device, &e);
        }
        self.process_pending_events();
    }

    fn begin_attempt(&mut self, status: AppConnectionStatus, transport: TransportKind) {
        self.prev_raw.clear();
        self.apply_status(ConnectionState::new(status, transport));
    }

    /// Tear down `link`, install fresh listeners and connect to `target`.
    async fn attach(
        &mut self,
        link: &Arc<dyn DeviceLink>,
        device: DeviceKind,
        target: &LinkTarget,
    ) -> Result<(), TransportError> {
        self.detach_all();
        link.disconnect().await;

        link.add_status_listener(device, self.listener(device));
        if device == DeviceKind::RadioRemote {
            self.devices
                .usb
                .add_status_listener(DeviceKind::UsbBridge, self.listener(DeviceKind::UsbBridge));
        }
        self.watchdog.arm(device);
        link.connect(target).await
    }

    fn detach_all(&self) {
        self.devices
            .wireless
            .remove_status_listener(DeviceKind::Wireless);
        self.devices
            .radio
            .remove_status_listener(DeviceKind::RadioRemote);
        self.devices
            .usb
            .remove_status_listener(DeviceKind::UsbBridge);
    }

    fn listener(&self, device: DeviceKind) -> StatusListener {
        let tx = self.device_tx.clone();
        Arc::new(move |status| {
            let _ = tx.send(DeviceEvent::Status { device, status });
        })
    }

    /// A connect call that failed outright reads as the device going away,
    /// unless the driver already reported the loss itself.
    fn link_failed(&mut self, device: DeviceKind, error: &TransportError) {
        warn!("{:?} connection failed: {}", device, error);
        self.process_pending_events();
        if self.prev_raw.get(&device) == Some(&RawDeviceStatus::Disconnected) {
            debug!("{:?} already reported the disconnect", device);
            return;
        }
        self.handle_device_event(DeviceEvent::Status {
            device,
            status: RawDeviceStatus::Disconnected,
        });
    }

    // ---- Device events ----

    /// Classify every queued device event. Returns how many were handled.
    pub fn process_pending_events(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.device_rx.try_recv() {
            self.handle_device_event(event);
            handled += 1;
        }
        handled
    }

    pub fn handle_device_event(&mut self, event: DeviceEvent) {
        let (device, raw) = match event {
            DeviceEvent::Status { device, status } => (device, status),
            DeviceEvent::TimedOut {
                device,
                timer,
                generation,
            } => {
                if !self.watchdog.is_current(generation) {
                    debug!("Ignoring stale {:?} timeout", timer);
                    return;
                }
                warn!("{:?} timer expired waiting for {:?}", timer, device);
                (device, RawDeviceStatus::Disconnected)
            }
        };

        let input = StatusInput {
            transport: self.status.transport,
            current: self.status.status,
            raw,
            prev_raw: self.prev_raw.insert(device, raw),
            device,
        };
        let (handshake, output) = next_status(&input, self.handshake);
        self.handshake = handshake;
        debug!("{:?} {:?} -> {:?}", device, raw, output.map(|s| s.status));

        let Some(state) = output else {
            return;
        };
        match state.status {
            AppConnectionStatus::Connected => self.watchdog.clear(),
            AppConnectionStatus::ReconnectingAutomatically => self.watchdog.arm(device),
            AppConnectionStatus::FailedToConnect
            | AppConnectionStatus::FailedToSelectDevice
            | AppConnectionStatus::FailedToReconnect
            | AppConnectionStatus::ConnectionLost
            | AppConnectionStatus::FailedToReconnectTwice => self.watchdog.clear(),
            _ => {}
        }
        self.apply_status(state);
    }

    fn apply_status(&mut self, state: ConnectionState) {
        if state == self.status {
            return;
        }
        info!(
            "Connection status {:?} -> {:?} ({:?})",
            self.status.status, state.status, state.transport
        );
        self.status = state;
        let _ = self.event_sender.send(AppEvent::ConnectionStatus(state));
        if self.flow.status_changed(state).is_some() {
            self.publish_stage();
        }
    }

    fn publish_stage(&self) {
        let _ = self
            .event_sender
            .send(AppEvent::StageChanged(self.flow.stage()));
    }

    fn notify(&self, severity: MessageSeverity, message: String) {
        let _ = self
            .event_sender
            .send(AppEvent::LogMessage(StatusMessage { message, severity }));
    }
}
